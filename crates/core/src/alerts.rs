use std::collections::BTreeSet;
use std::sync::Arc;

use crate::model::{Alert, AlertId};

/// Cached alert list together with the `alertseq` it was fetched at.
///
/// The list is shared behind an `Arc` so an unchanged list keeps its identity
/// across polls.
#[derive(Debug, Clone)]
pub struct AlertSet {
    alertseq: Option<u64>,
    alerts: Arc<[Alert]>,
}

impl Default for AlertSet {
    fn default() -> Self {
        Self {
            alertseq: None,
            alerts: Arc::from(Vec::new()),
        }
    }
}

impl AlertSet {
    pub fn alertseq(&self) -> Option<u64> {
        self.alertseq
    }

    pub fn alerts(&self) -> &Arc<[Alert]> {
        &self.alerts
    }

    pub fn len(&self) -> usize {
        self.alerts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.alerts.is_empty()
    }

    pub(crate) fn replace(&mut self, alertseq: u64, alerts: Vec<Alert>) {
        self.alertseq = Some(alertseq);
        self.alerts = Arc::from(alerts);
    }
}

/// Alert ids the operator dismissed locally. Never sent to the server.
///
/// Ids of alerts the server no longer reports simply never match again.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClosedAlerts {
    ids: BTreeSet<AlertId>,
}

impl ClosedAlerts {
    pub fn dismiss(&mut self, id: AlertId) -> bool {
        self.ids.insert(id)
    }

    /// Dismiss every alert currently in `set`.
    pub fn dismiss_all(&mut self, set: &AlertSet) -> usize {
        set.alerts()
            .iter()
            .filter(|alert| self.ids.insert(alert.id))
            .count()
    }

    pub fn is_dismissed(&self, id: AlertId) -> bool {
        self.ids.contains(&id)
    }

    /// Alerts in `set` that have not been dismissed, in server order.
    pub fn open_alerts<'a>(&'a self, set: &'a AlertSet) -> impl Iterator<Item = &'a Alert> + 'a {
        set.alerts()
            .iter()
            .filter(move |alert| !self.is_dismissed(alert.id))
    }
}

/// Notification badge text: empty for zero, the count up to nine, then `9+`.
pub fn badge_label(count: usize) -> String {
    match count {
        0 => String::new(),
        1..=9 => count.to_string(),
        _ => "9+".to_string(),
    }
}
