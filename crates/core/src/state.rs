use serde_json::Value;

use crate::alerts::{AlertSet, ClosedAlerts, badge_label};
use crate::case_counts::CaseCounts;
use crate::model::{AlertId, AlertPoll, Connectivity, DomainBootstrap, SubjectBatch, SubjectKey};
use crate::open_set::{OpenSubjects, join_keys};
use crate::reconcile::{PollState, reconcile};
use crate::snapshot::DomainSnapshot;
use crate::validate::BootstrapError;
use crate::view::{ConsoleView, TabView};

/// A subject-detail fetch the reconciliation asked for.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DetailRequest {
    /// Open keys in tab order at the time the fetch was decided.
    pub keys: Vec<SubjectKey>,
    /// The `seq` this fetch brings the cache up to.
    pub target_seq: u64,
}

impl DetailRequest {
    pub fn details_param(&self) -> String {
        join_keys(&self.keys)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PollOutcome {
    pub reconnected: bool,
    pub alerts_replaced: bool,
    pub details: Option<DetailRequest>,
    pub bootstrap: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetailOutcome {
    /// The fetch answered a `seq` older than the cache; nothing was merged.
    Stale { reconnected: bool },
    Applied {
        reconnected: bool,
        updated: usize,
        skipped: usize,
        counts_changed: bool,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BootstrapOutcome {
    pub reconnected: bool,
    /// False when the snapshot was already bootstrapped and the payload was
    /// dropped.
    pub installed: bool,
    pub subjects: usize,
    pub skipped: usize,
}

/// The whole client-side state of one console session.
///
/// Every mutation goes through this type so poll results, detail batches and
/// operator actions are applied one at a time.
#[derive(Debug, Clone, Default)]
pub struct ConsoleState {
    snapshot: DomainSnapshot,
    alerts: AlertSet,
    closed_alerts: ClosedAlerts,
    open: OpenSubjects,
    case_counts: CaseCounts,
    connectivity: Connectivity,
    force_update: bool,
}

impl ConsoleState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> &DomainSnapshot {
        &self.snapshot
    }

    pub fn alerts(&self) -> &AlertSet {
        &self.alerts
    }

    pub fn closed_alerts(&self) -> &ClosedAlerts {
        &self.closed_alerts
    }

    pub fn open_subjects(&self) -> &OpenSubjects {
        &self.open
    }

    pub fn case_counts(&self) -> &CaseCounts {
        &self.case_counts
    }

    pub fn connectivity(&self) -> Connectivity {
        self.connectivity
    }

    pub fn force_update(&self) -> bool {
        self.force_update
    }

    pub fn poll_state(&self) -> PollState {
        PollState {
            seq: self.snapshot.seq(),
            alertseq: self.alerts.alertseq(),
            alert_count: self.alerts.len(),
            connectivity: self.connectivity,
            force_update: self.force_update,
            bootstrapped: self.snapshot.is_bootstrapped(),
        }
    }

    pub fn apply_bootstrap(
        &mut self,
        domain: DomainBootstrap,
    ) -> Result<BootstrapOutcome, BootstrapError> {
        let reconnected = self.mark_connected();
        if self.snapshot.is_bootstrapped() {
            return Ok(BootstrapOutcome {
                reconnected,
                installed: false,
                subjects: 0,
                skipped: 0,
            });
        }

        let batch = self.snapshot.bootstrap(domain)?;
        self.case_counts.refresh(&batch.subjects);
        Ok(BootstrapOutcome {
            reconnected,
            installed: true,
            subjects: batch.len(),
            skipped: batch.skipped,
        })
    }

    /// Apply a successful `/alerts` response and report what it invalidated.
    pub fn apply_alert_poll(&mut self, response: AlertPoll) -> PollOutcome {
        let actions = reconcile(&self.poll_state(), &response);
        self.connectivity = Connectivity::Connected;

        if actions.replace_alerts {
            self.alerts.replace(response.alertseq, response.alerts);
        }

        PollOutcome {
            reconnected: actions.reconnected,
            alerts_replaced: actions.replace_alerts,
            details: actions.fetch_details.map(|target_seq| DetailRequest {
                keys: self.open.keys().to_vec(),
                target_seq,
            }),
            bootstrap: actions.bootstrap,
        }
    }

    /// Merge the raw `subjects` array of a successful detail fetch.
    pub fn apply_details(&mut self, request: &DetailRequest, elements: Vec<Value>) -> DetailOutcome {
        let reconnected = self.mark_connected();
        if self
            .snapshot
            .seq()
            .is_some_and(|local| request.target_seq < local)
        {
            return DetailOutcome::Stale { reconnected };
        }

        let batch = SubjectBatch::index(elements);
        let skipped = batch.skipped;
        let counts_changed = self.case_counts.refresh(&batch.subjects);
        let updated = self.snapshot.merge_details(batch, &request.keys);
        self.snapshot.advance_seq(request.target_seq);

        if self.force_update && request.keys == self.open.keys() {
            self.force_update = false;
        }

        DetailOutcome::Applied {
            reconnected,
            updated,
            skipped,
            counts_changed,
        }
    }

    /// Record a failed exchange. Returns true when this is a transition.
    pub fn mark_disconnected(&mut self) -> bool {
        let was_connected = self.connectivity.is_connected();
        self.connectivity = Connectivity::Disconnected;
        was_connected
    }

    fn mark_connected(&mut self) -> bool {
        let was_connected = self.connectivity.is_connected();
        self.connectivity = Connectivity::Connected;
        !was_connected
    }

    /// Ask for a detail refresh on the next reconciliation regardless of `seq`.
    pub fn request_refresh(&mut self) {
        self.force_update = true;
    }

    pub fn open_subject(&mut self, key: SubjectKey) -> bool {
        let changed = self.open.add(key);
        self.force_update |= changed;
        changed
    }

    /// Open the first subject whose name is `name`. Returns its key.
    pub fn open_subject_named(&mut self, name: &str) -> Option<SubjectKey> {
        let key = self.snapshot.find_by_name(name)?.key;
        self.open_subject(key);
        Some(key)
    }

    pub fn close_subject(&mut self, key: SubjectKey) -> bool {
        let changed = self.open.close(key);
        self.force_update |= changed;
        changed
    }

    pub fn select_tab(&mut self, index: usize) -> bool {
        let changed = self.open.select(index);
        self.force_update |= changed;
        changed
    }

    pub fn dismiss_alert(&mut self, id: AlertId) -> bool {
        self.closed_alerts.dismiss(id)
    }

    pub fn dismiss_all_alerts(&mut self) -> usize {
        self.closed_alerts.dismiss_all(&self.alerts)
    }

    pub fn view(&self) -> ConsoleView {
        let tabs = self
            .open
            .keys()
            .iter()
            .map(|key| {
                let subject = self.snapshot.get(*key);
                TabView {
                    key: *key,
                    name: subject
                        .map(|s| s.display_name())
                        .unwrap_or_else(|| format!("subject {key}")),
                    case_count: self.case_counts.get(*key),
                    loaded: subject.is_some_and(|s| s.is_loaded()),
                }
            })
            .collect();
        let alerts: Vec<_> = self
            .closed_alerts
            .open_alerts(&self.alerts)
            .cloned()
            .collect();

        ConsoleView {
            label: self.snapshot.label().map(str::to_string),
            seq: self.snapshot.seq(),
            connectivity: self.connectivity,
            tabs,
            active_tab: self.open.active_index(),
            alert_badge: badge_label(alerts.len()),
            alerts,
        }
    }
}
