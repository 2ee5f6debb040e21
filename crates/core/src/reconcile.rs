//! Freshness-marker comparison for one alert poll.
//!
//! [`reconcile`] is a pure decision function: it never touches state, it only
//! says which parts of the local state a just-received `/alerts` response
//! invalidates. Applying the decision is [`crate::ConsoleState`]'s job.

use crate::model::{AlertPoll, Connectivity};

/// The locally observed markers a poll response is compared against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollState {
    pub seq: Option<u64>,
    pub alertseq: Option<u64>,
    pub alert_count: usize,
    pub connectivity: Connectivity,
    pub force_update: bool,
    pub bootstrapped: bool,
}

/// What a poll response requires.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Actions {
    /// Connectivity flipped from disconnected to connected.
    pub reconnected: bool,
    /// Replace the cached alert list and `alertseq` with the response's.
    pub replace_alerts: bool,
    /// Refetch detail for the open set; carries the `seq` the fetch answers.
    pub fetch_details: Option<u64>,
    /// The domain is not bootstrapped yet; fetch `/domain` first.
    pub bootstrap: bool,
}

impl Actions {
    pub fn is_noop(&self) -> bool {
        *self == Self::default()
    }
}

/// Decide what a successful `/alerts` response changes.
///
/// Alerts are replaced when `alertseq` or the list length differ; this is a
/// length proxy, not a content diff, so a same-length swap under the same
/// `alertseq` goes unnoticed. Details are refetched when `seq` differs or a
/// refresh is forced, but only once the domain is bootstrapped. Markers lower
/// than the local ones belong to a response that completed out of order and
/// are never applied.
pub fn reconcile(previous: &PollState, response: &AlertPoll) -> Actions {
    let reconnected = !previous.connectivity.is_connected();

    let alerts_stale = previous
        .alertseq
        .is_some_and(|local| response.alertseq < local);
    let replace_alerts = !alerts_stale
        && (previous.alertseq != Some(response.alertseq)
            || previous.alert_count != response.alerts.len());

    let seq_stale = previous.seq.is_some_and(|local| response.seq < local);
    let seq_changed = !seq_stale && previous.seq != Some(response.seq);

    let (fetch_details, bootstrap) = if !previous.bootstrapped {
        (None, true)
    } else if seq_changed || previous.force_update {
        let target = previous.seq.map_or(response.seq, |local| local.max(response.seq));
        (Some(target), false)
    } else {
        (None, false)
    };

    Actions {
        reconnected,
        replace_alerts,
        fetch_details,
        bootstrap,
    }
}
