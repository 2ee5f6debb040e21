//! The sync session: one task owning [`ConsoleState`] that turns scheduler
//! ticks, operator commands and fetch completions into state changes.
//!
//! Fetches run as child tasks in a [`JoinSet`] so overlapping requests are
//! possible; every completion is applied on the session task, one at a time,
//! through the freshness-marker rules in `eaconsole-core`. Dropping the
//! session aborts whatever is still in flight.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use eaconsole_api::{
    AlertPoll, AnswerCaseRequest, DomainResponse, SetValueRequest, StatusResponse,
    SubjectsResponse,
};
use eaconsole_api_client::{Transport, TransportError};
use eaconsole_core::controls::{HistogramParam, clamp_answer, clamp_option_index, find_knob};
use eaconsole_core::{
    AlertId, ConsoleState, ConsoleView, DetailOutcome, DetailRequest, PollOutcome, SubjectKey,
};
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::{JoinHandle, JoinSet};
use tracing::{debug, error, info, warn};

use crate::SessionError;
use crate::scheduler::PollScheduler;

const COMMAND_BUFFER: usize = 64;

type Reply<T> = oneshot::Sender<Result<T, SessionError>>;

/// A mutation the server accepted.
#[derive(Debug, Clone, PartialEq)]
pub struct Submitted {
    pub requested: f64,
    /// What went over the wire after local clamping.
    pub sent: f64,
    pub status: StatusResponse,
}

impl Submitted {
    pub fn was_clamped(&self) -> bool {
        self.sent != self.requested
    }
}

#[derive(Debug)]
pub enum SessionCommand {
    /// Scheduled poll.
    Tick,
    Open(SubjectKey),
    OpenNamed {
        name: String,
        reply: oneshot::Sender<Option<SubjectKey>>,
    },
    Close(SubjectKey),
    Select(usize),
    Refresh,
    Dismiss(AlertId),
    DismissAll,
    SetKnob {
        key: u64,
        value: f64,
        reply: Reply<Submitted>,
    },
    SetHistogram {
        param: HistogramParam,
        key: u64,
        value: f64,
        reply: Reply<Submitted>,
    },
    AnswerCase {
        subject: SubjectKey,
        case: u64,
        answer: u64,
        reply: Reply<Submitted>,
    },
    Shutdown,
}

enum Fetched {
    Bootstrap(Result<DomainResponse, TransportError>),
    Alerts(Result<AlertPoll, TransportError>),
    Details(DetailRequest, Result<SubjectsResponse, TransportError>),
    Mutation {
        requested: f64,
        sent: f64,
        result: Result<StatusResponse, TransportError>,
        reply: Reply<Submitted>,
    },
}

pub struct SyncSession<T: Transport> {
    transport: Arc<T>,
    state: ConsoleState,
    in_flight: JoinSet<Fetched>,
    /// Key sets with a detail fetch outstanding.
    details_in_flight: HashSet<Vec<SubjectKey>>,
    bootstrap_in_flight: bool,
    view: watch::Sender<ConsoleView>,
}

impl<T: Transport> SyncSession<T> {
    pub fn new(transport: Arc<T>) -> Self {
        let (view, _) = watch::channel(ConsoleView::default());
        Self {
            transport,
            state: ConsoleState::new(),
            in_flight: JoinSet::new(),
            details_in_flight: HashSet::new(),
            bootstrap_in_flight: false,
            view,
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<ConsoleView> {
        self.view.subscribe()
    }

    pub fn state(&self) -> &ConsoleState {
        &self.state
    }

    /// Number of fetches and mutations still running.
    pub fn in_flight(&self) -> usize {
        self.in_flight.len()
    }

    /// Fetch `/domain` unless it is installed or already being fetched.
    pub fn bootstrap(&mut self) {
        if self.state.snapshot().is_bootstrapped() || self.bootstrap_in_flight {
            return;
        }
        self.bootstrap_in_flight = true;
        let transport = Arc::clone(&self.transport);
        self.in_flight
            .spawn(async move { Fetched::Bootstrap(transport.domain().await) });
    }

    /// Poll `/alerts`. Whatever else needs fetching is decided once it returns.
    pub fn tick(&mut self) {
        let transport = Arc::clone(&self.transport);
        self.in_flight
            .spawn(async move { Fetched::Alerts(transport.alerts().await) });
    }

    /// Handle one command. Returns false when the session should stop.
    pub fn handle(&mut self, command: SessionCommand) -> bool {
        match command {
            SessionCommand::Tick => self.tick(),
            SessionCommand::Open(key) => {
                if self.state.open_subject(key) {
                    self.tick();
                }
            }
            SessionCommand::OpenNamed { name, reply } => {
                let key = self.state.open_subject_named(&name);
                if key.is_none() {
                    debug!(name = %name, "No subject with that name");
                } else if self.state.force_update() {
                    self.tick();
                }
                let _ = reply.send(key);
            }
            SessionCommand::Close(key) => {
                if self.state.close_subject(key) {
                    self.tick();
                }
            }
            SessionCommand::Select(index) => {
                if self.state.select_tab(index) {
                    self.tick();
                }
            }
            SessionCommand::Refresh => {
                self.state.request_refresh();
                self.tick();
            }
            SessionCommand::Dismiss(id) => {
                self.state.dismiss_alert(id);
            }
            SessionCommand::DismissAll => {
                let dismissed = self.state.dismiss_all_alerts();
                debug!(dismissed, "Dismissed all alerts");
            }
            SessionCommand::SetKnob { key, value, reply } => self.set_knob(key, value, reply),
            SessionCommand::SetHistogram {
                param,
                key,
                value,
                reply,
            } => self.set_histogram(param, key, value, reply),
            SessionCommand::AnswerCase {
                subject,
                case,
                answer,
                reply,
            } => self.answer_case(subject, case, answer, reply),
            SessionCommand::Shutdown => return false,
        }
        true
    }

    /// Drive the session until `Shutdown` arrives or every sender is gone.
    pub async fn run(mut self, mut commands: mpsc::Receiver<SessionCommand>) {
        self.bootstrap();
        self.publish();

        loop {
            tokio::select! {
                command = commands.recv() => {
                    let Some(command) = command else { break };
                    if !self.handle(command) {
                        break;
                    }
                }
                Some(joined) = self.in_flight.join_next(), if !self.in_flight.is_empty() => {
                    match joined {
                        Ok(fetched) => self.apply(fetched),
                        Err(e) if e.is_cancelled() => {}
                        Err(e) => error!("Fetch task failed: {e}"),
                    }
                }
            }
            self.publish();
        }

        self.in_flight.abort_all();
        debug!("Sync session stopped");
    }

    /// Apply completions until nothing is in flight, follow-up fetches
    /// included.
    pub async fn settle(&mut self) {
        while let Some(joined) = self.in_flight.join_next().await {
            match joined {
                Ok(fetched) => self.apply(fetched),
                Err(e) => error!("Fetch task failed: {e}"),
            }
        }
        self.publish();
    }

    fn apply(&mut self, fetched: Fetched) {
        match fetched {
            Fetched::Bootstrap(result) => {
                self.bootstrap_in_flight = false;
                match result {
                    Ok(domain) => self.install(domain),
                    Err(e) => self.fail(&e),
                }
            }
            Fetched::Alerts(Ok(poll)) => {
                let outcome = self.state.apply_alert_poll(poll);
                self.follow_up(outcome);
            }
            Fetched::Alerts(Err(e)) => self.fail(&e),
            Fetched::Details(request, result) => {
                self.details_in_flight.remove(&request.keys);
                match result {
                    Ok(response) => self.merge(&request, response),
                    Err(e) => self.fail(&e),
                }
            }
            Fetched::Mutation {
                requested,
                sent,
                result,
                reply,
            } => {
                let result = match result {
                    Ok(status) => Ok(Submitted {
                        requested,
                        sent,
                        status,
                    }),
                    Err(e) => {
                        if !e.is_rejection() {
                            self.fail(&e);
                        }
                        Err(SessionError::from(e))
                    }
                };
                let _ = reply.send(result);
            }
        }
    }

    fn install(&mut self, domain: DomainResponse) {
        match self.state.apply_bootstrap(domain) {
            Ok(outcome) if outcome.installed => {
                if outcome.reconnected {
                    info!("Connected to server");
                }
                info!(
                    label = self.state.snapshot().label().unwrap_or_default(),
                    subjects = outcome.subjects,
                    skipped = outcome.skipped,
                    "Domain loaded"
                );
                self.tick();
            }
            Ok(_) => debug!("Ignoring domain payload, already bootstrapped"),
            Err(e) => {
                warn!("Rejecting domain payload: {e}");
                self.state.mark_disconnected();
            }
        }
    }

    fn follow_up(&mut self, outcome: PollOutcome) {
        if outcome.reconnected {
            info!("Connected to server");
        }
        if outcome.alerts_replaced {
            debug!(alerts = self.state.alerts().len(), "Alert list replaced");
        }
        if outcome.bootstrap {
            self.bootstrap();
        }
        if let Some(request) = outcome.details {
            self.fetch_details(request);
        }
    }

    fn fetch_details(&mut self, request: DetailRequest) {
        if !self.details_in_flight.insert(request.keys.clone()) {
            debug!(
                details = %request.details_param(),
                "Detail fetch for this key set already in flight"
            );
            return;
        }
        let transport = Arc::clone(&self.transport);
        self.in_flight.spawn(async move {
            let result = transport.subjects(&request.keys).await;
            Fetched::Details(request, result)
        });
    }

    fn merge(&mut self, request: &DetailRequest, response: SubjectsResponse) {
        match self.state.apply_details(request, response.subjects) {
            DetailOutcome::Stale { reconnected } => {
                if reconnected {
                    info!("Connected to server");
                }
                debug!(
                    target_seq = request.target_seq,
                    "Discarding detail batch older than the cache"
                );
            }
            DetailOutcome::Applied {
                reconnected,
                updated,
                skipped,
                counts_changed,
            } => {
                if reconnected {
                    info!("Connected to server");
                }
                if skipped > 0 {
                    warn!(skipped, "Ignoring malformed subject entries");
                }
                debug!(
                    seq = request.target_seq,
                    updated, counts_changed, "Subject detail merged"
                );
            }
        }
    }

    fn fail(&mut self, err: &TransportError) {
        if self.state.mark_disconnected() {
            warn!("Lost connection to server: {err}");
        } else {
            debug!("Server still unreachable: {err}");
        }
    }

    fn set_knob(&mut self, key: u64, value: f64, reply: Reply<Submitted>) {
        let sent = match find_knob(self.state.snapshot().subjects(), key) {
            Some(knob) => knob.clamp(value),
            None => {
                debug!(key, "Knob not in cached detail, sending value as given");
                value
            }
        };
        let transport = Arc::clone(&self.transport);
        self.in_flight.spawn(async move {
            let result = transport
                .set_knob(SetValueRequest { key, value: sent })
                .await;
            Fetched::Mutation {
                requested: value,
                sent,
                result,
                reply,
            }
        });
    }

    fn set_histogram(&mut self, param: HistogramParam, key: u64, value: f64, reply: Reply<Submitted>) {
        let sent = clamp_option_index(value) as f64;
        let transport = Arc::clone(&self.transport);
        self.in_flight.spawn(async move {
            let result = transport
                .set_histogram(param, SetValueRequest { key, value: sent })
                .await;
            Fetched::Mutation {
                requested: value,
                sent,
                result,
                reply,
            }
        });
    }

    fn answer_case(&mut self, subject: SubjectKey, case: u64, answer: u64, reply: Reply<Submitted>) {
        let cached = self
            .state
            .snapshot()
            .get(subject)
            .and_then(|s| s.find_case(case));
        let sent = clamp_answer(cached, answer);
        let transport = Arc::clone(&self.transport);
        self.in_flight.spawn(async move {
            let result = transport
                .answer_case(AnswerCaseRequest {
                    subject,
                    case,
                    answer: sent,
                })
                .await;
            Fetched::Mutation {
                requested: answer as f64,
                sent: sent as f64,
                result,
                reply,
            }
        });
    }

    fn publish(&self) {
        let next = self.state.view();
        self.view.send_if_modified(|current| {
            if *current == next {
                false
            } else {
                *current = next;
                true
            }
        });
    }
}

/// Client side of a running session: commands in, views out.
pub struct SessionHandle {
    commands: mpsc::Sender<SessionCommand>,
    view: watch::Receiver<ConsoleView>,
    scheduler: PollScheduler,
    task: JoinHandle<()>,
}

/// Start a session task polling every `interval`. Must be called inside a
/// tokio runtime.
pub fn spawn_session<T: Transport>(transport: Arc<T>, interval: Duration) -> SessionHandle {
    let session = SyncSession::new(transport);
    let view = session.subscribe();
    let (commands, rx) = mpsc::channel(COMMAND_BUFFER);

    let ticks = commands.clone();
    let scheduler = PollScheduler::start(interval, move || {
        if ticks.try_send(SessionCommand::Tick).is_err() {
            debug!("Session busy, skipping tick");
        }
    });
    let task = tokio::spawn(session.run(rx));

    SessionHandle {
        commands,
        view,
        scheduler,
        task,
    }
}

impl SessionHandle {
    pub fn view(&self) -> watch::Receiver<ConsoleView> {
        self.view.clone()
    }

    pub fn current(&self) -> ConsoleView {
        self.view.borrow().clone()
    }

    async fn send(&self, command: SessionCommand) -> Result<(), SessionError> {
        self.commands
            .send(command)
            .await
            .map_err(|_| SessionError::Closed)
    }

    async fn request<R>(
        &self,
        command: impl FnOnce(Reply<R>) -> SessionCommand,
    ) -> Result<R, SessionError> {
        let (reply, rx) = oneshot::channel();
        self.send(command(reply)).await?;
        rx.await.map_err(|_| SessionError::Closed)?
    }

    pub async fn open(&self, key: SubjectKey) -> Result<(), SessionError> {
        self.send(SessionCommand::Open(key)).await
    }

    /// Open the first subject called `name`; `None` when there is none.
    pub async fn open_named(&self, name: &str) -> Result<Option<SubjectKey>, SessionError> {
        let (reply, rx) = oneshot::channel();
        self.send(SessionCommand::OpenNamed {
            name: name.to_string(),
            reply,
        })
        .await?;
        rx.await.map_err(|_| SessionError::Closed)
    }

    pub async fn close(&self, key: SubjectKey) -> Result<(), SessionError> {
        self.send(SessionCommand::Close(key)).await
    }

    pub async fn select(&self, index: usize) -> Result<(), SessionError> {
        self.send(SessionCommand::Select(index)).await
    }

    pub async fn refresh(&self) -> Result<(), SessionError> {
        self.send(SessionCommand::Refresh).await
    }

    pub async fn dismiss(&self, id: AlertId) -> Result<(), SessionError> {
        self.send(SessionCommand::Dismiss(id)).await
    }

    pub async fn dismiss_all(&self) -> Result<(), SessionError> {
        self.send(SessionCommand::DismissAll).await
    }

    pub async fn set_knob(&self, key: u64, value: f64) -> Result<Submitted, SessionError> {
        self.request(|reply| SessionCommand::SetKnob { key, value, reply })
            .await
    }

    pub async fn set_histogram(
        &self,
        param: HistogramParam,
        key: u64,
        value: f64,
    ) -> Result<Submitted, SessionError> {
        self.request(|reply| SessionCommand::SetHistogram {
            param,
            key,
            value,
            reply,
        })
        .await
    }

    pub async fn answer_case(
        &self,
        subject: SubjectKey,
        case: u64,
        answer: u64,
    ) -> Result<Submitted, SessionError> {
        self.request(|reply| SessionCommand::AnswerCase {
            subject,
            case,
            answer,
            reply,
        })
        .await
    }

    /// Stop the scheduler, then the session; in-flight fetches are aborted.
    pub async fn shutdown(mut self) {
        self.scheduler.stop();
        let _ = self.commands.send(SessionCommand::Shutdown).await;
        if let Err(e) = self.task.await {
            error!("Sync session task failed: {e}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use eaconsole_core::testing;
    use serde_json::{Value, json};
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicBool, Ordering};

    /// Scripted server. Queued results are served first; otherwise reads
    /// return the steady domain and poll, and `/subjects` returns detail for
    /// the requested keys plus summaries for every other known subject.
    struct FakeTransport {
        subjects: Vec<Value>,
        steady_poll: Mutex<AlertPoll>,
        queued_domains: Mutex<VecDeque<Result<DomainResponse, TransportError>>>,
        queued_polls: Mutex<VecDeque<Result<AlertPoll, TransportError>>>,
        queued_details: Mutex<VecDeque<Result<SubjectsResponse, TransportError>>>,
        queued_mutations: Mutex<VecDeque<Result<StatusResponse, TransportError>>>,
        hang_alerts: AtomicBool,
        calls: Mutex<Vec<String>>,
        mutations: Mutex<Vec<(String, Value)>>,
    }

    impl FakeTransport {
        fn new(subjects: Vec<Value>) -> Arc<Self> {
            Arc::new(Self {
                subjects,
                steady_poll: Mutex::new(poll(5, 3)),
                queued_domains: Mutex::default(),
                queued_polls: Mutex::default(),
                queued_details: Mutex::default(),
                queued_mutations: Mutex::default(),
                hang_alerts: AtomicBool::new(false),
                calls: Mutex::default(),
                mutations: Mutex::default(),
            })
        }

        fn set_poll(&self, seq: u64, alertseq: u64) {
            *self.steady_poll.lock().unwrap() = poll(seq, alertseq);
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }

        fn detail_calls(&self) -> Vec<String> {
            self.calls()
                .into_iter()
                .filter(|c| c.starts_with("/subjects"))
                .collect()
        }

        fn record(&self, call: String) {
            self.calls.lock().unwrap().push(call);
        }

        fn next_alerts(&self) -> Result<AlertPoll, TransportError> {
            self.record("/alerts".to_string());
            let queued = self.queued_polls.lock().unwrap().pop_front();
            queued.unwrap_or_else(|| Ok(self.steady_poll.lock().unwrap().clone()))
        }

        fn next_details(&self, details: &[SubjectKey]) -> Result<SubjectsResponse, TransportError> {
            let keys: Vec<String> = details.iter().map(ToString::to_string).collect();
            self.record(format!("/subjects?details={}", keys.join(",")));
            if let Some(queued) = self.queued_details.lock().unwrap().pop_front() {
                return queued;
            }
            let subjects = self
                .subjects
                .iter()
                .map(|summary| {
                    let key = summary["key"].as_u64().unwrap();
                    if details.contains(&key) {
                        let name = summary["name"].as_str().unwrap_or_default();
                        serde_json::to_value(testing::detailed_subject(key, name, 1)).unwrap()
                    } else {
                        summary.clone()
                    }
                })
                .collect();
            Ok(SubjectsResponse { subjects })
        }

        fn next_mutation(&self, path: &str, body: Value) -> Result<StatusResponse, TransportError> {
            self.record(path.to_string());
            self.mutations.lock().unwrap().push((path.to_string(), body));
            let queued = self.queued_mutations.lock().unwrap().pop_front();
            queued.unwrap_or_else(|| {
                Ok(StatusResponse {
                    status: Some(json!(200)),
                    ..StatusResponse::default()
                })
            })
        }
    }

    impl Transport for FakeTransport {
        async fn domain(&self) -> Result<DomainResponse, TransportError> {
            self.record("/domain".to_string());
            let queued = self.queued_domains.lock().unwrap().pop_front();
            queued.unwrap_or_else(|| Ok(testing::domain("Line1", 5, self.subjects.clone())))
        }

        async fn alerts(&self) -> Result<AlertPoll, TransportError> {
            if self.hang_alerts.load(Ordering::SeqCst) {
                std::future::pending::<()>().await;
            }
            self.next_alerts()
        }

        async fn subjects(&self, details: &[SubjectKey]) -> Result<SubjectsResponse, TransportError> {
            self.next_details(details)
        }

        async fn set_knob(&self, request: SetValueRequest) -> Result<StatusResponse, TransportError> {
            self.next_mutation("/set/knob", json!({"key": request.key, "value": request.value}))
        }

        async fn set_histogram(
            &self,
            param: HistogramParam,
            request: SetValueRequest,
        ) -> Result<StatusResponse, TransportError> {
            self.next_mutation(
                &format!("/set/histogram/{param}"),
                json!({"key": request.key, "value": request.value}),
            )
        }

        async fn answer_case(&self, request: AnswerCaseRequest) -> Result<StatusResponse, TransportError> {
            self.next_mutation(
                "/ctrl/answercase",
                json!({"subject": request.subject, "case": request.case, "answer": request.answer}),
            )
        }
    }

    fn poll(seq: u64, alertseq: u64) -> AlertPoll {
        AlertPoll {
            seq,
            alertseq,
            alerts: Vec::new(),
        }
    }

    fn timeout(path: &str) -> TransportError {
        TransportError::Timeout {
            path: path.to_string(),
            timeout: Duration::from_millis(500),
        }
    }

    fn three_subjects() -> Vec<Value> {
        vec![
            json!({"key": 2, "name": "S2"}),
            json!({"key": 7, "name": "S7"}),
            json!({"key": 9, "name": "S9"}),
        ]
    }

    async fn bootstrapped(fake: &Arc<FakeTransport>) -> SyncSession<FakeTransport> {
        let mut session = SyncSession::new(Arc::clone(fake));
        session.bootstrap();
        session.settle().await;
        session
    }

    fn loaded(session: &SyncSession<FakeTransport>, key: SubjectKey) -> bool {
        session
            .state()
            .snapshot()
            .get(key)
            .is_some_and(|s| s.is_loaded())
    }

    #[tokio::test]
    async fn bootstrap_installs_domain_then_polls() {
        let fake = FakeTransport::new(three_subjects());
        let session = bootstrapped(&fake).await;

        assert_eq!(session.state().snapshot().label(), Some("Line1"));
        assert_eq!(session.state().snapshot().seq(), Some(5));
        assert!(session.state().connectivity().is_connected());
        assert_eq!(fake.calls(), vec!["/domain", "/alerts"]);
        assert_eq!(session.subscribe().borrow().label.as_deref(), Some("Line1"));
    }

    #[tokio::test]
    async fn opening_tabs_fetches_current_open_set_once() {
        let fake = FakeTransport::new(three_subjects());
        let mut session = bootstrapped(&fake).await;

        session.handle(SessionCommand::Open(2));
        session.handle(SessionCommand::Open(7));
        session.settle().await;

        assert_eq!(fake.detail_calls(), vec!["/subjects?details=2,7"]);
        assert!(loaded(&session, 2));
        assert!(loaded(&session, 7));
        assert!(!loaded(&session, 9));
        assert!(!session.state().force_update());
    }

    #[tokio::test]
    async fn unchanged_poll_issues_no_detail_fetch() {
        let fake = FakeTransport::new(three_subjects());
        let mut session = bootstrapped(&fake).await;
        session.handle(SessionCommand::Open(2));
        session.settle().await;
        let fetched = fake.detail_calls().len();

        session.tick();
        session.settle().await;
        assert_eq!(fake.detail_calls().len(), fetched);
        assert!(session.state().connectivity().is_connected());
    }

    #[tokio::test]
    async fn seq_change_refreshes_open_subjects_and_keeps_closed_detail() {
        let fake = FakeTransport::new(three_subjects());
        let mut session = bootstrapped(&fake).await;
        for key in [9, 2, 7] {
            session.handle(SessionCommand::Open(key));
        }
        session.settle().await;
        session.handle(SessionCommand::Close(9));
        session.settle().await;
        assert!(loaded(&session, 9), "closing keeps cached detail");

        fake.set_poll(6, 3);
        session.tick();
        session.settle().await;

        assert_eq!(
            fake.detail_calls().last().map(String::as_str),
            Some("/subjects?details=2,7")
        );
        assert_eq!(session.state().snapshot().seq(), Some(6));
        assert!(loaded(&session, 9));
    }

    #[tokio::test]
    async fn detail_timeout_disconnects_and_next_tick_retries() {
        let fake = FakeTransport::new(three_subjects());
        let mut session = bootstrapped(&fake).await;
        fake.queued_details
            .lock()
            .unwrap()
            .push_back(Err(timeout("/subjects")));

        session.handle(SessionCommand::Open(2));
        session.settle().await;
        assert!(!session.state().connectivity().is_connected());
        assert!(!loaded(&session, 2));
        assert_eq!(session.state().snapshot().seq(), Some(5));

        session.tick();
        session.settle().await;
        assert!(session.state().connectivity().is_connected());
        assert!(loaded(&session, 2));
    }

    #[tokio::test]
    async fn failed_poll_leaves_data_untouched() {
        let fake = FakeTransport::new(three_subjects());
        let mut session = bootstrapped(&fake).await;
        let before = session.state().snapshot().clone();
        fake.queued_polls
            .lock()
            .unwrap()
            .push_back(Err(timeout("/alerts")));

        session.tick();
        session.settle().await;
        assert!(!session.state().connectivity().is_connected());
        assert_eq!(session.state().snapshot(), &before);
    }

    #[tokio::test]
    async fn bootstrap_is_retried_until_it_succeeds() {
        let fake = FakeTransport::new(three_subjects());
        fake.queued_domains
            .lock()
            .unwrap()
            .push_back(Err(timeout("/domain")));

        let mut session = bootstrapped(&fake).await;
        assert!(!session.state().snapshot().is_bootstrapped());
        assert_eq!(fake.calls(), vec!["/domain"]);

        session.tick();
        session.settle().await;
        assert_eq!(session.state().snapshot().label(), Some("Line1"));
        assert_eq!(fake.calls(), vec!["/domain", "/alerts", "/domain", "/alerts"]);
    }

    #[tokio::test]
    async fn knob_value_is_clamped_to_cached_range() {
        let fake = FakeTransport::new(vec![json!({
            "key": 2,
            "name": "S2",
            "rulekits": [{"key": 30, "histogram": {"key": 31, "knobs": [
                {"key": 41, "type": "Knob_takesGuiFpnAsFloat", "range_min": 0.0, "range_max": 2.0}
            ]}}]
        })]);
        let mut session = bootstrapped(&fake).await;

        let (reply, rx) = oneshot::channel();
        session.handle(SessionCommand::SetKnob {
            key: 41,
            value: 5.0,
            reply,
        });
        session.settle().await;

        let submitted = rx.await.unwrap().unwrap();
        assert_eq!(submitted.sent, 2.0);
        assert!(submitted.was_clamped());
        assert_eq!(
            fake.mutations.lock().unwrap().clone(),
            vec![("/set/knob".to_string(), json!({"key": 41, "value": 2.0}))]
        );
    }

    #[tokio::test]
    async fn histogram_and_answer_are_clamped() {
        let fake = FakeTransport::new(vec![json!({
            "key": 2,
            "name": "S2",
            "cases": [{"key": 5, "options": ["ignore", "fix"]}]
        })]);
        let mut session = bootstrapped(&fake).await;

        let (hist_reply, hist_rx) = oneshot::channel();
        session.handle(SessionCommand::SetHistogram {
            param: HistogramParam::Mode,
            key: 31,
            value: -3.0,
            reply: hist_reply,
        });
        let (answer_reply, answer_rx) = oneshot::channel();
        session.handle(SessionCommand::AnswerCase {
            subject: 2,
            case: 5,
            answer: 9,
            reply: answer_reply,
        });
        session.settle().await;

        assert_eq!(hist_rx.await.unwrap().unwrap().sent, 0.0);
        assert_eq!(answer_rx.await.unwrap().unwrap().sent, 1.0);
        let mutations = fake.mutations.lock().unwrap().clone();
        assert!(mutations.contains(&(
            "/ctrl/answercase".to_string(),
            json!({"subject": 2, "case": 5, "answer": 1})
        )));
        assert!(mutations.contains(&(
            "/set/histogram/mode".to_string(),
            json!({"key": 31, "value": 0.0})
        )));
    }

    #[tokio::test]
    async fn rejected_mutation_is_reported_without_disconnecting() {
        let fake = FakeTransport::new(three_subjects());
        let mut session = bootstrapped(&fake).await;
        fake.queued_mutations
            .lock()
            .unwrap()
            .push_back(Err(TransportError::Rejected {
                path: "/set/knob".to_string(),
                message: "status 400".to_string(),
            }));

        let (reply, rx) = oneshot::channel();
        session.handle(SessionCommand::SetKnob {
            key: 99,
            value: 1.0,
            reply,
        });
        session.settle().await;

        let err = rx.await.unwrap().unwrap_err();
        assert!(matches!(err, SessionError::Transport(TransportError::Rejected { .. })));
        assert!(session.state().connectivity().is_connected());
    }

    #[tokio::test]
    async fn dropping_session_aborts_in_flight_fetches() {
        let fake = FakeTransport::new(three_subjects());
        let mut session = bootstrapped(&fake).await;
        fake.hang_alerts.store(true, Ordering::SeqCst);

        session.tick();
        assert_eq!(session.in_flight(), 1);
        drop(session);

        tokio::time::timeout(Duration::from_secs(1), async {
            while Arc::strong_count(&fake) > 1 {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("in-flight fetch released its transport");
    }

    #[tokio::test]
    async fn handle_drives_a_running_session() {
        let fake = FakeTransport::new(three_subjects());
        let handle = spawn_session(Arc::clone(&fake), Duration::from_millis(20));
        let mut view = handle.view();

        tokio::time::timeout(Duration::from_secs(2), view.wait_for(|v| v.label.is_some()))
            .await
            .expect("bootstrap")
            .unwrap();

        handle.open(2).await.unwrap();
        tokio::time::timeout(
            Duration::from_secs(2),
            view.wait_for(|v| v.tabs.first().is_some_and(|t| t.loaded)),
        )
        .await
        .expect("detail")
        .unwrap();

        assert_eq!(handle.open_named("S7").await.unwrap(), Some(7));
        assert_eq!(handle.open_named("nope").await.unwrap(), None);
        assert_eq!(handle.current().tabs.len(), 2);
        assert_eq!(handle.current().active().map(|t| t.key), Some(7));

        handle.shutdown().await;
    }
}
