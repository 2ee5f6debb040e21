use std::future::Future;

use eaconsole_api::{
    AlertPoll, AnswerCaseRequest, DomainResponse, SetValueRequest, StatusResponse,
    SubjectsResponse,
};
use eaconsole_core::SubjectKey;
use eaconsole_core::controls::HistogramParam;

use crate::TransportError;

/// One request/response exchange per call, each under its own timeout.
///
/// The sync engine only sees this trait so it can be driven by a scripted
/// fake in tests. Mutating calls resolve to [`TransportError::Rejected`] when
/// the server answers but refuses.
pub trait Transport: Send + Sync + 'static {
    fn domain(&self) -> impl Future<Output = Result<DomainResponse, TransportError>> + Send;

    fn alerts(&self) -> impl Future<Output = Result<AlertPoll, TransportError>> + Send;

    /// `/subjects` with full detail for `details`, summaries for the rest.
    fn subjects(
        &self,
        details: &[SubjectKey],
    ) -> impl Future<Output = Result<SubjectsResponse, TransportError>> + Send;

    fn set_knob(
        &self,
        request: SetValueRequest,
    ) -> impl Future<Output = Result<StatusResponse, TransportError>> + Send;

    fn set_histogram(
        &self,
        param: HistogramParam,
        request: SetValueRequest,
    ) -> impl Future<Output = Result<StatusResponse, TransportError>> + Send;

    fn answer_case(
        &self,
        request: AnswerCaseRequest,
    ) -> impl Future<Output = Result<StatusResponse, TransportError>> + Send;
}
