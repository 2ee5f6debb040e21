use std::sync::Arc;

use anyhow::{Context, Result, bail};
use eaconsole_api::{SetTimeRequest, StatusResponse};
use eaconsole_api_client::ApiClient;
use eaconsole_core::controls::HistogramParam;
use eaconsole_core::validate::validate_bootstrap;
use eaconsole_core::{SubjectBatch, SubjectKey};
use eaconsole_runtime_config::ConsoleConfig;
use eaconsole_sync::{SessionCommand, SessionError, Submitted, SyncSession};
use tokio::sync::oneshot;

use crate::config::build_client;

pub async fn ping(config: &ConsoleConfig) -> Result<()> {
    let client = build_client(config)?;
    let response = client
        .noop()
        .await
        .with_context(|| format!("{} did not answer", config.server.url))?;
    match response.apiver {
        Some(apiver) => println!("{} is up (api version {apiver})", config.server.url),
        None => println!("{} is up", config.server.url),
    }
    Ok(())
}

pub async fn domain(config: &ConsoleConfig) -> Result<()> {
    let client = build_client(config)?;
    let domain = client.domain().await.context("Failed to load domain")?;
    validate_bootstrap(&domain)?;

    println!("{} (seq {})", domain.label, domain.seq);
    let batch = SubjectBatch::index(domain.subjects);
    for subject in batch.subjects.values() {
        let cases = subject
            .case_count()
            .map(|n| format!("{n} cases"))
            .unwrap_or_else(|| "no cases".to_string());
        println!("  {:>6}  {}  ({cases})", subject.key, subject.display_name());
    }
    if batch.skipped > 0 {
        println!("  ({} malformed entries skipped)", batch.skipped);
    }
    Ok(())
}

/// A bootstrapped session with `subject`'s detail loaded, so mutations are
/// clamped against the server's current ranges.
async fn prepared_session(
    config: &ConsoleConfig,
    subject: Option<SubjectKey>,
) -> Result<SyncSession<ApiClient>> {
    let client = Arc::new(build_client(config)?);
    let mut session = SyncSession::new(client);
    session.bootstrap();
    session.settle().await;
    if !session.state().snapshot().is_bootstrapped() {
        bail!("Could not load the domain from {}", config.server.url);
    }
    if let Some(key) = subject {
        session.handle(SessionCommand::Open(key));
        session.settle().await;
    }
    Ok(session)
}

async fn submit(
    session: &mut SyncSession<ApiClient>,
    command: impl FnOnce(oneshot::Sender<Result<Submitted, SessionError>>) -> SessionCommand,
) -> Result<Submitted> {
    let (reply, rx) = oneshot::channel();
    session.handle(command(reply));
    session.settle().await;
    let submitted = rx.await.map_err(|_| SessionError::Closed)??;
    Ok(submitted)
}

fn report(what: &str, submitted: &Submitted) {
    if submitted.was_clamped() {
        println!(
            "{what} set to {} (requested {}, clamped)",
            submitted.sent, submitted.requested
        );
    } else {
        println!("{what} set to {}", submitted.sent);
    }
    report_status(&submitted.status);
}

fn report_status(status: &StatusResponse) {
    if status.error.is_some() {
        println!("Server: {}", status.message());
    }
}

pub async fn set_knob(
    config: &ConsoleConfig,
    key: u64,
    value: f64,
    subject: Option<SubjectKey>,
) -> Result<()> {
    let mut session = prepared_session(config, subject).await?;
    let submitted = submit(&mut session, |reply| SessionCommand::SetKnob { key, value, reply })
        .await
        .with_context(|| format!("Failed to set knob {key}"))?;
    report(&format!("Knob {key}"), &submitted);
    Ok(())
}

pub async fn set_histogram(
    config: &ConsoleConfig,
    param: HistogramParam,
    key: u64,
    value: f64,
) -> Result<()> {
    let mut session = prepared_session(config, None).await?;
    let submitted = submit(&mut session, |reply| SessionCommand::SetHistogram {
        param,
        key,
        value,
        reply,
    })
    .await
    .with_context(|| format!("Failed to set histogram {key} {param}"))?;
    report(&format!("Histogram {key} {param}"), &submitted);
    Ok(())
}

pub async fn answer_case(
    config: &ConsoleConfig,
    subject: SubjectKey,
    case: u64,
    answer: u64,
) -> Result<()> {
    let mut session = prepared_session(config, Some(subject)).await?;
    let submitted = submit(&mut session, |reply| SessionCommand::AnswerCase {
        subject,
        case,
        answer,
        reply,
    })
    .await
    .with_context(|| format!("Failed to answer case {case} of subject {subject}"))?;
    report(&format!("Case {case} answer"), &submitted);
    Ok(())
}

/// Seconds since the epoch, with millisecond precision.
fn now_seconds() -> f64 {
    chrono::Utc::now().timestamp_millis() as f64 / 1000.0
}

pub async fn set_time(config: &ConsoleConfig, time: Option<f64>) -> Result<()> {
    let client = build_client(config)?;
    let time = time.unwrap_or_else(now_seconds);
    let status = client
        .set_time(&SetTimeRequest { time })
        .await
        .context("Failed to set server time")?;

    let shown = chrono::DateTime::from_timestamp_millis((time * 1000.0) as i64)
        .map(|t| t.to_rfc3339())
        .unwrap_or_else(|| time.to_string());
    println!("Server time set to {shown}");
    report_status(&status);
    Ok(())
}
