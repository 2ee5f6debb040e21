use std::sync::Arc;

use anyhow::{Result, bail};
use eaconsole_core::{ConsoleView, SubjectKey};
use eaconsole_runtime_config::ConsoleConfig;
use eaconsole_sync::{SessionCommand, SessionHandle, SyncSession, spawn_session};
use tokio::sync::oneshot;
use tracing::{info, warn};

use crate::config::build_client;
use crate::output::print_view;

/// How `--open` targets are matched: numeric strings are keys, anything else
/// is a subject name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OpenTarget {
    Key(SubjectKey),
    Name(String),
}

impl OpenTarget {
    pub fn parse(raw: &str) -> Self {
        match raw.trim().parse::<SubjectKey>() {
            Ok(key) => Self::Key(key),
            Err(_) => Self::Name(raw.trim().to_string()),
        }
    }
}

/// Follow the server until interrupted, printing the console on every change.
pub async fn run_watch(config: &ConsoleConfig, open: &[String], json: bool) -> Result<()> {
    let client = Arc::new(build_client(config)?);
    info!(
        server = %config.server.url,
        interval_ms = config.poll.interval_ms,
        "Watching console"
    );
    let handle = spawn_session(client, config.poll.interval());
    let mut view = handle.view();

    let shutdown = wait_for_shutdown();
    tokio::pin!(shutdown);

    if !open.is_empty() {
        // Names resolve against the snapshot, so wait for the first bootstrap.
        tokio::select! {
            ready = view.wait_for(|v| v.label.is_some()) => {
                if ready.is_err() {
                    bail!("Sync session stopped before the domain loaded");
                }
            }
            _ = &mut shutdown => {
                handle.shutdown().await;
                return Ok(());
            }
        }
        open_targets(&handle, open).await?;
    }

    let mut last: Option<ConsoleView> = None;
    loop {
        let current = view.borrow_and_update().clone();
        if last.as_ref() != Some(&current) {
            print_view(&current, json)?;
            last = Some(current);
        }

        tokio::select! {
            changed = view.changed() => {
                if changed.is_err() {
                    warn!("Sync session stopped");
                    break;
                }
            }
            _ = &mut shutdown => {
                info!("Stopping watch");
                break;
            }
        }
    }

    handle.shutdown().await;
    Ok(())
}

async fn open_targets(handle: &SessionHandle, open: &[String]) -> Result<()> {
    for raw in open {
        match OpenTarget::parse(raw) {
            OpenTarget::Key(key) => handle.open(key).await?,
            OpenTarget::Name(name) => {
                if handle.open_named(&name).await?.is_none() {
                    warn!(name = %name, "No subject with that name");
                }
            }
        }
    }
    Ok(())
}

/// Bootstrap, open the requested subjects, let every fetch finish and print
/// the resulting console once.
pub async fn run_once(config: &ConsoleConfig, open: &[String], json: bool) -> Result<()> {
    let client = Arc::new(build_client(config)?);
    let mut session = SyncSession::new(client);

    session.bootstrap();
    session.settle().await;
    if !session.state().snapshot().is_bootstrapped() {
        bail!("Could not load the domain from {}", config.server.url);
    }

    for raw in open {
        match OpenTarget::parse(raw) {
            OpenTarget::Key(key) => {
                session.handle(SessionCommand::Open(key));
            }
            OpenTarget::Name(name) => {
                let (reply, rx) = oneshot::channel();
                session.handle(SessionCommand::OpenNamed {
                    name: name.clone(),
                    reply,
                });
                if !matches!(rx.await, Ok(Some(_))) {
                    warn!(name = %name, "No subject with that name");
                }
            }
        }
    }
    session.settle().await;

    let view = session.subscribe().borrow().clone();
    print_view(&view, json)
}

async fn wait_for_shutdown() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};
        match (
            signal(SignalKind::terminate()),
            signal(SignalKind::interrupt()),
        ) {
            (Ok(mut sigterm), Ok(mut sigint)) => {
                tokio::select! {
                    _ = sigterm.recv() => {},
                    _ = sigint.recv() => {},
                }
            }
            _ => {
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numeric_targets_are_keys() {
        assert_eq!(OpenTarget::parse("41"), OpenTarget::Key(41));
        assert_eq!(OpenTarget::parse(" 7 "), OpenTarget::Key(7));
    }

    #[test]
    fn other_targets_are_names() {
        assert_eq!(
            OpenTarget::parse("AHU-2"),
            OpenTarget::Name("AHU-2".to_string())
        );
        assert_eq!(OpenTarget::parse("-3"), OpenTarget::Name("-3".to_string()));
    }
}
