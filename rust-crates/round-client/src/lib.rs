pub mod abi;
pub mod chain;
pub mod config;
pub mod error;
pub mod events;
pub mod orchestrator;
pub mod round;
pub mod rpc;

pub use error::{
    Error,
    Result,
};
pub use orchestrator::{
    OrchestratorConfig,
    RoundOrchestrator,
};
pub use round::{
    ActionState,
    BetBounds,
    Choice,
    Round,
    RoundId,
};

use std::path::Path;
use tracing_appender::{
    non_blocking::WorkerGuard,
    rolling,
};
use tracing_subscriber::EnvFilter;

const LOG_FILE_NAME: &str = "big-or-small.log";
const DEFAULT_LOG_FILTER: &str = "info";

/// Installs the global subscriber. Logs go to stderr, or to
/// `<log_dir>/big-or-small.log` when a directory is given; keep the returned
/// guard alive so buffered file output is flushed on exit.
pub fn init_tracing(log_dir: Option<&Path>) -> Option<WorkerGuard> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    match log_dir {
        Some(dir) => {
            let appender = rolling::never(dir, LOG_FILE_NAME);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let installed = tracing_subscriber::fmt()
                .with_ansi(false)
                .with_target(false)
                .with_env_filter(filter)
                .with_writer(writer)
                .try_init();
            report_install(installed);
            Some(guard)
        }
        None => {
            let installed = tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .try_init();
            report_install(installed);
            None
        }
    }
}

/// Returns whether the subscriber was installed; a failure goes to stderr
/// because there is no subscriber to log it through.
fn report_install<E: std::fmt::Display>(installed: Result<(), E>) -> bool {
    match installed {
        Ok(()) => true,
        Err(err) => {
            eprintln!("failed to install log subscriber: {err}");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(non_snake_case)]
    use super::*;

    #[test]
    fn report_install__failed_install__is_reported() {
        assert!(report_install::<&str>(Ok(())));
        assert!(!report_install(Err("a global default trace dispatcher has already been set")));
    }

    #[test]
    fn init_tracing__second_install__does_not_panic() {
        // given
        let _ = init_tracing(None);

        // when
        let guard = init_tracing(None);

        // then
        assert!(guard.is_none());
    }
}
