use std::io;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum HelperError {
    #[error("failed to launch helper {}: {source}", .executable.display())]
    Launch {
        executable: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("protocol violation during {step}: {detail}")]
    Protocol { step: &'static str, detail: String },
    #[error("helper did not respond to {step} within {limit:?}")]
    Timeout { step: &'static str, limit: Duration },
    #[error("{0}")]
    Reported(String),
    #[error("unable to parse updates list: {0}")]
    Parse(String),
    #[error("helper i/o failed during {step}: {source}")]
    Io {
        step: &'static str,
        #[source]
        source: io::Error,
    },
    #[error("no helper is ready for {step}")]
    NotRunning { step: &'static str },
}

impl HelperError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }

    pub(crate) fn protocol(step: &'static str, detail: impl Into<String>) -> Self {
        Self::Protocol {
            step,
            detail: detail.into(),
        }
    }
}
