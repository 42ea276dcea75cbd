mod config;
mod error;
mod launcher;
mod protocol;
mod session;
mod timeout;

pub use config::{HelperConfig, HelperTimeouts, DEFAULT_HELPER_PATH};
pub use error::HelperError;
pub use launcher::{kill_by_name, launch, run_to_completion, terminate};
pub use protocol::{FetchOutput, HelperReply, LineChannel, SupervisorCommand};
pub use session::{SessionState, UpdateSession};
pub use timeout::{GuardOutcome, ResponseTimeout};
