use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

pub const DEFAULT_HELPER_PATH: &str = "/usr/lib/upkeep/upkeep-helper";

const DEFAULT_RUN_LIMIT_SECS: u64 = 30;
const DEFAULT_CONFIRM_LIMIT_SECS: u64 = 20;
const DEFAULT_TERMINATE_GRACE_SECS: u64 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(from = "HelperTimeoutsFile")]
pub struct HelperTimeouts {
    pub run_limit: Duration,
    pub confirm_limit: Duration,
    pub terminate_grace: Duration,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct HelperTimeoutsFile {
    run_limit_secs: Option<u64>,
    confirm_limit_secs: Option<u64>,
    terminate_grace_secs: Option<u64>,
}

impl HelperTimeouts {
    pub fn new(run_limit: Duration, confirm_limit: Duration, terminate_grace: Duration) -> Self {
        Self {
            run_limit,
            confirm_limit,
            terminate_grace,
        }
    }
}

impl Default for HelperTimeouts {
    fn default() -> Self {
        Self::new(
            Duration::from_secs(DEFAULT_RUN_LIMIT_SECS),
            Duration::from_secs(DEFAULT_CONFIRM_LIMIT_SECS),
            Duration::from_secs(DEFAULT_TERMINATE_GRACE_SECS),
        )
    }
}

impl From<HelperTimeoutsFile> for HelperTimeouts {
    fn from(value: HelperTimeoutsFile) -> Self {
        let secs = |field: Option<u64>, default: u64| Duration::from_secs(field.unwrap_or(default));
        Self::new(
            secs(value.run_limit_secs, DEFAULT_RUN_LIMIT_SECS),
            secs(value.confirm_limit_secs, DEFAULT_CONFIRM_LIMIT_SECS),
            secs(value.terminate_grace_secs, DEFAULT_TERMINATE_GRACE_SECS),
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HelperConfig {
    pub executable: PathBuf,
    pub leading_args: Vec<OsString>,
    pub process_name: String,
    pub timeouts: HelperTimeouts,
}

impl HelperConfig {
    pub fn new(executable: impl Into<PathBuf>) -> Self {
        let executable = executable.into();
        let process_name = process_name_for(&executable);
        Self {
            executable,
            leading_args: Vec::new(),
            process_name,
            timeouts: HelperTimeouts::default(),
        }
    }

    pub fn with_leading_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        self.leading_args = args.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_process_name(mut self, process_name: impl Into<String>) -> Self {
        self.process_name = process_name.into();
        self
    }

    pub fn with_timeouts(mut self, timeouts: HelperTimeouts) -> Self {
        self.timeouts = timeouts;
        self
    }
}

impl Default for HelperConfig {
    fn default() -> Self {
        Self::new(DEFAULT_HELPER_PATH)
    }
}

fn process_name_for(executable: &Path) -> String {
    executable
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| executable.display().to_string())
}
