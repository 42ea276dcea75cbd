use std::ffi::OsString;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;
use upkeep_supervisor::{HelperConfig, HelperTimeouts, DEFAULT_HELPER_PATH};

use crate::logging::config_home;

pub(crate) const CONFIG_FILE_NAME: &str = "config.toml";

#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub(crate) struct AppConfig {
    pub(crate) helper: HelperSection,
    pub(crate) timeouts: HelperTimeouts,
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub(crate) struct HelperSection {
    pub(crate) executable: PathBuf,
    pub(crate) process_name: Option<String>,
    pub(crate) leading_args: Vec<String>,
}

impl Default for HelperSection {
    fn default() -> Self {
        Self {
            executable: PathBuf::from(DEFAULT_HELPER_PATH),
            process_name: None,
            leading_args: Vec::new(),
        }
    }
}

impl AppConfig {
    pub(crate) fn from_toml_str(input: &str) -> Result<Self> {
        toml::from_str(input).context("failed to parse upkeep config")
    }

    pub(crate) fn load(path: Option<&Path>) -> Result<Self> {
        let (path, required) = match path {
            Some(path) => (path.to_path_buf(), true),
            None => (default_config_path()?, false),
        };

        match fs::read_to_string(&path) {
            Ok(raw) => Self::from_toml_str(&raw)
                .with_context(|| format!("invalid config file: {}", path.display())),
            Err(err) if err.kind() == io::ErrorKind::NotFound && !required => {
                tracing::debug!("no config at {}; using defaults", path.display());
                Ok(Self::default())
            }
            Err(err) => {
                Err(err).with_context(|| format!("failed to read config file: {}", path.display()))
            }
        }
    }

    pub(crate) fn helper_config(&self, executable_override: Option<&Path>) -> HelperConfig {
        let executable = executable_override
            .map(Path::to_path_buf)
            .unwrap_or_else(|| self.helper.executable.clone());

        let mut config = HelperConfig::new(executable)
            .with_leading_args(self.helper.leading_args.iter().map(OsString::from))
            .with_timeouts(self.timeouts);
        // An explicit --helper names its own process.
        if executable_override.is_none() {
            if let Some(process_name) = &self.helper.process_name {
                config = config.with_process_name(process_name.clone());
            }
        }
        config
    }
}

pub(crate) fn default_config_path() -> Result<PathBuf> {
    Ok(config_home()?.join(CONFIG_FILE_NAME))
}
