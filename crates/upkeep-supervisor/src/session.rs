use std::process::Child;
use std::sync::{Arc, Mutex};

use upkeep_core::{parse_update_list, PackageRef, UpdateDescriptor};

use crate::config::HelperConfig;
use crate::error::HelperError;
use crate::launcher::{self, force_kill};
use crate::protocol::{
    unexpected_reply, FetchOutput, HelperChannel, HelperReply, SupervisorCommand,
};
use crate::timeout::{lock_unpoisoned, GuardOutcome, ResponseTimeout};

const REFRESH_ARG: &str = "--refresh";
const FETCH_UPDATES_ARG: &str = "--fetch-updates";
const UPDATE_PACKAGES_ARG: &str = "--update-packages";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Refreshing,
    FetchingUpdates,
    AwaitingReady,
    AwaitingConfirm,
    Confirmed,
    Installing,
    Terminated,
}

impl SessionState {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Refreshing => "refreshing",
            Self::FetchingUpdates => "fetching-updates",
            Self::AwaitingReady => "awaiting-ready",
            Self::AwaitingConfirm => "awaiting-confirm",
            Self::Confirmed => "confirmed",
            Self::Installing => "installing",
            Self::Terminated => "terminated",
        }
    }
}

#[derive(Debug)]
pub struct UpdateSession {
    config: HelperConfig,
    // Shared only with an armed response timeout.
    helper: Arc<Mutex<Option<Child>>>,
    channel: Option<HelperChannel>,
    state: SessionState,
    updates: Vec<UpdateDescriptor>,
    error: Option<String>,
}

impl UpdateSession {
    pub fn new(config: HelperConfig) -> Self {
        Self {
            config,
            helper: Arc::new(Mutex::new(None)),
            channel: None,
            state: SessionState::Idle,
            updates: Vec::new(),
            error: None,
        }
    }

    pub fn config(&self) -> &HelperConfig {
        &self.config
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn updates(&self) -> &[UpdateDescriptor] {
        &self.updates
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn helper_pid(&self) -> Option<u32> {
        lock_unpoisoned(&self.helper).as_ref().map(Child::id)
    }

    pub fn is_helper_running(&self) -> bool {
        let mut helper = lock_unpoisoned(&self.helper);
        matches!(helper.as_mut().map(Child::try_wait), Some(Ok(None)))
    }

    pub fn refresh(&mut self) -> Result<(), HelperError> {
        tracing::info!("refreshing package metadata");
        self.terminate_helper();
        self.state = SessionState::Refreshing;

        let result =
            launcher::run_to_completion(&self.config, [REFRESH_ARG], "refresh").map(|_| ());
        self.state = SessionState::Idle;
        if let Err(err) = &result {
            tracing::warn!("refresh failed: {err}");
        }
        result
    }

    pub fn fetch_updates(&mut self) -> Result<&[UpdateDescriptor], HelperError> {
        tracing::info!("generating updates");
        self.terminate_helper();
        self.updates.clear();
        self.error = None;
        self.state = SessionState::FetchingUpdates;

        let result = self.collect_updates();
        self.state = SessionState::Idle;
        match result {
            Ok(updates) => {
                tracing::info!("done generating updates: {} available", updates.len());
                self.updates = updates;
                Ok(self.updates.as_slice())
            }
            Err(err) => {
                if let HelperError::Reported(message) = &err {
                    self.error = Some(message.clone());
                    tracing::warn!("error from fetch-updates call: {message}");
                } else {
                    tracing::warn!("no updates: {err}");
                }
                Err(err)
            }
        }
    }

    fn collect_updates(&self) -> Result<Vec<UpdateDescriptor>, HelperError> {
        let Some(output) =
            launcher::run_to_completion(&self.config, [FETCH_UPDATES_ARG], "fetch-updates")?
        else {
            return Ok(Vec::new());
        };

        match FetchOutput::classify(&output) {
            FetchOutput::Empty => Ok(Vec::new()),
            FetchOutput::Error(message) => Err(HelperError::Reported(message.to_string())),
            FetchOutput::Json(json) => {
                parse_update_list(json).map_err(|err| HelperError::Parse(format!("{err:#}")))
            }
        }
    }

    pub fn prepare_start_updates(&mut self, selected: &[PackageRef]) -> Result<(), HelperError> {
        self.terminate_helper();
        self.error = None;

        if selected.is_empty() {
            self.state = SessionState::Idle;
            return Err(HelperError::protocol("prepare", "no updates selected"));
        }

        let mut args = vec![UPDATE_PACKAGES_ARG.to_string()];
        args.extend(selected.iter().map(PackageRef::format_ref));
        tracing::info!("starting helper for {} update(s)", selected.len());

        self.state = SessionState::AwaitingReady;
        match self.launch_and_await_ready(&args) {
            Ok(channel) => {
                self.channel = Some(channel);
                self.state = SessionState::AwaitingConfirm;
                Ok(())
            }
            Err(err) => {
                tracing::warn!("could not set up to install updates: {err}");
                self.terminate_helper();
                self.state = SessionState::Terminated;
                Err(err)
            }
        }
    }

    fn launch_and_await_ready(&mut self, args: &[String]) -> Result<HelperChannel, HelperError> {
        let child = launcher::launch(&self.config, args)?;
        let mut helper = lock_unpoisoned(&self.helper);
        let child = helper.insert(child);
        let (Some(input), Some(output)) = (child.stdin.take(), child.stdout.take()) else {
            return Err(HelperError::protocol("prepare", "helper pipes were not captured"));
        };
        drop(helper);

        let mut channel = HelperChannel::from_pipes(input, output);
        match channel.read_reply("prepare")? {
            HelperReply::Ready => Ok(channel),
            other => Err(unexpected_reply("prepare", "ready", &other)),
        }
    }

    pub fn confirm_start(&mut self) -> Result<(), HelperError> {
        if self.state != SessionState::AwaitingConfirm || self.channel.is_none() {
            return Err(HelperError::NotRunning { step: "confirm" });
        }

        match self.exchange_confirmation() {
            Ok(()) => {
                self.state = SessionState::Confirmed;
                Ok(())
            }
            Err(err) => {
                if err.is_timeout() {
                    tracing::warn!("timed out waiting for confirmation");
                } else {
                    tracing::warn!("could not complete confirmation: {err}");
                }
                self.terminate_helper();
                self.state = SessionState::Terminated;
                Err(err)
            }
        }
    }

    fn exchange_confirmation(&mut self) -> Result<(), HelperError> {
        let step = "confirm";
        let limit = self.config.timeouts.confirm_limit;
        let helper = Arc::clone(&self.helper);
        let process_name = self.config.process_name.clone();
        let channel = self
            .channel
            .as_mut()
            .ok_or(HelperError::NotRunning { step })?;

        channel.send(SupervisorCommand::Confirm, step)?;
        let mut guard = ResponseTimeout::arm(limit, move || {
            launcher::kill_by_name(&process_name);
            if let Some(mut child) = lock_unpoisoned(&helper).take() {
                force_kill(&mut child);
            }
        })
        .map_err(|source| HelperError::Io { step, source })?;

        let reply = channel.read_reply(step);
        if guard.disarm() == GuardOutcome::Expired {
            return Err(HelperError::Timeout { step, limit });
        }
        match reply? {
            HelperReply::Yes => Ok(()),
            other => Err(unexpected_reply(step, "yes", &other)),
        }
    }

    pub fn perform_updates(&mut self) -> Result<(), HelperError> {
        if self.state != SessionState::Confirmed {
            self.terminate_helper();
            return Err(HelperError::NotRunning { step: "perform" });
        }

        self.state = SessionState::Installing;
        let result = self.exchange_start();
        match &result {
            Ok(()) => tracing::info!("updates complete"),
            Err(HelperError::Reported(message)) => {
                self.error = Some(message.clone());
                tracing::warn!("error performing updates: {message}");
            }
            Err(err) => {
                self.error = Some(format!("could not perform updates: {err}"));
                tracing::warn!("could not perform updates: {err}");
            }
        }

        self.terminate_helper();
        self.state = if result.is_ok() {
            SessionState::Idle
        } else {
            SessionState::Terminated
        };
        result
    }

    fn exchange_start(&mut self) -> Result<(), HelperError> {
        let step = "perform";
        let channel = self
            .channel
            .as_mut()
            .ok_or(HelperError::NotRunning { step })?;

        channel.send(SupervisorCommand::Start, step)?;
        match channel.read_reply(step)? {
            HelperReply::Done => Ok(()),
            HelperReply::Error(message) => Err(HelperError::Reported(message)),
            other => Err(unexpected_reply(step, "done", &other)),
        }
    }

    pub fn install_updates(&mut self, selected: &[PackageRef]) -> Result<(), HelperError> {
        self.prepare_start_updates(selected)?;
        self.confirm_start()?;
        self.perform_updates()
    }

    pub fn terminate_helper(&mut self) {
        self.channel = None;

        let mut helper = lock_unpoisoned(&self.helper);
        if let Some(child) = helper.as_mut() {
            tracing::debug!(pid = child.id(), "terminating helper");
            launcher::terminate(child, self.config.timeouts.terminate_grace);
        }
        *helper = None;
    }
}

impl Drop for UpdateSession {
    fn drop(&mut self) {
        self.terminate_helper();
    }
}
