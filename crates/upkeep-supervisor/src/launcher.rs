use std::ffi::OsStr;
use std::io::Read;
use std::process::{Child, Command, Stdio};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread;
use std::time::{Duration, Instant};

use wait_timeout::ChildExt;

use crate::config::HelperConfig;
use crate::error::HelperError;

pub fn kill_by_name(process_name: &str) {
    let status = Command::new("killall")
        .arg("-q")
        .arg(process_name)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status();
    match status {
        Ok(status) if status.success() => {
            tracing::info!("killed lingering helper instances named {process_name}");
        }
        Ok(status) => {
            tracing::debug!("no helper instances named {process_name} were killed ({status})");
        }
        Err(err) => {
            tracing::warn!("could not run killall for {process_name}: {err}");
        }
    }
}

fn helper_command<I, S>(config: &HelperConfig, args: I) -> Command
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    let mut command = Command::new(&config.executable);
    command.args(&config.leading_args).args(args);
    // Helper and anything it forks share one group, so a kill reaches
    // grandchildren still holding the stdout pipe.
    #[cfg(unix)]
    {
        use std::os::unix::process::CommandExt;
        command.process_group(0);
    }
    command
}

pub fn launch<I, S>(config: &HelperConfig, args: I) -> Result<Child, HelperError>
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    kill_by_name(&config.process_name);

    let child = helper_command(config, args)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::inherit())
        .spawn()
        .map_err(|source| HelperError::Launch {
            executable: config.executable.clone(),
            source,
        })?;
    tracing::debug!(pid = child.id(), "launched helper");
    Ok(child)
}

pub fn run_to_completion<I, S>(
    config: &HelperConfig,
    args: I,
    step: &'static str,
) -> Result<Option<String>, HelperError>
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    kill_by_name(&config.process_name);

    let mut child = helper_command(config, args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::inherit())
        .spawn()
        .map_err(|source| HelperError::Launch {
            executable: config.executable.clone(),
            source,
        })?;

    let Some(mut stdout) = child.stdout.take() else {
        force_kill(&mut child);
        return Err(HelperError::protocol(step, "helper stdout was not captured"));
    };
    // Drained concurrently so a large payload cannot fill the pipe and stall
    // the helper before it exits.
    let limit = config.timeouts.run_limit;
    let deadline = Instant::now() + limit;
    let (output_tx, output_rx) = mpsc::channel();
    let reader = thread::Builder::new()
        .name("upkeep-helper-stdout".to_string())
        .spawn(move || {
            let mut buffer = Vec::new();
            let result = stdout.read_to_end(&mut buffer).map(|_| buffer);
            let _ = output_tx.send(result);
        });
    if let Err(source) = reader {
        force_kill(&mut child);
        return Err(HelperError::Io { step, source });
    }

    match child.wait_timeout(limit) {
        Ok(Some(status)) => tracing::debug!("helper {step} exited with {status}"),
        Ok(None) => {
            force_kill(&mut child);
            return Err(HelperError::Timeout { step, limit });
        }
        Err(source) => {
            force_kill(&mut child);
            return Err(HelperError::Io { step, source });
        }
    }

    // A process the helper left behind may keep the pipe open after exit.
    let remaining = deadline.saturating_duration_since(Instant::now());
    let buffer = match output_rx.recv_timeout(remaining) {
        Ok(result) => result.map_err(|source| HelperError::Io { step, source })?,
        Err(RecvTimeoutError::Timeout) => {
            tracing::warn!("helper {step} exited but its output stayed open past {limit:?}");
            kill_process_group(child.id());
            return Err(HelperError::Timeout { step, limit });
        }
        Err(RecvTimeoutError::Disconnected) => {
            return Err(HelperError::protocol(step, "helper stdout reader panicked"));
        }
    };
    let output = String::from_utf8(buffer)
        .map_err(|err| HelperError::protocol(step, format!("helper output is not UTF-8: {err}")))?;

    if output.trim().is_empty() {
        Ok(None)
    } else {
        Ok(Some(output))
    }
}

pub fn terminate(child: &mut Child, grace: Duration) {
    match child.try_wait() {
        Ok(Some(status)) => {
            tracing::debug!("helper already exited with {status}");
            kill_process_group(child.id());
            return;
        }
        Ok(None) => {}
        Err(err) => tracing::debug!("could not poll helper status: {err}"),
    }

    request_termination(child);
    match child.wait_timeout(grace) {
        Ok(Some(status)) => {
            tracing::debug!("helper exited with {status}");
            kill_process_group(child.id());
        }
        Ok(None) => {
            tracing::warn!(
                "helper did not exit within {grace:?} of termination request; killing it"
            );
            force_kill(child);
        }
        Err(err) => {
            tracing::warn!("failed waiting for helper to exit: {err}");
            force_kill(child);
        }
    }
}

pub(crate) fn force_kill(child: &mut Child) {
    kill_process_group(child.id());
    let _ = child.kill();
    let _ = child.wait();
}

#[cfg(unix)]
fn group_id(pid: u32) -> Option<nix::unistd::Pid> {
    i32::try_from(pid).ok().map(nix::unistd::Pid::from_raw)
}

#[cfg(unix)]
fn kill_process_group(pid: u32) {
    use nix::errno::Errno;
    use nix::sys::signal::{killpg, Signal};

    let Some(group) = group_id(pid) else {
        return;
    };
    match killpg(group, Signal::SIGKILL) {
        Ok(()) | Err(Errno::ESRCH) => {}
        Err(err) => tracing::debug!("failed to kill helper process group {group}: {err}"),
    }
}

#[cfg(not(unix))]
fn kill_process_group(_pid: u32) {}

#[cfg(unix)]
fn request_termination(child: &mut Child) {
    use nix::sys::signal::{killpg, Signal};

    let Some(group) = group_id(child.id()) else {
        let _ = child.kill();
        return;
    };
    if let Err(err) = killpg(group, Signal::SIGTERM) {
        tracing::debug!("failed to send SIGTERM to helper process group {group}: {err}");
    }
}

#[cfg(not(unix))]
fn request_termination(child: &mut Child) {
    let _ = child.kill();
}
