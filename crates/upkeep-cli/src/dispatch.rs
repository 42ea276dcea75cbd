use std::path::Path;

use anyhow::{anyhow, bail, Context, Result};
use tracing_appender::non_blocking::WorkerGuard;
use upkeep_core::{PackageRef, UpdateDescriptor};
use upkeep_supervisor::{HelperError, UpdateSession};

use crate::completion::print_completions;
use crate::config::AppConfig;
use crate::logging::{init_logging, log_file_path};
use crate::render::{
    current_output_style, format_update_lines, format_updates_json, render_status_line,
    HelperActivity, OutputStyle,
};
use crate::{Cli, Commands};

struct HelperRun {
    session: UpdateSession,
    _log_guard: Option<WorkerGuard>,
}

impl HelperRun {
    fn start(helper: Option<&Path>, config_path: Option<&Path>) -> Result<Self> {
        let log_guard = match init_logging() {
            Ok(guard) => Some(guard),
            Err(err) => {
                eprintln!("upkeep: logging disabled: {err:#}");
                None
            }
        };
        tracing::info!("upkeep starting");

        let config = AppConfig::load(config_path)?;
        Ok(Self {
            session: UpdateSession::new(config.helper_config(helper)),
            _log_guard: log_guard,
        })
    }
}

pub(crate) fn run_cli(cli: Cli) -> Result<()> {
    let helper = cli.helper.as_deref();
    let config_path = cli.config.as_deref();
    let output_style = current_output_style();

    match cli.command {
        Commands::Refresh => {
            let mut run = HelperRun::start(helper, config_path)?;
            refresh(&mut run.session, output_style);
        }
        Commands::List { refresh: first, json } => {
            let mut run = HelperRun::start(helper, config_path)?;
            if first {
                refresh(&mut run.session, output_style);
            }
            let updates = fetch_updates(&mut run.session, output_style);
            if json {
                println!("{}", format_updates_json(updates)?);
            } else {
                for line in format_update_lines(updates) {
                    println!("{line}");
                }
            }
        }
        Commands::Install { refs, all, dry_run } => {
            let requested = refs
                .iter()
                .map(|raw| PackageRef::parse(raw))
                .collect::<Result<Vec<_>>>()?;
            if requested.is_empty() && !all {
                bail!("no updates selected: pass one or more refs, or --all");
            }

            let mut run = HelperRun::start(helper, config_path)?;
            let pending = fetch_updates(&mut run.session, output_style).to_vec();
            let selected = select_updates(&pending, &requested, all)?;
            if selected.is_empty() {
                println!("No updates available");
                return Ok(());
            }

            if dry_run {
                for line in format_update_lines(&selected) {
                    println!("{line}");
                }
                return Ok(());
            }

            install(&mut run.session, &selected, output_style)?;
        }
        Commands::Completions { shell } => {
            print_completions(shell)?;
        }
    }

    Ok(())
}

fn refresh(session: &mut UpdateSession, output_style: OutputStyle) {
    let activity = HelperActivity::start(output_style, "refreshing package metadata");
    let result = session.refresh();
    activity.finish();
    match result {
        Ok(()) => println!(
            "{}",
            render_status_line(output_style, "ok", "package metadata refreshed")
        ),
        Err(err) => eprintln!(
            "{}",
            render_status_line(output_style, "warn", &format!("refresh failed: {err}"))
        ),
    }
}

fn fetch_updates(session: &mut UpdateSession, output_style: OutputStyle) -> &[UpdateDescriptor] {
    let activity = HelperActivity::start(output_style, "checking for updates");
    let result = session.fetch_updates().map(|_| ());
    activity.finish();
    if let Err(err) = result {
        let reason = match &err {
            HelperError::Reported(message) => format!("helper reported an error: {message}"),
            other => other.to_string(),
        };
        eprintln!(
            "{}",
            render_status_line(output_style, "warn", &format!("no updates: {reason}"))
        );
    }
    session.updates()
}

pub(crate) fn select_updates(
    pending: &[UpdateDescriptor],
    requested: &[PackageRef],
    all: bool,
) -> Result<Vec<UpdateDescriptor>> {
    if all {
        return Ok(pending.to_vec());
    }

    requested
        .iter()
        .map(|package_ref| {
            pending
                .iter()
                .find(|update| &update.package_ref == package_ref)
                .cloned()
                .ok_or_else(|| anyhow!("no pending update for {package_ref}"))
        })
        .collect()
}

fn install(
    session: &mut UpdateSession,
    selected: &[UpdateDescriptor],
    output_style: OutputStyle,
) -> Result<()> {
    let refs = selected
        .iter()
        .map(|update| update.package_ref.clone())
        .collect::<Vec<_>>();
    println!(
        "{}",
        render_status_line(
            output_style,
            "install",
            &format!("{} update(s)", refs.len())
        )
    );

    if let Err(err) = session.install_updates(&refs) {
        let message = session
            .error()
            .map(str::to_string)
            .unwrap_or_else(|| err.to_string());
        let log_hint = log_file_path()
            .map(|path| format!(" (see {})", path.display()))
            .unwrap_or_default();
        return Err(anyhow!(message)).with_context(|| format!("updates failed{log_hint}"));
    }

    println!(
        "{}",
        render_status_line(output_style, "done", "updates complete")
    );
    Ok(())
}
