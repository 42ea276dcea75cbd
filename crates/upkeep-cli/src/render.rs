use std::io::IsTerminal;
use std::time::Duration;

use anstyle::{AnsiColor, Effects, Style};
use indicatif::{HumanBytes, ProgressBar, ProgressStyle};
use upkeep_core::{total_download_size, UpdateDescriptor, UpdateOperation};

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub(crate) enum OutputStyle {
    Plain,
    Rich,
}

pub(crate) fn current_output_style() -> OutputStyle {
    resolve_output_style(std::io::stdout().is_terminal())
}

pub(crate) fn resolve_output_style(stdout_is_tty: bool) -> OutputStyle {
    if stdout_is_tty {
        OutputStyle::Rich
    } else {
        OutputStyle::Plain
    }
}

pub(crate) fn render_status_line(style: OutputStyle, status: &str, message: &str) -> String {
    match style {
        OutputStyle::Plain => format!("{status}: {message}"),
        OutputStyle::Rich => format!(
            "{} {message}",
            colorize(status_style(status), &format!("{status:>7}"))
        ),
    }
}

pub(crate) struct HelperActivity {
    progress_bar: Option<ProgressBar>,
}

impl HelperActivity {
    pub(crate) fn start(style: OutputStyle, message: &str) -> Self {
        let progress_bar = (style == OutputStyle::Rich).then(|| {
            let progress_bar = ProgressBar::new_spinner();
            if let Ok(spinner) = ProgressStyle::with_template("{spinner:.cyan.bold} {msg}") {
                progress_bar.set_style(spinner.tick_chars("<^>v "));
            }
            progress_bar.set_message(message.to_string());
            progress_bar.enable_steady_tick(Duration::from_millis(80));
            progress_bar
        });
        Self { progress_bar }
    }

    pub(crate) fn finish(mut self) {
        if let Some(progress_bar) = self.progress_bar.take() {
            progress_bar.finish_and_clear();
        }
    }
}

impl Drop for HelperActivity {
    fn drop(&mut self) {
        if let Some(progress_bar) = self.progress_bar.take() {
            progress_bar.finish_and_clear();
        }
    }
}

pub(crate) fn format_update_lines(updates: &[UpdateDescriptor]) -> Vec<String> {
    if updates.is_empty() {
        return vec!["No updates available".to_string()];
    }

    let mut lines = updates.iter().map(format_update_line).collect::<Vec<_>>();
    lines.push(format!(
        "{} update(s), {} to download",
        updates.len(),
        HumanBytes(total_download_size(updates))
    ));
    lines
}

fn format_update_line(update: &UpdateDescriptor) -> String {
    let versions = match (&update.old_version, &update.new_version) {
        (Some(old), Some(new)) => format!("{old} -> {new}"),
        (None, Some(new)) => new.clone(),
        (Some(old), None) => old.clone(),
        (None, None) => "-".to_string(),
    };
    let marker = match update.operation {
        UpdateOperation::Update => "",
        UpdateOperation::Install => " [new]",
    };
    format!(
        "{}{marker} {versions} ({}) {}",
        update.display_name,
        HumanBytes(update.download_size),
        update.format_ref()
    )
}

pub(crate) fn format_updates_json(updates: &[UpdateDescriptor]) -> serde_json::Result<String> {
    let values = updates
        .iter()
        .map(UpdateDescriptor::to_json)
        .collect::<Vec<_>>();
    serde_json::to_string_pretty(&values)
}

fn status_style(status: &str) -> Style {
    let color = match status {
        "ok" | "done" => AnsiColor::BrightGreen,
        "warn" => AnsiColor::BrightYellow,
        "error" => AnsiColor::BrightRed,
        _ => AnsiColor::BrightCyan,
    };
    Style::new()
        .fg_color(Some(color.into()))
        .effects(Effects::BOLD)
}

fn colorize(style: Style, text: &str) -> String {
    format!("{}{}{}", style.render(), text, style.render_reset())
}
