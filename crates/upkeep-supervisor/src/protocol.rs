use std::fmt;
use std::io::{BufRead, BufReader, Write};
use std::process::{ChildStdin, ChildStdout};

use crate::error::HelperError;

pub const ERROR_PREFIX: &str = "error:";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SupervisorCommand {
    Confirm,
    Start,
}

impl SupervisorCommand {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Confirm => "confirm",
            Self::Start => "start",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HelperReply {
    Ready,
    Yes,
    No,
    Done,
    Error(String),
    Other(String),
}

impl HelperReply {
    pub fn parse(line: &str) -> Self {
        let token = strip_line_ending(line);
        if let Some(message) = token.strip_prefix(ERROR_PREFIX) {
            return Self::Error(message.to_string());
        }
        match token {
            "ready" => Self::Ready,
            "yes" => Self::Yes,
            "no" => Self::No,
            "done" => Self::Done,
            other => Self::Other(other.to_string()),
        }
    }
}

impl fmt::Display for HelperReply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ready => f.write_str("ready"),
            Self::Yes => f.write_str("yes"),
            Self::No => f.write_str("no"),
            Self::Done => f.write_str("done"),
            Self::Error(message) => write!(f, "{ERROR_PREFIX}{message}"),
            Self::Other(token) => f.write_str(token),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchOutput<'a> {
    Empty,
    Error(&'a str),
    Json(&'a str),
}

impl<'a> FetchOutput<'a> {
    pub fn classify(output: &'a str) -> Self {
        if output.trim().is_empty() {
            return Self::Empty;
        }
        match output.strip_prefix(ERROR_PREFIX) {
            Some(message) => Self::Error(message.trim_end_matches(['\r', '\n'])),
            None => Self::Json(output),
        }
    }
}

#[derive(Debug)]
pub struct LineChannel<W, R> {
    input: W,
    output: R,
}

pub(crate) type HelperChannel = LineChannel<ChildStdin, BufReader<ChildStdout>>;

impl HelperChannel {
    pub(crate) fn from_pipes(input: ChildStdin, output: ChildStdout) -> Self {
        Self::new(input, BufReader::new(output))
    }
}

impl<W: Write, R: BufRead> LineChannel<W, R> {
    pub fn new(input: W, output: R) -> Self {
        Self { input, output }
    }

    pub fn send(&mut self, command: SupervisorCommand, step: &'static str) -> Result<(), HelperError> {
        writeln!(self.input, "{}", command.as_str())
            .and_then(|()| self.input.flush())
            .map_err(|source| HelperError::Io { step, source })
    }

    pub fn read_reply(&mut self, step: &'static str) -> Result<HelperReply, HelperError> {
        let mut line = String::new();
        match self.output.read_line(&mut line) {
            Ok(0) => Err(HelperError::protocol(step, "unexpected end of stream")),
            Ok(_) => {
                let reply = HelperReply::parse(&line);
                tracing::debug!("helper replied '{reply}' during {step}");
                Ok(reply)
            }
            Err(source) => Err(HelperError::Io { step, source }),
        }
    }

    pub fn into_inner(self) -> (W, R) {
        (self.input, self.output)
    }
}

pub(crate) fn unexpected_reply(
    step: &'static str,
    expected: &str,
    reply: &HelperReply,
) -> HelperError {
    HelperError::protocol(
        step,
        format!("unexpected response from helper - expected '{expected}', got '{reply}'"),
    )
}

fn strip_line_ending(line: &str) -> &str {
    let line = line.strip_suffix('\n').unwrap_or(line);
    line.strip_suffix('\r').unwrap_or(line)
}
