//! Run configuration and the duration syntax shared with the CLI.

use anyhow::{Context as _, Result, anyhow};
use std::time::Duration;

/// Terminator appended to every scripted input line.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LineEnding {
    #[default]
    Lf,
    CrLf,
}

impl LineEnding {
    pub fn as_str(self) -> &'static str {
        match self {
            LineEnding::Lf => "\n",
            LineEnding::CrLf => "\r\n",
        }
    }
}

/// Settings for one run of the driver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunConfig {
    /// Wall-clock time after spawn before the one-off stall advisory.
    pub stall_timeout: Duration,
    /// How long a prompt read waits for each character after the first.
    pub prompt_idle: Duration,
    pub line_ending: LineEnding,
    /// Arguments passed to the executable.
    pub args: Vec<String>,
    /// Time the child gets to exit after its stdin is closed at the end of
    /// a completed run, before it is killed.
    pub shutdown_grace: Duration,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            stall_timeout: Duration::from_secs(5),
            prompt_idle: Duration::from_millis(250),
            line_ending: LineEnding::Lf,
            args: Vec::new(),
            shutdown_grace: Duration::from_millis(500),
        }
    }
}

impl RunConfig {
    pub fn with_stall_timeout(mut self, timeout: Duration) -> Self {
        self.stall_timeout = timeout;
        self
    }

    pub fn with_prompt_idle(mut self, idle: Duration) -> Self {
        self.prompt_idle = idle;
        self
    }

    pub fn with_line_ending(mut self, line_ending: LineEnding) -> Self {
        self.line_ending = line_ending;
        self
    }

    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_shutdown_grace(mut self, grace: Duration) -> Self {
        self.shutdown_grace = grace;
        self
    }
}

/// Parse a duration string: `1s`, `500ms`, `1.5s`.
pub fn parse_duration(s: &str) -> Result<Duration> {
    let s = s.trim();
    if let Some(ms_str) = s.strip_suffix("ms") {
        let ms: u64 = ms_str
            .trim()
            .parse()
            .context("Invalid milliseconds value")?;
        Ok(Duration::from_millis(ms))
    } else if let Some(s_str) = s.strip_suffix('s') {
        let secs: f64 = s_str.trim().parse().context("Invalid seconds value")?;
        Duration::try_from_secs_f64(secs).context("Invalid seconds value")
    } else {
        Err(anyhow!("Duration must end with 's' or 'ms', got: {}", s))
    }
}
