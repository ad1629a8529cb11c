use std::fmt;
use std::time::Duration;

/// Whether a reported line came from the program or from the script.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineKind {
    Output,
    Input,
}

/// The outcome of one script line, reported in script order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineReport {
    /// Index into the script.
    pub index: usize,
    pub kind: LineKind,
    /// Captured output, or the text sent for input. `None` when the
    /// program's output ended before anything was read.
    pub actual: Option<String>,
    /// The script's raw text for this line.
    pub expected: String,
    /// Displayed on the same visual line as the previous report.
    pub continuation: bool,
    /// Input lines always count as matched.
    pub matched: bool,
}

impl LineReport {
    /// Text to show for this line.
    pub fn display_text(&self) -> &str {
        self.actual.as_deref().unwrap_or("")
    }
}

/// Final tally of a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Summary {
    /// Visual output lines compared.
    pub compared: usize,
    /// Visual output lines whose every part matched.
    pub matched: usize,
    pub stopped: bool,
}

impl Summary {
    pub fn all_matched(&self) -> bool {
        !self.stopped && self.matched == self.compared
    }

    pub fn mismatched(&self) -> usize {
        self.compared - self.matched
    }
}

impl fmt::Display for Summary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{} lines matched", self.matched, self.compared)?;
        if self.stopped {
            write!(f, " (stopped)")?;
        }
        Ok(())
    }
}

/// Messages a run sends to its caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunEvent {
    /// The child process is running.
    Started { pid: Option<u32> },
    Line(LineReport),
    /// A line the program wrote to stderr. Never compared.
    Diagnostic(String),
    /// The run has been going for this long; probably an input/output
    /// mismatch or an infinite loop. Sent at most once.
    Stalled(Duration),
    Finished(Summary),
}
