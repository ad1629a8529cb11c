//! Error types for script loading and run setup.
//!
//! Comparison mismatches are not errors; they travel as
//! [`LineReport`](crate::event::LineReport)s.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// What was wrong with a script line.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseErrorKind {
    #[error("more than one input tag")]
    MultipleInputTags,
    #[error("input tag not at line end")]
    InputTagNotAtEnd,
    #[error("input tag mixed with numeric tag")]
    InputTagWithNumericTag,
    #[error("unclosed {0} tag")]
    UnclosedTag(&'static str),
    #[error("'{0}' without a matching opening delimiter")]
    StrayCloser(&'static str),
    #[error("nested {0} tag")]
    NestedTag(&'static str),
    #[error("numeric tag must be followed by a space or the end of the line")]
    MissingSpaceAfterTag,
    #[error("numeric tag has no type")]
    MissingType,
    #[error("unknown numeric type '{0}'")]
    UnknownType(String),
    #[error("unknown numeric tag option '{0}'")]
    UnknownOption(String),
    #[error("malformed numeric tag option '{0}' (expected key=value)")]
    MalformedOption(String),
    #[error("option '{0}' given more than once")]
    DuplicateOption(String),
    #[error("'{literal}' is not a valid {kind}")]
    InvalidLiteral { kind: &'static str, literal: String },
    #[error("value set must be written as {{a,b,...}}, got '{0}'")]
    MalformedValueSet(String),
    #[error("value set is empty")]
    EmptyValueSet,
    #[error("precision '{0}' is not an integer between 0 and 15")]
    PrecisionOutOfRange(String),
    #[error("precision only applies to float and double, not {0}")]
    PrecisionNotAllowed(&'static str),
    #[error("min is greater than max")]
    MinAboveMax,
    #[error("unrecognized line (expected '.', ';', '>' or '#' prefix)")]
    UnrecognizedLine,
}

/// A malformed script line. The whole script is rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("line {line}: {kind}: {text:?}")]
pub struct ScriptParseError {
    /// 1-based line number in the source.
    pub line: usize,
    /// The raw source line.
    pub text: String,
    pub kind: ParseErrorKind,
}

impl ScriptParseError {
    pub fn new(line: usize, text: impl Into<String>, kind: ParseErrorKind) -> Self {
        Self {
            line,
            text: text.into(),
            kind,
        }
    }
}

/// Failure to load a script from disk.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to read script file {}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error(transparent)]
    Parse(#[from] ScriptParseError),
}

/// The target program could not be started. No process is left running.
#[derive(Debug, Error)]
pub enum SetupError {
    #[error("executable not found: {}", .0.display())]
    ExecutableNotFound(PathBuf),
    #[error("failed to launch {}", .path.display())]
    Spawn {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("child process has no {0} pipe")]
    MissingPipe(&'static str),
}

/// A run could not produce a summary.
#[derive(Debug, Error)]
pub enum RunError {
    #[error(transparent)]
    Setup(#[from] SetupError),
    #[error("run worker failed")]
    Worker(#[from] tokio::task::JoinError),
}
