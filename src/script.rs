//! The parsed form of a script: an ordered list of expected outputs and
//! scripted inputs.

use crate::numeric::NumericElement;

/// Whether an expected output ends with a line break.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Terminator {
    LineTerminated,
    /// A prompt: the program prints it without a newline, then reads input.
    SameLine,
}

/// One positional piece of an expected output line.
#[derive(Debug, Clone, PartialEq)]
pub enum OutputElement {
    Text(String),
    Numeric(NumericElement),
}

/// A line the target program is expected to print.
#[derive(Debug, Clone, PartialEq)]
pub struct OutputExpectation {
    /// Source text, kept for reporting.
    pub raw_text: String,
    pub terminator: Terminator,
    pub elements: Vec<OutputElement>,
}

impl OutputExpectation {
    /// A line-terminated expectation with mixed elements.
    pub fn line(raw_text: impl Into<String>, elements: Vec<OutputElement>) -> Self {
        Self {
            raw_text: raw_text.into(),
            terminator: Terminator::LineTerminated,
            elements,
        }
    }

    /// A same-line prompt. Prompts are literal text only.
    pub fn prompt(text: impl Into<String>) -> Self {
        let text = text.into();
        Self {
            elements: vec![OutputElement::Text(text.clone())],
            raw_text: text,
            terminator: Terminator::SameLine,
        }
    }

    /// A line-terminated expectation of exactly `text`.
    pub fn literal(text: impl Into<String>) -> Self {
        let text = text.into();
        let elements = if text.is_empty() {
            Vec::new()
        } else {
            vec![OutputElement::Text(text.clone())]
        };
        Self::line(text, elements)
    }

    /// Number of characters a same-line read may consume.
    pub fn literal_len(&self) -> usize {
        self.raw_text.chars().count()
    }

    pub fn has_numeric(&self) -> bool {
        self.elements
            .iter()
            .any(|element| matches!(element, OutputElement::Numeric(_)))
    }
}

/// A line of text sent to the program's stdin.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputLine {
    pub text: String,
}

impl InputLine {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ScriptLine {
    Output(OutputExpectation),
    Input(InputLine),
}

/// An ordered, immutable sequence of script lines.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Script {
    lines: Vec<ScriptLine>,
}

impl Script {
    pub(crate) fn from_lines(lines: Vec<ScriptLine>) -> Self {
        Self { lines }
    }

    pub fn lines(&self) -> &[ScriptLine] {
        &self.lines
    }

    pub fn get(&self, index: usize) -> Option<&ScriptLine> {
        self.lines.get(index)
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ScriptLine> {
        self.lines.iter()
    }

    /// Number of expected output lines, prompts included.
    pub fn output_count(&self) -> usize {
        self.lines
            .iter()
            .filter(|line| matches!(line, ScriptLine::Output(_)))
            .count()
    }

    pub fn input_count(&self) -> usize {
        self.lines.len() - self.output_count()
    }
}

impl<'a> IntoIterator for &'a Script {
    type Item = &'a ScriptLine;
    type IntoIter = std::slice::Iter<'a, ScriptLine>;

    fn into_iter(self) -> Self::IntoIter {
        self.lines.iter()
    }
}
