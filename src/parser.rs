//! Script parser.
//!
//! The top-level entry points are [`parse_str`], [`parse_lines`] and
//! [`parse_file`]. [`check_str`] reports every malformed line instead of
//! stopping at the first.

use crate::error::{LoadError, ParseErrorKind, ScriptParseError};
use crate::numeric::parse_tag;
use crate::script::{InputLine, OutputElement, OutputExpectation, Script, ScriptLine};
use std::path::Path;
use tracing::debug;

const NUMERIC_OPEN: &str = "[[";
const NUMERIC_CLOSE: &str = "]]";
const INPUT_OPEN: &str = "{{";
const INPUT_CLOSE: &str = "}}";
const COMMENT: char = '#';
const BYTE_ORDER_MARK: char = '\u{FEFF}';

/// Which line grammar a script is written in.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Syntax {
    /// Free text with `[[...]]` numeric tags and a trailing `{{...}}` input tag.
    #[default]
    Tagged,
    /// One prefix character per line: `.` output, `;` prompt, `>` input.
    Legacy,
}

/// Parse a tagged script from a string slice.
///
/// Lines starting with `#` are comments. An empty line expects an empty
/// line of output.
///
/// # Errors
///
/// Returns the first malformed line; no partial script is produced.
///
/// # Example
///
/// ```
/// use simile::parse_str;
///
/// let script = parse_str("What is your name? {{Chris}}\nHello, Chris!\n").unwrap();
/// assert_eq!(script.len(), 3);
/// ```
pub fn parse_str(content: &str) -> Result<Script, ScriptParseError> {
    parse_lines(source_lines(content), Syntax::Tagged)
}

/// Lines of a script source, without a leading byte order mark.
fn source_lines(content: &str) -> std::str::Lines<'_> {
    content
        .strip_prefix(BYTE_ORDER_MARK)
        .unwrap_or(content)
        .lines()
}

/// Parse already split source lines in the given syntax.
pub fn parse_lines<I>(lines: I, syntax: Syntax) -> Result<Script, ScriptParseError>
where
    I: IntoIterator,
    I::Item: AsRef<str>,
{
    let mut script_lines = Vec::new();
    for (index, line) in lines.into_iter().enumerate() {
        script_lines.extend(parse_line(index + 1, line.as_ref(), syntax)?);
    }
    Ok(Script::from_lines(script_lines))
}

/// Read and parse a script file.
///
/// # Errors
///
/// Returns [`LoadError::Io`] if the file cannot be read and
/// [`LoadError::Parse`] if it is malformed.
pub fn parse_file(path: impl AsRef<Path>, syntax: Syntax) -> Result<Script, LoadError> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let script = parse_lines(source_lines(&content), syntax)?;
    debug!(path = %path.display(), lines = script.len(), "parsed script");
    Ok(script)
}

/// Collect an error for every malformed line.
pub fn check_str(content: &str, syntax: Syntax) -> Vec<ScriptParseError> {
    source_lines(content)
        .enumerate()
        .filter_map(|(index, line)| parse_line(index + 1, line, syntax).err())
        .collect()
}

fn parse_line(
    number: usize,
    line: &str,
    syntax: Syntax,
) -> Result<Vec<ScriptLine>, ScriptParseError> {
    let parsed = match syntax {
        Syntax::Tagged => parse_tagged_line(line),
        Syntax::Legacy => parse_legacy_line(line),
    };
    parsed.map_err(|kind| ScriptParseError::new(number, line, kind))
}

fn parse_tagged_line(line: &str) -> Result<Vec<ScriptLine>, ParseErrorKind> {
    if line.starts_with(COMMENT) {
        return Ok(Vec::new());
    }
    if line.is_empty() {
        return Ok(vec![ScriptLine::Output(OutputExpectation::literal(""))]);
    }

    let tokens = tokenize(line)?;
    validate_input_tag(&tokens)?;

    match tokens.as_slice() {
        [Token::Input(text)] => Ok(vec![ScriptLine::Input(InputLine::new(*text))]),
        [Token::Text(prompt), Token::Input(text)] => Ok(vec![
            ScriptLine::Output(OutputExpectation::prompt(*prompt)),
            ScriptLine::Input(InputLine::new(*text)),
        ]),
        _ => {
            let elements = tokens
                .iter()
                .map(|token| match *token {
                    Token::Text(text) => Ok(OutputElement::Text(text.to_string())),
                    Token::Numeric(body) => parse_tag(body).map(OutputElement::Numeric),
                    // validate_input_tag guarantees an input tag is handled above
                    Token::Input(_) => Err(ParseErrorKind::InputTagNotAtEnd),
                })
                .collect::<Result<Vec<_>, _>>()?;
            Ok(vec![ScriptLine::Output(OutputExpectation::line(line, elements))])
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Token<'a> {
    Text(&'a str),
    /// Body between `[[` and `]]`.
    Numeric(&'a str),
    /// Body between `{{` and `}}`.
    Input(&'a str),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TagKind {
    Numeric,
    Input,
}

impl TagKind {
    fn delimiters(self) -> (&'static str, &'static str) {
        match self {
            TagKind::Numeric => (NUMERIC_OPEN, NUMERIC_CLOSE),
            TagKind::Input => (INPUT_OPEN, INPUT_CLOSE),
        }
    }

    fn name(self) -> &'static str {
        match self {
            TagKind::Numeric => "numeric",
            TagKind::Input => "input",
        }
    }
}

/// Split a line into text and tag tokens, left to right.
///
/// Whichever opening delimiter comes first is taken first. A numeric tag
/// that is not at the end of the line must be followed by one space.
fn tokenize(line: &str) -> Result<Vec<Token<'_>>, ParseErrorKind> {
    let mut tokens = Vec::new();
    let mut cursor = 0;

    loop {
        let rest = &line[cursor..];
        let next = [TagKind::Numeric, TagKind::Input]
            .into_iter()
            .filter_map(|kind| rest.find(kind.delimiters().0).map(|at| (at, kind)))
            .min_by_key(|(at, _)| *at);

        let Some((at, kind)) = next else {
            push_text(&mut tokens, rest)?;
            return Ok(tokens);
        };
        push_text(&mut tokens, &rest[..at])?;

        let (open, close) = kind.delimiters();
        let body_start = at + open.len();
        let body_len = rest[body_start..]
            .find(close)
            .ok_or(ParseErrorKind::UnclosedTag(kind.name()))?;
        let body = &rest[body_start..body_start + body_len];
        if body.contains(open) {
            return Err(ParseErrorKind::NestedTag(kind.name()));
        }
        cursor += body_start + body_len + close.len();

        match kind {
            TagKind::Numeric => {
                if line[cursor..].chars().next().is_some_and(|c| c != ' ') {
                    return Err(ParseErrorKind::MissingSpaceAfterTag);
                }
                tokens.push(Token::Numeric(body));
            }
            TagKind::Input => tokens.push(Token::Input(body)),
        }
    }
}

fn push_text<'a>(tokens: &mut Vec<Token<'a>>, text: &'a str) -> Result<(), ParseErrorKind> {
    for closer in [NUMERIC_CLOSE, INPUT_CLOSE] {
        if text.contains(closer) {
            return Err(ParseErrorKind::StrayCloser(closer));
        }
    }
    if !text.is_empty() {
        tokens.push(Token::Text(text));
    }
    Ok(())
}

/// At most one input tag, never beside a numeric tag, always last.
fn validate_input_tag(tokens: &[Token<'_>]) -> Result<(), ParseErrorKind> {
    let inputs = tokens
        .iter()
        .filter(|token| matches!(token, Token::Input(_)))
        .count();
    if inputs == 0 {
        return Ok(());
    }
    if inputs > 1 {
        return Err(ParseErrorKind::MultipleInputTags);
    }
    if tokens.iter().any(|token| matches!(token, Token::Numeric(_))) {
        return Err(ParseErrorKind::InputTagWithNumericTag);
    }
    if !matches!(tokens.last(), Some(Token::Input(_))) {
        return Err(ParseErrorKind::InputTagNotAtEnd);
    }
    Ok(())
}

type LegacyFn = fn(&str) -> ScriptLine;

fn legacy_output(text: &str) -> ScriptLine {
    ScriptLine::Output(OutputExpectation::literal(text))
}

fn legacy_prompt(text: &str) -> ScriptLine {
    ScriptLine::Output(OutputExpectation::prompt(text))
}

fn legacy_input(text: &str) -> ScriptLine {
    ScriptLine::Input(InputLine::new(text))
}

static LEGACY_PREFIXES: &[(char, LegacyFn)] = &[
    ('.', legacy_output),
    (';', legacy_prompt),
    ('>', legacy_input),
];

fn parse_legacy_line(line: &str) -> Result<Vec<ScriptLine>, ParseErrorKind> {
    let Some(prefix) = line.chars().next() else {
        return Ok(Vec::new());
    };
    if prefix == COMMENT {
        return Ok(Vec::new());
    }
    let rest = &line[prefix.len_utf8()..];
    LEGACY_PREFIXES
        .iter()
        .find(|(candidate, _)| *candidate == prefix)
        .map(|(_, build)| vec![build(rest)])
        .ok_or(ParseErrorKind::UnrecognizedLine)
}
