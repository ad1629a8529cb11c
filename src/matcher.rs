//! Deciding whether one line of program output satisfies an expectation.

use crate::numeric::{NumericElement, NumericKind};
use crate::script::{OutputElement, OutputExpectation};

/// Outcome of matching one expectation against captured output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineMatch {
    pub matched: bool,
    /// Bytes of the actual text consumed by the elements that succeeded.
    pub consumed: usize,
}

impl LineMatch {
    fn failed(consumed: usize) -> Self {
        Self {
            matched: false,
            consumed,
        }
    }
}

/// Walk the expectation's elements left to right over `actual`.
///
/// `None` means nothing was captured (the stream ended) and never matches.
/// Text after the last element is not examined.
pub fn match_line(expectation: &OutputExpectation, actual: Option<&str>) -> LineMatch {
    let Some(actual) = actual else {
        return LineMatch::failed(0);
    };

    let mut cursor = 0;
    for element in &expectation.elements {
        let rest = &actual[cursor..];
        let taken = match element {
            OutputElement::Text(text) => rest.starts_with(text.as_str()).then_some(text.len()),
            OutputElement::Numeric(numeric) => match_numeric(numeric, rest),
        };
        match taken {
            Some(len) => cursor += len,
            None => return LineMatch::failed(cursor),
        }
    }

    LineMatch {
        matched: true,
        consumed: cursor,
    }
}

/// Convenience wrapper over [`match_line`].
pub fn matches(expectation: &OutputExpectation, actual: Option<&str>) -> bool {
    match_line(expectation, actual).matched
}

fn match_numeric(numeric: &NumericElement, rest: &str) -> Option<usize> {
    let candidate = numeric_candidate(numeric.kind(), rest)?;
    numeric.accepts(candidate).then_some(candidate.len())
}

/// One character for `char`, otherwise everything up to the next space.
fn numeric_candidate(kind: NumericKind, rest: &str) -> Option<&str> {
    if kind == NumericKind::Char {
        let c = rest.chars().next()?;
        return Some(&rest[..c.len_utf8()]);
    }
    Some(rest.split(' ').next().unwrap_or(rest))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_str;
    use crate::script::ScriptLine;
    use pretty_assertions::assert_eq;

    fn expectation(source: &str) -> OutputExpectation {
        match parse_str(source).unwrap().lines() {
            [ScriptLine::Output(e)] => e.clone(),
            other => panic!("expected a single output line, got {other:?}"),
        }
    }

    #[test]
    fn test_literal_prefix_match() {
        let e = expectation("Hello, World!");
        assert!(matches(&e, Some("Hello, World!")));
        assert!(matches(&e, Some("Hello, World! and more")));
        assert!(!matches(&e, Some("hello, world!")));
        assert!(!matches(&e, Some("Hello")));
    }

    #[test]
    fn test_none_never_matches() {
        assert!(!matches(&expectation("x"), None));
        assert!(!matches(&OutputExpectation::literal(""), None));
    }

    #[test]
    fn test_blank_expectation() {
        assert!(matches(&OutputExpectation::literal(""), Some("")));
    }

    #[test]
    fn test_numeric_bounds() {
        let e = expectation("[[t=int;min=0;max=10]]");
        for ok in ["0", "10", "7"] {
            assert!(matches(&e, Some(ok)), "{ok} should match");
        }
        for bad in ["-1", "11", "abc", ""] {
            assert!(!matches(&e, Some(bad)), "{bad} should not match");
        }
    }

    #[test]
    fn test_value_set() {
        let e = expectation("[[t=int;v={1,2,3}]]");
        assert!(matches(&e, Some("2")));
        assert!(!matches(&e, Some("4")));
    }

    #[test]
    fn test_mixed_line_consumption() {
        let e = expectation("You are [[t=int;min=0]] years old");
        assert_eq!(
            match_line(&e, Some("You are 7 years old!")),
            LineMatch {
                matched: true,
                consumed: 19
            }
        );
        assert_eq!(
            match_line(&e, Some("You are -7 years old")),
            LineMatch {
                matched: false,
                consumed: 8
            }
        );
        assert!(!matches(&e, Some("You are 7years old")));
    }

    #[test]
    fn test_numeric_stops_at_space() {
        let e = expectation("[[t=d]] [[t=d]]");
        assert!(matches(&e, Some("1.5 2.25")));
        assert!(!matches(&e, Some("1.5  2.25")));
    }

    #[test]
    fn test_char_takes_one_character() {
        let e = expectation("[[t=c;v={y,n}]] ok");
        assert!(matches(&e, Some("y ok")));
        assert!(!matches(&e, Some("yes ok")));
        assert!(!matches(&e, Some("é ok")));
        assert!(!matches(&e, Some("")));
    }
}
