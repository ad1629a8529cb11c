//! Typed numeric placeholders: the `[[...]]` tag body and the value checks
//! applied to program output at that position.
//!
//! Tag syntax: `[[t=int;min=0;max=10]]`, `[[type=double;p=2]]`,
//! `[[t=c;v={y,n}]]`. Options are `key=value` pairs separated by `;`.

use crate::error::ParseErrorKind;
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

/// The closed set of value kinds a placeholder can declare.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NumericKind {
    Byte,
    SByte,
    Short,
    UShort,
    Int,
    UInt,
    Long,
    ULong,
    Float,
    Double,
    Char,
}

impl NumericKind {
    /// Canonical name and short alias for every kind.
    pub const TABLE: &'static [(NumericKind, &'static str, &'static str)] = &[
        (NumericKind::Byte, "byte", "b"),
        (NumericKind::SByte, "sbyte", "sb"),
        (NumericKind::Short, "short", "s"),
        (NumericKind::UShort, "ushort", "us"),
        (NumericKind::Int, "int", "i"),
        (NumericKind::UInt, "uint", "ui"),
        (NumericKind::Long, "long", "l"),
        (NumericKind::ULong, "ulong", "ul"),
        (NumericKind::Float, "float", "f"),
        (NumericKind::Double, "double", "d"),
        (NumericKind::Char, "char", "c"),
    ];

    /// Look a kind up by canonical name or alias.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::TABLE
            .iter()
            .find(|(_, canonical, alias)| *canonical == name || *alias == name)
            .map(|(kind, _, _)| *kind)
    }

    pub fn name(self) -> &'static str {
        Self::TABLE
            .iter()
            .find(|(kind, _, _)| *kind == self)
            .map(|(_, canonical, _)| *canonical)
            .unwrap_or("unknown")
    }

    pub fn is_float(self) -> bool {
        matches!(self, NumericKind::Float | NumericKind::Double)
    }
}

impl FromStr for NumericKind {
    type Err = ParseErrorKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_name(s).ok_or_else(|| ParseErrorKind::UnknownType(s.to_string()))
    }
}

impl fmt::Display for NumericKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A primitive that can appear in a placeholder.
pub trait Numeric: Copy + PartialOrd + fmt::Debug + Send + Sync + 'static {
    const KIND: NumericKind;

    fn parse_literal(s: &str) -> Option<Self>;

    /// Round to `digits` decimal places. Only floating kinds change.
    fn rounded(self, _digits: u8) -> Self {
        self
    }
}

macro_rules! integer_numeric {
    ($($ty:ty => $kind:ident),* $(,)?) => {
        $(
            impl Numeric for $ty {
                const KIND: NumericKind = NumericKind::$kind;

                fn parse_literal(s: &str) -> Option<Self> {
                    s.parse().ok()
                }
            }
        )*
    };
}

integer_numeric! {
    u8 => Byte,
    i8 => SByte,
    i16 => Short,
    u16 => UShort,
    i32 => Int,
    u32 => UInt,
    i64 => Long,
    u64 => ULong,
}

/// Returns `value` unchanged once the scaled value has no fractional part left.
fn round_f64(value: f64, digits: u8) -> f64 {
    const EXACT_INTEGER_LIMIT: f64 = 9_007_199_254_740_992.0;
    let scale = 10f64.powi(i32::from(digits));
    let scaled = value * scale;
    if !scaled.is_finite() || scaled.abs() >= EXACT_INTEGER_LIMIT {
        return value;
    }
    scaled.round() / scale
}

impl Numeric for f32 {
    const KIND: NumericKind = NumericKind::Float;

    fn parse_literal(s: &str) -> Option<Self> {
        s.parse().ok()
    }

    fn rounded(self, digits: u8) -> Self {
        round_f64(f64::from(self), digits) as f32
    }
}

impl Numeric for f64 {
    const KIND: NumericKind = NumericKind::Double;

    fn parse_literal(s: &str) -> Option<Self> {
        s.parse().ok()
    }

    fn rounded(self, digits: u8) -> Self {
        round_f64(self, digits)
    }
}

impl Numeric for char {
    const KIND: NumericKind = NumericKind::Char;

    fn parse_literal(s: &str) -> Option<Self> {
        let mut chars = s.chars();
        match (chars.next(), chars.next()) {
            (Some(c), None) => Some(c),
            _ => None,
        }
    }
}

/// Bounds, permitted values and rounding for one placeholder of kind `T`.
#[derive(Debug, Clone, PartialEq)]
pub struct Constraint<T> {
    /// Inclusive lower bound.
    pub min: Option<T>,
    /// Inclusive upper bound.
    pub max: Option<T>,
    /// Permitted values. Never empty when present.
    pub values: Option<Vec<T>>,
    /// Decimal digits both sides are rounded to before comparing.
    pub precision: Option<u8>,
}

impl<T: Numeric> Default for Constraint<T> {
    fn default() -> Self {
        Self {
            min: None,
            max: None,
            values: None,
            precision: None,
        }
    }
}

impl<T: Numeric> Constraint<T> {
    fn from_options(options: &TagOptions<'_>) -> Result<Self, ParseErrorKind> {
        let min = options.min.map(literal::<T>).transpose()?;
        let max = options.max.map(literal::<T>).transpose()?;
        if let (Some(lo), Some(hi)) = (min, max) {
            if lo > hi {
                return Err(ParseErrorKind::MinAboveMax);
            }
        }

        let values = options
            .values
            .map(|set| {
                value_set(set)?
                    .into_iter()
                    .map(literal::<T>)
                    .collect::<Result<Vec<_>, _>>()
            })
            .transpose()?;

        let precision = options.precision.map(precision).transpose()?;
        if precision.is_some() && !T::KIND.is_float() {
            return Err(ParseErrorKind::PrecisionNotAllowed(T::KIND.name()));
        }

        Ok(Self {
            min,
            max,
            values,
            precision,
        })
    }

    fn round(&self, value: T) -> T {
        match self.precision {
            Some(digits) => value.rounded(digits),
            None => value,
        }
    }

    /// Check min, then max, then set membership.
    pub fn accepts(&self, value: T) -> bool {
        let value = self.round(value);
        // Unordered comparisons (NaN) fail the bound.
        if let Some(min) = self.min {
            let ordering = value.partial_cmp(&self.round(min));
            if !matches!(ordering, Some(Ordering::Greater | Ordering::Equal)) {
                return false;
            }
        }
        if let Some(max) = self.max {
            let ordering = value.partial_cmp(&self.round(max));
            if !matches!(ordering, Some(Ordering::Less | Ordering::Equal)) {
                return false;
            }
        }
        match &self.values {
            Some(set) => set.iter().any(|member| self.round(*member) == value),
            None => true,
        }
    }

    /// Parse `candidate` as `T` and check it. Unparsable text is rejected.
    pub fn accepts_str(&self, candidate: &str) -> bool {
        T::parse_literal(candidate).is_some_and(|value| self.accepts(value))
    }
}

fn literal<T: Numeric>(text: &str) -> Result<T, ParseErrorKind> {
    T::parse_literal(text).ok_or_else(|| ParseErrorKind::InvalidLiteral {
        kind: T::KIND.name(),
        literal: text.to_string(),
    })
}

fn value_set(text: &str) -> Result<Vec<&str>, ParseErrorKind> {
    let inner = text
        .strip_prefix('{')
        .and_then(|rest| rest.strip_suffix('}'))
        .ok_or_else(|| ParseErrorKind::MalformedValueSet(text.to_string()))?;
    if inner.trim().is_empty() {
        return Err(ParseErrorKind::EmptyValueSet);
    }
    Ok(inner.split(',').map(str::trim).collect())
}

fn precision(text: &str) -> Result<u8, ParseErrorKind> {
    text.parse::<u8>()
        .ok()
        .filter(|digits| *digits <= 15)
        .ok_or_else(|| ParseErrorKind::PrecisionOutOfRange(text.to_string()))
}

/// A placeholder, tagged by kind so the matcher can dispatch exhaustively.
#[derive(Debug, Clone, PartialEq)]
pub enum NumericElement {
    Byte(Constraint<u8>),
    SByte(Constraint<i8>),
    Short(Constraint<i16>),
    UShort(Constraint<u16>),
    Int(Constraint<i32>),
    UInt(Constraint<u32>),
    Long(Constraint<i64>),
    ULong(Constraint<u64>),
    Float(Constraint<f32>),
    Double(Constraint<f64>),
    Char(Constraint<char>),
}

macro_rules! each_kind {
    ($element:expr, $constraint:ident => $body:expr) => {
        match $element {
            NumericElement::Byte($constraint) => $body,
            NumericElement::SByte($constraint) => $body,
            NumericElement::Short($constraint) => $body,
            NumericElement::UShort($constraint) => $body,
            NumericElement::Int($constraint) => $body,
            NumericElement::UInt($constraint) => $body,
            NumericElement::Long($constraint) => $body,
            NumericElement::ULong($constraint) => $body,
            NumericElement::Float($constraint) => $body,
            NumericElement::Double($constraint) => $body,
            NumericElement::Char($constraint) => $body,
        }
    };
}

impl NumericElement {
    fn build(kind: NumericKind, options: &TagOptions<'_>) -> Result<Self, ParseErrorKind> {
        Ok(match kind {
            NumericKind::Byte => Self::Byte(Constraint::from_options(options)?),
            NumericKind::SByte => Self::SByte(Constraint::from_options(options)?),
            NumericKind::Short => Self::Short(Constraint::from_options(options)?),
            NumericKind::UShort => Self::UShort(Constraint::from_options(options)?),
            NumericKind::Int => Self::Int(Constraint::from_options(options)?),
            NumericKind::UInt => Self::UInt(Constraint::from_options(options)?),
            NumericKind::Long => Self::Long(Constraint::from_options(options)?),
            NumericKind::ULong => Self::ULong(Constraint::from_options(options)?),
            NumericKind::Float => Self::Float(Constraint::from_options(options)?),
            NumericKind::Double => Self::Double(Constraint::from_options(options)?),
            NumericKind::Char => Self::Char(Constraint::from_options(options)?),
        })
    }

    pub fn kind(&self) -> NumericKind {
        fn kind_of<T: Numeric>(_: &Constraint<T>) -> NumericKind {
            T::KIND
        }
        each_kind!(self, c => kind_of(c))
    }

    pub fn precision(&self) -> Option<u8> {
        each_kind!(self, c => c.precision)
    }

    /// Whether `candidate` parses as this kind and satisfies every constraint.
    pub fn accepts(&self, candidate: &str) -> bool {
        each_kind!(self, c => c.accepts_str(candidate))
    }
}

/// Raw option values of one tag, before they are parsed as the declared kind.
#[derive(Debug, Default)]
struct TagOptions<'a> {
    kind: Option<&'a str>,
    min: Option<&'a str>,
    max: Option<&'a str>,
    values: Option<&'a str>,
    precision: Option<&'a str>,
}

fn set_once<'a>(
    slot: &mut Option<&'a str>,
    key: &str,
    value: &'a str,
) -> Result<(), ParseErrorKind> {
    if slot.replace(value).is_some() {
        return Err(ParseErrorKind::DuplicateOption(key.to_string()));
    }
    Ok(())
}

/// Parse the text between `[[` and `]]`.
pub fn parse_tag(body: &str) -> Result<NumericElement, ParseErrorKind> {
    if body.trim().is_empty() {
        return Err(ParseErrorKind::MissingType);
    }

    let mut options = TagOptions::default();
    for option in body.split(';') {
        let (key, value) = match option.split_once('=') {
            Some((key, value)) if !value.contains('=') => (key.trim(), value.trim()),
            _ => return Err(ParseErrorKind::MalformedOption(option.to_string())),
        };
        let slot = match key {
            "t" | "type" => &mut options.kind,
            "min" => &mut options.min,
            "max" => &mut options.max,
            "v" | "values" => &mut options.values,
            "p" | "precision" => &mut options.precision,
            other => return Err(ParseErrorKind::UnknownOption(other.to_string())),
        };
        set_once(slot, key, value)?;
    }

    let kind: NumericKind = options.kind.ok_or(ParseErrorKind::MissingType)?.parse()?;
    NumericElement::build(kind, &options)
}
