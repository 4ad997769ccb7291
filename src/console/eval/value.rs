use std::borrow::Cow;
use std::fmt;

use crate::collections::StringRef;
use crate::console::ast::{BinaryOperator, UnaryOperator};

/// A script value. Scripts are weakly typed: every value can be read as a
/// number, an integer, text or a boolean, and reading never fails. Text that
/// is not a number reads as zero.
#[derive(Debug, Clone)]
pub enum Value {
    /// Unassigned variable, missing field or argument, call that failed
    Empty,
    Int(i64),
    Float(f64),
    /// Constant text shared with the intern table
    Interned(StringRef),
    /// Text produced at runtime
    String(String),
}

impl Default for Value {
    fn default() -> Self {
        Value::Empty
    }
}

impl Value {
    /// True for `Empty` and for empty text.
    pub fn is_empty(&self) -> bool {
        match self {
            Value::Empty => true,
            Value::Interned(v) => v.is_empty(),
            Value::String(v) => v.is_empty(),
            Value::Int(_) | Value::Float(_) => false,
        }
    }

    pub fn to_number(&self) -> f64 {
        match self {
            Value::Empty => 0.0,
            Value::Int(v) => *v as f64,
            Value::Float(v) => *v,
            Value::Interned(v) => parse_number(v.as_str()),
            Value::String(v) => parse_number(v),
        }
    }

    /// Integer view of the value. Fractions are truncated towards zero and
    /// values outside of the `i64` range saturate.
    pub fn to_int(&self) -> i64 {
        match self {
            Value::Int(v) => *v,
            other => other.to_number() as i64,
        }
    }

    pub fn to_text(&self) -> Cow<str> {
        match self {
            Value::Empty => Cow::Borrowed(""),
            Value::Int(v) => Cow::Owned(v.to_string()),
            Value::Float(v) => Cow::Owned(format_float(*v)),
            Value::Interned(v) => Cow::Borrowed(v.as_str()),
            Value::String(v) => Cow::Borrowed(v.as_str()),
        }
    }

    pub fn into_string(self) -> String {
        match self {
            Value::String(v) => v,
            other => other.to_text().into_owned(),
        }
    }

    /// Truthiness as used by `if`, loops and the logical operators.
    pub fn to_bool(&self) -> bool {
        match self {
            Value::Empty => false,
            Value::Int(v) => *v != 0,
            Value::Float(v) => *v != 0.0,
            Value::Interned(v) => text_to_bool(v.as_str()),
            Value::String(v) => text_to_bool(v),
        }
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(v as i64)
    }
}

impl From<u32> for Value {
    fn from(v: u32) -> Self {
        Value::Int(v as i64)
    }
}

impl From<usize> for Value {
    fn from(v: usize) -> Self {
        Value::Int(v as i64)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Int(if v { 1 } else { 0 })
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(v)
    }
}

impl From<StringRef> for Value {
    fn from(v: StringRef) -> Self {
        Value::Interned(v)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_text())
    }
}

fn text_to_bool(text: &str) -> bool {
    if is_numeric(text) {
        return parse_number(text) != 0.0;
    }

    !(text.is_empty() || text.eq_ignore_ascii_case("false"))
}

// -----------------------------------------------------------------------------
// Number parsing and formatting
// -----------------------------------------------------------------------------

/// Length of the longest prefix of the form `[+-]digits[.digits][e[+-]digits]`.
/// At least one mantissa digit is required, otherwise the length is 0.
fn decimal_prefix_len(bytes: &[u8]) -> usize {
    let mut idx = 0;
    if idx < bytes.len() && (bytes[idx] == b'+' || bytes[idx] == b'-') {
        idx += 1;
    }

    let mut num_digits = 0;
    while idx < bytes.len() && bytes[idx].is_ascii_digit() {
        idx += 1;
        num_digits += 1;
    }
    if idx < bytes.len() && bytes[idx] == b'.' {
        idx += 1;
        while idx < bytes.len() && bytes[idx].is_ascii_digit() {
            idx += 1;
            num_digits += 1;
        }
    }
    if num_digits == 0 {
        return 0;
    }

    // Exponent only counts when it has digits
    if idx < bytes.len() && (bytes[idx] == b'e' || bytes[idx] == b'E') {
        let mut exp_idx = idx + 1;
        if exp_idx < bytes.len() && (bytes[exp_idx] == b'+' || bytes[exp_idx] == b'-') {
            exp_idx += 1;
        }
        let exp_start = exp_idx;
        while exp_idx < bytes.len() && bytes[exp_idx].is_ascii_digit() {
            exp_idx += 1;
        }
        if exp_idx > exp_start {
            idx = exp_idx;
        }
    }

    idx
}

/// Length of a `[+-]0x...` prefix, 0 if the text does not start with one.
fn hex_prefix_len(bytes: &[u8]) -> usize {
    let sign = match bytes.first() {
        Some(b'+') | Some(b'-') => 1,
        _ => 0,
    };
    let rest = &bytes[sign..];
    if rest.len() < 3 || rest[0] != b'0' || (rest[1] != b'x' && rest[1] != b'X') || !rest[2].is_ascii_hexdigit() {
        return 0;
    }

    let digits = rest[2..].iter().take_while(|c| c.is_ascii_hexdigit()).count();
    sign + 2 + digits
}

/// `atof`-like parsing: leading whitespace is skipped, the longest numeric
/// prefix is used and anything unparsable is 0.
pub fn parse_number(text: &str) -> f64 {
    let text = text.trim_start();
    let bytes = text.as_bytes();

    let hex_len = hex_prefix_len(bytes);
    if hex_len != 0 {
        let negative = bytes[0] == b'-';
        let start = if bytes[0] == b'0' { 2 } else { 3 };
        let mut value: i64 = 0;
        for &c in &bytes[start..hex_len] {
            let digit = (c as char).to_digit(16).unwrap_or(0) as i64;
            value = value.wrapping_mul(16).wrapping_add(digit);
        }
        let value = value as f64;
        return if negative { -value } else { value };
    }

    let len = decimal_prefix_len(bytes);
    if len == 0 {
        return 0.0;
    }

    text[..len].parse::<f64>().unwrap_or(0.0)
}

/// Whether the whole text (ignoring surrounding whitespace) is a number.
pub fn is_numeric(text: &str) -> bool {
    let text = text.trim();
    if text.is_empty() {
        return false;
    }

    let bytes = text.as_bytes();
    hex_prefix_len(bytes) == bytes.len() || decimal_prefix_len(bytes) == bytes.len()
}

/// Formats a float the way scripts expect to see it: integral values without
/// a fraction, everything else like C's `%g`.
pub fn format_float(value: f64) -> String {
    if value.is_nan() {
        return String::from("nan");
    }
    if value.is_infinite() {
        return String::from(if value > 0.0 { "inf" } else { "-inf" });
    }
    if value.fract() == 0.0 && value.abs() < 1e15 {
        return (value as i64).to_string();
    }

    // Six significant digits; the exponent after rounding selects the style
    let scientific = format!("{:.5e}", value);
    let (mantissa, exponent) = match scientific.find('e') {
        Some(idx) => (&scientific[..idx], scientific[idx + 1..].parse::<i32>().unwrap_or(0)),
        None => (scientific.as_str(), 0),
    };

    if exponent < -4 || exponent >= 6 {
        let sign = if exponent < 0 { '-' } else { '+' };
        format!("{}e{}{:02}", trim_fraction_zeros(mantissa), sign, exponent.abs())
    } else {
        let decimals = (5 - exponent) as usize;
        trim_fraction_zeros(&format!("{:.*}", decimals, value)).to_string()
    }
}

fn trim_fraction_zeros(text: &str) -> &str {
    if !text.contains('.') {
        return text;
    }

    text.trim_end_matches('0').trim_end_matches('.')
}

// -----------------------------------------------------------------------------
// Operators
// -----------------------------------------------------------------------------

/// Applies a binary operator to two already evaluated operands. The logical
/// operators are included for completeness, the executor short-circuits them
/// before both sides are evaluated.
pub(crate) fn apply_binary_operator(lhs: &Value, op: BinaryOperator, rhs: &Value) -> Value {
    use BinaryOperator as BO;

    match op {
        BO::LogicalOr => Value::from(lhs.to_bool() || rhs.to_bool()),
        BO::LogicalAnd => Value::from(lhs.to_bool() && rhs.to_bool()),
        BO::BitwiseOr => Value::Int(lhs.to_int() | rhs.to_int()),
        BO::BitwiseXor => Value::Int(lhs.to_int() ^ rhs.to_int()),
        BO::BitwiseAnd => Value::Int(lhs.to_int() & rhs.to_int()),
        BO::Equality => Value::from(lhs.to_number() == rhs.to_number()),
        BO::Inequality => Value::from(lhs.to_number() != rhs.to_number()),
        BO::LessThan => Value::from(lhs.to_number() < rhs.to_number()),
        BO::GreaterThan => Value::from(lhs.to_number() > rhs.to_number()),
        BO::LessThanEqual => Value::from(lhs.to_number() <= rhs.to_number()),
        BO::GreaterThanEqual => Value::from(lhs.to_number() >= rhs.to_number()),
        BO::Concatenate => concatenate(lhs, None, rhs),
        BO::ConcatenateSpace => concatenate(lhs, Some(' '), rhs),
        BO::ConcatenateTab => concatenate(lhs, Some('\t'), rhs),
        BO::ConcatenateNewline => concatenate(lhs, Some('\n'), rhs),
        BO::StringEquality => Value::from(lhs.to_text().eq_ignore_ascii_case(&rhs.to_text())),
        BO::StringInequality => Value::from(!lhs.to_text().eq_ignore_ascii_case(&rhs.to_text())),
        BO::ShiftLeft => Value::Int(lhs.to_int().wrapping_shl((rhs.to_int() & 63) as u32)),
        BO::ShiftRight => Value::Int(lhs.to_int().wrapping_shr((rhs.to_int() & 63) as u32)),
        BO::Add => Value::Float(lhs.to_number() + rhs.to_number()),
        BO::Subtract => Value::Float(lhs.to_number() - rhs.to_number()),
        BO::Multiply => Value::Float(lhs.to_number() * rhs.to_number()),
        BO::Divide => {
            let divisor = rhs.to_number();
            if divisor == 0.0 {
                Value::Int(0)
            } else {
                Value::Float(lhs.to_number() / divisor)
            }
        },
        BO::Remainder => {
            let divisor = rhs.to_int();
            if divisor == 0 {
                Value::Int(0)
            } else {
                Value::Int(lhs.to_int().wrapping_rem(divisor))
            }
        },
    }
}

fn concatenate(lhs: &Value, separator: Option<char>, rhs: &Value) -> Value {
    let lhs = lhs.to_text();
    let rhs = rhs.to_text();
    let mut result = String::with_capacity(lhs.len() + rhs.len() + 1);
    result.push_str(&lhs);
    if let Some(separator) = separator {
        result.push(separator);
    }
    result.push_str(&rhs);
    Value::String(result)
}

/// Applies a unary operator. For the increment and decrement operators this
/// only computes the new value, storing it is up to the caller.
pub(crate) fn apply_unary_operator(op: UnaryOperator, value: &Value) -> Value {
    use UnaryOperator as UO;

    match op {
        UO::LogicalNot => Value::from(!value.to_bool()),
        UO::BitwiseNot => Value::Int(!value.to_int()),
        UO::Negate => match value {
            Value::Int(v) => Value::Int(v.wrapping_neg()),
            other => Value::Float(-other.to_number()),
        },
        UO::PreIncrement | UO::PostIncrement => match value {
            Value::Int(v) => Value::Int(v.wrapping_add(1)),
            other => Value::Float(other.to_number() + 1.0),
        },
        UO::PreDecrement | UO::PostDecrement => match value {
            Value::Int(v) => Value::Int(v.wrapping_sub(1)),
            other => Value::Float(other.to_number() - 1.0),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_number_is_permissive() {
        assert_eq!(parse_number("3"), 3.0);
        assert_eq!(parse_number("  -2.5"), -2.5);
        assert_eq!(parse_number("1e3"), 1000.0);
        assert_eq!(parse_number("12abc"), 12.0);
        assert_eq!(parse_number("abc"), 0.0);
        assert_eq!(parse_number(""), 0.0);
        assert_eq!(parse_number(".5"), 0.5);
        assert_eq!(parse_number("2e"), 2.0);
        assert_eq!(parse_number("0x1F"), 31.0);
        assert_eq!(parse_number("-0x10"), -16.0);
        assert_eq!(parse_number("0x"), 0.0);
    }

    #[test]
    fn test_is_numeric() {
        assert!(is_numeric("1"));
        assert!(is_numeric(" 1.0 "));
        assert!(is_numeric("0xff"));
        assert!(is_numeric("-3e2"));
        assert!(!is_numeric("1a"));
        assert!(!is_numeric(""));
        assert!(!is_numeric("."));
    }

    #[test]
    fn test_format_float() {
        assert_eq!(format_float(8.0), "8");
        assert_eq!(format_float(-0.0), "0");
        assert_eq!(format_float(1.5), "1.5");
        assert_eq!(format_float(1.0 / 3.0), "0.333333");
        assert_eq!(format_float(0.1 + 0.2), "0.3");
        assert_eq!(format_float(1.5e20), "1.5e+20");
        assert_eq!(format_float(0.00001), "1e-05");
        assert_eq!(format_float(123456.7), "123457");
        assert_eq!(format_float(1234567.5), "1.23457e+06");
        assert_eq!(format_float(-2.25), "-2.25");
    }

    #[test]
    fn test_truthiness() {
        assert!(!Value::Empty.to_bool());
        assert!(!Value::Int(0).to_bool());
        assert!(Value::Int(-1).to_bool());
        assert!(Value::Float(0.5).to_bool());
        assert!(!Value::from("").to_bool());
        assert!(!Value::from("0").to_bool());
        assert!(!Value::from("0.0").to_bool());
        assert!(!Value::from("FALSE").to_bool());
        assert!(Value::from("true").to_bool());
        assert!(Value::from("abc").to_bool());
        assert!(Value::from("2").to_bool());
    }

    #[test]
    fn test_text_coercion() {
        assert_eq!(Value::Empty.to_text(), "");
        assert_eq!(Value::Int(-5).to_text(), "-5");
        assert_eq!(Value::Float(2.0).to_text(), "2");
        assert_eq!(Value::from("x").into_string(), "x");
        assert_eq!(Value::Float(2.9).to_int(), 2);
        assert_eq!(Value::from("-2.9").to_int(), -2);
    }

    #[test]
    fn test_arithmetic() {
        use BinaryOperator as BO;
        let five = Value::Int(5);
        let three = Value::from("3");
        assert_eq!(apply_binary_operator(&five, BO::Add, &three).to_text(), "8");
        assert_eq!(apply_binary_operator(&five, BO::Subtract, &three).to_text(), "2");
        assert_eq!(apply_binary_operator(&five, BO::Divide, &Value::Int(2)).to_text(), "2.5");
        assert_eq!(apply_binary_operator(&five, BO::Remainder, &three).to_text(), "2");
        assert_eq!(apply_binary_operator(&five, BO::Add, &Value::from("abc")).to_text(), "5");
    }

    #[test]
    fn test_division_by_zero_yields_zero() {
        use BinaryOperator as BO;
        let five = Value::Int(5);
        assert_eq!(apply_binary_operator(&five, BO::Divide, &Value::Int(0)).to_text(), "0");
        assert_eq!(apply_binary_operator(&five, BO::Divide, &Value::from("abc")).to_text(), "0");
        assert_eq!(apply_binary_operator(&five, BO::Remainder, &Value::Empty).to_text(), "0");
    }

    #[test]
    fn test_integer_operators() {
        use BinaryOperator as BO;
        let six = Value::Int(6);
        assert_eq!(apply_binary_operator(&six, BO::BitwiseAnd, &Value::Int(3)).to_int(), 2);
        assert_eq!(apply_binary_operator(&six, BO::BitwiseOr, &Value::Int(3)).to_int(), 7);
        assert_eq!(apply_binary_operator(&six, BO::BitwiseXor, &Value::Int(3)).to_int(), 5);
        assert_eq!(apply_binary_operator(&Value::Int(1), BO::ShiftLeft, &Value::Int(4)).to_int(), 16);
        assert_eq!(apply_binary_operator(&Value::Int(1), BO::ShiftLeft, &Value::Int(65)).to_int(), 2);
        assert_eq!(apply_binary_operator(&Value::Int(-8), BO::ShiftRight, &Value::Int(1)).to_int(), -4);
        assert_eq!(apply_unary_operator(UnaryOperator::BitwiseNot, &Value::Int(0)).to_int(), -1);
    }

    #[test]
    fn test_comparisons_use_numeric_value() {
        use BinaryOperator as BO;
        let one = Value::from("1");
        let one_point_zero = Value::from("1.0");
        assert!(apply_binary_operator(&one, BO::Equality, &one_point_zero).to_bool());
        assert!(!apply_binary_operator(&one, BO::StringEquality, &one_point_zero).to_bool());
        assert!(apply_binary_operator(&Value::from("abc"), BO::Equality, &Value::Int(0)).to_bool());
        assert!(apply_binary_operator(&Value::Int(2), BO::LessThan, &Value::from("10")).to_bool());
        assert!(apply_binary_operator(&Value::from("Hello"), BO::StringEquality, &Value::from("hELLO")).to_bool());
        assert!(apply_binary_operator(&Value::from("a"), BO::StringInequality, &Value::from("b")).to_bool());
    }

    #[test]
    fn test_concatenation() {
        use BinaryOperator as BO;
        let a = Value::from("a");
        let b = Value::Int(1);
        assert_eq!(apply_binary_operator(&a, BO::Concatenate, &b).to_text(), "a1");
        assert_eq!(apply_binary_operator(&a, BO::ConcatenateSpace, &b).to_text(), "a 1");
        assert_eq!(apply_binary_operator(&a, BO::ConcatenateTab, &b).to_text(), "a\t1");
        assert_eq!(apply_binary_operator(&a, BO::ConcatenateNewline, &b).to_text(), "a\n1");
    }

    #[test]
    fn test_unary_operators() {
        use UnaryOperator as UO;
        assert_eq!(apply_unary_operator(UO::Negate, &Value::Int(3)).to_text(), "-3");
        assert_eq!(apply_unary_operator(UO::Negate, &Value::from("2.5")).to_text(), "-2.5");
        assert_eq!(apply_unary_operator(UO::LogicalNot, &Value::Empty).to_text(), "1");
        assert_eq!(apply_unary_operator(UO::PreIncrement, &Value::from("4")).to_text(), "5");
        assert_eq!(apply_unary_operator(UO::PostDecrement, &Value::Int(0)).to_text(), "-1");
    }
}
