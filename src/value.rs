//! The value type carried between fibers
//!
//! This module implements the value representation returned by fiber bodies
//! and threaded through `Dependency` resolution. It is intentionally small:
//! the scheduler core does not interpret values, it only stores and hands
//! them back, so the type just needs to be cheaply cloneable and `Send`.

use smol_str::SmolStr;

/// A value produced by a fiber or a thread-offloaded function.
///
/// Cloning is cheap: numbers and booleans are `Copy`, text uses a
/// small-string-optimized, reference-counted representation, and lists share
/// their backing storage.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// The absence of a meaningful result (e.g. a bare cooperative yield).
    Unit,
    /// A boolean value.
    Boolean(bool),
    /// A 64-bit float, used for all numeric results.
    Number(f64),
    /// Text, stored inline for short strings.
    Text(SmolStr),
    /// An ordered collection of values, as produced by gathering a sequence
    /// of dependencies.
    List(Vec<Value>),
}

impl Value {
    /// Construct a number value.
    pub fn number(n: f64) -> Self {
        Value::Number(n)
    }

    /// Construct a boolean value.
    pub fn boolean(b: bool) -> Self {
        Value::Boolean(b)
    }

    /// Construct a text value from anything convertible to `SmolStr`.
    pub fn text(s: impl Into<SmolStr>) -> Self {
        Value::Text(s.into())
    }

    /// Construct a list value.
    pub fn list(values: Vec<Value>) -> Self {
        Value::List(values)
    }

    /// Get the numeric value, if this is a number.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// Get the boolean value, if this is a boolean.
    pub fn as_boolean(&self) -> Option<bool> {
        match self {
            Value::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    /// Get the text value, if this is text.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s.as_str()),
            _ => None,
        }
    }

    /// Get the list value, if this is a list.
    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) => Some(items),
            _ => None,
        }
    }

    /// A human-readable name of this value's variant, for error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Unit => "unit",
            Value::Boolean(_) => "boolean",
            Value::Number(_) => "number",
            Value::Text(_) => "text",
            Value::List(_) => "list",
        }
    }
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Unit => write!(f, "()"),
            Value::Boolean(b) => write!(f, "{b}"),
            Value::Number(n) => write!(f, "{n}"),
            Value::Text(s) => write!(f, "{s}"),
            Value::List(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{item}")?;
                }
                write!(f, "]")
            }
        }
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Boolean(b)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(SmolStr::new(s))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn construction_and_extraction() {
        assert_eq!(Value::number(3.0).as_number(), Some(3.0));
        assert_eq!(Value::boolean(true).as_boolean(), Some(true));
        assert_eq!(Value::text("hi").as_text(), Some("hi"));
        assert_eq!(Value::number(3.0).as_boolean(), None);
    }

    #[test]
    fn display_formatting() {
        assert_eq!(Value::number(1.0).to_string(), "1");
        assert_eq!(Value::boolean(false).to_string(), "false");
        assert_eq!(
            Value::list(vec![Value::number(1.0), Value::number(2.0)]).to_string(),
            "[1, 2]"
        );
    }

    #[test]
    fn type_name() {
        assert_eq!(Value::Unit.type_name(), "unit");
        assert_eq!(Value::number(1.0).type_name(), "number");
    }
}
