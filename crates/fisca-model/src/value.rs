// SPDX-License-Identifier: Apache-2.0

use serde::{Deserialize, Serialize};

/// A single scalar cell as returned by the warehouse.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(untagged)]
pub enum Value {
    #[default]
    Null,
    Integer(i64),
    Float(f64),
    Text(String),
}

// Integral floats below this magnitude render as integers in key text.
const MAX_EXACT_INTEGRAL_FLOAT: f64 = 9_007_199_254_740_992.0;

impl Value {
    #[must_use]
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Integer(v) => Some(*v as f64),
            Self::Float(v) => Some(*v),
            _ => None,
        }
    }

    /// Canonical text used when this value becomes a filter key.
    ///
    /// Nulls and blank text yield `None`. A float holding an integral value
    /// renders without a fractional part, so `9507248.0` and `9507248` map to
    /// the same key.
    #[must_use]
    pub fn key_text(&self) -> Option<String> {
        match self {
            Self::Null => None,
            Self::Text(s) => {
                let trimmed = s.trim();
                (!trimmed.is_empty()).then(|| trimmed.to_string())
            }
            Self::Integer(v) => Some(v.to_string()),
            Self::Float(v) if !v.is_finite() => None,
            Self::Float(v) if v.fract() == 0.0 && v.abs() < MAX_EXACT_INTEGRAL_FLOAT => {
                Some(format!("{}", *v as i64))
            }
            Self::Float(v) => Some(v.to_string()),
        }
    }

    #[must_use]
    pub fn estimated_bytes(&self) -> usize {
        let inline = std::mem::size_of::<Self>();
        match self {
            Self::Text(s) => inline + s.capacity(),
            _ => inline,
        }
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Null, Into::into)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_text_drops_nulls_and_blanks() {
        assert_eq!(Value::Null.key_text(), None);
        assert_eq!(Value::from("   ").key_text(), None);
        assert_eq!(Value::from(" OF1 ").key_text().as_deref(), Some("OF1"));
    }

    #[test]
    fn key_text_renders_integral_floats_as_integers() {
        assert_eq!(Value::Float(9_507_248.0).key_text().as_deref(), Some("9507248"));
        assert_eq!(Value::Integer(6_172_598).key_text().as_deref(), Some("6172598"));
        assert_eq!(Value::Float(1.5).key_text().as_deref(), Some("1.5"));
        assert_eq!(Value::Float(f64::NAN).key_text(), None);
    }
}
