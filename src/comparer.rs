// src/comparer.rs - Trigger comparison for alarm items
use crate::error::{AlarmError, Result};
use crate::value::Value;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// How an item's process value is compared against its trigger value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ComparerType {
    Equal,
    NotEqual,
    Greater,
    GreaterOrEqual,
    Less,
    LessOrEqual,
}

impl ComparerType {
    /// Evaluate `value <op> trigger`.
    ///
    /// Numeric and boolean values compare as floats. Strings only support
    /// equality against string triggers.
    pub fn evaluate(&self, value: &Value, trigger: &Value) -> Result<bool> {
        if let (Value::String(a), Value::String(b)) = (value, trigger) {
            return match self {
                ComparerType::Equal => Ok(a == b),
                ComparerType::NotEqual => Ok(a != b),
                _ => Err(AlarmError::TypeMismatch {
                    expected: "numeric",
                    actual: "string",
                }),
            };
        }

        let a = value.as_float().ok_or(AlarmError::TypeMismatch {
            expected: "numeric",
            actual: value.type_name(),
        })?;
        let b = trigger.as_float().ok_or(AlarmError::TypeMismatch {
            expected: "numeric",
            actual: trigger.type_name(),
        })?;

        Ok(match self {
            ComparerType::Equal => (a - b).abs() < f64::EPSILON,
            ComparerType::NotEqual => (a - b).abs() >= f64::EPSILON,
            ComparerType::Greater => a > b,
            ComparerType::GreaterOrEqual => a >= b,
            ComparerType::Less => a < b,
            ComparerType::LessOrEqual => a <= b,
        })
    }
}

impl fmt::Display for ComparerType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let symbol = match self {
            ComparerType::Equal => "==",
            ComparerType::NotEqual => "!=",
            ComparerType::Greater => ">",
            ComparerType::GreaterOrEqual => ">=",
            ComparerType::Less => "<",
            ComparerType::LessOrEqual => "<=",
        };
        f.write_str(symbol)
    }
}

impl FromStr for ComparerType {
    type Err = AlarmError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "==" | "=" | "eq" | "equal" => Ok(ComparerType::Equal),
            "!=" | "<>" | "ne" | "notequal" | "not_equal" => Ok(ComparerType::NotEqual),
            ">" | "gt" | "greater" => Ok(ComparerType::Greater),
            ">=" | "ge" | "greaterorequal" | "greater_or_equal" => Ok(ComparerType::GreaterOrEqual),
            "<" | "lt" | "less" => Ok(ComparerType::Less),
            "<=" | "le" | "lessorequal" | "less_or_equal" => Ok(ComparerType::LessOrEqual),
            _ => Err(AlarmError::UnknownComparer(s.to_string())),
        }
    }
}
