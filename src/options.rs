//! Typed access to untyped step options
//!
//! Step options arrive as loosely typed maps (YAML/TOML/JSON values). All
//! coercion happens here: keys are normalized (case, surrounding whitespace,
//! `-`/space vs `_`) and each accessor reports a field-specific
//! [`OptionError`] instead of silently ignoring a malformed value.

use std::collections::BTreeMap;

use serde_json::Value;
use thiserror::Error;

/// An untyped option value
pub type OptionValue = Value;

/// One coercion failure per field
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum OptionError {
    #[error("option {field} must be a boolean")]
    NotBoolean { field: String },

    #[error("option {field} must be a string")]
    NotString { field: String },

    #[error("option {field} must be a list of strings")]
    NotStringList { field: String },

    #[error("option {field} must be a list")]
    NotList { field: String },

    #[error("option {field} must be a map")]
    NotMap { field: String },

    #[error("option {field} must be a non-negative integer")]
    NotInteger { field: String },

    #[error("option {field} is required")]
    Missing { field: String },

    #[error("option {field} has invalid value '{value}': {reason}")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },
}

impl OptionError {
    pub fn invalid(field: &str, value: impl Into<String>, reason: impl Into<String>) -> Self {
        OptionError::InvalidValue {
            field: field.to_string(),
            value: value.into(),
            reason: reason.into(),
        }
    }
}

/// Normalize an option key: trimmed, lower-cased, `-` and spaces become `_`.
pub fn normalize_key(key: &str) -> String {
    key.trim()
        .to_lowercase()
        .chars()
        .map(|c| if c == '-' || c.is_whitespace() { '_' } else { c })
        .collect()
}

/// A string-keyed option bag with normalized keys
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OptionMap {
    entries: BTreeMap<String, OptionValue>,
}

impl OptionMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a map from a JSON-like object. `null` yields an empty map.
    pub fn from_value(field: &str, value: &OptionValue) -> Result<Self, OptionError> {
        match value {
            Value::Null => Ok(Self::new()),
            Value::Object(object) => Ok(object
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect()),
            _ => Err(OptionError::NotMap {
                field: field.to_string(),
            }),
        }
    }

    /// Insert a value, normalizing the key. Builder-style.
    pub fn with(mut self, key: &str, value: impl Into<OptionValue>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert(&mut self, key: &str, value: impl Into<OptionValue>) {
        self.entries.insert(normalize_key(key), value.into());
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(&normalize_key(key))
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// Raw access, for values whose shape depends on context
    pub fn raw(&self, key: &str) -> Option<&OptionValue> {
        self.entries.get(&normalize_key(key)).filter(|v| !v.is_null())
    }

    /// Read a boolean. Accepts JSON booleans and the strings `true`/`false`/`yes`/`no`.
    pub fn bool(&self, key: &str) -> Result<Option<bool>, OptionError> {
        let Some(value) = self.raw(key) else {
            return Ok(None);
        };
        match value {
            Value::Bool(b) => Ok(Some(*b)),
            Value::String(s) => match s.trim().to_lowercase().as_str() {
                "true" | "yes" => Ok(Some(true)),
                "false" | "no" => Ok(Some(false)),
                _ => Err(OptionError::NotBoolean {
                    field: key.to_string(),
                }),
            },
            _ => Err(OptionError::NotBoolean {
                field: key.to_string(),
            }),
        }
    }

    /// Read a string. Numbers are accepted and rendered in decimal.
    pub fn string(&self, key: &str) -> Result<Option<String>, OptionError> {
        let Some(value) = self.raw(key) else {
            return Ok(None);
        };
        match value {
            Value::String(s) => Ok(Some(s.clone())),
            Value::Number(n) => Ok(Some(n.to_string())),
            _ => Err(OptionError::NotString {
                field: key.to_string(),
            }),
        }
    }

    pub fn require_string(&self, key: &str) -> Result<String, OptionError> {
        match self.string(key)? {
            Some(s) if !s.trim().is_empty() => Ok(s),
            _ => Err(OptionError::Missing {
                field: key.to_string(),
            }),
        }
    }

    /// Read a list of strings. A single string is treated as a one-element list.
    pub fn string_list(&self, key: &str) -> Result<Vec<String>, OptionError> {
        let Some(value) = self.raw(key) else {
            return Ok(Vec::new());
        };
        match value {
            Value::String(s) => Ok(vec![s.clone()]),
            Value::Array(items) => items
                .iter()
                .map(|item| match item {
                    Value::String(s) => Ok(s.clone()),
                    _ => Err(OptionError::NotStringList {
                        field: key.to_string(),
                    }),
                })
                .collect(),
            _ => Err(OptionError::NotStringList {
                field: key.to_string(),
            }),
        }
    }

    /// Read a list of arbitrary values
    pub fn list(&self, key: &str) -> Result<Vec<OptionValue>, OptionError> {
        match self.raw(key) {
            None => Ok(Vec::new()),
            Some(Value::Array(items)) => Ok(items.clone()),
            Some(_) => Err(OptionError::NotList {
                field: key.to_string(),
            }),
        }
    }

    /// Read a nested map
    pub fn map(&self, key: &str) -> Result<Option<OptionMap>, OptionError> {
        match self.raw(key) {
            None => Ok(None),
            Some(value @ Value::Object(_)) => Self::from_value(key, value).map(Some),
            Some(_) => Err(OptionError::NotMap {
                field: key.to_string(),
            }),
        }
    }

    pub fn integer(&self, key: &str) -> Result<Option<u64>, OptionError> {
        let Some(value) = self.raw(key) else {
            return Ok(None);
        };
        let parsed = match value {
            Value::Number(n) => n.as_u64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        };
        parsed.map(Some).ok_or_else(|| OptionError::NotInteger {
            field: key.to_string(),
        })
    }

    /// String values of a flat map, for template rendering and handler params
    pub fn string_entries(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().filter_map(|(k, v)| match v {
            Value::String(s) => Some((k.as_str(), s.as_str())),
            _ => None,
        })
    }

    /// Apply `f` to every string value, recursing into lists and maps.
    pub fn try_map_strings<E>(
        &self,
        f: &mut impl FnMut(&str) -> Result<String, E>,
    ) -> Result<OptionMap, E> {
        let mut entries = BTreeMap::new();
        for (key, value) in &self.entries {
            entries.insert(key.clone(), map_value_strings(value, f)?);
        }
        Ok(OptionMap { entries })
    }
}

fn map_value_strings<E>(
    value: &Value,
    f: &mut impl FnMut(&str) -> Result<String, E>,
) -> Result<Value, E> {
    Ok(match value {
        Value::String(s) => Value::String(f(s)?),
        Value::Array(items) => Value::Array(
            items
                .iter()
                .map(|item| map_value_strings(item, f))
                .collect::<Result<_, _>>()?,
        ),
        Value::Object(object) => {
            let mut out = serde_json::Map::new();
            for (k, v) in object {
                out.insert(k.clone(), map_value_strings(v, f)?);
            }
            Value::Object(out)
        }
        other => other.clone(),
    })
}

impl FromIterator<(String, OptionValue)> for OptionMap {
    fn from_iter<I: IntoIterator<Item = (String, OptionValue)>>(iter: I) -> Self {
        let entries = iter
            .into_iter()
            .map(|(k, v)| (normalize_key(&k), v))
            .collect();
        Self { entries }
    }
}
