// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Typed rule parameters and their attribute-string encoding.
//!
//! Booleans are written as `0`/`1` (`true`/`false` are accepted on read),
//! numbers in their shortest round-trip form, and enumerations as one of
//! the declared strings. A missing attribute decodes to the default.

use serde::Serialize;

use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ParameterKind {
    Bool,
    Int,
    Double,
    StringEnum,
}

/// A decoded parameter value.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ParameterValue {
    Bool(bool),
    Int(i64),
    Double(f64),
    String(String),
}

impl ParameterValue {
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            ParameterValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    #[cfg(test)]
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            ParameterValue::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Doubles, and ints widened to doubles.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            ParameterValue::Double(d) => Some(*d),
            ParameterValue::Int(i) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            ParameterValue::String(s) => Some(s),
            _ => None,
        }
    }

    /// Attribute-string form.
    pub fn encode(&self) -> String {
        match self {
            ParameterValue::Bool(true) => "1".to_string(),
            ParameterValue::Bool(false) => "0".to_string(),
            ParameterValue::Int(i) => i.to_string(),
            ParameterValue::Double(d) => d.to_string(),
            ParameterValue::String(s) => s.clone(),
        }
    }
}

/// Declaration of one rule parameter.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParameterSpec {
    pub name: &'static str,
    pub description: &'static str,
    /// Record attribute holding the encoded value.
    pub attribute_name: &'static str,
    pub kind: ParameterKind,
    pub default: ParameterValue,
    #[serde(skip_serializing_if = "<[_]>::is_empty")]
    pub allowed: &'static [&'static str],
}

impl ParameterSpec {
    fn new(
        name: &'static str,
        description: &'static str,
        kind: ParameterKind,
        default: ParameterValue,
    ) -> Self {
        Self {
            name,
            description,
            attribute_name: name,
            kind,
            default,
            allowed: &[],
        }
    }

    pub fn bool(name: &'static str, description: &'static str, default: bool) -> Self {
        Self::new(name, description, ParameterKind::Bool, ParameterValue::Bool(default))
    }

    #[cfg(test)]
    pub fn int(name: &'static str, description: &'static str, default: i64) -> Self {
        Self::new(name, description, ParameterKind::Int, ParameterValue::Int(default))
    }

    pub fn double(name: &'static str, description: &'static str, default: f64) -> Self {
        Self::new(name, description, ParameterKind::Double, ParameterValue::Double(default))
    }

    pub fn string_enum(
        name: &'static str,
        description: &'static str,
        allowed: &'static [&'static str],
        default: &'static str,
    ) -> Self {
        Self {
            allowed,
            ..Self::new(
                name,
                description,
                ParameterKind::StringEnum,
                ParameterValue::String(default.to_string()),
            )
        }
    }

    /// Parse an attribute string according to the declared kind.
    pub fn parse(&self, raw: &str) -> Result<ParameterValue> {
        let text = raw.trim();
        let value = match self.kind {
            ParameterKind::Bool => match text.to_ascii_lowercase().as_str() {
                "1" | "true" => Some(ParameterValue::Bool(true)),
                "0" | "false" => Some(ParameterValue::Bool(false)),
                _ => None,
            },
            ParameterKind::Int => text.parse().ok().map(ParameterValue::Int),
            ParameterKind::Double => text
                .parse::<f64>()
                .ok()
                .filter(|d| d.is_finite())
                .map(ParameterValue::Double),
            ParameterKind::StringEnum => self
                .allowed
                .contains(&text)
                .then(|| ParameterValue::String(text.to_string())),
        };
        value.ok_or_else(|| Error::InvalidParameterValue {
            parameter: self.name.to_string(),
            value: raw.to_string(),
        })
    }

    /// Decode an optional attribute, falling back to the default.
    pub fn decode(&self, raw: Option<&str>) -> Result<ParameterValue> {
        match raw {
            Some(raw) => self.parse(raw),
            None => Ok(self.default.clone()),
        }
    }

    /// Validate and encode a value for storage.
    pub fn encode(&self, value: &ParameterValue) -> Result<String> {
        let encoded = value.encode();
        self.parse(&encoded)?;
        Ok(encoded)
    }
}
