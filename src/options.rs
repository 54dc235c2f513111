//! Keyword options for reads and writes.
//!
//! Callers pass loosely typed [`Options`] (the equivalent of `**kwargs`).
//! Each format declares the options it accepts as a list of [`OptionSpec`]s;
//! [`ResolvedOptions::resolve`] checks the caller's options against that
//! list and fills in defaults:
//!
//! - unknown key → [`Error::UnknownOption`]
//! - wrong type → [`Error::OptionType`]
//! - out of range → [`Error::InvalidOption`]

use crate::error::{Error, Result};
use std::collections::BTreeMap;

/// A loosely typed option value.
#[derive(Debug, Clone, PartialEq)]
pub enum OptionValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl OptionValue {
    fn type_name(&self) -> &'static str {
        match self {
            OptionValue::Bool(_) => "bool",
            OptionValue::Int(_) => "int",
            OptionValue::Float(_) => "float",
            OptionValue::Text(_) => "text",
        }
    }

    /// Parse a command-line style value: `true`/`false`, integers, floats,
    /// and anything else as text.
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();
        match trimmed.to_ascii_lowercase().as_str() {
            "true" | "yes" | "on" => return OptionValue::Bool(true),
            "false" | "no" | "off" => return OptionValue::Bool(false),
            _ => {}
        }
        if let Ok(v) = trimmed.parse::<i64>() {
            return OptionValue::Int(v);
        }
        if let Ok(v) = trimmed.parse::<f64>() {
            return OptionValue::Float(v);
        }
        OptionValue::Text(trimmed.to_string())
    }

    /// Convert a TOML scalar. Tables, arrays and datetimes are not options.
    pub fn from_toml(value: &toml::Value) -> Option<Self> {
        match value {
            toml::Value::Boolean(b) => Some(OptionValue::Bool(*b)),
            toml::Value::Integer(i) => Some(OptionValue::Int(*i)),
            toml::Value::Float(f) => Some(OptionValue::Float(*f)),
            toml::Value::String(s) => Some(OptionValue::Text(s.clone())),
            _ => None,
        }
    }
}

impl std::fmt::Display for OptionValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OptionValue::Bool(b) => write!(f, "{b}"),
            OptionValue::Int(i) => write!(f, "{i}"),
            OptionValue::Float(v) => write!(f, "{v}"),
            OptionValue::Text(s) => write!(f, "{s:?}"),
        }
    }
}

impl From<bool> for OptionValue {
    fn from(v: bool) -> Self {
        OptionValue::Bool(v)
    }
}

impl From<i64> for OptionValue {
    fn from(v: i64) -> Self {
        OptionValue::Int(v)
    }
}

impl From<i32> for OptionValue {
    fn from(v: i32) -> Self {
        OptionValue::Int(i64::from(v))
    }
}

impl From<u32> for OptionValue {
    fn from(v: u32) -> Self {
        OptionValue::Int(i64::from(v))
    }
}

impl From<f64> for OptionValue {
    fn from(v: f64) -> Self {
        OptionValue::Float(v)
    }
}

impl From<&str> for OptionValue {
    fn from(v: &str) -> Self {
        OptionValue::Text(v.to_string())
    }
}

impl From<String> for OptionValue {
    fn from(v: String) -> Self {
        OptionValue::Text(v)
    }
}

/// Options as given by the caller, before validation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Options(BTreeMap<String, OptionValue>);

impl Options {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<OptionValue>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<OptionValue>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&OptionValue> {
        self.0.get(key)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &OptionValue)> {
        self.0.iter()
    }

    /// `self` layered over `defaults`: keys present in `self` win.
    pub fn over(&self, defaults: &Options) -> Options {
        let mut merged = defaults.0.clone();
        for (k, v) in &self.0 {
            merged.insert(k.clone(), v.clone());
        }
        Options(merged)
    }

    /// Parse `key=value` pairs as given on the command line.
    pub fn parse_pairs<S: AsRef<str>>(pairs: &[S]) -> Result<Self> {
        let mut options = Options::new();
        for pair in pairs {
            let pair = pair.as_ref();
            let (key, value) = pair.split_once('=').ok_or_else(|| {
                Error::InvalidArgument(format!("expected key=value, got '{pair}'"))
            })?;
            let key = key.trim();
            if key.is_empty() {
                return Err(Error::InvalidArgument(format!(
                    "empty option name in '{pair}'"
                )));
            }
            options.insert(key, OptionValue::parse(value));
        }
        Ok(options)
    }
}

impl<K: Into<String>, V: Into<OptionValue>> FromIterator<(K, V)> for Options {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

/// The type and range an option accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OptionKind {
    Bool,
    Int { min: i64, max: i64 },
    /// A flag that also accepts a small integer mode (`exifrotate=2`).
    BoolOrInt { min: i64, max: i64 },
}

/// Declaration of one accepted option.
#[derive(Debug, Clone, PartialEq)]
pub struct OptionSpec {
    pub name: &'static str,
    pub kind: OptionKind,
    pub default: OptionValue,
    pub doc: &'static str,
}

impl OptionSpec {
    pub const fn flag(name: &'static str, default: bool, doc: &'static str) -> Self {
        Self {
            name,
            kind: OptionKind::Bool,
            default: OptionValue::Bool(default),
            doc,
        }
    }

    pub const fn int(
        name: &'static str,
        min: i64,
        max: i64,
        default: i64,
        doc: &'static str,
    ) -> Self {
        Self {
            name,
            kind: OptionKind::Int { min, max },
            default: OptionValue::Int(default),
            doc,
        }
    }

    pub const fn flag_or_int(
        name: &'static str,
        min: i64,
        max: i64,
        default: i64,
        doc: &'static str,
    ) -> Self {
        Self {
            name,
            kind: OptionKind::BoolOrInt { min, max },
            default: OptionValue::Int(default),
            doc,
        }
    }

    /// Check `value` and normalize it to the option's canonical type.
    pub fn check(&self, value: &OptionValue) -> Result<OptionValue> {
        let type_error = |expected: &'static str| Error::OptionType {
            name: self.name.to_string(),
            expected,
            got: format!("{} {}", value.type_name(), value),
        };
        match (self.kind, value) {
            (OptionKind::Bool, OptionValue::Bool(b)) => Ok(OptionValue::Bool(*b)),
            (OptionKind::Bool, OptionValue::Int(i @ (0 | 1))) => Ok(OptionValue::Bool(*i == 1)),
            (OptionKind::Bool, _) => Err(type_error("a bool")),
            (OptionKind::Int { min, max }, OptionValue::Int(i)) => {
                self.check_range(*i, min, max)?;
                Ok(OptionValue::Int(*i))
            }
            (OptionKind::Int { .. }, _) => Err(type_error("an integer")),
            (OptionKind::BoolOrInt { .. }, OptionValue::Bool(b)) => {
                Ok(OptionValue::Int(i64::from(*b)))
            }
            (OptionKind::BoolOrInt { min, max }, OptionValue::Int(i)) => {
                self.check_range(*i, min, max)?;
                Ok(OptionValue::Int(*i))
            }
            (OptionKind::BoolOrInt { .. }, _) => Err(type_error("a bool or an integer")),
        }
    }

    fn check_range(&self, value: i64, min: i64, max: i64) -> Result<()> {
        if (min..=max).contains(&value) {
            Ok(())
        } else {
            Err(Error::InvalidOption {
                name: self.name.to_string(),
                reason: format!("{value} is outside {min}-{max}"),
            })
        }
    }
}

/// Options after validation against a format's specs, with defaults
/// filled in for every declared key.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResolvedOptions {
    values: BTreeMap<&'static str, OptionValue>,
    explicit: Vec<&'static str>,
}

impl ResolvedOptions {
    pub fn resolve(format: &str, specs: &[OptionSpec], given: &Options) -> Result<Self> {
        for key in given.0.keys() {
            if !specs.iter().any(|s| s.name == key) {
                return Err(Error::UnknownOption {
                    format: format.to_string(),
                    name: key.clone(),
                });
            }
        }
        let mut values = BTreeMap::new();
        let mut explicit = Vec::new();
        for spec in specs {
            let value = match given.get(spec.name) {
                Some(v) => {
                    explicit.push(spec.name);
                    spec.check(v)?
                }
                None => spec.default.clone(),
            };
            values.insert(spec.name, value);
        }
        Ok(Self { values, explicit })
    }

    pub fn bool(&self, name: &str) -> bool {
        match self.values.get(name) {
            Some(OptionValue::Bool(b)) => *b,
            Some(OptionValue::Int(i)) => *i != 0,
            _ => false,
        }
    }

    pub fn int(&self, name: &str) -> i64 {
        match self.values.get(name) {
            Some(OptionValue::Int(i)) => *i,
            Some(OptionValue::Bool(b)) => i64::from(*b),
            _ => 0,
        }
    }

    /// Whether the caller set `name` rather than relying on the default.
    pub fn is_explicit(&self, name: &str) -> bool {
        self.explicit.contains(&name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &OptionValue)> {
        self.values.iter().map(|(k, v)| (*k, v))
    }
}
