//! Self-referential build parameter bags.
//!
//! A [`Config`] is a flat bag of named build parameters whose string values
//! may reference other parameters with `%(name)s` placeholders. Layers merge
//! in order (later layers win on collision), and a single [`Config::expand`]
//! pass resolves the placeholders in place.
//!
//! Expansion is deliberately **not** fixed-point: one pass, in key order. A
//! value that references another still-templated value embeds the raw
//! template text. Callers that need chained references either order their
//! keys accordingly or expand an earlier layer before merging the next one
//! on top. This mirrors how per-target toolchain definitions are stacked by
//! the outer driver.
//!
//! Reading an undefined key yields an empty string rather than an error, so
//! a template referencing an optional, unset parameter degrades to dropping
//! it from the output. The quirk is confined to the lookup done during
//! formatting; malformed template syntax is still a hard [`TemplateError`].

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

use anyhow::{Context, Result};
use thiserror::Error;

/// A build parameter value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Str(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    /// Nested mapping; expansion recurses into these.
    Table(BTreeMap<String, Value>),
    /// Sequences are carried opaquely and never template-expanded.
    List(Vec<Value>),
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Str(s) => write!(f, "{s}"),
            Value::Int(n) => write!(f, "{n}"),
            Value::Float(x) => write!(f, "{x}"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Table(t) => {
                write!(f, "{{")?;
                for (i, (k, v)) in t.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{k}: {v}")?;
                }
                write!(f, "}}")
            }
            Value::List(items) => {
                write!(f, "[")?;
                for (i, v) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{v}")?;
                }
                write!(f, "]")
            }
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Int(n)
    }
}

impl From<f64> for Value {
    fn from(x: f64) -> Self {
        Value::Float(x)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<BTreeMap<String, Value>> for Value {
    fn from(t: BTreeMap<String, Value>) -> Self {
        Value::Table(t)
    }
}

/// Malformed `%`-template syntax.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TemplateError {
    #[error("unterminated template reference in {0:?}")]
    Unterminated(String),
    #[error("expected `%%` or `%(name)s` in {text:?}, found `%{found}`")]
    BadReference { text: String, found: char },
}

/// A named bag of build parameters with `%(name)s` self-references.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Config {
    values: BTreeMap<String, Value>,
}

impl Config {
    /// Create an empty bag.
    pub fn new() -> Self {
        Config::default()
    }

    /// Load a layer from a TOML file.
    ///
    /// Top-level tables become nested [`Value::Table`] entries.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file: {}", path.display()))?;
        Self::from_toml_str(&contents)
            .with_context(|| format!("failed to parse config file: {}", path.display()))
    }

    /// Load a layer with fallback to an empty bag if the file is missing
    /// or malformed.
    pub fn load_or_default(path: &Path) -> Self {
        if path.exists() {
            Self::load(path).unwrap_or_else(|e| {
                tracing::warn!("Failed to load config from {}: {}", path.display(), e);
                Self::default()
            })
        } else {
            Self::default()
        }
    }

    /// Parse a layer from TOML text.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let table: toml::Table = toml::from_str(text).context("failed to parse config layer")?;
        let mut config = Config::new();
        for (k, v) in table {
            config.values.insert(k, from_toml(v));
        }
        Ok(config)
    }

    /// Merge another layer into this one; the other layer wins collisions.
    pub fn merge(&mut self, other: Config) {
        for (k, v) in other.values {
            self.values.insert(k, v);
        }
    }

    /// Set a single parameter.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.values.insert(key.into(), value.into());
    }

    /// Raw value lookup.
    pub fn value(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    /// Rendered lookup: the value as a string, or empty for an absent key.
    ///
    /// The empty-string fallback is what lets templates reference optional
    /// parameters; it also silently masks typos, so prefer [`Config::value`]
    /// when absence is meaningful.
    pub fn get(&self, key: &str) -> String {
        match self.values.get(key) {
            Some(Value::Str(s)) => s.clone(),
            Some(v) => v.to_string(),
            None => String::new(),
        }
    }

    /// Whether a key is present.
    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    /// Number of parameters in the bag.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether the bag is empty.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Iterate parameters in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.values.iter()
    }

    /// Format one value against the current bag.
    ///
    /// Strings containing `%` get placeholder substitution, tables are
    /// formatted entry-by-entry, everything else passes through unchanged.
    pub fn format(&self, value: &Value) -> Result<Value, TemplateError> {
        match value {
            Value::Str(s) if s.contains('%') => Ok(Value::Str(self.format_str(s)?)),
            Value::Table(t) => {
                let mut out = BTreeMap::new();
                for (k, v) in t {
                    out.insert(k.clone(), self.format(v)?);
                }
                Ok(Value::Table(out))
            }
            other => Ok(other.clone()),
        }
    }

    /// Expand every value in place, in one pass over the keys in order.
    ///
    /// Not fixed-point: a key whose dependency is defined later in the pass
    /// picks up that dependency's raw, still-templated text. Layered merges
    /// (expand, then merge the next layer, then expand again) are the way to
    /// chain references across definitions.
    pub fn expand(&mut self) -> Result<(), TemplateError> {
        let keys: Vec<String> = self.values.keys().cloned().collect();
        for key in keys {
            if let Some(v) = self.values.get(&key).cloned() {
                let formatted = self.format(&v)?;
                self.values.insert(key, formatted);
            }
        }
        Ok(())
    }

    /// Deterministic human-readable listing of the bag, in key order.
    ///
    /// String values are quoted. For diagnostic logging only; the format is
    /// not meant to be parsed back.
    pub fn dump(&self) -> String {
        let mut out = String::new();
        for (k, v) in &self.values {
            let rendered = match v {
                Value::Str(s) => format!("'{s}'"),
                other => other.to_string(),
            };
            out.push_str(&format!("{:10}{:<20}{}\n", "", k, rendered));
        }
        out
    }

    /// Substitute `%(name)s` placeholders in a single string.
    ///
    /// `%%` is a literal percent. An absent key substitutes the empty
    /// string. The conversion character after the closing parenthesis is
    /// accepted and ignored; values render the same way regardless.
    fn format_str(&self, text: &str) -> Result<String, TemplateError> {
        let mut out = String::with_capacity(text.len());
        let mut chars = text.chars();
        while let Some(c) = chars.next() {
            if c != '%' {
                out.push(c);
                continue;
            }
            match chars.next() {
                Some('%') => out.push('%'),
                Some('(') => {
                    let mut key = String::new();
                    loop {
                        match chars.next() {
                            Some(')') => break,
                            Some(k) => key.push(k),
                            None => {
                                return Err(TemplateError::Unterminated(text.to_string()));
                            }
                        }
                    }
                    if chars.next().is_none() {
                        // Missing conversion character.
                        return Err(TemplateError::Unterminated(text.to_string()));
                    }
                    if let Some(v) = self.values.get(&key) {
                        out.push_str(&v.to_string());
                    }
                }
                Some(other) => {
                    return Err(TemplateError::BadReference {
                        text: text.to_string(),
                        found: other,
                    });
                }
                None => {
                    return Err(TemplateError::Unterminated(text.to_string()));
                }
            }
        }
        Ok(out)
    }
}

impl FromIterator<(String, Value)> for Config {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Config {
            values: iter.into_iter().collect(),
        }
    }
}

fn from_toml(value: toml::Value) -> Value {
    match value {
        toml::Value::String(s) => Value::Str(s),
        toml::Value::Integer(n) => Value::Int(n),
        toml::Value::Float(x) => Value::Float(x),
        toml::Value::Boolean(b) => Value::Bool(b),
        toml::Value::Datetime(d) => Value::Str(d.to_string()),
        toml::Value::Array(items) => Value::List(items.into_iter().map(from_toml).collect()),
        toml::Value::Table(t) => {
            Value::Table(t.into_iter().map(|(k, v)| (k, from_toml(v))).collect())
        }
    }
}
