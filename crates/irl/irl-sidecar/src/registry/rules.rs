//! Domain rules evaluated against verified payloads.
//!
//! Declarative rules come from the registry file as [`RuleSpec`]s. Anything
//! the declarative kinds cannot express is plugged in by implementing
//! [`Rule`] and adding it with [`RuleSet::with_rule`].

use std::fmt;

use irl_core::Violation;
use regex::Regex;
use serde::{
    Deserialize,
    Serialize,
};
use serde_json::Value;

use crate::registry::RegistryError;

/// A single predicate over a payload.
pub trait Rule: Send + Sync + fmt::Debug {
    /// Rule kind reported in violations.
    fn kind(&self) -> &str;

    /// Check the payload, returning the violation if the rule does not hold.
    fn check(&self, payload: &Value) -> Result<(), Violation>;
}

/// Resolve a dot-separated field path. Numeric segments index arrays and
/// the empty path is the payload itself.
pub fn lookup<'a>(payload: &'a Value, path: &str) -> Option<&'a Value> {
    if path.is_empty() {
        return Some(payload);
    }
    path.split('.').try_fold(payload, |value, segment| {
        match value {
            Value::Object(map) => map.get(segment),
            Value::Array(items) => segment.parse::<usize>().ok().and_then(|idx| items.get(idx)),
            _ => None,
        }
    })
}

/// JSON value kinds accepted by the `type` rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JsonType {
    String,
    Number,
    Integer,
    Boolean,
    Array,
    Object,
    Null,
}

impl JsonType {
    fn of(value: &Value) -> Self {
        match value {
            Value::Null => JsonType::Null,
            Value::Bool(_) => JsonType::Boolean,
            Value::Number(n) if n.is_i64() || n.is_u64() => JsonType::Integer,
            Value::Number(_) => JsonType::Number,
            Value::String(_) => JsonType::String,
            Value::Array(_) => JsonType::Array,
            Value::Object(_) => JsonType::Object,
        }
    }

    fn matches(self, value: &Value) -> bool {
        let actual = Self::of(value);
        actual == self || (self == JsonType::Number && actual == JsonType::Integer)
    }
}

impl fmt::Display for JsonType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            JsonType::String => "string",
            JsonType::Number => "number",
            JsonType::Integer => "integer",
            JsonType::Boolean => "boolean",
            JsonType::Array => "array",
            JsonType::Object => "object",
            JsonType::Null => "null",
        };
        f.write_str(name)
    }
}

/// Declarative rule as written in the registry file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case", deny_unknown_fields)]
pub enum RuleSpec {
    Required {
        field: String,
    },
    NonNegative {
        field: String,
    },
    Type {
        field: String,
        expected: JsonType,
    },
    Range {
        field: String,
        #[serde(default)]
        min: Option<f64>,
        #[serde(default)]
        max: Option<f64>,
    },
    NonEmpty {
        field: String,
    },
    OneOf {
        field: String,
        values: Vec<Value>,
    },
    Pattern {
        field: String,
        regex: String,
    },
}

impl RuleSpec {
    /// Compile the declaration into an executable rule.
    pub fn compile(self) -> Result<Box<dyn Rule>, RegistryError> {
        let rule: Box<dyn Rule> = match self {
            RuleSpec::Required { field } => Box::new(Required { field }),
            RuleSpec::NonNegative { field } => Box::new(NonNegative { field }),
            RuleSpec::Type { field, expected } => Box::new(TypeIs { field, expected }),
            RuleSpec::Range { field, min, max } => {
                match (min, max) {
                    (None, None) => {
                        return Err(RegistryError::InvalidRule(format!(
                            "range on '{field}' needs a min or a max"
                        )));
                    }
                    (Some(min), Some(max)) if min > max => {
                        return Err(RegistryError::InvalidRule(format!(
                            "range on '{field}' has min {min} greater than max {max}"
                        )));
                    }
                    _ => {}
                }
                Box::new(Range { field, min, max })
            }
            RuleSpec::NonEmpty { field } => Box::new(NonEmpty { field }),
            RuleSpec::OneOf { field, values } => {
                if values.is_empty() {
                    return Err(RegistryError::InvalidRule(format!(
                        "one_of on '{field}' has no allowed values"
                    )));
                }
                Box::new(OneOf { field, values })
            }
            RuleSpec::Pattern { field, regex } => {
                let regex = Regex::new(&regex).map_err(|err| {
                    RegistryError::InvalidRule(format!("pattern on '{field}': {err}"))
                })?;
                Box::new(Pattern { field, regex })
            }
        };
        Ok(rule)
    }
}

/// Ordered collection of rules for one integration.
#[derive(Debug, Default)]
pub struct RuleSet {
    rules: Vec<Box<dyn Rule>>,
}

impl RuleSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_specs(specs: Vec<RuleSpec>) -> Result<Self, RegistryError> {
        let rules = specs
            .into_iter()
            .map(RuleSpec::compile)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { rules })
    }

    pub fn with_rule(mut self, rule: Box<dyn Rule>) -> Self {
        self.rules.push(rule);
        self
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Run every rule and collect all violations.
    pub fn check(&self, payload: &Value) -> Vec<Violation> {
        self.rules
            .iter()
            .filter_map(|rule| rule.check(payload).err())
            .collect()
    }
}

#[derive(Debug)]
struct Required {
    field: String,
}

impl Rule for Required {
    fn kind(&self) -> &str {
        "required"
    }

    fn check(&self, payload: &Value) -> Result<(), Violation> {
        match lookup(payload, &self.field) {
            Some(_) => Ok(()),
            None => Err(Violation::new(self.kind(), &self.field, "field is required")),
        }
    }
}

#[derive(Debug)]
struct NonNegative {
    field: String,
}

impl Rule for NonNegative {
    fn kind(&self) -> &str {
        "non_negative"
    }

    fn check(&self, payload: &Value) -> Result<(), Violation> {
        let Some(value) = lookup(payload, &self.field) else {
            return Ok(());
        };
        match value.as_f64() {
            Some(n) if n >= 0.0 => Ok(()),
            Some(_) => {
                Err(Violation::new(
                    self.kind(),
                    &self.field,
                    format!("{} must be >= 0, got {value}", self.field),
                ))
            }
            None => {
                Err(Violation::new(
                    self.kind(),
                    &self.field,
                    format!("expected a number, got {}", JsonType::of(value)),
                ))
            }
        }
    }
}

#[derive(Debug)]
struct TypeIs {
    field: String,
    expected: JsonType,
}

impl Rule for TypeIs {
    fn kind(&self) -> &str {
        "type"
    }

    fn check(&self, payload: &Value) -> Result<(), Violation> {
        match lookup(payload, &self.field) {
            Some(value) if !self.expected.matches(value) => {
                Err(Violation::new(
                    self.kind(),
                    &self.field,
                    format!("expected {}, got {}", self.expected, JsonType::of(value)),
                ))
            }
            _ => Ok(()),
        }
    }
}

#[derive(Debug)]
struct Range {
    field: String,
    min: Option<f64>,
    max: Option<f64>,
}

impl Rule for Range {
    fn kind(&self) -> &str {
        "range"
    }

    fn check(&self, payload: &Value) -> Result<(), Violation> {
        let Some(value) = lookup(payload, &self.field) else {
            return Ok(());
        };
        let Some(n) = value.as_f64() else {
            return Err(Violation::new(
                self.kind(),
                &self.field,
                format!("expected a number, got {}", JsonType::of(value)),
            ));
        };

        let below = self.min.is_some_and(|min| n < min);
        let above = self.max.is_some_and(|max| n > max);
        if !below && !above {
            return Ok(());
        }

        let bounds = match (self.min, self.max) {
            (Some(min), Some(max)) => format!("between {min} and {max}"),
            (Some(min), None) => format!(">= {min}"),
            (None, Some(max)) => format!("<= {max}"),
            (None, None) => return Ok(()),
        };
        Err(Violation::new(
            self.kind(),
            &self.field,
            format!("{} must be {bounds}, got {value}", self.field),
        ))
    }
}

#[derive(Debug)]
struct NonEmpty {
    field: String,
}

impl Rule for NonEmpty {
    fn kind(&self) -> &str {
        "non_empty"
    }

    fn check(&self, payload: &Value) -> Result<(), Violation> {
        let empty = match lookup(payload, &self.field) {
            Some(Value::String(s)) => s.trim().is_empty(),
            Some(Value::Array(items)) => items.is_empty(),
            Some(Value::Object(map)) => map.is_empty(),
            Some(Value::Null) => true,
            Some(_) | None => false,
        };
        if empty {
            Err(Violation::new(
                self.kind(),
                &self.field,
                format!("{} must not be empty", self.field),
            ))
        } else {
            Ok(())
        }
    }
}

#[derive(Debug)]
struct OneOf {
    field: String,
    values: Vec<Value>,
}

impl Rule for OneOf {
    fn kind(&self) -> &str {
        "one_of"
    }

    fn check(&self, payload: &Value) -> Result<(), Violation> {
        match lookup(payload, &self.field) {
            Some(value) if !self.values.contains(value) => {
                let allowed = self
                    .values
                    .iter()
                    .map(ToString::to_string)
                    .collect::<Vec<_>>()
                    .join(", ");
                Err(Violation::new(
                    self.kind(),
                    &self.field,
                    format!("{} must be one of [{allowed}], got {value}", self.field),
                ))
            }
            _ => Ok(()),
        }
    }
}

#[derive(Debug)]
struct Pattern {
    field: String,
    regex: Regex,
}

impl Rule for Pattern {
    fn kind(&self) -> &str {
        "pattern"
    }

    fn check(&self, payload: &Value) -> Result<(), Violation> {
        match lookup(payload, &self.field) {
            Some(Value::String(s)) if self.regex.is_match(s) => Ok(()),
            Some(Value::String(_)) => {
                Err(Violation::new(
                    self.kind(),
                    &self.field,
                    format!("{} does not match pattern `{}`", self.field, self.regex),
                ))
            }
            Some(value) => {
                Err(Violation::new(
                    self.kind(),
                    &self.field,
                    format!("expected string, got {}", JsonType::of(value)),
                ))
            }
            None => Ok(()),
        }
    }
}
