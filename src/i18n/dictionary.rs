use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;

/// One value of a flat locale file.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum Entry {
    Text(String),
    List(Vec<String>),
    Other(Value),
}

impl Entry {
    pub(crate) fn as_scalar(&self) -> Option<String> {
        match self {
            Entry::Text(text) => Some(text.clone()),
            Entry::Other(Value::Number(number)) => Some(number.to_string()),
            Entry::Other(Value::Bool(flag)) => Some(flag.to_string()),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Dictionary {
    entries: HashMap<String, Entry>,
}

impl Dictionary {
    pub fn parse(raw: &str) -> Result<Self> {
        let value: Value =
            serde_json::from_str(raw).with_context(|| "failed to parse locale JSON")?;
        let Value::Object(map) = value else {
            return Err(anyhow!("locale JSON must be an object of flat keys"));
        };
        let mut entries = HashMap::with_capacity(map.len());
        for (key, value) in map {
            let entry = serde_json::from_value(value)
                .with_context(|| format!("invalid locale entry '{}'", key))?;
            entries.insert(key, entry);
        }
        Ok(Self { entries })
    }

    pub fn get(&self, key: &str) -> Option<&Entry> {
        self.entries.get(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Named values substituted into `{name}` placeholders.
#[derive(Debug, Clone, Default)]
pub struct Params {
    values: Vec<(String, String)>,
}

impl Params {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: impl Into<String>, value: impl fmt::Display) -> Self {
        self.values.push((name.into(), value.to_string()));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    fn get(&self, name: &str) -> Option<&str> {
        self.values
            .iter()
            .rev()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }
}

/// Single left-to-right pass; substituted values are never re-scanned and
/// placeholders without a matching param are copied through.
pub fn interpolate(template: &str, params: &Params) -> String {
    if params.is_empty() {
        return template.to_string();
    }
    let mut output = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(open) = rest.find('{') {
        output.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        let Some(close) = after.find('}') else {
            output.push_str(&rest[open..]);
            return output;
        };
        let name = &after[..close];
        match params.get(name) {
            Some(value) if !name.contains('{') => output.push_str(value),
            _ => {
                output.push('{');
                rest = after;
                continue;
            }
        }
        rest = &after[close + 1..];
    }
    output.push_str(rest);
    output
}
