// ABOUTME: Manifest templates with ((variable)) placeholders.
// ABOUTME: Applies ops, interpolates variables, and yields the interpolated bytes.

use super::error::ManifestError;
use super::ops::Ops;
use crate::types::sha256_hex;
use serde_yaml::{Mapping, Value};
use std::collections::BTreeMap;
use std::path::Path;

/// Variable values available to `((name))` placeholders.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Variables(BTreeMap<String, Value>);

impl Variables {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.0.insert(name.into(), value.into());
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Add every entry of `other`, overriding existing names.
    pub fn merge(&mut self, other: Variables) {
        self.0.extend(other.0);
    }

    /// Parse a `name=value` argument. The value is kept as a string.
    pub fn parse_assignment(arg: &str) -> Result<(String, Value), ManifestError> {
        match arg.split_once('=') {
            Some((name, value)) if !name.is_empty() => {
                Ok((name.to_string(), Value::String(value.to_string())))
            }
            _ => Err(ManifestError::InvalidVariable(arg.to_string())),
        }
    }

    /// Parse a `name=path` argument; the value is the file's contents.
    pub fn parse_file_assignment(arg: &str) -> Result<(String, Value), ManifestError> {
        let (name, path) = match arg.split_once('=') {
            Some((name, path)) if !name.is_empty() => (name, path),
            _ => return Err(ManifestError::InvalidVariable(arg.to_string())),
        };
        let contents = std::fs::read_to_string(path).map_err(|source| ManifestError::Read {
            path: path.into(),
            source,
        })?;
        Ok((name.to_string(), Value::String(contents)))
    }

    /// Load a YAML map of variables.
    pub fn from_yaml_file(path: &Path) -> Result<Self, ManifestError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ManifestError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let value: Value = serde_yaml::from_str(&raw).map_err(|source| ManifestError::Yaml {
            path: path.to_path_buf(),
            source,
        })?;

        match value {
            Value::Null => Ok(Self::new()),
            Value::Mapping(map) => {
                let mut vars = Self::new();
                for (key, value) in map {
                    if let Some(name) = key.as_str() {
                        vars.insert(name, value);
                    }
                }
                Ok(vars)
            }
            _ => Err(ManifestError::VariablesNotMap(path.to_path_buf())),
        }
    }

    /// Collect `PREFIX_name` environment variables as `name`.
    pub fn from_env_prefix(prefix: &str) -> Self {
        let prefix = format!("{prefix}_");
        let mut vars = Self::new();
        for (key, value) in std::env::vars() {
            if let Some(name) = key.strip_prefix(&prefix).filter(|n| !n.is_empty()) {
                vars.insert(name, parse_env_value(&value));
            }
        }
        vars
    }

    fn lookup(&self, name: &str) -> Option<&Value> {
        let mut segments = name.split('.');
        let mut current = self.0.get(segments.next()?)?;
        for segment in segments {
            current = current.as_mapping()?.get(segment)?;
        }
        Some(current)
    }
}

/// Environment values may carry YAML structure; anything unparseable stays a string.
fn parse_env_value(raw: &str) -> Value {
    match serde_yaml::from_str::<Value>(raw) {
        Ok(value @ (Value::Mapping(_) | Value::Sequence(_))) => value,
        _ => Value::String(raw.to_string()),
    }
}

/// A manifest as written on disk, before ops and variables.
#[derive(Debug, Clone)]
pub struct Template {
    value: Value,
}

impl Template {
    pub fn parse(raw: &str) -> Result<Self, ManifestError> {
        let value = serde_yaml::from_str(raw).map_err(ManifestError::Unmarshal)?;
        Ok(Self { value })
    }

    pub fn load(path: &Path) -> Result<Self, ManifestError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ManifestError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let value = serde_yaml::from_str(&raw).map_err(|source| ManifestError::Yaml {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self { value })
    }

    /// Apply `ops`, then substitute `vars`.
    pub fn evaluate(
        &self,
        vars: &Variables,
        ops: &Ops,
    ) -> Result<InterpolatedTemplate, ManifestError> {
        let mut value = self.value.clone();
        ops.apply(&mut value)?;

        let mut missing = Vec::new();
        interpolate(&mut value, vars, &mut missing);
        if !missing.is_empty() {
            missing.sort();
            missing.dedup();
            return Err(ManifestError::MissingVariables(missing));
        }

        let content = serde_yaml::to_string(&value).map_err(ManifestError::Unmarshal)?;
        Ok(InterpolatedTemplate { value, content })
    }
}

/// The result of evaluating a template: the final tree and its serialized form.
#[derive(Debug, Clone)]
pub struct InterpolatedTemplate {
    value: Value,
    content: String,
}

impl InterpolatedTemplate {
    pub fn value(&self) -> &Value {
        &self.value
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    /// SHA-256 of the interpolated content, the deployment's convergence key.
    pub fn sha(&self) -> String {
        sha256_hex(self.content.as_bytes())
    }

    pub fn deserialize<T: serde::de::DeserializeOwned>(&self) -> Result<T, ManifestError> {
        serde_yaml::from_value(self.value.clone()).map_err(ManifestError::Unmarshal)
    }
}

fn interpolate(value: &mut Value, vars: &Variables, missing: &mut Vec<String>) {
    match value {
        Value::String(s) => {
            if let Some(replacement) = interpolate_str(s, vars, missing) {
                *value = replacement;
            }
        }
        Value::Sequence(items) => {
            for item in items {
                interpolate(item, vars, missing);
            }
        }
        Value::Mapping(map) => {
            let entries = std::mem::take(map);
            let mut rebuilt = Mapping::with_capacity(entries.len());
            for (mut key, mut item) in entries {
                interpolate(&mut key, vars, missing);
                interpolate(&mut item, vars, missing);
                rebuilt.insert(key, item);
            }
            *map = rebuilt;
        }
        Value::Tagged(tagged) => interpolate(&mut tagged.value, vars, missing),
        Value::Null | Value::Bool(_) | Value::Number(_) => {}
    }
}

/// Substitute placeholders in one scalar. Returns `None` when nothing changed.
fn interpolate_str(s: &str, vars: &Variables, missing: &mut Vec<String>) -> Option<Value> {
    let placeholders = find_placeholders(s);
    if placeholders.is_empty() {
        return None;
    }

    // A scalar that is exactly one placeholder takes the variable's YAML value.
    if let [(start, end, name)] = placeholders.as_slice()
        && *start == 0
        && *end == s.len()
    {
        return match vars.lookup(name) {
            Some(v) => Some(v.clone()),
            None => {
                missing.push(name.to_string());
                None
            }
        };
    }

    let mut out = String::with_capacity(s.len());
    let mut cursor = 0;
    for (start, end, name) in &placeholders {
        out.push_str(&s[cursor..*start]);
        match vars.lookup(name) {
            Some(v) => out.push_str(&scalar_to_string(v)),
            None => {
                missing.push(name.to_string());
                out.push_str(&s[*start..*end]);
            }
        }
        cursor = *end;
    }
    out.push_str(&s[cursor..]);
    Some(Value::String(out))
}

fn find_placeholders(s: &str) -> Vec<(usize, usize, &str)> {
    let mut found = Vec::new();
    let mut offset = 0;
    while let Some(rel_start) = s[offset..].find("((") {
        let start = offset + rel_start;
        let Some(rel_end) = s[start + 2..].find("))") else {
            break;
        };
        let name_end = start + 2 + rel_end;
        let name = s[start + 2..name_end].trim();
        let name = name.strip_prefix('!').unwrap_or(name);
        if !name.is_empty() && name.chars().all(is_variable_char) {
            found.push((start, name_end + 2, name));
            offset = name_end + 2;
        } else {
            offset = start + 2;
        }
    }
    found
}

fn is_variable_char(c: char) -> bool {
    c.is_alphanumeric() || matches!(c, '_' | '-' | '.' | '/')
}

fn scalar_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::Null => String::new(),
        other => serde_yaml::to_string(other)
            .map(|s| s.trim_end().to_string())
            .unwrap_or_default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> Variables {
        let mut vars = Variables::new();
        for (k, v) in pairs {
            vars.insert(*k, *v);
        }
        vars
    }

    #[test]
    fn whole_placeholder_keeps_variable_type() {
        let template = Template::parse("size: ((size))\n").unwrap();
        let mut v = Variables::new();
        v.insert("size", 1024);

        let out = template.evaluate(&v, &Ops::default()).unwrap();
        assert_eq!(out.value()["size"], Value::from(1024));
    }

    #[test]
    fn embedded_placeholders_are_stringified() {
        let template = Template::parse("url: https://((host)):((port))/x\n").unwrap();
        let mut v = vars(&[("host", "10.0.0.6")]);
        v.insert("port", 6868);

        let out = template.evaluate(&v, &Ops::default()).unwrap();
        assert_eq!(out.value()["url"], Value::from("https://10.0.0.6:6868/x"));
    }

    #[test]
    fn dotted_names_index_into_maps() {
        let template = Template::parse("password: ((creds.password))\n").unwrap();
        let mut v = Variables::new();
        let nested: Value = serde_yaml::from_str("password: secret").unwrap();
        v.insert("creds", nested);

        let out = template.evaluate(&v, &Ops::default()).unwrap();
        assert_eq!(out.value()["password"], Value::from("secret"));
    }

    #[test]
    fn missing_variables_are_all_reported() {
        let template = Template::parse("a: ((one))\nb: x-((two))\n").unwrap();
        let err = template
            .evaluate(&Variables::new(), &Ops::default())
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "Expected to find variables: one, two"
        );
    }

    #[test]
    fn sha_depends_on_variable_values() {
        let template = Template::parse("name: ((name))\n").unwrap();
        let a = template
            .evaluate(&vars(&[("name", "a")]), &Ops::default())
            .unwrap();
        let b = template
            .evaluate(&vars(&[("name", "b")]), &Ops::default())
            .unwrap();
        assert_ne!(a.sha(), b.sha());
        assert_eq!(a.sha().len(), 64);
    }

    #[test]
    fn parse_assignment_requires_name() {
        assert!(Variables::parse_assignment("=value").is_err());
        assert!(Variables::parse_assignment("novalue").is_err());
        let (name, value) = Variables::parse_assignment("a=b=c").unwrap();
        assert_eq!(name, "a");
        assert_eq!(value, Value::from("b=c"));
    }
}
