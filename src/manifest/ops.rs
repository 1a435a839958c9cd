// ABOUTME: Patch operations (replace/remove) applied to manifest trees.
// ABOUTME: Paths address map keys, indices, appends, and name=value matches.

use super::error::ManifestError;
use serde::Deserialize;
use serde_yaml::{Mapping, Value};
use std::fmt;
use std::path::Path;

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Key { key: String, optional: bool },
    Index(i64),
    Append,
    Matching {
        key: String,
        value: String,
        optional: bool,
    },
}

/// A parsed ops path such as `/instance_groups/name=bosh/jobs/-`.
#[derive(Debug, Clone, PartialEq)]
pub struct OpsPath {
    raw: String,
    tokens: Vec<Token>,
}

impl OpsPath {
    pub fn parse(raw: &str) -> Result<Self, ManifestError> {
        let invalid = |reason: &str| ManifestError::InvalidOpsPath {
            path: raw.to_string(),
            reason: reason.to_string(),
        };

        let rest = raw
            .strip_prefix('/')
            .ok_or_else(|| invalid("must start with '/'"))?;
        if rest.is_empty() {
            return Ok(Self {
                raw: raw.to_string(),
                tokens: Vec::new(),
            });
        }

        let mut tokens = Vec::new();
        // Once a token is optional, everything below it is too.
        let mut optional = false;
        for segment in rest.split('/') {
            let segment = segment.replace("~1", "/").replace("~0", "~");
            let (segment, marked) = match segment.strip_suffix('?') {
                Some(s) => (s.to_string(), true),
                None => (segment, false),
            };
            optional |= marked;

            if segment.is_empty() {
                return Err(invalid("empty path segment"));
            }

            let token = if segment == "-" {
                Token::Append
            } else if let Ok(index) = segment.parse::<i64>() {
                Token::Index(index)
            } else if let Some((key, value)) = segment.split_once('=') {
                Token::Matching {
                    key: key.to_string(),
                    value: value.to_string(),
                    optional,
                }
            } else {
                Token::Key {
                    key: segment,
                    optional,
                }
            };
            tokens.push(token);
        }

        if let Some(pos) = tokens.iter().position(|t| *t == Token::Append)
            && pos != tokens.len() - 1
        {
            return Err(invalid("'-' may only be the last segment"));
        }

        Ok(Self {
            raw: raw.to_string(),
            tokens,
        })
    }
}

impl fmt::Display for OpsPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Op {
    Replace { path: OpsPath, value: Value },
    Remove { path: OpsPath },
}

#[derive(Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
enum OpDefinition {
    Replace { path: String, value: Value },
    Remove { path: String },
}

/// An ordered list of operations.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Ops(Vec<Op>);

impl Ops {
    pub fn new(ops: Vec<Op>) -> Self {
        Self(ops)
    }

    pub fn parse(raw: &str) -> Result<Self, ManifestError> {
        let defs: Option<Vec<OpDefinition>> =
            serde_yaml::from_str(raw).map_err(ManifestError::Unmarshal)?;
        defs.unwrap_or_default()
            .into_iter()
            .map(|def| match def {
                OpDefinition::Replace { path, value } => Ok(Op::Replace {
                    path: OpsPath::parse(&path)?,
                    value,
                }),
                OpDefinition::Remove { path } => Ok(Op::Remove {
                    path: OpsPath::parse(&path)?,
                }),
            })
            .collect::<Result<Vec<_>, _>>()
            .map(Self)
    }

    pub fn from_file(path: &Path) -> Result<Self, ManifestError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ManifestError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&raw).map_err(ManifestError::in_manifest("Parsing ops file", path))
    }

    pub fn extend(&mut self, other: Ops) {
        self.0.extend(other.0);
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn apply(&self, doc: &mut Value) -> Result<(), ManifestError> {
        for (idx, op) in self.0.iter().enumerate() {
            let result = match op {
                Op::Replace { path, value } => replace(doc, &path.tokens, value.clone()),
                Op::Remove { path } => remove(doc, &path.tokens),
            };
            result.map_err(|reason| {
                let path = match op {
                    Op::Replace { path, .. } | Op::Remove { path } => path,
                };
                ManifestError::Ops(format!("Error applying op {idx} at '{path}': {reason}"))
            })?;
        }
        Ok(())
    }
}

fn replace(node: &mut Value, tokens: &[Token], value: Value) -> Result<(), String> {
    let Some((token, rest)) = tokens.split_first() else {
        *node = value;
        return Ok(());
    };

    match token {
        Token::Key { key, optional } => {
            if node.is_null() && *optional {
                *node = Value::Mapping(Mapping::new());
            }
            let map = node
                .as_mapping_mut()
                .ok_or_else(|| format!("expected a map to look up key '{key}'"))?;
            let key_value = Value::String(key.clone());
            if rest.is_empty() {
                map.insert(key_value, value);
                return Ok(());
            }
            if !map.contains_key(&key_value) {
                if !*optional {
                    return Err(format!("expected to find a map key '{key}'"));
                }
                map.insert(key_value.clone(), empty_container_for(&rest[0]));
            }
            let child = map
                .get_mut(&key_value)
                .ok_or_else(|| format!("expected to find a map key '{key}'"))?;
            replace(child, rest, value)
        }
        Token::Index(index) => {
            let items = as_sequence(node)?;
            let idx = resolve_index(*index, items.len())?;
            replace(&mut items[idx], rest, value)
        }
        Token::Append => {
            if node.is_null() {
                *node = Value::Sequence(Vec::new());
            }
            as_sequence(node)?.push(value);
            Ok(())
        }
        Token::Matching {
            key,
            value: wanted,
            optional,
        } => {
            if node.is_null() && *optional {
                *node = Value::Sequence(Vec::new());
            }
            let items = as_sequence(node)?;
            let matches = matching_indices(items, key, wanted);
            let idx = match matches.as_slice() {
                [idx] => *idx,
                [] if *optional => {
                    let mut entry = Mapping::new();
                    entry.insert(Value::String(key.clone()), Value::String(wanted.clone()));
                    items.push(Value::Mapping(entry));
                    items.len() - 1
                }
                [] => return Err(format!("expected to find exactly one item matching '{key}={wanted}', found none")),
                many => {
                    return Err(format!(
                        "expected to find exactly one item matching '{key}={wanted}', found {}",
                        many.len()
                    ));
                }
            };
            replace(&mut items[idx], rest, value)
        }
    }
}

fn remove(node: &mut Value, tokens: &[Token]) -> Result<(), String> {
    let Some((token, rest)) = tokens.split_first() else {
        return Err("cannot remove the document root".to_string());
    };

    match token {
        Token::Key { key, optional } => {
            let Some(map) = node.as_mapping_mut() else {
                return if *optional {
                    Ok(())
                } else {
                    Err(format!("expected a map to look up key '{key}'"))
                };
            };
            let key_value = Value::String(key.clone());
            if !map.contains_key(&key_value) {
                return if *optional {
                    Ok(())
                } else {
                    Err(format!("expected to find a map key '{key}'"))
                };
            }
            if rest.is_empty() {
                map.remove(&key_value);
                return Ok(());
            }
            match map.get_mut(&key_value) {
                Some(child) => remove(child, rest),
                None => Ok(()),
            }
        }
        Token::Index(index) => {
            let items = as_sequence(node)?;
            let idx = resolve_index(*index, items.len())?;
            if rest.is_empty() {
                items.remove(idx);
                return Ok(());
            }
            remove(&mut items[idx], rest)
        }
        Token::Append => Err("cannot remove using '-'".to_string()),
        Token::Matching {
            key,
            value: wanted,
            optional,
        } => {
            let items = as_sequence(node)?;
            let matches = matching_indices(items, key, wanted);
            match matches.as_slice() {
                [idx] if rest.is_empty() => {
                    items.remove(*idx);
                    Ok(())
                }
                [idx] => remove(&mut items[*idx], rest),
                [] if *optional => Ok(()),
                found => Err(format!(
                    "expected to find exactly one item matching '{key}={wanted}', found {}",
                    found.len()
                )),
            }
        }
    }
}

fn as_sequence(node: &mut Value) -> Result<&mut Vec<Value>, String> {
    node.as_sequence_mut()
        .ok_or_else(|| "expected an array".to_string())
}

fn resolve_index(index: i64, len: usize) -> Result<usize, String> {
    let resolved = if index < 0 {
        len as i64 + index
    } else {
        index
    };
    if resolved < 0 || resolved as usize >= len {
        return Err(format!(
            "expected to find array index {index} but array has {len} items"
        ));
    }
    Ok(resolved as usize)
}

fn matching_indices(items: &[Value], key: &str, wanted: &str) -> Vec<usize> {
    items
        .iter()
        .enumerate()
        .filter(|(_, item)| {
            item.get(key)
                .map(|v| match v {
                    Value::String(s) => s == wanted,
                    Value::Number(n) => n.to_string() == wanted,
                    Value::Bool(b) => b.to_string() == wanted,
                    _ => false,
                })
                .unwrap_or(false)
        })
        .map(|(idx, _)| idx)
        .collect()
}

fn empty_container_for(next: &Token) -> Value {
    match next {
        Token::Key { .. } => Value::Mapping(Mapping::new()),
        Token::Index(_) | Token::Append | Token::Matching { .. } => Value::Sequence(Vec::new()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn doc(raw: &str) -> Value {
        serde_yaml::from_str(raw).unwrap()
    }

    #[test]
    fn replaces_matched_array_item_field() {
        let mut d = doc("jobs:\n- name: a\n  instances: 1\n- name: b\n  instances: 1\n");
        let ops = Ops::parse("- type: replace\n  path: /jobs/name=b/instances\n  value: 3\n").unwrap();

        ops.apply(&mut d).unwrap();

        assert_eq!(d["jobs"][1]["instances"], Value::from(3));
        assert_eq!(d["jobs"][0]["instances"], Value::from(1));
    }

    #[test]
    fn optional_path_creates_missing_structure() {
        let mut d = doc("name: env\n");
        let ops =
            Ops::parse("- type: replace\n  path: /cloud_provider?/properties/agent/mbus\n  value: x\n")
                .unwrap();

        ops.apply(&mut d).unwrap();

        assert_eq!(
            d["cloud_provider"]["properties"]["agent"]["mbus"],
            Value::from("x")
        );
    }

    #[test]
    fn append_pushes_onto_array() {
        let mut d = doc("releases: [{name: a}]\n");
        let ops = Ops::parse("- type: replace\n  path: /releases/-\n  value: {name: b}\n").unwrap();

        ops.apply(&mut d).unwrap();

        assert_eq!(d["releases"][1]["name"], Value::from("b"));
    }

    #[test]
    fn remove_deletes_key_and_fails_when_absent() {
        let mut d = doc("a: 1\nb: 2\n");
        Ops::parse("- type: remove\n  path: /a\n")
            .unwrap()
            .apply(&mut d)
            .unwrap();
        assert!(d.get("a").is_none());

        let err = Ops::parse("- type: remove\n  path: /a\n")
            .unwrap()
            .apply(&mut d)
            .unwrap_err();
        assert!(err.to_string().contains("expected to find a map key 'a'"));
    }

    #[test]
    fn negative_index_counts_from_end() {
        let mut d = doc("items: [1, 2, 3]\n");
        Ops::parse("- type: replace\n  path: /items/-1\n  value: 9\n")
            .unwrap()
            .apply(&mut d)
            .unwrap();
        assert_eq!(d["items"][2], Value::from(9));
    }

    #[test]
    fn path_must_be_absolute() {
        assert!(OpsPath::parse("jobs/0").is_err());
        assert!(OpsPath::parse("/jobs/-/name").is_err());
    }

    proptest! {
        #[test]
        fn plain_key_paths_round_trip(keys in proptest::collection::vec("[a-z_]{1,8}", 1..5)) {
            let raw = format!("/{}", keys.join("/"));
            let path = OpsPath::parse(&raw).unwrap();
            prop_assert_eq!(path.to_string(), raw);
            prop_assert_eq!(path.tokens.len(), keys.len());
        }

        #[test]
        fn optional_marker_propagates(depth in 1usize..5) {
            let raw = format!("/first?{}", "/k".repeat(depth));
            let path = OpsPath::parse(&raw).unwrap();
            for token in &path.tokens {
                let is_optional = matches!(token, Token::Key { optional: true, .. });
                prop_assert!(is_optional);
            }
        }
    }
}
