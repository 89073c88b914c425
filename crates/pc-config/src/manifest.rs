//! Manifest parsing and serialization.
//!
//! A manifest is a YAML (or JSON) document:
//!
//! ```yaml
//! Feature:
//!   Description: Default settings of feature extraction
//!   Settings:
//!     PatchSize:
//!       Description: Input size of the feature
//!       Type: Integer
//!       Value: 25
//! ```
//!
//! A mapping with a `Type` key is a leaf. A mapping with a `Settings` key is
//! a group whose children live under `Settings`. Any other mapping is a group
//! whose children are all keys except `Description`. Key order is kept.

use std::fmt;

use serde::de::{self, Deserialize, Deserializer, MapAccess, SeqAccess, Visitor};
use serde_yaml::{Mapping, Number, Value};
use tracing::debug;

use crate::error::{ConfigError, ConfigResult};
use crate::node::{Group, Leaf, SettingNode};
use crate::path::SettingPath;
use crate::tree::ConfigTree;
use crate::value::{SettingValue, SubType, ValueType};

const KEY_DESCRIPTION: &str = "Description";
const KEY_SETTINGS: &str = "Settings";
const KEY_TYPE: &str = "Type";
const KEY_SUB_TYPE: &str = "SubType";
const KEY_VALUE: &str = "Value";
const KEY_CHOICES: &str = "Choices";

const LEAF_KEYS: &[&str] = &[KEY_DESCRIPTION, KEY_TYPE, KEY_SUB_TYPE, KEY_VALUE, KEY_CHOICES];

/// Parse and validate a manifest document.
pub fn load(text: &str) -> ConfigResult<ConfigTree> {
    let raw: RawNode = serde_yaml::from_str(text)
        .map_err(|e| ConfigError::Parse(format!("Invalid manifest: {e}")))?;
    let doc = raw.into_value(&SettingPath::root())?;
    load_value(&doc)
}

/// Validate an already parsed manifest document.
pub fn load_value(doc: &Value) -> ConfigResult<ConfigTree> {
    let root_path = SettingPath::root();
    let mapping = doc
        .as_mapping()
        .ok_or_else(|| ConfigError::schema(&root_path, "manifest root must be a mapping"))?;
    let root = parse_group(&root_path, mapping)?;
    let tree = ConfigTree::from_validated(root);
    debug!(
        sections = tree.root().len(),
        settings = tree.leaves().len(),
        "manifest loaded"
    );
    Ok(tree)
}

fn parse_node(path: &SettingPath, value: &Value) -> ConfigResult<SettingNode> {
    let mapping = value.as_mapping().ok_or_else(|| {
        ConfigError::schema(path, "expected a mapping describing a group or a setting")
    })?;
    match mapping.get(KEY_TYPE) {
        Some(Value::String(_)) => parse_leaf(path, mapping).map(SettingNode::Leaf),
        // A bare group holding a setting that happens to be named `Type`.
        Some(Value::Mapping(_)) | None => parse_group(path, mapping).map(SettingNode::Group),
        Some(_) => Err(ConfigError::schema(
            path,
            "Type must be a type name; a group with a setting named 'Type' must list it under 'Settings:'",
        )),
    }
}

fn parse_group(path: &SettingPath, mapping: &Mapping) -> ConfigResult<Group> {
    let description = optional_string(path, mapping, KEY_DESCRIPTION)?;
    let mut group = Group::new(description);

    let (children, wrapped) = match mapping.get(KEY_SETTINGS) {
        Some(Value::Mapping(settings)) => (settings, true),
        Some(Value::Null) => return Ok(group),
        Some(_) => return Err(ConfigError::schema(path, "Settings must be a mapping")),
        None => (mapping, false),
    };

    if wrapped {
        if let Some(extra) = mapping
            .keys()
            .find(|k| !matches!(k.as_str(), Some(KEY_DESCRIPTION | KEY_SETTINGS)))
        {
            return Err(ConfigError::schema(
                path,
                format!("unexpected key {} next to Settings", describe_key(extra)),
            ));
        }
    }

    for (key, child) in children {
        let name = key.as_str().ok_or_else(|| {
            ConfigError::schema(path, format!("setting names must be strings, got {}", describe_key(key)))
        })?;
        if !wrapped && name == KEY_DESCRIPTION {
            continue;
        }
        let node = parse_node(&path.child(name), child)?;
        group
            .insert(name, node)
            .map_err(|message| ConfigError::schema(path, message))?;
    }
    Ok(group)
}

fn parse_leaf(path: &SettingPath, mapping: &Mapping) -> ConfigResult<Leaf> {
    if let Some(unknown) = mapping
        .keys()
        .find(|k| !k.as_str().is_some_and(|k| LEAF_KEYS.contains(&k)))
    {
        return Err(ConfigError::schema(
            path,
            format!("unknown setting attribute {}", describe_key(unknown)),
        ));
    }

    let description = optional_string(path, mapping, KEY_DESCRIPTION)?;
    let type_name = mapping
        .get(KEY_TYPE)
        .and_then(Value::as_str)
        .ok_or_else(|| ConfigError::schema(path, "Type must be a string"))?;
    let value_type = parse_type(path, type_name)?;

    let sub_type = mapping
        .get(KEY_SUB_TYPE)
        .map(|raw| parse_sub_type(path, value_type, raw))
        .transpose()?;

    let raw_value = mapping
        .get(KEY_VALUE)
        .ok_or_else(|| ConfigError::schema(path, "missing Value"))?;
    let value = SettingValue::from_yaml(raw_value)
        .map_err(|message| ConfigError::schema(path, message))?;

    let choices = match mapping.get(KEY_CHOICES) {
        Some(Value::Sequence(items)) => Some(
            items
                .iter()
                .map(SettingValue::from_yaml)
                .collect::<Result<Vec<_>, _>>()
                .map_err(|message| ConfigError::schema(path, message))?,
        ),
        Some(_) => return Err(ConfigError::schema(path, "Choices must be a list")),
        None => None,
    };

    Leaf::new(description, value_type, sub_type, value, choices)
        .map_err(|message| ConfigError::schema(path, message))
}

fn parse_type(path: &SettingPath, name: &str) -> ConfigResult<ValueType> {
    ValueType::parse(name).ok_or_else(|| {
        let supported: Vec<&str> = ValueType::ALL.iter().map(ValueType::as_str).collect();
        ConfigError::schema(
            path,
            format!("unsupported type '{name}'; expected one of {}", supported.join(", ")),
        )
    })
}

/// `SubType: Float` or `SubType: [Float]` for lists, `SubType: [String, String]` for maps.
fn parse_sub_type(path: &SettingPath, value_type: ValueType, raw: &Value) -> ConfigResult<SubType> {
    let names: Vec<&str> = match raw {
        Value::String(name) => vec![name.as_str()],
        Value::Sequence(items) => items
            .iter()
            .map(|item| {
                item.as_str()
                    .ok_or_else(|| ConfigError::schema(path, "SubType entries must be type names"))
            })
            .collect::<ConfigResult<Vec<_>>>()?,
        _ => return Err(ConfigError::schema(path, "SubType must be a type name or a list")),
    };
    let types = names
        .iter()
        .map(|name| parse_type(path, name))
        .collect::<ConfigResult<Vec<_>>>()?;

    match (value_type, types.as_slice()) {
        (ValueType::Map, [key, value]) => Ok(SubType::Pair(*key, *value)),
        (ValueType::Map, _) => Err(ConfigError::schema(
            path,
            "Map SubType must list exactly two types: [key, value]",
        )),
        (_, [element]) => Ok(SubType::Element(*element)),
        _ => Err(ConfigError::schema(
            path,
            format!("{value_type} SubType must name a single type"),
        )),
    }
}

fn optional_string(path: &SettingPath, mapping: &Mapping, key: &str) -> ConfigResult<Option<String>> {
    match mapping.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(_) => Err(ConfigError::schema(path, format!("{key} must be a string"))),
    }
}

fn describe_key(key: &Value) -> String {
    match key.as_str() {
        Some(s) => format!("'{s}'"),
        None => serde_yaml::to_string(key)
            .map(|s| s.trim().to_string())
            .unwrap_or_else(|_| "<unprintable>".to_string()),
    }
}

/// A YAML node as written. Mapping entries stay in source order and repeated
/// keys are kept, so they can be reported with their location.
enum RawNode {
    Null,
    Bool(bool),
    Number(Number),
    String(String),
    Sequence(Vec<RawNode>),
    Mapping(Vec<(RawNode, RawNode)>),
}

impl RawNode {
    /// Convert into a YAML value, rejecting repeated mapping keys.
    fn into_value(self, path: &SettingPath) -> ConfigResult<Value> {
        Ok(match self {
            RawNode::Null => Value::Null,
            RawNode::Bool(b) => Value::Bool(b),
            RawNode::Number(n) => Value::Number(n),
            RawNode::String(s) => Value::String(s),
            RawNode::Sequence(items) => Value::Sequence(
                items
                    .into_iter()
                    .map(|item| item.into_value(path))
                    .collect::<ConfigResult<Vec<_>>>()?,
            ),
            RawNode::Mapping(entries) => {
                let mut mapping = Mapping::with_capacity(entries.len());
                for (key, value) in entries {
                    let key = key.into_value(path)?;
                    let child = match key.as_str() {
                        Some(KEY_SETTINGS) | None => path.clone(),
                        Some(name) => path.child(name),
                    };
                    let value = value.into_value(&child)?;
                    if mapping.contains_key(&key) {
                        return Err(ConfigError::schema(
                            path,
                            format!("duplicate key {}", describe_key(&key)),
                        ));
                    }
                    mapping.insert(key, value);
                }
                Value::Mapping(mapping)
            }
        })
    }
}

impl<'de> Deserialize<'de> for RawNode {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(RawNodeVisitor)
    }
}

struct RawNodeVisitor;

impl<'de> Visitor<'de> for RawNodeVisitor {
    type Value = RawNode;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a YAML value")
    }

    fn visit_bool<E: de::Error>(self, v: bool) -> Result<RawNode, E> {
        Ok(RawNode::Bool(v))
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<RawNode, E> {
        Ok(RawNode::Number(v.into()))
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<RawNode, E> {
        Ok(RawNode::Number(v.into()))
    }

    fn visit_f64<E: de::Error>(self, v: f64) -> Result<RawNode, E> {
        Ok(RawNode::Number(v.into()))
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<RawNode, E> {
        Ok(RawNode::String(v.to_string()))
    }

    fn visit_string<E: de::Error>(self, v: String) -> Result<RawNode, E> {
        Ok(RawNode::String(v))
    }

    fn visit_unit<E: de::Error>(self) -> Result<RawNode, E> {
        Ok(RawNode::Null)
    }

    fn visit_none<E: de::Error>(self) -> Result<RawNode, E> {
        Ok(RawNode::Null)
    }

    fn visit_some<D: Deserializer<'de>>(self, deserializer: D) -> Result<RawNode, D::Error> {
        RawNode::deserialize(deserializer)
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<RawNode, A::Error> {
        let mut items = Vec::new();
        while let Some(item) = seq.next_element()? {
            items.push(item);
        }
        Ok(RawNode::Sequence(items))
    }

    fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<RawNode, A::Error> {
        let mut entries = Vec::new();
        while let Some(entry) = map.next_entry()? {
            entries.push(entry);
        }
        Ok(RawNode::Mapping(entries))
    }
}

/// Serialize a tree back into manifest form.
///
/// Nested groups are written with a `Settings` block; loading the result
/// reproduces the same tree.
pub fn to_manifest(tree: &ConfigTree) -> Value {
    let root = tree.root();
    let mut mapping = Mapping::new();
    if let Some(description) = &root.description {
        mapping.insert(KEY_DESCRIPTION.into(), description.clone().into());
    }
    for (name, node) in root.children() {
        mapping.insert(name.into(), node_to_manifest(node));
    }
    Value::Mapping(mapping)
}

/// [`to_manifest`] rendered as YAML text.
pub fn to_manifest_string(tree: &ConfigTree) -> ConfigResult<String> {
    serde_yaml::to_string(&to_manifest(tree))
        .map_err(|e| ConfigError::Parse(format!("Failed to render manifest: {e}")))
}

fn node_to_manifest(node: &SettingNode) -> Value {
    let mut mapping = Mapping::new();
    match node {
        SettingNode::Group(group) => {
            if let Some(description) = &group.description {
                mapping.insert(KEY_DESCRIPTION.into(), description.clone().into());
            }
            let mut settings = Mapping::new();
            for (name, child) in group.children() {
                settings.insert(name.into(), node_to_manifest(child));
            }
            mapping.insert(KEY_SETTINGS.into(), Value::Mapping(settings));
        }
        SettingNode::Leaf(leaf) => {
            if let Some(description) = &leaf.description {
                mapping.insert(KEY_DESCRIPTION.into(), description.clone().into());
            }
            mapping.insert(KEY_TYPE.into(), leaf.value_type.as_str().into());
            match leaf.sub_type {
                Some(SubType::Element(element)) => {
                    mapping.insert(KEY_SUB_TYPE.into(), element.as_str().into());
                }
                Some(SubType::Pair(key, value)) => {
                    mapping.insert(
                        KEY_SUB_TYPE.into(),
                        Value::Sequence(vec![key.as_str().into(), value.as_str().into()]),
                    );
                }
                None => {}
            }
            mapping.insert(KEY_VALUE.into(), leaf.value.to_yaml());
            if let Some(choices) = &leaf.choices {
                mapping.insert(
                    KEY_CHOICES.into(),
                    Value::Sequence(choices.iter().map(SettingValue::to_yaml).collect()),
                );
            }
        }
    }
    Value::Mapping(mapping)
}
