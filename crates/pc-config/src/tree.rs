//! The configuration tree and its typed lookup API.
//!
//! A [`ConfigTree`] is a value: every transformation returns a new tree and
//! leaves the receiver untouched, so a tree can be shared between readers
//! without locking. [`FrozenConfig`] is the read-only handle consumers keep
//! once all sentinels are resolved.

use std::fmt;
use std::ops::Deref;
use std::sync::Arc;

use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use tracing::debug;

use crate::error::{ConfigError, ConfigResult};
use crate::node::{Group, Leaf, SettingNode};
use crate::path::SettingPath;
use crate::sentinel::{self, SentinelRules};
use crate::value::SettingValue;

/// Root of a settings hierarchy.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ConfigTree {
    root: Group,
}

impl ConfigTree {
    /// Wrap a root group, re-checking every leaf value.
    pub fn new(root: Group) -> ConfigResult<Self> {
        let tree = ConfigTree { root };
        for (path, leaf) in tree.leaves() {
            leaf.admit(leaf.value.clone())
                .map_err(|message| ConfigError::type_mismatch(&path, message))?;
        }
        Ok(tree)
    }

    /// Wrap a root group whose leaves were already validated.
    pub(crate) fn from_validated(root: Group) -> Self {
        ConfigTree { root }
    }

    pub fn root(&self) -> &Group {
        &self.root
    }

    /// Find the node at a dotted path.
    pub fn node(&self, path: &str) -> ConfigResult<&SettingNode> {
        let path = SettingPath::parse(path)?;
        self.node_at(&path)
    }

    pub(crate) fn node_at(&self, path: &SettingPath) -> ConfigResult<&SettingNode> {
        let segments = path.segments();
        let mut group = &self.root;
        for (depth, segment) in segments.iter().enumerate() {
            let node = group.get(segment).ok_or_else(|| missing(path, depth))?;
            if depth + 1 == segments.len() {
                return Ok(node);
            }
            group = node.as_group().ok_or_else(|| not_a_group(path, depth))?;
        }
        Err(ConfigError::not_found(path, "the root is not a setting"))
    }

    fn node_at_mut(&mut self, path: &SettingPath) -> ConfigResult<&mut SettingNode> {
        let segments = path.segments();
        let mut group = &mut self.root;
        for (depth, segment) in segments.iter().enumerate() {
            let node = group.get_mut(segment).ok_or_else(|| missing(path, depth))?;
            if depth + 1 == segments.len() {
                return Ok(node);
            }
            group = match node {
                SettingNode::Group(child) => child,
                SettingNode::Leaf(_) => return Err(not_a_group(path, depth)),
            };
        }
        Err(ConfigError::not_found(path, "the root is not a setting"))
    }

    /// Find the leaf at a dotted path. Paths naming a group are not found.
    pub fn leaf(&self, path: &str) -> ConfigResult<&Leaf> {
        let path = SettingPath::parse(path)?;
        self.leaf_at(&path)
    }

    pub(crate) fn leaf_at(&self, path: &SettingPath) -> ConfigResult<&Leaf> {
        match self.node_at(path)? {
            SettingNode::Leaf(leaf) => Ok(leaf),
            SettingNode::Group(_) => Err(ConfigError::not_found(
                path,
                "names a group, not a setting",
            )),
        }
    }

    /// Current value of the setting at `path`.
    pub fn get(&self, path: &str) -> ConfigResult<&SettingValue> {
        self.leaf(path).map(|leaf| &leaf.value)
    }

    pub fn get_str(&self, path: &str) -> ConfigResult<&str> {
        let value = self.get(path)?;
        value.as_str().ok_or_else(|| wrong_type(path, "String", value))
    }

    pub fn get_i64(&self, path: &str) -> ConfigResult<i64> {
        let value = self.get(path)?;
        value.as_i64().ok_or_else(|| wrong_type(path, "Integer", value))
    }

    /// Float lookup; Integer settings are widened.
    pub fn get_f64(&self, path: &str) -> ConfigResult<f64> {
        let value = self.get(path)?;
        value.as_f64().ok_or_else(|| wrong_type(path, "Float", value))
    }

    pub fn get_bool(&self, path: &str) -> ConfigResult<bool> {
        let value = self.get(path)?;
        value.as_bool().ok_or_else(|| wrong_type(path, "Boolean", value))
    }

    pub fn get_list(&self, path: &str) -> ConfigResult<&[SettingValue]> {
        let value = self.get(path)?;
        value.as_list().ok_or_else(|| wrong_type(path, "List", value))
    }

    pub fn get_map(&self, path: &str) -> ConfigResult<&[(SettingValue, SettingValue)]> {
        let value = self.get(path)?;
        value.as_map().ok_or_else(|| wrong_type(path, "Map", value))
    }

    /// Return a copy of this tree with one setting replaced.
    ///
    /// The new value is checked against the setting's type, subtype and
    /// choices. Nothing else in the tree changes.
    pub fn with_override(
        &self,
        path: &str,
        value: impl Into<SettingValue>,
    ) -> ConfigResult<ConfigTree> {
        let path = SettingPath::parse(path)?;
        let leaf = self.leaf_at(&path)?;
        let value = leaf
            .admit(value.into())
            .map_err(|message| ConfigError::type_mismatch(&path, message))?;

        debug!(path = %path, value = %value, "override applied");
        let mut next = self.clone();
        next.set_value(&path, value)?;
        Ok(next)
    }

    /// Store an already admitted value.
    pub(crate) fn set_value(&mut self, path: &SettingPath, value: SettingValue) -> ConfigResult<()> {
        match self.node_at_mut(path)? {
            SettingNode::Leaf(leaf) => {
                leaf.value = value;
                Ok(())
            }
            SettingNode::Group(_) => Err(ConfigError::not_found(
                path,
                "names a group, not a setting",
            )),
        }
    }

    /// Replace every sentinel using `rules`. See [`sentinel::resolve`].
    pub fn resolve(&self, rules: &SentinelRules) -> ConfigResult<ConfigTree> {
        sentinel::resolve(self, rules)
    }

    /// All leaves, depth-first in declaration order.
    pub fn leaves(&self) -> Vec<(SettingPath, &Leaf)> {
        let mut out = Vec::new();
        collect_leaves(&self.root, &SettingPath::root(), &mut out);
        out
    }

    /// Paths of leaves that still hold the sentinel.
    pub fn sentinel_paths(&self) -> Vec<SettingPath> {
        self.leaves()
            .into_iter()
            .filter(|(_, leaf)| leaf.is_sentinel())
            .map(|(path, _)| path)
            .collect()
    }

    pub fn is_resolved(&self) -> bool {
        self.leaves().iter().all(|(_, leaf)| !leaf.is_sentinel())
    }

    /// Flatten to `dotted path -> value`, depth-first in declaration order.
    pub fn to_flat_map(&self) -> FlatMap {
        FlatMap {
            entries: self
                .leaves()
                .into_iter()
                .map(|(path, leaf)| (path.to_string(), leaf.value.clone()))
                .collect(),
        }
    }

    /// Rebuild a tree by applying every flat entry to `schema`.
    ///
    /// Each entry goes through the same checks as [`ConfigTree::with_override`].
    pub fn from_flat_map(schema: &ConfigTree, flat: &FlatMap) -> ConfigResult<ConfigTree> {
        let mut tree = schema.clone();
        for (path, value) in flat.iter() {
            let path = SettingPath::parse(path)?;
            let admitted = tree
                .leaf_at(&path)?
                .admit(value.clone())
                .map_err(|message| ConfigError::type_mismatch(&path, message))?;
            tree.set_value(&path, admitted)?;
        }
        Ok(tree)
    }

    /// Freeze a fully resolved tree for sharing between consumers.
    pub fn freeze(self) -> ConfigResult<FrozenConfig> {
        if let Some(path) = self.sentinel_paths().first() {
            return Err(ConfigError::unresolved(
                path,
                "tree must be resolved before it is frozen",
            ));
        }
        Ok(FrozenConfig {
            tree: Arc::new(self),
        })
    }
}

fn collect_leaves<'a>(
    group: &'a Group,
    prefix: &SettingPath,
    out: &mut Vec<(SettingPath, &'a Leaf)>,
) {
    for (name, node) in group.children() {
        let path = prefix.child(name);
        match node {
            SettingNode::Leaf(leaf) => out.push((path, leaf)),
            SettingNode::Group(child) => collect_leaves(child, &path, out),
        }
    }
}

fn missing(path: &SettingPath, depth: usize) -> ConfigError {
    let name = &path.segments()[depth];
    let parent = if depth == 0 {
        "the root".to_string()
    } else {
        format!("'{}'", path.prefix(depth))
    };
    ConfigError::not_found(path, format!("no setting named '{name}' in {parent}"))
}

fn not_a_group(path: &SettingPath, depth: usize) -> ConfigError {
    ConfigError::not_found(
        path,
        format!("'{}' is a setting, not a group", path.prefix(depth + 1)),
    )
}

fn wrong_type(path: &str, expected: &str, value: &SettingValue) -> ConfigError {
    ConfigError::type_mismatch(
        path,
        format!("expected {expected}, found {}", value.value_type()),
    )
}

/// Ordered `dotted path -> value` mapping produced by [`ConfigTree::to_flat_map`].
///
/// Serializes as a map in entry order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FlatMap {
    entries: Vec<(String, SettingValue)>,
}

impl FlatMap {
    pub fn new() -> Self {
        FlatMap::default()
    }

    /// Append an entry, replacing an existing entry for the same path in place.
    pub fn insert(&mut self, path: impl Into<String>, value: SettingValue) {
        let path = path.into();
        match self.entries.iter_mut().find(|(p, _)| *p == path) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((path, value)),
        }
    }

    pub fn get(&self, path: &str) -> Option<&SettingValue> {
        self.entries
            .iter()
            .find(|(p, _)| p == path)
            .map(|(_, v)| v)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &SettingValue)> {
        self.entries.iter().map(|(p, v)| (p.as_str(), v))
    }

    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(p, _)| p.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl FromIterator<(String, SettingValue)> for FlatMap {
    fn from_iter<I: IntoIterator<Item = (String, SettingValue)>>(iter: I) -> Self {
        let mut flat = FlatMap::new();
        for (path, value) in iter {
            flat.insert(path, value);
        }
        flat
    }
}

impl fmt::Display for FlatMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (path, value) in &self.entries {
            writeln!(f, "{path} = {value}")?;
        }
        Ok(())
    }
}

impl Serialize for FlatMap {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (path, value) in &self.entries {
            map.serialize_entry(path, value)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for FlatMap {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct FlatMapVisitor;

        impl<'de> Visitor<'de> for FlatMapVisitor {
            type Value = FlatMap;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a map of dotted setting paths to values")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<FlatMap, A::Error> {
                let mut flat = FlatMap::new();
                while let Some((path, value)) = access.next_entry::<String, SettingValue>()? {
                    flat.insert(path, value);
                }
                Ok(flat)
            }
        }

        deserializer.deserialize_map(FlatMapVisitor)
    }
}

/// A resolved tree shared read-only between consumers.
#[derive(Debug, Clone)]
pub struct FrozenConfig {
    tree: Arc<ConfigTree>,
}

impl FrozenConfig {
    pub fn tree(&self) -> &ConfigTree {
        &self.tree
    }
}

impl Deref for FrozenConfig {
    type Target = ConfigTree;

    fn deref(&self) -> &ConfigTree {
        &self.tree
    }
}
