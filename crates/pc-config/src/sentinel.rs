//! Sentinel resolution.
//!
//! A String setting holding `+` derives its value from another setting. The
//! derivations are passed in explicitly as [`SentinelRules`]; nothing is
//! looked up implicitly.

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{ConfigError, ConfigResult};
use crate::path::SettingPath;
use crate::tree::ConfigTree;
use crate::value::{SettingValue, ValueType};

/// How a derived value is built from its source value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Combinator {
    /// Use the source value unchanged.
    Copy,
    /// Append a path component to the source path.
    Join(String),
}

impl Combinator {
    pub fn apply(&self, source: &str) -> String {
        match self {
            Combinator::Copy => source.to_string(),
            Combinator::Join(component) => Path::new(source)
                .join(component)
                .to_string_lossy()
                .into_owned(),
        }
    }
}

/// Derivation of one setting from another.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeriveRule {
    /// Dotted path of the setting the value derives from.
    pub source: String,
    pub combinator: Combinator,
}

/// Table of derivation rules keyed by target path.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SentinelRules {
    rules: Vec<(String, DeriveRule)>,
}

impl SentinelRules {
    pub fn new() -> Self {
        SentinelRules::default()
    }

    /// Add or replace the rule for `target`.
    pub fn insert(&mut self, target: &str, source: &str, combinator: Combinator) {
        let rule = DeriveRule {
            source: source.to_string(),
            combinator,
        };
        match self.rules.iter_mut().find(|(t, _)| t == target) {
            Some(entry) => entry.1 = rule,
            None => self.rules.push((target.to_string(), rule)),
        }
    }

    /// Builder-style [`SentinelRules::insert`].
    pub fn derive(mut self, target: &str, source: &str, combinator: Combinator) -> Self {
        self.insert(target, source, combinator);
        self
    }

    pub fn get(&self, target: &str) -> Option<&DeriveRule> {
        self.rules
            .iter()
            .find(|(t, _)| t == target)
            .map(|(_, rule)| rule)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &DeriveRule)> {
        self.rules.iter().map(|(t, rule)| (t.as_str(), rule))
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

/// Replace every sentinel in `tree` with its derived value.
///
/// A source that is itself a sentinel is derived first. Settings that do not
/// hold the sentinel are left alone, so resolving a resolved tree returns an
/// equal tree. Rules for settings that are not sentinels are ignored.
pub fn resolve(tree: &ConfigTree, rules: &SentinelRules) -> ConfigResult<ConfigTree> {
    let pending = tree.sentinel_paths();
    if pending.is_empty() {
        return Ok(tree.clone());
    }

    let mut resolver = Resolver {
        tree,
        rules,
        resolved: HashMap::new(),
        visiting: Vec::new(),
    };
    let mut next = tree.clone();
    for target in &pending {
        let derived = resolver.derive(target)?;
        let admitted = tree
            .leaf_at(target)?
            .admit(SettingValue::String(derived))
            .map_err(|message| ConfigError::type_mismatch(target, message))?;
        next.set_value(target, admitted)?;
    }

    debug!(count = pending.len(), "sentinels resolved");
    Ok(next)
}

struct Resolver<'a> {
    tree: &'a ConfigTree,
    rules: &'a SentinelRules,
    resolved: HashMap<String, String>,
    visiting: Vec<String>,
}

impl Resolver<'_> {
    fn derive(&mut self, target: &SettingPath) -> ConfigResult<String> {
        let key = target.to_string();
        if let Some(value) = self.resolved.get(&key) {
            return Ok(value.clone());
        }
        if self.visiting.contains(&key) {
            let mut chain = self.visiting.clone();
            chain.push(key);
            return Err(ConfigError::unresolved(
                target,
                format!("cyclic derivation {}", chain.join(" -> ")),
            ));
        }

        let (tree, rules) = (self.tree, self.rules);
        let rule = rules
            .get(&key)
            .ok_or_else(|| ConfigError::unresolved(target, "no derivation rule for this setting"))?;
        let source_path = SettingPath::parse(&rule.source)?;
        let source = tree.leaf_at(&source_path)?;
        if source.value_type != ValueType::String {
            return Err(ConfigError::type_mismatch(
                &source_path,
                format!(
                    "derivation source for {target} must be a String setting, found {}",
                    source.value_type
                ),
            ));
        }

        let base = if source.is_sentinel() {
            self.visiting.push(key.clone());
            let base = self.derive(&source_path);
            self.visiting.pop();
            base?
        } else {
            source.value.to_string()
        };

        let value = rule.combinator.apply(&base);
        debug!(target = %target, source = %source_path, value = %value, "sentinel derived");
        self.resolved.insert(key, value.clone());
        Ok(value)
    }
}
