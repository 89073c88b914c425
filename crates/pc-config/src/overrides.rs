//! `Path=value` assignments, as typed by a user on a command line or in an
//! environment variable.
//!
//! The value text is read as a YAML literal (`31`, `0.5`, `true`,
//! `[0.24, 0.6]`, `{Melody: path}`), then checked against the target
//! setting exactly like any other override. String settings take the text
//! verbatim when it does not read as a YAML string, so `General.Mode=123`
//! stores `"123"`.

use std::str::FromStr;

use serde_yaml::Value;
use tracing::debug;

use crate::error::{ConfigError, ConfigResult};
use crate::node::Leaf;
use crate::path::SettingPath;
use crate::tree::ConfigTree;
use crate::value::{SettingValue, ValueType};

/// A parsed `Path=value` pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Assignment {
    pub path: SettingPath,
    /// Value text after the first `=`, trimmed.
    pub raw: String,
}

impl Assignment {
    /// Parse `Path=value`. Only the first `=` separates path and value.
    pub fn parse(text: &str) -> ConfigResult<Self> {
        let invalid = |message: &str| ConfigError::InvalidAssignment {
            text: text.to_string(),
            message: message.to_string(),
        };
        let (path, raw) = text
            .split_once('=')
            .ok_or_else(|| invalid("expected Path=value"))?;
        let path = SettingPath::parse(path.trim()).map_err(|_| invalid("invalid setting path"))?;
        Ok(Assignment {
            path,
            raw: raw.trim().to_string(),
        })
    }

    /// Interpret the value text for `leaf`.
    pub fn value_for(&self, leaf: &Leaf) -> ConfigResult<SettingValue> {
        let parsed: Option<Value> = serde_yaml::from_str(&self.raw).ok();
        if leaf.value_type == ValueType::String {
            return Ok(match parsed {
                Some(Value::String(s)) => SettingValue::String(s),
                _ => SettingValue::String(self.raw.clone()),
            });
        }
        match parsed {
            Some(doc) => SettingValue::from_yaml(&doc)
                .map_err(|message| ConfigError::type_mismatch(&self.path, message)),
            None => Err(ConfigError::type_mismatch(
                &self.path,
                format!("'{}' is not a valid {} literal", self.raw, leaf.value_type),
            )),
        }
    }
}

impl FromStr for Assignment {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Assignment::parse(s)
    }
}

/// Apply assignments in order. The first failure aborts the whole batch.
pub fn apply_assignments<'a>(
    tree: &ConfigTree,
    assignments: impl IntoIterator<Item = &'a Assignment>,
) -> ConfigResult<ConfigTree> {
    let mut next = tree.clone();
    let mut applied = 0usize;
    for assignment in assignments {
        let leaf = next.leaf_at(&assignment.path)?;
        let value = assignment.value_for(leaf)?;
        let admitted = leaf
            .admit(value)
            .map_err(|message| ConfigError::type_mismatch(&assignment.path, message))?;
        next.set_value(&assignment.path, admitted)?;
        applied += 1;
    }
    debug!(applied, "assignments applied");
    Ok(next)
}

/// Parse and apply a batch of `Path=value` strings.
pub fn apply_strs<S: AsRef<str>>(tree: &ConfigTree, texts: &[S]) -> ConfigResult<ConfigTree> {
    let assignments = texts
        .iter()
        .map(|text| Assignment::parse(text.as_ref()))
        .collect::<ConfigResult<Vec<_>>>()?;
    apply_assignments(tree, &assignments)
}
