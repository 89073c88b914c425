//! Dotted setting paths such as `Feature.PatchSize`.

use crate::error::{ConfigError, ConfigResult};
use std::fmt;
use std::str::FromStr;

/// A parsed dotted path. The empty path denotes the root group.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct SettingPath {
    segments: Vec<String>,
}

impl SettingPath {
    /// The root of a tree.
    pub fn root() -> Self {
        SettingPath::default()
    }

    /// Parse a dotted path. Empty paths and empty segments are rejected.
    pub fn parse(text: &str) -> ConfigResult<Self> {
        if text.trim().is_empty() {
            return Err(ConfigError::not_found(text, "empty path"));
        }
        let segments: Vec<String> = text.split('.').map(|s| s.trim().to_string()).collect();
        if segments.iter().any(String::is_empty) {
            return Err(ConfigError::not_found(text, "path contains an empty segment"));
        }
        Ok(SettingPath { segments })
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    /// Last segment, i.e. the setting or group name.
    pub fn name(&self) -> Option<&str> {
        self.segments.last().map(String::as_str)
    }

    /// Path of a direct child.
    pub fn child(&self, name: &str) -> Self {
        let mut segments = self.segments.clone();
        segments.push(name.to_string());
        SettingPath { segments }
    }

    /// Dotted prefix made of the first `len` segments.
    pub(crate) fn prefix(&self, len: usize) -> String {
        self.segments[..len.min(self.segments.len())].join(".")
    }
}

impl fmt::Display for SettingPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.segments.is_empty() {
            write!(f, "<root>")
        } else {
            write!(f, "{}", self.segments.join("."))
        }
    }
}

impl FromStr for SettingPath {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SettingPath::parse(s)
    }
}
