//! Typed, hierarchical settings for the patch_cnn transcription model.
//!
//! This crate provides:
//! - Manifest parsing into a tree of typed settings (`manifest`)
//! - Validation of values against declared types, subtypes and choices
//! - Immutable overrides and typed lookups (`tree`, `overrides`)
//! - Resolution of the `+` "derive from another setting" sentinel (`sentinel`)
//! - Manifest discovery (explicit → env → XDG → system → built-in)
//! - Config snapshots for session telemetry
//!
//! ```
//! use pc_config::{patch_cnn, SettingValue};
//!
//! let tree = patch_cnn::default_tree()?;
//! assert_eq!(tree.get("Feature.BinsPerOctave")?, &SettingValue::Integer(48));
//!
//! let tree = tree.with_override("Inference.MaxMethod", "prior")?;
//! let frozen = tree.resolve(&patch_cnn::default_rules())?.freeze()?;
//! assert_eq!(frozen.get_str("Dataset.FeatureSavePath")?, "./feature");
//! # Ok::<(), pc_config::ConfigError>(())
//! ```

pub mod discover;
pub mod error;
pub mod manifest;
pub mod node;
pub mod overrides;
pub mod patch_cnn;
pub mod path;
pub mod sentinel;
pub mod snapshot;
pub mod tree;
pub mod value;

pub use discover::{discover_manifest, load_discovered, LoadedManifest, ManifestSource};
pub use error::{ConfigError, ConfigResult};
pub use manifest::load;
pub use node::{Group, Leaf, SettingNode};
pub use overrides::{apply_assignments, Assignment};
pub use path::SettingPath;
pub use sentinel::{Combinator, DeriveRule, SentinelRules};
pub use snapshot::ConfigSnapshot;
pub use tree::{ConfigTree, FlatMap, FrozenConfig};
pub use value::{SettingValue, SubType, ValueType, SENTINEL};

/// Schema version of the manifest format.
pub const MANIFEST_SCHEMA_VERSION: &str = "1.0.0";
