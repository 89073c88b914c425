//! Setting types and values.
//!
//! A [`SettingValue`] is a tagged variant covering every type a manifest may
//! declare. Conformance checks in this module also perform the two numeric
//! coercions the manifest format allows:
//! - integer literals on Float settings are widened,
//! - whole-number floats on Integer settings are narrowed; any fractional
//!   part is a mismatch.
//!
//! NaN and the infinities are never admitted.

use serde::{Deserialize, Serialize};
use serde_yaml::{Mapping, Value};
use std::fmt;

/// The placeholder meaning "derive this value at resolution time".
pub const SENTINEL: &str = "+";

/// Declared type of a setting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ValueType {
    String,
    Integer,
    Float,
    Boolean,
    List,
    Map,
}

impl ValueType {
    /// All supported types, in manifest documentation order.
    pub const ALL: &'static [ValueType] = &[
        ValueType::String,
        ValueType::Integer,
        ValueType::Float,
        ValueType::Boolean,
        ValueType::List,
        ValueType::Map,
    ];

    /// Name as written in manifests.
    pub fn as_str(&self) -> &'static str {
        match self {
            ValueType::String => "String",
            ValueType::Integer => "Integer",
            ValueType::Float => "Float",
            ValueType::Boolean => "Boolean",
            ValueType::List => "List",
            ValueType::Map => "Map",
        }
    }

    /// Parse a manifest type name. Type names are not case-sensitive.
    pub fn parse(s: &str) -> Option<ValueType> {
        match s.to_lowercase().as_str() {
            "string" => Some(ValueType::String),
            "integer" => Some(ValueType::Integer),
            "float" => Some(ValueType::Float),
            "boolean" => Some(ValueType::Boolean),
            "list" => Some(ValueType::List),
            "map" => Some(ValueType::Map),
            _ => None,
        }
    }

    /// Whether this type holds a single scalar.
    pub fn is_scalar(&self) -> bool {
        !matches!(self, ValueType::List | ValueType::Map)
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Element type(s) of a container setting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SubType {
    /// Element type of a `List`.
    Element(ValueType),
    /// Key and value types of a `Map`.
    Pair(ValueType, ValueType),
}

impl fmt::Display for SubType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SubType::Element(ty) => write!(f, "{ty}"),
            SubType::Pair(key, value) => write!(f, "[{key}, {value}]"),
        }
    }
}

/// A concrete setting value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SettingValue {
    String(String),
    Integer(i64),
    Float(f64),
    Boolean(bool),
    List(Vec<SettingValue>),
    /// Ordered key/value pairs. Keys are unique.
    Map(Vec<(SettingValue, SettingValue)>),
}

impl SettingValue {
    /// The type this value carries as-is, before any coercion.
    pub fn value_type(&self) -> ValueType {
        match self {
            SettingValue::String(_) => ValueType::String,
            SettingValue::Integer(_) => ValueType::Integer,
            SettingValue::Float(_) => ValueType::Float,
            SettingValue::Boolean(_) => ValueType::Boolean,
            SettingValue::List(_) => ValueType::List,
            SettingValue::Map(_) => ValueType::Map,
        }
    }

    /// Whether this is the `+` placeholder.
    pub fn is_sentinel(&self) -> bool {
        matches!(self, SettingValue::String(s) if s == SENTINEL)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            SettingValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            SettingValue::Integer(i) => Some(*i),
            _ => None,
        }
    }

    /// Float view of the value; integers are widened.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            SettingValue::Float(f) => Some(*f),
            SettingValue::Integer(i) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            SettingValue::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[SettingValue]> {
        match self {
            SettingValue::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&[(SettingValue, SettingValue)]> {
        match self {
            SettingValue::Map(entries) => Some(entries),
            _ => None,
        }
    }

    /// Look up a map entry by key.
    pub fn map_get(&self, key: &SettingValue) -> Option<&SettingValue> {
        self.as_map()?
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v)
    }

    /// Convert a YAML document node into a value.
    pub fn from_yaml(value: &Value) -> Result<SettingValue, String> {
        match value {
            Value::Null => Err("null is not a valid setting value".to_string()),
            Value::Bool(b) => Ok(SettingValue::Boolean(*b)),
            Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Ok(SettingValue::Integer(i))
                } else if n.is_f64() {
                    n.as_f64()
                        .map(SettingValue::Float)
                        .ok_or_else(|| format!("unrepresentable number {n}"))
                } else {
                    Err(format!("integer {n} is out of range"))
                }
            }
            Value::String(s) => Ok(SettingValue::String(s.clone())),
            Value::Sequence(items) => items
                .iter()
                .map(SettingValue::from_yaml)
                .collect::<Result<Vec<_>, _>>()
                .map(SettingValue::List),
            Value::Mapping(mapping) => mapping
                .iter()
                .map(|(k, v)| Ok((SettingValue::from_yaml(k)?, SettingValue::from_yaml(v)?)))
                .collect::<Result<Vec<_>, String>>()
                .map(SettingValue::Map),
            Value::Tagged(tagged) => Err(format!("tagged value {} is not supported", tagged.tag)),
        }
    }

    /// Convert back into a YAML document node.
    pub fn to_yaml(&self) -> Value {
        match self {
            SettingValue::String(s) => Value::String(s.clone()),
            SettingValue::Integer(i) => Value::Number((*i).into()),
            SettingValue::Float(f) => Value::Number((*f).into()),
            SettingValue::Boolean(b) => Value::Bool(*b),
            SettingValue::List(items) => {
                Value::Sequence(items.iter().map(SettingValue::to_yaml).collect())
            }
            SettingValue::Map(entries) => {
                let mut mapping = Mapping::new();
                for (k, v) in entries {
                    mapping.insert(k.to_yaml(), v.to_yaml());
                }
                Value::Mapping(mapping)
            }
        }
    }
}

impl fmt::Display for SettingValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SettingValue::String(s) => write!(f, "{s}"),
            SettingValue::Integer(i) => write!(f, "{i}"),
            SettingValue::Float(x) => write!(f, "{x:?}"),
            SettingValue::Boolean(b) => write!(f, "{b}"),
            SettingValue::List(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{item}")?;
                }
                write!(f, "]")
            }
            SettingValue::Map(entries) => {
                write!(f, "{{")?;
                for (i, (k, v)) in entries.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{k}: {v}")?;
                }
                write!(f, "}}")
            }
        }
    }
}

impl From<&str> for SettingValue {
    fn from(s: &str) -> Self {
        SettingValue::String(s.to_string())
    }
}

impl From<String> for SettingValue {
    fn from(s: String) -> Self {
        SettingValue::String(s)
    }
}

impl From<i64> for SettingValue {
    fn from(i: i64) -> Self {
        SettingValue::Integer(i)
    }
}

impl From<i32> for SettingValue {
    fn from(i: i32) -> Self {
        SettingValue::Integer(i64::from(i))
    }
}

impl From<f64> for SettingValue {
    fn from(f: f64) -> Self {
        SettingValue::Float(f)
    }
}

impl From<bool> for SettingValue {
    fn from(b: bool) -> Self {
        SettingValue::Boolean(b)
    }
}

impl<T: Into<SettingValue>> From<Vec<T>> for SettingValue {
    fn from(items: Vec<T>) -> Self {
        SettingValue::List(items.into_iter().map(Into::into).collect())
    }
}

/// Narrow a float to an integer when it has no fractional part.
fn whole_number(f: f64) -> Option<i64> {
    // i64::MAX as f64 rounds up to 2^63, which is already out of range.
    if f.is_finite() && f.fract() == 0.0 && f >= i64::MIN as f64 && f < i64::MAX as f64 {
        Some(f as i64)
    } else {
        None
    }
}

/// Coerce a value to a scalar type.
pub(crate) fn coerce_scalar(value: SettingValue, ty: ValueType) -> Result<SettingValue, String> {
    match (ty, value) {
        (ValueType::String, v @ SettingValue::String(_)) => Ok(v),
        (ValueType::Boolean, v @ SettingValue::Boolean(_)) => Ok(v),
        (ValueType::Integer, v @ SettingValue::Integer(_)) => Ok(v),
        (ValueType::Integer, SettingValue::Float(f)) => whole_number(f)
            .map(SettingValue::Integer)
            .ok_or_else(|| format!("expected Integer, got Float {f:?} with a fractional part")),
        (ValueType::Float, SettingValue::Float(f)) if !f.is_finite() => {
            Err(format!("expected a finite Float, got {f:?}"))
        }
        (ValueType::Float, v @ SettingValue::Float(_)) => Ok(v),
        (ValueType::Float, SettingValue::Integer(i)) => Ok(SettingValue::Float(i as f64)),
        (ty, other) => Err(format!("expected {ty}, got {}", other.value_type())),
    }
}

/// Check `value` against a declared type and subtype, returning the coerced value.
pub(crate) fn conform(
    value: SettingValue,
    ty: ValueType,
    sub_type: Option<&SubType>,
) -> Result<SettingValue, String> {
    match ty {
        ValueType::List => {
            let Some(SubType::Element(element)) = sub_type else {
                return Err("List requires an element SubType".to_string());
            };
            match value {
                SettingValue::List(items) => items
                    .into_iter()
                    .enumerate()
                    .map(|(i, item)| {
                        coerce_scalar(item, *element).map_err(|e| format!("element {i}: {e}"))
                    })
                    .collect::<Result<Vec<_>, _>>()
                    .map(SettingValue::List),
                other => Err(format!("expected List, got {}", other.value_type())),
            }
        }
        ValueType::Map => {
            let Some(SubType::Pair(key_type, value_type)) = sub_type else {
                return Err("Map requires a [key, value] SubType".to_string());
            };
            match value {
                SettingValue::Map(entries) => {
                    let mut out: Vec<(SettingValue, SettingValue)> =
                        Vec::with_capacity(entries.len());
                    for (k, v) in entries {
                        let key = coerce_scalar(k, *key_type).map_err(|e| format!("key: {e}"))?;
                        let value = coerce_scalar(v, *value_type)
                            .map_err(|e| format!("value of '{key}': {e}"))?;
                        if out.iter().any(|(existing, _)| *existing == key) {
                            return Err(format!("duplicate map key '{key}'"));
                        }
                        out.push((key, value));
                    }
                    Ok(SettingValue::Map(out))
                }
                other => Err(format!("expected Map, got {}", other.value_type())),
            }
        }
        scalar => coerce_scalar(value, scalar),
    }
}
