//! Tree nodes: a node is either a group of named children or a typed leaf.

use crate::value::{conform, SettingValue, SubType, ValueType};

/// A terminal setting with a declared type and a current value.
#[derive(Debug, Clone, PartialEq)]
pub struct Leaf {
    pub description: Option<String>,
    pub value_type: ValueType,
    pub sub_type: Option<SubType>,
    pub value: SettingValue,
    pub choices: Option<Vec<SettingValue>>,
}

impl Leaf {
    /// Build a leaf, checking the declaration, the choices and the value.
    ///
    /// Choices and value are stored in coerced form (e.g. an integer default
    /// on a Float setting is stored as a float).
    pub fn new(
        description: Option<String>,
        value_type: ValueType,
        sub_type: Option<SubType>,
        value: SettingValue,
        choices: Option<Vec<SettingValue>>,
    ) -> Result<Leaf, String> {
        check_declaration(value_type, sub_type.as_ref())?;

        let choices = match choices {
            Some(raw) => Some(
                raw.into_iter()
                    .map(|choice| {
                        conform(choice, value_type, sub_type.as_ref())
                            .map_err(|e| format!("invalid choice: {e}"))
                    })
                    .collect::<Result<Vec<_>, _>>()?,
            ),
            None => None,
        };

        let mut leaf = Leaf {
            description,
            value_type,
            sub_type,
            value: SettingValue::Boolean(false),
            choices,
        };
        leaf.value = leaf.admit(value)?;
        Ok(leaf)
    }

    /// Check a candidate value against this leaf's type, subtype and choices.
    ///
    /// Returns the coerced value. The sentinel is accepted on String leaves
    /// regardless of choices.
    pub fn admit(&self, value: SettingValue) -> Result<SettingValue, String> {
        let value = conform(value, self.value_type, self.sub_type.as_ref())?;
        if self.value_type == ValueType::String && value.is_sentinel() {
            return Ok(value);
        }
        if let Some(choices) = &self.choices {
            if !choices.contains(&value) {
                let allowed: Vec<String> = choices.iter().map(ToString::to_string).collect();
                return Err(format!(
                    "'{value}' is not one of the choices [{}]",
                    allowed.join(", ")
                ));
            }
        }
        Ok(value)
    }

    /// Whether this leaf still holds the derivation placeholder.
    pub fn is_sentinel(&self) -> bool {
        self.value_type == ValueType::String && self.value.is_sentinel()
    }
}

fn check_declaration(value_type: ValueType, sub_type: Option<&SubType>) -> Result<(), String> {
    match (value_type, sub_type) {
        (ValueType::List, Some(SubType::Element(element))) if element.is_scalar() => Ok(()),
        (ValueType::Map, Some(SubType::Pair(key, value))) if key.is_scalar() && value.is_scalar() => {
            Ok(())
        }
        (ValueType::List, None) => Err("List requires a SubType".to_string()),
        (ValueType::Map, None) => Err("Map requires a SubType".to_string()),
        (ValueType::List | ValueType::Map, Some(sub)) => Err(format!(
            "SubType {sub} is not valid for {value_type}; container SubTypes must be scalar"
        )),
        (_, Some(_)) => Err(format!("SubType only applies to List and Map, not {value_type}")),
        (_, None) => Ok(()),
    }
}

/// A named collection of child nodes, kept in declaration order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Group {
    pub description: Option<String>,
    children: Vec<(String, SettingNode)>,
}

impl Group {
    pub fn new(description: Option<String>) -> Self {
        Group {
            description,
            children: Vec::new(),
        }
    }

    /// Append a child. Names must be non-empty, free of dots and surrounding
    /// whitespace, and unique.
    pub fn insert(&mut self, name: &str, node: SettingNode) -> Result<(), String> {
        if name.is_empty() {
            return Err("setting names must not be empty".to_string());
        }
        if name.trim() != name {
            return Err(format!(
                "setting name '{name}' must not start or end with whitespace"
            ));
        }
        if name.contains('.') {
            return Err(format!("setting name '{name}' must not contain '.'"));
        }
        if self.get(name).is_some() {
            return Err(format!("duplicate setting name '{name}'"));
        }
        self.children.push((name.to_string(), node));
        Ok(())
    }

    /// Builder-style [`Group::insert`].
    pub fn with(mut self, name: &str, node: impl Into<SettingNode>) -> Result<Self, String> {
        self.insert(name, node.into())?;
        Ok(self)
    }

    pub fn get(&self, name: &str) -> Option<&SettingNode> {
        self.children
            .iter()
            .find(|(child, _)| child == name)
            .map(|(_, node)| node)
    }

    pub(crate) fn get_mut(&mut self, name: &str) -> Option<&mut SettingNode> {
        self.children
            .iter_mut()
            .find(|(child, _)| child == name)
            .map(|(_, node)| node)
    }

    /// Children in declaration order.
    pub fn children(&self) -> impl Iterator<Item = (&str, &SettingNode)> {
        self.children.iter().map(|(name, node)| (name.as_str(), node))
    }

    pub fn len(&self) -> usize {
        self.children.len()
    }

    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }
}

/// Either a group or a leaf.
#[derive(Debug, Clone, PartialEq)]
pub enum SettingNode {
    Group(Group),
    Leaf(Leaf),
}

impl SettingNode {
    pub fn as_leaf(&self) -> Option<&Leaf> {
        match self {
            SettingNode::Leaf(leaf) => Some(leaf),
            SettingNode::Group(_) => None,
        }
    }

    pub fn as_group(&self) -> Option<&Group> {
        match self {
            SettingNode::Group(group) => Some(group),
            SettingNode::Leaf(_) => None,
        }
    }

    pub fn description(&self) -> Option<&str> {
        match self {
            SettingNode::Group(group) => group.description.as_deref(),
            SettingNode::Leaf(leaf) => leaf.description.as_deref(),
        }
    }
}

impl From<Leaf> for SettingNode {
    fn from(leaf: Leaf) -> Self {
        SettingNode::Leaf(leaf)
    }
}

impl From<Group> for SettingNode {
    fn from(group: Group) -> Self {
        SettingNode::Group(group)
    }
}
