//! Installer properties

use crate::attributes::Entity;
use crate::model::registry::RegistryHive;
use serde::{Deserialize, Serialize};

/// `Property` element. The entity name is the property id.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Property {
    #[serde(flatten)]
    pub entity: Entity,
    pub value: String,
}

impl Property {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            entity: Entity::named(name),
            value: value.into(),
        }
    }

    pub fn name(&self) -> &str {
        &self.entity.name
    }
}

/// Reference to a property defined elsewhere (e.g. by an extension)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PropertyRef {
    pub id: Option<String>,
}

impl PropertyRef {
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: Some(id.into()) }
    }
}

/// Property initialized from a registry search
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegValueProperty {
    /// Property id
    #[serde(flatten)]
    pub entity: Entity,

    pub root: RegistryHive,
    pub key: String,

    /// Registry value name; empty reads the key's default value
    pub entry_name: String,

    /// Value used when the search finds nothing
    pub default_value: Option<String>,

    /// Search the 64-bit view. Follows the project platform when unset.
    pub win64: Option<bool>,
}

impl RegValueProperty {
    pub fn new(
        name: impl Into<String>,
        root: RegistryHive,
        key: impl Into<String>,
        entry_name: impl Into<String>,
    ) -> Self {
        Self {
            entity: Entity::named(name),
            root,
            key: key.into(),
            entry_name: entry_name.into(),
            ..Default::default()
        }
    }

    pub fn name(&self) -> &str {
        &self.entity.name
    }
}
