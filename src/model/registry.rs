//! Registry values

use crate::attributes::Entity;
use crate::model::condition::Condition;
use serde::{Deserialize, Serialize};

/// Registry root key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum RegistryHive {
    #[default]
    #[serde(alias = "hklm")]
    HKLM,
    #[serde(alias = "hkcu")]
    HKCU,
    #[serde(alias = "hkcr")]
    HKCR,
    #[serde(alias = "hku")]
    HKU,
    /// HKLM for per-machine installs, HKCU otherwise
    #[serde(alias = "hkmu")]
    HKMU,
}

impl RegistryHive {
    pub fn as_str(&self) -> &'static str {
        match self {
            RegistryHive::HKLM => "HKLM",
            RegistryHive::HKCU => "HKCU",
            RegistryHive::HKCR => "HKCR",
            RegistryHive::HKU => "HKU",
            RegistryHive::HKMU => "HKMU",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_uppercase().as_str() {
            "HKLM" | "HKEY_LOCAL_MACHINE" => Some(RegistryHive::HKLM),
            "HKCU" | "HKEY_CURRENT_USER" => Some(RegistryHive::HKCU),
            "HKCR" | "HKEY_CLASSES_ROOT" => Some(RegistryHive::HKCR),
            "HKU" | "HKEY_USERS" => Some(RegistryHive::HKU),
            "HKMU" => Some(RegistryHive::HKMU),
            _ => None,
        }
    }
}

/// Registry value data
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RegValueData {
    Integer(i32),
    /// Type inferred from the content: `\n` makes it multi-string, `%`
    /// expandable.
    String(String),
    Binary(Vec<u8>),
}

impl Default for RegValueData {
    fn default() -> Self {
        RegValueData::String(String::new())
    }
}

impl RegValueData {
    /// WiX `RegistryValue/@Type`
    pub fn type_str(&self) -> &'static str {
        match self {
            RegValueData::Integer(_) => "integer",
            RegValueData::Binary(_) => "binary",
            RegValueData::String(s) if s.contains('\n') => "multiString",
            RegValueData::String(s) if s.contains('%') => "expandable",
            RegValueData::String(_) => "string",
        }
    }

    /// Value text; binary data as uppercase hex
    pub fn value_string(&self) -> String {
        match self {
            RegValueData::Integer(i) => i.to_string(),
            RegValueData::String(s) => s.clone(),
            RegValueData::Binary(bytes) => bytes.iter().map(|b| format!("{:02X}", b)).collect(),
        }
    }
}

/// `RegistryKey/@Action`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RegistryKeyAction {
    #[default]
    None,
    Create,
    CreateAndRemoveOnUninstall,
}

impl RegistryKeyAction {
    pub fn as_str(&self) -> Option<&'static str> {
        match self {
            RegistryKeyAction::None => None,
            RegistryKeyAction::Create => Some("create"),
            RegistryKeyAction::CreateAndRemoveOnUninstall => Some("createAndRemoveOnUninstall"),
        }
    }
}

/// Registry value written on install. The entity name is the value name;
/// empty writes the key's default value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegValue {
    #[serde(flatten)]
    pub entity: Entity,

    pub root: RegistryHive,
    pub key: String,
    pub value: RegValueData,

    /// Write to the 64-bit view
    pub win64: bool,

    pub key_action: RegistryKeyAction,
    pub force_create_on_install: bool,
    pub force_delete_on_uninstall: bool,
    pub condition: Option<Condition>,
}

impl RegValue {
    pub fn new(
        root: RegistryHive,
        key: impl Into<String>,
        name: impl Into<String>,
        value: RegValueData,
    ) -> Self {
        Self {
            entity: Entity::named(name),
            root,
            key: key.into(),
            value,
            ..Default::default()
        }
    }

    pub fn string(
        root: RegistryHive,
        key: impl Into<String>,
        name: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        Self::new(root, key, name, RegValueData::String(value.into()))
    }

    pub fn feature(mut self, feature: impl Into<String>) -> Self {
        self.entity.features.push(feature.into());
        self
    }
}
