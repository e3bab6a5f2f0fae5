//! Custom attributes and the data shared by all entities
//!
//! Entities accept arbitrary extra attributes, either as a map or as a
//! `"Key=Value;Key2=Value2"` definition string. Keys may be routed:
//!
//! - `Component:Attr` goes to the parent `Component` element
//! - `Custom:Attr` goes to the `Custom` scheduling elements of an action
//! - `{namespace}Attr` and `prefix:Attr` become namespaced attributes

use crate::error::{Result, WixError};
use crate::model::extension::WixExtension;
use crate::xml::Element;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Key holding an explicit component id
pub const COMPONENT_ID: &str = "Component:Id";
/// Key holding a component condition
pub const COMPONENT_CONDITION: &str = "Component:Condition";

/// Parse `"k=v;k2=v2"`. Both sides are trimmed and empty items skipped.
pub fn parse_definition(definition: &str) -> Result<Vec<(String, String)>> {
    let mut result = Vec::new();
    for item in definition.split(';') {
        let item = item.trim();
        if item.is_empty() {
            continue;
        }
        let (key, value) = item.split_once('=').ok_or_else(|| {
            WixError::InvalidModel(format!("Invalid attributes definition item: '{}'", item))
        })?;
        let key = key.trim();
        if key.is_empty() {
            return Err(WixError::InvalidModel(format!(
                "Attribute without name in definition: '{}'",
                item
            )));
        }
        result.push((key.to_string(), value.trim().to_string()));
    }
    Ok(result)
}

/// Data common to every model entity
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Entity {
    /// Explicit id. Filled in by the compiler when absent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    pub name: String,

    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub attributes: BTreeMap<String, String>,

    /// `"k=v;k2=v2"` form of [`Entity::attributes`]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attributes_definition: Option<String>,

    /// Names of the features the entity belongs to
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub features: Vec<String>,

    /// Whether `id` was generated rather than set by the user
    #[serde(skip)]
    pub auto_id: bool,
}

impl Entity {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Id, or an empty string before ids are assigned
    pub fn id(&self) -> &str {
        self.id.as_deref().unwrap_or("")
    }

    pub fn has_explicit_id(&self) -> bool {
        self.id.is_some() && !self.auto_id
    }

    /// Attributes from the definition string merged with the attribute map.
    /// Map entries win.
    pub fn all_attributes(&self) -> Result<Vec<(String, String)>> {
        let mut merged: BTreeMap<String, String> = BTreeMap::new();
        if let Some(definition) = &self.attributes_definition {
            merged.extend(parse_definition(definition)?);
        }
        merged.extend(self.attributes.clone());
        Ok(merged.into_iter().collect())
    }

    /// Fold the definition string into the attribute map. Map entries win.
    pub fn merge_attributes_definition(&mut self) -> Result<()> {
        let Some(definition) = self.attributes_definition.take() else {
            return Ok(());
        };
        for (key, value) in parse_definition(&definition)? {
            self.attributes.entry(key).or_insert(value);
        }
        Ok(())
    }

    pub fn set_attribute(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.attributes.insert(key.into(), value.into());
    }

    /// Write the custom attributes onto `element` unrouted. `Component:Id`
    /// and `Component:Condition` are left out; the rest is routed once the
    /// document is complete.
    pub fn apply_attributes(&self, element: &mut Element) -> Result<()> {
        for (key, value) in self.all_attributes()? {
            if key != COMPONENT_ID && key != COMPONENT_CONDITION {
                element.set_attr(key, value);
            }
        }
        Ok(())
    }

    pub fn component_id(&self) -> Option<&str> {
        self.attributes.get(COMPONENT_ID).map(String::as_str)
    }

    pub fn set_component_id(&mut self, id: impl Into<String>) {
        self.set_attribute(COMPONENT_ID, id);
    }

    pub fn component_condition(&self) -> Option<&str> {
        self.attributes.get(COMPONENT_CONDITION).map(String::as_str)
    }

    pub fn set_component_condition(&mut self, condition: impl Into<String>) {
        self.set_attribute(COMPONENT_CONDITION, condition);
    }
}

/// Custom attributes sorted by destination
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RoutedAttributes {
    /// Attributes of the entity's own element
    pub element: Vec<(String, String)>,
    /// Attributes of the parent `Component`
    pub component: Vec<(String, String)>,
    /// Attributes of the action's `Custom` elements
    pub custom: Vec<(String, String)>,
    /// Extensions whose namespaces the routed names use
    pub extensions: Vec<WixExtension>,
}

/// Route custom attributes. `Component:Id` and `Component:Condition` are
/// consumed by component emission and skipped here.
pub fn route_attributes(attributes: &[(String, String)]) -> Result<RoutedAttributes> {
    let mut routed = RoutedAttributes::default();
    let mut foreign_ns = 0usize;

    for (key, value) in attributes {
        if key == COMPONENT_ID || key == COMPONENT_CONDITION {
            continue;
        }

        if key.starts_with("Component:{") || key.starts_with("Custom:{") {
            return Err(WixError::InvalidModel(format!(
                "Syntax '{}' is not supported. Use 'Component:prefix:Attr' with a registered prefix",
                key
            )));
        }

        if let Some(name) = key.strip_prefix("Component:") {
            let name = resolve_prefixed(name, &mut routed.extensions);
            routed.component.push((name, value.clone()));
            continue;
        }

        if let Some(name) = key.strip_prefix("Custom:") {
            routed.custom.push((name.to_string(), value.clone()));
            continue;
        }

        if let Some(rest) = key.strip_prefix('{') {
            let (namespace, local) = rest.split_once('}').ok_or_else(|| {
                WixError::InvalidModel(format!("Unterminated namespace in attribute '{}'", key))
            })?;

            match WixExtension::from_namespace(namespace) {
                Some(ext) => {
                    let prefix = ext.prefix().unwrap_or_default().to_string();
                    push_extension(&mut routed.extensions, ext);
                    routed.element.push((format!("{}:{}", prefix, local), value.clone()));
                }
                None => {
                    let prefix = format!("ns{}", foreign_ns);
                    foreign_ns += 1;
                    routed
                        .element
                        .push((format!("xmlns:{}", prefix), namespace.to_string()));
                    routed.element.push((format!("{}:{}", prefix, local), value.clone()));
                }
            }
            continue;
        }

        let name = resolve_prefixed(key, &mut routed.extensions);
        routed.element.push((name, value.clone()));
    }

    Ok(routed)
}

fn resolve_prefixed(name: &str, extensions: &mut Vec<WixExtension>) -> String {
    if let Some((prefix, _)) = name.split_once(':') {
        if let Some(ext) = WixExtension::from_prefix(prefix) {
            push_extension(extensions, ext);
        }
    }
    name.to_string()
}

fn push_extension(extensions: &mut Vec<WixExtension>, ext: WixExtension) {
    if !extensions.contains(&ext) {
        extensions.push(ext);
    }
}

/// Set routed element attributes on `element`
pub fn apply_to_element(element: &mut Element, attributes: &[(String, String)]) {
    for (name, value) in attributes {
        element.set_attr(name.as_str(), value.as_str());
    }
}
