//! Features
//!
//! Features are declared as a tree on the project and referenced by name
//! from the entities that belong to them.

use crate::attributes::Entity;
use crate::model::condition::Condition;
use serde::{Deserialize, Serialize};

/// Condition that changes a feature's install level
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureCondition {
    pub condition: Condition,
    pub level: i32,
}

/// Installable feature
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Feature {
    /// `name` is also the feature title
    #[serde(flatten)]
    pub entity: Entity,

    pub description: Option<String>,

    /// Installed by default (level 1) or not (level 2)
    pub is_enabled: bool,

    /// Whether the user may deselect the feature
    pub allow_change: bool,

    /// Directory id the user may change from the feature tree UI
    pub configurable_dir: Option<String>,

    pub condition: Option<FeatureCondition>,

    pub children: Vec<Feature>,
}

impl Default for Feature {
    fn default() -> Self {
        Self {
            entity: Entity::default(),
            description: None,
            is_enabled: true,
            allow_change: true,
            configurable_dir: None,
            condition: None,
            children: Vec::new(),
        }
    }
}

impl Feature {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            entity: Entity::named(name),
            ..Default::default()
        }
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn disabled(mut self) -> Self {
        self.is_enabled = false;
        self
    }

    pub fn locked(mut self) -> Self {
        self.allow_change = false;
        self
    }

    pub fn child(mut self, child: Feature) -> Self {
        self.children.push(child);
        self
    }

    pub fn name(&self) -> &str {
        &self.entity.name
    }

    /// This feature and all descendants, depth-first
    pub fn all_features(&self) -> Vec<&Feature> {
        let mut result = vec![self];
        for child in &self.children {
            result.extend(child.all_features());
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let feature = Feature::new("Complete");
        assert!(feature.is_enabled);
        assert!(feature.allow_change);
        assert_eq!(feature.name(), "Complete");
    }

    #[test]
    fn test_all_features() {
        let tree = Feature::new("Main")
            .child(Feature::new("Docs").child(Feature::new("Samples")))
            .child(Feature::new("Tools").disabled());

        let names: Vec<&str> = tree.all_features().iter().map(|f| f.name()).collect();
        assert_eq!(names, vec!["Main", "Docs", "Samples", "Tools"]);
    }

    #[test]
    fn test_deserialize_yaml() {
        let yaml = "name: Main\nis_enabled: false\nchildren:\n  - name: Docs\n";
        let feature: Feature = serde_yaml::from_str(yaml).unwrap();
        assert!(!feature.is_enabled);
        assert!(feature.allow_change);
        assert_eq!(feature.children[0].name(), "Docs");
    }
}
