//! Major upgrade authoring
//!
//! Two flavours are supported: the WiX `MajorUpgrade` element, and the
//! explicit `Upgrade`/`UpgradeVersion` strategy with its own downgrade guard.

use crate::model::action::Step;
use crate::xml::Element;
use serde::{Deserialize, Serialize};

/// Placeholder replaced with the project version
pub const THIS_VERSION: &str = "%this%";

fn yes_no(value: bool) -> &'static str {
    if value {
        "yes"
    } else {
        "no"
    }
}

/// `MajorUpgrade/@Schedule`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum UpgradeSchedule {
    AfterInstallValidate,
    AfterInstallInitialize,
    AfterInstallExecute,
    AfterInstallExecuteAgain,
    AfterInstallFinalize,
}

impl UpgradeSchedule {
    pub fn as_str(&self) -> &'static str {
        match self {
            UpgradeSchedule::AfterInstallValidate => "afterInstallValidate",
            UpgradeSchedule::AfterInstallInitialize => "afterInstallInitialize",
            UpgradeSchedule::AfterInstallExecute => "afterInstallExecute",
            UpgradeSchedule::AfterInstallExecuteAgain => "afterInstallExecuteAgain",
            UpgradeSchedule::AfterInstallFinalize => "afterInstallFinalize",
        }
    }
}

/// The WiX `MajorUpgrade` element
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MajorUpgrade {
    pub allow_downgrades: Option<bool>,
    pub allow_same_version_upgrades: Option<bool>,
    pub disallow: Option<bool>,
    pub disallow_upgrade_error_message: Option<String>,
    pub downgrade_error_message: Option<String>,
    pub ignore_remove_failure: Option<bool>,
    pub migrate_features: Option<bool>,
    pub remove_features: Option<String>,
    pub schedule: Option<UpgradeSchedule>,
}

impl MajorUpgrade {
    /// Upgrade everything older, refuse newer versions with `message`
    pub fn with_downgrade_error(message: impl Into<String>) -> Self {
        Self {
            downgrade_error_message: Some(message.into()),
            ..Default::default()
        }
    }

    pub fn to_element(&self) -> Element {
        Element::new("MajorUpgrade")
            .attr_opt("AllowDowngrades", self.allow_downgrades.map(yes_no))
            .attr_opt(
                "AllowSameVersionUpgrades",
                self.allow_same_version_upgrades.map(yes_no),
            )
            .attr_opt("Disallow", self.disallow.map(yes_no))
            .attr_opt(
                "DisallowUpgradeErrorMessage",
                self.disallow_upgrade_error_message.clone(),
            )
            .attr_opt("DowngradeErrorMessage", self.downgrade_error_message.clone())
            .attr_opt("IgnoreRemoveFailure", self.ignore_remove_failure.map(yes_no))
            .attr_opt("MigrateFeatures", self.migrate_features.map(yes_no))
            .attr_opt("RemoveFeatures", self.remove_features.clone())
            .attr_opt("Schedule", self.schedule.map(|s| s.as_str()))
    }
}

/// Range of product versions matched by an `UpgradeVersion`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VersionRange {
    pub minimum: Option<String>,
    pub maximum: Option<String>,
    pub include_minimum: Option<bool>,
    pub include_maximum: Option<bool>,
    pub migrate_features: Option<bool>,
    pub only_detect: Option<bool>,
}

impl VersionRange {
    /// `[0.0.0.0, this)`
    pub fn older_than_this() -> Self {
        Self {
            minimum: Some("0.0.0.0".to_string()),
            maximum: Some(THIS_VERSION.to_string()),
            include_minimum: Some(true),
            include_maximum: Some(false),
            ..Default::default()
        }
    }

    /// `[0.0.0.0, this]`
    pub fn this_and_older() -> Self {
        Self {
            include_maximum: Some(true),
            ..Self::older_than_this()
        }
    }

    /// `(this, ...)`
    pub fn newer_than_this() -> Self {
        Self {
            minimum: Some(THIS_VERSION.to_string()),
            include_minimum: Some(false),
            ..Default::default()
        }
    }

    /// `[this, ...)`
    pub fn this_and_newer() -> Self {
        Self {
            minimum: Some(THIS_VERSION.to_string()),
            include_maximum: Some(true),
            ..Default::default()
        }
    }

    /// Versions referenced by the range, placeholders included
    pub fn versions(&self) -> impl Iterator<Item = &str> {
        self.minimum
            .as_deref()
            .into_iter()
            .chain(self.maximum.as_deref())
    }

    /// `UpgradeVersion` element setting `property` when a match is found.
    /// `%this%` is replaced with `version` in the bounds listed by `expand`.
    fn to_element(&self, property: &str, version: &str, expand_maximum: bool) -> Element {
        let expand = |v: &Option<String>| {
            v.as_deref().map(|v| {
                if v == THIS_VERSION {
                    version.to_string()
                } else {
                    v.to_string()
                }
            })
        };

        let maximum = if expand_maximum {
            expand(&self.maximum)
        } else {
            self.maximum.clone()
        };

        Element::new("UpgradeVersion")
            .attr_opt("Minimum", expand(&self.minimum))
            .attr_opt("Maximum", maximum)
            .attr_opt("IncludeMinimum", self.include_minimum.map(yes_no))
            .attr_opt("IncludeMaximum", self.include_maximum.map(yes_no))
            .attr_opt("OnlyDetect", self.only_detect.map(yes_no))
            .attr("Property", property)
            .attr_opt("MigrateFeatures", self.migrate_features.map(yes_no))
    }
}

/// Explicit `Upgrade` table authoring
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MajorUpgradeStrategy {
    pub upgrade_versions: Option<VersionRange>,
    pub prevent_downgrading_versions: Option<VersionRange>,
    pub remove_existing_product_after: Step,
    pub newer_product_installed_error_message: Option<String>,
}

impl Default for MajorUpgradeStrategy {
    fn default() -> Self {
        Self {
            upgrade_versions: Some(VersionRange::older_than_this()),
            prevent_downgrading_versions: Some(VersionRange::newer_than_this()),
            remove_existing_product_after: Step::install_finalize(),
            newer_product_installed_error_message: Some(
                "Newer version already installed".to_string(),
            ),
        }
    }
}

impl MajorUpgradeStrategy {
    /// Versions referenced by both ranges
    pub fn versions(&self) -> Vec<&str> {
        self.upgrade_versions
            .iter()
            .chain(self.prevent_downgrading_versions.iter())
            .flat_map(VersionRange::versions)
            .collect()
    }

    /// Add the `Upgrade` table and the downgrade guard to `product`
    pub fn apply(&self, product: &mut Element, upgrade_code: &str, version: &str) {
        let mut upgrade = Element::new("Upgrade").attr("Id", upgrade_code);

        if let Some(range) = &self.upgrade_versions {
            upgrade.push(range.to_element("UPGRADEFOUND", version, true));
        }

        let Some(range) = &self.prevent_downgrading_versions else {
            product.push(upgrade);
            return;
        };

        // the maximum of the downgrade range is kept verbatim
        upgrade.push(range.to_element("NEWPRODUCTFOUND", version, false));
        product.push(upgrade);

        if let Some(message) = &self.newer_product_installed_error_message {
            product.push(
                Element::new("CustomAction")
                    .attr("Id", "PreventDowngrading")
                    .attr("Error", message.as_str()),
            );

            for sequence in ["InstallExecuteSequence", "InstallUISequence"] {
                let mut custom = Element::new("Custom")
                    .attr("Action", "PreventDowngrading")
                    .attr("After", "FindRelatedProducts");
                custom.add_text("NEWPRODUCTFOUND");
                product.find_or_add(sequence).push(custom);
            }
        }

        product.find_or_add("InstallExecuteSequence").push(
            Element::new("RemoveExistingProducts")
                .attr("After", self.remove_existing_product_after.as_str()),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_major_upgrade_element() {
        let upgrade = MajorUpgrade {
            allow_same_version_upgrades: Some(true),
            schedule: Some(UpgradeSchedule::AfterInstallInitialize),
            ..MajorUpgrade::with_downgrade_error("Newer version installed")
        };
        let element = upgrade.to_element();
        assert_eq!(element.get_attr("AllowSameVersionUpgrades"), Some("yes"));
        assert_eq!(
            element.get_attr("DowngradeErrorMessage"),
            Some("Newer version installed")
        );
        assert_eq!(element.get_attr("Schedule"), Some("afterInstallInitialize"));
        assert!(!element.has_attr("Disallow"));
    }

    #[test]
    fn test_strategy_apply() {
        let mut product = Element::new("Product");
        MajorUpgradeStrategy::default().apply(&mut product, "UPGRADE-CODE", "1.2.0.0");

        let upgrade = product.find("Upgrade").unwrap();
        assert_eq!(upgrade.get_attr("Id"), Some("UPGRADE-CODE"));
        let versions: Vec<&Element> = upgrade.elements().collect();
        assert_eq!(versions[0].get_attr("Maximum"), Some("1.2.0.0"));
        assert_eq!(versions[0].get_attr("Property"), Some("UPGRADEFOUND"));
        assert_eq!(versions[1].get_attr("Minimum"), Some("1.2.0.0"));
        assert_eq!(versions[1].get_attr("IncludeMinimum"), Some("no"));

        let exec = product.find("InstallExecuteSequence").unwrap();
        let custom = exec.find("Custom").unwrap();
        assert_eq!(custom.get_attr("Action"), Some("PreventDowngrading"));
        assert_eq!(custom.text(), "NEWPRODUCTFOUND");
        assert_eq!(
            exec.find("RemoveExistingProducts").unwrap().get_attr("After"),
            Some("InstallFinalize")
        );
        assert!(product.find("InstallUISequence").is_some());
    }

    #[test]
    fn test_strategy_without_downgrade_guard() {
        let strategy = MajorUpgradeStrategy {
            prevent_downgrading_versions: None,
            ..Default::default()
        };
        let mut product = Element::new("Product");
        strategy.apply(&mut product, "X", "1.0");
        assert!(product.find("CustomAction").is_none());
        assert!(product.find("InstallExecuteSequence").is_none());
    }

    #[test]
    fn test_versions() {
        let strategy = MajorUpgradeStrategy::default();
        assert_eq!(strategy.versions(), vec!["0.0.0.0", "%this%", "%this%"]);
    }
}
