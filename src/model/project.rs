//! The project: root of the installer model

use crate::error::{Result, WixError};
use crate::generic::{CustomItems, GenericItem};
use crate::guid::{calculate_product_id, GuidAlgorithm};
use crate::id::IdHook;
use crate::model::action::Action;
use crate::model::binary::Binary;
use crate::model::condition::Condition;
use crate::model::dir::Dir;
use crate::model::extension::WixExtension;
use crate::model::feature::Feature;
use crate::model::media::{Media, MediaTemplate};
use crate::model::property::{Property, PropertyRef, RegValueProperty};
use crate::model::reboot::{Reboot, RebootSuppressing};
use crate::model::registry::RegValue;
use crate::model::upgrade::{MajorUpgrade, MajorUpgradeStrategy};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use uuid::Uuid;

/// Target platform
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    X86,
    X64,
    Arm64,
}

impl Platform {
    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::X86 => "x86",
            Platform::X64 => "x64",
            Platform::Arm64 => "arm64",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "x86" | "intel" => Some(Platform::X86),
            "x64" | "amd64" => Some(Platform::X64),
            "arm64" => Some(Platform::Arm64),
            _ => None,
        }
    }

    pub fn is_64bit(&self) -> bool {
        matches!(self, Platform::X64 | Platform::Arm64)
    }
}

/// `Package/@InstallScope`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum InstallScope {
    PerMachine,
    PerUser,
}

impl InstallScope {
    pub fn as_str(&self) -> &'static str {
        match self {
            InstallScope::PerMachine => "perMachine",
            InstallScope::PerUser => "perUser",
        }
    }
}

/// `Package/@InstallPrivileges`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InstallPrivileges {
    Elevated,
    Limited,
}

impl InstallPrivileges {
    pub fn as_str(&self) -> &'static str {
        match self {
            InstallPrivileges::Elevated => "elevated",
            InstallPrivileges::Limited => "limited",
        }
    }
}

/// Stock WixUI dialog sets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum WixUi {
    #[default]
    #[serde(rename = "WixUI_Minimal")]
    Minimal,
    #[serde(rename = "WixUI_InstallDir")]
    InstallDir,
    #[serde(rename = "WixUI_FeatureTree")]
    FeatureTree,
    #[serde(rename = "WixUI_Mondo")]
    Mondo,
    #[serde(rename = "WixUI_Advanced")]
    Advanced,
    /// No dialogs, only the progress bar
    #[serde(rename = "WixUI_ProgressOnly")]
    ProgressOnly,
}

impl WixUi {
    pub fn as_str(&self) -> &'static str {
        match self {
            WixUi::Minimal => "WixUI_Minimal",
            WixUi::InstallDir => "WixUI_InstallDir",
            WixUi::FeatureTree => "WixUI_FeatureTree",
            WixUi::Mondo => "WixUI_Mondo",
            WixUi::Advanced => "WixUI_Advanced",
            WixUi::ProgressOnly => "WixUI_ProgressOnly",
        }
    }
}

/// Condition that must hold for the installation to start
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LaunchCondition {
    pub condition: Condition,
    pub message: String,
}

impl LaunchCondition {
    pub fn new(condition: impl Into<Condition>, message: impl Into<String>) -> Self {
        Self {
            condition: condition.into(),
            message: message.into(),
        }
    }
}

fn default_version() -> String {
    "1.0.0.0".to_string()
}

/// Installer project
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Project {
    pub name: String,
    pub version: String,

    /// Seed of the product code and of component GUIDs. Random when unset.
    pub guid: Option<Uuid>,
    pub upgrade_code: Option<Uuid>,
    pub product_id: Option<Uuid>,
    pub guid_algorithm: GuidAlgorithm,

    pub platform: Option<Platform>,

    /// One culture or a `"en-US,de-DE"` list
    pub language: String,
    /// Derived from the first language when unset
    pub codepage: Option<String>,

    pub description: Option<String>,
    pub manufacturer: String,
    pub installer_version: u32,
    pub install_scope: Option<InstallScope>,
    pub install_privileges: Option<InstallPrivileges>,
    pub emit_consistent_package_id: bool,

    /// Extra `Product` attributes
    pub product_attributes: BTreeMap<String, String>,

    pub media: Vec<Media>,
    pub media_template: Option<MediaTemplate>,

    pub ui: WixUi,
    pub banner_image: Option<String>,
    pub background_image: Option<String>,
    pub license_file: Option<String>,

    pub major_upgrade: Option<MajorUpgrade>,
    pub major_upgrade_strategy: Option<MajorUpgradeStrategy>,

    pub launch_conditions: Vec<LaunchCondition>,
    pub properties: Vec<Property>,
    pub property_refs: Vec<PropertyRef>,
    pub reg_value_properties: Vec<RegValueProperty>,
    pub reg_values: Vec<RegValue>,
    pub binaries: Vec<Binary>,
    pub actions: Vec<Action>,
    pub generic_items: Vec<GenericItem>,
    pub wix_variables: BTreeMap<String, String>,

    /// Feature that collects every component not assigned elsewhere
    pub default_feature: Feature,
    pub features: Vec<Feature>,

    pub dirs: Vec<Dir>,

    pub out_dir: PathBuf,
    /// Defaults to the project name
    pub out_file_name: Option<String>,
    /// Base of relative file sources
    pub source_base_dir: PathBuf,

    /// Additional sources and libraries passed to the WiX tools
    pub wxs_files: Vec<String>,
    pub lib_files: Vec<String>,
    pub wix_extensions: Vec<WixExtension>,
    pub candle_options: Option<String>,
    pub light_options: Option<String>,

    pub reboot_suppressing: Option<RebootSuppressing>,
    pub reinstall_mode: String,
    pub force_reboot: Option<Reboot>,
    pub schedule_reboot: Option<Reboot>,

    #[serde(skip)]
    pub custom_id_algorithm: Option<IdHook>,

    #[serde(skip)]
    pub custom_items: CustomItems,
}

impl Default for Project {
    fn default() -> Self {
        Self {
            name: String::new(),
            version: default_version(),
            guid: None,
            upgrade_code: None,
            product_id: None,
            guid_algorithm: GuidAlgorithm::default(),
            platform: None,
            language: "en-US".to_string(),
            codepage: None,
            description: None,
            manufacturer: String::new(),
            installer_version: 200,
            install_scope: None,
            install_privileges: None,
            emit_consistent_package_id: false,
            product_attributes: BTreeMap::new(),
            media: vec![Media::default()],
            media_template: None,
            ui: WixUi::default(),
            banner_image: None,
            background_image: None,
            license_file: None,
            major_upgrade: None,
            major_upgrade_strategy: None,
            launch_conditions: Vec::new(),
            properties: Vec::new(),
            property_refs: Vec::new(),
            reg_value_properties: Vec::new(),
            reg_values: Vec::new(),
            binaries: Vec::new(),
            actions: Vec::new(),
            generic_items: Vec::new(),
            wix_variables: BTreeMap::new(),
            default_feature: Feature::new("Complete"),
            features: Vec::new(),
            dirs: Vec::new(),
            out_dir: PathBuf::from("."),
            out_file_name: None,
            source_base_dir: PathBuf::new(),
            wxs_files: Vec::new(),
            lib_files: Vec::new(),
            wix_extensions: Vec::new(),
            candle_options: None,
            light_options: None,
            reboot_suppressing: None,
            reinstall_mode: "amus".to_string(),
            force_reboot: None,
            schedule_reboot: None,
            custom_id_algorithm: None,
            custom_items: Vec::new(),
        }
    }
}

impl Project {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Load a project from a JSON or YAML file, picked by extension
    pub fn load(path: &std::path::Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");

        let mut project: Self = match ext {
            "json" => serde_json::from_str(&content)
                .map_err(|e| WixError::InvalidModel(format!("{}: {}", path.display(), e)))?,
            "yaml" | "yml" => serde_yaml::from_str(&content)
                .map_err(|e| WixError::InvalidModel(format!("{}: {}", path.display(), e)))?,
            _ => {
                return Err(WixError::InvalidModel(format!(
                    "Unsupported project file extension: {}",
                    path.display()
                )))
            }
        };

        for dir in &mut project.dirs {
            dir.split_path();
        }

        // relative sources resolve against the project file
        if project.source_base_dir.is_relative() {
            if let Some(parent) = path.parent() {
                project.source_base_dir = parent.join(&project.source_base_dir);
            }
        }
        Ok(project)
    }

    pub fn version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    pub fn guid(mut self, guid: Uuid) -> Self {
        self.guid = Some(guid);
        self
    }

    pub fn platform(mut self, platform: Platform) -> Self {
        self.platform = Some(platform);
        self
    }

    pub fn dir(mut self, dir: Dir) -> Self {
        self.dirs.push(dir);
        self
    }

    pub fn feature(mut self, feature: Feature) -> Self {
        self.features.push(feature);
        self
    }

    pub fn property(mut self, property: Property) -> Self {
        self.properties.push(property);
        self
    }

    pub fn reg_value(mut self, value: RegValue) -> Self {
        self.reg_values.push(value);
        self
    }

    pub fn binary(mut self, binary: Binary) -> Self {
        self.binaries.push(binary);
        self
    }

    pub fn action(mut self, action: Action) -> Self {
        self.actions.push(action);
        self
    }

    pub fn generic(mut self, item: impl Into<GenericItem>) -> Self {
        self.generic_items.push(item.into());
        self
    }

    pub fn is_64bit(&self) -> bool {
        self.platform.map(|p| p.is_64bit()).unwrap_or(false)
    }

    /// Name of the produced `.wxs`/`.msi` without extension
    pub fn output_name(&self) -> &str {
        self.out_file_name.as_deref().unwrap_or(&self.name)
    }

    /// Upgrade code, or the project GUID when unset
    pub fn actual_upgrade_code(&self) -> Option<Uuid> {
        self.upgrade_code.or(self.guid)
    }

    /// Generated component id, made unique per product when requested
    pub fn component_id(&self, seed: &str, force_uniqueness: bool) -> String {
        match (force_uniqueness, self.actual_upgrade_code()) {
            (true, Some(code)) => format!("{}.{}", seed, code.simple()),
            _ => seed.to_string(),
        }
    }

    /// All features of the declared trees, depth-first
    pub fn all_features(&self) -> Vec<&Feature> {
        self.features.iter().flat_map(Feature::all_features).collect()
    }

    /// All directories, depth-first
    pub fn all_dirs(&self) -> Vec<&Dir> {
        self.dirs.iter().flat_map(Dir::all_dirs).collect()
    }
}

/// Product GUID, upgrade code and product code of a build
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProductGuids {
    pub guid: Uuid,
    pub upgrade_code: Uuid,
    pub product_id: Uuid,
}

impl ProductGuids {
    /// Fill in what the project leaves unset: a random GUID, the upgrade
    /// code from the GUID, the product code from GUID and version.
    pub fn generate(project: &Project) -> Result<Self> {
        let guid = project.guid.unwrap_or_else(Uuid::new_v4);
        let upgrade_code = project.upgrade_code.unwrap_or(guid);
        let product_id = match project.product_id {
            Some(id) => id,
            None => calculate_product_id(guid, &project.version).ok_or_else(|| {
                WixError::Validation(format!("Invalid product version '{}'", project.version))
            })?,
        };

        Ok(Self {
            guid,
            upgrade_code,
            product_id,
        })
    }

    pub fn apply(&self, project: &mut Project) {
        project.guid = Some(self.guid);
        project.upgrade_code = Some(self.upgrade_code);
        project.product_id = Some(self.product_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn guid() -> Uuid {
        Uuid::parse_str("6fe30b47-2577-43ad-9095-1861ba25889b").unwrap()
    }

    #[test]
    fn test_defaults() {
        let project = Project::new("MyProduct");
        assert_eq!(project.version, "1.0.0.0");
        assert_eq!(project.language, "en-US");
        assert_eq!(project.installer_version, 200);
        assert_eq!(project.media.len(), 1);
        assert_eq!(project.default_feature.name(), "Complete");
        assert_eq!(project.reinstall_mode, "amus");
        assert_eq!(project.output_name(), "MyProduct");
        assert!(!project.is_64bit());
    }

    #[test]
    fn test_product_guids() {
        let project = Project::new("MyProduct").guid(guid()).version("1.0.0.0");
        let guids = ProductGuids::generate(&project).unwrap();
        assert_eq!(guids.guid, guid());
        assert_eq!(guids.upgrade_code, guid());
        assert_eq!(
            Some(guids.product_id),
            calculate_product_id(guid(), "1.0.0.0")
        );
        assert_ne!(guids.product_id, guid());
    }

    #[test]
    fn test_product_guids_invalid_version() {
        let project = Project::new("MyProduct").version("one");
        assert!(ProductGuids::generate(&project).is_err());
    }

    #[test]
    fn test_component_id_uniqueness() {
        let project = Project::new("P").guid(guid());
        assert_eq!(project.component_id("Component.a", false), "Component.a");
        assert_eq!(
            project.component_id("Component.a", true),
            "Component.a.6fe30b47257743ad90951861ba25889b"
        );
    }

    #[test]
    fn test_load_yaml() {
        let temp = tempfile::TempDir::new().unwrap();
        let path = temp.path().join("setup.yaml");
        std::fs::write(
            &path,
            r#"
name: MyProduct
version: 2.1.0.0
platform: x64
dirs:
  - name: '%ProgramFiles%\Acme\MyProduct'
    files:
      - name: bin\app.exe
        features: [Main]
features:
  - name: Main
"#,
        )
        .unwrap();

        let project = Project::load(&path).unwrap();
        assert_eq!(project.platform, Some(Platform::X64));
        assert_eq!(project.dirs[0].entity.name, "%ProgramFiles%");
        assert_eq!(project.all_dirs().len(), 3);
        assert_eq!(project.source_base_dir, temp.path().join(""));
        assert_eq!(project.features[0].name(), "Main");
    }
}
