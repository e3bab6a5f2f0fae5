//! Project validation
//!
//! Runs before ids are assigned and reports everything the compiler would
//! otherwise trip over, or silently get wrong.

use crate::config::AutoGenerationOptions;
use crate::env_consts::{is_env_token, special_folder_id};
use crate::error::{Result, WixError};
use crate::guid::parse_version;
use crate::id::IdKind;
use crate::model::action::ActionKind;
use crate::model::dir::Dir;
use crate::model::media::Media;
use crate::model::project::Project;
use crate::model::upgrade::THIS_VERSION;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

/// Severity of a validation issue
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Error => write!(f, "error"),
            Severity::Warning => write!(f, "warning"),
        }
    }
}

/// A problem found in a project
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Issue {
    pub severity: Severity,
    pub message: String,
}

impl Issue {
    fn error(message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Error,
            message: message.into(),
        }
    }

    fn warning(message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Warning,
            message: message.into(),
        }
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

impl fmt::Display for Issue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.severity, self.message)
    }
}

/// Checks a project against the rules of the compiler
pub struct ProjectValidator<'a> {
    options: &'a AutoGenerationOptions,
}

impl<'a> ProjectValidator<'a> {
    pub fn new(options: &'a AutoGenerationOptions) -> Self {
        Self { options }
    }

    /// All issues of `project`
    pub fn validate(&self, project: &Project) -> Vec<Issue> {
        let mut issues = Vec::new();

        if project.name.trim().is_empty() {
            issues.push(Issue::error("Project name is empty"));
        }

        if parse_version(&project.version).is_none() {
            issues.push(Issue::error(format!(
                "Invalid product version '{}'",
                project.version
            )));
        }

        self.check_media(project, &mut issues);
        self.check_upgrade_strategy(project, &mut issues);
        self.check_dirs(project, &mut issues);
        self.check_license(project, &mut issues);
        self.check_properties(project, &mut issues);
        self.check_actions(project, &mut issues);
        self.check_unique_ids(project, &mut issues);

        issues
    }

    /// Fail with every error found; warnings are logged
    pub fn ensure_valid(&self, project: &Project) -> Result<()> {
        let issues = self.validate(project);
        for issue in issues.iter().filter(|i| !i.is_error()) {
            log::warn!("{}", issue.message);
        }

        let errors: Vec<String> = issues
            .iter()
            .filter(|i| i.is_error())
            .map(|i| i.message.clone())
            .collect();

        if errors.is_empty() {
            Ok(())
        } else {
            Err(WixError::Validation(errors.join("; ")))
        }
    }

    fn check_media(&self, project: &Project, issues: &mut Vec<Issue>) {
        let has_template = project.media_template.is_some()
            || project
                .generic_items
                .iter()
                .any(|i| matches!(i, crate::generic::GenericItem::MediaTemplate(_)));

        let custom_media = project.media.len() != 1 || project.media[0] != Media::default();

        if has_template && custom_media && !project.media.is_empty() {
            issues.push(Issue::error(
                "Media and MediaTemplate cannot be used together",
            ));
        }
    }

    fn check_upgrade_strategy(&self, project: &Project, issues: &mut Vec<Issue>) {
        let Some(strategy) = &project.major_upgrade_strategy else {
            return;
        };

        for version in strategy.versions() {
            if version != THIS_VERSION && parse_version(version).is_none() {
                issues.push(Issue::error(format!(
                    "Invalid version '{}' in the major upgrade strategy",
                    version
                )));
            }
        }

        if project.major_upgrade.is_some() {
            issues.push(Issue::warning(
                "Both MajorUpgrade and MajorUpgradeStrategy are set",
            ));
        }
    }

    fn check_dirs(&self, project: &Project, issues: &mut Vec<Issue>) {
        let dirs = project.all_dirs();

        let install_dirs = dirs.iter().filter(|d| d.is_install_dir).count();
        if install_dirs > 1 {
            issues.push(Issue::error(format!(
                "{} directories are marked as the install directory, only one is allowed",
                install_dirs
            )));
        }

        for dir in &dirs {
            check_dir_name(dir, issues);
        }
    }

    fn check_license(&self, project: &Project, issues: &mut Vec<Issue>) {
        let Some(license) = &project.license_file else {
            return;
        };

        if !self.options.allow_non_rtf_license && !license.to_lowercase().ends_with(".rtf") {
            issues.push(Issue::error(format!(
                "License file '{}' is not an RTF file",
                license
            )));
        }
    }

    fn check_properties(&self, project: &Project, issues: &mut Vec<Issue>) {
        for property_ref in &project.property_refs {
            if property_ref.id.as_deref().map(str::trim).unwrap_or("").is_empty() {
                issues.push(Issue::error("PropertyRef without an id"));
            }
        }

        for property in &project.properties {
            if property.name().trim().is_empty() {
                issues.push(Issue::error("Property without a name"));
            }
        }
    }

    fn check_actions(&self, project: &Project, issues: &mut Vec<Issue>) {
        for action in &project.actions {
            if matches!(action.kind, ActionKind::CustomActionRef) && action.entity.id.is_none() {
                issues.push(Issue::error(
                    "CustomActionRef needs the id of the referenced action",
                ));
            }
        }
    }

    fn check_unique_ids(&self, project: &Project, issues: &mut Vec<Issue>) {
        let mut seen: HashSet<(IdKind, String)> = HashSet::new();
        let mut check = |kind: IdKind, id: Option<&String>| {
            if let Some(id) = id {
                if !seen.insert((kind, id.clone())) {
                    issues.push(Issue::error(format!("Duplicate {} id '{}'", kind, id)));
                }
            }
        };

        for dir in project.all_dirs() {
            check(IdKind::Dir, dir.entity.id.as_ref());
            for file in &dir.files {
                check(IdKind::File, file.entity.id.as_ref());
                for shortcut in &file.shortcuts {
                    check(IdKind::FileShortcut, shortcut.entity.id.as_ref());
                }
            }
            for shortcut in &dir.shortcuts {
                check(IdKind::ExeFileShortcut, shortcut.entity.id.as_ref());
            }
        }
        for feature in project.all_features() {
            check(IdKind::Feature, feature.entity.id.as_ref());
        }
        for value in &project.reg_values {
            check(IdKind::RegValue, value.entity.id.as_ref());
        }
        for action in &project.actions {
            check(IdKind::Action, action.entity.id.as_ref());
        }
        for binary in &project.binaries {
            check(IdKind::Binary, binary.entity.id.as_ref());
        }
        for item in &project.generic_items {
            if let Some((kind, entity)) = item.entity() {
                check(kind, entity.id.as_ref());
            }
        }
    }
}

fn check_dir_name(dir: &Dir, issues: &mut Vec<Issue>) {
    let name = &dir.entity.name;
    if name.trim().is_empty() {
        issues.push(Issue::error("Directory without a name"));
        return;
    }

    if is_env_token(name) && special_folder_id(name).is_none() {
        issues.push(Issue::error(format!(
            "Unknown environment constant '{}' used as a directory name",
            name
        )));
    }
}
