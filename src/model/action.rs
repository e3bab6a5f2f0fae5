//! Custom actions
//!
//! Every action shares scheduling data (sequence, step, condition, execution
//! mode) and carries a kind-specific payload describing what it runs.

use crate::attributes::Entity;
use crate::env_consts::path_file_name;
use crate::model::condition::Condition;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Standard action (or custom action id) an action is scheduled against
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Step(String);

impl Step {
    /// After the last custom action of the sequence; error when there is none
    pub const PREVIOUS_ACTION: &'static str = "PreviousAction";
    /// After the last custom action, or `InstallFinalize`
    pub const PREVIOUS_ACTION_OR_INSTALL_FINALIZE: &'static str = "PreviousActionOrInstallFinalize";
    /// After the last custom action, or `InstallInitialize`
    pub const PREVIOUS_ACTION_OR_INSTALL_INITIALIZE: &'static str =
        "PreviousActionOrInstallInitialize";

    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn previous_action() -> Self {
        Self::new(Self::PREVIOUS_ACTION)
    }

    pub fn previous_action_or_install_finalize() -> Self {
        Self::new(Self::PREVIOUS_ACTION_OR_INSTALL_FINALIZE)
    }

    pub fn previous_action_or_install_initialize() -> Self {
        Self::new(Self::PREVIOUS_ACTION_OR_INSTALL_INITIALIZE)
    }

    pub fn install_initialize() -> Self {
        Self::new("InstallInitialize")
    }

    pub fn install_finalize() -> Self {
        Self::new("InstallFinalize")
    }

    pub fn install_files() -> Self {
        Self::new("InstallFiles")
    }

    pub fn install_execute() -> Self {
        Self::new("InstallExecute")
    }

    pub fn install_validate() -> Self {
        Self::new("InstallValidate")
    }

    pub fn find_related_products() -> Self {
        Self::new("FindRelatedProducts")
    }

    pub fn launch_conditions() -> Self {
        Self::new("LaunchConditions")
    }

    pub fn cost_finalize() -> Self {
        Self::new("CostFinalize")
    }

    pub fn remove_existing_products() -> Self {
        Self::new("RemoveExistingProducts")
    }

    /// One of the `PreviousAction*` placeholders
    pub fn is_pseudo(&self) -> bool {
        matches!(
            self.0.as_str(),
            Self::PREVIOUS_ACTION
                | Self::PREVIOUS_ACTION_OR_INSTALL_FINALIZE
                | Self::PREVIOUS_ACTION_OR_INSTALL_INITIALIZE
        )
    }
}

impl Default for Step {
    fn default() -> Self {
        Self::previous_action_or_install_initialize()
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Placement relative to the step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum When {
    #[default]
    After,
    Before,
}

impl When {
    pub fn as_str(&self) -> &'static str {
        match self {
            When::After => "After",
            When::Before => "Before",
        }
    }
}

/// `CustomAction/@Return`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Return {
    Check,
    Ignore,
    AsyncWait,
    #[default]
    AsyncNoWait,
}

impl Return {
    pub fn as_str(&self) -> &'static str {
        match self {
            Return::Check => "check",
            Return::Ignore => "ignore",
            Return::AsyncWait => "asyncWait",
            Return::AsyncNoWait => "asyncNoWait",
        }
    }
}

/// `CustomAction/@Execute`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Execute {
    #[default]
    Immediate,
    Deferred,
    Rollback,
    Commit,
    OncePerProcess,
    FirstSequence,
    SecondSequence,
}

impl Execute {
    pub fn as_str(&self) -> &'static str {
        match self {
            Execute::Immediate => "immediate",
            Execute::Deferred => "deferred",
            Execute::Rollback => "rollback",
            Execute::Commit => "commit",
            Execute::OncePerProcess => "oncePerProcess",
            Execute::FirstSequence => "firstSequence",
            Execute::SecondSequence => "secondSequence",
        }
    }
}

/// Installation sequence table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Sequence {
    InstallExecuteSequence,
    InstallUISequence,
    AdminExecuteSequence,
    AdminUISequence,
}

impl Sequence {
    pub fn as_str(&self) -> &'static str {
        match self {
            Sequence::InstallExecuteSequence => "InstallExecuteSequence",
            Sequence::InstallUISequence => "InstallUISequence",
            Sequence::AdminExecuteSequence => "AdminExecuteSequence",
            Sequence::AdminUISequence => "AdminUISequence",
        }
    }
}

fn default_sequences() -> Vec<Sequence> {
    vec![Sequence::InstallExecuteSequence]
}

fn default_command_line_property() -> String {
    "WixQuietExecCmdLine".to_string()
}

fn default_quiet_exec_entry() -> String {
    "WixQuietExec".to_string()
}

/// What an action runs
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    /// Inline VBScript
    Script { code: String },

    /// VBScript file stored in the package, calling `procedure`
    ScriptFile {
        script_file: String,
        #[serde(default)]
        procedure: String,
    },

    /// Set a property
    SetProperty { property: String, value: String },

    /// Launch an executable by path
    PathFile {
        app_path: String,
        #[serde(default)]
        args: String,
        #[serde(default)]
        working_dir: String,
    },

    /// Launch a file installed by the package, `key` is its file id
    InstalledFile {
        key: String,
        #[serde(default)]
        args: String,
    },

    /// Launch an executable stored in the `Binary` table
    BinaryFile {
        key: String,
        #[serde(default)]
        args: String,
    },

    /// Schedule an action defined elsewhere (usually in an extension)
    CustomActionRef,

    /// Run a command line without a console window through the util extension
    QuietExec {
        app_path: String,
        #[serde(default)]
        args: String,
        #[serde(default = "default_command_line_property")]
        command_line_property: String,
        #[serde(default = "default_quiet_exec_entry")]
        action_name: String,
    },
}

impl ActionKind {
    /// Suffix of generated action names (`Action{n}{suffix}`)
    pub fn default_name(&self, index: usize) -> String {
        match self {
            ActionKind::Script { .. } => format!("Action{}_VBScript", index),
            ActionKind::ScriptFile { .. } => format!("Action{}_VBScriptFile", index),
            ActionKind::SetProperty { property, .. } => {
                format!("Action{}SetProp_{}", index, property)
            }
            ActionKind::PathFile { app_path, .. } => {
                format!("Action{}_{}", index, path_file_name(app_path))
            }
            ActionKind::InstalledFile { key, .. } | ActionKind::BinaryFile { key, .. } => {
                format!("Action{}_{}", index, key)
            }
            ActionKind::CustomActionRef => format!("Action{}", index),
            ActionKind::QuietExec { app_path, .. } => {
                format!("WixQuietExec_{}", path_file_name(app_path))
            }
        }
    }
}

/// Custom action
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Action {
    #[serde(flatten)]
    pub entity: Entity,

    pub kind: ActionKind,

    #[serde(rename = "return")]
    pub return_type: Return,

    pub step: Step,
    pub when: When,

    /// Sequences the action is scheduled in; empty means not scheduled
    #[serde(default = "default_sequences")]
    pub sequences: Vec<Sequence>,

    pub condition: Condition,
    pub execute: Execute,
    pub impersonate: Option<bool>,

    /// Absolute sequence number, overrides `step`/`when`
    pub sequence_number: Option<u32>,

    pub progress_text: Option<String>,
    pub rollback_progress_text: Option<String>,

    /// Rollback target (file key, binary key, script or app path, by kind)
    pub rollback: Option<String>,
    pub rollback_arg: Option<String>,
}

impl Default for Action {
    fn default() -> Self {
        Self {
            entity: Entity::default(),
            kind: ActionKind::CustomActionRef,
            return_type: Return::default(),
            step: Step::default(),
            when: When::default(),
            sequences: default_sequences(),
            condition: Condition::not_installed(),
            execute: Execute::default(),
            impersonate: None,
            sequence_number: None,
            progress_text: None,
            rollback_progress_text: None,
            rollback: None,
            rollback_arg: None,
        }
    }
}

impl Action {
    pub fn new(kind: ActionKind) -> Self {
        Self {
            kind,
            ..Default::default()
        }
    }

    pub fn script(code: impl Into<String>) -> Self {
        Self::new(ActionKind::Script { code: code.into() })
    }

    pub fn script_file(script_file: impl Into<String>, procedure: impl Into<String>) -> Self {
        Self::new(ActionKind::ScriptFile {
            script_file: script_file.into(),
            procedure: procedure.into(),
        })
    }

    pub fn set_property(property: impl Into<String>, value: impl Into<String>) -> Self {
        Self::new(ActionKind::SetProperty {
            property: property.into(),
            value: value.into(),
        })
    }

    pub fn path_file(app_path: impl Into<String>, args: impl Into<String>) -> Self {
        Self::new(ActionKind::PathFile {
            app_path: app_path.into(),
            args: args.into(),
            working_dir: String::new(),
        })
    }

    pub fn installed_file(key: impl Into<String>, args: impl Into<String>) -> Self {
        Self::new(ActionKind::InstalledFile {
            key: key.into(),
            args: args.into(),
        })
    }

    pub fn binary_file(key: impl Into<String>, args: impl Into<String>) -> Self {
        Self::new(ActionKind::BinaryFile {
            key: key.into(),
            args: args.into(),
        })
    }

    /// Reference to an existing action. The id is the referenced action.
    pub fn custom_action_ref(id: impl Into<String>) -> Self {
        let mut action = Self::new(ActionKind::CustomActionRef);
        action.entity.id = Some(id.into());
        action
    }

    pub fn quiet_exec(app_path: impl Into<String>, args: impl Into<String>) -> Self {
        Self::new(ActionKind::QuietExec {
            app_path: app_path.into(),
            args: args.into(),
            command_line_property: default_command_line_property(),
            action_name: default_quiet_exec_entry(),
        })
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.entity.id = Some(id.into());
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.entity.name = name.into();
        self
    }

    pub fn at(mut self, when: When, step: Step) -> Self {
        self.when = when;
        self.step = step;
        self
    }

    pub fn condition(mut self, condition: impl Into<Condition>) -> Self {
        self.condition = condition.into();
        self
    }

    pub fn execute(mut self, execute: Execute) -> Self {
        self.execute = execute;
        self
    }

    pub fn return_type(mut self, return_type: Return) -> Self {
        self.return_type = return_type;
        self
    }

    pub fn sequences(mut self, sequences: Vec<Sequence>) -> Self {
        self.sequences = sequences;
        self
    }

    pub fn rollback(mut self, target: impl Into<String>, arg: Option<String>) -> Self {
        self.rollback = Some(target.into());
        self.rollback_arg = arg;
        self
    }

    /// Rollback counterpart is emitted only for deferred actions with a target
    pub fn has_rollback(&self) -> bool {
        self.execute == Execute::Deferred
            && self.rollback.as_deref().map(|r| !r.is_empty()).unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let action = Action::script("MsgBox 1");
        assert_eq!(action.return_type, Return::AsyncNoWait);
        assert_eq!(action.when, When::After);
        assert_eq!(action.step.as_str(), "PreviousActionOrInstallInitialize");
        assert_eq!(action.sequences, vec![Sequence::InstallExecuteSequence]);
        assert_eq!(action.condition, Condition::not_installed());
        assert_eq!(action.execute, Execute::Immediate);
        assert!(action.step.is_pseudo());
    }

    #[test]
    fn test_default_names() {
        assert_eq!(
            ActionKind::Script { code: String::new() }.default_name(1),
            "Action1_VBScript"
        );
        assert_eq!(
            Action::set_property("INSTALLDIR", "x").kind.default_name(2),
            "Action2SetProp_INSTALLDIR"
        );
        assert_eq!(
            Action::path_file(r"%WindowsFolder%\notepad.exe", "").kind.default_name(3),
            "Action3_notepad.exe"
        );
        assert_eq!(
            Action::quiet_exec("cmd.exe", "/c dir").kind.default_name(4),
            "WixQuietExec_cmd.exe"
        );
    }

    #[test]
    fn test_has_rollback() {
        let action = Action::installed_file("setup.exe", "/i");
        assert!(!action.clone().rollback("undo.exe", None).has_rollback());
        assert!(action
            .execute(Execute::Deferred)
            .rollback("undo.exe", None)
            .has_rollback());
    }

    #[test]
    fn test_deserialize() {
        let yaml = "kind:\n  set_property:\n    property: A\n    value: B\nreturn: check\nexecute: deferred\n";
        let action: Action = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(action.return_type, Return::Check);
        assert_eq!(action.execute, Execute::Deferred);
        assert_eq!(action.sequences, vec![Sequence::InstallExecuteSequence]);
        assert!(matches!(action.kind, ActionKind::SetProperty { .. }));
    }
}
