//! Reboot scheduling

use crate::model::action::{Step, When};
use crate::model::condition::Condition;
use crate::xml::Element;
use serde::{Deserialize, Serialize};

/// Value of the `REBOOT` property
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RebootSuppressing {
    Force,
    Suppress,
    ReallySuppress,
}

impl RebootSuppressing {
    pub fn as_str(&self) -> &'static str {
        match self {
            RebootSuppressing::Force => "Force",
            RebootSuppressing::Suppress => "Suppress",
            RebootSuppressing::ReallySuppress => "ReallySuppress",
        }
    }
}

/// Sequences a `ScheduleReboot` is placed in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum RebootInstallSequence {
    #[default]
    InstallExecute,
    InstallUI,
    Both,
}

/// Placement and condition of a reboot request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Reboot {
    pub step: Step,
    pub when: When,
    pub condition: Option<Condition>,
    pub suppress: Option<bool>,
    pub overridable: Option<bool>,
    /// Only meaningful for `ScheduleReboot`
    pub install_sequence: RebootInstallSequence,
}

impl Default for Reboot {
    fn default() -> Self {
        Self {
            step: Step::install_execute(),
            when: When::After,
            condition: None,
            suppress: None,
            overridable: None,
            install_sequence: RebootInstallSequence::InstallExecute,
        }
    }
}

impl Reboot {
    pub fn new(condition: impl Into<Condition>) -> Self {
        Self {
            condition: Some(condition.into()),
            ..Default::default()
        }
    }

    /// `ForceReboot` or `ScheduleReboot` element
    pub fn to_element(&self, name: &str) -> Element {
        let yes_no = |b: bool| if b { "yes" } else { "no" };
        let mut element = Element::new(name)
            .attr_opt("Overridable", self.overridable.map(yes_no))
            .attr_opt("Suppress", self.suppress.map(yes_no))
            .attr(self.when.as_str(), self.step.as_str());

        if let Some(condition) = self.condition.as_ref().filter(|c| !c.is_empty()) {
            element.add_text(condition.to_wix_string());
        }
        element
    }
}
