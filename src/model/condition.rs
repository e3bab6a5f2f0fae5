//! Installer conditions
//!
//! A condition is a Windows Installer conditional expression. Single quotes
//! may be used instead of double quotes for readability; they are converted
//! on output.

use serde::{Deserialize, Serialize};
use std::fmt;

/// .NET Framework detection conditions, by version
const NET_FRAMEWORK_CONDITIONS: &[(&str, &str)] = &[
    ("2.0", " (NETFRAMEWORK20='#1') "),
    ("3.0SP", " (NETFRAMEWORK30_SP_LEVEL and NOT NETFRAMEWORK30_SP_LEVEL='#0') "),
    ("3.5", " (NETFRAMEWORK35='#1') "),
    ("4.5", " (NETFRAMEWORK45 >= '#378389') "),
    ("4.5.1", " (NETFRAMEWORK45 >= '#378675') "),
    ("4.5.2", " (NETFRAMEWORK45 >= '#379893') "),
    ("4.6", " (NETFRAMEWORK45 >= '#393295') "),
    ("4.6.1", " (NETFRAMEWORK45 >= '#394254') "),
    ("4.6.2", " (NETFRAMEWORK45 >= '#394802') "),
    ("4.7", " (NETFRAMEWORK45 >= '#460798') "),
    ("4.7.1", " (NETFRAMEWORK45 >= '#461308') "),
    ("4.7.2", " (NETFRAMEWORK45 >= '#461808') "),
];

/// Conditional expression
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Condition(String);

impl Condition {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Product is not installed yet
    pub fn not_installed() -> Self {
        Self::new(" (NOT Installed) ")
    }

    pub fn installed() -> Self {
        Self::new(" (Installed) ")
    }

    pub fn always() -> Self {
        Self::new(" (1) ")
    }

    pub fn not_being_removed() -> Self {
        Self::new(" (NOT (REMOVE=\"ALL\")) ")
    }

    /// Full UI
    pub fn not_silent() -> Self {
        Self::new(" (UILevel > 3) ")
    }

    pub fn silent() -> Self {
        Self::new(" (UILevel < 4) ")
    }

    pub fn being_uninstalled() -> Self {
        Self::new(" (REMOVE=\"ALL\") ")
    }

    /// Uninstall that is not part of a major upgrade
    pub fn being_uninstalled_and_not_being_upgraded() -> Self {
        Self::new("(NOT UPGRADINGPRODUCTCODE) AND (REMOVE=\"ALL\")")
    }

    /// Detection of an installed .NET Framework version (`"2.0"`, `"4.7.2"`, ...)
    pub fn net_framework_installed(version: &str) -> Option<Self> {
        NET_FRAMEWORK_CONDITIONS
            .iter()
            .find(|(v, _)| *v == version)
            .map(|(_, cond)| Self::new(*cond))
    }

    pub fn and(&self, other: &Condition) -> Self {
        Self(format!("({} AND {})", self, other))
    }

    pub fn or(&self, other: &Condition) -> Self {
        Self(format!("({} OR {})", self, other))
    }

    pub fn not(&self) -> Self {
        Self(format!("(NOT {})", self))
    }

    /// Raw expression as written
    pub fn raw(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }

    /// Expression with `'` turned into `"`
    pub fn to_wix_string(&self) -> String {
        self.0.replace('\'', "\"")
    }

    /// Whether the expression must be written as CDATA
    pub fn needs_cdata(&self, force: bool) -> bool {
        force || self.0.contains(['<', '>', '&'])
    }

    /// Property names referenced by the expression
    pub fn distinct_properties(&self) -> Vec<String> {
        let text = self.to_wix_string();
        let mut props: Vec<String> = Vec::new();
        for part in text.split(['[', ']', '(', ')', '!', '=', '>', '<', '\t', ' ', '\n', '\r']) {
            if part.is_empty()
                || part.starts_with('"')
                || ["AND", "NOT", "OR"].iter().any(|kw| part.eq_ignore_ascii_case(kw))
            {
                continue;
            }
            if !props.iter().any(|p| p == part) {
                props.push(part.to_string());
            }
        }
        props
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_wix_string())
    }
}

impl From<&str> for Condition {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for Condition {
    fn from(s: String) -> Self {
        Self(s)
    }
}
