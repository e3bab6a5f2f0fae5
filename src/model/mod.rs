//! Declarative installer model

pub mod action;
pub mod binary;
pub mod condition;
pub mod dir;
pub mod extension;
pub mod feature;
pub mod media;
pub mod project;
pub mod property;
pub mod reboot;
pub mod registry;
pub mod upgrade;

pub use action::{Action, ActionKind, Execute, Return, Sequence, Step, When};
pub use binary::Binary;
pub use condition::Condition;
pub use dir::{Dir, ExeFileShortcut, File, FileShortcut, ShortcutOptions};
pub use extension::WixExtension;
pub use feature::{Feature, FeatureCondition};
pub use media::{CompressionLevel, Media, MediaTemplate};
pub use project::{
    InstallPrivileges, InstallScope, LaunchCondition, Platform, ProductGuids, Project, WixUi,
};
pub use property::{Property, PropertyRef, RegValueProperty};
pub use reboot::{Reboot, RebootInstallSequence, RebootSuppressing};
pub use registry::{RegValue, RegValueData, RegistryHive, RegistryKeyAction};
pub use upgrade::{MajorUpgrade, MajorUpgradeStrategy, UpgradeSchedule, VersionRange};
