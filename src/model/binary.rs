//! Entries of the `Binary` table

use crate::attributes::Entity;
use serde::{Deserialize, Serialize};

/// File embedded in the `Binary` table, e.g. a helper executable run by a
/// [`BinaryFile`](crate::model::action::ActionKind::BinaryFile) action.
/// `name` is the source path relative to the project's source directory.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Binary {
    #[serde(flatten)]
    pub entity: Entity,
}

impl Binary {
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            entity: Entity::named(source),
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.entity.id = Some(id.into());
        self
    }
}
