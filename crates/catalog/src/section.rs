use serde::{Deserialize, Serialize};

use galley_core::{Entity, SectionId};

/// An operational area that holds and consumes stock (kitchen, bar, bakery...).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Section {
    pub id: SectionId,
    pub name: String,
    pub active: bool,
}

impl Section {
    pub fn new(id: SectionId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            active: true,
        }
    }
}

impl Entity for Section {
    type Id = SectionId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn is_active(&self) -> bool {
        self.active
    }
}
