use serde::{Deserialize, Serialize};

use galley_core::{Entity, SupplierId};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Supplier {
    pub id: SupplierId,
    pub name: String,
    pub contact_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub active: bool,
}

impl Supplier {
    pub fn new(id: SupplierId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            contact_name: None,
            email: None,
            phone: None,
            active: true,
        }
    }
}

impl Entity for Supplier {
    type Id = SupplierId;

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
