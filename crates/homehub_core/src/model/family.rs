//! Family grouping model.

use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

/// Storage-assigned family identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FamilyId(pub i64);

impl Display for FamilyId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Access-scoping group that owns principals and devices.
///
/// Two families with the same `family_name` are still distinct; only
/// `family_id` takes part in access decisions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Family {
    pub family_id: FamilyId,
    pub family_name: String,
}

impl Family {
    pub fn new(family_id: FamilyId, family_name: impl Into<String>) -> Self {
        Self {
            family_id,
            family_name: family_name.into(),
        }
    }
}
