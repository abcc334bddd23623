use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};
use utoipa::ToSchema;

/// How far a role can see.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Reach {
    Global,
    College,
    Department,
}

#[derive(
    Debug, Copy, Clone, Eq, PartialEq, Serialize, Deserialize, Display, EnumString, AsRefStr, ToSchema,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Role {
    Chairman,
    Hod,
    Staff,
}

impl Role {
    pub fn reach(self) -> Reach {
        match self {
            Role::Chairman => Reach::Global,
            Role::Hod => Reach::Department,
            Role::Staff => Reach::College,
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        name.trim().to_lowercase().parse().ok()
    }
}
