use serde::{Deserialize, Serialize};
use serde_repr::{Deserialize_repr, Serialize_repr};

/// User roles, in increasing order of privilege.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize_repr, Deserialize_repr,
)]
#[repr(u8)]
pub enum Role {
    Unverified = 0,
    Voter = 1,
    Owner = 2,
    Observer = 3,
    Admin = 4,
}

impl Role {
    pub fn as_u8(self) -> u8 {
        self as u8
    }

    /// Inverse of [`Role::as_u8`].
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Unverified),
            1 => Some(Self::Voter),
            2 => Some(Self::Owner),
            3 => Some(Self::Observer),
            4 => Some(Self::Admin),
            _ => None,
        }
    }
}

/// A registered user.
///
/// `salt` and `hash` are opaque here: hashing happens upstream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub name: String,
    pub email: String,
    pub salt: String,
    pub hash: String,
    pub role: Role,
}

impl User {
    pub fn new(
        name: impl Into<String>,
        email: impl Into<String>,
        salt: impl Into<String>,
        hash: impl Into<String>,
        role: Role,
    ) -> Self {
        Self {
            name: name.into(),
            email: email.into(),
            salt: salt.into(),
            hash: hash.into(),
            role,
        }
    }
}
