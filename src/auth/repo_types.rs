use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::fmt;
use thiserror::Error;
use time::OffsetDateTime;
use uuid::Uuid;

/// Role tag attached to every account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum Role {
    #[default]
    User,
    Student,
    Instructor,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "User",
            Role::Student => "Student",
            Role::Instructor => "Instructor",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
#[error("unknown role: {0}")]
pub struct UnknownRole(String);

impl TryFrom<String> for Role {
    type Error = UnknownRole;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        match value.as_str() {
            "User" => Ok(Role::User),
            "Student" => Ok(Role::Student),
            "Instructor" => Ok(Role::Instructor),
            _ => Err(UnknownRole(value)),
        }
    }
}

/// User record in the database.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub user_id: Uuid,                // unique user ID
    pub name: String,                 // display name
    pub email: String,                // unique, matched case-sensitively
    #[sqlx(try_from = "String")]
    pub role: Role,                   // account role tag
    #[serde(skip_serializing)]
    pub password_hash: String,        // base64 HMAC-SHA512, not exposed in JSON
    #[serde(skip_serializing)]
    pub password_salt: String,        // base64 HMAC key; empty on legacy rows
    pub created_at: OffsetDateTime,   // creation timestamp
}
