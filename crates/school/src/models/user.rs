use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Role of an account, stored and transmitted as its numeric code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum UserType {
    Student,
    Teacher,
    Admin,
}

impl TryFrom<u8> for UserType {
    type Error = String;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        match code {
            0 => Ok(UserType::Student),
            1 => Ok(UserType::Teacher),
            2 => Ok(UserType::Admin),
            other => Err(format!("unknown user type {}", other)),
        }
    }
}

impl From<UserType> for u8 {
    fn from(user_type: UserType) -> Self {
        match user_type {
            UserType::Student => 0,
            UserType::Teacher => 1,
            UserType::Admin => 2,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum UserStatus {
    Disabled,
    Active,
}

impl TryFrom<u8> for UserStatus {
    type Error = String;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        match code {
            0 => Ok(UserStatus::Disabled),
            1 => Ok(UserStatus::Active),
            other => Err(format!("unknown user status {}", other)),
        }
    }
}

impl From<UserStatus> for u8 {
    fn from(status: UserStatus) -> Self {
        match status {
            UserStatus::Disabled => 0,
            UserStatus::Active => 1,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct User {
    pub id: u64,
    pub username: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub real_name: String,
    pub email: String,
    pub phone: String,
    pub user_type: UserType,
    pub status: UserStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Student {
    pub id: u64,
    pub user_id: u64,
    /// Registry number printed on the student card.
    pub student_no: String,
    pub grade: String,
    pub class: String,
    pub major: String,
    pub department: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Teacher {
    pub id: u64,
    pub user_id: u64,
    pub teacher_no: String,
    pub title: String,
    pub department: String,
    pub office: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
