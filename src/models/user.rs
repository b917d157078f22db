//! User model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Registered account.
///
/// `password_hash` is an Argon2 PHC string and is never serialized.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub display_name: Option<String>,
    pub role: UserRole,
    pub status: UserStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// Build an unsaved user from an already hashed password
    pub fn new(username: String, email: String, password_hash: String, role: UserRole) -> Self {
        let now = Utc::now();
        Self {
            id: 0,
            username,
            email,
            password_hash,
            display_name: None,
            role,
            status: UserStatus::Active,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role == UserRole::Admin
    }

    /// Mentors and admins may author shared study material
    pub fn is_mentor(&self) -> bool {
        matches!(self.role, UserRole::Admin | UserRole::Mentor)
    }

    /// Owners and admins may modify a resource
    pub fn can_manage(&self, owner_id: i64) -> bool {
        self.is_admin() || self.id == owner_id
    }

    pub fn is_banned(&self) -> bool {
        self.status == UserStatus::Banned
    }

    /// Name shown next to comments and mentorships
    pub fn public_name(&self) -> &str {
        self.display_name.as_deref().unwrap_or(&self.username)
    }
}

string_enum! {
    /// Authorization role
    pub enum UserRole {
        Admin => "ADMIN",
        Mentor => "MENTOR",
        Student => "STUDENT",
    }
    default = Student;
}

string_enum! {
    /// Account state; banned users cannot log in
    pub enum UserStatus {
        Active => "ACTIVE",
        Banned => "BANNED",
    }
    default = Active;
}

/// Input for creating a new user (before password hashing)
#[derive(Debug, Clone)]
pub struct CreateUserInput {
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub display_name: Option<String>,
    pub role: UserRole,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(id: i64, role: UserRole) -> User {
        let mut user = User::new(format!("user{}", id), format!("user{}@example.com", id), "hash".into(), role);
        user.id = id;
        user
    }

    #[test]
    fn test_user_new_defaults() {
        let user = User::new("ana".into(), "ana@example.com".into(), "hash".into(), UserRole::Student);
        assert_eq!(user.id, 0);
        assert_eq!(user.status, UserStatus::Active);
        assert_eq!(user.public_name(), "ana");
    }

    #[test]
    fn test_roles() {
        assert!(user(1, UserRole::Admin).is_admin());
        assert!(user(1, UserRole::Admin).is_mentor());
        assert!(user(2, UserRole::Mentor).is_mentor());
        assert!(!user(3, UserRole::Student).is_mentor());
    }

    #[test]
    fn test_can_manage() {
        let admin = user(1, UserRole::Admin);
        let student = user(2, UserRole::Student);

        assert!(admin.can_manage(99));
        assert!(student.can_manage(2));
        assert!(!student.can_manage(1));
    }

    #[test]
    fn test_role_parsing() {
        assert_eq!("mentor".parse::<UserRole>().unwrap(), UserRole::Mentor);
        assert_eq!("ADMIN".parse::<UserRole>().unwrap(), UserRole::Admin);
        assert!("author".parse::<UserRole>().is_err());
        assert_eq!(UserRole::default(), UserRole::Student);
    }

    #[test]
    fn test_password_hash_not_serialized() {
        let json = serde_json::to_value(user(1, UserRole::Student)).unwrap();
        assert!(json.get("password_hash").is_none());
        assert_eq!(json["role"], "STUDENT");
    }
}
