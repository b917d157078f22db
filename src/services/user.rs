//! User service
//!
//! Registration, login/logout and session validation. The first account
//! registered becomes `ADMIN`; everyone after that starts as `STUDENT`.

use crate::db::repositories::{SessionRepository, UserRepository};
use crate::models::{CreateUserInput, Session, User, UserRole};
use crate::services::password::{hash_password, is_acceptable_password, verify_password, MIN_PASSWORD_LENGTH};
use anyhow::Context;
use chrono::Duration;
use once_cell::sync::Lazy;
use regex::Regex;
use std::sync::Arc;

/// Default session lifetime in days
const DEFAULT_SESSION_DAYS: i64 = 7;

static USERNAME_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Za-z0-9_-]{3,50}$").expect("valid username regex"));

/// Error types for user service operations
#[derive(Debug, thiserror::Error)]
pub enum UserServiceError {
    /// Invalid credentials or unknown session
    #[error("Authentication failed: {0}")]
    AuthenticationError(String),

    /// Account is banned
    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    /// Username or email already taken
    #[error("User already exists: {0}")]
    UserExists(String),

    #[error("User not found: {0}")]
    NotFound(i64),

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

/// User service for managing accounts and sessions
pub struct UserService {
    user_repo: Arc<dyn UserRepository>,
    session_repo: Arc<dyn SessionRepository>,
    session_days: i64,
}

impl UserService {
    pub fn new(user_repo: Arc<dyn UserRepository>, session_repo: Arc<dyn SessionRepository>) -> Self {
        Self::with_session_days(user_repo, session_repo, DEFAULT_SESSION_DAYS)
    }

    /// Create a service whose sessions last `session_days`
    pub fn with_session_days(
        user_repo: Arc<dyn UserRepository>,
        session_repo: Arc<dyn SessionRepository>,
        session_days: i64,
    ) -> Self {
        Self {
            user_repo,
            session_repo,
            session_days,
        }
    }

    /// Session lifetime, for cookie `Max-Age`
    pub fn session_lifetime(&self) -> Duration {
        Duration::days(self.session_days)
    }

    /// Register a new account.
    ///
    /// # Errors
    ///
    /// - `ValidationError` for a malformed username, email or short password
    /// - `UserExists` when the username or email is taken
    pub async fn register(&self, input: RegisterInput) -> Result<User, UserServiceError> {
        let username = input.username.trim().to_string();
        let email = input.email.trim().to_string();
        validate_register_input(&username, &email, &input.password)?;

        if self
            .user_repo
            .get_by_username(&username)
            .await
            .context("Failed to check username")?
            .is_some()
        {
            return Err(UserServiceError::UserExists(format!(
                "Username '{}' is already taken",
                username
            )));
        }

        if self
            .user_repo
            .get_by_email(&email)
            .await
            .context("Failed to check email")?
            .is_some()
        {
            return Err(UserServiceError::UserExists(format!(
                "Email '{}' is already registered",
                email
            )));
        }

        let role = if self.is_first_user().await? {
            UserRole::Admin
        } else {
            UserRole::Student
        };

        let password_hash = hash_password(&input.password)?;
        let user = self
            .user_repo
            .create(&CreateUserInput {
                username,
                email,
                password_hash,
                display_name: input.display_name.filter(|n| !n.trim().is_empty()),
                role,
            })
            .await
            .context("Failed to create user")?;

        tracing::info!(user_id = user.id, role = %user.role, "User registered");
        Ok(user)
    }

    /// Verify credentials and open a session.
    ///
    /// Banned accounts are rejected with `Forbidden` only after the
    /// password has been verified.
    pub async fn login(&self, input: LoginInput) -> Result<(User, Session), UserServiceError> {
        let invalid = || UserServiceError::AuthenticationError("Invalid username or password".to_string());

        let user = self
            .find_by_username_or_email(input.username_or_email.trim())
            .await?
            .ok_or_else(invalid)?;

        if !verify_password(&input.password, &user.password_hash).context("Failed to verify password")? {
            return Err(invalid());
        }

        if user.is_banned() {
            return Err(UserServiceError::Forbidden(
                "This account has been banned".to_string(),
            ));
        }

        let session = self
            .session_repo
            .create(&Session::new(user.id, self.session_lifetime()))
            .await
            .context("Failed to create session")?;

        tracing::info!(user_id = user.id, "User logged in");
        Ok((user, session))
    }

    /// Invalidate a session token
    pub async fn logout(&self, token: &str) -> Result<(), UserServiceError> {
        self.session_repo
            .delete(token)
            .await
            .context("Failed to delete session")?;
        Ok(())
    }

    /// User behind a session token; expired sessions are deleted
    pub async fn validate_session(&self, token: &str) -> Result<Option<User>, UserServiceError> {
        let Some(session) = self
            .session_repo
            .get_by_id(token)
            .await
            .context("Failed to get session")?
        else {
            return Ok(None);
        };

        if session.is_expired() {
            if let Err(e) = self.session_repo.delete(token).await {
                tracing::warn!("Failed to delete expired session: {}", e);
            }
            return Ok(None);
        }

        let user = self
            .user_repo
            .get_by_id(session.user_id)
            .await
            .context("Failed to get user")?;

        Ok(user.filter(|u| !u.is_banned()))
    }

    pub async fn get_by_id(&self, id: i64) -> Result<Option<User>, UserServiceError> {
        Ok(self.user_repo.get_by_id(id).await.context("Failed to get user")?)
    }

    /// Like [`get_by_id`](Self::get_by_id) but missing users are an error
    pub async fn require(&self, id: i64) -> Result<User, UserServiceError> {
        self.get_by_id(id).await?.ok_or(UserServiceError::NotFound(id))
    }

    /// Page of users, newest first, with the total count
    pub async fn list(&self, page: i64, per_page: i64) -> Result<(Vec<User>, i64), UserServiceError> {
        let per_page = per_page.clamp(1, 100);
        Ok(self
            .user_repo
            .list(page.max(1), per_page)
            .await
            .context("Failed to list users")?)
    }

    /// Change a user's role (admin operation)
    pub async fn change_role(&self, id: i64, role: UserRole) -> Result<User, UserServiceError> {
        let mut user = self.require(id).await?;
        user.role = role;
        let updated = self.user_repo.update(&user).await.context("Failed to update user")?;
        tracing::info!(user_id = id, role = %role, "User role changed");
        Ok(updated)
    }

    /// Update the display name; blank clears it
    pub async fn update_profile(&self, id: i64, display_name: Option<String>) -> Result<User, UserServiceError> {
        let mut user = self.require(id).await?;
        user.display_name = display_name
            .map(|n| n.trim().to_string())
            .filter(|n| !n.is_empty());
        Ok(self.user_repo.update(&user).await.context("Failed to update user")?)
    }

    /// Replace the password after checking the current one
    pub async fn change_password(
        &self,
        id: i64,
        current_password: &str,
        new_password: &str,
    ) -> Result<(), UserServiceError> {
        let user = self.require(id).await?;
        if !verify_password(current_password, &user.password_hash).context("Failed to verify password")? {
            return Err(UserServiceError::AuthenticationError(
                "Current password is incorrect".to_string(),
            ));
        }
        if !is_acceptable_password(new_password) {
            return Err(UserServiceError::ValidationError(format!(
                "Password must be at least {} characters",
                MIN_PASSWORD_LENGTH
            )));
        }

        let hash = hash_password(new_password)?;
        self.user_repo
            .update_password(id, &hash)
            .await
            .context("Failed to update password")?;
        Ok(())
    }

    /// Whether no account exists yet
    pub async fn is_first_user(&self) -> Result<bool, UserServiceError> {
        let count = self.user_repo.count().await.context("Failed to count users")?;
        Ok(count == 0)
    }

    /// Delete every expired session; returns how many were removed
    pub async fn cleanup_expired_sessions(&self) -> Result<i64, UserServiceError> {
        Ok(self
            .session_repo
            .delete_expired()
            .await
            .context("Failed to delete expired sessions")?)
    }

    async fn find_by_username_or_email(&self, login: &str) -> Result<Option<User>, UserServiceError> {
        if let Some(user) = self
            .user_repo
            .get_by_username(login)
            .await
            .context("Failed to get user by username")?
        {
            return Ok(Some(user));
        }

        Ok(self
            .user_repo
            .get_by_email(login)
            .await
            .context("Failed to get user by email")?)
    }
}

fn validate_register_input(username: &str, email: &str, password: &str) -> Result<(), UserServiceError> {
    if !USERNAME_RE.is_match(username) {
        return Err(UserServiceError::ValidationError(
            "Username must be 3-50 characters of letters, digits, '_' or '-'".to_string(),
        ));
    }

    let valid_email = email
        .split_once('@')
        .map(|(local, domain)| !local.is_empty() && !domain.is_empty())
        .unwrap_or(false);
    if !valid_email {
        return Err(UserServiceError::ValidationError("Invalid email format".to_string()));
    }

    if !is_acceptable_password(password) {
        return Err(UserServiceError::ValidationError(format!(
            "Password must be at least {} characters",
            MIN_PASSWORD_LENGTH
        )));
    }

    Ok(())
}

/// Input for user registration
#[derive(Debug, Clone)]
pub struct RegisterInput {
    pub username: String,
    pub email: String,
    pub password: String,
    pub display_name: Option<String>,
}

impl RegisterInput {
    pub fn new(username: impl Into<String>, email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            email: email.into(),
            password: password.into(),
            display_name: None,
        }
    }
}

/// Input for user login
#[derive(Debug, Clone)]
pub struct LoginInput {
    pub username_or_email: String,
    pub password: String,
}

impl LoginInput {
    pub fn new(username_or_email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username_or_email: username_or_email.into(),
            password: password.into(),
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::db::repositories::{SqlxSessionRepository, SqlxUserRepository};
    use crate::db::{create_test_pool, migrations, DynDatabasePool};
    use crate::models::UserStatus;

    pub(crate) async fn setup_test_service() -> (DynDatabasePool, UserService) {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");

        let service = UserService::new(
            SqlxUserRepository::boxed(pool.clone()),
            SqlxSessionRepository::boxed(pool.clone()),
        );
        (pool, service)
    }

    #[tokio::test]
    async fn test_first_user_becomes_admin() {
        let (_pool, service) = setup_test_service().await;

        let admin = service
            .register(RegisterInput::new("coord", "coord@example.com", "password123"))
            .await
            .expect("Failed to register");
        let student = service
            .register(RegisterInput::new("aluno", "aluno@example.com", "password123"))
            .await
            .expect("Failed to register");

        assert_eq!(admin.role, UserRole::Admin);
        assert_eq!(student.role, UserRole::Student);
    }

    #[tokio::test]
    async fn test_register_rejects_duplicates() {
        let (_pool, service) = setup_test_service().await;
        service
            .register(RegisterInput::new("aluno", "aluno@example.com", "password123"))
            .await
            .unwrap();

        let same_name = service
            .register(RegisterInput::new("ALUNO", "outro@example.com", "password123"))
            .await;
        let same_email = service
            .register(RegisterInput::new("outro", "Aluno@Example.com", "password123"))
            .await;

        assert!(matches!(same_name, Err(UserServiceError::UserExists(_))));
        assert!(matches!(same_email, Err(UserServiceError::UserExists(_))));
    }

    #[tokio::test]
    async fn test_register_validation() {
        let (_pool, service) = setup_test_service().await;

        for input in [
            RegisterInput::new("ab", "ab@example.com", "password123"),
            RegisterInput::new("com espaco", "x@example.com", "password123"),
            RegisterInput::new("valido", "sem-arroba", "password123"),
            RegisterInput::new("valido", "v@example.com", "curta"),
        ] {
            let result = service.register(input).await;
            assert!(matches!(result, Err(UserServiceError::ValidationError(_))));
        }
    }

    #[tokio::test]
    async fn test_login_by_username_or_email() {
        let (_pool, service) = setup_test_service().await;
        service
            .register(RegisterInput::new("aluno", "aluno@example.com", "password123"))
            .await
            .unwrap();

        let (user, session) = service.login(LoginInput::new("aluno", "password123")).await.unwrap();
        assert_eq!(user.username, "aluno");
        assert!(!session.is_expired());

        assert!(service.login(LoginInput::new("aluno@example.com", "password123")).await.is_ok());
        assert!(matches!(
            service.login(LoginInput::new("aluno", "errada123")).await,
            Err(UserServiceError::AuthenticationError(_))
        ));

        let validated = service.validate_session(&session.id).await.unwrap();
        assert_eq!(validated.map(|u| u.id), Some(user.id));

        service.logout(&session.id).await.unwrap();
        assert!(service.validate_session(&session.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_banned_user_cannot_login() {
        let (pool, service) = setup_test_service().await;
        let user = service
            .register(RegisterInput::new("banido", "banido@example.com", "password123"))
            .await
            .unwrap();
        let mut banned = user.clone();
        banned.status = UserStatus::Banned;
        SqlxUserRepository::new(pool).update(&banned).await.unwrap();

        let result = service.login(LoginInput::new("banido", "password123")).await;
        assert!(matches!(result, Err(UserServiceError::Forbidden(_))));
    }

    #[tokio::test]
    async fn test_expired_session_is_removed() {
        let (pool, service) = setup_test_service().await;
        let user = service
            .register(RegisterInput::new("aluno", "aluno@example.com", "password123"))
            .await
            .unwrap();
        let sessions = SqlxSessionRepository::new(pool);
        let stale = sessions
            .create(&Session::new(user.id, Duration::seconds(-5)))
            .await
            .unwrap();

        assert!(service.validate_session(&stale.id).await.unwrap().is_none());
        assert!(sessions.get_by_id(&stale.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_change_password_and_role() {
        let (_pool, service) = setup_test_service().await;
        service
            .register(RegisterInput::new("coord", "coord@example.com", "password123"))
            .await
            .unwrap();
        let user = service
            .register(RegisterInput::new("aluno", "aluno@example.com", "password123"))
            .await
            .unwrap();

        assert!(matches!(
            service.change_password(user.id, "errada", "novasenha1").await,
            Err(UserServiceError::AuthenticationError(_))
        ));
        service.change_password(user.id, "password123", "novasenha1").await.unwrap();
        assert!(service.login(LoginInput::new("aluno", "novasenha1")).await.is_ok());

        let promoted = service.change_role(user.id, UserRole::Mentor).await.unwrap();
        assert_eq!(promoted.role, UserRole::Mentor);
        assert!(matches!(
            service.change_role(999, UserRole::Mentor).await,
            Err(UserServiceError::NotFound(999))
        ));
    }
}
