use argon2::{
    password_hash::{Encoding, SaltString},
    Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
};
use chrono::{Duration, Utc};
use rand::rngs::OsRng;
use std::sync::Arc;
use thiserror::Error;

use crate::{
    util::random_string, Database, DatabaseError, NewSession, NewUser, SessionData, UserData,
};

pub struct Auth<Db> {
    db: Arc<Db>,
    argon: Argon2<'static>,
}

#[derive(Debug, Error)]
pub enum AuthError {
    /// Username or password is incorrect
    #[error("Invalid credentials")]
    InvalidCredentials,
    /// Something else went wrong with the database
    #[error(transparent)]
    Db(DatabaseError),
    #[error("HashError: {0}")]
    HashError(String),
}

impl<Db> Auth<Db>
where
    Db: Database,
{
    const SESSION_DURATION_IN_DAYS: usize = 7;

    pub fn new(db: &Arc<Db>) -> Self {
        Self {
            db: db.clone(),
            argon: Argon2::default(),
        }
    }

    /// Logs in a user, returning a new session
    pub async fn login(&self, credentials: Credentials) -> Result<SessionData, AuthError> {
        self.clear_expired().await?;

        let user = self
            .db
            .user_by_username(&credentials.username)
            .await
            .map_err(|e| match e {
                DatabaseError::NotFound { .. } => AuthError::InvalidCredentials,
                err => AuthError::Db(err),
            })?;

        let stored_password = PasswordHash::parse(&user.password, Encoding::default())
            .map_err(|e| AuthError::HashError(e.to_string()))?;

        self.argon
            .verify_password(credentials.password.as_bytes(), &stored_password)
            .map_err(|_| AuthError::InvalidCredentials)?;

        self.create_session_for(user).await
    }

    /// Deletes the associated session, if it exists
    pub async fn logout(&self, token: &str) -> Result<(), DatabaseError> {
        self.db.delete_session_by_token(token).await
    }

    /// Creates a user and logs them in right away
    pub async fn register(&self, new_user: NewRegistration) -> Result<SessionData, AuthError> {
        let salt = SaltString::generate(&mut OsRng);
        let hashed_password = self
            .argon
            .hash_password(new_user.password.as_bytes(), &salt)
            .map_err(|e| AuthError::HashError(e.to_string()))?
            .to_string();

        let user = self
            .db
            .create_user(NewUser {
                username: new_user.username,
                password: hashed_password,
                display_name: new_user.display_name,
            })
            .await
            .map_err(AuthError::Db)?;

        self.create_session_for(user).await
    }

    /// Returns a session if it exists
    pub async fn session(&self, token: &str) -> Result<SessionData, DatabaseError> {
        self.db.session_by_token(token).await
    }

    async fn create_session_for(&self, user: UserData) -> Result<SessionData, AuthError> {
        let expires_at = Utc::now() + Duration::days(Self::SESSION_DURATION_IN_DAYS as i64);

        let new_session = NewSession {
            token: random_string(32),
            user_id: user.id,
            expires_at,
        };

        self.db
            .create_session(new_session)
            .await
            .map_err(AuthError::Db)
    }

    async fn clear_expired(&self) -> Result<(), AuthError> {
        self.db
            .clear_expired_sessions()
            .await
            .map_err(AuthError::Db)
    }
}

#[derive(Debug)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

#[derive(Debug)]
pub struct NewRegistration {
    pub username: String,
    pub password: String,
    pub display_name: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MemoryDatabase;

    fn auth() -> Auth<MemoryDatabase> {
        Auth::new(&Arc::new(MemoryDatabase::new()))
    }

    fn registration() -> NewRegistration {
        NewRegistration {
            username: "simonides".to_string(),
            password: "scopas-banquet".to_string(),
            display_name: "Simonides of Ceos".to_string(),
        }
    }

    #[tokio::test]
    async fn register_issues_a_session() {
        let auth = auth();

        let session = auth.register(registration()).await.expect("registers");

        assert_eq!(session.user.username, "simonides");
        assert_eq!(session.token.len(), 32);

        let looked_up = auth.session(&session.token).await.expect("session exists");
        assert_eq!(looked_up.user.id, session.user.id);
    }

    #[tokio::test]
    async fn login_verifies_the_password() {
        let auth = auth();
        auth.register(registration()).await.expect("registers");

        let wrong = auth
            .login(Credentials {
                username: "simonides".to_string(),
                password: "wrong".to_string(),
            })
            .await;

        assert!(matches!(wrong, Err(AuthError::InvalidCredentials)));

        let session = auth
            .login(Credentials {
                username: "simonides".to_string(),
                password: "scopas-banquet".to_string(),
            })
            .await
            .expect("logs in");

        assert_eq!(session.user.username, "simonides");
    }

    #[tokio::test]
    async fn logout_removes_the_session() {
        let auth = auth();
        let session = auth.register(registration()).await.expect("registers");

        auth.logout(&session.token).await.expect("logs out");

        assert!(auth.session(&session.token).await.is_err());
    }
}
