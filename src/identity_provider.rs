use crate::{
    error::BookingError,
    identity::{same_email, CredentialVerifier},
    types::{Identity, Session},
};
use std::{
    collections::HashMap,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
    time::{Duration, Instant},
};
use tracing::{info, warn};
use uuid::Uuid;

const DEFAULT_SECURITY_QUESTION: &str = "What was the name of your first pet?";

pub const DEFAULT_SESSION_TTL: Duration = Duration::from_secs(24 * 60 * 60);

#[derive(Debug, Clone)]
struct RegisteredAccount {
    identity: Identity,
    security_question: String,
    /// Stored lowercased.
    security_answer: String,
}

#[derive(Debug, Clone)]
struct ActiveSession {
    identity: Identity,
    /// `None` when the lifetime does not fit into an `Instant`.
    expires_at: Option<Instant>,
}

impl ActiveSession {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at.map_or(true, |expires_at| expires_at > now)
    }
}

/// Authenticates users through a [`CredentialVerifier`] and tracks which
/// session token belongs to which identity.
#[derive(Clone)]
pub struct IdentityProvider {
    verifier: Arc<dyn CredentialVerifier>,
    accounts: Arc<Mutex<Vec<RegisteredAccount>>>,
    sessions: Arc<Mutex<HashMap<Uuid, ActiveSession>>>,
    session_ttl: Duration,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn require(field: &str, value: &str) -> Result<(), BookingError> {
    if value.trim().is_empty() {
        return Err(BookingError::Validation(format!("{field} is required")));
    }
    Ok(())
}

impl IdentityProvider {
    pub fn new(verifier: Arc<dyn CredentialVerifier>, session_ttl: Duration) -> Self {
        Self {
            verifier,
            accounts: Arc::default(),
            sessions: Arc::default(),
            session_ttl,
        }
    }

    pub fn login(&self, email: &str, password: &str) -> Result<Session, BookingError> {
        let identity = self
            .verifier
            .verify(email, password)
            .ok_or(BookingError::InvalidCredentials)?;

        info!(user = %identity.id, "User logged in");
        Ok(self.open_session(identity))
    }

    pub fn register(
        &self,
        name: &str,
        email: &str,
        password: &str,
        security_question: &str,
        security_answer: &str,
    ) -> Result<Session, BookingError> {
        require("name", name)?;
        require("email", email)?;
        require("password", password)?;
        require("securityQuestion", security_question)?;
        require("securityAnswer", security_answer)?;

        let identity = {
            let mut accounts = lock(&self.accounts);
            if self.verifier.knows(email)
                || accounts
                    .iter()
                    .any(|account| same_email(&account.identity.email, email))
            {
                return Err(BookingError::EmailTaken);
            }

            let identity = Identity {
                id: Uuid::new_v4().to_string(),
                name: name.trim().to_string(),
                email: email.trim().to_string(),
                is_admin: false,
            };
            accounts.push(RegisteredAccount {
                identity: identity.clone(),
                security_question: security_question.to_string(),
                security_answer: security_answer.to_lowercase(),
            });
            identity
        };

        info!(user = %identity.id, "User registered");
        Ok(self.open_session(identity))
    }

    /// First step of a password reset: the question the user has to answer.
    pub fn security_question(&self, email: &str) -> Result<String, BookingError> {
        let stored = lock(&self.accounts)
            .iter()
            .find(|account| same_email(&account.identity.email, email))
            .map(|account| account.security_question.clone());
        match stored {
            Some(question) => Ok(question),
            None if self.verifier.knows(email) => Ok(DEFAULT_SECURITY_QUESTION.to_string()),
            None => Err(BookingError::EmailNotFound),
        }
    }

    pub fn reset_password(
        &self,
        email: &str,
        security_answer: &str,
        new_password: &str,
    ) -> Result<(), BookingError> {
        require("newPassword", new_password)?;

        let stored_answer = lock(&self.accounts)
            .iter()
            .find(|account| same_email(&account.identity.email, email))
            .map(|account| account.security_answer.clone());
        if stored_answer.is_none() && !self.verifier.knows(email) {
            return Err(BookingError::EmailNotFound);
        }

        let expected = stored_answer
            .or_else(|| self.verifier.fallback_security_answer(email))
            .ok_or(BookingError::IncorrectSecurityAnswer)?;
        if security_answer.to_lowercase() != expected {
            return Err(BookingError::IncorrectSecurityAnswer);
        }

        if self.verifier.update_password(email, new_password) {
            info!(email = %email.trim(), "Password reset");
        } else {
            warn!(
                email = %email.trim(),
                "Security answer verified, but no credential store holds this account. \
                 Password unchanged"
            );
        }
        Ok(())
    }

    pub fn logout(&self, token: Uuid) {
        if let Some(session) = lock(&self.sessions).remove(&token) {
            info!(user = %session.identity.id, "User logged out");
        }
    }

    /// Identity behind a live session. Expired sessions are dropped on sight.
    pub fn identity(&self, token: Uuid) -> Option<Identity> {
        let now = Instant::now();
        let mut sessions = lock(&self.sessions);
        if !sessions.get(&token)?.is_live(now) {
            sessions.remove(&token);
            return None;
        }
        sessions.get(&token).map(|session| session.identity.clone())
    }

    fn open_session(&self, identity: Identity) -> Session {
        let now = Instant::now();
        let token = Uuid::new_v4();
        let mut sessions = lock(&self.sessions);
        sessions.retain(|_, session| session.is_live(now));
        sessions.insert(
            token,
            ActiveSession {
                identity: identity.clone(),
                expires_at: now.checked_add(self.session_ttl),
            },
        );
        Session { token, identity }
    }
}
