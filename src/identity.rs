use crate::types::Identity;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Decides which email/password pairs are valid. Swapping the implementation
/// changes how users authenticate without touching booking logic.
#[cfg_attr(test, mockall::automock)]
pub trait CredentialVerifier: Send + Sync {
    fn verify(&self, email: &str, password: &str) -> Option<Identity>;
    /// Whether the verifier owns an account for `email`.
    fn knows(&self, email: &str) -> bool;
    /// Answer accepted for password resets when the account never stored one.
    fn fallback_security_answer(&self, email: &str) -> Option<String>;
    /// Returns false when the verifier has no credentials for `email`.
    fn update_password(&self, email: &str, new_password: &str) -> bool;
}

const DEMO_PASSWORD: &str = "password";
const DEMO_SECURITY_ANSWER: &str = "demo";

struct DemoAccount {
    identity: Identity,
    password: String,
}

/// The two hardcoded demo accounts.
pub struct DemoAccountVerifier {
    accounts: Mutex<Vec<DemoAccount>>,
}

impl Default for DemoAccountVerifier {
    fn default() -> Self {
        let accounts = vec![
            DemoAccount {
                identity: Identity {
                    id: "1".into(),
                    name: "Admin User".into(),
                    email: "admin@example.com".into(),
                    is_admin: true,
                },
                password: DEMO_PASSWORD.into(),
            },
            DemoAccount {
                identity: Identity {
                    id: "2".into(),
                    name: "Regular User".into(),
                    email: "user@example.com".into(),
                    is_admin: false,
                },
                password: DEMO_PASSWORD.into(),
            },
        ];
        Self {
            accounts: Mutex::new(accounts),
        }
    }
}

impl DemoAccountVerifier {
    fn lock(&self) -> MutexGuard<'_, Vec<DemoAccount>> {
        self.accounts.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

pub fn same_email(a: &str, b: &str) -> bool {
    a.trim().eq_ignore_ascii_case(b.trim())
}

impl CredentialVerifier for DemoAccountVerifier {
    fn verify(&self, email: &str, password: &str) -> Option<Identity> {
        self.lock()
            .iter()
            .find(|account| {
                same_email(&account.identity.email, email) && account.password == password
            })
            .map(|account| account.identity.clone())
    }

    fn knows(&self, email: &str) -> bool {
        self.lock()
            .iter()
            .any(|account| same_email(&account.identity.email, email))
    }

    fn fallback_security_answer(&self, email: &str) -> Option<String> {
        self.knows(email).then(|| DEMO_SECURITY_ANSWER.to_string())
    }

    fn update_password(&self, email: &str, new_password: &str) -> bool {
        match self
            .lock()
            .iter_mut()
            .find(|account| same_email(&account.identity.email, email))
        {
            Some(account) => {
                account.password = new_password.to_string();
                true
            }
            None => false,
        }
    }
}
