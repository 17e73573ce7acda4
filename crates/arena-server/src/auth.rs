//! Credential verification.
//!
//! The session engine only needs "verify credentials, return a stable user
//! identity". [`Authenticator`] is that capability; [`StaticAuthenticator`]
//! implements it over the accounts listed in the config file.

use std::collections::BTreeMap;

use arena_types::{UserId, UserInfo};
use serde::Deserialize;
use uuid::Uuid;

use crate::config::AccountConfig;

/// Username and password as sent with every authenticated request.
#[derive(Clone, PartialEq, Eq, Deserialize)]
pub struct Credentials {
    /// Login name.
    pub username: String,
    /// Plain-text password.
    pub password: String,
}

impl core::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .finish_non_exhaustive()
    }
}

/// Verifies credentials and resolves them to a user.
pub trait Authenticator: Send + Sync {
    /// The user these credentials belong to, or `None` if they are wrong.
    fn verify(&self, credentials: &Credentials) -> Option<UserInfo>;
}

/// Stable user ID for `username`.
///
/// Derived with UUID v5 so the same account keeps its identity across
/// restarts and config reloads.
pub fn user_id_for(username: &str) -> UserId {
    UserId::from(Uuid::new_v5(&Uuid::NAMESPACE_OID, username.as_bytes()))
}

struct Account {
    password: String,
    info: UserInfo,
}

/// An [`Authenticator`] over a fixed set of accounts.
#[derive(Default)]
pub struct StaticAuthenticator {
    accounts: BTreeMap<String, Account>,
}

impl StaticAuthenticator {
    /// Build from configured accounts. Later duplicates of a username win.
    pub fn from_accounts(accounts: &[AccountConfig]) -> Self {
        let mut auth = Self::default();
        for account in accounts {
            auth.insert(
                &account.username,
                &account.password,
                account.display.as_deref().unwrap_or(&account.username),
            );
        }
        auth
    }

    /// Add or replace one account.
    pub fn insert(&mut self, username: &str, password: &str, display: &str) {
        self.accounts.insert(
            username.to_owned(),
            Account {
                password: password.to_owned(),
                info: UserInfo {
                    id: user_id_for(username),
                    username: username.to_owned(),
                    display: display.to_owned(),
                },
            },
        );
    }

    /// Number of accounts.
    pub fn len(&self) -> usize {
        self.accounts.len()
    }

    /// Whether no account can log in.
    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty()
    }
}

impl Authenticator for StaticAuthenticator {
    fn verify(&self, credentials: &Credentials) -> Option<UserInfo> {
        self.accounts
            .get(&credentials.username)
            .filter(|account| account.password == credentials.password)
            .map(|account| account.info.clone())
    }
}

impl core::fmt::Debug for StaticAuthenticator {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("StaticAuthenticator")
            .field("usernames", &self.accounts.keys().collect::<Vec<_>>())
            .finish()
    }
}
