//! Credential store contract and role ordering.
//!
//! The channel never owns authentication. It reads the current identity and
//! credential from a [`CredentialStore`] each time it connects or sends.
//! [`MemoryCredentialStore`] is the in-process implementation used by the
//! binary and tests.

use std::fmt;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::events::{Timestamp, now_ms};

/// Lifetime of a sign-in when the caller asks for the default expiry.
pub const DEFAULT_TOKEN_TTL_MS: i64 = 24 * 60 * 60 * 1000;

// ─────────────────────────────────────────────────────────────────────────────
// Role
// ─────────────────────────────────────────────────────────────────────────────

/// Permission level. Declaration order is privilege order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Role {
    /// Works on tasks.
    Developer,
    /// Manages projects and their teams.
    ProjectManager,
    /// Full access.
    Admin,
}

impl Role {
    /// Wire name of the role.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Developer => "Developer",
            Self::ProjectManager => "ProjectManager",
            Self::Admin => "Admin",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace(['-', '_', ' '], "").as_str() {
            "developer" | "dev" => Ok(Self::Developer),
            "projectmanager" | "pm" => Ok(Self::ProjectManager),
            "admin" => Ok(Self::Admin),
            other => Err(format!("unknown role: {other}")),
        }
    }
}

/// Whether `role` satisfies `required`.
pub fn has_permission(role: Role, required: Role) -> bool {
    role >= required
}

// ─────────────────────────────────────────────────────────────────────────────
// Identity + Credential
// ─────────────────────────────────────────────────────────────────────────────

/// Who is signed in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Identity {
    /// User ID, stamped as `originId` on sent events.
    pub id: String,
    /// Permission level.
    pub role: Role,
    /// Display name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl Identity {
    /// Identity without a display name.
    pub fn new(id: impl Into<String>, role: Role) -> Self {
        Self {
            id: id.into(),
            role,
            name: None,
        }
    }
}

/// Opaque bearer token presented to the transport.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Credential(String);

impl Credential {
    /// Wrap a raw token.
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// Raw token.
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let prefix: String = self.0.chars().take(10).collect();
        write!(f, "Credential({prefix}...)")
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Store
// ─────────────────────────────────────────────────────────────────────────────

/// Read side of authentication, shared by the channel and consumers.
pub trait CredentialStore: Send + Sync {
    /// Currently signed-in identity, if any.
    fn identity(&self) -> Option<Identity>;

    /// Token for the current sign-in, if any.
    fn credential(&self) -> Option<Credential>;

    /// Whether the current identity satisfies `required`. Signed out is never
    /// permitted.
    fn has_permission(&self, required: Role) -> bool {
        self.identity()
            .is_some_and(|identity| has_permission(identity.role, required))
    }
}

#[derive(Debug, Clone)]
struct SignIn {
    credential: Credential,
    identity: Identity,
    expires_at: Option<Timestamp>,
}

impl SignIn {
    fn is_live(&self) -> bool {
        self.expires_at.is_none_or(|at| now_ms() < at)
    }
}

/// In-memory [`CredentialStore`].
#[derive(Debug, Default)]
pub struct MemoryCredentialStore {
    current: RwLock<Option<SignIn>>,
}

impl MemoryCredentialStore {
    /// Signed-out store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Store already signed in with no expiry.
    pub fn signed_in(credential: Credential, identity: Identity) -> Self {
        let store = Self::new();
        store.sign_in(credential, identity, None);
        store
    }

    /// Replace the current sign-in. `expires_at` of `None` never expires.
    pub fn sign_in(&self, credential: Credential, identity: Identity, expires_at: Option<Timestamp>) {
        tracing::debug!(user_id = %identity.id, role = %identity.role, "signed in");
        *self.current.write() = Some(SignIn {
            credential,
            identity,
            expires_at,
        });
    }

    /// Clear the current sign-in.
    pub fn sign_out(&self) {
        if self.current.write().take().is_some() {
            tracing::debug!("signed out");
        }
    }

    fn live(&self) -> Option<SignIn> {
        self.current.read().as_ref().filter(|s| s.is_live()).cloned()
    }
}

impl CredentialStore for MemoryCredentialStore {
    fn identity(&self) -> Option<Identity> {
        self.live().map(|s| s.identity)
    }

    fn credential(&self) -> Option<Credential> {
        self.live().map(|s| s.credential)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
