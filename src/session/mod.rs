//! Session identity provider.
//!
//! Every request carries one opaque identifier. It is generated once, persisted,
//! and may be replaced by the server; replacement persists before it is applied.

use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use rand::rngs::OsRng;
use rand::RngCore;

use crate::errors::StoreError;

/// Storage key of the persisted identity.
pub const SESSION_KEY: &str = "x-session-id";

/// Number of random bytes in a generated identity.
const IDENTITY_BYTES: usize = 16;

/// Opaque per-client session identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SessionIdentity(String);

impl SessionIdentity {
    /// Generate a fresh identity from 16 OS-random bytes, hex encoded.
    pub fn generate() -> Self {
        let mut bytes = [0u8; IDENTITY_BYTES];
        OsRng.fill_bytes(&mut bytes);
        Self(hex::encode(bytes))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for SessionIdentity {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl fmt::Display for SessionIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Whether the active identity will survive a restart.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionDurability {
    Durable,
    /// Storage failed; the identity lives only as long as this process.
    Degraded,
}

/// Durable key/value slot for the session identity.
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn load(&self) -> Result<Option<String>, StoreError>;
    async fn save(&self, value: &str) -> Result<(), StoreError>;
}

/// Process-local store, used in tests and when no database is configured.
#[derive(Debug, Default)]
pub struct MemorySessionStore {
    value: Mutex<Option<String>>,
}

impl MemorySessionStore {
    pub fn with_value(value: impl Into<String>) -> Self {
        Self {
            value: Mutex::new(Some(value.into())),
        }
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn load(&self) -> Result<Option<String>, StoreError> {
        Ok(self
            .value
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone())
    }

    async fn save(&self, value: &str) -> Result<(), StoreError> {
        *self.value.lock().unwrap_or_else(PoisonError::into_inner) = Some(value.to_string());
        Ok(())
    }
}

struct Active {
    identity: SessionIdentity,
    durability: SessionDurability,
}

/// The single active session identity, shared by the transport.
pub struct SessionState {
    store: Option<Arc<dyn SessionStore>>,
    active: Mutex<Active>,
    // Serializes replacements so the persisted and in-memory values never diverge.
    replace_lock: tokio::sync::Mutex<()>,
}

impl SessionState {
    /// Return the persisted identity, creating and persisting one on first use.
    ///
    /// Storage failures fall back to a process-lifetime identity and mark the
    /// session as degraded.
    pub async fn get_or_create(store: Arc<dyn SessionStore>) -> Self {
        let (identity, durability) = match store.load().await {
            Ok(Some(existing)) if !existing.is_empty() => {
                (SessionIdentity::from(existing), SessionDurability::Durable)
            }
            Ok(_) => {
                let fresh = SessionIdentity::generate();
                match store.save(fresh.as_str()).await {
                    Ok(()) => {
                        tracing::info!("Created new session identity");
                        (fresh, SessionDurability::Durable)
                    }
                    Err(e) => {
                        tracing::warn!("Session identity not persisted, will not survive restart: {}", e);
                        (fresh, SessionDurability::Degraded)
                    }
                }
            }
            Err(e) => {
                tracing::warn!("Session store unavailable, using in-memory identity: {}", e);
                (SessionIdentity::generate(), SessionDurability::Degraded)
            }
        };

        Self {
            store: Some(store),
            active: Mutex::new(Active {
                identity,
                durability,
            }),
            replace_lock: tokio::sync::Mutex::new(()),
        }
    }

    /// An identity with no backing store at all.
    pub fn ephemeral() -> Self {
        tracing::warn!("No session store configured; session identity is process-local");
        Self {
            store: None,
            active: Mutex::new(Active {
                identity: SessionIdentity::generate(),
                durability: SessionDurability::Degraded,
            }),
            replace_lock: tokio::sync::Mutex::new(()),
        }
    }

    pub fn current(&self) -> SessionIdentity {
        self.lock().identity.clone()
    }

    pub fn durability(&self) -> SessionDurability {
        self.lock().durability
    }

    pub fn is_degraded(&self) -> bool {
        self.durability() == SessionDurability::Degraded
    }

    /// Adopt a server-issued identity: persist first, then make it active.
    ///
    /// A failed persist still applies the value in memory and degrades the session.
    pub async fn replace(&self, identity: SessionIdentity) {
        let _guard = self.replace_lock.lock().await;

        if self.lock().identity == identity {
            return;
        }

        let durability = match &self.store {
            Some(store) => match store.save(identity.as_str()).await {
                Ok(()) => None,
                Err(e) => {
                    tracing::warn!("Rotated session identity not persisted: {}", e);
                    Some(SessionDurability::Degraded)
                }
            },
            None => Some(SessionDurability::Degraded),
        };

        let mut active = self.lock();
        active.identity = identity;
        if let Some(durability) = durability {
            active.durability = durability;
        }
        tracing::debug!("Adopted server-issued session identity");
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Active> {
        self.active.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
