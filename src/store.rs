//! # Registry persistence adapter.
//!
//! The engine never persists anything on its own; a host hands a [`StateStore`] to
//! [`Engine::save_to`](crate::Engine::save_to) /
//! [`Engine::restore_from`](crate::Engine::restore_from). [`MemoryStore`] keeps the
//! snapshots as a JSON document in memory.

use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use thiserror::Error;

use crate::units::UnitSnapshot;

/// Errors raised by a [`StateStore`].
#[derive(Error, Debug)]
pub enum StoreError {
    /// Snapshots could not be encoded or decoded.
    #[error("snapshot codec error: {0}")]
    Codec(#[from] serde_json::Error),

    /// The storage backend failed.
    #[error("storage backend error: {0}")]
    Backend(String),
}

impl StoreError {
    pub fn as_label(&self) -> &'static str {
        match self {
            StoreError::Codec(_) => "store_codec",
            StoreError::Backend(_) => "store_backend",
        }
    }
}

/// Durable home of registry snapshots.
#[async_trait]
pub trait StateStore: Send + Sync {
    async fn save_state(&self, units: &[UnitSnapshot]) -> Result<(), StoreError>;

    /// `Ok(None)` when nothing was saved yet.
    async fn load_state(&self) -> Result<Option<Vec<UnitSnapshot>>, StoreError>;
}

/// In-memory store holding the last saved snapshots as JSON.
#[derive(Debug, Default)]
pub struct MemoryStore {
    doc: Mutex<Option<String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// The stored JSON document, if any.
    pub fn json(&self) -> Option<String> {
        self.doc
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl StateStore for MemoryStore {
    async fn save_state(&self, units: &[UnitSnapshot]) -> Result<(), StoreError> {
        let json = serde_json::to_string(units)?;
        *self.doc.lock().unwrap_or_else(PoisonError::into_inner) = Some(json);
        Ok(())
    }

    async fn load_state(&self) -> Result<Option<Vec<UnitSnapshot>>, StoreError> {
        match self.json() {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }
}
