//! Secrets snapshot shared with the processing step.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

/// Holds the current secrets map and replaces it as a whole.
///
/// Consistency comes from whole-value replacement, not from locking: a map is
/// never mutated after it is published, and readers get an `Arc` to it, so a
/// reader never sees a half-updated snapshot. The `RwLock` only guards the
/// pointer swap and is held for a clone or an assignment, never while a map is
/// built or read.
#[derive(Debug, Default)]
pub struct Secrets {
    current: RwLock<Arc<HashMap<String, String>>>,
}

impl Secrets {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, secrets: HashMap<String, String>) {
        let next = Arc::new(secrets);
        *self.current.write().unwrap_or_else(|e| e.into_inner()) = next;
        tracing::debug!("secrets snapshot replaced");
    }

    pub fn get(&self) -> Arc<HashMap<String, String>> {
        Arc::clone(&self.current.read().unwrap_or_else(|e| e.into_inner()))
    }
}
