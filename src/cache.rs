use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::ir::CompiledUnit;

/// Compiled units keyed by the SHA-256 of their source. Units are immutable,
/// so a hit is shared rather than copied.
#[derive(Debug, Default)]
pub struct CompileCache {
    entries: Mutex<HashMap<String, Arc<CompiledUnit>>>,
}

impl CompileCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn compute_hash(source: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(source.as_bytes());
        format!("{:x}", hasher.finalize())
    }

    pub fn get(&self, source: &str) -> Option<Arc<CompiledUnit>> {
        let hash = Self::compute_hash(source);
        let entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.get(&hash).cloned()
    }

    pub fn set(&self, source: &str, unit: Arc<CompiledUnit>) {
        let hash = Self::compute_hash(source);
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.insert(hash, unit);
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.entries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clear();
    }
}
