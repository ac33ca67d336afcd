//! Persistence backends for slot values
//!
//! Slots bound to storage are loaded once at binding time and saved after
//! every successful commit. Values are wrapped in a [`StoredEnvelope`] that
//! carries the expiry, and encoded with serde_json.

use crate::errors::{StoreError, StoreResult};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError};

// ----------------------------------------------------------------------------
// Storage Trait
// ----------------------------------------------------------------------------

/// Key-value storage abstraction for persisted slot values
///
/// Methods are blocking. Saves after a commit run on the runtime's blocking
/// pool, while the read that seeds a slot happens inline when the slot is
/// bound.
pub trait KeyValueStore: Send + Sync {
    /// Store encoded data under a key
    fn store(&self, key: &str, data: Vec<u8>) -> StoreResult<()>;

    /// Retrieve encoded data by key
    fn retrieve(&self, key: &str) -> StoreResult<Option<Vec<u8>>>;

    /// Delete data by key
    fn delete(&self, key: &str) -> StoreResult<()>;

    /// List all keys
    fn list_keys(&self) -> StoreResult<Vec<String>>;

    /// Clear all stored data
    fn clear_all(&self) -> StoreResult<()>;

    /// Check if storage is available and accessible
    fn is_available(&self) -> bool;
}

// ----------------------------------------------------------------------------
// Stored Envelope
// ----------------------------------------------------------------------------

/// Persisted form of a slot value
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredEnvelope<T> {
    pub saved_at_ms: u64,
    pub expires_at_ms: Option<u64>,
    pub value: T,
}

impl<T> StoredEnvelope<T> {
    pub fn new(value: T, now_ms: u64, ttl_ms: Option<u64>) -> Self {
        Self {
            saved_at_ms: now_ms,
            expires_at_ms: ttl_ms.map(|ttl| now_ms.saturating_add(ttl)),
            value,
        }
    }

    pub fn is_expired(&self, now_ms: u64) -> bool {
        self.expires_at_ms.is_some_and(|expires| now_ms >= expires)
    }
}

impl<T: Serialize> StoredEnvelope<T> {
    pub fn encode(&self) -> StoreResult<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }
}

impl<T: DeserializeOwned> StoredEnvelope<T> {
    pub fn decode(data: &[u8]) -> StoreResult<Self> {
        Ok(serde_json::from_slice(data)?)
    }
}

// ----------------------------------------------------------------------------
// Memory Storage Implementation
// ----------------------------------------------------------------------------

/// In-memory storage implementation for testing and fallback
#[derive(Debug)]
pub struct MemoryStorage {
    data: Mutex<BTreeMap<String, Vec<u8>>>,
    available: AtomicBool,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self {
            data: Mutex::new(BTreeMap::new()),
            available: AtomicBool::new(true),
        }
    }

    /// Storage that rejects every operation
    pub fn unavailable() -> Self {
        let storage = Self::new();
        storage.set_available(false);
        storage
    }

    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    fn ensure_available(&self) -> StoreResult<()> {
        if self.is_available() {
            Ok(())
        } else {
            Err(StoreError::storage_error("Storage not available"))
        }
    }

    fn data(&self) -> std::sync::MutexGuard<'_, BTreeMap<String, Vec<u8>>> {
        self.data.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for MemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl KeyValueStore for MemoryStorage {
    fn store(&self, key: &str, data: Vec<u8>) -> StoreResult<()> {
        self.ensure_available()?;
        self.data().insert(key.to_string(), data);
        Ok(())
    }

    fn retrieve(&self, key: &str) -> StoreResult<Option<Vec<u8>>> {
        self.ensure_available()?;
        Ok(self.data().get(key).cloned())
    }

    fn delete(&self, key: &str) -> StoreResult<()> {
        self.ensure_available()?;
        self.data().remove(key);
        Ok(())
    }

    fn list_keys(&self) -> StoreResult<Vec<String>> {
        self.ensure_available()?;
        Ok(self.data().keys().cloned().collect())
    }

    fn clear_all(&self) -> StoreResult<()> {
        self.ensure_available()?;
        self.data().clear();
        Ok(())
    }

    fn is_available(&self) -> bool {
        self.available.load(Ordering::SeqCst)
    }
}

// ----------------------------------------------------------------------------
// File Storage Implementation
// ----------------------------------------------------------------------------

const FILE_EXTENSION: &str = "json";

/// One file per key inside a directory
#[derive(Debug, Clone)]
pub struct FileStorage {
    root: PathBuf,
}

impl FileStorage {
    /// Open (and create if missing) a storage directory
    pub fn open(root: impl Into<PathBuf>) -> StoreResult<Self> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.root
            .join(format!("{}.{}", encode_key(key), FILE_EXTENSION))
    }
}

impl KeyValueStore for FileStorage {
    fn store(&self, key: &str, data: Vec<u8>) -> StoreResult<()> {
        let path = self.path_for(key);
        let staging = path.with_extension("tmp");
        fs::write(&staging, data)?;
        fs::rename(&staging, &path)?;
        Ok(())
    }

    fn retrieve(&self, key: &str) -> StoreResult<Option<Vec<u8>>> {
        match fs::read(self.path_for(key)) {
            Ok(data) => Ok(Some(data)),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    fn delete(&self, key: &str) -> StoreResult<()> {
        match fs::remove_file(self.path_for(key)) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }

    fn list_keys(&self) -> StoreResult<Vec<String>> {
        let mut keys = Vec::new();
        for entry in fs::read_dir(&self.root)? {
            let path = entry?.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some(FILE_EXTENSION) {
                continue;
            }
            if let Some(key) = path
                .file_stem()
                .and_then(|stem| stem.to_str())
                .and_then(decode_key)
            {
                keys.push(key);
            }
        }
        keys.sort();
        Ok(keys)
    }

    fn clear_all(&self) -> StoreResult<()> {
        for key in self.list_keys()? {
            self.delete(&key)?;
        }
        Ok(())
    }

    fn is_available(&self) -> bool {
        self.root.is_dir()
    }
}

/// Percent-encode everything outside `[A-Za-z0-9_-]` so any key maps to a
/// single file name
fn encode_key(key: &str) -> String {
    let mut encoded = String::with_capacity(key.len());
    for byte in key.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'_' | b'-' => encoded.push(byte as char),
            other => encoded.push_str(&format!("%{:02X}", other)),
        }
    }
    encoded
}

fn decode_key(encoded: &str) -> Option<String> {
    let bytes = encoded.as_bytes();
    let mut decoded = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            let hex = encoded.get(i + 1..i + 3)?;
            decoded.push(u8::from_str_radix(hex, 16).ok()?);
            i += 3;
        } else {
            decoded.push(bytes[i]);
            i += 1;
        }
    }
    String::from_utf8(decoded).ok()
}
