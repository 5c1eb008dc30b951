//! The persisted collection of user-trusted certificates.
//!
//! ## Durable format
//!
//! ```text
//! storage[key] = base64( cbor( { version: 1, entries: [ { fingerprint, der, trusted_at } ] } ) )
//! ```
//!
//! Every entry was approved by a human. The store is loaded once, mutated by
//! explicit calls, and written back in full after every mutation.

use base64::Engine;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::certificate::Certificate;
use crate::error::{Result, TrustError};
use crate::fingerprint::Fingerprint;
use crate::storage::KeyValueStore;

/// Storage key holding the serialized store.
pub const DEFAULT_STORAGE_KEY: &str = "TRUSTED_CERTIFICATES";

/// Current bag layout version.
const BAG_VERSION: u32 = 1;

/// A trusted certificate and when it was approved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrustedEntry {
    pub certificate: Certificate,
    pub trusted_at: DateTime<Utc>,
}

#[derive(Serialize, Deserialize)]
struct CertificateBag {
    version: u32,
    entries: Vec<BagEntry>,
}

#[derive(Serialize, Deserialize)]
struct BagEntry {
    fingerprint: Fingerprint,
    der: Vec<u8>,
    trusted_at: DateTime<Utc>,
}

/// Durable mapping from fingerprint to user-trusted certificate.
#[derive(Debug)]
pub struct CertificateStore {
    storage: Arc<dyn KeyValueStore>,
    key: String,
    entries: BTreeMap<Fingerprint, TrustedEntry>,
}

impl CertificateStore {
    /// Load the store from durable storage.
    ///
    /// A missing key gives an empty store. Bytes that cannot be decoded fail
    /// with `StoreCorrupt`; prior trust decisions are never silently dropped.
    pub fn load(storage: Arc<dyn KeyValueStore>, key: impl Into<String>) -> Result<Self> {
        let key = key.into();
        let entries = match storage.get(&key)? {
            Some(blob) => {
                let entries = Self::deserialize(&blob)?;
                info!(key = %key, count = entries.len(), "imported trusted certificates");
                entries
            }
            None => {
                debug!(key = %key, "no custom trusted certificates to load");
                Vec::new()
            }
        };

        Ok(Self {
            storage,
            key,
            entries: entries
                .into_iter()
                .map(|entry| (entry.certificate.fingerprint().clone(), entry))
                .collect(),
        })
    }

    /// Empty store that has not touched storage yet.
    pub fn empty(storage: Arc<dyn KeyValueStore>, key: impl Into<String>) -> Self {
        Self {
            storage,
            key: key.into(),
            entries: BTreeMap::new(),
        }
    }

    /// Trust a certificate and persist the store.
    ///
    /// Re-adding a known certificate overwrites its entry. On persistence
    /// failure the in-memory contents are restored.
    pub fn add(&mut self, certificate: Certificate) -> Result<Fingerprint> {
        let fingerprint = certificate.fingerprint().clone();
        let entry = TrustedEntry {
            certificate,
            trusted_at: Utc::now(),
        };
        let previous = self.entries.insert(fingerprint.clone(), entry);

        if let Err(e) = self.persist() {
            match previous {
                Some(previous) => {
                    self.entries.insert(fingerprint, previous);
                }
                None => {
                    self.entries.remove(&fingerprint);
                }
            }
            return Err(e);
        }

        info!(
            fingerprint = %fingerprint.short(),
            total = self.entries.len(),
            "certificate trusted"
        );
        Ok(fingerprint)
    }

    /// Forget a certificate. Returns whether it was present.
    pub fn remove(&mut self, fingerprint: &Fingerprint) -> Result<bool> {
        let Some(previous) = self.entries.remove(fingerprint) else {
            return Ok(false);
        };

        if let Err(e) = self.persist() {
            self.entries.insert(fingerprint.clone(), previous);
            return Err(e);
        }

        info!(fingerprint = %fingerprint.short(), "certificate no longer trusted");
        Ok(true)
    }

    /// Forget every certificate and delete the stored blob.
    pub fn clear(&mut self) -> Result<()> {
        self.storage
            .remove(&self.key)
            .map_err(|e| TrustError::Persistence(e.to_string()))?;
        let dropped = self.entries.len();
        self.entries.clear();
        warn!(dropped, "cleared all trusted certificates");
        Ok(())
    }

    /// Every trusted certificate.
    #[must_use]
    pub fn all(&self) -> Vec<Certificate> {
        self.entries
            .values()
            .map(|entry| entry.certificate.clone())
            .collect()
    }

    /// Every entry with its approval time.
    pub fn entries(&self) -> impl Iterator<Item = &TrustedEntry> {
        self.entries.values()
    }

    #[must_use]
    pub fn get(&self, fingerprint: &Fingerprint) -> Option<&TrustedEntry> {
        self.entries.get(fingerprint)
    }

    #[must_use]
    pub fn contains(&self, fingerprint: &Fingerprint) -> bool {
        self.entries.contains_key(fingerprint)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Storage key this store persists under.
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Encode the whole store as printable text.
    pub fn serialize(&self) -> Result<String> {
        let bag = CertificateBag {
            version: BAG_VERSION,
            entries: self
                .entries
                .iter()
                .map(|(fingerprint, entry)| BagEntry {
                    fingerprint: fingerprint.clone(),
                    der: entry.certificate.der().to_vec(),
                    trusted_at: entry.trusted_at,
                })
                .collect(),
        };

        let mut cbor_bytes = Vec::new();
        ciborium::into_writer(&bag, &mut cbor_bytes)
            .map_err(|e| TrustError::Persistence(format!("cbor encode failed: {e}")))?;

        Ok(base64::engine::general_purpose::STANDARD.encode(&cbor_bytes))
    }

    /// Decode text produced by [`serialize`](Self::serialize).
    ///
    /// Whitespace is ignored, so line-wrapped base64 decodes too.
    pub fn deserialize(blob: &str) -> Result<Vec<TrustedEntry>> {
        let compact: String = blob.split_ascii_whitespace().collect();
        let bytes = base64::engine::general_purpose::STANDARD
            .decode(compact)
            .map_err(|e| TrustError::StoreCorrupt(format!("base64 decode failed: {e}")))?;

        let bag: CertificateBag = ciborium::from_reader(&bytes[..])
            .map_err(|e| TrustError::StoreCorrupt(format!("cbor decode failed: {e}")))?;

        if bag.version != BAG_VERSION {
            return Err(TrustError::StoreCorrupt(format!(
                "unsupported bag version {}",
                bag.version
            )));
        }

        bag.entries
            .into_iter()
            .map(|entry| {
                let certificate = Certificate::from_der(entry.der)
                    .map_err(|e| TrustError::StoreCorrupt(e.to_string()))?;
                if certificate.fingerprint() != &entry.fingerprint {
                    return Err(TrustError::StoreCorrupt(format!(
                        "fingerprint mismatch for entry {}",
                        entry.fingerprint.short()
                    )));
                }
                Ok(TrustedEntry {
                    certificate,
                    trusted_at: entry.trusted_at,
                })
            })
            .collect()
    }

    fn persist(&self) -> Result<()> {
        let blob = self.serialize()?;
        self.storage
            .put(&self.key, &blob)
            .map_err(|e| TrustError::Persistence(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::certificate::testutil::{dns, self_signed};
    use crate::storage::MemoryKeyValueStore;
    use std::collections::HashSet;

    #[derive(Debug, Default)]
    struct ReadOnlyStorage {
        inner: MemoryKeyValueStore,
    }

    impl KeyValueStore for ReadOnlyStorage {
        fn get(&self, key: &str) -> Result<Option<String>> {
            self.inner.get(key)
        }

        fn put(&self, _key: &str, _value: &str) -> Result<()> {
            Err(std::io::Error::new(std::io::ErrorKind::PermissionDenied, "read-only").into())
        }

        fn remove(&self, _key: &str) -> Result<()> {
            Err(std::io::Error::new(std::io::ErrorKind::PermissionDenied, "read-only").into())
        }
    }

    fn memory() -> Arc<dyn KeyValueStore> {
        Arc::new(MemoryKeyValueStore::new())
    }

    #[test]
    fn missing_key_loads_empty() {
        let store = CertificateStore::load(memory(), DEFAULT_STORAGE_KEY).unwrap();
        assert!(store.is_empty());
        assert!(store.all().is_empty());
    }

    #[test]
    fn load_after_adds_yields_same_set() {
        let storage = memory();
        let mut store = CertificateStore::load(storage.clone(), DEFAULT_STORAGE_KEY).unwrap();
        let a = self_signed("a.local", vec![dns("a.local")]);
        let b = self_signed("b.local", vec![dns("b.local")]);
        store.add(a.clone()).unwrap();
        store.add(b.clone()).unwrap();

        let reloaded = CertificateStore::load(storage, DEFAULT_STORAGE_KEY).unwrap();
        let original: HashSet<_> = store.all().into_iter().collect();
        let restored: HashSet<_> = reloaded.all().into_iter().collect();
        assert_eq!(original, restored);
        assert_eq!(restored, HashSet::from([a, b]));
    }

    #[test]
    fn zero_adds_serializes_to_empty_bag() {
        let store = CertificateStore::empty(memory(), DEFAULT_STORAGE_KEY);
        let blob = store.serialize().unwrap();
        assert!(CertificateStore::deserialize(&blob).unwrap().is_empty());
    }

    #[test]
    fn adding_twice_overwrites() {
        let mut store = CertificateStore::empty(memory(), DEFAULT_STORAGE_KEY);
        let cert = self_signed("dup.local", Vec::new());
        let first = store.add(cert.clone()).unwrap();
        let second = store.add(cert).unwrap();
        assert_eq!(first, second);
        assert_eq!(store.len(), 1);
        assert_eq!(store.all().len(), 1);
    }

    #[test]
    fn add_writes_through_immediately() {
        let storage = memory();
        let mut store = CertificateStore::empty(storage.clone(), "custom-key");
        store.add(self_signed("w.local", Vec::new())).unwrap();
        let blob = storage.get("custom-key").unwrap().unwrap();
        assert_eq!(CertificateStore::deserialize(&blob).unwrap().len(), 1);
    }

    #[test]
    fn wrapped_base64_still_decodes() {
        let mut store = CertificateStore::empty(memory(), DEFAULT_STORAGE_KEY);
        store.add(self_signed("wrap.local", Vec::new())).unwrap();
        let blob = store.serialize().unwrap();

        let wrapped: String = blob
            .as_bytes()
            .chunks(76)
            .map(|line| format!("{}\n", String::from_utf8_lossy(line)))
            .collect();
        assert_eq!(CertificateStore::deserialize(&wrapped).unwrap().len(), 1);
    }

    #[test]
    fn garbage_is_corrupt_not_empty() {
        let storage = memory();
        storage.put(DEFAULT_STORAGE_KEY, "!!! not base64 !!!").unwrap();
        let err = CertificateStore::load(storage.clone(), DEFAULT_STORAGE_KEY).unwrap_err();
        assert!(matches!(err, TrustError::StoreCorrupt(_)));

        // valid base64, invalid cbor
        storage.put(DEFAULT_STORAGE_KEY, "aGVsbG8gd29ybGQ=").unwrap();
        let err = CertificateStore::load(storage, DEFAULT_STORAGE_KEY).unwrap_err();
        assert!(matches!(err, TrustError::StoreCorrupt(_)));
    }

    #[test]
    fn failed_persist_rolls_back() {
        let storage: Arc<dyn KeyValueStore> = Arc::new(ReadOnlyStorage::default());
        let mut store = CertificateStore::empty(storage, DEFAULT_STORAGE_KEY);
        let err = store.add(self_signed("ro.local", Vec::new())).unwrap_err();
        assert!(matches!(err, TrustError::Persistence(_)));
        assert!(store.is_empty());
    }

    #[test]
    fn remove_and_clear() {
        let storage = memory();
        let mut store = CertificateStore::empty(storage.clone(), DEFAULT_STORAGE_KEY);
        let a = store.add(self_signed("a.local", Vec::new())).unwrap();
        store.add(self_signed("b.local", Vec::new())).unwrap();

        assert!(store.remove(&a).unwrap());
        assert!(!store.remove(&a).unwrap());
        assert!(!store.contains(&a));
        assert_eq!(
            CertificateStore::load(storage.clone(), DEFAULT_STORAGE_KEY)
                .unwrap()
                .len(),
            1
        );

        store.clear().unwrap();
        assert!(store.is_empty());
        assert_eq!(storage.get(DEFAULT_STORAGE_KEY).unwrap(), None);
    }
}
