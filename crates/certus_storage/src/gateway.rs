#![forbid(unsafe_code)]

use std::collections::BTreeMap;
use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use certus_contracts::certificate::{FileRef, Fingerprint};
use certus_contracts::ContractViolation;
use sha2::{Digest, Sha256};
use tracing::warn;

const LOCAL_PREFIX: &str = "local:";
const MEMORY_PREFIX: &str = "mem:";
const STORAGE_KEY_MAX_LEN: usize = 200;

#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("invalid storage key '{0}'")]
    InvalidKey(String),
    #[error("file reference '{0}' is not served by this gateway")]
    ForeignRef(String),
    #[error("stored object already exists for key '{0}'")]
    AlreadyExists(String),
    #[error("no stored object for '{0}'")]
    NotFound(String),
    #[error("storage io failure: {0}")]
    Io(#[from] std::io::Error),
    #[error("contract violation: {0}")]
    Contract(#[from] ContractViolation),
    #[error("gateway lock poisoned")]
    LockPoisoned,
}

/// Durable byte storage behind certificate uploads and registry entries.
pub trait StorageGateway: Send + Sync {
    fn put(&self, key: &str, bytes: &[u8]) -> Result<FileRef, GatewayError>;
    fn read(&self, file_ref: &FileRef) -> Result<Vec<u8>, GatewayError>;
    fn delete(&self, file_ref: &FileRef) -> Result<(), GatewayError>;
}

/// What a successful store-and-fingerprint produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredBlob {
    pub file_ref: FileRef,
    pub fingerprint: Fingerprint,
    pub size_bytes: u64,
}

/// Lowercase hex SHA-256 of `bytes`.
pub fn fingerprint_bytes(bytes: &[u8]) -> Result<Fingerprint, GatewayError> {
    let digest = Sha256::digest(bytes);
    Ok(Fingerprint::parse(&hex::encode(digest))?)
}

/// Stores `bytes` under `key`, then fingerprints what the gateway actually
/// persisted. If the read-back fails the stored object is removed.
pub fn store_and_fingerprint(
    gateway: &dyn StorageGateway,
    key: &str,
    bytes: &[u8],
) -> Result<StoredBlob, GatewayError> {
    let file_ref = gateway.put(key, bytes)?;
    let fingerprinted = gateway
        .read(&file_ref)
        .and_then(|persisted| Ok((fingerprint_bytes(&persisted)?, persisted.len() as u64)));
    match fingerprinted {
        Ok((fingerprint, size_bytes)) => Ok(StoredBlob {
            file_ref,
            fingerprint,
            size_bytes,
        }),
        Err(err) => {
            discard(gateway, &file_ref);
            Err(err)
        }
    }
}

/// Best-effort removal of an object that will not be recorded anywhere.
pub fn discard(gateway: &dyn StorageGateway, file_ref: &FileRef) {
    if let Err(err) = gateway.delete(file_ref) {
        warn!(
            file_ref = file_ref.as_str(),
            error = %err,
            "stored object left behind"
        );
    }
}

fn validate_storage_key(key: &str) -> Result<(), GatewayError> {
    let ok = !key.is_empty()
        && key.len() <= STORAGE_KEY_MAX_LEN
        && !key.starts_with('.')
        && !key.contains("..")
        && key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'));
    if ok {
        Ok(())
    } else {
        Err(GatewayError::InvalidKey(key.to_string()))
    }
}

fn key_from_ref<'a>(file_ref: &'a FileRef, prefix: &str) -> Result<&'a str, GatewayError> {
    let key = file_ref
        .as_str()
        .strip_prefix(prefix)
        .ok_or_else(|| GatewayError::ForeignRef(file_ref.as_str().to_string()))?;
    validate_storage_key(key)?;
    Ok(key)
}

/// Files under a single root directory. Writes land in a `.partial` file
/// first and are renamed into place once synced.
#[derive(Debug, Clone)]
pub struct LocalDiskGateway {
    root: PathBuf,
}

impl LocalDiskGateway {
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, GatewayError> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.root.join(key)
    }
}

impl StorageGateway for LocalDiskGateway {
    fn put(&self, key: &str, bytes: &[u8]) -> Result<FileRef, GatewayError> {
        validate_storage_key(key)?;
        let final_path = self.path_for(key);
        if final_path.exists() {
            return Err(GatewayError::AlreadyExists(key.to_string()));
        }
        let partial_path = self.root.join(format!("{key}.partial"));
        let write_result = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&partial_path)
            .and_then(|mut file| {
                file.write_all(bytes)?;
                file.sync_data()
            });
        if let Err(err) = write_result {
            let _ = fs::remove_file(&partial_path);
            if err.kind() == ErrorKind::AlreadyExists {
                return Err(GatewayError::AlreadyExists(key.to_string()));
            }
            return Err(err.into());
        }
        if let Err(err) = fs::rename(&partial_path, &final_path) {
            let _ = fs::remove_file(&partial_path);
            return Err(err.into());
        }
        Ok(FileRef::new(format!("{LOCAL_PREFIX}{key}"))?)
    }

    fn read(&self, file_ref: &FileRef) -> Result<Vec<u8>, GatewayError> {
        let key = key_from_ref(file_ref, LOCAL_PREFIX)?;
        fs::read(self.path_for(key)).map_err(|err| match err.kind() {
            ErrorKind::NotFound => GatewayError::NotFound(file_ref.as_str().to_string()),
            _ => err.into(),
        })
    }

    fn delete(&self, file_ref: &FileRef) -> Result<(), GatewayError> {
        let key = key_from_ref(file_ref, LOCAL_PREFIX)?;
        fs::remove_file(self.path_for(key)).map_err(|err| match err.kind() {
            ErrorKind::NotFound => GatewayError::NotFound(file_ref.as_str().to_string()),
            _ => err.into(),
        })
    }
}

#[derive(Debug, Default)]
pub struct InMemoryGateway {
    blobs: Mutex<BTreeMap<String, Vec<u8>>>,
}

impl InMemoryGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn object_count(&self) -> usize {
        self.blobs.lock().map(|b| b.len()).unwrap_or(0)
    }
}

impl StorageGateway for InMemoryGateway {
    fn put(&self, key: &str, bytes: &[u8]) -> Result<FileRef, GatewayError> {
        validate_storage_key(key)?;
        let mut blobs = self.blobs.lock().map_err(|_| GatewayError::LockPoisoned)?;
        if blobs.contains_key(key) {
            return Err(GatewayError::AlreadyExists(key.to_string()));
        }
        blobs.insert(key.to_string(), bytes.to_vec());
        Ok(FileRef::new(format!("{MEMORY_PREFIX}{key}"))?)
    }

    fn read(&self, file_ref: &FileRef) -> Result<Vec<u8>, GatewayError> {
        let key = key_from_ref(file_ref, MEMORY_PREFIX)?;
        let blobs = self.blobs.lock().map_err(|_| GatewayError::LockPoisoned)?;
        blobs
            .get(key)
            .cloned()
            .ok_or_else(|| GatewayError::NotFound(file_ref.as_str().to_string()))
    }

    fn delete(&self, file_ref: &FileRef) -> Result<(), GatewayError> {
        let key = key_from_ref(file_ref, MEMORY_PREFIX)?;
        let mut blobs = self.blobs.lock().map_err(|_| GatewayError::LockPoisoned)?;
        blobs
            .remove(key)
            .map(|_| ())
            .ok_or_else(|| GatewayError::NotFound(file_ref.as_str().to_string()))
    }
}
