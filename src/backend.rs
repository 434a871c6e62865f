use crate::{
    error::{AppResult, ErrorReason},
    keystore::{Keystore, StoreSnapshot},
};
use std::{fs, io::Write as _, path::PathBuf};

/// Password protecting the serialized keystore handed to the backend.
/// The transfer file lives in the run-scoped temp workspace and never
/// leaves the machine, so a fixed value is acceptable.
pub const TRANSFER_KEYSTORE_PASSWORD: &str = "transfer-keystore";

/// Path used when the operator selects the `system` target.
pub const SYSTEM_STORE_PATH: &str = "/etc/certimport/truststore.p12";

/// Narrow interface to the target certificate store. The reconciliation
/// core has no dependency on any particular backend; tests drive it
/// with an in-memory double.
pub trait StoreBackend {
    /// Read-only view of the certificates currently in the store.
    fn read_snapshot(&self) -> AppResult<StoreSnapshot>;

    /// Apply the final keystore, given as PKCS#12 transfer bytes. Must
    /// be atomic: a failed commit leaves the store untouched.
    fn commit(&self, transfer_keystore: &[u8], transfer_password: &str) -> AppResult<()>;
}

/// PKCS#12 file-backed trust store.
#[derive(Debug)]
pub struct Pkcs12FileStore {
    path: PathBuf,
    password: String,
}

impl Pkcs12FileStore {
    pub fn new(path: PathBuf, password: String) -> Self {
        Self { path, password }
    }
}

impl StoreBackend for Pkcs12FileStore {
    fn read_snapshot(&self) -> AppResult<StoreSnapshot> {
        if !self.path.exists() {
            debug!("store {} does not exist yet, starting empty", self.path.display());
            return Ok(Keystore::new());
        }
        let data = fs::read(&self.path).map_err(|e| {
            ErrorReason::BackendUnavailable(format!("cannot open {}: {e}", self.path.display()))
        })?;
        Keystore::from_pkcs12(&data, &self.password).map_err(|e| {
            ErrorReason::BackendUnavailable(format!(
                "cannot read {} (wrong store password?): {e}",
                self.path.display()
            ))
            .into()
        })
    }

    fn commit(&self, transfer_keystore: &[u8], transfer_password: &str) -> AppResult<()> {
        let incoming = Keystore::from_pkcs12(transfer_keystore, transfer_password)
            .map_err(|e| ErrorReason::BackendRejected(format!("bad transfer keystore: {e}")))?;

        let mut store = self
            .read_snapshot()
            .map_err(|e| ErrorReason::BackendRejected(e.to_string()))?;
        for (alias, cert) in incoming.iter() {
            store.insert(alias.clone(), cert.clone());
        }
        let serialized = store.to_pkcs12(&self.password).map_err(|e| {
            ErrorReason::BackendRejected(format!("cannot serialize the store: {e}"))
        })?;

        let parent = self
            .path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("."));
        fs::create_dir_all(&parent).map_err(|e| {
            ErrorReason::BackendRejected(format!("cannot create {}: {e}", parent.display()))
        })?;
        // Write next to the store and rename so the commit is atomic.
        let mut temp = tempfile::NamedTempFile::new_in(&parent).map_err(|e| {
            ErrorReason::BackendRejected(format!("cannot stage the commit: {e}"))
        })?;
        temp.write_all(&serialized)
            .and_then(|_| temp.flush())
            .map_err(|e| ErrorReason::BackendRejected(format!("cannot stage the commit: {e}")))?;
        temp.persist(&self.path).map_err(|e| {
            ErrorReason::BackendRejected(format!("cannot update {}: {e}", self.path.display()))
        })?;
        info!("committed {} entries to {}", store.len(), self.path.display());
        Ok(())
    }
}
