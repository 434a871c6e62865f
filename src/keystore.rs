use crate::{
    cert::ParsedCertificate,
    error::{AppResult, ErrorReason},
};
use p12_keystore::{KeyStore as Pkcs12Store, KeyStoreEntry};
use std::collections::HashMap;

/// Unordered mapping from store-unique alias to certificate. Alias
/// uniqueness is enforced by the map itself; inserting an existing alias
/// replaces the previous entry (last-write-wins).
#[derive(Clone, Debug, Default)]
pub struct Keystore {
    entries: HashMap<String, ParsedCertificate>,
}

/// Read-only capture of the target store's contents at operation start.
/// It is never refreshed mid-run; staleness is an accepted risk.
pub type StoreSnapshot = Keystore;

impl Keystore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, alias: String, cert: ParsedCertificate) -> Option<ParsedCertificate> {
        self.entries.insert(alias, cert)
    }

    pub fn remove(&mut self, alias: &str) -> Option<ParsedCertificate> {
        self.entries.remove(alias)
    }

    pub fn get(&self, alias: &str) -> Option<&ParsedCertificate> {
        self.entries.get(alias)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Stable, sorted list of aliases. Reconciliation iterates over this
    /// so deletions during a pass cannot affect the traversal.
    pub fn aliases(&self) -> Vec<String> {
        let mut aliases: Vec<String> = self.entries.keys().cloned().collect();
        aliases.sort();
        aliases
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &ParsedCertificate)> {
        self.entries.iter()
    }

    /// Alias of an entry whose certificate bytes are identical to the
    /// given one, regardless of its own alias.
    pub fn find_alias_of(&self, cert: &ParsedCertificate) -> Option<&str> {
        self.entries
            .iter()
            .find(|(_, existing)| *existing == cert)
            .map(|(alias, _)| alias.as_str())
    }

    /// Merge `other` into this keystore. Entries from `other` win on
    /// alias conflicts.
    pub fn merge(&mut self, other: Keystore) {
        for (alias, cert) in other.entries {
            if self.entries.insert(alias.clone(), cert).is_some() {
                debug!("alias '{alias}' redefined by a later input, keeping the later one");
            }
        }
    }

    pub fn retain_cas(&mut self) {
        self.entries.retain(|alias, cert| {
            let keep = cert.is_ca();
            if !keep {
                info!("skipping non-CA certificate at alias '{alias}'");
            }
            keep
        });
    }

    /// Serialize to the PKCS#12 transfer format expected by the store
    /// backend.
    pub fn to_pkcs12(&self, password: &str) -> AppResult<Vec<u8>> {
        let mut store = Pkcs12Store::new();
        for (alias, cert) in &self.entries {
            let cert = p12_keystore::Certificate::from_der(cert.der())
                .map_err(|e| ErrorReason::Load(format!("cannot encode '{alias}': {e}")))?;
            store.add_entry(alias, KeyStoreEntry::Certificate(cert));
        }
        store
            .writer(password)
            .write()
            .map_err(|e| ErrorReason::Load(format!("cannot serialize keystore: {e}")).into())
    }

    /// Build a keystore from PKCS#12 bytes, keeping trusted certificate
    /// entries and the end-entity certificate of any key chains.
    pub fn from_pkcs12(data: &[u8], password: &str) -> AppResult<Self> {
        let store = Pkcs12Store::from_pkcs12(data, password)
            .map_err(|e| ErrorReason::Load(format!("cannot read PKCS#12 keystore: {e}")))?;
        let mut keystore = Self::new();
        for (alias, entry) in store.entries() {
            match entry {
                KeyStoreEntry::Certificate(cert) => {
                    let parsed = ParsedCertificate::from_der(cert.as_der().to_vec())?;
                    keystore.insert(alias.clone(), parsed);
                }
                KeyStoreEntry::PrivateKeyChain(chain) => {
                    if let Some(cert) = chain.chain().first() {
                        let parsed = ParsedCertificate::from_der(cert.as_der().to_vec())?;
                        keystore.insert(alias.clone(), parsed);
                    }
                }
                KeyStoreEntry::Secret(_) => {
                    // Secrets are not trust material; skipped like JKS
                    // private-key entries.
                    debug!("skipping secret entry at alias '{alias}'");
                }
            }
        }
        Ok(keystore)
    }
}
