//! Identity persistence and lazy initialisation

use crate::{artifact, params, DeviceIdentity, IdentityResult};
use rsa::pkcs8::DecodePrivateKey;
use rsa::RsaPrivateKey;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{debug, info, warn};
use x509_cert::der::Decode;
use x509_cert::Certificate;

/// Owns the identity artifacts in one application-private directory and
/// caches the loaded identity for the lifetime of the store.
pub struct IdentityStore {
    dir: PathBuf,
    cached: Mutex<Option<Arc<DeviceIdentity>>>,
}

impl IdentityStore {
    /// Create a store for `dir`. Nothing is read until the identity is needed.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            cached: Mutex::new(None),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn private_key_path(&self) -> PathBuf {
        self.dir.join(params::PRIVATE_KEY_FILE)
    }

    pub fn certificate_path(&self) -> PathBuf {
        self.dir.join(params::CERTIFICATE_FILE)
    }

    /// Whether an identity is cached in memory
    pub fn is_loaded(&self) -> bool {
        self.cached
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    /// Read both artifacts from disk.
    ///
    /// Returns `None` when either file is missing, unreadable, fails to parse,
    /// or when the certificate does not belong to the key. Never errors.
    pub fn load(&self) -> Option<DeviceIdentity> {
        let private_key = self.read_private_key()?;
        let certificate = self.read_certificate()?;

        match DeviceIdentity::from_parts(private_key, certificate) {
            Ok(identity) => Some(identity),
            Err(e) => {
                warn!("Ignoring stored identity in {}: {}", self.dir.display(), e);
                None
            }
        }
    }

    /// Write both artifacts, replacing whatever was there
    pub fn persist(&self, identity: &DeviceIdentity) -> IdentityResult<()> {
        artifact::write(&self.private_key_path(), &identity.private_key_der()?)?;
        artifact::write(&self.certificate_path(), &identity.certificate_der()?)?;
        debug!("Identity persisted to {}", self.dir.display());
        Ok(())
    }

    /// Startup path: reuse the stored identity, or generate and persist a new one
    pub fn load_or_init(&self) -> IdentityResult<Arc<DeviceIdentity>> {
        self.initialise(true)
    }

    /// The cached identity, initialised on demand.
    ///
    /// An empty cache is filled from disk or, failing that, by generating a
    /// new pair. Persisting a freshly generated pair is best effort here; a
    /// generation failure is returned and leaves the caller without
    /// authentication material.
    pub fn identity(&self) -> IdentityResult<Arc<DeviceIdentity>> {
        self.initialise(false)
    }

    fn initialise(&self, require_persist: bool) -> IdentityResult<Arc<DeviceIdentity>> {
        let mut cached = self.cached.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(identity) = cached.as_ref() {
            return Ok(identity.clone());
        }

        let identity = match self.load() {
            Some(identity) => {
                info!("Loaded device identity from {}", self.dir.display());
                identity
            }
            None => {
                info!("No usable identity in {}, generating", self.dir.display());
                let identity = DeviceIdentity::generate()?;
                match self.persist(&identity) {
                    Ok(()) => {}
                    Err(e) if require_persist => return Err(e),
                    Err(e) => warn!("Generated identity could not be persisted: {}", e),
                }
                identity
            }
        };

        let identity = Arc::new(identity);
        *cached = Some(identity.clone());
        Ok(identity)
    }

    pub fn private_key(&self) -> IdentityResult<RsaPrivateKey> {
        Ok(self.identity()?.private_key().clone())
    }

    pub fn certificate(&self) -> IdentityResult<Certificate> {
        Ok(self.identity()?.certificate().clone())
    }

    fn read_private_key(&self) -> Option<RsaPrivateKey> {
        let path = self.private_key_path();
        let bytes = read_artifact(&path)?;
        let der = artifact::decode_private_key(&bytes);

        match RsaPrivateKey::from_pkcs8_der(&der) {
            Ok(key) => Some(key),
            Err(e) => {
                warn!("Failed to parse private key {}: {}", path.display(), e);
                None
            }
        }
    }

    fn read_certificate(&self) -> Option<Certificate> {
        let path = self.certificate_path();
        let bytes = read_artifact(&path)?;

        let der = match artifact::decode(&bytes) {
            Ok(der) => der,
            Err(e) => {
                warn!("Failed to decode certificate {}: {}", path.display(), e);
                return None;
            }
        };

        match Certificate::from_der(&der) {
            Ok(certificate) => Some(certificate),
            Err(e) => {
                warn!("Failed to parse certificate {}: {}", path.display(), e);
                None
            }
        }
    }
}

fn read_artifact(path: &Path) -> Option<Vec<u8>> {
    match artifact::read(path) {
        Ok(Some(bytes)) => Some(bytes),
        Ok(None) => {
            debug!("{} does not exist", path.display());
            None
        }
        Err(e) => {
            warn!("Failed to read {}: {}", path.display(), e);
            None
        }
    }
}
