//! ADB device identity
//!
//! This crate owns the authentication material a controller presents to an
//! Android device over wireless debugging: a 2048-bit RSA keypair and a
//! self-signed X.509 certificate for its public half. The pair is generated
//! once, persisted as two base64 artifacts and reused on every later start.

pub mod artifact;
pub mod certificate;
mod store;

pub use certificate::DeviceIdentity;
pub use rsa::RsaPrivateKey;
pub use store::IdentityStore;
pub use x509_cert::Certificate;

use std::time::{SystemTime, UNIX_EPOCH};
use thiserror::Error;

/// Errors raised while creating or storing the identity
#[derive(Error, Debug)]
pub enum IdentityError {
    #[error("Key generation failed: {0}")]
    Generation(String),

    #[error("Encoding failed: {0}")]
    Encoding(String),

    #[error("Certificate does not match the private key")]
    Mismatch,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type IdentityResult<T> = Result<T, IdentityError>;

/// Parameters of the generated identity
pub mod params {
    /// RSA modulus size
    pub const KEY_BITS: usize = 2048;

    /// Issuer and subject of the self-signed certificate.
    ///
    /// RFC 4514 strings list the most specific RDN first, so this encodes
    /// as CN=AdbService, O=AdbApp, C=CN in DER order.
    pub const SUBJECT: &str = "C=CN,O=AdbApp,CN=AdbService";

    /// Certificate lifetime from the moment of generation
    pub const VALIDITY_DAYS: u64 = 365;

    /// Base64 PKCS#8 DER private key
    pub const PRIVATE_KEY_FILE: &str = "adb_private.key";

    /// Base64 X.509 DER certificate
    pub const CERTIFICATE_FILE: &str = "adb_cert.pem";

    /// Line width of the base64 artifacts
    pub const BASE64_LINE_WIDTH: usize = 76;
}

/// Get current timestamp in milliseconds since Unix epoch
pub fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}
