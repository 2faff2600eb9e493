//! Keypair and self-signed certificate generation

use crate::{now_ms, params, IdentityError, IdentityResult};
use rsa::pkcs1v15::{Signature, SigningKey};
use rsa::pkcs8::EncodePrivateKey;
use rsa::RsaPrivateKey;
use sha2::{Digest, Sha256, Sha512};
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use x509_cert::builder::{Builder, CertificateBuilder, Profile};
use x509_cert::der::asn1::OctetString;
use x509_cert::der::Encode;
use x509_cert::ext::pkix::{KeyUsage, KeyUsages, SubjectKeyIdentifier};
use x509_cert::name::Name;
use x509_cert::serial_number::SerialNumber;
use x509_cert::spki::SubjectPublicKeyInfoOwned;
use x509_cert::time::Validity;
use x509_cert::Certificate;

/// Serial of the most recently generated certificate in this process
static LAST_SERIAL: AtomicU64 = AtomicU64::new(0);

/// Private key plus the certificate for its public half.
///
/// Both halves are created, persisted and replaced together. A value of this
/// type always satisfies the invariant that the certificate's public key is
/// the private key's public component.
#[derive(Debug, Clone)]
pub struct DeviceIdentity {
    private_key: RsaPrivateKey,
    certificate: Certificate,
}

impl DeviceIdentity {
    /// Generate a fresh keypair and self-signed certificate
    pub fn generate() -> IdentityResult<Self> {
        let mut rng = rand::thread_rng();
        let private_key = RsaPrivateKey::new(&mut rng, params::KEY_BITS)
            .map_err(|e| IdentityError::Generation(e.to_string()))?;
        let certificate = self_sign(&private_key, next_serial())?;

        Ok(Self {
            private_key,
            certificate,
        })
    }

    /// Pair an existing key and certificate, rejecting mismatched halves
    pub fn from_parts(private_key: RsaPrivateKey, certificate: Certificate) -> IdentityResult<Self> {
        if !public_key_matches(&private_key, &certificate) {
            return Err(IdentityError::Mismatch);
        }
        Ok(Self {
            private_key,
            certificate,
        })
    }

    pub fn private_key(&self) -> &RsaPrivateKey {
        &self.private_key
    }

    pub fn certificate(&self) -> &Certificate {
        &self.certificate
    }

    pub fn serial_number(&self) -> &SerialNumber {
        &self.certificate.tbs_certificate.serial_number
    }

    /// Check that the certificate carries this key's public component
    pub fn public_key_matches(&self) -> bool {
        public_key_matches(&self.private_key, &self.certificate)
    }

    /// PKCS#8 DER encoding of the private key
    pub fn private_key_der(&self) -> IdentityResult<Vec<u8>> {
        let document = self
            .private_key
            .to_pkcs8_der()
            .map_err(|e| IdentityError::Encoding(e.to_string()))?;
        Ok(document.as_bytes().to_vec())
    }

    /// X.509 DER encoding of the certificate
    pub fn certificate_der(&self) -> IdentityResult<Vec<u8>> {
        self.certificate
            .to_der()
            .map_err(|e| IdentityError::Encoding(e.to_string()))
    }
}

/// Compare the certificate's SubjectPublicKeyInfo with the key's public half
pub fn public_key_matches(private_key: &RsaPrivateKey, certificate: &Certificate) -> bool {
    match SubjectPublicKeyInfoOwned::from_key(private_key.to_public_key()) {
        Ok(spki) => spki == certificate.tbs_certificate.subject_public_key_info,
        Err(_) => false,
    }
}

/// Timestamp-derived serial, bumped when two generations share a millisecond
fn next_serial() -> u64 {
    let now = now_ms();
    let previous = LAST_SERIAL
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |last| {
            Some(now.max(last + 1))
        })
        .unwrap_or_else(|last| last);
    now.max(previous + 1)
}

fn self_sign(private_key: &RsaPrivateKey, serial: u64) -> IdentityResult<Certificate> {
    let generation = |e: &dyn std::fmt::Display| IdentityError::Generation(e.to_string());

    let subject = Name::from_str(params::SUBJECT).map_err(|e| generation(&e))?;
    let validity = Validity::from_now(Duration::from_secs(params::VALIDITY_DAYS * 24 * 3600))
        .map_err(|e| generation(&e))?;
    let spki = SubjectPublicKeyInfoOwned::from_key(private_key.to_public_key())
        .map_err(|e| generation(&e))?;

    // Leftmost 160 bits of a SHA-256 over the key bits (RFC 7093, method 1)
    let digest = Sha256::digest(spki.subject_public_key.raw_bytes());
    let key_identifier =
        SubjectKeyIdentifier(OctetString::new(&digest[..20]).map_err(|e| generation(&e))?);

    let signer = SigningKey::<Sha512>::new(private_key.clone());
    let mut builder = CertificateBuilder::new(
        Profile::Manual { issuer: None },
        SerialNumber::from(serial),
        validity,
        subject,
        spki,
        &signer,
    )
    .map_err(|e| generation(&e))?;

    builder
        .add_extension(&KeyUsage(
            KeyUsages::DigitalSignature | KeyUsages::KeyEncipherment,
        ))
        .map_err(|e| generation(&e))?;
    builder
        .add_extension(&key_identifier)
        .map_err(|e| generation(&e))?;

    builder.build::<Signature>().map_err(|e| generation(&e))
}
