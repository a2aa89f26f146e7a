//! Keystore entries and their plaintext encoding.
//!
//! One entry becomes the plaintext of one chunk:
//!
//! ```text
//! [name_len: 4B BE][name: UTF-8][type: 1B][payload_len: 4B BE][payload]
//! ```
//!
//! The payload shape depends on the type:
//! - `Public`: DER-encoded certificate bytes.
//! - `Private`: PKCS#8 DER private key bytes.
//! - `Secret`: `[alg_len: 4B BE][algorithm: UTF-8][raw key bytes]`.

use std::fmt;

use zeroize::Zeroizing;

use crate::errors::{KeystoreError, Result};

/// Which kind of material an entry holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntryType {
    /// A public certificate.
    Public,
    /// A private key.
    Private,
    /// A symmetric secret key.
    Secret,
}

impl EntryType {
    /// The on-disk type byte.
    pub fn tag(self) -> u8 {
        match self {
            Self::Public => 0x01,
            Self::Private => 0x02,
            Self::Secret => 0x03,
        }
    }

    /// Parse an on-disk type byte.
    pub fn from_tag(tag: u8) -> Result<Self> {
        match tag {
            0x01 => Ok(Self::Public),
            0x02 => Ok(Self::Private),
            0x03 => Ok(Self::Secret),
            other => Err(KeystoreError::InvalidFormat(format!(
                "unknown entry type byte 0x{other:02x}"
            ))),
        }
    }
}

impl fmt::Display for EntryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Public => "certificate",
            Self::Private => "private key",
            Self::Secret => "secret key",
        })
    }
}

/// A DER-encoded certificate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Certificate {
    der: Vec<u8>,
}

impl Certificate {
    pub fn from_der(der: impl Into<Vec<u8>>) -> Self {
        Self { der: der.into() }
    }

    pub fn as_der(&self) -> &[u8] {
        &self.der
    }
}

/// A PKCS#8 DER private key.  Zeroed on drop.
#[derive(Clone, PartialEq, Eq)]
pub struct PrivateKey {
    der: Zeroizing<Vec<u8>>,
}

impl PrivateKey {
    pub fn from_pkcs8_der(der: impl Into<Vec<u8>>) -> Self {
        Self {
            der: Zeroizing::new(der.into()),
        }
    }

    pub fn as_der(&self) -> &[u8] {
        &self.der
    }
}

impl fmt::Debug for PrivateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PrivateKey")
            .field("len", &self.der.len())
            .finish_non_exhaustive()
    }
}

/// A raw symmetric key tagged with its algorithm name.  Zeroed on drop.
#[derive(Clone, PartialEq, Eq)]
pub struct SecretKey {
    algorithm: String,
    key: Zeroizing<Vec<u8>>,
}

impl SecretKey {
    pub fn new(algorithm: impl Into<String>, key: impl Into<Vec<u8>>) -> Self {
        Self {
            algorithm: algorithm.into(),
            key: Zeroizing::new(key.into()),
        }
    }

    pub fn algorithm(&self) -> &str {
        &self.algorithm
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.key
    }
}

impl fmt::Debug for SecretKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecretKey")
            .field("algorithm", &self.algorithm)
            .field("len", &self.key.len())
            .finish_non_exhaustive()
    }
}

/// Type-shaped content of an entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntryPayload {
    Certificate(Certificate),
    PrivateKey(PrivateKey),
    SecretKey(SecretKey),
}

impl EntryPayload {
    pub fn entry_type(&self) -> EntryType {
        match self {
            Self::Certificate(_) => EntryType::Public,
            Self::PrivateKey(_) => EntryType::Private,
            Self::SecretKey(_) => EntryType::Secret,
        }
    }

    fn encode(&self) -> Result<Zeroizing<Vec<u8>>> {
        let mut out = Zeroizing::new(Vec::new());
        match self {
            Self::Certificate(cert) => out.extend_from_slice(cert.as_der()),
            Self::PrivateKey(key) => out.extend_from_slice(key.as_der()),
            Self::SecretKey(secret) => {
                put_len_prefixed(&mut out, secret.algorithm.as_bytes())?;
                out.extend_from_slice(secret.as_bytes());
            }
        }
        Ok(out)
    }

    fn decode(entry_type: EntryType, mut bytes: &[u8]) -> Result<Self> {
        Ok(match entry_type {
            EntryType::Public => Self::Certificate(Certificate::from_der(bytes)),
            EntryType::Private => Self::PrivateKey(PrivateKey::from_pkcs8_der(bytes)),
            EntryType::Secret => {
                let algorithm = take_len_prefixed(&mut bytes)?;
                let algorithm = std::str::from_utf8(algorithm).map_err(|_| {
                    KeystoreError::InvalidFormat("secret algorithm is not valid UTF-8".into())
                })?;
                Self::SecretKey(SecretKey::new(algorithm, bytes))
            }
        })
    }
}

/// One named record in the keystore.
///
/// Entries are immutable values; lookup identity is `(name, entry_type)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    name: String,
    payload: EntryPayload,
}

impl Entry {
    /// Build an entry, validating the name.
    pub fn new(name: impl Into<String>, payload: EntryPayload) -> Result<Self> {
        let name = name.into();
        validate_name(&name)?;
        Ok(Self { name, payload })
    }

    pub fn certificate(name: impl Into<String>, certificate: Certificate) -> Result<Self> {
        Self::new(name, EntryPayload::Certificate(certificate))
    }

    pub fn private_key(name: impl Into<String>, key: PrivateKey) -> Result<Self> {
        Self::new(name, EntryPayload::PrivateKey(key))
    }

    pub fn secret_key(name: impl Into<String>, key: SecretKey) -> Result<Self> {
        Self::new(name, EntryPayload::SecretKey(key))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn entry_type(&self) -> EntryType {
        self.payload.entry_type()
    }

    pub fn payload(&self) -> &EntryPayload {
        &self.payload
    }

    /// Whether this entry is the one identified by `(name, entry_type)`.
    pub fn matches(&self, name: &str, entry_type: EntryType) -> bool {
        self.name == name && self.entry_type() == entry_type
    }

    pub fn as_certificate(&self) -> Option<&Certificate> {
        match &self.payload {
            EntryPayload::Certificate(cert) => Some(cert),
            _ => None,
        }
    }

    pub fn as_private_key(&self) -> Option<&PrivateKey> {
        match &self.payload {
            EntryPayload::PrivateKey(key) => Some(key),
            _ => None,
        }
    }

    pub fn as_secret_key(&self) -> Option<&SecretKey> {
        match &self.payload {
            EntryPayload::SecretKey(key) => Some(key),
            _ => None,
        }
    }

    /// Serialize into chunk plaintext.
    pub fn encode(&self) -> Result<Zeroizing<Vec<u8>>> {
        let payload = self.payload.encode()?;

        let mut out = Zeroizing::new(Vec::with_capacity(
            4 + self.name.len() + 1 + 4 + payload.len(),
        ));
        put_len_prefixed(&mut out, self.name.as_bytes())?;
        out.push(self.entry_type().tag());
        put_len_prefixed(&mut out, &payload)?;
        Ok(out)
    }

    /// Parse chunk plaintext produced by `encode`.
    pub fn decode(mut bytes: &[u8]) -> Result<Self> {
        let name = take_len_prefixed(&mut bytes)?;
        let name = std::str::from_utf8(name)
            .map_err(|_| KeystoreError::InvalidFormat("entry name is not valid UTF-8".into()))?;
        validate_name(name)
            .map_err(|_| KeystoreError::InvalidFormat("entry name is empty".into()))?;

        let tag = *take(&mut bytes, 1)?
            .first()
            .ok_or_else(|| KeystoreError::InvalidFormat("missing entry type byte".into()))?;
        let entry_type = EntryType::from_tag(tag)?;

        let payload = take_len_prefixed(&mut bytes)?;
        if !bytes.is_empty() {
            return Err(KeystoreError::InvalidFormat(format!(
                "{} trailing bytes after entry payload",
                bytes.len()
            )));
        }

        Ok(Self {
            name: name.to_string(),
            payload: EntryPayload::decode(entry_type, payload)?,
        })
    }
}

/// Find the entry identified by `(name, entry_type)`.
pub fn find<'a>(entries: &'a [Entry], name: &str, entry_type: EntryType) -> Option<&'a Entry> {
    entries.iter().find(|e| e.matches(name, entry_type))
}

fn validate_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(KeystoreError::IllegalUsage(
            "entry name cannot be empty".into(),
        ));
    }
    Ok(())
}

fn put_len_prefixed(out: &mut Vec<u8>, bytes: &[u8]) -> Result<()> {
    let len = u32::try_from(bytes.len()).map_err(|_| {
        KeystoreError::IllegalUsage(format!("field of {} bytes exceeds u32::MAX", bytes.len()))
    })?;
    out.extend_from_slice(&len.to_be_bytes());
    out.extend_from_slice(bytes);
    Ok(())
}

fn take<'a>(bytes: &mut &'a [u8], n: usize) -> Result<&'a [u8]> {
    if bytes.len() < n {
        return Err(KeystoreError::InvalidFormat(format!(
            "field needs {n} bytes but only {} remain",
            bytes.len()
        )));
    }
    let (head, rest) = bytes.split_at(n);
    *bytes = rest;
    Ok(head)
}

fn take_len_prefixed<'a>(bytes: &mut &'a [u8]) -> Result<&'a [u8]> {
    let mut len = [0u8; 4];
    len.copy_from_slice(take(bytes, 4)?);
    take(bytes, u32::from_be_bytes(len) as usize)
}
