//! User-scoped sealing of the token-cache blob.
//!
//! A [`Sealer`] turns the serialized cache into an at-rest blob and back.
//! The default backend derives an AES-256-GCM key from user/machine
//! entropy, so a cache file sealed under one account does not unseal
//! under another and is not portable across machines. An alternative
//! backend keeps the data key in the OS keychain instead.

use aes_gcm::{
    Aes256Gcm, KeyInit, Nonce,
    aead::{Aead, OsRng, rand_core::RngCore},
};
use base64::{Engine as _, engine::general_purpose::STANDARD};
use sha2::{Digest, Sha256};
use zeroize::Zeroizing;

use crate::constants::{KEYRING_ACCOUNT, KEYRING_SERVICE, SEALER_ENV_VAR};
use crate::error::SealError;

const NONCE_SIZE: usize = 12;
const KEY_SIZE: usize = 32;

/// Seal/unseal capability for opaque byte blobs.
///
/// Backends differ only in where the key material lives; the blob layout
/// (random nonce followed by the AES-256-GCM ciphertext) is shared.
pub trait Sealer: Send + Sync {
    fn seal(&self, plaintext: &[u8]) -> Result<Vec<u8>, SealError>;
    fn unseal(&self, sealed: &[u8]) -> Result<Vec<u8>, SealError>;
}

fn seal_with_key(key: &[u8; KEY_SIZE], plaintext: &[u8]) -> Result<Vec<u8>, SealError> {
    let cipher = Aes256Gcm::new_from_slice(key).map_err(|_| SealError::Cipher)?;

    let mut nonce_bytes = [0u8; NONCE_SIZE];
    OsRng.fill_bytes(&mut nonce_bytes);
    let nonce = Nonce::from_slice(&nonce_bytes);

    let ciphertext = cipher.encrypt(nonce, plaintext).map_err(|_| SealError::Seal)?;

    let mut sealed = Vec::with_capacity(NONCE_SIZE + ciphertext.len());
    sealed.extend_from_slice(&nonce_bytes);
    sealed.extend_from_slice(&ciphertext);
    Ok(sealed)
}

fn unseal_with_key(key: &[u8; KEY_SIZE], sealed: &[u8]) -> Result<Vec<u8>, SealError> {
    if sealed.len() < NONCE_SIZE {
        return Err(SealError::Malformed);
    }
    let (nonce_bytes, ciphertext) = sealed.split_at(NONCE_SIZE);

    let cipher = Aes256Gcm::new_from_slice(key).map_err(|_| SealError::Cipher)?;
    let nonce = Nonce::from_slice(nonce_bytes);

    cipher.decrypt(nonce, ciphertext).map_err(|_| SealError::Unseal)
}

/// Derive a key from user/machine entropy: a blob sealed here is bound to
/// the invoking user on this machine, the same property the Windows
/// current-user data-protection scope gives.
fn derive_user_key() -> Zeroizing<[u8; KEY_SIZE]> {
    let mut hasher = Sha256::new();

    // Machine ID (Linux) or fallback
    #[cfg(target_os = "linux")]
    {
        if let Ok(id) = std::fs::read_to_string("/etc/machine-id") {
            hasher.update(id.trim().as_bytes());
        } else if let Ok(id) = std::fs::read_to_string("/var/lib/dbus/machine-id") {
            hasher.update(id.trim().as_bytes());
        }
    }

    // Hostname
    if let Ok(hostname) = hostname::get() {
        hasher.update(hostname.as_encoded_bytes());
    }

    // User ID (Unix) or username (Windows)
    #[cfg(unix)]
    {
        hasher.update(unsafe { libc::getuid() }.to_le_bytes());
    }
    #[cfg(windows)]
    {
        if let Ok(user) = std::env::var("USERNAME") {
            hasher.update(user.as_bytes());
        }
    }

    // Home directory path as additional entropy
    if let Some(home) = dirs::home_dir() {
        hasher.update(home.to_string_lossy().as_bytes());
    }

    // Application-specific salt
    hasher.update(b"entra-token-cache-sealer-v1");

    let digest = hasher.finalize();
    let mut key = Zeroizing::new([0u8; KEY_SIZE]);
    key.copy_from_slice(&digest);
    key
}

/// Sealer keyed by user/machine-derived entropy. The default backend.
pub struct UserKeySealer {
    key: Zeroizing<[u8; KEY_SIZE]>,
}

impl UserKeySealer {
    /// Sealer bound to the invoking OS user on this machine.
    pub fn for_current_user() -> Self {
        Self {
            key: derive_user_key(),
        }
    }

    /// Sealer with an explicit key. This is the substitution point for
    /// password-derived or externally provisioned keys, and it is how
    /// tests stand in a second user identity.
    pub fn with_key(key: [u8; KEY_SIZE]) -> Self {
        Self {
            key: Zeroizing::new(key),
        }
    }
}

impl Sealer for UserKeySealer {
    fn seal(&self, plaintext: &[u8]) -> Result<Vec<u8>, SealError> {
        seal_with_key(&self.key, plaintext)
    }

    fn unseal(&self, sealed: &[u8]) -> Result<Vec<u8>, SealError> {
        unseal_with_key(&self.key, sealed)
    }
}

/// Sealer whose data key lives in the OS keychain (Credential Manager,
/// Keychain, Secret Service). The key is generated on first use.
pub struct KeyringSealer {
    service: String,
    account: String,
}

impl KeyringSealer {
    pub fn new() -> Self {
        Self::with_entry(KEYRING_SERVICE, KEYRING_ACCOUNT)
    }

    /// Keychain entry override, used by tests to avoid entry collisions.
    pub fn with_entry(service: &str, account: &str) -> Self {
        Self {
            service: service.to_string(),
            account: account.to_string(),
        }
    }

    fn entry(&self) -> Result<keyring::Entry, SealError> {
        keyring::Entry::new(&self.service, &self.account)
            .map_err(|e| SealError::Keyring(e.to_string()))
    }

    /// Load the data key, generating and storing one on first use.
    fn data_key(&self) -> Result<Zeroizing<[u8; KEY_SIZE]>, SealError> {
        let entry = self.entry()?;
        match entry.get_password() {
            Ok(encoded) => {
                let bytes = STANDARD
                    .decode(encoded.as_bytes())
                    .map_err(|e| SealError::Keyring(format!("stored key is not base64: {e}")))?;
                let raw: [u8; KEY_SIZE] = bytes
                    .try_into()
                    .map_err(|_| SealError::Keyring("stored key has wrong length".to_string()))?;
                Ok(Zeroizing::new(raw))
            }
            Err(keyring::Error::NoEntry) => {
                let mut key = Zeroizing::new([0u8; KEY_SIZE]);
                OsRng.fill_bytes(&mut key[..]);
                entry
                    .set_password(&STANDARD.encode(&key[..]))
                    .map_err(|e| SealError::Keyring(e.to_string()))?;
                tracing::debug!(
                    service = %self.service,
                    "Generated new cache key in the system keyring"
                );
                Ok(key)
            }
            Err(e) => Err(SealError::Keyring(e.to_string())),
        }
    }
}

impl Default for KeyringSealer {
    fn default() -> Self {
        Self::new()
    }
}

impl Sealer for KeyringSealer {
    fn seal(&self, plaintext: &[u8]) -> Result<Vec<u8>, SealError> {
        seal_with_key(&*self.data_key()?, plaintext)
    }

    fn unseal(&self, sealed: &[u8]) -> Result<Vec<u8>, SealError> {
        unseal_with_key(&*self.data_key()?, sealed)
    }
}

/// Which sealer backend to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SealerKind {
    /// User/machine-derived key. No external dependencies.
    #[default]
    UserKey,
    /// Data key held in the OS keychain.
    Keyring,
}

impl SealerKind {
    /// Read the backend selection from `ENTRA_TOKEN_SEALER`.
    pub fn from_env() -> Result<Self, SealError> {
        match std::env::var(SEALER_ENV_VAR) {
            Ok(value) => Self::parse(&value),
            Err(_) => Ok(Self::default()),
        }
    }

    fn parse(value: &str) -> Result<Self, SealError> {
        match value {
            "user" => Ok(Self::UserKey),
            "keyring" => Ok(Self::Keyring),
            other => Err(SealError::UnknownBackend(other.to_string())),
        }
    }

    pub fn build(self) -> Box<dyn Sealer> {
        match self {
            Self::UserKey => Box::new(UserKeySealer::for_current_user()),
            Self::Keyring => Box::new(KeyringSealer::new()),
        }
    }
}
