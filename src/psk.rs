//! IPsec pre-shared key generation.
//!
//! Gateways in every cluster authenticate their tunnels with one shared
//! key, stored as raw bytes under the `psk` field of a secret record in the
//! mesh namespace.

use rand::rngs::OsRng;
use rand::RngCore;

use crate::store::{Record, RecordStore, StoreError};

/// Name of the secret record holding the PSK
pub const PSK_SECRET_NAME: &str = "mesh-ipsec-psk";

/// Field of the secret record holding the raw key bytes
pub const PSK_FIELD: &str = "psk";

/// Default key length in bytes
pub const DEFAULT_PSK_LEN: usize = 48;

#[derive(Debug, thiserror::Error)]
pub enum PskError {
    #[error("PSK length must be greater than zero")]
    EmptyKey,

    #[error("failed to read system entropy: {0}")]
    Entropy(#[from] rand::Error),

    #[error("failed to store PSK secret: {0}")]
    Storage(#[from] StoreError),
}

/// Generate `len` bytes of OS-provided randomness
pub fn generate_psk(len: usize) -> Result<Vec<u8>, PskError> {
    if len == 0 {
        return Err(PskError::EmptyKey);
    }

    let mut psk = vec![0u8; len];
    OsRng.try_fill_bytes(&mut psk)?;
    Ok(psk)
}

/// Build a fresh PSK secret record
pub fn new_psk_secret(len: usize) -> Result<Record, PskError> {
    let mut record = Record::new(PSK_SECRET_NAME);
    record.binary_data.insert(PSK_FIELD.to_string(), generate_psk(len)?);
    Ok(record)
}

/// Create the PSK secret unless it already exists.
///
/// Returns `true` if a new key was created. An existing secret is left
/// untouched: rotating the key would break every established tunnel.
pub fn ensure_psk_secret(store: &impl RecordStore, namespace: &str, len: usize) -> Result<bool, PskError> {
    let secret = new_psk_secret(len)?;
    match store.create(namespace, &secret) {
        Ok(_) => {
            log::info!("Created {}-byte PSK secret {} in namespace {}", len, PSK_SECRET_NAME, namespace);
            Ok(true)
        }
        Err(StoreError::AlreadyExists { .. }) => {
            log::info!("PSK secret {} already exists in namespace {}", PSK_SECRET_NAME, namespace);
            Ok(false)
        }
        Err(e) => Err(e.into()),
    }
}
