//! Invoice hashing

use base64::{engine::general_purpose::STANDARD, Engine as _};
use sha2::{Digest, Sha256};

/// Computes invoice chain hashes
pub struct InvoiceHasher;

impl InvoiceHasher {
    /// Base64 SHA-256 digest of the UTF-8 bytes of `xml`
    pub fn hash(xml: &str) -> String {
        STANDARD.encode(Self::digest(xml.as_bytes()))
    }

    /// Raw SHA-256 digest
    pub fn digest(bytes: &[u8]) -> [u8; 32] {
        Sha256::digest(bytes).into()
    }
}
