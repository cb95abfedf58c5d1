//! Password encryption for the user store.
//!
//! Stored passwords are AES-128/ECB with PKCS#7 padding, base64 encoded.
//! Login decrypts the stored value and compares plaintext.

use aes::cipher::generic_array::GenericArray;
use aes::cipher::{BlockDecrypt, BlockEncrypt, KeyInit};
use aes::Aes128;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use thiserror::Error;

pub const KEY_LEN: usize = 16;
const BLOCK_LEN: usize = 16;

/// Key used by data directories created before keys became configurable.
pub const DEFAULT_KEY: &[u8; KEY_LEN] = b"EduCoreAesKey!16";

#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("stored password is not valid base64: {0}")]
    Encoding(#[from] base64::DecodeError),
    #[error("ciphertext length {0} is not a multiple of the block size")]
    BlockLength(usize),
    #[error("bad padding in decrypted password")]
    Padding,
    #[error("decrypted password is not UTF-8")]
    Utf8,
}

#[derive(Clone)]
pub struct PasswordCipher {
    cipher: Aes128,
}

impl std::fmt::Debug for PasswordCipher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "PasswordCipher(aes-128-ecb)")
    }
}

impl Default for PasswordCipher {
    fn default() -> Self {
        PasswordCipher::new(DEFAULT_KEY)
    }
}

impl PasswordCipher {
    pub fn new(key: &[u8; KEY_LEN]) -> PasswordCipher {
        PasswordCipher {
            cipher: Aes128::new(GenericArray::from_slice(key)),
        }
    }

    pub fn encrypt(&self, plain: &str) -> String {
        let bytes = plain.as_bytes();
        let pad = BLOCK_LEN - bytes.len() % BLOCK_LEN;
        let mut buf = Vec::with_capacity(bytes.len() + pad);
        buf.extend_from_slice(bytes);
        buf.extend(std::iter::repeat(pad as u8).take(pad));

        for chunk in buf.chunks_exact_mut(BLOCK_LEN) {
            self.cipher.encrypt_block(GenericArray::from_mut_slice(chunk));
        }
        STANDARD.encode(buf)
    }

    pub fn decrypt(&self, stored: &str) -> Result<String, CryptoError> {
        let mut buf = STANDARD.decode(stored.trim())?;
        if buf.is_empty() || buf.len() % BLOCK_LEN != 0 {
            return Err(CryptoError::BlockLength(buf.len()));
        }

        for chunk in buf.chunks_exact_mut(BLOCK_LEN) {
            self.cipher.decrypt_block(GenericArray::from_mut_slice(chunk));
        }

        let pad = *buf.last().ok_or(CryptoError::Padding)? as usize;
        if pad == 0 || pad > BLOCK_LEN {
            return Err(CryptoError::Padding);
        }
        if buf[buf.len() - pad..].iter().any(|b| *b as usize != pad) {
            return Err(CryptoError::Padding);
        }
        buf.truncate(buf.len() - pad);

        String::from_utf8(buf).map_err(|_| CryptoError::Utf8)
    }

    /// True iff `stored` decrypts to exactly `input`.
    pub fn matches(&self, stored: &str, input: &str) -> bool {
        match self.decrypt(stored) {
            Ok(plain) => plain == input,
            Err(e) => {
                tracing::warn!("Unable to decrypt stored password: {}", e);
                false
            }
        }
    }
}
