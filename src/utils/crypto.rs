//! # Symmetric Cipher
//!
//! AES-256-CBC with PKCS7-style padding.
//!
//! The key is `SHA-256(passphrase)`. Every call to [`SymmetricCipher::encrypt`]
//! draws a fresh IV from the OS RNG, so encrypting the same plaintext twice
//! never yields the same envelope.
//!
//! ## Envelope Format
//! ```text
//! [IV(16)] [AES-256-CBC ciphertext (N * 16)]
//! ```
//!
//! CBC carries no authentication tag. Tampering is only detected when it
//! happens to corrupt the padding, so [`SymmetricCipher::decrypt`] may accept
//! a modified envelope and return different bytes.

use crate::error::{constants, BankError, Result};
use aes::Aes256;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use cbc::cipher::{block_padding::NoPadding, BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use zeroize::{Zeroize, ZeroizeOnDrop};

type Aes256CbcEnc = cbc::Encryptor<Aes256>;
type Aes256CbcDec = cbc::Decryptor<Aes256>;

/// AES block size in bytes (also the IV length)
pub const BLOCK_SIZE: usize = 16;

/// AES-256 key size in bytes
pub const KEY_SIZE: usize = 32;

/// 256-bit cipher key, wiped from memory on drop
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct CipherKey([u8; KEY_SIZE]);

impl CipherKey {
    pub fn from_bytes(bytes: [u8; KEY_SIZE]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.0
    }
}

impl fmt::Debug for CipherKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("CipherKey(..)")
    }
}

/// Derive a fixed-length key from an arbitrary passphrase
pub fn derive_key(passphrase: &str) -> CipherKey {
    let digest = Sha256::digest(passphrase.as_bytes());
    let mut key = [0u8; KEY_SIZE];
    key.copy_from_slice(&digest);
    CipherKey(key)
}

/// Append `n` bytes of value `n`, where `n` is in `1..=BLOCK_SIZE`.
///
/// Block-aligned input still receives a full block of padding.
pub fn pad(data: &[u8]) -> Vec<u8> {
    let pad_len = BLOCK_SIZE - data.len() % BLOCK_SIZE;
    let mut padded = Vec::with_capacity(data.len() + pad_len);
    padded.extend_from_slice(data);
    padded.resize(data.len() + pad_len, pad_len as u8);
    padded
}

/// Strip the padding added by [`pad`].
///
/// # Errors
/// Returns `BankError::Decryption` if the input is not block aligned, the pad
/// value is out of range, or the pad bytes disagree.
pub fn unpad(data: &[u8]) -> Result<&[u8]> {
    if data.is_empty() || data.len() % BLOCK_SIZE != 0 {
        return Err(BankError::Decryption(constants::ERR_MISALIGNED_CIPHERTEXT));
    }

    let pad_len = data[data.len() - 1] as usize;
    if pad_len == 0 || pad_len > BLOCK_SIZE {
        return Err(BankError::Decryption(constants::ERR_BAD_PADDING));
    }

    let (content, padding) = data.split_at(data.len() - pad_len);
    if padding.iter().any(|&b| b as usize != pad_len) {
        return Err(BankError::Decryption(constants::ERR_BAD_PADDING));
    }

    Ok(content)
}

/// Base64 text of an envelope, used for values encrypted at rest
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SealedValue(String);

impl SealedValue {
    pub fn from_encoded(encoded: impl Into<String>) -> Self {
        Self(encoded.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// AES-256-CBC cipher bound to one derived key
#[derive(Clone, Debug)]
pub struct SymmetricCipher {
    key: CipherKey,
}

impl SymmetricCipher {
    pub fn new(key: CipherKey) -> Self {
        Self { key }
    }

    pub fn from_passphrase(passphrase: &str) -> Self {
        Self::new(derive_key(passphrase))
    }

    /// Encrypt `plaintext` and return `IV || ciphertext`.
    ///
    /// # Errors
    /// Returns `BankError::EncryptionFailure` if the OS RNG is unavailable.
    pub fn encrypt(&self, plaintext: &[u8]) -> Result<Vec<u8>> {
        let mut iv = [0u8; BLOCK_SIZE];
        getrandom::fill(&mut iv).map_err(|_| BankError::EncryptionFailure)?;

        let mut buf = pad(plaintext);
        let len = buf.len();
        Aes256CbcEnc::new(&(*self.key.as_bytes()).into(), &iv.into())
            .encrypt_padded_mut::<NoPadding>(&mut buf, len)
            .map_err(|_| BankError::EncryptionFailure)?;

        let mut envelope = Vec::with_capacity(BLOCK_SIZE + len);
        envelope.extend_from_slice(&iv);
        envelope.extend_from_slice(&buf);
        buf.zeroize();
        Ok(envelope)
    }

    /// Decrypt an envelope produced by [`SymmetricCipher::encrypt`].
    ///
    /// # Errors
    /// Returns `BankError::Decryption` on a short, misaligned or badly padded
    /// envelope. A wrong key almost always shows up as bad padding.
    pub fn decrypt(&self, envelope: &[u8]) -> Result<Vec<u8>> {
        if envelope.len() < BLOCK_SIZE {
            return Err(BankError::Decryption(constants::ERR_SHORT_ENVELOPE));
        }

        let (iv_bytes, ciphertext) = envelope.split_at(BLOCK_SIZE);
        if ciphertext.is_empty() || ciphertext.len() % BLOCK_SIZE != 0 {
            return Err(BankError::Decryption(constants::ERR_MISALIGNED_CIPHERTEXT));
        }

        let mut iv = [0u8; BLOCK_SIZE];
        iv.copy_from_slice(iv_bytes);

        let mut buf = ciphertext.to_vec();
        let decrypted = Aes256CbcDec::new(&(*self.key.as_bytes()).into(), &iv.into())
            .decrypt_padded_mut::<NoPadding>(&mut buf)
            .map_err(|_| BankError::Decryption(constants::ERR_MISALIGNED_CIPHERTEXT))?;

        let plaintext = unpad(decrypted)?.to_vec();
        buf.zeroize();
        Ok(plaintext)
    }

    /// Encrypt UTF-8 text into a base64 [`SealedValue`]
    pub fn seal_text(&self, text: &str) -> Result<SealedValue> {
        let envelope = self.encrypt(text.as_bytes())?;
        Ok(SealedValue(STANDARD.encode(envelope)))
    }

    /// Reverse [`SymmetricCipher::seal_text`]
    pub fn open_text(&self, sealed: &SealedValue) -> Result<String> {
        let envelope = STANDARD
            .decode(sealed.as_str())
            .map_err(|e| BankError::Codec(format!("Invalid base64 in sealed value: {e}")))?;
        let plaintext = self.decrypt(&envelope)?;
        String::from_utf8(plaintext)
            .map_err(|_| BankError::Codec("Sealed value is not valid UTF-8".to_string()))
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]
    use super::*;

    #[test]
    fn test_key_is_sha256_of_passphrase() {
        let key = derive_key("super_secure_key");
        let expected = Sha256::digest(b"super_secure_key");
        assert_eq!(key.as_bytes().as_slice(), expected.as_slice());
        assert_eq!(key.as_bytes().len(), KEY_SIZE);
    }

    #[test]
    fn test_pad_always_adds_bytes() {
        assert_eq!(pad(b"").len(), BLOCK_SIZE);
        assert_eq!(pad(&[0u8; 15]).len(), BLOCK_SIZE);
        assert_eq!(pad(&[0u8; 16]).len(), 2 * BLOCK_SIZE);

        let padded = pad(&[7u8; 16]);
        assert!(padded[16..].iter().all(|&b| b == 16));

        let padded = pad(b"abc");
        assert!(padded[3..].iter().all(|&b| b == 13));
    }

    #[test]
    fn test_unpad_rejects_bad_padding() {
        let mut block = [4u8; BLOCK_SIZE];
        block[BLOCK_SIZE - 1] = 0;
        assert!(matches!(unpad(&block), Err(BankError::Decryption(_))));

        block[BLOCK_SIZE - 1] = 17;
        assert!(matches!(unpad(&block), Err(BankError::Decryption(_))));

        // Last byte says 4 but the byte before it disagrees
        let mut block = [4u8; BLOCK_SIZE];
        block[BLOCK_SIZE - 2] = 9;
        assert!(matches!(unpad(&block), Err(BankError::Decryption(_))));

        assert!(matches!(unpad(&[1u8; 5]), Err(BankError::Decryption(_))));
    }

    #[test]
    fn test_encrypt_decrypt_roundtrip() {
        let cipher = SymmetricCipher::from_passphrase("roundtrip");
        for len in [0usize, 1, 15, 16, 17, 31, 32, 1000] {
            let plaintext: Vec<u8> = (0..len).map(|i| (i % 251) as u8).collect();
            let envelope = cipher.encrypt(&plaintext).unwrap();
            assert_eq!(envelope.len() % BLOCK_SIZE, 0);
            assert!(envelope.len() > plaintext.len() + BLOCK_SIZE - 1);
            assert_eq!(cipher.decrypt(&envelope).unwrap(), plaintext);
        }
    }

    #[test]
    fn test_encryption_is_randomized() {
        let cipher = SymmetricCipher::from_passphrase("iv");
        let a = cipher.encrypt(b"same plaintext").unwrap();
        let b = cipher.encrypt(b"same plaintext").unwrap();
        assert_ne!(a, b);
        assert_ne!(a[..BLOCK_SIZE], b[..BLOCK_SIZE]);
    }

    #[test]
    fn test_short_envelope_rejected() {
        let cipher = SymmetricCipher::from_passphrase("short");
        assert!(matches!(
            cipher.decrypt(&[0u8; 8]),
            Err(BankError::Decryption(constants::ERR_SHORT_ENVELOPE))
        ));
        // IV only, no ciphertext
        assert!(matches!(
            cipher.decrypt(&[0u8; BLOCK_SIZE]),
            Err(BankError::Decryption(_))
        ));
    }

    #[test]
    fn test_truncated_envelope_rejected() {
        let cipher = SymmetricCipher::from_passphrase("truncate");
        let envelope = cipher.encrypt(b"a message spanning two blocks").unwrap();
        let result = cipher.decrypt(&envelope[..envelope.len() - 3]);
        assert!(matches!(result, Err(BankError::Decryption(_))));
    }

    #[test]
    fn test_sealed_text_roundtrip() {
        let cipher = SymmetricCipher::from_passphrase("sealed");
        let sealed = cipher.seal_text("1000.50").unwrap();
        assert_ne!(sealed.as_str(), "1000.50");
        assert_eq!(cipher.open_text(&sealed).unwrap(), "1000.50");
    }

    #[test]
    fn test_key_debug_is_redacted() {
        let key = derive_key("do not print");
        assert_eq!(format!("{key:?}"), "CipherKey(..)");
    }
}
