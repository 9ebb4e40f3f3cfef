//! Per-field index key derivation from a master key.
//!
//! Follows the `CipherSweet` key hierarchy:
//!
//! 1. `root = HKDF-SHA384(ikm = master, salt = table, info = 0x7E * 32 || field, L = 32)`
//! 2. `index_key = HMAC-SHA256(root, pack([table, field, field]))`
//!
//! The field name appears twice in the packed message. Existing index keys
//! depend on that layout, so it must stay as is.

use crate::context::IndexContext;
use crate::error::Error;
use crate::key::{decode_key, IndexKey, KeyMaterial, KEY_SIZE};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use zeroize::Zeroizing;

type HmacSha256 = Hmac<Sha256>;

/// Filler byte prepended (32 times) to the field name in the HKDF info.
const INFO_PREFIX_BYTE: u8 = 0x7E;

/// Derives index keys for any number of (table, field) pairs from one
/// master key.
///
/// # Example
///
/// ```
/// use blindex::context::IndexContext;
/// use blindex::key::KeyMaterial;
/// use blindex::key_generator::KeyGenerator;
///
/// let generator = KeyGenerator::new(&KeyMaterial::text("0".repeat(64))).unwrap();
/// let key = generator.index_key(&IndexContext::new("users", "email_bidx")).unwrap();
/// assert_eq!(
///     key.to_hex(),
///     "289737bab72fa97b1f4b081cef00d7b7d75034bcf3183c363feaf3e6441777bc"
/// );
/// ```
#[derive(Debug, Clone)]
pub struct KeyGenerator {
    master_key: IndexKey,
}

impl KeyGenerator {
    /// Creates a generator, decoding the master key (hex is accepted).
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidMasterKey` if the key is not 32 binary bytes
    /// or 64 hex digits.
    pub fn new(master_key: &KeyMaterial) -> Result<Self, Error> {
        Ok(Self { master_key: decode_master_key(master_key)? })
    }

    /// Creates a generator from an already validated master key.
    #[must_use]
    pub const fn from_key(master_key: IndexKey) -> Self {
        Self { master_key }
    }

    /// Derives the index key for `context`.
    ///
    /// # Errors
    ///
    /// Returns `Error::MissingTable` or `Error::MissingField` if either name
    /// is empty.
    pub fn index_key(&self, context: &IndexContext) -> Result<IndexKey, Error> {
        let table = context.table_name();
        let field = context.field_name();
        check_names(table, field)?;

        let mut info = Vec::with_capacity(KEY_SIZE + field.len());
        info.extend_from_slice(&[INFO_PREFIX_BYTE; KEY_SIZE]);
        info.extend_from_slice(field.as_bytes());

        let mut root_key = Zeroizing::new([0u8; KEY_SIZE]);
        hkdf_sha384(self.master_key.expose(), table.as_bytes(), &info, &mut root_key[..])?;

        let mut mac =
            HmacSha256::new_from_slice(&root_key[..]).map_err(|_| Error::KeyDerivation)?;
        mac.update(&pack(&[table, field, field]));
        let bytes = mac.finalize().into_bytes();

        tracing::debug!(table, field, "derived index key");
        IndexKey::from_slice(&bytes, "Index key")
    }
}

/// Decodes a master key, reporting any problem as `InvalidMasterKey`.
///
/// # Errors
///
/// Returns `Error::InvalidMasterKey` if the key is not 32 binary bytes or
/// 64 hex digits.
pub fn decode_master_key(master_key: &KeyMaterial) -> Result<IndexKey, Error> {
    decode_key(master_key, "Master key").map_err(|e| Error::InvalidMasterKey(e.to_string()))
}

fn check_names(table: &str, field: &str) -> Result<(), Error> {
    if table.is_empty() {
        return Err(Error::MissingTable);
    }
    if field.is_empty() {
        return Err(Error::MissingField);
    }
    Ok(())
}

/// An index key, either hex-encoded for storage or raw for immediate use.
#[derive(Debug, Clone)]
pub enum DerivedKey {
    /// 64 lowercase hex characters
    Hex(String),
    /// Raw 32-byte key
    Binary(IndexKey),
}

impl DerivedKey {
    /// Converts into key material usable as a field key.
    #[must_use]
    pub fn into_key_material(self) -> KeyMaterial {
        match self {
            Self::Hex(hex) => KeyMaterial::text(hex),
            Self::Binary(key) => key.into(),
        }
    }
}

impl From<DerivedKey> for KeyMaterial {
    fn from(key: DerivedKey) -> Self {
        key.into_key_material()
    }
}

/// Derives the index key for `(table, field)` from `master_key`.
///
/// With `encode` the key is returned as 64 lowercase hex characters,
/// otherwise as raw bytes.
///
/// # Errors
///
/// Returns `Error::MissingTable` / `Error::MissingField` for empty names and
/// `Error::InvalidMasterKey` for a malformed master key.
///
/// # Example
///
/// ```
/// use blindex::derive_index_key;
/// use blindex::key::KeyMaterial;
/// use blindex::key_generator::DerivedKey;
///
/// let master = KeyMaterial::binary(vec![0u8; 32]);
/// let key = derive_index_key("users", "email_bidx", &master, true).unwrap();
/// assert!(matches!(key, DerivedKey::Hex(hex) if hex.len() == 64));
/// ```
pub fn derive_index_key(
    table: &str,
    field: &str,
    master_key: &KeyMaterial,
    encode: bool,
) -> Result<DerivedKey, Error> {
    check_names(table, field)?;
    let key = KeyGenerator::new(master_key)?.index_key(&IndexContext::new(table, field))?;
    if encode {
        Ok(DerivedKey::Hex(key.to_hex()))
    } else {
        Ok(DerivedKey::Binary(key))
    }
}

/// Serializes strings as a u32 LE count followed by u64 LE length-prefixed
/// UTF-8 bytes.
fn pack(pieces: &[&str]) -> Vec<u8> {
    let total: usize = pieces.iter().map(|p| 8 + p.len()).sum();
    let mut output = Vec::with_capacity(4 + total);
    output.extend_from_slice(&u32::try_from(pieces.len()).unwrap_or(u32::MAX).to_le_bytes());
    for piece in pieces {
        output.extend_from_slice(&(piece.len() as u64).to_le_bytes());
        output.extend_from_slice(piece.as_bytes());
    }
    output
}

#[cfg(not(feature = "portable-hkdf"))]
fn hkdf_sha384(ikm: &[u8], salt: &[u8], info: &[u8], okm: &mut [u8]) -> Result<(), Error> {
    hkdf::Hkdf::<sha2::Sha384>::new(Some(salt), ikm)
        .expand(info, okm)
        .map_err(|_| Error::KeyDerivation)
}

#[cfg(feature = "portable-hkdf")]
fn hkdf_sha384(ikm: &[u8], salt: &[u8], info: &[u8], okm: &mut [u8]) -> Result<(), Error> {
    rfc5869::hkdf::<sha2::Sha384>(ikm, salt, info, okm)
}

pub mod rfc5869 {
    //! HKDF extract-and-expand (RFC 5869) built directly on HMAC.
    //!
    //! Selected with the `portable-hkdf` feature for targets that should not
    //! depend on the `hkdf` crate. Always compiled so both paths stay tested.

    use crate::error::Error;
    use hmac::{Mac, SimpleHmac};
    use sha2::digest::{core_api::BlockSizeUser, Digest};
    use zeroize::Zeroizing;

    fn mac_parts<D: Digest + BlockSizeUser>(
        key: &[u8],
        parts: &[&[u8]],
    ) -> Result<Zeroizing<Vec<u8>>, Error> {
        let mut mac =
            <SimpleHmac<D> as Mac>::new_from_slice(key).map_err(|_| Error::KeyDerivation)?;
        for part in parts {
            mac.update(part);
        }
        Ok(Zeroizing::new(mac.finalize().into_bytes().to_vec()))
    }

    /// HKDF-Extract. An empty salt behaves like `HashLen` zero bytes, since
    /// HMAC zero-pads short keys.
    ///
    /// # Errors
    ///
    /// Returns `Error::KeyDerivation` if HMAC cannot be keyed.
    pub fn extract<D: Digest + BlockSizeUser>(
        salt: &[u8],
        ikm: &[u8],
    ) -> Result<Zeroizing<Vec<u8>>, Error> {
        mac_parts::<D>(salt, &[ikm])
    }

    /// HKDF-Expand, filling `okm`.
    ///
    /// # Errors
    ///
    /// Returns `Error::KeyDerivation` if `okm` is longer than 255 hash blocks.
    pub fn expand<D: Digest + BlockSizeUser>(
        prk: &[u8],
        info: &[u8],
        okm: &mut [u8],
    ) -> Result<(), Error> {
        let hash_len = <D as Digest>::output_size();
        if okm.len() > 255 * hash_len {
            return Err(Error::KeyDerivation);
        }

        let mut previous = Zeroizing::new(Vec::new());
        for (index, chunk) in okm.chunks_mut(hash_len).enumerate() {
            let counter = u8::try_from(index + 1).map_err(|_| Error::KeyDerivation)?;
            let block = mac_parts::<D>(prk, &[previous.as_slice(), info, &[counter]])?;
            chunk.copy_from_slice(&block[..chunk.len()]);
            previous = block;
        }
        Ok(())
    }

    /// Extract then expand.
    ///
    /// # Errors
    ///
    /// Returns `Error::KeyDerivation` if `okm` is too long.
    pub fn hkdf<D: Digest + BlockSizeUser>(
        ikm: &[u8],
        salt: &[u8],
        info: &[u8],
        okm: &mut [u8],
    ) -> Result<(), Error> {
        let prk = extract::<D>(salt, ikm)?;
        expand::<D>(&prk, info, okm)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sha2::Sha384;

    const GOLDEN_INDEX_KEY: &str =
        "289737bab72fa97b1f4b081cef00d7b7d75034bcf3183c363feaf3e6441777bc";

    fn zero_master() -> KeyMaterial {
        KeyMaterial::text("0".repeat(64))
    }

    #[test]
    fn test_golden_vector() {
        let key = derive_index_key("users", "email_bidx", &zero_master(), true).unwrap();
        assert!(matches!(key, DerivedKey::Hex(hex) if hex == GOLDEN_INDEX_KEY));
    }

    #[test]
    fn test_binary_master_key_matches_hex() {
        let master = KeyMaterial::binary(vec![0u8; 32]);
        let key = derive_index_key("users", "email_bidx", &master, false).unwrap();
        match key {
            DerivedKey::Binary(key) => assert_eq!(key.to_hex(), GOLDEN_INDEX_KEY),
            DerivedKey::Hex(_) => panic!("expected binary key"),
        }
    }

    #[test]
    fn test_distinct_tables_and_fields() {
        let generator = KeyGenerator::new(&zero_master()).unwrap();
        let a = generator.index_key(&IndexContext::new("users", "email_bidx")).unwrap();
        let b = generator.index_key(&IndexContext::new("users", "phone_bidx")).unwrap();
        let c = generator.index_key(&IndexContext::new("admins", "email_bidx")).unwrap();
        assert_ne!(a.expose(), b.expose());
        assert_ne!(a.expose(), c.expose());
        assert_ne!(b.expose(), c.expose());
    }

    #[test]
    fn test_missing_names() {
        let master = zero_master();
        let result = derive_index_key("", "email_bidx", &master, true);
        assert!(matches!(result, Err(Error::MissingTable)));
        let result = derive_index_key("users", "", &master, true);
        assert!(matches!(result, Err(Error::MissingField)));
    }

    #[test]
    fn test_missing_names_checked_before_master_key() {
        let bad_master = KeyMaterial::text("bad");
        assert!(matches!(derive_index_key("", "f", &bad_master, true), Err(Error::MissingTable)));
    }

    #[test]
    fn test_invalid_master_key() {
        let short = KeyMaterial::binary(vec![0u8; 16]);
        assert!(matches!(
            derive_index_key("users", "email_bidx", &short, true),
            Err(Error::InvalidMasterKey(_))
        ));

        let text = KeyMaterial::text("not a hex key");
        assert!(matches!(KeyGenerator::new(&text), Err(Error::InvalidMasterKey(_))));
    }

    #[test]
    fn test_pack_layout() {
        let mut expected = vec![2u8, 0, 0, 0];
        expected.extend_from_slice(&2u64.to_le_bytes());
        expected.extend_from_slice(b"ab");
        expected.extend_from_slice(&1u64.to_le_bytes());
        expected.extend_from_slice(b"c");
        assert_eq!(pack(&["ab", "c"]), expected);
    }

    // RFC 5869 Test Vector (using HKDF-SHA256)
    // https://tools.ietf.org/html/rfc5869#appendix-A.1
    #[test]
    fn test_rfc5869_test_case_1() {
        const IKM_HEX: &str = "0b0b0b0b0b0b0b0b0b0b0b0b0b0b0b0b0b0b0b0b0b0b";
        const SALT_HEX: &str = "000102030405060708090a0b0c";
        const INFO_HEX: &str = "f0f1f2f3f4f5f6f7f8f9";
        const EXPECTED_OKM_HEX: &str =
            "3cb25f25faacd57a90434f64d0362f2a2d2d0a90cf1a5a4c5db02d56ecc4c5bf34007208d5b887185865";

        let ikm = hex::decode(IKM_HEX).unwrap();
        let salt = hex::decode(SALT_HEX).unwrap();
        let info = hex::decode(INFO_HEX).unwrap();

        let mut okm = vec![0u8; 42];
        rfc5869::hkdf::<Sha256>(&ikm, &salt, &info, &mut okm).unwrap();
        assert_eq!(hex::encode(okm), EXPECTED_OKM_HEX);
    }

    // https://tools.ietf.org/html/rfc5869#appendix-A.3 (zero-length salt and info)
    #[test]
    fn test_rfc5869_test_case_3() {
        const EXPECTED_OKM_HEX: &str =
            "8da4e775a563c18f715f802a063c5a31b8a11f5c5ee1879ec3454e5f3c738d2d9d201395faa4b61a96c8";

        let ikm = [0x0bu8; 22];
        let mut okm = vec![0u8; 42];
        rfc5869::hkdf::<Sha256>(&ikm, &[], &[], &mut okm).unwrap();
        assert_eq!(hex::encode(okm), EXPECTED_OKM_HEX);
    }

    #[test]
    fn test_portable_hkdf_matches_crate() {
        let mut info = vec![INFO_PREFIX_BYTE; KEY_SIZE];
        info.extend_from_slice(b"email_bidx");

        for length in [1, 32, 48, 100] {
            let mut expected = vec![0u8; length];
            hkdf::Hkdf::<Sha384>::new(Some(&b"users"[..]), &[7u8; 32])
                .expand(&info, &mut expected)
                .unwrap();

            let mut actual = vec![0u8; length];
            rfc5869::hkdf::<Sha384>(&[7u8; 32], b"users", &info, &mut actual).unwrap();
            assert_eq!(actual, expected);
        }
    }

    #[test]
    fn test_expand_rejects_oversized_output() {
        let mut okm = vec![0u8; 255 * 48 + 1];
        assert!(rfc5869::expand::<Sha384>(&[1u8; 48], b"", &mut okm).is_err());
    }
}
