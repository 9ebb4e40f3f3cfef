//! KDF engine: keyed, cost-tunable one-way digests.
//!
//! The index key is always used as the salt and the plaintext as the
//! password. Parameters are validated when a [`KdfParams`] is built, so a
//! bad cost fails before any hashing starts.

use crate::config::{Algorithm, Cost};
use crate::error::Error;
use sha2::Sha256;
use std::ops::RangeInclusive;

/// Largest digest size in bytes.
pub const MAX_SIZE: usize = 32;

/// Smallest tag the Argon2 primitive can produce.
pub const ARGON2_MIN_SIZE: usize = 4;

/// Default PBKDF2 iteration count.
pub const DEFAULT_PBKDF2_ITERATIONS: u32 = 10_000;

/// Bounds for the Argon2 time cost `t`.
pub const ARGON2_T_BOUNDS: RangeInclusive<u32> = 3..=10;

/// Bounds for the Argon2 memory cost exponent `m` (memory is `2^m` KiB).
pub const ARGON2_M_BOUNDS: RangeInclusive<u32> = 3..=22;

/// Default Argon2 time cost.
pub const DEFAULT_ARGON2_T: u32 = 3;
/// Default Argon2 memory cost exponent (4 MiB).
pub const DEFAULT_ARGON2_M: u32 = 12;

/// Argon2id time cost for fields using the slow profile.
pub const SLOW_ARGON2_T: u32 = 4;
/// Argon2id memory cost exponent for fields using the slow profile (32 MiB).
pub const SLOW_ARGON2_M: u32 = 15;

/// Default scrypt work factor.
pub const DEFAULT_SCRYPT_N: u64 = 4096;
/// Default scrypt block size.
pub const DEFAULT_SCRYPT_R: u32 = 8;
/// Default scrypt parallelism.
pub const DEFAULT_SCRYPT_P: u32 = 1;

/// Fully resolved, validated parameters for one algorithm.
///
/// The only constructor is [`KdfParams::new`], so a value of this type
/// always holds costs inside their bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KdfParams(Params);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Params {
    Pbkdf2Sha256 { iterations: u32 },
    Argon2i { t: u32, m: u32 },
    Argon2id { t: u32, m: u32 },
    // n = 2^log_n
    Scrypt { log_n: u8, r: u32, p: u32 },
}

impl KdfParams {
    /// Resolves parameters for `algorithm`, filling unset costs with the
    /// hardcoded algorithm defaults, and validates them.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidCostParameter` if a parameter is out of bounds.
    pub fn new(algorithm: Algorithm, cost: &Cost) -> Result<Self, Error> {
        let params = match algorithm {
            Algorithm::Pbkdf2Sha256 => Params::Pbkdf2Sha256 {
                iterations: cost.iterations.unwrap_or(DEFAULT_PBKDF2_ITERATIONS),
            },
            Algorithm::Argon2i => Params::Argon2i {
                t: cost.t.unwrap_or(DEFAULT_ARGON2_T),
                m: cost.m.unwrap_or(DEFAULT_ARGON2_M),
            },
            Algorithm::Argon2id => Params::Argon2id {
                t: cost.t.unwrap_or(DEFAULT_ARGON2_T),
                m: cost.m.unwrap_or(DEFAULT_ARGON2_M),
            },
            Algorithm::Scrypt => {
                let n = cost.n.unwrap_or(DEFAULT_SCRYPT_N);
                if n < 2 || !n.is_power_of_two() {
                    return Err(Error::InvalidCostParameter {
                        param: "n",
                        value: n,
                        reason: "must be a power of two greater than 1",
                    });
                }
                // n is a power of two below 2^64, so log_n fits in a u8
                let log_n = n.trailing_zeros() as u8;
                Params::Scrypt {
                    log_n,
                    r: cost.r.unwrap_or(DEFAULT_SCRYPT_R),
                    p: cost.p.unwrap_or(DEFAULT_SCRYPT_P),
                }
            }
        };
        Self(params).validated()
    }

    /// Checks every bound. Runs on construction and again before hashing.
    fn validated(self) -> Result<Self, Error> {
        match self.0 {
            Params::Pbkdf2Sha256 { iterations } => positive("iterations", iterations)?,
            Params::Argon2i { t, m } | Params::Argon2id { t, m } => {
                check_bounds("t", t, &ARGON2_T_BOUNDS)?;
                check_bounds("m", m, &ARGON2_M_BOUNDS)?;
            }
            Params::Scrypt { log_n, r, p } => {
                if !(1..u64::BITS).contains(&u32::from(log_n)) {
                    return Err(Error::InvalidCostParameter {
                        param: "n",
                        value: 1u64.checked_shl(u32::from(log_n)).unwrap_or(0),
                        reason: "must be a power of two greater than 1",
                    });
                }
                positive("r", r)?;
                positive("p", p)?;
            }
        }
        Ok(self)
    }

    /// The algorithm these parameters belong to.
    #[must_use]
    pub const fn algorithm(&self) -> Algorithm {
        match self.0 {
            Params::Pbkdf2Sha256 { .. } => Algorithm::Pbkdf2Sha256,
            Params::Argon2i { .. } => Algorithm::Argon2i,
            Params::Argon2id { .. } => Algorithm::Argon2id,
            Params::Scrypt { .. } => Algorithm::Scrypt,
        }
    }

    /// The resolved cost, with every tunable of the algorithm set.
    #[must_use]
    pub fn cost(&self) -> Cost {
        match self.0 {
            Params::Pbkdf2Sha256 { iterations } => Cost::new().with_iterations(iterations),
            Params::Argon2i { t, m } | Params::Argon2id { t, m } => {
                Cost::new().with_t(t).with_m(m)
            }
            Params::Scrypt { log_n, r, p } => Cost::new().with_scrypt(1u64 << log_n, r, p),
        }
    }
}

fn positive(param: &'static str, value: u32) -> Result<(), Error> {
    if value == 0 {
        return Err(Error::InvalidCostParameter { param, value: 0, reason: "must be positive" });
    }
    Ok(())
}

fn check_bounds(
    param: &'static str,
    value: u32,
    bounds: &RangeInclusive<u32>,
) -> Result<u32, Error> {
    if bounds.contains(&value) {
        Ok(value)
    } else {
        Err(Error::InvalidCostParameter {
            param,
            value: u64::from(value),
            reason: if param == "t" {
                "must be between 3 and 10"
            } else {
                "must be between 3 and 22"
            },
        })
    }
}

/// Checks `size` against the general bound and the algorithm's own limits.
///
/// # Errors
///
/// Returns `Error::InvalidSize` if `size` is outside 1..=32, if Argon2i is
/// asked for anything but 32 bytes, or if Argon2id is asked for fewer than 4.
pub fn validate_size(algorithm: Algorithm, size: usize) -> Result<(), Error> {
    if !(1..=MAX_SIZE).contains(&size) {
        return Err(Error::InvalidSize { size, reason: "must be between 1 and 32" });
    }
    match algorithm {
        Algorithm::Argon2i if size != MAX_SIZE => {
            Err(Error::InvalidSize { size, reason: "argon2i digests must be 32 bytes" })
        }
        Algorithm::Argon2id if size < ARGON2_MIN_SIZE => {
            Err(Error::InvalidSize { size, reason: "argon2id digests must be at least 4 bytes" })
        }
        _ => Ok(()),
    }
}

/// Derives a `size`-byte digest of `value` keyed by `key`.
///
/// # Errors
///
/// Returns `Error::InvalidSize` for an unsupported size, or
/// `Error::KeyDerivation` / `Error::InvalidCostParameter` if the primitive
/// rejects its inputs.
///
/// # Example
///
/// ```
/// use blindex::config::{Algorithm, Cost};
/// use blindex::kdf::{derive, KdfParams};
///
/// let params = KdfParams::new(Algorithm::Pbkdf2Sha256, &Cost::new()).unwrap();
/// let digest = derive(b"alice@example.com", &[0u8; 32], &params, 16).unwrap();
/// assert_eq!(digest.len(), 16);
/// ```
pub fn derive(value: &[u8], key: &[u8], params: &KdfParams, size: usize) -> Result<Vec<u8>, Error> {
    let params = params.validated()?;
    validate_size(params.algorithm(), size)?;
    tracing::trace!(algorithm = %params.algorithm(), size, "computing digest");

    let mut output = vec![0u8; size];
    match params.0 {
        Params::Pbkdf2Sha256 { iterations } => {
            pbkdf2::pbkdf2_hmac::<Sha256>(value, key, iterations, &mut output);
        }
        Params::Argon2i { t, m } => {
            argon2_into(argon2::Algorithm::Argon2i, value, key, t, m, &mut output)?;
        }
        Params::Argon2id { t, m } => {
            argon2_into(argon2::Algorithm::Argon2id, value, key, t, m, &mut output)?;
        }
        Params::Scrypt { log_n, r, p } => {
            let params = scrypt::Params::new(log_n, r, p, MAX_SIZE)
                .map_err(|_| Error::InvalidCostParameter {
                    param: "n",
                    value: 1u64.checked_shl(u32::from(log_n)).unwrap_or(0),
                    reason: "not supported with the given r and p",
                })?;
            scrypt::scrypt(value, key, &params, &mut output).map_err(|_| Error::KeyDerivation)?;
        }
    }
    Ok(output)
}

fn argon2_into(
    variant: argon2::Algorithm,
    value: &[u8],
    key: &[u8],
    t: u32,
    m: u32,
    output: &mut [u8],
) -> Result<(), Error> {
    let memory = 1u32.checked_shl(m).ok_or(Error::InvalidCostParameter {
        param: "m",
        value: u64::from(m),
        reason: "must be between 3 and 22",
    })?;
    let params = argon2::Params::new(memory, t, 1, Some(output.len()))
        .map_err(|_| Error::KeyDerivation)?;
    argon2::Argon2::new(variant, argon2::Version::V0x13, params)
        .hash_password_into(value, key, output)
        .map_err(|_| Error::KeyDerivation)
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::{engine::general_purpose::STANDARD, Engine as _};

    const KEY: [u8; 32] = [0u8; 32];

    fn params(algorithm: Algorithm) -> KdfParams {
        KdfParams::new(algorithm, &Cost::new()).expect("default params are valid")
    }

    #[test]
    fn test_pbkdf2_known_vector() {
        let digest = derive(b"test@example.org", &KEY, &params(Algorithm::Pbkdf2Sha256), 32)
            .expect("derivation failed");
        assert_eq!(STANDARD.encode(digest), "Ltdx3uvWmIH4CZktGiLvqXT3LpIozHnANx2DVjDznbQ=");
    }

    #[test]
    fn test_pbkdf2_truncated_size() {
        let digest = derive(b"test@example.org", &KEY, &params(Algorithm::Pbkdf2Sha256), 16)
            .expect("derivation failed");
        assert_eq!(STANDARD.encode(digest), "Ltdx3uvWmIH4CZktGiLvqQ==");
    }

    #[test]
    fn test_scrypt_known_vector() {
        let digest = derive(b"test@example.org", &KEY, &params(Algorithm::Scrypt), 32)
            .expect("derivation failed");
        assert_eq!(STANDARD.encode(digest), "/FwWUiiuFS7r+0RYoTErG8oHTsuLDL9mw4Q+XoKVgWA=");
    }

    #[test]
    fn test_argon2id_known_vector() {
        let digest = derive(b"test@example.org", &KEY, &params(Algorithm::Argon2id), 32)
            .expect("derivation failed");
        assert_eq!(STANDARD.encode(digest), "ZiRAfWrzf5AGSw7uGMzazrlUEj2J7J9TMs5QL7jt0p0=");
    }

    #[test]
    fn test_argon2i_known_vector() {
        let digest = derive(b"test@example.org", &KEY, &params(Algorithm::Argon2i), 32)
            .expect("derivation failed");
        assert_eq!(STANDARD.encode(digest), "hZRov21bj9Z98IPLngxs1r6WqcLfMczgdAZUObGWHK8=");
    }

    #[test]
    fn test_argon2_deterministic() {
        for algorithm in [Algorithm::Argon2i, Algorithm::Argon2id] {
            let p = params(algorithm);
            let first = derive(b"value", &KEY, &p, 32).expect("derivation failed");
            let second = derive(b"value", &KEY, &p, 32).expect("derivation failed");
            assert_eq!(first, second);
            assert_eq!(first.len(), 32);
        }
    }

    #[test]
    fn test_argon2id_sizes() {
        let p = params(Algorithm::Argon2id);
        for size in [4, 16, 32] {
            let digest = derive(b"value", &KEY, &p, size).expect("derivation failed");
            assert_eq!(digest.len(), size);
        }
    }

    #[test]
    fn test_argon2i_requires_32_bytes() {
        let result = derive(b"value", &KEY, &params(Algorithm::Argon2i), 16);
        assert!(matches!(result, Err(Error::InvalidSize { size: 16, .. })));
    }

    #[test]
    fn test_argon2id_rejects_tiny_size() {
        let result = derive(b"value", &KEY, &params(Algorithm::Argon2id), 3);
        assert!(matches!(result, Err(Error::InvalidSize { size: 3, .. })));
    }

    #[test]
    fn test_size_bounds() {
        for algorithm in [Algorithm::Pbkdf2Sha256, Algorithm::Scrypt, Algorithm::Argon2id] {
            assert!(matches!(validate_size(algorithm, 0), Err(Error::InvalidSize { .. })));
            assert!(matches!(validate_size(algorithm, 33), Err(Error::InvalidSize { .. })));
        }
        assert!(validate_size(Algorithm::Pbkdf2Sha256, 1).is_ok());
        assert!(validate_size(Algorithm::Scrypt, 1).is_ok());
    }

    #[test]
    fn test_argon2_cost_bounds() {
        for algorithm in [Algorithm::Argon2i, Algorithm::Argon2id] {
            let result = KdfParams::new(algorithm, &Cost::new().with_t(2));
            assert!(matches!(
                result,
                Err(Error::InvalidCostParameter { param: "t", value: 2, .. })
            ));
            assert!(KdfParams::new(algorithm, &Cost::new().with_t(3)).is_ok());
            assert!(KdfParams::new(algorithm, &Cost::new().with_t(11)).is_err());

            assert!(KdfParams::new(algorithm, &Cost::new().with_m(2)).is_err());
            assert!(KdfParams::new(algorithm, &Cost::new().with_m(3)).is_ok());
            assert!(KdfParams::new(algorithm, &Cost::new().with_m(22)).is_ok());
            assert!(matches!(
                KdfParams::new(algorithm, &Cost::new().with_m(23)),
                Err(Error::InvalidCostParameter { param: "m", .. })
            ));
        }
    }

    #[test]
    fn test_derive_rechecks_bounds() {
        let cases = [
            KdfParams(Params::Argon2id { t: 1, m: 12 }),
            KdfParams(Params::Argon2i { t: 3, m: 40 }),
            KdfParams(Params::Argon2id { t: 3, m: 32 }),
            KdfParams(Params::Pbkdf2Sha256 { iterations: 0 }),
            KdfParams(Params::Scrypt { log_n: 64, r: 8, p: 1 }),
            KdfParams(Params::Scrypt { log_n: 0, r: 8, p: 1 }),
            KdfParams(Params::Scrypt { log_n: 10, r: 0, p: 1 }),
        ];
        for params in cases {
            let result = derive(b"value", &KEY, &params, 32);
            assert!(
                matches!(result, Err(Error::InvalidCostParameter { .. })),
                "{params:?} accepted"
            );
        }
    }

    #[test]
    fn test_resolved_cost() {
        assert_eq!(
            params(Algorithm::Argon2id).cost(),
            Cost::new().with_t(DEFAULT_ARGON2_T).with_m(DEFAULT_ARGON2_M)
        );
        assert_eq!(
            params(Algorithm::Pbkdf2Sha256).cost(),
            Cost::new().with_iterations(DEFAULT_PBKDF2_ITERATIONS)
        );
    }

    #[test]
    fn test_pbkdf2_zero_iterations() {
        let result = KdfParams::new(Algorithm::Pbkdf2Sha256, &Cost::new().with_iterations(0));
        assert!(matches!(result, Err(Error::InvalidCostParameter { param: "iterations", .. })));
    }

    #[test]
    fn test_scrypt_params() {
        assert_eq!(params(Algorithm::Scrypt).cost(), Cost::new().with_scrypt(4096, 8, 1));
        let result = KdfParams::new(Algorithm::Scrypt, &Cost::new().with_scrypt(1000, 8, 1));
        assert!(matches!(result, Err(Error::InvalidCostParameter { param: "n", .. })));
        let result = KdfParams::new(Algorithm::Scrypt, &Cost::new().with_scrypt(1024, 0, 1));
        assert!(matches!(result, Err(Error::InvalidCostParameter { param: "r", .. })));
        let result = KdfParams::new(Algorithm::Scrypt, &Cost::new().with_scrypt(1024, 8, 0));
        assert!(matches!(result, Err(Error::InvalidCostParameter { param: "p", .. })));
    }

    #[test]
    fn test_cross_algorithm_distinct() {
        let digests: Vec<Vec<u8>> =
            [Algorithm::Pbkdf2Sha256, Algorithm::Argon2i, Algorithm::Argon2id, Algorithm::Scrypt]
                .into_iter()
                .map(|a| derive(b"value", &KEY, &params(a), 32).expect("derivation failed"))
                .collect();
        for (i, a) in digests.iter().enumerate() {
            for b in &digests[i + 1..] {
                assert_ne!(a, b);
            }
        }
    }

    #[test]
    fn test_cost_changes_digest() {
        let low = KdfParams::new(Algorithm::Pbkdf2Sha256, &Cost::new().with_iterations(1)).unwrap();
        let high = params(Algorithm::Pbkdf2Sha256);
        assert_ne!(
            derive(b"value", &KEY, &low, 32).unwrap(),
            derive(b"value", &KEY, &high, 32).unwrap()
        );
    }
}
