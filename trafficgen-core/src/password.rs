//! Password hashing for account creation.
//!
//! Accounts are created with PBKDF2-HMAC-SHA256 hashes. The algorithm string
//! carries its own parameters (`PBKDF2WithHmacSHA256:<iterations>:<bits>`) so a
//! stored hash can be verified without out-of-band configuration.

use serde::{Deserialize, Serialize};
use sha2::Sha256;

/// Algorithm family name used in the algorithm string.
pub const PBKDF2_HMAC_SHA256: &str = "PBKDF2WithHmacSHA256";
/// Default iteration count.
pub const DEFAULT_ITERATIONS: u32 = 10_000;
/// Default derived key length in bytes.
pub const DEFAULT_KEY_LENGTH: usize = 32;
/// Salt length in bytes.
pub const SALT_LENGTH: usize = 16;

/// Errors raised while hashing or verifying passwords.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HashingError {
    #[error("Cannot hash an empty password")]
    EmptyPassword,

    #[error("Unsupported password algorithm: {algorithm}")]
    UnsupportedAlgorithm { algorithm: String },

    #[error("Invalid hashing parameters: {reason}")]
    InvalidParameters { reason: String },

    #[error("Malformed password hash: {reason}")]
    MalformedHash { reason: String },

    #[error("Hashing task was cancelled")]
    Cancelled,
}

/// Hashed password as sent to the account service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PasswordHash {
    /// Algorithm and parameters, e.g. `PBKDF2WithHmacSHA256:10000:256`
    pub algorithm: String,
    /// Upper-case hex of the derived key
    pub hash: String,
    /// Upper-case hex of the salt
    pub salt: String,
}

impl PasswordHash {
    /// Checks `plaintext` against this hash.
    ///
    /// # Errors
    ///
    /// - `HashingError::UnsupportedAlgorithm` - If the algorithm is not PBKDF2-HMAC-SHA256
    /// - `HashingError::MalformedHash` - If parameters, hash or salt cannot be decoded
    pub fn verify(&self, plaintext: &str) -> Result<bool, HashingError> {
        let hasher = Pbkdf2Hasher::from_algorithm(&self.algorithm)?;
        let salt = hex::decode(&self.salt).map_err(|e| HashingError::MalformedHash {
            reason: format!("salt is not hex: {e}"),
        })?;
        let expected = hex::decode(&self.hash).map_err(|e| HashingError::MalformedHash {
            reason: format!("hash is not hex: {e}"),
        })?;
        if expected.len() != hasher.key_length {
            return Err(HashingError::MalformedHash {
                reason: format!(
                    "hash is {} bytes, algorithm declares {}",
                    expected.len(),
                    hasher.key_length
                ),
            });
        }

        Ok(hasher.derive(plaintext.as_bytes(), &salt) == expected)
    }
}

/// Produces password hashes for account creation.
pub trait PasswordHasher: Send + Sync {
    /// Hashes `plaintext` with a fresh salt.
    ///
    /// # Errors
    ///
    /// - `HashingError` - If the password cannot be hashed
    fn hash(&self, plaintext: &str) -> Result<PasswordHash, HashingError>;
}

/// PBKDF2-HMAC-SHA256 hasher.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pbkdf2Hasher {
    iterations: u32,
    key_length: usize,
}

impl Default for Pbkdf2Hasher {
    fn default() -> Self {
        Self {
            iterations: DEFAULT_ITERATIONS,
            key_length: DEFAULT_KEY_LENGTH,
        }
    }
}

impl Pbkdf2Hasher {
    /// Creates a hasher with explicit parameters.
    ///
    /// # Errors
    ///
    /// - `HashingError::InvalidParameters` - If iterations or key length is zero
    pub fn new(iterations: u32, key_length: usize) -> Result<Self, HashingError> {
        if iterations == 0 {
            return Err(HashingError::InvalidParameters {
                reason: "iteration count must be positive".to_string(),
            });
        }
        if key_length == 0 {
            return Err(HashingError::InvalidParameters {
                reason: "key length must be positive".to_string(),
            });
        }
        Ok(Self {
            iterations,
            key_length,
        })
    }

    /// Parses an algorithm string such as `PBKDF2WithHmacSHA256:10000:256`.
    ///
    /// # Errors
    ///
    /// - `HashingError::UnsupportedAlgorithm` - If the family is not PBKDF2-HMAC-SHA256
    /// - `HashingError::MalformedHash` - If the parameters are missing or not numbers
    pub fn from_algorithm(algorithm: &str) -> Result<Self, HashingError> {
        let mut parts = algorithm.split(':');
        let family = parts.next().unwrap_or_default();
        if family != PBKDF2_HMAC_SHA256 {
            return Err(HashingError::UnsupportedAlgorithm {
                algorithm: algorithm.to_string(),
            });
        }

        let (Some(iterations), Some(bits), None) = (parts.next(), parts.next(), parts.next())
        else {
            return Err(HashingError::MalformedHash {
                reason: format!("expected {PBKDF2_HMAC_SHA256}:<iterations>:<bits>, got {algorithm}"),
            });
        };
        let iterations: u32 = iterations.parse().map_err(|_| HashingError::MalformedHash {
            reason: format!("invalid iteration count {iterations}"),
        })?;
        let bits: usize = bits.parse().map_err(|_| HashingError::MalformedHash {
            reason: format!("invalid key length {bits}"),
        })?;
        if bits % 8 != 0 {
            return Err(HashingError::MalformedHash {
                reason: format!("key length {bits} is not a whole number of bytes"),
            });
        }

        Self::new(iterations, bits / 8).map_err(|e| HashingError::MalformedHash {
            reason: e.to_string(),
        })
    }

    /// Algorithm string describing this hasher.
    pub fn algorithm(&self) -> String {
        format!(
            "{PBKDF2_HMAC_SHA256}:{}:{}",
            self.iterations,
            self.key_length * 8
        )
    }

    /// Hashes `plaintext` with a caller-provided salt.
    ///
    /// # Errors
    ///
    /// - `HashingError::EmptyPassword` - If `plaintext` is empty
    pub fn hash_with_salt(&self, plaintext: &str, salt: &[u8]) -> Result<PasswordHash, HashingError> {
        if plaintext.is_empty() {
            return Err(HashingError::EmptyPassword);
        }
        let key = self.derive(plaintext.as_bytes(), salt);
        Ok(PasswordHash {
            algorithm: self.algorithm(),
            hash: hex::encode_upper(key),
            salt: hex::encode_upper(salt),
        })
    }

    fn derive(&self, password: &[u8], salt: &[u8]) -> Vec<u8> {
        let mut key = vec![0u8; self.key_length];
        pbkdf2::pbkdf2_hmac::<Sha256>(password, salt, self.iterations, &mut key);
        key
    }
}

impl PasswordHasher for Pbkdf2Hasher {
    fn hash(&self, plaintext: &str) -> Result<PasswordHash, HashingError> {
        let salt: [u8; SALT_LENGTH] = rand::random();
        self.hash_with_salt(plaintext, &salt)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fast_hasher() -> Pbkdf2Hasher {
        Pbkdf2Hasher::new(16, DEFAULT_KEY_LENGTH).unwrap()
    }

    #[test]
    fn test_default_algorithm_string() {
        assert_eq!(
            Pbkdf2Hasher::default().algorithm(),
            "PBKDF2WithHmacSHA256:10000:256"
        );
    }

    #[test]
    fn test_known_vector() {
        // RFC 7914 section 11, PBKDF2-HMAC-SHA256 with c=1.
        let hasher = Pbkdf2Hasher::new(1, 64).unwrap();
        let hash = hasher.hash_with_salt("passwd", b"salt").unwrap();
        assert_eq!(
            hash.hash,
            "55AC046E56E3089FEC1691C22544B605F94185216DDE0465E68B9D57C20DACBC\
             49CA9CCCF179B645991664B39D77EF317C71B845B1E30BD509112041D3A19783"
        );
        assert_eq!(hash.salt, "73616C74");
    }

    #[test]
    fn test_hash_then_verify() {
        let hasher = fast_hasher();
        let hash = hasher.hash("pw1").unwrap();

        assert!(hash.verify("pw1").unwrap());
        assert!(!hash.verify("pw2").unwrap());
    }

    #[test]
    fn test_salts_differ_between_calls() {
        let hasher = fast_hasher();
        let first = hasher.hash("pw1").unwrap();
        let second = hasher.hash("pw1").unwrap();
        assert_ne!(first.salt, second.salt);
        assert_ne!(first.hash, second.hash);
    }

    #[test]
    fn test_empty_password_rejected() {
        assert_eq!(fast_hasher().hash(""), Err(HashingError::EmptyPassword));
    }

    #[test]
    fn test_invalid_parameters_rejected() {
        assert!(matches!(
            Pbkdf2Hasher::new(0, 32),
            Err(HashingError::InvalidParameters { .. })
        ));
        assert!(matches!(
            Pbkdf2Hasher::new(10, 0),
            Err(HashingError::InvalidParameters { .. })
        ));
    }

    #[test]
    fn test_from_algorithm_round_trips_parameters() {
        let hasher = Pbkdf2Hasher::new(1234, 16).unwrap();
        assert_eq!(Pbkdf2Hasher::from_algorithm(&hasher.algorithm()).unwrap(), hasher);
    }

    #[test]
    fn test_from_algorithm_rejects_other_families() {
        assert!(matches!(
            Pbkdf2Hasher::from_algorithm("BCRYPT:10"),
            Err(HashingError::UnsupportedAlgorithm { .. })
        ));
        assert!(matches!(
            Pbkdf2Hasher::from_algorithm("PBKDF2WithHmacSHA256:many:256"),
            Err(HashingError::MalformedHash { .. })
        ));
        assert!(matches!(
            Pbkdf2Hasher::from_algorithm("PBKDF2WithHmacSHA256:10"),
            Err(HashingError::MalformedHash { .. })
        ));
    }

    #[test]
    fn test_verify_rejects_corrupt_hash() {
        let mut hash = fast_hasher().hash("pw1").unwrap();
        hash.hash.truncate(10);
        assert!(matches!(
            hash.verify("pw1"),
            Err(HashingError::MalformedHash { .. })
        ));
    }
}
