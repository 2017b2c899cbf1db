//! SHA-512 crypt hashing for the mailbox agent's credential database.
//!
//! Values that already carry the `$6$` scheme prefix are treated as hashed and
//! passed through untouched, so regenerating the database from a config that
//! mixes plaintext and hashed passwords is idempotent.

use sha_crypt::{sha512_check, sha512_simple, Sha512Params};

use crate::error::CoreError;

/// Scheme prefix emitted by SHA-512 crypt.
pub const SHA512_CRYPT_PREFIX: &str = "$6$";

/// `true` if `value` is already a SHA-512 crypt hash.
pub fn is_hashed(value: &str) -> bool {
    value.starts_with(SHA512_CRYPT_PREFIX)
}

/// Hash a plaintext password with a fresh random salt.
pub fn hash_password(plain: &str) -> Result<String, CoreError> {
    sha512_simple(plain, &Sha512Params::default())
        .map_err(|err| CoreError::PasswordHash(format!("{err:?}")))
}

/// Return `value` unchanged when already hashed, otherwise hash it.
pub fn ensure_hashed(value: &str) -> Result<String, CoreError> {
    if is_hashed(value) {
        return Ok(value.to_string());
    }
    hash_password(value)
}

/// Check `plain` against a SHA-512 crypt `hash`.
pub fn verify_password(plain: &str, hash: &str) -> bool {
    sha512_check(plain, hash).is_ok()
}
