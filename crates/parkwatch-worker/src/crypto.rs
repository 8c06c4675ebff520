//! Password hashing for owner accounts.

use std::num::NonZeroU32;

use pbkdf2::pbkdf2_hmac;
use sha2::Sha256;

const OUTPUT_LEN: usize = 32;

/// Server-side PBKDF2-SHA256 iteration count. Not stored alongside the
/// digest, so bumping it requires rehashing accounts on their next login.
pub const PBKDF2_ITERATIONS: u32 = 100_000;

/// Derive the stored password digest from the raw password and a per-user
/// random salt.
pub fn hash_password(password: &[u8], salt: &[u8], iterations: u32) -> Vec<u8> {
    let mut out = vec![0u8; OUTPUT_LEN];
    let iterations = NonZeroU32::new(iterations).expect("Iterations must be non-zero");
    pbkdf2_hmac::<Sha256>(password, salt, iterations.get(), &mut out);
    out
}

pub fn verify_password(password: &[u8], salt: &[u8], expected: &[u8], iterations: u32) -> bool {
    let iterations = NonZeroU32::new(iterations).expect("Iterations must be non-zero");
    if expected.len() != OUTPUT_LEN {
        return false;
    }

    // Derive and constant-time compare.
    let mut out = vec![0u8; OUTPUT_LEN];
    pbkdf2_hmac::<Sha256>(password, salt, iterations.get(), &mut out);
    subtle::ConstantTimeEq::ct_eq(out.as_ref(), expected).into()
}

#[cfg(test)]
mod tests {
    use super::*;

    // Tests run with a small iteration count; the production constant would
    // only slow them down without changing behavior.
    const ITERS: u32 = 1_000;

    #[test]
    fn correct_password_verifies() {
        let digest = hash_password(b"hunter22", b"salt-1", ITERS);
        assert!(verify_password(b"hunter22", b"salt-1", &digest, ITERS));
    }

    #[test]
    fn wrong_password_fails() {
        let digest = hash_password(b"hunter22", b"salt-1", ITERS);
        assert!(!verify_password(b"hunter23", b"salt-1", &digest, ITERS));
    }

    #[test]
    fn wrong_salt_fails() {
        let digest = hash_password(b"hunter22", b"salt-1", ITERS);
        assert!(!verify_password(b"hunter22", b"salt-2", &digest, ITERS));
    }

    #[test]
    fn truncated_digest_fails() {
        let digest = hash_password(b"hunter22", b"salt-1", ITERS);
        assert!(!verify_password(b"hunter22", b"salt-1", &digest[..16], ITERS));
    }
}
