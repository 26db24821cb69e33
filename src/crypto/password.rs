use pbkdf2::pbkdf2_hmac;
use sha2::Sha256;
use subtle::ConstantTimeEq;
use zeroize::Zeroize;

use crate::models::PasswordCredential;

pub const HASH_LENGTH: usize = 32;
pub const SALT_LENGTH: usize = 32;

/// Minimum accepted password length, in characters.
pub const MIN_PASSWORD_LENGTH: usize = 8;

/// Generate a cryptographically random salt
pub fn generate_salt() -> [u8; SALT_LENGTH] {
    use rand::RngCore;
    let mut salt = [0u8; SALT_LENGTH];
    rand::thread_rng().fill_bytes(&mut salt);
    salt
}

fn derive(password: &[u8], salt: &[u8], iterations: u32) -> [u8; HASH_LENGTH] {
    let mut out = [0u8; HASH_LENGTH];
    pbkdf2_hmac::<Sha256>(password, salt, iterations, &mut out);
    out
}

/// Hash a password with PBKDF2-SHA256 and a fresh salt. The caller's
/// copy of the password is wiped.
pub fn hash_password(mut password: String, iterations: u32) -> PasswordCredential {
    let salt = generate_salt();
    let hash = derive(password.as_bytes(), &salt, iterations);
    password.zeroize();
    PasswordCredential {
        hash: hash.to_vec(),
        salt: salt.to_vec(),
        iterations,
    }
}

/// Constant-time check of a password against stored credentials.
pub fn verify_password(mut password: String, credential: &PasswordCredential) -> bool {
    let mut candidate = derive(password.as_bytes(), &credential.salt, credential.iterations);
    password.zeroize();
    let matches: bool = candidate.as_slice().ct_eq(credential.hash.as_slice()).into();
    candidate.zeroize();
    matches
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn correct_password_verifies() {
        let cred = hash_password("correct horse".into(), 1000);
        assert_eq!(cred.hash.len(), HASH_LENGTH);
        assert_eq!(cred.salt.len(), SALT_LENGTH);
        assert!(verify_password("correct horse".into(), &cred));
    }

    #[test]
    fn wrong_password_rejected() {
        let cred = hash_password("correct horse".into(), 1000);
        assert!(!verify_password("battery staple".into(), &cred));
    }

    #[test]
    fn salts_differ_between_hashes() {
        let a = hash_password("same password".into(), 1000);
        let b = hash_password("same password".into(), 1000);
        assert_ne!(a.salt, b.salt);
        assert_ne!(a.hash, b.hash);
    }

    #[test]
    fn iteration_count_is_part_of_credential() {
        let mut cred = hash_password("iterations".into(), 1000);
        cred.iterations = 1001;
        assert!(!verify_password("iterations".into(), &cred));
    }
}
