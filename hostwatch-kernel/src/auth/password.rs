//! Hachage bcrypt des mots de passe (sel et coût embarqués dans l'empreinte).
//! `bcrypt::verify` compare à temps constant.

use std::sync::OnceLock;

#[cfg(not(test))]
const COST: u32 = bcrypt::DEFAULT_COST;
#[cfg(test)]
const COST: u32 = 4;

pub fn hash_password(password: &str) -> Result<String, bcrypt::BcryptError> {
    bcrypt::hash(password, COST)
}

/// Empreinte illisible ou mot de passe faux : `false`, sans distinction
pub fn verify_password(password: &str, hash: &str) -> bool {
    bcrypt::verify(password, hash).unwrap_or(false)
}

// Vraie empreinte bcrypt au même coût, calculée une fois
fn dummy_hash() -> Option<&'static str> {
    static DUMMY: OnceLock<Option<String>> = OnceLock::new();
    DUMMY
        .get_or_init(|| bcrypt::hash("hostwatch-unknown-user", COST).ok())
        .as_deref()
}

/// Vérification factice pour un utilisateur inconnu : même coût, échoue toujours
pub fn verify_dummy(password: &str) -> bool {
    if let Some(hash) = dummy_hash() {
        std::hint::black_box(verify_password(password, hash));
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_and_verify() {
        let hash = hash_password("admin123").unwrap();
        assert!(hash.starts_with("$2b$04$"));
        assert!(verify_password("admin123", &hash));
        assert!(!verify_password("wrong", &hash));
    }

    #[test]
    fn test_same_password_different_salt() {
        let a = hash_password("admin123").unwrap();
        let b = hash_password("admin123").unwrap();
        assert_ne!(a, b);
        assert!(verify_password("admin123", &a));
        assert!(verify_password("admin123", &b));
    }

    #[test]
    fn test_malformed_hash_never_verifies() {
        assert!(!verify_password("x", ""));
        assert!(!verify_password("x", "sha256$10000$aa$bb"));
        assert!(!verify_password("x", "$2b$04$tooshort"));
    }

    #[test]
    fn test_dummy_always_fails() {
        assert!(dummy_hash().is_some_and(|h| h.starts_with("$2b$")));
        assert!(!verify_dummy("admin123"));
        assert!(!verify_dummy("hostwatch-unknown-user"));
        assert!(!verify_dummy(""));
    }
}
