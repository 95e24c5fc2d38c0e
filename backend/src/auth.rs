use rand::distributions::Alphanumeric;
use rand::{thread_rng, Rng};
use sha2::{Digest, Sha256};
use std::io;
use std::path::Path;

const SCHEME: &str = "sha256";
const SALT_LEN: usize = 16;

/// Hash a login passphrase as `sha256$<salt>$<hex digest>`.
pub fn hash_passphrase(phrase: &str) -> String {
    let salt: String = thread_rng()
        .sample_iter(&Alphanumeric)
        .take(SALT_LEN)
        .map(char::from)
        .collect();
    format!("{SCHEME}${salt}${}", digest_hex(&salt, phrase))
}

/// Check a passphrase against a stored hash. Malformed stored values never
/// verify.
pub fn verify_passphrase(stored: &str, phrase: &str) -> bool {
    let mut parts = stored.splitn(3, '$');
    let (Some(scheme), Some(salt), Some(expected)) = (parts.next(), parts.next(), parts.next())
    else {
        return false;
    };
    scheme == SCHEME && digest_hex(salt, phrase) == expected
}

fn digest_hex(salt: &str, phrase: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(salt.as_bytes());
    hasher.update(phrase.as_bytes());
    hasher
        .finalize()
        .iter()
        .map(|byte| format!("{byte:02x}"))
        .collect()
}

/// Replace (or append) the `LOGIN_<name>` line of the env file so a password
/// change survives a restart.
pub async fn write_login(env_file: &Path, name: &str, hash: &str) -> io::Result<()> {
    let existing = match tokio::fs::read_to_string(env_file).await {
        Ok(text) => text,
        Err(err) if err.kind() == io::ErrorKind::NotFound => String::new(),
        Err(err) => return Err(err),
    };

    let key = format!("LOGIN_{name}=");
    let mut lines: Vec<String> = existing
        .lines()
        .filter(|line| !line.starts_with(&key))
        .map(str::to_string)
        .collect();
    lines.push(format!("{key}{hash}"));

    tokio::fs::write(env_file, lines.join("\n") + "\n").await
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn hash_and_verify_roundtrip() {
        let hash = hash_passphrase("cozy-winter-lantern");
        assert!(hash.starts_with("sha256$"));
        assert!(verify_passphrase(&hash, "cozy-winter-lantern"));
        assert!(!verify_passphrase(&hash, "wrong-passphrase"));
    }

    #[test]
    fn hashes_are_salted() {
        let first = hash_passphrase("same-phrase");
        let second = hash_passphrase("same-phrase");
        assert_ne!(first, second);
        assert!(verify_passphrase(&first, "same-phrase"));
        assert!(verify_passphrase(&second, "same-phrase"));
    }

    #[test]
    fn malformed_stored_values_never_verify() {
        assert!(!verify_passphrase("", "x"));
        assert!(!verify_passphrase("sha256$onlysalt", "x"));
        assert!(!verify_passphrase("md5$salt$digest", "x"));
    }

    #[tokio::test]
    async fn write_login_creates_and_replaces_lines() {
        let path = std::env::temp_dir().join(format!("santa_env_{}.env", Uuid::new_v4()));

        write_login(&path, "emma", "sha256$a$1").await.unwrap();
        write_login(&path, "tommy", "sha256$b$2").await.unwrap();
        let text = tokio::fs::read_to_string(&path).await.unwrap();
        assert!(text.contains("LOGIN_emma=sha256$a$1"));
        assert!(text.contains("LOGIN_tommy=sha256$b$2"));

        // replacing emma keeps a single line for her and leaves tommy alone
        write_login(&path, "emma", "sha256$c$3").await.unwrap();
        let text = tokio::fs::read_to_string(&path).await.unwrap();
        assert_eq!(text.matches("LOGIN_emma=").count(), 1);
        assert!(text.contains("LOGIN_emma=sha256$c$3"));
        assert!(text.contains("LOGIN_tommy=sha256$b$2"));

        let _ = tokio::fs::remove_file(&path).await;
    }
}
