use chrono::{Datelike, Utc};
use std::collections::HashMap;
use std::env;
use std::path::{Path, PathBuf};

/// Runtime settings, resolved once at startup. Tests build this directly;
/// `from_env` is the production path.
#[derive(Debug, Clone)]
pub struct Config {
    pub data_dir: PathBuf,
    pub roster_path: PathBuf,
    pub scores_path: PathBuf,
    pub env_file: Option<PathBuf>,
    pub year: i32,
    pub port: u16,
    pub admin_user: String,
    pub draw_locked: bool,
    /// Participant name -> salted passphrase hash.
    pub logins: HashMap<String, String>,
}

impl Config {
    pub fn from_env() -> Self {
        let data_dir = resolve_data_dir(
            env::var("DATA_DIR").ok().as_deref(),
            env::var("SCORES_PATH").ok().as_deref(),
            env::var("ENV_FILE").ok().as_deref(),
        );

        let env_file = env::var("ENV_FILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| data_dir.join(".env"));
        // Best effort: a missing env file just means everything comes from the
        // process environment.
        let _ = dotenv::from_path(&env_file);

        let scores_path = env::var("SCORES_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| data_dir.join("scores.json"));
        let roster_path = env::var("ROSTER_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| data_dir.join("roster.json"));

        Self {
            roster_path,
            scores_path,
            env_file: Some(env_file),
            data_dir,
            year: Utc::now().year(),
            port: env::var("PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(3000),
            admin_user: env::var("ADMIN_USER").unwrap_or_default(),
            draw_locked: env::var("DRAW_LOCKED")
                .map(|v| truthy(&v))
                .unwrap_or(false),
            logins: logins_from_vars(env::vars()),
        }
    }
}

/// Writable data directory: `DATA_DIR`, else alongside the score store, else
/// alongside the env file, else the working directory.
fn resolve_data_dir(
    data_dir: Option<&str>,
    scores_path: Option<&str>,
    env_file: Option<&str>,
) -> PathBuf {
    if let Some(dir) = data_dir.filter(|d| !d.is_empty()) {
        return PathBuf::from(dir);
    }
    for file in [scores_path, env_file].into_iter().flatten() {
        if let Some(parent) = Path::new(file).parent() {
            if !parent.as_os_str().is_empty() {
                return parent.to_path_buf();
            }
        }
    }
    env::current_dir().unwrap_or_else(|_| PathBuf::from("."))
}

fn truthy(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

/// Collect `LOGIN_<name>` entries from an environment-shaped iterator.
pub fn logins_from_vars(vars: impl Iterator<Item = (String, String)>) -> HashMap<String, String> {
    vars.filter_map(|(key, value)| {
        key.strip_prefix("LOGIN_")
            .map(|name| (name.to_string(), value))
    })
    .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn data_dir_prefers_explicit_setting() {
        let dir = resolve_data_dir(Some("/data"), Some("/elsewhere/scores.json"), None);
        assert_eq!(dir, PathBuf::from("/data"));
    }

    #[test]
    fn data_dir_falls_back_to_file_parents() {
        let dir = resolve_data_dir(None, Some("/var/santa/scores.json"), None);
        assert_eq!(dir, PathBuf::from("/var/santa"));

        let dir = resolve_data_dir(None, None, Some("/etc/santa/.env"));
        assert_eq!(dir, PathBuf::from("/etc/santa"));
    }

    #[test]
    fn data_dir_defaults_to_cwd() {
        let dir = resolve_data_dir(None, None, None);
        assert_eq!(dir, env::current_dir().unwrap());
    }

    #[test]
    fn login_vars_are_collected_by_prefix() {
        let vars = vec![
            ("LOGIN_ditte".to_string(), "sha256$x$y".to_string()),
            ("PATH".to_string(), "/usr/bin".to_string()),
            ("LOGIN_jimmy".to_string(), "sha256$a$b".to_string()),
        ];
        let logins = logins_from_vars(vars.into_iter());
        assert_eq!(logins.len(), 2);
        assert_eq!(logins["ditte"], "sha256$x$y");
        assert_eq!(logins["jimmy"], "sha256$a$b");
    }

    #[test]
    fn truthy_accepts_common_flag_spellings() {
        assert!(truthy("1"));
        assert!(truthy("true"));
        assert!(truthy(" Yes "));
        assert!(!truthy("0"));
        assert!(!truthy(""));
    }
}
