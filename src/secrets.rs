//! Process-wide secret store backing `{{KEY}}` substitution.
//!
//! Secrets are loaded once from a dotenv file and can be updated at runtime;
//! updates are written back to the same file when one is configured.

use std::{
    collections::HashMap,
    fs,
    path::{Path, PathBuf},
    sync::{Arc, PoisonError, RwLock},
};

use tracing::debug;

use crate::{ActchainError, Result, ShareLock};

#[derive(Default)]
pub struct SecretStore {
    secrets: ShareLock<HashMap<String, String>>,
    env_file: Option<PathBuf>,
}

impl SecretStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads every entry of the dotenv file at `path`.
    ///
    /// A missing file yields an empty store bound to that path, so a later
    /// `set` creates it.
    pub fn from_env_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let mut secrets = HashMap::new();

        if path.exists() {
            let iter = dotenvy::from_path_iter(path).map_err(|e| ActchainError::Config(format!("failed to read {:?}: {}", path, e)))?;
            for item in iter {
                let (key, value) = item.map_err(|e| ActchainError::Config(format!("failed to parse {:?}: {}", path, e)))?;
                secrets.insert(key, value);
            }
        }
        debug!("loaded {} secrets from {:?}", secrets.len(), path);

        Ok(Self {
            secrets: Arc::new(RwLock::new(secrets)),
            env_file: Some(path.to_path_buf()),
        })
    }

    /// Builder-style insert that never touches the env file.
    pub fn with(
        self,
        key: &str,
        value: &str,
    ) -> Self {
        self.secrets.write().unwrap_or_else(PoisonError::into_inner).insert(key.to_string(), value.to_string());
        self
    }

    /// Returns the secret for `key`, or an empty string when absent.
    pub fn get(
        &self,
        key: &str,
    ) -> String {
        self.secrets.read().unwrap_or_else(PoisonError::into_inner).get(key).cloned().unwrap_or_default()
    }

    pub fn set(
        &self,
        key: &str,
        value: &str,
    ) -> Result<()> {
        if key.is_empty() || key.contains('=') || key.contains(char::is_whitespace) {
            return Err(ActchainError::Config(format!("invalid secret key '{}'", key)));
        }
        if let Some(path) = &self.env_file {
            write_env_entry(path, key, value)?;
        }
        self.secrets.write().unwrap_or_else(PoisonError::into_inner).insert(key.to_string(), value.to_string());
        Ok(())
    }
}

fn write_env_entry(
    path: &Path,
    key: &str,
    value: &str,
) -> Result<()> {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => String::new(),
        Err(e) => return Err(e.into()),
    };

    let entry = format!("{}={}", key, quote_env_value(value));
    let prefix = format!("{}=", key);
    let mut found = false;
    let mut lines: Vec<String> = content
        .lines()
        .map(|line| {
            if !found && line.starts_with(&prefix) {
                found = true;
                entry.clone()
            } else {
                line.to_string()
            }
        })
        .collect();
    if !found {
        lines.push(entry);
    }

    let mut out = lines.join("\n");
    out.push('\n');
    fs::write(path, out)?;
    Ok(())
}

fn quote_env_value(value: &str) -> String {
    if !value.chars().any(|c| c.is_whitespace() || matches!(c, '#' | '"' | '\'' | '\\' | '$')) {
        value.to_string()
    } else if !value.contains('\'') {
        // single quotes disable escapes and `$` substitution
        format!("'{}'", value)
    } else {
        format!("\"{}\"", value.replace('\\', "\\\\").replace('"', "\\\"").replace('$', "\\$"))
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::SecretStore;

    fn temp_env_path(name: &str) -> std::path::PathBuf {
        std::env::temp_dir().join(format!("actchain-{}-{}.env", name, crate::utils::longid()))
    }

    #[test]
    fn test_missing_key_is_empty() {
        let store = SecretStore::new().with("API_KEY", "secret");
        assert_eq!(store.get("API_KEY"), "secret");
        assert_eq!(store.get("NOPE"), "");
    }

    #[test]
    fn test_load_and_write_back() {
        let path = temp_env_path("load");
        fs::write(&path, "OPENAI_API_KEY=sk-1\nOTHER=x\n").unwrap();

        let store = SecretStore::from_env_file(&path).unwrap();
        assert_eq!(store.get("OPENAI_API_KEY"), "sk-1");

        store.set("OPENAI_API_KEY", "sk-2").unwrap();
        store.set("NEW_KEY", "hello world").unwrap();
        assert_eq!(store.get("OPENAI_API_KEY"), "sk-2");

        let reloaded = SecretStore::from_env_file(&path).unwrap();
        assert_eq!(reloaded.get("OPENAI_API_KEY"), "sk-2");
        assert_eq!(reloaded.get("OTHER"), "x");
        assert_eq!(reloaded.get("NEW_KEY"), "hello world");

        let _ = fs::remove_file(&path);
    }

    #[test]
    fn test_missing_file_is_created_on_set() {
        let path = temp_env_path("create");
        let store = SecretStore::from_env_file(&path).unwrap();
        assert_eq!(store.get("A"), "");

        store.set("A", "1").unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "A=1\n");

        let _ = fs::remove_file(&path);
    }

    #[test]
    fn test_rejects_invalid_key() {
        let store = SecretStore::new();
        assert!(store.set("", "v").is_err());
        assert!(store.set("A=B", "v").is_err());
    }
}
