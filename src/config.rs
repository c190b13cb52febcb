//! Connection configuration and session-key persistence.
//!
//! Configuration is an explicit value handed to the session constructor;
//! there is no ambient settings lookup. Changing any field is expected to
//! go through [`crate::session::Session::apply_config`], which forces a
//! reconnect.

use std::fs;
use std::path::PathBuf;
use std::sync::Mutex;

use serde::{Deserialize, Serialize};

/// Server host used when none is configured.
pub const DEFAULT_HOST: &str = "localhost";
/// Server port used when none is configured.
pub const DEFAULT_PORT: u16 = 80;
/// Path below the server root used when none is configured.
pub const DEFAULT_PATH: &str = "";

/// Connection settings for the controller server.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct Config {
    /// Server host name or address.
    pub host: String,
    /// Server port.
    pub port: u16,
    /// Path below the server root, without a leading slash.
    pub path: String,
    /// Use TLS (`wss`) instead of plain `ws`.
    pub secure: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            path: DEFAULT_PATH.to_string(),
            secure: false,
        }
    }
}

impl Config {
    /// Composes the websocket endpoint URL.
    ///
    /// The port segment is omitted when it equals the scheme default (80
    /// for `ws`, 443 for `wss`) and the path segment is omitted when empty.
    #[must_use]
    pub fn ws_url(&self) -> String {
        use std::fmt::Write;

        let scheme = if self.secure { "wss" } else { "ws" };
        let default_port = if self.secure { 443 } else { 80 };

        let mut url = format!("{scheme}://{}", self.host.trim());
        if self.port != default_port {
            let _ = write!(url, ":{}", self.port);
        }
        let path = self.path.trim().trim_start_matches('/');
        if !path.is_empty() {
            let _ = write!(url, "/{path}");
        }

        url
    }
}

/// Persistence for the server-issued session key.
///
/// The session reads the stored key when connecting and writes a new one
/// after a successful handshake that returned a different key. It never
/// caches the key beyond the current connect attempt.
pub trait SessionKeyStore: Send + Sync {
    fn load(&self) -> Option<String>;
    fn store(&self, key: &str);
}

/// In-memory key store, mainly for tests and ephemeral runs.
#[derive(Default)]
pub struct MemoryKeyStore {
    key: Mutex<Option<String>>,
}

impl SessionKeyStore for MemoryKeyStore {
    fn load(&self) -> Option<String> {
        match self.key.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    fn store(&self, key: &str) {
        let mut guard = match self.key.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        *guard = Some(key.to_string());
    }
}

/// On-disk serialization of [`FileKeyStore`].
#[derive(Default, Serialize, Deserialize)]
struct StoredKeys {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    session_key: Option<String>,
}

/// Key store backed by a small TOML file.
pub struct FileKeyStore {
    path: PathBuf,
}

impl FileKeyStore {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl SessionKeyStore for FileKeyStore {
    fn load(&self) -> Option<String> {
        let contents = fs::read_to_string(&self.path).ok()?;
        match toml::from_str::<StoredKeys>(&contents) {
            Ok(keys) => keys.session_key,
            Err(e) => {
                warn!("ignoring unreadable key file {}: {e}", self.path.display());
                None
            }
        }
    }

    fn store(&self, key: &str) {
        let keys = StoredKeys {
            session_key: Some(key.to_string()),
        };
        match toml::to_string(&keys) {
            Ok(contents) => {
                if let Err(e) = fs::write(&self.path, contents) {
                    warn!("could not persist session key: {e}");
                }
            }
            Err(e) => warn!("could not serialize session key: {e}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn url_omits_scheme_default_port() {
        let config = Config {
            host: "example.com".to_string(),
            port: 80,
            path: String::new(),
            secure: false,
        };
        assert_eq!(config.ws_url(), "ws://example.com");

        let config = Config {
            port: 443,
            secure: true,
            ..config
        };
        assert_eq!(config.ws_url(), "wss://example.com");
    }

    #[test]
    fn url_keeps_non_default_port_and_path() {
        let config = Config {
            host: "example.com".to_string(),
            port: 443,
            path: "/ws".to_string(),
            secure: false,
        };
        // 443 is not the ws default, so it stays.
        assert_eq!(config.ws_url(), "ws://example.com:443/ws");

        let config = Config {
            port: 8080,
            secure: true,
            path: "bridge/ws".to_string(),
            ..config
        };
        assert_eq!(config.ws_url(), "wss://example.com:8080/bridge/ws");
    }

    #[test]
    fn url_trims_whitespace_and_leading_slashes() {
        let config = Config {
            host: " example.com ".to_string(),
            port: 80,
            path: "//ws".to_string(),
            secure: false,
        };
        assert_eq!(config.ws_url(), "ws://example.com/ws");
    }

    #[test]
    fn composed_urls_parse() {
        for config in [
            Config::default(),
            Config {
                host: "10.0.0.2".to_string(),
                port: 9100,
                path: "ws".to_string(),
                secure: true,
            },
        ] {
            assert!(url::Url::parse(&config.ws_url()).is_ok());
        }
    }

    #[test]
    fn memory_store_round_trips() {
        let store = MemoryKeyStore::default();
        assert_eq!(store.load(), None);
        store.store("abc");
        assert_eq!(store.load(), Some("abc".to_string()));
        store.store("def");
        assert_eq!(store.load(), Some("def".to_string()));
    }

    #[test]
    fn file_store_round_trips() {
        let path = std::env::temp_dir().join(format!(
            "remote-bridge-keys-{}-{:?}.toml",
            std::process::id(),
            std::thread::current().id()
        ));
        let store = FileKeyStore::new(path.clone());

        assert_eq!(store.load(), None);
        store.store("channel-key-1");
        assert_eq!(store.load(), Some("channel-key-1".to_string()));

        let _ = fs::remove_file(&path);
    }
}
