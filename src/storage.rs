//! Persisted session state. Only the authentication flag, the address and
//! the local ledger are ever written; signers are re-derived on every run.

use crate::{
    error::{
        ChainError,
        Result,
    },
    ledger::LocalBalanceLedger,
};
use alloy::primitives::Address;
use serde::{
    Deserialize,
    Serialize,
    de::DeserializeOwned,
};
use std::{
    fs,
    io::Write,
    path::{
        Path,
        PathBuf,
    },
    sync::{
        Arc,
        Mutex,
    },
};

const AUTH_FILE: &str = "local-storage.json";
const WALLET_STORE_FILE: &str = "wallet-storage.json";

/// Flag and address kept under the `isAuthenticated` / `userAddress` keys.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistedAuth {
    #[serde(rename = "isAuthenticated", default)]
    pub is_authenticated: bool,
    #[serde(rename = "userAddress", default, skip_serializing_if = "Option::is_none")]
    pub user_address: Option<Address>,
}

impl PersistedAuth {
    pub fn signed_in(address: Address) -> Self {
        Self {
            is_authenticated: true,
            user_address: Some(address),
        }
    }
}

pub trait SessionStorage: Send + Sync {
    /// Missing state reads as signed out.
    fn load_auth(&self) -> Result<PersistedAuth>;
    fn save_auth(&self, auth: &PersistedAuth) -> Result<()>;
    fn clear_auth(&self) -> Result<()>;

    fn load_ledger(&self) -> Result<Option<LocalBalanceLedger>>;
    fn save_ledger(&self, ledger: &LocalBalanceLedger) -> Result<()>;
    fn clear_ledger(&self) -> Result<()>;
}

/// JSON files in a state directory, shared by every process pointed at it.
#[derive(Clone, Debug)]
pub struct FileSessionStorage {
    dir: PathBuf,
}

impl FileSessionStorage {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn default_dir() -> Result<PathBuf> {
        let home = std::env::var("HOME").map_err(|_| {
            ChainError::Storage(String::from("HOME environment variable not set"))
        })?;
        Ok(PathBuf::from(home).join(".dashmetrics").join("state"))
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn read<T: DeserializeOwned>(&self, file: &str) -> Result<Option<T>> {
        let path = self.dir.join(file);
        if !path.exists() {
            return Ok(None);
        }
        let contents = fs::read_to_string(&path).map_err(|e| {
            ChainError::Storage(format!("Failed to read {}: {e}", path.display()))
        })?;
        if contents.trim().is_empty() {
            return Ok(None);
        }
        let value = serde_json::from_str(&contents).map_err(|e| {
            ChainError::Storage(format!("Failed to parse {}: {e}", path.display()))
        })?;
        Ok(Some(value))
    }

    fn write<T: Serialize>(&self, file: &str, value: &T) -> Result<()> {
        fs::create_dir_all(&self.dir).map_err(|e| {
            ChainError::Storage(format!("Failed to create {}: {e}", self.dir.display()))
        })?;
        let path = self.dir.join(file);
        let json = serde_json::to_string_pretty(value)
            .map_err(|e| ChainError::Storage(format!("Failed to serialize state: {e}")))?;
        let mut handle = fs::File::create(&path).map_err(|e| {
            ChainError::Storage(format!("Failed to open {}: {e}", path.display()))
        })?;
        handle.write_all(json.as_bytes()).map_err(|e| {
            ChainError::Storage(format!("Failed to write {}: {e}", path.display()))
        })?;
        Ok(())
    }

    fn remove(&self, file: &str) -> Result<()> {
        let path = self.dir.join(file);
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(ChainError::Storage(format!(
                "Failed to remove {}: {e}",
                path.display()
            ))),
        }
    }
}

impl SessionStorage for FileSessionStorage {
    fn load_auth(&self) -> Result<PersistedAuth> {
        Ok(self.read(AUTH_FILE)?.unwrap_or_default())
    }

    fn save_auth(&self, auth: &PersistedAuth) -> Result<()> {
        self.write(AUTH_FILE, auth)
    }

    fn clear_auth(&self) -> Result<()> {
        self.remove(AUTH_FILE)
    }

    fn load_ledger(&self) -> Result<Option<LocalBalanceLedger>> {
        self.read(WALLET_STORE_FILE)
    }

    fn save_ledger(&self, ledger: &LocalBalanceLedger) -> Result<()> {
        self.write(WALLET_STORE_FILE, ledger)
    }

    fn clear_ledger(&self) -> Result<()> {
        self.remove(WALLET_STORE_FILE)
    }
}

#[derive(Default)]
struct MemoryState {
    auth: PersistedAuth,
    ledger: Option<LocalBalanceLedger>,
}

/// Storage that lives as long as the process. Clones share state, which is
/// how tests simulate a second tab.
#[derive(Clone, Default)]
pub struct InMemorySessionStorage {
    state: Arc<Mutex<MemoryState>>,
}

impl InMemorySessionStorage {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_state<T>(&self, f: impl FnOnce(&mut MemoryState) -> T) -> Result<T> {
        let mut guard = self
            .state
            .lock()
            .map_err(|_| ChainError::Storage(String::from("session storage lock poisoned")))?;
        Ok(f(&mut guard))
    }
}

impl SessionStorage for InMemorySessionStorage {
    fn load_auth(&self) -> Result<PersistedAuth> {
        self.with_state(|s| s.auth.clone())
    }

    fn save_auth(&self, auth: &PersistedAuth) -> Result<()> {
        self.with_state(|s| s.auth = auth.clone())
    }

    fn clear_auth(&self) -> Result<()> {
        self.with_state(|s| s.auth = PersistedAuth::default())
    }

    fn load_ledger(&self) -> Result<Option<LocalBalanceLedger>> {
        self.with_state(|s| s.ledger.clone())
    }

    fn save_ledger(&self, ledger: &LocalBalanceLedger) -> Result<()> {
        self.with_state(|s| s.ledger = Some(ledger.clone()))
    }

    fn clear_ledger(&self) -> Result<()> {
        self.with_state(|s| s.ledger = None)
    }
}
