use crate::{
    chain::SigningClient,
    error::{
        ChainError,
        Result,
    },
    rpc::RpcClient,
};
use alloy::{
    primitives::Address,
    signers::local::{
        MnemonicBuilder,
        PrivateKeySigner,
        coins_bip39::English,
    },
};
use eth_keystore::decrypt_key;
use rpassword::prompt_password;
use std::{
    fs,
    future::Future,
    path::{
        Path,
        PathBuf,
    },
    sync::{
        Arc,
        Mutex,
    },
};
use tracing::{
    debug,
    info,
};

pub const WALLET_PASSWORD_ENV: &str = "DASHMETRICS_WALLET_PASSWORD";
const WALLET_EXTENSION: &str = "wallet";

/// The user's wallet: the only thing able to grant account access and
/// hand out a signer.
pub trait WalletExtension: Send + Sync {
    type Signer: SigningClient;

    /// Whether a wallet is installed at all. Must not prompt the user.
    fn is_available(&self) -> bool;

    /// Ask the user to grant access; returns the accounts exposed.
    fn request_accounts(&self) -> impl Future<Output = Result<Vec<Address>>> + Send;

    /// Derive a live signer for the granted account.
    fn signer(&self) -> impl Future<Output = Result<Self::Signer>> + Send;
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WalletDescriptor {
    pub name: String,
    pub path: PathBuf,
}

impl WalletDescriptor {
    pub fn new(name: impl Into<String>, path: PathBuf) -> Self {
        Self {
            name: name.into(),
            path,
        }
    }
}

pub fn default_wallet_dir() -> Result<PathBuf> {
    let home = std::env::var("HOME")
        .map_err(|_| ChainError::Storage(String::from("HOME environment variable not set")))?;
    Ok(PathBuf::from(home).join(".dashmetrics").join("wallets"))
}

pub fn resolve_wallet_dir(dir: Option<&str>) -> Result<PathBuf> {
    match dir {
        Some(raw) => {
            let expanded = shellexpand::tilde(raw);
            Ok(PathBuf::from(expanded.into_owned()))
        }
        None => default_wallet_dir(),
    }
}

pub fn list_wallets(dir: &Path) -> Result<Vec<WalletDescriptor>> {
    if !dir.exists() {
        return Ok(Vec::new());
    }
    let read_err = |e: std::io::Error| {
        ChainError::Storage(format!("Failed to read wallet directory {}: {e}", dir.display()))
    };
    let mut wallets = Vec::new();
    for entry in fs::read_dir(dir).map_err(read_err)? {
        let path = entry.map_err(read_err)?.path();
        if !path.is_file() {
            continue;
        }
        if path.extension().and_then(|ext| ext.to_str()) != Some(WALLET_EXTENSION) {
            continue;
        }
        let Some(name) = path.file_stem().and_then(|stem| stem.to_str()) else {
            continue;
        };
        wallets.push(WalletDescriptor::new(name, path.clone()));
    }
    wallets.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(wallets)
}

pub fn find_wallet(dir: &Path, name: &str) -> Result<Option<WalletDescriptor>> {
    let wallets = list_wallets(dir)?;
    Ok(wallets.into_iter().find(|w| w.name == name))
}

/// Turn decrypted keystore contents into a signer. Raw 32-byte keys are
/// tried first, then BIP-39 phrases.
pub fn signer_from_secret(name: &str, secret: &[u8]) -> Result<PrivateKeySigner> {
    if let Ok(signer) = PrivateKeySigner::from_slice(secret) {
        return Ok(signer);
    }

    if let Ok(mnemonic) = std::str::from_utf8(secret) {
        let word_count = mnemonic.split_whitespace().count();
        if word_count >= 12 {
            return MnemonicBuilder::<English>::default()
                .phrase(mnemonic.trim())
                .build()
                .map_err(|e| {
                    ChainError::Storage(format!("Wallet '{name}' has an invalid mnemonic: {e}"))
                });
        }
    }

    Err(ChainError::Storage(format!(
        "Wallet '{name}' contained unsupported key material"
    )))
}

#[derive(Clone, Debug)]
pub enum PasswordSource {
    /// Ask on the terminal.
    Prompt,
    Fixed(String),
}

impl PasswordSource {
    /// Use the password from the environment when set, otherwise prompt.
    pub fn from_env() -> Self {
        match std::env::var(WALLET_PASSWORD_ENV) {
            Ok(password) if !password.is_empty() => PasswordSource::Fixed(password),
            _ => PasswordSource::Prompt,
        }
    }

    fn read(&self, wallet_name: &str) -> Result<String> {
        match self {
            PasswordSource::Fixed(password) => Ok(password.clone()),
            PasswordSource::Prompt => {
                let prompt = format!("Enter password for wallet '{wallet_name}': ");
                prompt_password(prompt).map_err(|e| {
                    ChainError::Storage(format!("Failed to read wallet password: {e}"))
                })
            }
        }
    }
}

/// Wallet backed by an encrypted keystore file on disk.
///
/// The decrypted key lives only in memory for the lifetime of this value;
/// nothing about it is ever written back.
#[derive(Clone)]
pub struct KeystoreWallet {
    descriptor: Option<WalletDescriptor>,
    rpc_url: String,
    password: PasswordSource,
    unlocked: Arc<Mutex<Option<PrivateKeySigner>>>,
}

impl KeystoreWallet {
    pub fn new(
        descriptor: Option<WalletDescriptor>,
        rpc_url: impl Into<String>,
        password: PasswordSource,
    ) -> Self {
        Self {
            descriptor,
            rpc_url: rpc_url.into(),
            password,
            unlocked: Arc::new(Mutex::new(None)),
        }
    }

    /// Locate `name` in `dir`; a missing keystore yields an unavailable wallet
    /// rather than an error so `connect` can report it uniformly.
    pub fn open(
        dir: &Path,
        name: &str,
        rpc_url: impl Into<String>,
        password: PasswordSource,
    ) -> Result<Self> {
        let descriptor = find_wallet(dir, name)?;
        if descriptor.is_none() {
            debug!(wallet = name, dir = %dir.display(), "keystore not found");
        }
        Ok(Self::new(descriptor, rpc_url, password))
    }

    pub fn descriptor(&self) -> Option<&WalletDescriptor> {
        self.descriptor.as_ref()
    }

    fn unlock(&self) -> Result<PrivateKeySigner> {
        let descriptor = self
            .descriptor
            .as_ref()
            .ok_or(ChainError::WalletUnavailable)?;
        let password = self.password.read(&descriptor.name)?;
        let secret = decrypt_key(&descriptor.path, password.as_bytes()).map_err(|_| {
            ChainError::Storage(format!("Invalid password for wallet '{}'", descriptor.name))
        })?;
        signer_from_secret(&descriptor.name, &secret)
    }

    fn unlocked_signer(&self) -> Option<PrivateKeySigner> {
        self.unlocked.lock().ok().and_then(|guard| guard.clone())
    }
}

impl WalletExtension for KeystoreWallet {
    type Signer = RpcClient;

    fn is_available(&self) -> bool {
        self.descriptor
            .as_ref()
            .map(|d| d.path.is_file())
            .unwrap_or(false)
    }

    async fn request_accounts(&self) -> Result<Vec<Address>> {
        if let Some(signer) = self.unlocked_signer() {
            return Ok(vec![signer.address()]);
        }
        let signer = self.unlock()?;
        let address = signer.address();
        if let Ok(mut guard) = self.unlocked.lock() {
            *guard = Some(signer);
        }
        info!(%address, "wallet unlocked");
        Ok(vec![address])
    }

    async fn signer(&self) -> Result<RpcClient> {
        let signer = self
            .unlocked_signer()
            .ok_or(ChainError::WalletNotConnected)?;
        RpcClient::with_signer(&self.rpc_url, signer)
    }
}
