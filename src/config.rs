use crate::{
    error::{
        ChainError,
        Result,
    },
    rpc::parse_rpc_url,
    storage::FileSessionStorage,
    wallets::resolve_wallet_dir,
};
use alloy::primitives::Address;
use deployments::{
    ContractAddresses,
    DeploymentEnv,
    DeploymentRecord,
    DeploymentStore,
};
use std::{
    path::{
        Path,
        PathBuf,
    },
    time::Duration,
};
use tracing::debug;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum NetworkTarget {
    AuroraTestnet,
    Local,
    Custom { url: String },
}

impl NetworkTarget {
    pub fn rpc_url(&self) -> &str {
        match self {
            NetworkTarget::AuroraTestnet => DeploymentEnv::AuroraTestnet.default_rpc_url(),
            NetworkTarget::Local => DeploymentEnv::Local.default_rpc_url(),
            NetworkTarget::Custom { url } => url,
        }
    }

    /// Custom endpoints have no deployment record of their own.
    pub fn deployment_env(&self) -> Option<DeploymentEnv> {
        match self {
            NetworkTarget::AuroraTestnet => Some(DeploymentEnv::AuroraTestnet),
            NetworkTarget::Local => Some(DeploymentEnv::Local),
            NetworkTarget::Custom { .. } => None,
        }
    }
}

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub network: NetworkTarget,
    pub betting_contract: Address,
    pub launchpad_contract: Option<Address>,
    pub wallet_dir: PathBuf,
    pub state_dir: PathBuf,
    pub confirmation_timeout: Option<Duration>,
}

/// Raw settings before defaults and overrides are applied.
#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub rpc_url: Option<String>,
    pub wallet_dir: Option<String>,
    pub state_dir: Option<String>,
    pub deployments_root: Option<PathBuf>,
    pub confirmation_timeout_secs: Option<u64>,
}

impl AppConfig {
    pub fn resolve(network: NetworkTarget, overrides: ConfigOverrides) -> Result<Self> {
        let network = match overrides.rpc_url {
            Some(url) => NetworkTarget::Custom { url },
            None => network,
        };
        parse_rpc_url(network.rpc_url())?;

        let record = match (network.deployment_env(), overrides.deployments_root) {
            (Some(env), Some(root)) => load_record(&root, env)?,
            _ => None,
        };
        let addresses = ContractAddresses::resolve(record.as_ref());
        let betting_contract = parse_address("betting", &addresses.betting)?;
        let launchpad_contract = addresses
            .launchpad
            .as_deref()
            .map(|raw| parse_address("launchpad", raw))
            .transpose()?;

        let wallet_dir = resolve_wallet_dir(overrides.wallet_dir.as_deref())?;
        let state_dir = match overrides.state_dir {
            Some(raw) => PathBuf::from(shellexpand::tilde(&raw).into_owned()),
            None => FileSessionStorage::default_dir()?,
        };

        let config = Self {
            network,
            betting_contract,
            launchpad_contract,
            wallet_dir,
            state_dir,
            confirmation_timeout: overrides
                .confirmation_timeout_secs
                .map(Duration::from_secs),
        };
        debug!(?config, "resolved configuration");
        Ok(config)
    }

    pub fn rpc_url(&self) -> &str {
        self.network.rpc_url()
    }

    pub fn require_launchpad(&self) -> Result<Address> {
        self.launchpad_contract.ok_or_else(|| {
            ChainError::Config(format!(
                "no launchpad contract configured; set {} or record a deployment",
                deployments::LAUNCHPAD_CONTRACT_ENV
            ))
        })
    }
}

fn load_record(root: &Path, env: DeploymentEnv) -> Result<Option<DeploymentRecord>> {
    if !root.join(env.dir_name()).exists() {
        return Ok(None);
    }
    DeploymentStore::new_in(root, env)
        .and_then(|store| store.load())
        .map_err(|e| ChainError::Config(format!("{e:#}")))
}

fn parse_address(label: &str, raw: &str) -> Result<Address> {
    raw.trim()
        .parse()
        .map_err(|e| ChainError::Config(format!("invalid {label} contract address {raw}: {e}")))
}
