use anyhow::{
    Context,
    Result,
    anyhow,
};
use chrono::Utc;
use serde::{
    Deserialize,
    Serialize,
};
use std::{
    fmt,
    fs,
    io::Write,
    path::{
        Path,
        PathBuf,
    },
};

pub const DEPLOYMENTS_ROOT: &str = ".deployments";
const DEPLOYMENTS_FILE: &str = "deployments.json";

pub const BETTING_CONTRACT_ENV: &str = "DASHMETRICS_BETTING_CONTRACT_ADDRESS";
pub const LAUNCHPAD_CONTRACT_ENV: &str = "DASHMETRICS_LAUNCHPAD_CONTRACT_ADDRESS";
pub const DEFAULT_BETTING_CONTRACT: &str = "0x930aE314a7285B7Cac2E5c7b1c59319837816D48";

pub const AURORA_TESTNET_RPC_URL: &str = "https://testnet.aurora.dev";
pub const AURORA_TESTNET_CHAIN_ID: u64 = 1_313_161_555;
pub const LOCAL_RPC_URL: &str = "http://localhost:8545";
pub const LOCAL_CHAIN_ID: u64 = 31_337;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum DeploymentEnv {
    AuroraTestnet,
    Local,
}

impl DeploymentEnv {
    pub fn dir_name(self) -> &'static str {
        match self {
            DeploymentEnv::AuroraTestnet => "aurora-testnet",
            DeploymentEnv::Local => "local",
        }
    }

    pub fn default_rpc_url(self) -> &'static str {
        match self {
            DeploymentEnv::AuroraTestnet => AURORA_TESTNET_RPC_URL,
            DeploymentEnv::Local => LOCAL_RPC_URL,
        }
    }

    pub fn chain_id(self) -> u64 {
        match self {
            DeploymentEnv::AuroraTestnet => AURORA_TESTNET_CHAIN_ID,
            DeploymentEnv::Local => LOCAL_CHAIN_ID,
        }
    }
}

impl fmt::Display for DeploymentEnv {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DeploymentEnv::AuroraTestnet => "Aurora Testnet",
            DeploymentEnv::Local => "Local",
        };
        write!(f, "{name}")
    }
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct DeploymentRecord {
    pub deployed_at: String,
    pub network_url: String,
    pub chain_id: u64,
    pub betting_contract: String,
    #[serde(default)]
    pub launchpad_contract: Option<String>,
    #[serde(default)]
    pub deployment_block_height: Option<u64>,
}

/// Contract addresses after environment overrides have been applied.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ContractAddresses {
    pub betting: String,
    pub launchpad: Option<String>,
}

impl ContractAddresses {
    /// Resolve addresses with precedence: environment variable, recorded
    /// deployment, built-in default.
    pub fn resolve(record: Option<&DeploymentRecord>) -> Self {
        Self::resolve_with(record, |key| std::env::var(key).ok())
    }

    pub fn resolve_with(
        record: Option<&DeploymentRecord>,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Self {
        let non_empty = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());
        let betting = non_empty(BETTING_CONTRACT_ENV)
            .or_else(|| record.map(|r| r.betting_contract.clone()))
            .unwrap_or_else(|| DEFAULT_BETTING_CONTRACT.to_string());
        let launchpad = non_empty(LAUNCHPAD_CONTRACT_ENV)
            .or_else(|| record.and_then(|r| r.launchpad_contract.clone()));
        Self { betting, launchpad }
    }
}

#[derive(Debug)]
pub struct DeploymentStore {
    path: PathBuf,
}

impl DeploymentStore {
    pub fn new(env: DeploymentEnv) -> Result<Self> {
        Self::new_in(Path::new(DEPLOYMENTS_ROOT), env)
    }

    pub fn new_in(root: &Path, env: DeploymentEnv) -> Result<Self> {
        let path = ensure_store(root, env)?;
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn load(&self) -> Result<Option<DeploymentRecord>> {
        read_record(&self.path)
    }

    pub fn save(&self, record: DeploymentRecord) -> Result<()> {
        write_record(&self.path, &record)
    }
}

pub fn ensure_structure() -> Result<()> {
    for env in [DeploymentEnv::AuroraTestnet, DeploymentEnv::Local] {
        let _ = ensure_store(Path::new(DEPLOYMENTS_ROOT), env)?;
    }
    Ok(())
}

fn ensure_store(root: &Path, env: DeploymentEnv) -> Result<PathBuf> {
    if !root.exists() {
        fs::create_dir_all(root).with_context(|| {
            format!("Failed to create deployments directory {}", root.display())
        })?;
    }

    let env_dir = root.join(env.dir_name());
    if !env_dir.exists() {
        fs::create_dir_all(&env_dir).with_context(|| {
            format!("Failed to create {} deployments directory", env.dir_name())
        })?;
    }

    let file_path = env_dir.join(DEPLOYMENTS_FILE);
    if !file_path.exists() {
        let mut file = fs::File::create(&file_path).with_context(|| {
            format!(
                "Failed to create deployment record file for {} at {:?}",
                env, file_path
            )
        })?;
        file.write_all(b"").with_context(|| {
            format!("Failed to initialize deployment record file for {}", env)
        })?;
    }

    Ok(file_path)
}

fn read_record(path: impl AsRef<Path>) -> Result<Option<DeploymentRecord>> {
    let data = fs::read(path.as_ref()).context("Failed to read deployment records")?;
    if data.iter().all(u8::is_ascii_whitespace) || data.is_empty() {
        return Ok(None);
    }
    if let Ok(record) = serde_json::from_slice::<DeploymentRecord>(&data) {
        return Ok(Some(record));
    }
    if let Ok(mut records) = serde_json::from_slice::<Vec<DeploymentRecord>>(&data) {
        return Ok(records.pop());
    }
    Err(anyhow!(
        "Failed to parse deployment record JSON; expected a single deployment object"
    ))
}

fn write_record(path: impl AsRef<Path>, record: &DeploymentRecord) -> Result<()> {
    let json = serde_json::to_vec_pretty(record)
        .context("Failed to serialize deployment record")?;
    fs::write(path.as_ref(), json).context("Failed to write deployment record")?;
    Ok(())
}

pub fn record_deployment(
    root: &Path,
    env: DeploymentEnv,
    betting_contract: impl AsRef<str>,
    launchpad_contract: Option<impl AsRef<str>>,
    network_url: impl AsRef<str>,
) -> Result<()> {
    let store = DeploymentStore::new_in(root, env)?;
    let record = DeploymentRecord {
        deployed_at: Utc::now().to_rfc3339(),
        network_url: network_url.as_ref().to_string(),
        chain_id: env.chain_id(),
        betting_contract: betting_contract.as_ref().to_string(),
        launchpad_contract: launchpad_contract.map(|id| id.as_ref().to_string()),
        deployment_block_height: None,
    };
    store.save(record)
}
