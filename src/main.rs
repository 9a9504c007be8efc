use alloy::primitives::{
    Address,
    TxHash,
};
use chrono::{
    DateTime,
    TimeZone,
    Utc,
};
use clap::{
    Parser,
    Subcommand,
    ValueEnum,
};
use color_eyre::eyre::{
    Result,
    WrapErr,
    eyre,
};
use dashmetrics::{
    betting::{
        Bet,
        BettingService,
        NewBet,
        Side,
    },
    chain::TxReceipt,
    config::{
        AppConfig,
        ConfigOverrides,
        NetworkTarget,
    },
    launchpad::{
        LaunchpadService,
        SaleFilter,
        TokenSale,
        find_sale,
    },
    pricing::PriceEstimate,
    read_only::{
        Read,
        ReadOnlyResolver,
    },
    rpc::RpcClient,
    session::{
        SessionProvider,
        WalletSnapshot,
    },
    storage::FileSessionStorage,
    units::{
        format_amount,
        parse_positive_amount,
    },
    wallets::{
        KeystoreWallet,
        PasswordSource,
        list_wallets,
    },
};
use deployments::DEPLOYMENTS_ROOT;
use std::path::{
    Path,
    PathBuf,
};
use tracing_appender::{
    non_blocking::WorkerGuard,
    rolling,
};
use tracing_subscriber::{
    EnvFilter,
    fmt,
};

type Provider = SessionProvider<KeystoreWallet, FileSessionStorage>;

#[derive(Parser, Debug)]
#[command(
    name = "dashmetrics",
    about = "Connect a wallet, trade launchpad tokens and take part in prediction bets",
    version
)]
struct Cli {
    /// Network to talk to
    #[arg(long, value_enum, global = true, default_value = "aurora-testnet")]
    network: Network,

    /// Override RPC URL
    #[arg(long, global = true)]
    rpc_url: Option<String>,

    /// Keystore name (file stem of <name>.wallet)
    #[arg(long, global = true, default_value = "default")]
    wallet: String,

    /// Override keystore directory (defaults to ~/.dashmetrics/wallets)
    #[arg(long, global = true)]
    wallet_dir: Option<String>,

    /// Override persisted state directory (defaults to ~/.dashmetrics/state)
    #[arg(long, global = true)]
    state_dir: Option<String>,

    /// Directory holding per-network deployment records
    #[arg(long, global = true, default_value = DEPLOYMENTS_ROOT)]
    deployments_dir: PathBuf,

    /// Stop waiting for confirmation after this many seconds (unbounded by default)
    #[arg(long, global = true)]
    confirmation_timeout_secs: Option<u64>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Network {
    AuroraTestnet,
    Local,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Outcome {
    Yes,
    No,
}

impl From<Outcome> for Side {
    fn from(outcome: Outcome) -> Self {
        match outcome {
            Outcome::Yes => Side::Yes,
            Outcome::No => Side::No,
        }
    }
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List keystores in the wallet directory
    Wallets,
    /// Unlock the wallet and start a session
    Connect,
    /// End the session and clear persisted state
    Disconnect,
    /// Show the persisted session and local ledger
    Status,
    #[command(subcommand)]
    Bets(BetsCommand),
    #[command(subcommand)]
    Credits(CreditsCommand),
    #[command(subcommand)]
    Handle(HandleCommand),
    #[command(subcommand)]
    Tokens(TokensCommand),
    #[command(subcommand)]
    Ledger(LedgerCommand),
}

#[derive(Subcommand, Debug)]
enum BetsCommand {
    /// List every bet with its pool split
    List,
    Create {
        #[arg(long)]
        title: String,
        #[arg(long, default_value = "")]
        description: String,
        #[arg(long, default_value = "general")]
        category: String,
        #[arg(long)]
        twitter_handle: String,
        /// RFC 3339 timestamp, e.g. 2026-12-31T23:59:00Z
        #[arg(long)]
        end_date: String,
        #[arg(long)]
        join_amount: String,
        #[arg(long, default_value = "0")]
        initial_pool_amount: String,
        #[arg(long, default_value = "")]
        image_url: String,
    },
    Join {
        bet_id: u64,
        #[arg(value_enum)]
        side: Outcome,
        #[arg(long, default_value = "1.0")]
        amount: String,
    },
    Close {
        bet_id: u64,
        #[arg(value_enum)]
        outcome: Outcome,
    },
    /// Withdraw winnings
    Withdraw,
}

#[derive(Subcommand, Debug)]
enum CreditsCommand {
    Show {
        /// Account to inspect (defaults to the session address)
        #[arg(long)]
        address: Option<Address>,
    },
    Buy {
        amount: String,
    },
    Withdraw {
        amount: String,
    },
}

#[derive(Subcommand, Debug)]
enum HandleCommand {
    Register { handle: String },
    Lookup { handle: String },
}

#[derive(Subcommand, Debug)]
enum TokensCommand {
    List {
        #[arg(long, conflicts_with = "graduated")]
        open: bool,
        #[arg(long)]
        graduated: bool,
    },
    /// Price `amount` whole tokens of a sale found by address, ticker or name
    Quote { token: String, amount: u64 },
    Buy { token: String, amount: u64 },
}

#[derive(Subcommand, Debug)]
enum LedgerCommand {
    Show,
    Deposit {
        amount: String,
        #[arg(long)]
        tx_hash: Option<TxHash>,
    },
    Withdraw {
        amount: String,
    },
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();

    let network = match cli.network {
        Network::AuroraTestnet => NetworkTarget::AuroraTestnet,
        Network::Local => NetworkTarget::Local,
    };
    let config = AppConfig::resolve(
        network,
        ConfigOverrides {
            rpc_url: cli.rpc_url,
            wallet_dir: cli.wallet_dir,
            state_dir: cli.state_dir,
            deployments_root: Some(cli.deployments_dir),
            confirmation_timeout_secs: cli.confirmation_timeout_secs,
        },
    )
    .wrap_err("Failed to resolve configuration")?;
    let _log_guard = init_tracing(&config.state_dir);
    tracing::debug!(command = ?cli.command, "starting");

    let wallet = KeystoreWallet::open(
        &config.wallet_dir,
        &cli.wallet,
        config.rpc_url(),
        PasswordSource::from_env(),
    )?;
    let provider = SessionProvider::new(wallet, FileSessionStorage::new(&config.state_dir))
        .with_confirmation_timeout(config.confirmation_timeout);
    let reader = ReadOnlyResolver::new(config.rpc_url()).get_read_only_provider()?;

    let mut app = App {
        config,
        provider,
        reader,
    };
    app.run(cli.command).await
}

fn init_tracing(state_dir: &Path) -> WorkerGuard {
    let appender = rolling::daily(state_dir.join("logs"), "dashmetrics.log");
    let (writer, guard) = tracing_appender::non_blocking(appender);
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = fmt()
        .with_env_filter(filter)
        .with_writer(writer)
        .with_ansi(false)
        .try_init();
    guard
}

struct App {
    config: AppConfig,
    provider: Provider,
    reader: RpcClient,
}

impl App {
    fn betting(&self) -> BettingService<RpcClient> {
        BettingService::new(self.config.betting_contract, self.reader.clone())
            .with_confirmation_timeout(self.config.confirmation_timeout)
    }

    fn launchpad(&self) -> Result<LaunchpadService<RpcClient>> {
        let address = self.config.require_launchpad()?;
        Ok(LaunchpadService::new(address, self.reader.clone())
            .with_confirmation_timeout(self.config.confirmation_timeout))
    }

    /// Writes need a live signer; reconnect from the persisted flag if needed.
    async fn require_session(&mut self) -> Result<()> {
        match self.provider.rehydrate().await? {
            Some(_) => Ok(()),
            None => Err(eyre!("Wallet not connected. Run `dashmetrics connect` first")),
        }
    }

    async fn run(&mut self, command: Command) -> Result<()> {
        match command {
            Command::Wallets => {
                let wallets = list_wallets(&self.config.wallet_dir)?;
                if wallets.is_empty() {
                    println!("No wallets in {}", self.config.wallet_dir.display());
                }
                for wallet in wallets {
                    println!("{}\t{}", wallet.name, wallet.path.display());
                }
            }
            Command::Connect => {
                let snapshot = self.provider.connect().await?;
                print_snapshot(&snapshot);
            }
            Command::Disconnect => {
                self.provider.disconnect();
                println!("Disconnected");
            }
            Command::Status => {
                let persisted = self.provider.persisted()?;
                match persisted.user_address {
                    Some(address) if persisted.is_authenticated => {
                        println!("Signed in as {address}")
                    }
                    _ => println!("Not connected"),
                }
                println!(
                    "Local ledger: {} (unconfirmed)",
                    self.provider.ledger().balance_display()
                );
            }
            Command::Bets(command) => self.bets(command).await?,
            Command::Credits(command) => self.credits(command).await?,
            Command::Handle(command) => self.handle(command).await?,
            Command::Tokens(command) => self.tokens(command).await?,
            Command::Ledger(command) => self.ledger(command)?,
        }
        Ok(())
    }

    async fn bets(&mut self, command: BetsCommand) -> Result<()> {
        let betting = self.betting();
        let receipt = match command {
            BetsCommand::List => {
                let bets = betting.get_all_bets(self.provider.session()).await;
                if let Read::Degraded { reason, .. } = &bets {
                    eprintln!("Could not load bets: {reason}");
                }
                for bet in bets.value() {
                    print_bet(bet);
                }
                return Ok(());
            }
            BetsCommand::Create {
                title,
                description,
                category,
                twitter_handle,
                end_date,
                join_amount,
                initial_pool_amount,
                image_url,
            } => {
                let end_date = parse_end_date(&end_date)?;
                self.require_session().await?;
                let bet = NewBet {
                    title,
                    description,
                    category,
                    twitter_handle,
                    end_date,
                    join_amount,
                    initial_pool_amount,
                    image_url,
                };
                betting.create_bet(self.provider.session(), bet).await?
            }
            BetsCommand::Join {
                bet_id,
                side,
                amount,
            } => {
                self.require_session().await?;
                betting
                    .join_bet(self.provider.session(), bet_id, side.into(), &amount)
                    .await?
            }
            BetsCommand::Close { bet_id, outcome } => {
                self.require_session().await?;
                betting
                    .close_bet(self.provider.session(), bet_id, outcome.into())
                    .await?
            }
            BetsCommand::Withdraw => {
                self.require_session().await?;
                betting.withdraw(self.provider.session()).await?
            }
        };
        print_receipt(&receipt);
        Ok(())
    }

    async fn credits(&mut self, command: CreditsCommand) -> Result<()> {
        let betting = self.betting();
        let receipt = match command {
            CreditsCommand::Show { address } => {
                let user = match address {
                    Some(address) => address,
                    None => self
                        .provider
                        .persisted()?
                        .user_address
                        .ok_or_else(|| eyre!("No session address; pass --address"))?,
                };
                let credits = betting
                    .get_user_bet_credits(self.provider.session(), user)
                    .await?;
                if let Some(reason) = credits.reason() {
                    eprintln!("Could not read credits: {reason}");
                }
                println!("{} credits", format_amount(*credits.value()));
                return Ok(());
            }
            CreditsCommand::Buy { amount } => {
                self.require_session().await?;
                betting
                    .buy_bet_credits(self.provider.session(), &amount)
                    .await?
            }
            CreditsCommand::Withdraw { amount } => {
                self.require_session().await?;
                betting
                    .withdraw_credits(self.provider.session(), &amount)
                    .await?
            }
        };
        print_receipt(&receipt);
        Ok(())
    }

    async fn handle(&mut self, command: HandleCommand) -> Result<()> {
        let betting = self.betting();
        self.require_session().await?;
        match command {
            HandleCommand::Register { handle } => {
                let receipt = betting
                    .register_twitter_handle(self.provider.session(), &handle)
                    .await?;
                print_receipt(&receipt);
            }
            HandleCommand::Lookup { handle } => {
                let address = betting
                    .get_twitter_handle_address(self.provider.session(), &handle)
                    .await?;
                println!("{handle}: {address}");
            }
        }
        Ok(())
    }

    async fn tokens(&mut self, command: TokensCommand) -> Result<()> {
        let launchpad = self.launchpad()?;
        match command {
            TokensCommand::List { open, graduated } => {
                let filter = match (open, graduated) {
                    (true, _) => SaleFilter::Open,
                    (_, true) => SaleFilter::Graduated,
                    _ => SaleFilter::All,
                };
                for sale in launchpad.list_sales(filter).await? {
                    print_sale(&sale);
                }
            }
            TokensCommand::Quote { token, amount } => {
                let sale = lookup_sale(&launchpad, &token).await?;
                match launchpad.pricing().get_price_for_tokens(&sale, amount).await {
                    PriceEstimate::Available(quote) => println!(
                        "{} {} costs {}",
                        quote.amount,
                        sale.ticker(),
                        quote.cost_display
                    ),
                    PriceEstimate::Unavailable(reason) => {
                        println!("Price unavailable: {reason}")
                    }
                }
            }
            TokensCommand::Buy { token, amount } => {
                let sale = lookup_sale(&launchpad, &token).await?;
                self.require_session().await?;
                let receipt = launchpad
                    .buy_tokens(self.provider.session(), &sale, amount)
                    .await?;
                print_receipt(&receipt);
            }
        }
        Ok(())
    }

    fn ledger(&mut self, command: LedgerCommand) -> Result<()> {
        match command {
            LedgerCommand::Show => {
                println!("Balance: {} (unconfirmed)", self.provider.ledger().balance_display());
                for entry in self.provider.ledger().deposit_history() {
                    let when = Utc
                        .timestamp_millis_opt(entry.timestamp)
                        .single()
                        .map(|t| t.to_rfc3339())
                        .unwrap_or_default();
                    let tx = entry.tx_hash.map(|h| h.to_string()).unwrap_or_default();
                    println!("{when}\t+{}\t{tx}", format_amount(entry.amount));
                }
            }
            LedgerCommand::Deposit { amount, tx_hash } => {
                let amount = parse_positive_amount(&amount)?;
                self.provider.add_funds(amount, tx_hash)?;
                println!("Balance: {}", self.provider.ledger().balance_display());
            }
            LedgerCommand::Withdraw { amount } => {
                let amount = parse_positive_amount(&amount)?;
                if !self.provider.withdraw_funds(amount)? {
                    return Err(eyre!(
                        "Cannot withdraw {} from a balance of {}",
                        format_amount(amount),
                        self.provider.ledger().balance_display()
                    ));
                }
                println!("Balance: {}", self.provider.ledger().balance_display());
            }
        }
        Ok(())
    }
}

async fn lookup_sale(launchpad: &LaunchpadService<RpcClient>, token: &str) -> Result<TokenSale> {
    let sales = launchpad.list_sales(SaleFilter::All).await?;
    find_sale(&sales, token)
        .cloned()
        .ok_or_else(|| eyre!("No token sale matches {token}"))
}

fn parse_end_date(raw: &str) -> Result<u64> {
    let parsed = DateTime::parse_from_rfc3339(raw)
        .wrap_err_with(|| format!("Invalid end date {raw}"))?;
    u64::try_from(parsed.timestamp()).wrap_err("End date must be after 1970")
}

fn print_snapshot(snapshot: &WalletSnapshot) {
    match snapshot.address {
        Some(address) => println!("Connected: {address}"),
        None => println!("Not connected"),
    }
    if let Some(network) = &snapshot.network_name {
        println!("Network: {network}");
    }
    if let Some(balance) = &snapshot.balance {
        println!("Balance: {balance}");
    }
}

fn print_receipt(receipt: &TxReceipt) {
    match receipt.block_number {
        Some(block) => println!("Confirmed {} in block {block}", receipt.tx_hash),
        None => println!("Confirmed {}", receipt.tx_hash),
    }
}

fn print_bet(bet: &Bet) {
    let pools = bet.pools();
    let (yes, no) = pools.percentages();
    let status = match (bet.is_closed, bet.outcome) {
        (true, Some(outcome)) => format!("closed: {outcome}"),
        _ => String::from("open"),
    };
    println!(
        "#{} {} [{}] yes {yes}% / no {no}% pool {} ({status})",
        bet.id,
        bet.title,
        bet.category,
        format_amount(pools.total()),
    );
}

fn print_sale(sale: &TokenSale) {
    let status = if sale.is_open { "open" } else { "graduated" };
    println!(
        "{}\t{}\t{}\traised {}\t{status}",
        sale.ticker(),
        sale.name,
        sale.token,
        sale.raised_display()
    );
}
