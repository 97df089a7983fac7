use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use cosign_client::{CallWrapper, TimepointLookup};
use cosign_store::{FileStore, KvPersistence, MultisigOperationStore};
use cosign_types::{
    AccountId, CallData, CallHash, ChainId, Config, CryptoFamily, MultisigDescriptor,
    OperationFilter, OperationKey, OperationStatus, ProxyType, WrapperContext,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Parser)]
#[command(
    name = "cosign",
    about = "Multisig coordination and transaction wrapping engine",
    version,
    author
)]
struct Cli {
    #[arg(
        long,
        global = true,
        value_name = "LEVEL",
        help = "Log level (trace, debug, info, warn, error), overrides the config file"
    )]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Derive the account identity of a multisig")]
    Derive {
        #[arg(long, value_name = "N", help = "Approvals required to dispatch")]
        threshold: u16,

        #[arg(
            long = "member",
            value_name = "HEX",
            required = true,
            help = "Member account, repeat for each signatory"
        )]
        members: Vec<String>,

        #[arg(long, value_enum, default_value = "standard", help = "Account scheme")]
        family: Family,
    },

    #[command(about = "Hash an encoded call")]
    CallHash {
        #[arg(value_name = "HEX", help = "SCALE-encoded call")]
        call: String,
    },

    #[command(about = "Wrap a call for submission through a multisig")]
    Wrap {
        #[arg(long, value_name = "ID", help = "Chain id from the configuration")]
        chain: String,

        #[arg(long, value_name = "HEX", help = "SCALE-encoded core call")]
        call: String,

        #[arg(long, value_name = "N", help = "Approvals required to dispatch")]
        threshold: u16,

        #[arg(
            long = "member",
            value_name = "HEX",
            required = true,
            help = "Member account, repeat for each signatory"
        )]
        members: Vec<String>,

        #[arg(long, value_name = "HEX", help = "Signatory approving the call")]
        signer: String,

        #[arg(long, value_name = "HEX", help = "Submit through this proxy of the signer")]
        delegate: Option<String>,

        #[arg(long, value_name = "DIR", help = "Home directory")]
        home: Option<PathBuf>,
    },

    #[command(about = "Inspect stored operations")]
    Operations {
        #[command(subcommand)]
        command: OperationCommands,
    },

    #[command(about = "Print engine metrics in Prometheus text format")]
    Metrics,

    #[command(about = "Display version information")]
    Version,

    #[command(about = "Configuration management")]
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(Subcommand)]
enum OperationCommands {
    #[command(about = "List stored operations")]
    List {
        #[arg(long, value_name = "DIR", help = "Home directory")]
        home: Option<PathBuf>,

        #[arg(long, value_name = "ID", help = "Only operations on this chain")]
        chain: Option<String>,

        #[arg(long, value_enum, help = "Only operations in this status")]
        status: Option<Status>,
    },

    #[command(about = "Show one operation as JSON")]
    Show {
        #[arg(long, value_name = "DIR", help = "Home directory")]
        home: Option<PathBuf>,

        #[arg(value_name = "CHAIN", help = "Chain id")]
        chain: String,

        #[arg(value_name = "HASH", help = "Call hash")]
        call_hash: String,
    },
}

#[derive(Subcommand)]
enum ConfigCommands {
    #[command(about = "Write the default configuration")]
    Init {
        #[arg(long, value_name = "DIR", help = "Home directory")]
        home: Option<PathBuf>,

        #[arg(long, help = "Overwrite an existing file")]
        force: bool,
    },

    #[command(about = "Show current configuration")]
    Show {
        #[arg(long, value_name = "DIR", help = "Home directory")]
        home: Option<PathBuf>,
    },

    #[command(about = "Validate configuration")]
    Validate {
        #[arg(value_name = "FILE", help = "Configuration file path")]
        file: PathBuf,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum Family {
    Standard,
    EthereumStyle,
}

impl From<Family> for CryptoFamily {
    fn from(family: Family) -> Self {
        match family {
            Family::Standard => CryptoFamily::Standard,
            Family::EthereumStyle => CryptoFamily::EthereumStyle,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum Status {
    Signing,
    Executed,
    Cancelled,
    Error,
}

impl From<Status> for OperationStatus {
    fn from(status: Status) -> Self {
        match status {
            Status::Signing => OperationStatus::Signing,
            Status::Executed => OperationStatus::Executed,
            Status::Cancelled => OperationStatus::Cancelled,
            Status::Error => OperationStatus::Error,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let level = log_level(&cli);
    cosign_log::init_tracing_compact(&level).map_err(|e| anyhow::anyhow!(e))?;

    match cli.command {
        Commands::Derive {
            threshold,
            members,
            family,
        } => derive_command(threshold, &members, family.into()),
        Commands::CallHash { call } => call_hash_command(&call),
        Commands::Wrap {
            chain,
            call,
            threshold,
            members,
            signer,
            delegate,
            home,
        } => {
            let layers = WrapArgs {
                threshold,
                members,
                signer,
                delegate,
            };
            wrap_command(&chain, &call, layers, home)
        }
        Commands::Operations { command } => operations_command(command),
        Commands::Metrics => metrics_command(),
        Commands::Version => version_command(),
        Commands::Config { command } => config_command(command),
    }
}

fn derive_command(threshold: u16, members: &[String], family: CryptoFamily) -> Result<()> {
    let descriptor = parse_descriptor(threshold, members, family)?;
    let identity = cosign_crypto::derive_account_identity(&descriptor)?;
    println!("{identity}");
    Ok(())
}

fn call_hash_command(call: &str) -> Result<()> {
    let call = CallData::from_hex(call).context("invalid call")?;
    println!("{}", cosign_crypto::call_hash(&call));
    Ok(())
}

struct WrapArgs {
    threshold: u16,
    members: Vec<String>,
    signer: String,
    delegate: Option<String>,
}

fn wrap_command(chain: &str, call: &str, args: WrapArgs, home: Option<PathBuf>) -> Result<()> {
    let home_dir = get_home_dir(home)?;
    let config = load_config(&home_dir)?;
    let chain_id = ChainId::from(chain);
    let chain_config = config
        .chain(&chain_id)
        .with_context(|| format!("chain '{chain}' is not configured"))?;

    let descriptor = parse_descriptor(args.threshold, &args.members, chain_config.crypto_family)?;
    let signer = parse_account(&args.signer)?;
    let mut stack = vec![WrapperContext::Multisig {
        descriptor,
        signer: signer.clone(),
    }];
    if let Some(delegate) = args.delegate {
        stack.push(WrapperContext::Proxy {
            proxied: signer,
            delegate: parse_account(&delegate)?,
            proxy_type: ProxyType::Any,
        });
    }

    // approvals of a known operation need its timepoint
    let store = match config.store.backend.as_str() {
        "file" => Some(open_store(&home_dir, &config)?),
        _ => None,
    };
    let timepoints = store.as_deref().map(|s| s as &dyn TimepointLookup);

    let core_call = CallData::from_hex(call).context("invalid call")?;
    let envelope = CallWrapper::from_config(&config).wrap(&chain_id, core_call, &stack, timepoints)?;

    println!("call_hash: {}", envelope.call_hash);
    println!("wrapped_call: {}", envelope.wrapped_call.to_hex());
    if let Some(submitter) = envelope.submitter {
        println!("submitter: {submitter}");
    }
    Ok(())
}

fn operations_command(command: OperationCommands) -> Result<()> {
    match command {
        OperationCommands::List {
            home,
            chain,
            status,
        } => {
            let home_dir = get_home_dir(home)?;
            let config = load_config(&home_dir)?;
            let store = open_store(&home_dir, &config)?;
            let filter = OperationFilter {
                chain_id: chain.as_deref().map(ChainId::from),
                status: status.map(Into::into),
                member: None,
            };

            println!("CHAIN\tCALL HASH\tSTATUS\tAPPROVALS");
            for operation in store.list(&filter)? {
                println!(
                    "{}\t{}\t{}\t{}/{}",
                    operation.chain_id,
                    operation.call_hash,
                    operation.status,
                    cosign_store::count_distinct_signed(&operation),
                    operation.descriptor.threshold
                );
            }
        }
        OperationCommands::Show {
            home,
            chain,
            call_hash,
        } => {
            let home_dir = get_home_dir(home)?;
            let config = load_config(&home_dir)?;
            let store = open_store(&home_dir, &config)?;
            let call_hash = CallHash::from_hex(&call_hash).context("invalid call hash")?;
            let key = OperationKey::new(ChainId::from(chain.as_str()), call_hash);
            let operation = store
                .get(&key)?
                .with_context(|| format!("operation {key} not found"))?;
            println!("{}", serde_json::to_string_pretty(&operation)?);
        }
    }
    Ok(())
}

fn metrics_command() -> Result<()> {
    cosign_telemetry::init()?;
    print!("{}", cosign_telemetry::render()?);
    Ok(())
}

fn version_command() -> Result<()> {
    println!("cosign {}", env!("CARGO_PKG_VERSION"));
    println!("build: {}", env!("CARGO_PKG_NAME"));
    Ok(())
}

fn config_command(command: ConfigCommands) -> Result<()> {
    match command {
        ConfigCommands::Init { home, force } => {
            let path = get_home_dir(home)?.join("config.toml");
            if path.exists() && !force {
                anyhow::bail!("{} already exists, pass --force to overwrite", path.display());
            }
            Config::default().save_to(&path)?;
            println!("Wrote {}", path.display());
        }
        ConfigCommands::Show { home } => {
            let path = get_home_dir(home)?.join("config.toml");
            let content = std::fs::read_to_string(&path)
                .with_context(|| format!("failed to read {}", path.display()))?;
            println!("{content}");
        }
        ConfigCommands::Validate { file } => {
            Config::load_from_file(&file)?;
            println!("Configuration is valid");
        }
    }
    Ok(())
}

// Helper functions

const DEFAULT_LOG_LEVEL: &str = "warn";

impl Commands {
    fn home(&self) -> Option<&Path> {
        match self {
            Commands::Wrap { home, .. }
            | Commands::Operations {
                command:
                    OperationCommands::List { home, .. } | OperationCommands::Show { home, .. },
            }
            | Commands::Config {
                command: ConfigCommands::Init { home, .. } | ConfigCommands::Show { home },
            } => home.as_deref(),
            _ => None,
        }
    }
}

/// `--log-level`, else the level in the config file, else warn
fn log_level(cli: &Cli) -> String {
    if let Some(level) = &cli.log_level {
        return level.clone();
    }
    let path = match cli.command.home() {
        Some(home) => Ok(home.join("config.toml")),
        None => Config::default_config_path(),
    };
    path.ok()
        .filter(|path| path.exists())
        .and_then(|path| Config::load_from_file(&path).ok())
        .map(|config| config.log.level)
        .unwrap_or_else(|| DEFAULT_LOG_LEVEL.to_string())
}

fn get_home_dir(home: Option<PathBuf>) -> Result<PathBuf> {
    match home {
        Some(dir) => Ok(dir),
        None => Ok(Config::home_dir()?),
    }
}

fn load_config(home_dir: &Path) -> Result<Config> {
    let path = home_dir.join("config.toml");
    if path.exists() {
        Ok(Config::load_from_file(&path)?)
    } else {
        Ok(Config::default())
    }
}

fn open_store(home_dir: &Path, config: &Config) -> Result<Arc<MultisigOperationStore>> {
    let dir = config
        .store
        .data_dir
        .clone()
        .unwrap_or_else(|| home_dir.join("operations"));
    let persistence = KvPersistence::new(FileStore::open(&dir)?);
    let store = MultisigOperationStore::new(Arc::new(persistence));
    let loaded = store.hydrate()?;
    tracing::debug!(operations = loaded, dir = %dir.display(), "opened operation store");
    Ok(Arc::new(store))
}

fn parse_account(hex: &str) -> Result<AccountId> {
    AccountId::from_hex(hex).with_context(|| format!("invalid account '{hex}'"))
}

fn parse_descriptor(
    threshold: u16,
    members: &[String],
    family: CryptoFamily,
) -> Result<MultisigDescriptor> {
    let accounts = members
        .iter()
        .map(|member| parse_account(member))
        .collect::<Result<Vec<_>>>()?;
    let descriptor = MultisigDescriptor::from_accounts(accounts, threshold, family);
    descriptor.validate()?;
    Ok(descriptor)
}
