use alloy_primitives::Address;
use big_or_small_client::{
    Choice,
    OrchestratorConfig,
    RoundOrchestrator,
    chain::EventWatcher,
    config::{
        AppConfig,
        CommitModel,
        DEFAULT_POLL_INTERVAL,
        NetworkTarget,
    },
    events::EventSubscription,
    rpc::RpcClient,
};
use clap::{
    ArgGroup,
    Parser,
    Subcommand,
};
use color_eyre::eyre::{
    Result,
    WrapErr,
    eyre,
};
use deployments::{
    DeploymentRecord,
    DeploymentStore,
};
use std::path::PathBuf;
use tracing::{
    info,
    warn,
};

type Orchestrator = RoundOrchestrator<RpcClient, RpcClient>;

#[derive(Parser, Debug)]
#[command(
    name = "big-or-small",
    about = "Play Big or Small dice rounds against a deployed contract",
    version,
    group(ArgGroup::new("network").args(["sepolia", "local"]))
)]
struct Args {
    /// Use Sepolia (the default)
    #[arg(long)]
    sepolia: bool,

    /// Use a local development node
    #[arg(long)]
    local: bool,

    /// Override the RPC URL for the selected network
    #[arg(long)]
    rpc_url: Option<String>,

    /// Contract address (defaults to the recorded deployment)
    #[arg(long)]
    contract: Option<Address>,

    /// Sending account unlocked on the node (defaults to its first account)
    #[arg(long)]
    account: Option<Address>,

    /// How the deployment commits dice: on-chain or encrypted
    #[arg(long)]
    commit_model: Option<CommitModel>,

    /// Write logs to <dir>/big-or-small.log instead of stderr
    #[arg(long)]
    log_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the contract address in use
    Address,
    /// Record the contract address for the selected network
    Register {
        #[arg(long)]
        contract: Address,
        #[arg(long)]
        commit_model: Option<CommitModel>,
    },
    /// Start a new round and print its id
    Start,
    /// Bet on an existing round
    Bet {
        #[arg(long)]
        round: String,
        /// Stake in ETH, e.g. 0.01
        #[arg(long)]
        stake: String,
        /// small (1-3) or big (4-6)
        #[arg(long)]
        choice: Choice,
    },
    /// Ask the contract to settle a round
    Reveal {
        #[arg(long)]
        round: String,
        /// Block until the Revealed event arrives
        #[arg(long)]
        wait: bool,
    },
    /// Print the on-chain state of a round
    Info {
        #[arg(long)]
        round: String,
    },
    /// Start, bet, reveal and wait for the result in one go
    Play {
        #[arg(long)]
        stake: String,
        #[arg(long)]
        choice: Choice,
    },
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let args = Args::parse();
    let _log_guard = big_or_small_client::init_tracing(args.log_dir.as_deref());

    let network = if args.local {
        NetworkTarget::local(args.rpc_url.clone())
    } else {
        NetworkTarget::sepolia(args.rpc_url.clone())
    };
    let env = network.deployment_env();
    let store = DeploymentStore::new(env).map_err(|e| eyre!(e))?;

    if let Command::Register {
        contract,
        commit_model,
    } = &args.command
    {
        let record = DeploymentRecord::new(
            contract.to_string(),
            network.url(),
            Some(network.chain_id()),
            commit_model.map(|m| m.to_string()),
        );
        store.save(record).map_err(|e| eyre!(e))?;
        println!(
            "Recorded {contract} for {env} in {}",
            store.path().display()
        );
        return Ok(());
    }

    let config = resolve_config(&args, network, &store)?;
    let contract = config.contract.unwrap_or(Address::ZERO);
    if let Command::Address = args.command {
        match config.contract {
            Some(address) => println!("{address}"),
            None => println!("No contract configured for {env}"),
        }
        return Ok(());
    }
    if config.contract.is_none() {
        warn!(%env, "no contract address; pass --contract or run `register`");
    }

    let client = connect(&config, contract).await?;
    let orchestrator = RoundOrchestrator::new(
        OrchestratorConfig {
            contract,
            commit_model: config.commit_model.unwrap_or_default(),
        },
        client.clone(),
        client.clone(),
    );
    info!(
        url = config.network.url(),
        %contract,
        commit_model = %orchestrator.config().commit_model,
        "client ready"
    );

    match args.command {
        Command::Start => {
            let id = orchestrator.start_round().await?;
            println!("{}", orchestrator.status());
            println!("{id}");
        }
        Command::Bet {
            round,
            stake,
            choice,
        } => {
            orchestrator.select_round(&round).await?;
            orchestrator.load_bet_bounds().await;
            orchestrator.place_bet(&stake, choice).await?;
            println!("{}", orchestrator.status());
        }
        Command::Reveal { round, wait } => {
            orchestrator.select_round(&round).await?;
            let mut subscription = if wait {
                Some(client.watch_revealed(orchestrator.current_round())?)
            } else {
                None
            };
            orchestrator.reveal_round().await?;
            println!("{}", orchestrator.status());
            if let Some(subscription) = subscription.as_mut() {
                wait_for_settlement(&orchestrator, subscription).await?;
            }
        }
        Command::Info { round } => {
            if orchestrator.select_round(&round).await?.is_none() {
                return Err(eyre!("'{round}' is not a 0x-prefixed 32-byte hex round id"));
            }
            print_snapshot(&orchestrator);
        }
        Command::Play { stake, choice } => {
            let id = orchestrator.start_round().await?;
            println!("Round {id}");
            orchestrator.load_bet_bounds().await;
            orchestrator.place_bet(&stake, choice).await?;
            println!("{}", orchestrator.status());
            let mut subscription = client.watch_revealed(Some(id))?;
            orchestrator.reveal_round().await?;
            println!("{}", orchestrator.status());
            wait_for_settlement(&orchestrator, &mut subscription).await?;
        }
        Command::Address | Command::Register { .. } => {}
    }
    Ok(())
}

/// Command line values win over the recorded deployment.
fn resolve_config(
    args: &Args,
    network: NetworkTarget,
    store: &DeploymentStore,
) -> Result<AppConfig> {
    let record = store.load().map_err(|e| eyre!(e))?;
    if let Some(record) = &record
        && !record.is_on_chain(network.chain_id())
    {
        warn!(
            recorded = ?record.chain_id,
            expected = network.chain_id(),
            "deployment record was written for another chain"
        );
    }
    let contract = match (args.contract, &record) {
        (Some(address), _) => Some(address),
        (None, Some(record)) => Some(
            record
                .contract_address
                .parse::<Address>()
                .wrap_err_with(|| {
                    format!(
                        "invalid contract address in {}",
                        store.path().display()
                    )
                })?,
        ),
        (None, None) => None,
    };
    let recorded_model = record
        .as_ref()
        .and_then(|record| record.commit_model.as_deref())
        .map(str::parse::<CommitModel>)
        .transpose()
        .map_err(|e| eyre!(e))?;

    Ok(AppConfig {
        network,
        contract,
        account: args.account,
        commit_model: args.commit_model.or(recorded_model),
        poll_interval: DEFAULT_POLL_INTERVAL,
    })
}

async fn connect(config: &AppConfig, contract: Address) -> Result<RpcClient> {
    let client = RpcClient::new(config.network.url(), contract, config.poll_interval)
        .wrap_err("building RPC client")?;
    match client.chain_id().await {
        Ok(actual) if actual != config.network.chain_id() => warn!(
            actual,
            expected = config.network.chain_id(),
            "RPC endpoint is on an unexpected chain"
        ),
        Ok(_) => {}
        Err(err) => warn!(error = %err, "could not query chain id"),
    }
    let account = match config.account {
        Some(account) => Some(account),
        None => match client.accounts().await {
            Ok(accounts) => accounts.first().copied(),
            Err(err) => {
                warn!(error = %err, "could not list node accounts");
                None
            }
        },
    };
    Ok(match account {
        Some(account) => client.with_account(account),
        None => client,
    })
}

async fn wait_for_settlement(
    orchestrator: &Orchestrator,
    subscription: &mut EventSubscription,
) -> Result<()> {
    println!("Waiting for the Revealed event (Ctrl-C to stop waiting)...");
    tokio::select! {
        settled = orchestrator.await_settlement(subscription) => {
            if settled.is_none() {
                return Err(eyre!("event feed ended before the round settled"));
            }
            println!("{}", orchestrator.status());
            print_snapshot(orchestrator);
        }
        _ = tokio::signal::ctrl_c() => {
            println!("Stopped waiting; the round still settles on chain.");
        }
    }
    Ok(())
}

fn print_snapshot(orchestrator: &Orchestrator) {
    match orchestrator.snapshot() {
        Some(round) if !round.is_registered() => {
            println!("Round {} is not registered on chain.", round.id)
        }
        Some(round) => println!("{round}"),
        None => println!("Round info unavailable."),
    }
}
