use clap::{ArgAction, Args, Parser, Subcommand};
use color_eyre::eyre::{eyre, Context, Result};
use comfy_table::presets::UTF8_BORDERS_ONLY;
use comfy_table::Table;
use indicatif::{ProgressBar, ProgressStyle};
use mev_analysis::detect::KnownBots;
use mev_analysis::reward::format_eth;
use mev_analysis::{BlockAnalyzer, BlockResult};
use mev_data::blocks::{RpcBlockProvider, RpcConfig};
use mev_sim::{EngineConfig, MevTracker, RangeResult, SimulationResult};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, Level};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone)]
struct AppContext {
    rpc_url: Option<String>,
    rpc_key: Option<String>,
    request_timeout: Duration,
    known_bots: Vec<String>,
}

#[derive(Parser, Debug)]
#[command(name = "mev-tracker")]
#[command(about = "Estimate validator MEV exposure for Ethereum blocks")]
#[command(version)]
struct Cli {
    #[arg(long, short = 'v', action = ArgAction::Count, global = true)]
    verbose: u8,

    #[arg(long, short = 'q', global = true)]
    quiet: bool,

    /// RPC endpoint URL (falls back to MEV_RPC_URL).
    #[arg(long, global = true)]
    rpc_url: Option<String>,

    /// Deadline for each individual RPC call, in seconds.
    #[arg(long, global = true, default_value_t = 10)]
    request_timeout_secs: u64,

    /// Additional known MEV bot sender address (repeatable).
    #[arg(long = "known-bot", global = true)]
    known_bots: Vec<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Detect MEV opportunities in one block.
    Block(BlockArgs),
    /// Aggregate estimated validator rewards over a block range.
    Rewards(RewardsArgs),
    /// Project future validator rewards from recent history.
    Simulate(SimulateArgs),
}

#[derive(Args, Debug)]
struct BlockArgs {
    #[arg(long)]
    number: u64,

    #[arg(long, default_value_t = 5)]
    timeout_secs: u64,

    #[arg(long, default_value = "table")]
    output: String,
}

/// Arguments for the `rewards` subcommand.
///
/// Missing bounds default to the last 100 blocks before the current tip.
#[derive(Args, Debug)]
struct RewardsArgs {
    #[arg(long)]
    validator: u64,

    #[arg(long)]
    from_block: Option<u64>,

    #[arg(long)]
    to_block: Option<u64>,

    #[arg(long, default_value_t = 60)]
    timeout_secs: u64,

    #[arg(long, default_value = "table")]
    output: String,
}

#[derive(Args, Debug)]
struct SimulateArgs {
    #[arg(long)]
    validator: u64,

    /// Number of future blocks to simulate (1-1000).
    #[arg(long)]
    blocks: u64,

    /// Seed for a reproducible projection.
    #[arg(long)]
    seed: Option<u64>,

    #[arg(long, default_value_t = 120)]
    timeout_secs: u64,

    #[arg(long, default_value = "table")]
    output: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;

    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.quiet)?;

    let ctx = AppContext {
        rpc_url: cli.rpc_url.or_else(|| std::env::var("MEV_RPC_URL").ok()),
        rpc_key: std::env::var("MEV_RPC_KEY").ok(),
        request_timeout: Duration::from_secs(cli.request_timeout_secs),
        known_bots: cli.known_bots,
    };

    match cli.command {
        Commands::Block(args) => handle_block(&ctx, args).await,
        Commands::Rewards(args) => handle_rewards(&ctx, args).await,
        Commands::Simulate(args) => handle_simulate(&ctx, args).await,
    }
}

fn init_tracing(verbose: u8, quiet: bool) -> Result<()> {
    let level = if quiet {
        Level::WARN
    } else {
        match verbose {
            0 => Level::INFO,
            1 => Level::DEBUG,
            _ => Level::TRACE,
        }
    };

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level.as_str()))
        .wrap_err("failed to initialize tracing filter")?;

    tracing_subscriber::fmt().with_env_filter(filter).init();
    Ok(())
}

/// Connects to the RPC endpoint and builds the tracker.
async fn build_tracker(ctx: &AppContext, config: EngineConfig) -> Result<MevTracker> {
    let rpc_config = RpcConfig::new(ctx.rpc_url.clone(), ctx.rpc_key.clone())
        .wrap_err("invalid RPC configuration")?
        .with_request_timeout(ctx.request_timeout);

    let extra_bots =
        KnownBots::from_addresses(&ctx.known_bots).wrap_err("invalid --known-bot address")?;
    let known_bots = KnownBots::default().extended_with(extra_bots);

    let provider = RpcBlockProvider::connect(&rpc_config).await?;
    Ok(MevTracker::new(
        Arc::new(provider),
        BlockAnalyzer::with_known_bots(known_bots),
        config,
    ))
}

/// Token cancelled after `timeout` or on Ctrl-C, whichever comes first.
fn cancel_on_timeout_or_interrupt(timeout: Duration) -> CancellationToken {
    let token = CancellationToken::new();
    let trigger = token.clone();
    tokio::spawn(async move {
        tokio::select! {
            _ = tokio::time::sleep(timeout) => {
                tracing::warn!(timeout_secs = timeout.as_secs(), "deadline reached, cancelling");
            }
            _ = tokio::signal::ctrl_c() => {
                tracing::warn!("interrupted, cancelling");
            }
            _ = trigger.cancelled() => {}
        }
        trigger.cancel();
    });
    token
}

fn spinner(message: &'static str) -> Result<ProgressBar> {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::with_template("{spinner:.green} {msg}")
            .wrap_err("failed to create progress style")?,
    );
    pb.set_message(message);
    pb.enable_steady_tick(Duration::from_millis(100));
    Ok(pb)
}

fn check_output(output: &str) -> Result<()> {
    match output.to_lowercase().as_str() {
        "table" | "json" => Ok(()),
        _ => Err(eyre!(
            "unknown output format '{}'; use 'table' or 'json'",
            output
        )),
    }
}

fn is_json(output: &str) -> bool {
    output.eq_ignore_ascii_case("json")
}

async fn handle_block(ctx: &AppContext, args: BlockArgs) -> Result<()> {
    check_output(&args.output)?;
    let tracker = build_tracker(ctx, EngineConfig::default()).await?;

    let cancel = cancel_on_timeout_or_interrupt(Duration::from_secs(args.timeout_secs));
    let pb = spinner("analyzing block")?;
    let outcome = tracker.detect_and_estimate(args.number, &cancel).await;
    pb.finish_and_clear();
    cancel.cancel();

    let result = outcome.wrap_err_with(|| format!("failed to analyze block {}", args.number))?;

    if is_json(&args.output) {
        let json = serde_json::to_string_pretty(&result).wrap_err("failed to serialize JSON")?;
        println!("{}", json);
    } else {
        print_block_table(&result);
    }

    info!(
        block_number = result.block_number,
        opportunities = result.opportunities.len(),
        validator_reward = result.validator_reward,
        "block command completed"
    );
    Ok(())
}

async fn handle_rewards(ctx: &AppContext, args: RewardsArgs) -> Result<()> {
    check_output(&args.output)?;
    let tracker = build_tracker(ctx, EngineConfig::default()).await?;

    let cancel = cancel_on_timeout_or_interrupt(Duration::from_secs(args.timeout_secs));
    let pb = spinner("scanning block range")?;
    let outcome = tracker
        .scan_range(args.validator, args.from_block, args.to_block, &cancel)
        .await;
    pb.finish_and_clear();
    cancel.cancel();

    let result = outcome.wrap_err("failed to scan block range")?;

    if is_json(&args.output) {
        let json = serde_json::to_string_pretty(&result).wrap_err("failed to serialize JSON")?;
        println!("{}", json);
    } else {
        print_range_table(&result);
    }

    info!(
        validator_index = result.validator_index,
        from_block = result.from_block,
        to_block = result.to_block,
        mev_blocks = result.mev_blocks,
        "rewards command completed"
    );
    Ok(())
}

async fn handle_simulate(ctx: &AppContext, args: SimulateArgs) -> Result<()> {
    check_output(&args.output)?;
    let config = EngineConfig {
        seed: args.seed,
        ..EngineConfig::default()
    };
    let tracker = build_tracker(ctx, config).await?;

    let cancel = cancel_on_timeout_or_interrupt(Duration::from_secs(args.timeout_secs));
    let pb = spinner("calibrating from recent blocks")?;
    let outcome = tracker.simulate(args.validator, args.blocks, &cancel).await;
    pb.finish_and_clear();
    cancel.cancel();

    let result = outcome.wrap_err("failed to simulate rewards")?;

    if is_json(&args.output) {
        let json = serde_json::to_string_pretty(&result).wrap_err("failed to serialize JSON")?;
        println!("{}", json);
    } else {
        print_simulation_table(&result);
    }

    info!(
        validator_index = result.validator_index,
        simulated_blocks = result.simulated_block_count,
        blocks_with_mev = result.blocks_with_mev,
        "simulate command completed"
    );
    Ok(())
}

fn print_block_table(result: &BlockResult) {
    let mut table = Table::new();
    table.load_preset(UTF8_BORDERS_ONLY);
    table.set_header(vec!["Type", "Transactions", "Gross Fees", "First Tx"]);

    for opp in &result.opportunities {
        let first = opp
            .transactions
            .first()
            .map(|tx| truncate_hash(&tx.hash.to_string()))
            .unwrap_or_default();
        table.add_row(vec![
            opp.kind.to_string(),
            opp.transactions.len().to_string(),
            format_eth(opp.profit),
            first,
        ]);
    }

    println!("Block {}\n", result.block_number);
    if result.opportunities.is_empty() {
        println!("  No opportunities detected.\n");
    } else {
        println!("{}\n", table);
    }
    println!(
        "  Estimated validator reward: {}\n",
        format_eth(result.validator_reward)
    );
}

fn print_range_table(result: &RangeResult) {
    let mut table = Table::new();
    table.load_preset(UTF8_BORDERS_ONLY);
    table.set_header(vec!["Block", "Opportunities", "Validator Reward"]);

    // Results arrive in completion order; sort for display only.
    let mut blocks: Vec<&BlockResult> = result.blocks.iter().filter(|b| b.has_mev()).collect();
    blocks.sort_by_key(|b| b.block_number);

    for block in blocks {
        let kinds = block
            .opportunities
            .iter()
            .map(|o| o.kind.to_string())
            .collect::<Vec<_>>()
            .join(", ");
        table.add_row(vec![
            block.block_number.to_string(),
            kinds,
            format_eth(block.validator_reward),
        ]);
    }

    println!("{}\n", table);
    println!(
        "Summary (validator {}, blocks {}-{}):",
        result.validator_index, result.from_block, result.to_block
    );
    println!("  Total Blocks:   {}", result.total_blocks);
    println!("  MEV Blocks:     {}", result.mev_blocks);
    println!("  Total Reward:   {}\n", format_eth(result.total_reward));
}

fn print_simulation_table(result: &SimulationResult) {
    let mut table = Table::new();
    table.load_preset(UTF8_BORDERS_ONLY);
    table.set_header(vec!["Block", "Has MEV", "Estimated Reward"]);

    for block in result.blocks.iter().filter(|b| b.has_mev) {
        table.add_row(vec![
            block.block_number.to_string(),
            "yes".to_string(),
            format_eth(block.estimated_reward),
        ]);
    }

    println!("{}\n", table);
    println!(
        "Summary (validator {}, {} simulated blocks):",
        result.validator_index, result.simulated_block_count
    );
    println!(
        "  MEV Probability: {:.2}%",
        result.mev_probability * 100.0
    );
    println!("  Blocks with MEV: {}", result.blocks_with_mev);
    println!("  Total Reward:    {}", format_eth(result.total_reward));
    println!("  Average Reward:  {}\n", format_eth(result.average_reward));
}

/// Truncate a hex hash/address for compact table display.
fn truncate_hash(hash: &str) -> String {
    if hash.len() > 14 {
        format!("{}…{}", &hash[..8], &hash[hash.len() - 4..])
    } else {
        hash.to_string()
    }
}
