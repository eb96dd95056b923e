//! Tradeloom CLI: run one multi-agent trading analysis from the command line.
//!
//! Exit codes: 0 success; 1 initialization/config error; 2 runtime failure
//! with partial state; 130 cancelled (Ctrl-C).

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use tradeloom::config::{McpConfig, Settings};
use tradeloom::state::AnalysisState;
use tradeloom::workflow::Orchestrator;

#[derive(Parser, Debug)]
#[command(name = "tradeloom")]
#[command(about = "Tradeloom: multi-agent trading analysis")]
struct Args {
    /// The analysis question (e.g. "analyze AAPL")
    query: Option<String>,

    /// MCP server config file
    #[arg(long, value_name = "PATH", default_value = "mcp_config.json")]
    config: PathBuf,

    /// Session log directory (overrides DUMP_DIR)
    #[arg(long, value_name = "DIR")]
    dump_dir: Option<PathBuf>,

    /// Debug logging (overrides RUST_LOG default)
    #[arg(long)]
    debug: bool,

    /// Skip MCP entirely and run in no-tool mode
    #[arg(long)]
    no_mcp: bool,

    /// Also run the extended analysts (company overview, shareholder, product)
    #[arg(long)]
    extended_analysts: bool,

    /// Print workflow and tool catalog info as JSON and exit
    #[arg(long)]
    info: bool,
}

fn init_logging(debug: bool) {
    let default_filter = if debug { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn print_banner() {
    println!("==============================================");
    println!("  tradeloom: multi-agent trading analysis");
    println!("==============================================");
}

fn print_result(state: &AnalysisState) {
    println!();
    println!("analysis for: {}", state.user_query);
    println!(
        "investment debate rounds: {}, risk debate rounds: {}",
        state.investment_debate_state.count, state.risk_debate_state.count
    );
    if !state.investment_plan.is_empty() {
        println!("\n--- investment decision ---\n{}", state.investment_plan);
    }
    if !state.trader_investment_plan.is_empty() {
        println!("\n--- trading plan ---\n{}", state.trader_investment_plan);
    }
    if !state.final_trade_decision.is_empty() {
        println!("\n--- final decision ---\n{}", state.final_trade_decision);
    }
    if !state.errors.is_empty() {
        println!("\nerrors ({}):", state.errors.len());
        for error in &state.errors {
            println!("  - {error}");
        }
    }
    if !state.warnings.is_empty() {
        println!("\nwarnings ({}):", state.warnings.len());
        for warning in &state.warnings {
            println!("  - {warning}");
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    if let Err(e) = env_config::load_and_apply("tradeloom", None) {
        eprintln!("config bootstrap failed: {e}");
        return ExitCode::from(1);
    }
    init_logging(args.debug);

    let mut settings = match Settings::from_env() {
        Ok(s) => s,
        Err(e) => {
            eprintln!("configuration error: {e}");
            return ExitCode::from(1);
        }
    };
    if let Some(dir) = args.dump_dir {
        settings.dump_dir = dir;
    }
    if args.debug {
        settings.workflow.debug_mode = true;
    }
    if args.extended_analysts {
        settings.workflow.extended_analysts = true;
    }

    let mcp_config = if args.no_mcp {
        McpConfig::default()
    } else {
        match McpConfig::load(&args.config) {
            Ok(c) => c,
            Err(e) => {
                eprintln!("configuration error: {e}");
                return ExitCode::from(1);
            }
        }
    };

    let orchestrator = Orchestrator::new(settings, mcp_config);

    if let Err(e) = orchestrator.initialize().await {
        eprintln!("MCP initialization error: {e}");
        orchestrator.close().await;
        return ExitCode::from(1);
    }

    if args.info {
        match serde_json::to_string_pretty(&orchestrator.workflow_info()) {
            Ok(json) => println!("{json}"),
            Err(e) => eprintln!("workflow info serialization failed: {e}"),
        }
        orchestrator.close().await;
        return ExitCode::SUCCESS;
    }

    let Some(query) = args.query else {
        eprintln!("usage: tradeloom <query> (or tradeloom --info)");
        orchestrator.close().await;
        return ExitCode::from(1);
    };

    print_banner();

    let cancel = CancellationToken::new();
    let signal_token = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Ctrl-C received, cancelling analysis");
            signal_token.cancel();
        }
    });

    let result = orchestrator.run_analysis(&query, cancel.clone()).await;
    orchestrator.close().await;

    let state = match result {
        Ok(s) => s,
        Err(e) => {
            eprintln!("failed to create session log: {e}");
            return ExitCode::from(1);
        }
    };

    print_result(&state);

    if cancel.is_cancelled() {
        ExitCode::from(130)
    } else if state.final_trade_decision.is_empty() {
        // The run never reached the terminal node: partial state.
        ExitCode::from(2)
    } else {
        ExitCode::SUCCESS
    }
}
