//! CLI definition and dispatch.

use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::adapters::paper_terminal::{PaperSettings, PaperTerminal};
use crate::adapters::system_clock::SystemClock;
use crate::adapters::tracing_log_adapter::TracingLogSink;
use crate::domain::config_validation::{asset_specs, build_strategy_config, AssetSpec};
use crate::domain::coordinator::Coordinator;
use crate::domain::error::TraderError;
use crate::domain::risk::{fetch_market, RiskGate};
use crate::domain::signal;
use crate::domain::strategy::StrategyConfig;
use crate::domain::strategy_loop::{AssetStrategy, StrategyLoop};
use crate::ports::clock_port::Clock;
use crate::ports::config_port::ConfigPort;
use crate::ports::log_port::LogSink;
use crate::ports::terminal_port::TerminalPort;

#[derive(Parser, Debug)]
#[command(name = "multitrader", about = "Multi-asset signal evaluation and order dispatch")]
pub struct Cli {
    /// Log debug-level engine events
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run every configured asset against the paper terminal
    ///
    /// With `--duration-secs` the strategies are stopped after the deadline
    /// and a status table is printed; without it they run until killed.
    Run {
        #[arg(short, long)]
        config: PathBuf,
        /// Stop after this many seconds; runs until killed otherwise
        #[arg(long)]
        duration_secs: Option<u64>,
    },
    /// Validate a configuration file and print the resolved settings
    Validate {
        #[arg(short, long)]
        config: PathBuf,
    },
    /// Evaluate one asset once without submitting an order
    Evaluate {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(short, long)]
        asset: String,
    },
}

pub fn init_tracing(verbose: bool) {
    let level = if verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };
    let _ = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

pub fn run(cli: Cli) -> ExitCode {
    init_tracing(cli.verbose);
    let result = match cli.command {
        Command::Run {
            config,
            duration_secs,
        } => run_engine(&config, duration_secs.map(Duration::from_secs)),
        Command::Validate { config } => run_validate(&config),
        Command::Evaluate { config, asset } => run_evaluate(&config, &asset),
    };
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            (&e).into()
        }
    }
}

/// Everything a command needs from one configuration file.
pub struct LoadedConfig {
    pub strategy: StrategyConfig,
    pub assets: Vec<AssetSpec>,
    pub paper: PaperSettings,
}

pub fn load_config(path: &Path) -> Result<LoadedConfig, TraderError> {
    let adapter = FileConfigAdapter::from_file(path)?;
    resolve_config(&adapter, path.parent().unwrap_or(Path::new(".")))
}

pub fn resolve_config(config: &dyn ConfigPort, base_dir: &Path) -> Result<LoadedConfig, TraderError> {
    Ok(LoadedConfig {
        strategy: build_strategy_config(config)?,
        assets: asset_specs(config)?,
        paper: PaperSettings::from_config(config, base_dir)?,
    })
}

fn run_engine(config_path: &Path, duration: Option<Duration>) -> Result<(), TraderError> {
    eprintln!("Loading config from {}", config_path.display());
    let loaded = load_config(config_path)?;
    let max_spread = loaded.strategy.risk.max_spread_points;

    let terminal: Arc<dyn TerminalPort> = Arc::new(PaperTerminal::new(loaded.paper));
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let log: Arc<dyn LogSink> = Arc::new(TracingLogSink::new());
    let coordinator = Coordinator::new(Arc::clone(&terminal), clock, loaded.strategy);

    for spec in &loaded.assets {
        match fetch_market(terminal.as_ref(), &spec.asset, max_spread)? {
            Ok(_) => {
                if !coordinator.add(&spec.asset, spec.timeframe, spec.lot, Arc::clone(&log)) {
                    eprintln!("warning: {} could not be started", spec.asset);
                }
            }
            Err(rejection) => eprintln!("warning: skipping {} ({rejection})", spec.asset),
        }
    }

    let started = coordinator.assets();
    if started.is_empty() {
        return Err(TraderError::MarketUnavailable {
            asset: loaded
                .assets
                .iter()
                .map(|s| s.asset.as_str())
                .collect::<Vec<_>>()
                .join(","),
            reason: "no configured asset is tradable".to_string(),
        });
    }
    eprintln!("Running {} strategies: {}", started.len(), started.join(", "));

    let Some(duration) = duration else {
        // No deadline: the strategies run until the process is killed.
        loop {
            thread::sleep(Duration::from_secs(60));
        }
    };
    thread::sleep(duration);

    coordinator.stop_all();
    print_statuses(&coordinator);
    coordinator.shutdown();
    Ok(())
}

fn print_statuses(coordinator: &Coordinator) {
    println!(
        "{:<10} {:<4} {:>8} {:<8} {:>7} {:>12}",
        "asset", "tf", "lot", "state", "cycles", "last ticket"
    );
    for asset in coordinator.assets() {
        let Some(status) = coordinator.status_of(&asset) else {
            continue;
        };
        println!(
            "{:<10} {:<4} {:>8} {:<8} {:>7} {:>12}",
            status.asset,
            status.timeframe.to_string(),
            status.lot,
            format!("{:?}", status.state),
            status.cycles,
            status
                .last_ticket
                .map(|t| t.to_string())
                .unwrap_or_else(|| "-".to_string())
        );
    }
}

fn run_validate(config_path: &Path) -> Result<(), TraderError> {
    let loaded = load_config(config_path)?;
    let s = &loaded.strategy;

    println!("Configuration is valid.");
    println!(
        "  Engine: cycle {}ms, backoff {}ms, {} bars (min {})",
        s.engine.cycle_interval.as_millis(),
        s.engine.backoff_interval.as_millis(),
        s.engine.bar_count,
        s.engine.min_bars
    );
    println!(
        "  Indicators: EMA {}/{}/{}, MACD {}/{}/{}, RSI {}, BB {}x{}, Stoch {}/{}/{}, ATR {}, Momentum {}",
        s.indicators.ema_fast,
        s.indicators.ema_mid,
        s.indicators.ema_slow,
        s.indicators.macd_fast,
        s.indicators.macd_slow,
        s.indicators.macd_signal,
        s.indicators.rsi_period,
        s.indicators.bb_period,
        s.indicators.bb_deviation,
        s.indicators.stoch_period,
        s.indicators.stoch_k_smooth,
        s.indicators.stoch_d_smooth,
        s.indicators.atr_period,
        s.indicators.momentum_period
    );
    println!(
        "  Risk: max {} positions, daily loss {}%, spread {} pts, session {}-{}, R:R {}",
        s.risk.max_positions,
        s.risk.max_daily_loss_pct,
        s.risk.max_spread_points,
        s.risk.session_start.format("%H:%M"),
        s.risk.session_end.format("%H:%M"),
        s.risk.min_reward_risk
    );
    for spec in &loaded.assets {
        println!("  Asset: {} {} lot {}", spec.asset, spec.timeframe, spec.lot);
    }
    println!("  Paper data: {}", loaded.paper.data_dir.display());
    Ok(())
}

fn run_evaluate(config_path: &Path, asset: &str) -> Result<(), TraderError> {
    let loaded = load_config(config_path)?;
    let asset = asset.trim().to_uppercase();
    let spec = loaded
        .assets
        .iter()
        .find(|s| s.asset == asset)
        .ok_or_else(|| TraderError::config_invalid("assets", "symbols", format!("{asset} is not configured")))?;

    let terminal: Arc<dyn TerminalPort> = Arc::new(PaperTerminal::new(loaded.paper.clone()));
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let config = Arc::new(loaded.strategy);
    let strategy = Arc::new(AssetStrategy::new(&spec.asset, spec.timeframe, spec.lot));
    let worker = StrategyLoop::new(
        strategy,
        Arc::clone(&config),
        Arc::clone(&terminal),
        Arc::clone(&clock),
        Arc::new(TracingLogSink::new()),
    );

    let analysis = worker.analyse()?;
    let ev = &analysis.evaluation;
    println!("{} ({})", spec.asset, spec.timeframe);
    println!("  Trend: {} (strength {}/5)", ev.trend.direction, ev.trend.strength);
    println!(
        "  RSI {:.1}, %K {:.1}, momentum {:.2}, volume {}",
        ev.rsi,
        ev.stoch_k,
        ev.momentum,
        if ev.volume_high { "high" } else { "normal" }
    );
    println!(
        "  Confirmations: buy {}, sell {}",
        ev.buy_confirmations, ev.sell_confirmations
    );

    let gate = RiskGate::new(terminal.as_ref(), clock.as_ref(), &config.risk).check_entry()?;
    if let Err(rejection) = &gate {
        println!("  Risk gate: {rejection}");
    }
    println!("  Candidate: {}", ev.candidate);
    println!("  Decision: {}", signal::decide(ev, &gate));

    if let Some(plan) = analysis.plan(config.risk.min_reward_risk)? {
        println!(
            "  Sizing: {} SL {:.2} pts (x{:.2}), TP {:.2} pts (x{:.2})",
            plan.side, plan.sl_distance, plan.sl_multiplier, plan.tp_distance, plan.tp_multiplier
        );
    }
    Ok(())
}
