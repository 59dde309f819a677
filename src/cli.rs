//! CLI definition and dispatch.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;

use crate::adapters::csv_adapter::CsvUniverseAdapter;
use crate::adapters::csv_report_adapter::CsvReportAdapter;
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::domain::config_validation::validate_config;
use crate::domain::engine::{self, Comparison, EngineConfig, Recommendation};
use crate::domain::error::TierfolioError;
use crate::domain::instrument::Instrument;
use crate::domain::risk_tier::{RiskTier, RiskTierTable, standard_table};
use crate::domain::screener::{CandidatePool, screen_with};
use crate::domain::strategy::Strategy;
use crate::domain::weights::StrategyResult;
use crate::ports::config_port::ConfigPort;
use crate::ports::report_port::ReportPort;
use crate::ports::universe_port::UniversePort;

#[derive(Parser, Debug)]
#[command(name = "tierfolio", about = "Risk-tiered portfolio optimizer")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Print the risk tier table
    Tiers {
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
    /// Screen the universe for a tier and print the ranked pool
    Screen {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long)]
        tier: Option<String>,
        /// Restrict the universe to these tickers (comma separated)
        #[arg(long, value_delimiter = ',')]
        tickers: Vec<String>,
    },
    /// Optimize one strategy (tier default unless given)
    Optimize {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long)]
        tier: Option<String>,
        /// Restrict the universe to these tickers (comma separated)
        #[arg(long, value_delimiter = ',')]
        tickers: Vec<String>,
        #[arg(short, long)]
        strategy: Option<String>,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Run every strategy and rank them
    Compare {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long)]
        tier: Option<String>,
        /// Restrict the universe to these tickers (comma separated)
        #[arg(long, value_delimiter = ',')]
        tickers: Vec<String>,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Validate a configuration file
    Validate {
        #[arg(short, long)]
        config: PathBuf,
    },
}

/// Everything a run needs from the configuration file.
pub struct RunContext {
    pub table: RiskTierTable,
    pub engine: EngineConfig,
    pub data_path: PathBuf,
    pub tier: RiskTier,
    /// Empty means the whole universe.
    pub tickers: Vec<String>,
}

pub fn run(cli: Cli) -> ExitCode {
    let outcome = match cli.command {
        Command::Tiers { config } => run_tiers(config.as_ref()),
        Command::Screen { config, tier, tickers } => {
            load_context(&config, tier.as_deref(), tickers).and_then(|ctx| {
                let universe = CsvUniverseAdapter::new(ctx.data_path.clone());
                run_screen_pipeline(&universe, &ctx).map(|_| ())
            })
        }
        Command::Optimize {
            config,
            tier,
            tickers,
            strategy,
            output,
        } => load_context(&config, tier.as_deref(), tickers).and_then(|ctx| {
            let strategy = parse_strategy(strategy.as_deref())?;
            let universe = CsvUniverseAdapter::new(ctx.data_path.clone());
            run_optimize_pipeline(&universe, &CsvReportAdapter::new(), &ctx, strategy, output.as_ref())
                .map(|_| ())
        }),
        Command::Compare {
            config,
            tier,
            tickers,
            output,
        } => load_context(&config, tier.as_deref(), tickers).and_then(|ctx| {
            let universe = CsvUniverseAdapter::new(ctx.data_path.clone());
            run_compare_pipeline(&universe, &CsvReportAdapter::new(), &ctx, output.as_ref()).map(|_| ())
        }),
        Command::Validate { config } => run_validate(&config),
    };

    match outcome {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            (&e).into()
        }
    }
}

pub fn load_config(path: &PathBuf) -> Result<FileConfigAdapter, TierfolioError> {
    tracing::info!(path = %path.display(), "loading config");
    FileConfigAdapter::from_file(path)
}

/// `--tier` wins over `[engine] tier`; one of them is required.
pub fn resolve_tier(tier_arg: Option<&str>, default: Option<RiskTier>) -> Result<RiskTier, TierfolioError> {
    if let Some(arg) = tier_arg {
        return arg.parse::<RiskTier>().map_err(|reason| TierfolioError::ConfigInvalid {
            section: "cli".into(),
            key: "tier".into(),
            reason,
        });
    }
    default.ok_or_else(|| TierfolioError::ConfigMissing {
        section: "engine".into(),
        key: "tier".into(),
    })
}

pub fn parse_strategy(arg: Option<&str>) -> Result<Option<Strategy>, TierfolioError> {
    arg.map(|s| {
        s.parse::<Strategy>().map_err(|reason| TierfolioError::ConfigInvalid {
            section: "cli".into(),
            key: "strategy".into(),
            reason,
        })
    })
    .transpose()
}

pub fn build_context(config: &dyn ConfigPort, tier_arg: Option<&str>) -> Result<RunContext, TierfolioError> {
    let validated = validate_config(config)?;
    Ok(RunContext {
        tier: resolve_tier(tier_arg, validated.default_tier)?,
        table: validated.table,
        engine: validated.engine,
        data_path: validated.data_path,
        tickers: Vec::new(),
    })
}

fn load_context(path: &PathBuf, tier_arg: Option<&str>, tickers: Vec<String>) -> Result<RunContext, TierfolioError> {
    let adapter = load_config(path)?;
    let mut ctx = build_context(&adapter, tier_arg)?;
    ctx.tickers = tickers;
    Ok(ctx)
}

/// The whole universe, or only the tickers the run names.
pub fn load_instruments(universe: &dyn UniversePort, ctx: &RunContext) -> Result<Vec<Instrument>, TierfolioError> {
    if ctx.tickers.is_empty() {
        universe.load_universe()
    } else {
        tracing::info!(count = ctx.tickers.len(), "loading ticker subset");
        universe.load_subset(&ctx.tickers)
    }
}

fn run_tiers(config: Option<&PathBuf>) -> Result<(), TierfolioError> {
    let table = match config {
        Some(path) => RiskTierTable::from_config(&load_config(path)?)?,
        None => standard_table().clone(),
    };
    print!("{}", format_tier_table(&table));
    Ok(())
}

pub fn format_tier_table(table: &RiskTierTable) -> String {
    let mut out = format!(
        "{:<16} {:>6} {:>11} {:>14} {:>12} {:>10}  {}\n",
        "tier", "cap", "equity", "mix (e/b/c)", "min revenue", "min margin", "preferred sectors"
    );
    for p in table.profiles() {
        let (revenue, margin) = match p.thresholds {
            Some(t) => (format!("{:.0}", t.min_revenue), format!("{:.1}%", t.min_operating_margin)),
            None => ("-".to_string(), "-".to_string()),
        };
        let sectors: Vec<&str> = p.preferred_sectors.iter().map(|s| s.sector.as_str()).collect();
        out.push_str(&format!(
            "{:<16} {:>5.0}% {:>4.0}%-{:>3.0}% {:>4.0}/{:>2.0}/{:>2.0}    {:>12} {:>10}  {}\n",
            p.tier.name(),
            p.single_position_cap * 100.0,
            p.equity_share.min * 100.0,
            p.equity_share.max * 100.0,
            p.allocation.equity * 100.0,
            p.allocation.bonds * 100.0,
            p.allocation.cash * 100.0,
            revenue,
            margin,
            sectors.join(", ")
        ));
    }
    out
}

pub fn run_screen_pipeline(
    universe: &dyn UniversePort,
    ctx: &RunContext,
) -> Result<CandidatePool, TierfolioError> {
    let instruments = load_instruments(universe, ctx)?;
    let profile = ctx.table.get(ctx.tier);
    let pool = screen_with(&instruments, profile, &ctx.engine.screening)?;

    println!("{:<4} {:<10} {:<16} {:>9} {:>9} {:>9} {:>9}", "rank", "ticker", "sector", "score", "profit", "stable", "growth");
    for (i, c) in pool.candidates().iter().enumerate() {
        println!(
            "{:<4} {:<10} {:<16} {:>9.3} {:>9.3} {:>9.3} {:>9.3}",
            i + 1,
            c.instrument.ticker,
            c.instrument.sector,
            c.score.composite,
            c.score.profitability,
            c.score.stability,
            c.score.growth
        );
    }
    if !pool.excluded().is_empty() {
        eprintln!("\nExcluded:");
        for e in pool.excluded() {
            eprintln!("  {}: {:?}", e.ticker, e.reason);
        }
    }
    Ok(pool)
}

pub fn run_optimize_pipeline(
    universe: &dyn UniversePort,
    reporter: &dyn ReportPort,
    ctx: &RunContext,
    strategy: Option<Strategy>,
    output_path: Option<&PathBuf>,
) -> Result<Recommendation, TierfolioError> {
    let instruments = load_instruments(universe, ctx)?;
    let profile = ctx.table.get(ctx.tier);
    let rec = engine::recommend(&instruments, profile, strategy, &ctx.engine)?;

    if let Some(fallback) = &rec.fallback {
        eprintln!(
            "warning: {} failed ({}); using {}",
            fallback.from,
            fallback.reason,
            rec.strategy()
        );
    }
    print_result(1, &rec.result);
    println!(
        "Risk grade:       {} ({} for {})",
        rec.risk_grade,
        if rec.suitable { "suitable" } else { "NOT suitable" },
        rec.tier
    );
    println!(
        "Allocation:       equity {:.0}% / bonds {:.0}% / cash {:.0}%",
        profile.allocation.equity * 100.0,
        profile.allocation.bonds * 100.0,
        profile.allocation.cash * 100.0
    );
    for warning in &rec.warnings {
        eprintln!("warning: {}", warning);
    }

    if let Some(output) = output_path {
        reporter.write(std::slice::from_ref(&rec.result), profile, &output.to_string_lossy())?;
        eprintln!("\nReport written to: {}", output.display());
    }
    Ok(rec)
}

pub fn run_compare_pipeline(
    universe: &dyn UniversePort,
    reporter: &dyn ReportPort,
    ctx: &RunContext,
    output_path: Option<&PathBuf>,
) -> Result<Comparison, TierfolioError> {
    let instruments = load_instruments(universe, ctx)?;
    let profile = ctx.table.get(ctx.tier);
    let cmp = engine::compare_universe(&instruments, profile, &ctx.engine)?;

    for (i, result) in cmp.results.iter().enumerate() {
        print_result(i + 1, result);
    }
    let missing: Vec<String> = Strategy::ALL
        .iter()
        .filter(|s| !cmp.results.iter().any(|r| r.strategy == **s))
        .map(|s| s.to_string())
        .collect();
    if !missing.is_empty() {
        eprintln!("warning: omitted strategies: {}", missing.join(", "));
    }

    if let Some(output) = output_path {
        reporter.write(&cmp.results, profile, &output.to_string_lossy())?;
        eprintln!("\nReport written to: {}", output.display());
    }
    Ok(cmp)
}

fn print_result(rank: usize, result: &StrategyResult) {
    println!("\n=== #{} {} ===", rank, result.strategy);
    println!("Sharpe Ratio:     {:.3}", result.score);
    println!("Expected Return:  {:.2}%", result.stats.expected_return * 100.0);
    println!("Volatility:       {:.2}%", result.stats.volatility * 100.0);
    println!("Effective N:      {:.1}", result.stats.effective_holdings);
    for (ticker, weight) in result.weights.iter() {
        println!("  {:<10} {:>7.2}%", ticker, weight * 100.0);
    }
    for tag in &result.rationale {
        println!("  [{}]", tag);
    }
}

fn run_validate(config_path: &PathBuf) -> Result<(), TierfolioError> {
    let adapter = load_config(config_path)?;
    validate_config(&adapter)?;
    eprintln!("Configuration is valid.");
    Ok(())
}
