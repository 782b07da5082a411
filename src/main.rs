use accessor::InMemoryBusinessData;
use chrono::{Datelike, Utc};
use clap::{Parser, Subcommand};
use comfy_table::Table;
use core_types::{MetricCode, Period};
use database::{connect, run_migrations, PgBusinessData, PgKpiStore};
use engine::{KpiEngine, KpiScheduler};
use std::sync::Arc;
use store::{MemoryAlertSink, MemorySnapshotStore};
use tracing_subscriber::EnvFilter;

/// The main entry point for the Landmark KPI engine.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from a .env file when one is present.
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run => handle_run().await,
        Commands::Cycle(args) => handle_cycle(args).await,
        Commands::Compute(args) => handle_compute(args).await,
        Commands::Compare(args) => handle_compare(args).await,
        Commands::History(args) => handle_history(args).await,
        Commands::Demo(args) => handle_demo(args).await,
    }
}

// ==============================================================================
// CLI Structure
// ==============================================================================

/// Back-office KPI engine: computes, tracks and alerts on brokerage
/// indicators.
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the scheduler and compute KPIs at the configured cadence.
    Run,
    /// Run a single computation cycle now.
    Cycle(MonthArg),
    /// Compute the full catalog for one segment without persisting anything.
    Compute(ComputeArgs),
    /// Compare one metric against the previous period.
    Compare(CompareArgs),
    /// Print the snapshot history of one metric.
    History(HistoryArgs),
    /// Run a cycle against bundled in-memory fixtures (no database needed).
    Demo(MonthArg),
}

#[derive(Parser)]
struct MonthArg {
    /// The calendar month to compute (format: YYYY-MM). Defaults to the
    /// current month.
    #[arg(long)]
    month: Option<String>,
}

#[derive(Parser)]
struct ComputeArgs {
    /// The segment code to compute (e.g. "resale").
    #[arg(long)]
    segment: String,

    #[arg(long)]
    month: Option<String>,
}

#[derive(Parser)]
struct CompareArgs {
    /// The metric code (e.g. "conversion_rate").
    #[arg(long)]
    metric: MetricCode,

    #[arg(long)]
    segment: String,

    #[arg(long)]
    month: Option<String>,
}

#[derive(Parser)]
struct HistoryArgs {
    #[arg(long)]
    metric: MetricCode,

    #[arg(long)]
    segment: String,

    /// First month of the range (format: YYYY-MM), inclusive.
    #[arg(long)]
    from: String,

    /// Last month of the range (format: YYYY-MM), inclusive.
    #[arg(long)]
    to: String,
}

// ==============================================================================
// Command Handlers
// ==============================================================================

/// Wires the engine against Postgres: config, pool, migrations.
async fn live_engine() -> anyhow::Result<Arc<KpiEngine>> {
    let config = configuration::load_config()?;
    let pool = connect().await?;
    run_migrations(&pool).await?;

    let kpi_store = Arc::new(PgKpiStore::new(pool.clone()));
    let engine = KpiEngine::new(
        config,
        Arc::new(PgBusinessData::new(pool)),
        kpi_store.clone(),
        kpi_store,
    );
    Ok(Arc::new(engine))
}

async fn handle_run() -> anyhow::Result<()> {
    let engine = live_engine().await?;
    let scheduler = Arc::new(KpiScheduler::new(engine));
    // Runs forever; the first cycle fires immediately.
    scheduler.run().await;
    Ok(())
}

async fn handle_cycle(args: MonthArg) -> anyhow::Result<()> {
    let engine = live_engine().await?;
    let report = engine.run_cycle(parse_month_or_current(args.month.as_deref())?).await;
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

async fn handle_compute(args: ComputeArgs) -> anyhow::Result<()> {
    let engine = live_engine().await?;
    if engine.config().segment(&args.segment).is_none() {
        anyhow::bail!("unknown segment '{}'", args.segment);
    }
    let period = parse_month_or_current(args.month.as_deref())?;
    let outcomes = engine.compute_all(&args.segment, period).await;
    print_outcomes(&engine, &args.segment, period, &outcomes);
    Ok(())
}

async fn handle_compare(args: CompareArgs) -> anyhow::Result<()> {
    let engine = live_engine().await?;
    let period = parse_month_or_current(args.month.as_deref())?;
    let result = engine.compare(args.metric, &args.segment, period).await?;

    println!(
        "{} [{}] {}: {} {}",
        args.metric,
        args.segment,
        result.current.period.label(),
        result.current.value.round_dp(2),
        result.current.unit,
    );
    match result.previous {
        Some(previous) => {
            let pct = result
                .percentage_delta
                .map(|p| format!("{}%", p.round_dp(2)))
                .unwrap_or_else(|| "n/a".to_string());
            println!(
                "vs {}: {} {} (delta {}, {})",
                previous.period.label(),
                previous.value.round_dp(2),
                previous.unit,
                result.absolute_delta.round_dp(2),
                pct,
            );
        }
        None => println!("No previous period on record."),
    }
    Ok(())
}

async fn handle_history(args: HistoryArgs) -> anyhow::Result<()> {
    let engine = live_engine().await?;
    let from = parse_month(&args.from)?;
    let to = parse_month(&args.to)?;
    let series = engine
        .history(args.metric, &args.segment, from.start, to.end)
        .await?;

    let mut table = Table::new();
    table.set_header(vec!["Period", "Value", "Unit", "Computed at"]);
    for snapshot in &series {
        table.add_row(vec![
            snapshot.period.label(),
            snapshot.value.round_dp(2).to_string(),
            snapshot.unit.to_string(),
            snapshot.computed_at.format("%Y-%m-%d %H:%M").to_string(),
        ]);
    }
    println!("{table}");
    Ok(())
}

async fn handle_demo(args: MonthArg) -> anyhow::Result<()> {
    let config = demo_config();
    let engine = Arc::new(KpiEngine::new(
        config,
        Arc::new(InMemoryBusinessData::demo()),
        Arc::new(MemorySnapshotStore::new()),
        Arc::new(MemoryAlertSink::new()),
    ));

    let period = parse_month_or_current(args.month.as_deref())?;
    let report = engine.run_cycle(period).await;
    println!("{}", serde_json::to_string_pretty(&report)?);

    for segment in ["resale", "new_build"] {
        let outcomes = engine.compute_all(segment, period).await;
        print_outcomes(&engine, segment, period, &outcomes);
    }
    Ok(())
}

/// A self-contained configuration for the demo fixtures, so the command
/// works without a config.toml on disk.
fn demo_config() -> configuration::Config {
    configuration::Config {
        engine: configuration::EngineSettings::default(),
        segments: vec![
            configuration::SegmentSettings {
                code: "resale".to_string(),
                name: "Resale".to_string(),
                target_stock: Some(20),
                active: true,
            },
            configuration::SegmentSettings {
                code: "new_build".to_string(),
                name: "New build".to_string(),
                target_stock: None,
                active: true,
            },
        ],
        alerting: configuration::AlertingSettings::default(),
    }
}

// ==============================================================================
// Output Helpers
// ==============================================================================

fn print_outcomes(
    engine: &KpiEngine,
    segment: &str,
    period: Period,
    outcomes: &[indicators::MetricOutcome],
) {
    println!("KPIs for segment '{}' in {}:", segment, period.label());
    let mut table = Table::new();
    table.set_header(vec!["Metric", "Value", "Unit", "Notes"]);
    for outcome in outcomes {
        let definition = engine.indicators().registry().get(outcome.code);
        match &outcome.result {
            Ok(kpi) => {
                let notes = if kpi.is_undefined() { "undefined" } else { "" };
                table.add_row(vec![
                    definition.name.to_string(),
                    kpi.value.round_dp(2).to_string(),
                    kpi.unit.to_string(),
                    notes.to_string(),
                ]);
            }
            Err(e) => {
                table.add_row(vec![
                    definition.name.to_string(),
                    "-".to_string(),
                    "-".to_string(),
                    format!("failed: {e}"),
                ]);
            }
        }
    }
    println!("{table}");
}

/// Parses a `YYYY-MM` argument into a calendar-month period.
fn parse_month(input: &str) -> anyhow::Result<Period> {
    let (year, month) = input
        .split_once('-')
        .ok_or_else(|| anyhow::anyhow!("expected YYYY-MM, got '{input}'"))?;
    let year: i32 = year.parse()?;
    let month: u32 = month.parse()?;
    Ok(Period::month(year, month)?)
}

fn parse_month_or_current(input: Option<&str>) -> anyhow::Result<Period> {
    match input {
        Some(input) => parse_month(input),
        None => {
            let now = Utc::now();
            Ok(Period::month(now.year(), now.month())?)
        }
    }
}
