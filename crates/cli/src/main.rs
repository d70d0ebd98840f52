use anyhow::Context;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::info;
use tradeflow_core::{Config, Paths};
use tradeflow_export::{optimize, CoverageSummary, InputValues, PartitionedWriter};
use tradeflow_ingestion::{Mappings, RawAggregator};
use tradeflow_transform::{PriceTable, TradePipeline, WeoTable};

#[derive(Parser)]
#[command(name = "tradeflow")]
#[command(about = "Bilateral trade dataset pipeline", long_about = None)]
struct Cli {
    /// Project root holding data/, cdn_files/ and components/
    #[arg(long, default_value = ".", env = "TRADEFLOW_ROOT")]
    root: PathBuf,
    /// JSON configuration override
    #[arg(short, long)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the full dataset and the frontend input values
    Run,
    /// Build (or load) the aggregated raw trade cache only
    Aggregate,
    /// Print GDP and population coverage of the grouped countries as CSV
    Coverage,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = match &cli.config {
        Some(path) => Config::from_json_file(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => Config::default(),
    };
    let paths = Paths::new(&cli.root);

    match cli.command {
        Commands::Run => run(&config, &paths),
        Commands::Aggregate => aggregate(&config, &paths),
        Commands::Coverage => coverage(&config, &paths),
    }
}

fn run(config: &Config, paths: &Paths) -> anyhow::Result<()> {
    let pipeline = &config.pipeline;
    let mappings = Mappings::load(paths, pipeline).context("loading mappings")?;
    let wide = RawAggregator::new(paths, pipeline)
        .load_or_build(&mappings)
        .context("aggregating raw trade")?;

    let prices = PriceTable::load(pipeline.base_year, &paths.exchange_rates(), &paths.deflators())
        .context("loading exchange rates and deflators")?;
    let weo = WeoTable::load(&paths.weo(), &mappings).context("loading WEO data")?;

    let flows = TradePipeline::new(&mappings, pipeline).run(&wide, &prices, &weo)?;
    let table = optimize(flows)?;

    info!("Writing partitioned dataset");
    PartitionedWriter::new(paths.trade_dataset(), &config.export)
        .write(&table)
        .context("writing trade dataset")?;

    info!("Writing input values");
    InputValues::from_table(&table, &mappings.group_names())
        .write(&paths.input_values())
        .context("writing input values")?;

    info!("Trade data completed");
    Ok(())
}

fn aggregate(config: &Config, paths: &Paths) -> anyhow::Result<()> {
    let mappings = Mappings::load(paths, &config.pipeline).context("loading mappings")?;
    let wide = RawAggregator::new(paths, &config.pipeline)
        .load_or_build(&mappings)
        .context("aggregating raw trade")?;
    info!(
        "Aggregate holds {} pairs across {} categories",
        wide.len(),
        wide.categories.len()
    );
    Ok(())
}

fn coverage(config: &Config, paths: &Paths) -> anyhow::Result<()> {
    info!("Computing country aggregates");
    let mappings = Mappings::load(paths, &config.pipeline).context("loading mappings")?;
    let weo = WeoTable::load(&paths.weo(), &mappings).context("loading WEO data")?;
    CoverageSummary::compute(&weo, mappings.groups(), config.pipeline.end_year)
        .write_csv(std::io::stdout().lock())?;
    Ok(())
}
