//! Mortgage refinance pipeline CLI
//!
//! Each subcommand is one stage and reads what the previous stage persisted:
//!
//! ```bash
//! mortgage_refi crosswalk --output out/period_date.csv
//! mortgage_refi macro --input raw/MORTGAGE30US.csv --column rate_mortgage30us --output out/mortgage30us.csv
//! mortgage_refi macro --input raw/CPIAUCSL.csv --column cpi --output out/cpi.csv
//! mortgage_refi panel --raw-dir raw/fannie_mae --geography raw/state_fips.csv \
//!     --crosswalk out/period_date.csv --mortgage-rates out/mortgage30us.csv --output-dir out/panel
//! mortgage_refi sample --panel-dir out/panel --output out/sample.csv
//! mortgage_refi process --sample out/sample.csv --crosswalk out/period_date.csv \
//!     --mortgage-rates out/mortgage30us.csv --cpi out/cpi.csv --output-dir out/processed
//! mortgage_refi savings-table --input-dir out/processed --output out/table_savings.txt
//! mortgage_refi summary --input raw/loans.csv --output-dir out/summary
//! ```

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};

use mortgage_refi::calendar::quarters_between;
use mortgage_refi::config::DEFAULT_CONFIG_PATH;
use mortgage_refi::loan::{GeographyCrosswalk, LoanPeriod};
use mortgage_refi::panel::{load_panel, PANEL_KEYS};
use mortgage_refi::persist::read_rows;
use mortgage_refi::report::{build_savings_table, load_summary_records, write_savings_table, SummaryTables};
use mortgage_refi::{
    save_table, LoanSampler, MonthlySeries, PanelBuilder, PeriodCrosswalk, PipelineConfig, RateGapBins, SaveOptions,
    ScenarioRunner, Table,
};

/// Loan-level mortgage panel and optimal refinancing analytics
#[derive(Parser)]
#[command(name = "mortgage_refi")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Pipeline configuration (JSON)
    #[arg(short, long, default_value = DEFAULT_CONFIG_PATH, global = true)]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the date -> period crosswalk
    Crosswalk {
        #[arg(long)]
        output: PathBuf,
    },

    /// Normalise a raw (date, value) series to calendar months
    Macro {
        #[arg(long)]
        input: PathBuf,
        /// Name of the value column in the output
        #[arg(long)]
        column: String,
        #[arg(long)]
        output: PathBuf,
    },

    /// Build the loan panel of every acquisition quarter in the sample range
    Panel {
        /// Directory holding the raw `{YYYYQn}.csv` files
        #[arg(long)]
        raw_dir: PathBuf,
        #[arg(long)]
        geography: PathBuf,
        #[arg(long)]
        crosswalk: PathBuf,
        #[arg(long)]
        mortgage_rates: PathBuf,
        #[arg(long)]
        output_dir: PathBuf,
    },

    /// Draw the seeded loan sample from the quarterly panels
    Sample {
        #[arg(long)]
        panel_dir: PathBuf,
        #[arg(long)]
        output: PathBuf,
    },

    /// Run every parameter scenario over the loan sample
    Process {
        #[arg(long)]
        sample: PathBuf,
        #[arg(long)]
        crosswalk: PathBuf,
        #[arg(long)]
        mortgage_rates: PathBuf,
        #[arg(long)]
        cpi: PathBuf,
        #[arg(long)]
        output_dir: PathBuf,
    },

    /// Tabulate mean savings per scenario and sample
    SavingsTable {
        #[arg(long)]
        input_dir: PathBuf,
        #[arg(long)]
        output: PathBuf,
    },

    /// Acquisition, performance and loss statistics of the loan-level file
    Summary {
        #[arg(long)]
        input: PathBuf,
        #[arg(long)]
        output_dir: PathBuf,
    },
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();
    run_stage(cli.command, &cli.config)
}

fn load_config(path: &Path) -> Result<PipelineConfig> {
    PipelineConfig::load(path).with_context(|| format!("loading configuration {}", path.display()))
}

fn run_stage(command: Commands, config_path: &Path) -> Result<()> {
    match command {
        Commands::Crosswalk { output } => {
            let config = load_config(config_path)?;
            let crosswalk = PeriodCrosswalk::build(config.crosswalk_start, config.crosswalk_end, config.period)
                .context("building period crosswalk")?;
            save_table(Table::from_rows(&crosswalk.rows()), &SaveOptions::new(&output, &["date"]))
                .context("saving period crosswalk")?;
        }

        Commands::Macro { input, column, output } => {
            let series = MonthlySeries::load(&input).with_context(|| format!("reading {}", input.display()))?;
            save_table(series.to_table(&column), &SaveOptions::new(&output, &["date"]))
                .with_context(|| format!("saving {}", output.display()))?;
        }

        Commands::Panel {
            raw_dir,
            geography,
            crosswalk,
            mortgage_rates,
            output_dir,
        } => {
            let config = load_config(config_path)?;
            let crosswalk = PeriodCrosswalk::load(&crosswalk).context("loading period crosswalk")?;
            let geography = GeographyCrosswalk::load(&geography).context("loading state FIPS crosswalk")?;
            let rates = MonthlySeries::load(&mortgage_rates)
                .context("loading mortgage rates")?
                .by_period(&crosswalk);
            let quarters = quarters_between(config.sample_start, config.sample_end)?;

            let builder = PanelBuilder::new(&crosswalk, &geography, &rates, RateGapBins::new(config.rate_gap_bins));
            let reports = builder
                .build_quarters(&quarters, &raw_dir, &output_dir)
                .context("building loan panel")?;
            let rows: usize = reports.iter().map(|(_, r)| r.rows).sum();
            log::info!("Panel complete: {} quarters, {} rows", reports.len(), rows);
        }

        Commands::Sample { panel_dir, output } => {
            let config = load_config(config_path)?;
            let quarters = quarters_between(config.sample_start, config.sample_end)?;
            let panel = load_panel(&quarters, &panel_dir).context("reading quarterly panels")?;
            let sample = LoanSampler::from_config(&config).draw(panel);
            save_table(Table::from_rows(&sample), &SaveOptions::new(&output, &PANEL_KEYS))
                .context("saving loan sample")?;
        }

        Commands::Process {
            sample,
            crosswalk,
            mortgage_rates,
            cpi,
            output_dir,
        } => {
            let config = load_config(config_path)?;
            let crosswalk = PeriodCrosswalk::load(&crosswalk).context("loading period crosswalk")?;
            let rates = MonthlySeries::load(&mortgage_rates).context("loading mortgage rates")?;
            let cpi = MonthlySeries::load(&cpi).context("loading CPI")?;
            let runner = ScenarioRunner::from_series(&config, &rates, &cpi, &crosswalk)
                .context("preparing scenario reference data")?;

            let panel: Vec<LoanPeriod> = read_rows(&sample).with_context(|| format!("reading {}", sample.display()))?;
            let panel = runner.prepare(panel);
            for (name, rows) in runner.run_all(&config, &panel) {
                runner
                    .persist(&name, &rows, &output_dir)
                    .with_context(|| format!("saving scenario '{}'", name))?;
            }
        }

        Commands::SavingsTable { input_dir, output } => {
            let config = load_config(config_path)?;
            let rows = build_savings_table(&config, &input_dir).context("reading processed samples")?;
            write_savings_table(&rows, &output)?;
        }

        Commands::Summary { input, output_dir } => {
            let records = load_summary_records(&input).with_context(|| format!("reading {}", input.display()))?;
            SummaryTables::from_records(&records)
                .save(&output_dir)
                .context("saving summary tables")?;
        }
    }
    Ok(())
}
