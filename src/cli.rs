use std::{path::PathBuf, sync::Arc};

use anyhow::{Context, Result, bail};
use chrono::{Local, NaiveDateTime, TimeDelta};
use clap::{Parser, Subcommand};
use tariffs::{
    Calculator,
    Catalog,
    Category,
    ConsumptionSeries,
    TariffProvider,
    core::ReferenceMode,
    provider::JsonFile,
    quantity::power::Kilowatts,
};

#[derive(Parser)]
#[command(author, version, about, propagate_version = true)]
#[must_use]
pub struct Args {
    #[clap(flatten)]
    pub catalog: CatalogArgs,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// List the tariffs in the catalog.
    #[clap(name = "tariffs")]
    Tariffs(TariffsArgs),

    /// Show the price components in effect at an instant.
    #[clap(name = "price")]
    Price(PriceArgs),

    /// Instantaneous cost of a usage.
    #[clap(name = "cost")]
    Cost(CostArgs),

    /// Cost of running a sampled load over an interval.
    #[clap(name = "operation-cost")]
    OperationCost(Box<OperationCostArgs>),

    /// Find the cheapest start within the next 24 hours.
    #[clap(name = "optimal-start")]
    OptimalStart(OptimalStartArgs),

    /// Show the identified peaks of a sampled load.
    #[clap(name = "peaks")]
    Peaks(Box<OperationCostArgs>),

    /// Keep the cost and consumption up to date until interrupted.
    #[clap(name = "monitor")]
    Monitor(MonitorArgs),
}

#[derive(Parser)]
pub struct CatalogArgs {
    /// JSON document with the tariffs.
    #[clap(long = "tariffs-path", env = "TARIFFS_PATH", default_value = "tariffs.json")]
    pub path: PathBuf,

    /// Do not provide the `base` and `reactive` peak references unless the tariff defines them.
    #[clap(long, env = "STRICT_PEAK_REFERENCES")]
    pub strict_peak_references: bool,
}

impl CatalogArgs {
    pub fn read(&self) -> Result<Catalog> {
        Catalog::read_from(&self.path)
            .with_context(|| format!("failed to load the tariffs from `{}`", self.path.display()))
    }

    pub const fn reference_mode(&self) -> ReferenceMode {
        if self.strict_peak_references {
            ReferenceMode::Strict
        } else {
            ReferenceMode::LegacyAliases
        }
    }

    pub fn calculator(&self) -> Result<Calculator> {
        Ok(self.calculator_with(Arc::new(self.read()?)))
    }

    /// Calculator re-reading the catalog on every lookup.
    pub fn live_calculator(&self) -> Calculator {
        self.calculator_with(Arc::new(JsonFile::new(&self.path)))
    }

    fn calculator_with(&self, provider: Arc<dyn TariffProvider>) -> Calculator {
        Calculator::builder().provider(provider).reference_mode(self.reference_mode()).build()
    }
}

#[derive(Parser)]
pub struct TariffArgs {
    #[clap(long = "tariff-id", conflicts_with = "name")]
    pub id: Option<String>,

    /// Tariff name, requires `--company`.
    #[clap(long = "tariff-name", requires = "company")]
    pub name: Option<String>,

    #[clap(long)]
    pub company: Option<String>,
}

impl TariffArgs {
    pub fn resolve(&self, provider: &dyn TariffProvider) -> Result<String> {
        match (&self.id, &self.name, &self.company) {
            (Some(id), _, _) => Ok(id.clone()),
            (None, Some(name), Some(company)) => Ok(provider.find_id_by_name(name, company)?),
            _ => bail!("either `--tariff-id` or `--tariff-name` with `--company` is required"),
        }
    }
}

#[derive(Parser)]
pub struct SamplesArgs {
    /// JSON list of `{datetime, kW}` records or `[datetime, kW]` pairs.
    #[clap(long = "samples", env = "SAMPLES_PATH")]
    pub path: PathBuf,
}

impl SamplesArgs {
    pub fn read(&self) -> Result<ConsumptionSeries> {
        let json = std::fs::read_to_string(&self.path)
            .with_context(|| format!("failed to read `{}`", self.path.display()))?;
        Ok(ConsumptionSeries::from_json_str(&json)?)
    }
}

#[derive(Parser)]
pub struct TariffsArgs {
    /// Only list the tariffs of the company.
    #[clap(long)]
    pub company: Option<String>,
}

#[derive(Parser)]
pub struct PriceArgs {
    #[clap(flatten)]
    pub tariff: TariffArgs,

    /// Local time, defaults to now.
    #[clap(long)]
    pub at: Option<NaiveDateTime>,

    /// Print JSON instead of a table.
    #[clap(long)]
    pub json: bool,
}

impl PriceArgs {
    pub fn at(&self) -> NaiveDateTime {
        self.at.unwrap_or_else(|| Local::now().naive_local())
    }
}

#[derive(Parser)]
pub struct CostArgs {
    #[clap(flatten)]
    pub tariff: TariffArgs,

    #[clap(value_enum)]
    pub category: Category,

    /// Usage in kilowatts.
    #[clap(long = "usage")]
    pub usage: Kilowatts,

    /// Local time, defaults to now.
    #[clap(long)]
    pub at: Option<NaiveDateTime>,
}

#[derive(Parser)]
pub struct OperationCostArgs {
    #[clap(flatten)]
    pub tariff: TariffArgs,

    #[clap(value_enum)]
    pub category: Category,

    /// Local start time.
    #[clap(long)]
    pub start: NaiveDateTime,

    #[clap(long)]
    pub duration: humantime::Duration,

    #[clap(flatten)]
    pub samples: SamplesArgs,
}

impl OperationCostArgs {
    pub fn duration(&self) -> Result<TimeDelta> {
        TimeDelta::from_std(self.duration.into()).context("the duration is too long")
    }
}

#[derive(Parser)]
pub struct OptimalStartArgs {
    #[clap(flatten)]
    pub tariff: TariffArgs,

    #[clap(value_enum)]
    pub category: Category,

    #[clap(flatten)]
    pub samples: SamplesArgs,
}

#[derive(Parser)]
pub struct MonitorArgs {
    #[clap(flatten)]
    pub tariff: TariffArgs,

    #[clap(value_enum)]
    pub category: Category,

    /// Usage in kilowatts.
    #[clap(long = "usage")]
    pub usage: Kilowatts,

    #[clap(long, env = "MONITOR_INTERVAL", default_value = "1min")]
    pub interval: humantime::Duration,
}
