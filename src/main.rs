#![allow(clippy::doc_markdown)]

mod cli;
mod tables;

use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, crate_version};
use tariffs::{TariffProvider, core::OptimalStart, monitor::Monitor, tariff::Tariff};
use tokio::time::{MissedTickBehavior, interval};
use tracing::{info, warn};

use crate::{
    cli::{Args, CatalogArgs, Command, MonitorArgs, OperationCostArgs},
    tables::{build_peaks_table, build_quote_table, build_tariffs_table},
};

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();
    tracing_subscriber::fmt().without_time().compact().init();
    info!(version = crate_version!(), "starting…");

    let args = Args::parse();

    match args.command {
        Command::Tariffs(command) => {
            let tariffs: Vec<Arc<Tariff>> = args
                .catalog
                .read()?
                .list_tariffs()?
                .into_iter()
                .filter(|tariff| {
                    command.company.as_ref().is_none_or(|company| &tariff.company_name == company)
                })
                .collect();
            println!("{}", build_tariffs_table(&tariffs));
        }
        Command::Price(command) => {
            let calculator = args.catalog.calculator()?;
            let tariff_id = command.tariff.resolve(calculator.provider())?;
            let quote = calculator.get_price(&tariff_id, command.at())?;
            if command.json {
                println!("{}", serde_json::to_string_pretty(&quote)?);
            } else {
                println!("{}", build_quote_table(&quote));
            }
        }
        Command::Cost(command) => {
            let calculator = args.catalog.calculator()?;
            let tariff_id = command.tariff.resolve(calculator.provider())?;
            let at = command.at.unwrap_or_else(|| chrono::Local::now().naive_local());
            let cost = calculator.get_cost(&tariff_id, command.category, at, command.usage)?;
            info!(%tariff_id, category = %command.category, %at, %cost, "calculated");
            println!("{cost}");
        }
        Command::OperationCost(command) => {
            let calculator = args.catalog.calculator()?;
            let tariff_id = command.tariff.resolve(calculator.provider())?;
            let cost = calculator.get_operation_cost(
                &tariff_id,
                command.category,
                command.start,
                command.duration()?,
                &command.samples.read()?,
            )?;
            println!("{cost}");
        }
        Command::OptimalStart(command) => {
            let calculator = args.catalog.calculator()?;
            let tariff_id = command.tariff.resolve(calculator.provider())?;
            let start = OptimalStart::builder()
                .calculator(&calculator)
                .tariff_id(&tariff_id)
                .category(command.category)
                .samples(&command.samples.read()?)
                .find()?;
            println!("{}", start.format("%Y-%m-%d %H:%M"));
        }
        Command::Peaks(command) => {
            peaks(&args.catalog, &command)?;
        }
        Command::Monitor(command) => {
            monitor(&args.catalog, command).await?;
        }
    }

    info!("done!");
    Ok(())
}

fn peaks(catalog: &CatalogArgs, command: &OperationCostArgs) -> Result<()> {
    let calculator = catalog.calculator()?;
    let tariff_id = command.tariff.resolve(calculator.provider())?;
    let tariff = calculator.tariff(&tariff_id)?;
    let samples = command.samples.read()?;
    let peaks = calculator.peak_table(&tariff, command.start, command.duration()?, &samples);
    println!("{}", build_peaks_table(&peaks));
    Ok(())
}

async fn monitor(catalog: &CatalogArgs, command: MonitorArgs) -> Result<()> {
    let calculator = Arc::new(catalog.live_calculator());
    let tariff_id = command.tariff.resolve(calculator.provider())?;
    let monitor = Monitor::builder().calculator(calculator).interval(command.interval).build();

    let tariff = monitor.watch_tariff(&tariff_id)?;
    let cost = monitor.watch_cost(&tariff_id, command.category, command.usage)?;
    let consumption = monitor.record_consumption(command.usage);

    let mut report = interval(command.interval.into());
    report.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        tokio::select! {
            result = tokio::signal::ctrl_c() => {
                result?;
                info!("interrupted");
                break;
            }
            _ = report.tick() => {
                match (tariff.latest(), cost.latest(), consumption.latest()) {
                    (Some(tariff), Some(cost), Some(sample)) => {
                        info!(
                            tariff = %tariff.name,
                            %cost,
                            at = %sample.at,
                            usage = %sample.magnitude,
                            "latest"
                        );
                    }
                    _ => warn!("not available yet"),
                }
            }
        }
    }

    monitor.shutdown();
    tariff.stop().await;
    cost.stop().await;
    consumption.stop().await;
    Ok(())
}
