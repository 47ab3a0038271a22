#![doc = include_str!("../README.md")]
#![allow(clippy::doc_markdown)]

pub mod core;
pub mod error;
pub mod monitor;
mod prelude;
pub mod provider;
pub mod quantity;
pub mod tariff;

pub use crate::{
    core::{Calculator, ConsumptionSeries, OptimalStart},
    error::{Error, Result},
    provider::{Catalog, TariffProvider},
    tariff::{Category, Tariff},
};
