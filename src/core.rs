pub mod calculator;
pub mod expression;
pub mod peaks;
pub mod resolver;
pub mod samples;
pub mod search;

pub use self::{
    calculator::Calculator,
    expression::{PeakFunction, PeakValues},
    peaks::{Peak, PeakTable, ReferenceMode},
    samples::{ConsumptionSample, ConsumptionSeries},
    search::OptimalStart,
};
