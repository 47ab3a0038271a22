use chrono::NaiveDateTime;

use crate::tariff::Category;

pub type Result<T = (), E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("unknown tariff `{0}`")]
    UnknownTariff(String),

    #[error("no {category} price component matches {at}")]
    NoMatchingPriceComponent { category: Category, at: NaiveDateTime },

    #[error("no numeric price in {0}")]
    InvalidPriceShape(String),

    #[error("no cost function in {0}")]
    MissingCostFunction(String),

    #[error("peak value `{0}` is not available")]
    UnknownPeakReference(String),

    #[error("malformed expression `{expression}`: {reason}")]
    MalformedExpression { expression: String, reason: String },

    #[error("malformed ISO-8601 duration `{0}`")]
    MalformedDuration(String),

    #[error("malformed time of day `{0}`")]
    MalformedTimeOfDay(String),

    #[error("insufficient sample data: {0}")]
    InsufficientSampleData(String),

    #[error("invalid sample shape: {0}")]
    InvalidSampleShape(String),

    #[error("no feasible start within the next 24 hours")]
    NoFeasibleStart,

    #[error("failed to decode JSON")]
    Decode(#[from] serde_json::Error),

    #[error("failed to read the tariffs")]
    Io(#[from] std::io::Error),
}

impl Error {
    pub(crate) fn malformed_expression(expression: &str, reason: impl Into<String>) -> Self {
        Self::MalformedExpression { expression: expression.to_owned(), reason: reason.into() }
    }
}
