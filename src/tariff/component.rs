use std::{borrow::Cow, num::NonZeroUsize};

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use serde_with::{DefaultOnNull, serde_as};

use crate::{
    prelude::*,
    quantity::rate::KilowattRate,
    tariff::{IsoDuration, RecurringPeriod, ValidPeriod, extract},
};

/// Component reference used when the settings do not name one.
pub const MAIN_REFERENCE: &str = "main";

/// Price record as published by the tariff API.
///
/// Deserialization goes through [`extract`], so the key casing and nesting may vary.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", try_from = "serde_json::Value")]
pub struct Price {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price_ex_vat: Option<f64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub price_inc_vat: Option<f64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub currency: Option<String>,
}

impl Price {
    #[must_use]
    pub fn inc_vat(value: f64) -> Self {
        Self { price_inc_vat: Some(value), ..Self::default() }
    }

    /// VAT-inclusive price, falling back to the VAT-exclusive one.
    pub fn value(&self) -> Result<KilowattRate> {
        self.price_inc_vat
            .or(self.price_ex_vat)
            .map(KilowattRate::from)
            .ok_or_else(|| Error::InvalidPriceShape(format!("{self:?}")))
    }
}

impl TryFrom<serde_json::Value> for Price {
    type Error = Error;

    fn try_from(value: serde_json::Value) -> Result<Self> {
        extract::normalize_price(&value)
    }
}

#[serde_as]
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceComponent {
    #[serde(default)]
    pub id: String,

    #[serde(default)]
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,

    #[serde(alias = "valid_period")]
    pub valid_period: ValidPeriod,

    /// Empty means the whole day.
    #[serde_as(as = "DefaultOnNull")]
    #[serde(default, alias = "recurring_periods")]
    pub recurring_periods: Vec<RecurringPeriod>,

    #[serde_as(as = "DefaultOnNull")]
    #[serde(default)]
    pub price: Price,

    #[serde(default = "IsoDuration::one_month", alias = "priced_period")]
    pub priced_period: IsoDuration,

    #[serde(default, alias = "cost_function", skip_serializing_if = "Option::is_none")]
    pub cost_function: Option<String>,

    #[serde(
        default,
        alias = "peak_identification_settings",
        skip_serializing_if = "Option::is_none"
    )]
    pub peak_identification_settings: Option<PeakIdentificationSettings>,
}

impl PriceComponent {
    /// Whether the component applies at the local instant.
    #[must_use]
    pub fn is_active_at(&self, at: NaiveDateTime) -> bool {
        self.valid_period.contains(at)
            && (self.recurring_periods.is_empty()
                || self.recurring_periods.iter().any(|period| period.contains(at.time())))
    }
}

/// Peak-based billing parameters of a power price component.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PeakIdentificationSettings {
    /// Formula over `peak(<reference>)` terms.
    #[serde(default, alias = "peak_function", skip_serializing_if = "Option::is_none")]
    pub peak_function: Option<String>,

    /// Length of a single window, the maximum sample inside a window is its peak.
    #[serde(default = "IsoDuration::one_hour", alias = "peak_duration")]
    pub peak_duration: IsoDuration,

    /// Length of a billing period, peaks are averaged per period.
    #[serde(default = "IsoDuration::one_day", alias = "peak_identification_period")]
    pub peak_identification_period: IsoDuration,

    #[serde(
        default = "one_peak",
        alias = "number_of_peaks_for_average_calculation",
        alias = "numberOfPeaks"
    )]
    pub number_of_peaks_for_average_calculation: NonZeroUsize,

    #[serde(
        default,
        alias = "componentReference",
        alias = "component_reference",
        alias = "componentRef",
        alias = "component_ref",
        skip_serializing_if = "Option::is_none"
    )]
    pub reference: Option<String>,
}

const fn one_peak() -> NonZeroUsize {
    NonZeroUsize::MIN
}

impl Default for PeakIdentificationSettings {
    fn default() -> Self {
        Self {
            peak_function: None,
            peak_duration: IsoDuration::one_hour(),
            peak_identification_period: IsoDuration::one_day(),
            number_of_peaks_for_average_calculation: one_peak(),
            reference: None,
        }
    }
}

impl PeakIdentificationSettings {
    #[must_use]
    pub fn reference(&self) -> &str {
        self.reference.as_deref().unwrap_or(MAIN_REFERENCE)
    }

    /// The configured formula, or `peak(<reference>)` when there is none.
    #[must_use]
    pub fn peak_function(&self) -> Cow<'_, str> {
        self.peak_function.as_deref().map_or_else(
            || Cow::Owned(format!("peak({})", self.reference())),
            Cow::Borrowed,
        )
    }
}
