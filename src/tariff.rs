mod component;
mod duration;
pub mod extract;
mod period;
mod quote;

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};
use serde_with::{DefaultOnNull, serde_as};

pub use self::{
    component::{MAIN_REFERENCE, PeakIdentificationSettings, Price, PriceComponent},
    duration::IsoDuration,
    period::{ActivePeriod, RecurringPeriod, TimeOfDay, ValidPeriod},
    quote::{PriceQuote, QuotedComponent},
};

/// Price category of a tariff.
#[derive(
    Clone,
    Copy,
    Debug,
    Eq,
    PartialEq,
    Hash,
    Ord,
    PartialOrd,
    Serialize,
    Deserialize,
    clap::ValueEnum,
    derive_more::Display,
)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    /// Flat periodic charges.
    #[display("fixed")]
    Fixed,

    /// Charges per consumed kilowatt-hour.
    #[display("energy")]
    Energy,

    /// Charges on peak power.
    #[display("power")]
    Power,
}

impl Category {
    pub const ALL: [Self; 3] = [Self::Fixed, Self::Energy, Self::Power];
}

#[serde_as]
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceGroup {
    #[serde_as(as = "DefaultOnNull")]
    #[serde(default)]
    pub components: Vec<PriceComponent>,

    #[serde(default, alias = "cost_function", skip_serializing_if = "Option::is_none")]
    pub cost_function: Option<String>,
}

/// Grid tariff as published by the tariff API.
#[serde_as]
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Tariff {
    pub id: String,

    #[serde(default)]
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub product: Option<String>,

    #[serde(default, alias = "company_name")]
    pub company_name: String,

    #[serde(default, alias = "company_org_no", skip_serializing_if = "Option::is_none")]
    pub company_org_no: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub direction: Option<String>,

    #[serde(default, alias = "time_zone", skip_serializing_if = "Option::is_none")]
    pub time_zone: Option<String>,

    #[serde(default, alias = "last_updated", skip_serializing_if = "Option::is_none")]
    pub last_updated: Option<DateTime<FixedOffset>>,

    #[serde(default, alias = "valid_period", skip_serializing_if = "Option::is_none")]
    pub valid_period: Option<ValidPeriod>,

    #[serde(default, alias = "billing_period", skip_serializing_if = "Option::is_none")]
    pub billing_period: Option<IsoDuration>,

    #[serde_as(as = "DefaultOnNull")]
    #[serde(default, alias = "fixed_price")]
    pub fixed_price: PriceGroup,

    #[serde_as(as = "DefaultOnNull")]
    #[serde(default, alias = "energy_price")]
    pub energy_price: PriceGroup,

    #[serde_as(as = "DefaultOnNull")]
    #[serde(default, alias = "power_price")]
    pub power_price: PriceGroup,
}

impl Tariff {
    #[must_use]
    pub const fn group(&self, category: Category) -> &PriceGroup {
        match category {
            Category::Fixed => &self.fixed_price,
            Category::Energy => &self.energy_price,
            Category::Power => &self.power_price,
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_deserialize_tariff() {
        let tariff: Tariff = serde_json::from_value(json!({
            "id": "t1",
            "name": "Home",
            "companyName": "Grid AS",
            "billingPeriod": "P1M",
            "fixedPrice": null,
            "energy_price": {
                "components": [{
                    "id": "e",
                    "validPeriod": {"fromIncluding": "2025-01-01"},
                    "price": {"priceIncVat": 0.5},
                }],
            },
            "unknownField": 42,
        }))
        .unwrap();
        assert_eq!(tariff.company_name, "Grid AS");
        assert_eq!(tariff.billing_period, Some(IsoDuration::one_month()));
        assert!(tariff.group(Category::Fixed).components.is_empty());
        assert_eq!(tariff.group(Category::Energy).components.len(), 1);
        assert!(tariff.group(Category::Power).components.is_empty());
    }

    #[test]
    fn test_category_display() {
        assert_eq!(Category::Power.to_string(), "power");
        assert_eq!(serde_json::to_value(Category::Energy).unwrap(), json!("energy"));
    }
}
