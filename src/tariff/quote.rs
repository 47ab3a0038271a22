use serde::Serialize;

use crate::tariff::{
    Category,
    IsoDuration,
    PeakIdentificationSettings,
    Price,
    PriceComponent,
    PriceGroup,
};

/// Snapshot of the prices in effect at one instant, all matching components per category.
#[derive(Clone, Debug, Default, Serialize)]
pub struct PriceQuote {
    pub fixed: Vec<QuotedComponent>,
    pub energy: Vec<QuotedComponent>,
    pub power: Vec<QuotedComponent>,
}

impl PriceQuote {
    #[must_use]
    pub fn category(&self, category: Category) -> &[QuotedComponent] {
        match category {
            Category::Fixed => &self.fixed,
            Category::Energy => &self.energy,
            Category::Power => &self.power,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (Category, &QuotedComponent)> {
        Category::ALL.into_iter().flat_map(move |category| {
            self.category(category).iter().map(move |quoted| (category, quoted))
        })
    }
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuotedComponent {
    pub id: String,
    pub name: String,
    pub price: Price,
    pub priced_period: IsoDuration,

    /// Own cost function, or the group one when the component has none.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cost_function: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub peak_identification_settings: Option<PeakIdentificationSettings>,
}

impl QuotedComponent {
    #[must_use]
    pub fn new(component: &PriceComponent, group: &PriceGroup) -> Self {
        Self {
            id: component.id.clone(),
            name: component.name.clone(),
            price: component.price.clone(),
            priced_period: component.priced_period,
            cost_function: component.cost_function.clone().or_else(|| group.cost_function.clone()),
            peak_identification_settings: component.peak_identification_settings.clone(),
        }
    }
}
