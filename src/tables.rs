use std::sync::Arc;

use comfy_table::{Attribute, Cell, CellAlignment, Color, Table, modifiers, presets};
use tariffs::{
    core::PeakTable,
    quantity::rate::KilowattRate,
    tariff::{Category, PriceQuote, Tariff, extract::PriceLike},
};

fn new_table() -> Table {
    let mut table = Table::new();
    table.load_preset(presets::UTF8_FULL_CONDENSED).apply_modifier(modifiers::UTF8_ROUND_CORNERS);
    table.enforce_styling();
    table
}

#[must_use]
pub fn build_tariffs_table(tariffs: &[Arc<Tariff>]) -> Table {
    let mut table = new_table();
    table.set_header(vec!["ID", "Name", "Company", "Direction", "Fixed", "Energy", "Power"]);
    for tariff in tariffs {
        table.add_row(vec![
            Cell::new(&tariff.id).add_attribute(Attribute::Dim),
            Cell::new(&tariff.name),
            Cell::new(&tariff.company_name),
            Cell::new(tariff.direction.as_deref().unwrap_or_default()),
            Cell::new(tariff.fixed_price.components.len()).set_alignment(CellAlignment::Right),
            Cell::new(tariff.energy_price.components.len()).set_alignment(CellAlignment::Right),
            Cell::new(tariff.power_price.components.len()).set_alignment(CellAlignment::Right),
        ]);
    }
    table
}

#[must_use]
pub fn build_quote_table(quote: &PriceQuote) -> Table {
    let mut table = new_table();
    table.set_header(vec!["Category", "ID", "Name", "Price", "Per", "Cost function"]);
    for (category, quoted) in quote.iter() {
        let price = quoted.price_value();
        table.add_row(vec![
            Cell::new(category).fg(match category {
                Category::Fixed => Color::Reset,
                Category::Energy => Color::DarkYellow,
                Category::Power => Color::Magenta,
            }),
            Cell::new(&quoted.id).add_attribute(Attribute::Dim),
            Cell::new(&quoted.name),
            price.map_or_else(
                |_| Cell::new("n/a").fg(Color::Red),
                |price: KilowattRate| Cell::new(price).set_alignment(CellAlignment::Right),
            ),
            Cell::new(quoted.priced_period),
            Cell::new(quoted.cost_function.as_deref().unwrap_or_default()),
        ]);
    }
    table
}

#[must_use]
pub fn build_peaks_table(peaks: &PeakTable) -> Table {
    let mut table = new_table();
    table.set_header(vec!["Reference", "Period", "Since", "Peak"]);
    for (reference, period, peak) in peaks.iter() {
        table.add_row(vec![
            Cell::new(reference).fg(Color::Magenta),
            Cell::new(period).set_alignment(CellAlignment::Right),
            Cell::new(peak.since.format("%Y-%m-%d %H:%M")).add_attribute(Attribute::Dim),
            Cell::new(format!("{:.3} kW", peak.value.0)).set_alignment(CellAlignment::Right),
        ]);
    }
    table
}
