use crate::models::{DerivedMetrics, Measure, ProductRecord, StockValueSource};
use serde::{Deserialize, Serialize};

pub const WEEKS_PER_YEAR: f64 = 52.0;

/// Tunables for the derived metrics that differ between dashboard variants.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricSettings {
    /// Images a listing needs before it counts as content ready.
    pub min_image_count: u32,
    /// Display clip for weeks of cover; the stored metric is never capped.
    pub weeks_of_cover_cap: f64,
}

impl Default for MetricSettings {
    fn default() -> Self {
        Self {
            min_image_count: 2,
            weeks_of_cover_cap: 260.0,
        }
    }
}

/// Sale price when it is present and positive, otherwise the ex-VAT selling price.
pub fn effective_selling_price(record: &ProductRecord) -> Measure {
    if record.sale_price.is_positive() {
        record.sale_price
    } else {
        record.sell_ex_vat
    }
}

pub fn revenue(units: Measure, price: Measure) -> Measure {
    units.zip_with(price, |u, p| u * p)
}

pub fn profit(units: Measure, price: Measure, cost: Measure) -> Measure {
    units.zip_with(price.zip_with(cost, |p, c| p - c), |u, margin| u * margin)
}

/// Percentage off the inc-VAT selling price. Missing unless both prices are positive.
pub fn discount_percent(sell_inc_vat: Measure, sale_inc_vat: Measure) -> Measure {
    if !(sell_inc_vat.is_positive() && sale_inc_vat.is_positive()) {
        return Measure::Missing;
    }
    sell_inc_vat.zip_with(sale_inc_vat, |sell, sale| (sell - sale) / sell * 100.0)
}

/// Reported stock value, else stock on hand at cost.
pub fn stock_value(record: &ProductRecord) -> (Measure, StockValueSource) {
    if record.reported_stock_value.is_present() {
        return (record.reported_stock_value, StockValueSource::Reported);
    }
    let computed = record
        .available_stock
        .zip_with(record.cost_ex_vat, |stock, cost| stock * cost);
    if computed.is_present() {
        (computed, StockValueSource::Computed)
    } else {
        (Measure::Missing, StockValueSource::Unavailable)
    }
}

/// Stock runway in weeks at this year's average weekly sales rate.
pub fn weeks_of_cover(available_stock: Measure, units_this_year: Measure) -> Measure {
    if !units_this_year.is_positive() {
        return Measure::Missing;
    }
    available_stock.zip_with(units_this_year, |stock, units| stock / (units / WEEKS_PER_YEAR))
}

pub fn content_ready(record: &ProductRecord, settings: &MetricSettings) -> bool {
    let enough_images = record
        .image_count
        .value()
        .is_some_and(|count| count >= f64::from(settings.min_image_count));

    record.has_pdp && record.has_optimised_description && record.filters_correct && enough_images
}

pub fn derive_metrics(record: &ProductRecord, settings: &MetricSettings) -> DerivedMetrics {
    let effective_price = effective_selling_price(record);
    let (stock_value, stock_value_source) = stock_value(record);

    DerivedMetrics {
        effective_price,
        revenue: revenue(record.units_this_year, effective_price),
        profit: profit(record.units_this_year, effective_price, record.cost_ex_vat),
        discount_percent: discount_percent(record.sell_inc_vat, record.sale_inc_vat),
        stock_value,
        stock_value_source,
        weeks_of_cover: weeks_of_cover(record.available_stock, record.units_this_year),
        content_ready: content_ready(record, settings),
    }
}

impl ProductRecord {
    /// Copy of this record with every derived metric recomputed.
    pub fn with_metrics(mut self, settings: &MetricSettings) -> Self {
        self.metrics = derive_metrics(&self, settings);
        self
    }
}
