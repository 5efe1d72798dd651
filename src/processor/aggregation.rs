//! Rollups the dashboard draws from a (possibly filtered) record view.
//!
//! Missing measures contribute nothing to a sum; they never turn a total
//! into `Missing`.

use crate::models::{Measure, ProductRecord};
use crate::processor::grade::compare_labels;
use crate::processor::header_resolver::normalize_header_key;
use crate::processor::record_normalizer::UNKNOWN;
use serde::Serialize;
use std::borrow::Borrow;
use std::cmp::Ordering;
use std::collections::HashMap;

pub const OTHER: &str = "Other";

/// Standard grades shown in fixed order on classification charts.
pub const CLASS_ORDER: [&str; 7] = ["A+", "A", "B", "C", "D", "E", "F"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dimension {
    Brand,
    ParentCategory,
    SubCategory,
    Classification,
}

impl Dimension {
    pub fn key_of(self, record: &ProductRecord) -> &str {
        let key: &str = match self {
            Dimension::Brand => &record.brand,
            Dimension::ParentCategory => &record.parent_category,
            Dimension::SubCategory => &record.sub_category,
            Dimension::Classification => &record.classification,
        };
        if key.is_empty() { UNKNOWN } else { key }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MeasureKind {
    Revenue,
    Profit,
    StockValue,
    UnitsThisYear,
    UnitsLastYear,
    ReportedRevenueYtd,
}

impl MeasureKind {
    pub fn of(self, record: &ProductRecord) -> Measure {
        match self {
            MeasureKind::Revenue => record.metrics.revenue,
            MeasureKind::Profit => record.metrics.profit,
            MeasureKind::StockValue => record.metrics.stock_value,
            MeasureKind::UnitsThisYear => record.units_this_year,
            MeasureKind::UnitsLastYear => record.units_last_year,
            MeasureKind::ReportedRevenueYtd => record.reported_revenue_ytd,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KeyValue {
    pub key: String,
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct BrandRollup {
    pub key: String,
    pub units_this_year: f64,
    pub units_last_year: f64,
    pub revenue: f64,
    pub profit: f64,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct UnitsRollup {
    pub key: String,
    pub this_year: f64,
    pub last_year: f64,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct Kpis {
    pub products: usize,
    pub units_this_year: f64,
    pub units_last_year: f64,
    pub revenue: f64,
    pub reported_revenue_ytd: f64,
    pub reported_revenue_last_year: f64,
    pub profit: f64,
    pub stock_value: f64,
    pub content_ready: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum DiscountBand {
    #[serde(rename = "0 to 5%")]
    UpTo5,
    #[serde(rename = "5 to 10%")]
    UpTo10,
    #[serde(rename = "10 to 20%")]
    UpTo20,
    #[serde(rename = "20 to 30%")]
    UpTo30,
    #[serde(rename = "30 to 40%")]
    UpTo40,
    #[serde(rename = "40%+")]
    Over40,
}

impl DiscountBand {
    pub const ORDER: [DiscountBand; 6] = [
        DiscountBand::UpTo5,
        DiscountBand::UpTo10,
        DiscountBand::UpTo20,
        DiscountBand::UpTo30,
        DiscountBand::UpTo40,
        DiscountBand::Over40,
    ];

    pub fn label(self) -> &'static str {
        match self {
            DiscountBand::UpTo5 => "0 to 5%",
            DiscountBand::UpTo10 => "5 to 10%",
            DiscountBand::UpTo20 => "10 to 20%",
            DiscountBand::UpTo30 => "20 to 30%",
            DiscountBand::UpTo40 => "30 to 40%",
            DiscountBand::Over40 => "40%+",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BandUnits {
    pub band: DiscountBand,
    pub units: f64,
}

fn desc(a: f64, b: f64) -> Ordering {
    b.total_cmp(&a)
}

/// Groups in first-seen order so ties keep a stable, source-driven order.
fn group_by<'a, R, T>(
    records: &'a [R],
    key: impl Fn(&'a ProductRecord) -> &'a str,
    init: impl Fn(&str) -> T,
    mut fold: impl FnMut(&mut T, &ProductRecord),
) -> Vec<T>
where
    R: Borrow<ProductRecord>,
{
    let mut positions: HashMap<&str, usize> = HashMap::new();
    let mut groups: Vec<T> = Vec::new();

    for record in records {
        let record = record.borrow();
        let k = key(record);
        let slot = *positions.entry(k).or_insert_with(|| {
            groups.push(init(k));
            groups.len() - 1
        });
        fold(&mut groups[slot], record);
    }

    groups
}

/// Units, revenue and profit per brand, highest revenue first.
pub fn by_brand<R: Borrow<ProductRecord>>(records: &[R]) -> Vec<BrandRollup> {
    let mut rows = group_by(
        records,
        |r| Dimension::Brand.key_of(r),
        |k| BrandRollup {
            key: k.to_string(),
            ..Default::default()
        },
        |acc, r| {
            acc.units_this_year += r.units_this_year.or_zero();
            acc.units_last_year += r.units_last_year.or_zero();
            acc.revenue += r.metrics.revenue.or_zero();
            acc.profit += r.metrics.profit.or_zero();
        },
    );
    rows.sort_by(|a, b| desc(a.revenue, b.revenue).then_with(|| desc(a.profit, b.profit)));
    rows
}

/// Units this year vs last year per classification, busiest first.
pub fn by_classification_units<R: Borrow<ProductRecord>>(records: &[R]) -> Vec<UnitsRollup> {
    let mut rows = group_by(
        records,
        |r| Dimension::Classification.key_of(r),
        |k| UnitsRollup {
            key: k.to_string(),
            ..Default::default()
        },
        |acc, r| {
            acc.this_year += r.units_this_year.or_zero();
            acc.last_year += r.units_last_year.or_zero();
        },
    );
    rows.sort_by(|a, b| desc(a.this_year, b.this_year));
    rows
}

/// Sum of one measure per dimension value, largest first.
pub fn sum_by<R: Borrow<ProductRecord>>(
    records: &[R],
    dimension: Dimension,
    measure: MeasureKind,
) -> Vec<KeyValue> {
    let mut rows = group_by(
        records,
        |r| dimension.key_of(r),
        |k| KeyValue {
            key: k.to_string(),
            value: 0.0,
        },
        |acc, r| acc.value += measure.of(r).or_zero(),
    );
    rows.sort_by(|a, b| desc(a.value, b.value));
    rows
}

/// Keeps the first `n` entries and folds the rest into a single "Other".
pub fn top_n_with_other(pairs: Vec<KeyValue>, n: usize) -> Vec<KeyValue> {
    if pairs.len() <= n {
        return pairs;
    }
    let mut pairs = pairs;
    let rest: f64 = pairs.drain(n..).map(|kv| kv.value).sum();
    pairs.push(KeyValue {
        key: OTHER.to_string(),
        value: rest,
    });
    pairs
}

pub fn discount_band(percent: Measure) -> Option<DiscountBand> {
    let p = percent.value()?;
    Some(match p {
        p if p < 5.0 => DiscountBand::UpTo5,
        p if p < 10.0 => DiscountBand::UpTo10,
        p if p < 20.0 => DiscountBand::UpTo20,
        p if p < 30.0 => DiscountBand::UpTo30,
        p if p < 40.0 => DiscountBand::UpTo40,
        _ => DiscountBand::Over40,
    })
}

/// Units sold this year per discount band; every band is present, in order.
pub fn units_by_discount_band<R: Borrow<ProductRecord>>(records: &[R]) -> Vec<BandUnits> {
    let mut units: HashMap<DiscountBand, f64> = HashMap::new();
    for record in records {
        let record = record.borrow();
        if let Some(band) = discount_band(record.metrics.discount_percent) {
            *units.entry(band).or_default() += record.units_this_year.or_zero();
        }
    }

    DiscountBand::ORDER
        .into_iter()
        .map(|band| BandUnits {
            band,
            units: units.get(&band).copied().unwrap_or(0.0),
        })
        .collect()
}

/// Stock value for each standard grade, then any other classifications.
pub fn classification_stock_summary<R: Borrow<ProductRecord>>(records: &[R]) -> Vec<KeyValue> {
    let totals = sum_by(records, Dimension::Classification, MeasureKind::StockValue);
    let by_key: HashMap<String, f64> = totals
        .iter()
        .map(|kv| (normalize_header_key(&kv.key), kv.value))
        .collect();
    let standard: Vec<String> = CLASS_ORDER.iter().map(|c| normalize_header_key(c)).collect();

    let ordered = CLASS_ORDER.iter().map(|label| KeyValue {
        key: label.to_string(),
        value: by_key
            .get(&normalize_header_key(label))
            .copied()
            .unwrap_or(0.0),
    });
    let extras = totals
        .iter()
        .filter(|kv| !standard.contains(&normalize_header_key(&kv.key)))
        .cloned();

    ordered.chain(extras).collect()
}

/// The `n` records with the largest positive value of `metric`.
pub fn top_skus<'a, R: Borrow<ProductRecord>>(
    records: &'a [R],
    metric: MeasureKind,
    n: usize,
) -> Vec<(&'a ProductRecord, f64)> {
    let mut ranked: Vec<(&ProductRecord, f64)> = records
        .iter()
        .map(|r| r.borrow())
        .filter_map(|r| metric.of(r).value().filter(|v| *v > 0.0).map(|v| (r, v)))
        .collect();
    ranked.sort_by(|a, b| desc(a.1, b.1));
    ranked.truncate(n);
    ranked
}

pub fn kpis<R: Borrow<ProductRecord>>(records: &[R]) -> Kpis {
    records.iter().map(|r| r.borrow()).fold(
        Kpis::default(),
        |mut k, r| {
            k.products += 1;
            k.units_this_year += r.units_this_year.or_zero();
            k.units_last_year += r.units_last_year.or_zero();
            k.revenue += r.metrics.revenue.or_zero();
            k.reported_revenue_ytd += r.reported_revenue_ytd.or_zero();
            k.reported_revenue_last_year += r.reported_revenue_last_year.or_zero();
            k.profit += r.metrics.profit.or_zero();
            k.stock_value += r.metrics.stock_value.or_zero();
            if r.metrics.content_ready {
                k.content_ready += 1;
            }
            k
        },
    )
}

/// Distinct non-empty trimmed values, sorted case-insensitively.
pub fn unique_sorted<'a>(values: impl IntoIterator<Item = &'a str>) -> Vec<String> {
    let mut out: Vec<String> = values
        .into_iter()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .collect();
    out.sort_by(|a, b| compare_labels(a, b));
    out.dedup();
    out
}

/// Subcategories available once a parent category is picked.
pub fn subcategories_for<R: Borrow<ProductRecord>>(records: &[R], parent: &str) -> Vec<String> {
    unique_sorted(
        records
            .iter()
            .map(|r| r.borrow())
            .filter(|r| r.parent_category == parent)
            .map(|r| r.sub_category.as_str()),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::processor::derived_metrics::MetricSettings;
    use crate::processor::derived_metrics::tests::blank_record;

    fn record(sku: &str, brand: &str, class: &str, units: f64, price: f64) -> ProductRecord {
        ProductRecord {
            sku: sku.to_string(),
            brand: brand.to_string(),
            parent_category: "Power Tools".to_string(),
            classification: class.to_string(),
            units_this_year: Measure::Present(units),
            units_last_year: Measure::Present(units / 2.0),
            sell_ex_vat: Measure::Present(price),
            cost_ex_vat: Measure::Present(price / 2.0),
            ..blank_record()
        }
        .with_metrics(&MetricSettings::default())
    }

    #[test]
    fn test_by_brand_sorts_by_revenue() {
        let records = vec![
            record("A", "Makita", "A", 10.0, 10.0),
            record("B", "Bosch", "B", 10.0, 50.0),
            record("C", "Makita", "A", 1.0, 10.0),
        ];

        let rows = by_brand(&records);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].key, "Bosch");
        assert_eq!(rows[0].revenue, 500.0);
        assert_eq!(rows[1].key, "Makita");
        assert_eq!(rows[1].units_this_year, 11.0);
        assert_eq!(rows[1].profit, 55.0);
    }

    #[test]
    fn test_missing_measures_do_not_poison_sums() {
        let mut missing = record("M", "Makita", "A", 0.0, 10.0);
        missing.units_this_year = Measure::Missing;
        missing = missing.with_metrics(&MetricSettings::default());
        let records = vec![record("A", "Makita", "A", 2.0, 10.0), missing];

        let totals = kpis(&records);
        assert_eq!(totals.products, 2);
        assert_eq!(totals.units_this_year, 2.0);
        assert_eq!(totals.revenue, 20.0);
    }

    #[test]
    fn test_top_n_with_other_sums_tail() {
        let pairs: Vec<KeyValue> = (1..=5)
            .rev()
            .map(|i| KeyValue {
                key: format!("k{i}"),
                value: i as f64,
            })
            .collect();

        let top = top_n_with_other(pairs.clone(), 3);
        assert_eq!(top.len(), 4);
        assert_eq!(top[3].key, OTHER);
        assert_eq!(top[3].value, 3.0);

        assert_eq!(top_n_with_other(pairs.clone(), 5), pairs);
    }

    #[test]
    fn test_discount_band_edges() {
        assert_eq!(discount_band(Measure::Missing), None);
        assert_eq!(discount_band(Measure::Present(0.0)), Some(DiscountBand::UpTo5));
        assert_eq!(discount_band(Measure::Present(5.0)), Some(DiscountBand::UpTo10));
        assert_eq!(discount_band(Measure::Present(39.99)), Some(DiscountBand::UpTo40));
        assert_eq!(discount_band(Measure::Present(40.0)), Some(DiscountBand::Over40));
        assert_eq!(DiscountBand::Over40.label(), "40%+");
    }

    #[test]
    fn test_units_by_discount_band_lists_every_band() {
        let mut sale = record("S", "Makita", "A", 4.0, 10.0);
        sale.metrics.discount_percent = Measure::Present(12.5);
        let records = vec![sale, record("N", "Makita", "A", 9.0, 10.0)];

        let bands = units_by_discount_band(&records);
        assert_eq!(bands.len(), 6);
        assert_eq!(bands[2].band, DiscountBand::UpTo20);
        assert_eq!(bands[2].units, 4.0);
        assert_eq!(bands.iter().map(|b| b.units).sum::<f64>(), 4.0);
    }

    #[test]
    fn test_classification_stock_summary_order() {
        let mut records = vec![
            record("1", "Makita", "b", 1.0, 1.0),
            record("2", "Makita", "Unknown", 1.0, 1.0),
            record("3", "Makita", "A+", 1.0, 1.0),
        ];
        for (r, value) in records.iter_mut().zip([10.0, 5.0, 7.0]) {
            r.metrics.stock_value = Measure::Present(value);
        }

        let summary = classification_stock_summary(&records);
        let keys: Vec<&str> = summary.iter().map(|kv| kv.key.as_str()).collect();
        assert_eq!(keys, vec!["A+", "A", "B", "C", "D", "E", "F", "Unknown"]);
        assert_eq!(summary[0].value, 7.0);
        assert_eq!(summary[2].value, 10.0);
        assert_eq!(summary[7].value, 5.0);
    }

    #[test]
    fn test_top_skus_skips_missing_and_non_positive() {
        let mut loss = record("L", "Makita", "A", 5.0, 10.0);
        loss.metrics.profit = Measure::Present(-3.0);
        let records = vec![
            record("A", "Makita", "A", 1.0, 10.0),
            record("B", "Makita", "A", 3.0, 10.0),
            loss,
        ];

        let top = top_skus(&records, MeasureKind::Profit, 18);
        let skus: Vec<&str> = top.iter().map(|(r, _)| r.sku.as_str()).collect();
        assert_eq!(skus, vec!["B", "A"]);
    }

    #[test]
    fn test_aggregations_accept_filtered_views() {
        let records = vec![
            record("A", "Makita", "A", 1.0, 10.0),
            record("B", "Bosch", "B", 3.0, 10.0),
        ];
        let view: Vec<&ProductRecord> = records.iter().filter(|r| r.brand == "Bosch").collect();

        assert_eq!(kpis(&view).units_this_year, 3.0);
        assert_eq!(sum_by(&view, Dimension::Brand, MeasureKind::Revenue)[0].value, 30.0);
    }

    #[test]
    fn test_unique_sorted_and_subcategories() {
        let values = unique_sorted(["drills", " Saws", "", "Drills", "drills"]);
        assert_eq!(values, vec!["Drills", "drills", "Saws"]);

        let mut a = record("A", "Makita", "A", 1.0, 1.0);
        a.sub_category = "Drills".to_string();
        let mut b = record("B", "Makita", "A", 1.0, 1.0);
        b.parent_category = "Garden".to_string();
        b.sub_category = "Mowers".to_string();
        assert_eq!(subcategories_for(&[a, b], "Garden"), vec!["Mowers"]);
    }
}
