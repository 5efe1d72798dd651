use crate::models::{DerivedMetrics, Measure, ProductRecord, RawRow};
use crate::processor::coercion::{
    is_unparseable_number, to_int, to_number, to_trimmed_string, to_truthy_bool,
};
use crate::processor::derived_metrics::MetricSettings;
use crate::processor::header_resolver::{
    CanonicalField, FieldMap, HeaderAliases, HeaderCollision, HeaderIndex,
};
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

pub const UNKNOWN: &str = "Unknown";

/// What happened while normalizing one file. Purely diagnostic.
#[derive(Debug, Clone, Default, Serialize)]
pub struct NormalizationReport {
    pub input_rows: usize,
    pub blank_rows_dropped: usize,
    pub records: usize,
    pub resolved_fields: Vec<(CanonicalField, String)>,
    pub missing_fields: Vec<CanonicalField>,
    #[serde(skip)]
    pub collisions: Vec<HeaderCollision>,
    /// Non-blank cells per field that could not be read as numbers.
    pub unparseable_cells: BTreeMap<CanonicalField, usize>,
}

impl NormalizationReport {
    pub fn log(&self) {
        info!(
            "Normalization summary: {} records from {} rows ({} blank rows dropped)",
            self.records, self.input_rows, self.blank_rows_dropped
        );
        info!(
            "Resolved {} of {} canonical fields",
            self.resolved_fields.len(),
            CanonicalField::ALL.len()
        );
        for (field, column) in &self.resolved_fields {
            debug!("  {} <- {:?}", field, column);
        }
        if !self.missing_fields.is_empty() {
            let missing: Vec<&str> = self.missing_fields.iter().map(|f| f.key()).collect();
            warn!("Columns not present in export: {}", missing.join(", "));
        }
        for collision in &self.collisions {
            warn!(
                "Header collision on {:?}: kept {:?}, ignored {:?}",
                collision.key, collision.kept, collision.discarded
            );
        }
        for (field, count) in &self.unparseable_cells {
            warn!("{} non-numeric cells in {}", count, field);
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct NormalizedBatch {
    pub records: Vec<ProductRecord>,
    pub report: NormalizationReport,
}

/// Turns raw CSV rows into typed, derived product records in a single pass.
#[derive(Debug, Clone, Default)]
pub struct RecordNormalizer {
    aliases: HeaderAliases,
    settings: MetricSettings,
}

impl RecordNormalizer {
    pub fn new(aliases: HeaderAliases, settings: MetricSettings) -> Self {
        RecordNormalizer { aliases, settings }
    }

    pub fn settings(&self) -> &MetricSettings {
        &self.settings
    }

    /// Normalizes every populated row, preserving source order.
    ///
    /// Blank rows are removed before the header index is built, so the index
    /// always comes from the first populated row. Never fails: a bad cell
    /// only degrades its own field.
    pub fn normalize(&self, rows: &[RawRow]) -> NormalizedBatch {
        let populated: Vec<&RawRow> = rows.iter().filter(|row| !row.is_blank()).collect();

        let mut report = NormalizationReport {
            input_rows: rows.len(),
            blank_rows_dropped: rows.len() - populated.len(),
            ..Default::default()
        };

        let Some(first) = populated.first() else {
            return NormalizedBatch {
                records: Vec::new(),
                report,
            };
        };

        let index = HeaderIndex::build(first);
        let fields = FieldMap::new(&index, &self.aliases);
        report.resolved_fields = fields.found();
        report.missing_fields = fields.missing();
        report.collisions = index.collisions().to_vec();

        let records: Vec<ProductRecord> = populated
            .into_iter()
            .map(|row| self.normalize_row(row, &fields, &mut report.unparseable_cells))
            .collect();

        report.records = records.len();
        NormalizedBatch { records, report }
    }

    fn normalize_row(
        &self,
        row: &RawRow,
        fields: &FieldMap,
        unparseable: &mut BTreeMap<CanonicalField, usize>,
    ) -> ProductRecord {
        let text = |field: CanonicalField| fields.cell(row, field);
        let label = |field: CanonicalField| to_trimmed_string(text(field), UNKNOWN);
        let flag = |field: CanonicalField| to_truthy_bool(text(field));
        let mut measure = |field: CanonicalField, coerce: fn(Option<&str>) -> Measure| {
            let raw = text(field);
            if is_unparseable_number(raw) {
                *unparseable.entry(field).or_default() += 1;
            }
            coerce(raw)
        };

        let product_id = Some(to_trimmed_string(text(CanonicalField::ProductId), ""))
            .filter(|id| !id.is_empty());

        let record = ProductRecord {
            sku: to_trimmed_string(text(CanonicalField::Sku), ""),
            product_id,
            name: to_trimmed_string(text(CanonicalField::Name), ""),

            brand: label(CanonicalField::Brand),
            parent_category: label(CanonicalField::ParentCategory),
            sub_category: label(CanonicalField::SubCategory),
            classification: label(CanonicalField::Classification),

            cost_ex_vat: measure(CanonicalField::CostExVat, to_number),
            sell_ex_vat: measure(CanonicalField::SellExVat, to_number),
            sell_inc_vat: measure(CanonicalField::SellIncVat, to_number),
            sale_price: measure(CanonicalField::SalePrice, to_number),
            sale_inc_vat: measure(CanonicalField::SaleIncVat, to_number),

            profit_percent: measure(CanonicalField::ProfitPercent, to_number),
            reported_stock_value: measure(CanonicalField::StockValue, to_number),
            reported_revenue_ytd: measure(CanonicalField::RevenueYtd, to_number),
            reported_revenue_last_year: measure(CanonicalField::RevenueLastYear, to_number),

            units_this_year: measure(CanonicalField::UnitsThisYear, to_number),
            units_last_year: measure(CanonicalField::UnitsLastYear, to_number),
            available_stock: measure(CanonicalField::AvailableStock, to_number),
            supplier_stock: measure(CanonicalField::SupplierStock, to_number),
            image_count: measure(CanonicalField::ImageCount, to_int),

            on_order: flag(CanonicalField::OnOrder),
            has_pdp: flag(CanonicalField::HasPdp),
            has_optimised_description: flag(CanonicalField::OptimisedDescription),
            filters_correct: flag(CanonicalField::FiltersCorrect),

            metrics: DerivedMetrics::default(),
        };

        record.with_metrics(&self.settings)
    }
}
