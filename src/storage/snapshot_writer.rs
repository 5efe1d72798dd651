use crate::models::{Measure, ProductRecord, StockValueSource};
use crate::processor::aggregation::{
    self, BandUnits, BrandRollup, Dimension, KeyValue, Kpis, MeasureKind, UnitsRollup,
};
use crate::processor::record_filter::RecordFilter;
use crate::processor::record_normalizer::NormalizationReport;
use anyhow::{Context, Result, anyhow};
use chrono::{DateTime, Utc};
use polars::prelude::*;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::info;
use uuid::Uuid;

/// Parent categories shown before the rest are folded into "Other".
const TOP_PARENT_CATEGORIES: usize = 10;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TopSku {
    pub sku: String,
    pub name: String,
    pub value: f64,
}

/// Everything the dashboard charts need, computed from one filtered view.
#[derive(Debug, Clone, Serialize)]
pub struct DashboardSummary {
    pub dataset: String,
    pub generated_at: DateTime<Utc>,
    pub total_records: usize,
    pub filter: RecordFilter,
    pub kpis: Kpis,
    pub brands: Vec<BrandRollup>,
    pub classification_units: Vec<UnitsRollup>,
    pub revenue_by_parent_category: Vec<KeyValue>,
    pub units_by_discount_band: Vec<BandUnits>,
    pub classification_stock_value: Vec<KeyValue>,
    pub top_skus_by_revenue: Vec<TopSku>,
    pub top_skus_by_profit: Vec<TopSku>,
    pub top_skus_by_stock_value: Vec<TopSku>,
    pub normalization: NormalizationReport,
}

impl DashboardSummary {
    pub fn build(
        dataset: &str,
        records: &[ProductRecord],
        filter: &RecordFilter,
        top_n: usize,
        report: &NormalizationReport,
    ) -> Self {
        let view = filter.apply(records);

        let top = |metric: MeasureKind| -> Vec<TopSku> {
            aggregation::top_skus(&view, metric, top_n)
                .into_iter()
                .map(|(record, value)| TopSku {
                    sku: record.sku.clone(),
                    name: record.name.clone(),
                    value,
                })
                .collect()
        };

        DashboardSummary {
            dataset: dataset.to_string(),
            generated_at: Utc::now(),
            total_records: records.len(),
            filter: filter.clone(),
            kpis: aggregation::kpis(&view),
            brands: aggregation::by_brand(&view),
            classification_units: aggregation::by_classification_units(&view),
            revenue_by_parent_category: aggregation::top_n_with_other(
                aggregation::sum_by(&view, Dimension::ParentCategory, MeasureKind::Revenue),
                TOP_PARENT_CATEGORIES,
            ),
            units_by_discount_band: aggregation::units_by_discount_band(&view),
            classification_stock_value: aggregation::classification_stock_summary(&view),
            top_skus_by_revenue: top(MeasureKind::Revenue),
            top_skus_by_profit: top(MeasureKind::Profit),
            top_skus_by_stock_value: top(MeasureKind::StockValue),
            normalization: report.clone(),
        }
    }
}

/// Writes normalized record sets to disk as Parquet plus a JSON summary.
pub struct SnapshotWriter {
    output_dir: PathBuf,
}

impl SnapshotWriter {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        SnapshotWriter {
            output_dir: output_dir.into(),
        }
    }

    /// `clean/{dataset}/{YYYY/MM/DD}/{uuid}.{extension}`, relative to the output dir.
    pub fn generate_clean_path(dataset: &str, extension: &str) -> String {
        let date = Utc::now().format("%Y/%m/%d").to_string();
        let file_id = Uuid::new_v4();
        format!("clean/{}/{}/{}.{}", dataset, date, file_id, extension)
    }

    /// One row per record; `Missing` measures become nulls.
    pub fn to_dataframe(records: &[ProductRecord]) -> Result<DataFrame> {
        let text = |name: &str, f: fn(&ProductRecord) -> String| -> Column {
            let values: Vec<String> = records.iter().map(f).collect();
            Series::new(name.into(), values).into()
        };
        let measure = |name: &str, f: fn(&ProductRecord) -> Measure| -> Column {
            let values: Vec<Option<f64>> = records.iter().map(|r| f(r).value()).collect();
            Series::new(name.into(), values).into()
        };
        let flag = |name: &str, f: fn(&ProductRecord) -> bool| -> Column {
            let values: Vec<bool> = records.iter().map(f).collect();
            Series::new(name.into(), values).into()
        };

        let product_ids: Vec<Option<String>> =
            records.iter().map(|r| r.product_id.clone()).collect();
        let stock_value_sources: Vec<&str> = records
            .iter()
            .map(|r| match r.metrics.stock_value_source {
                StockValueSource::Reported => "reported",
                StockValueSource::Computed => "computed",
                StockValueSource::Unavailable => "unavailable",
            })
            .collect();

        let columns: Vec<Column> = vec![
            text("sku", |r| r.sku.clone()),
            Series::new("product_id".into(), product_ids).into(),
            text("name", |r| r.name.clone()),
            text("brand", |r| r.brand.clone()),
            text("parent_category", |r| r.parent_category.clone()),
            text("sub_category", |r| r.sub_category.clone()),
            text("classification", |r| r.classification.clone()),
            measure("cost_ex_vat", |r| r.cost_ex_vat),
            measure("sell_ex_vat", |r| r.sell_ex_vat),
            measure("sell_inc_vat", |r| r.sell_inc_vat),
            measure("sale_price", |r| r.sale_price),
            measure("sale_inc_vat", |r| r.sale_inc_vat),
            measure("profit_percent", |r| r.profit_percent),
            measure("reported_stock_value", |r| r.reported_stock_value),
            measure("reported_revenue_ytd", |r| r.reported_revenue_ytd),
            measure("reported_revenue_last_year", |r| r.reported_revenue_last_year),
            measure("units_this_year", |r| r.units_this_year),
            measure("units_last_year", |r| r.units_last_year),
            measure("available_stock", |r| r.available_stock),
            measure("supplier_stock", |r| r.supplier_stock),
            measure("image_count", |r| r.image_count),
            flag("on_order", |r| r.on_order),
            flag("has_pdp", |r| r.has_pdp),
            flag("has_optimised_description", |r| r.has_optimised_description),
            flag("filters_correct", |r| r.filters_correct),
            measure("effective_price", |r| r.metrics.effective_price),
            measure("revenue", |r| r.metrics.revenue),
            measure("profit", |r| r.metrics.profit),
            measure("discount_percent", |r| r.metrics.discount_percent),
            measure("stock_value", |r| r.metrics.stock_value),
            Series::new("stock_value_source".into(), stock_value_sources).into(),
            measure("weeks_of_cover", |r| r.metrics.weeks_of_cover),
            flag("content_ready", |r| r.metrics.content_ready),
        ];

        DataFrame::new(columns).map_err(|e| anyhow!("Failed to create DataFrame: {}", e))
    }

    pub async fn write_parquet(&self, records: &[ProductRecord], dataset: &str) -> Result<PathBuf> {
        let mut df = Self::to_dataframe(records)?;

        info!("Converting {} records to Parquet format", df.height());
        let mut buf = Vec::new();
        {
            let writer = ParquetWriter::new(&mut buf);
            writer
                .finish(&mut df)
                .map_err(|e| anyhow!("Failed to encode Parquet: {}", e))?;
        }

        let path = self
            .output_dir
            .join(Self::generate_clean_path(dataset, "parquet"));
        write_file(&path, &buf).await?;
        info!("Stored Parquet snapshot at: {}", path.display());
        Ok(path)
    }

    pub async fn write_summary(&self, summary: &DashboardSummary, dataset: &str) -> Result<PathBuf> {
        let json = serde_json::to_vec_pretty(summary).context("Failed to serialize summary")?;

        let path = self.output_dir.join(Self::generate_clean_path(dataset, "json"));
        write_file(&path, &json).await?;
        info!("Stored dashboard summary at: {}", path.display());
        Ok(path)
    }
}

async fn write_file(path: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
    }
    tokio::fs::write(path, bytes)
        .await
        .with_context(|| format!("Failed to write file: {}", path.display()))
}
