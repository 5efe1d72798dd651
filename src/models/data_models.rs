use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// A numeric cell after coercion: either a finite value or explicitly missing.
///
/// Missing is never zero. Arithmetic through the helpers below propagates
/// `Missing`, and only aggregation (`or_zero`) chooses to skip it.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum Measure {
    #[default]
    Missing,
    Present(f64),
}

impl Measure {
    /// Wraps a float, mapping NaN and infinities to `Missing`.
    pub fn new(value: f64) -> Self {
        if value.is_finite() {
            Measure::Present(value)
        } else {
            Measure::Missing
        }
    }

    pub fn value(self) -> Option<f64> {
        match self {
            Measure::Present(v) => Some(v),
            Measure::Missing => None,
        }
    }

    pub fn is_present(self) -> bool {
        matches!(self, Measure::Present(_))
    }

    pub fn is_missing(self) -> bool {
        !self.is_present()
    }

    /// Contribution of this measure to a sum.
    pub fn or_zero(self) -> f64 {
        self.value().unwrap_or(0.0)
    }

    /// True only for present values strictly greater than zero.
    pub fn is_positive(self) -> bool {
        self.value().is_some_and(|v| v > 0.0)
    }

    pub fn map(self, f: impl FnOnce(f64) -> f64) -> Measure {
        match self {
            Measure::Present(v) => Measure::new(f(v)),
            Measure::Missing => Measure::Missing,
        }
    }

    pub fn filter(self, predicate: impl FnOnce(f64) -> bool) -> Measure {
        match self {
            Measure::Present(v) if predicate(v) => self,
            _ => Measure::Missing,
        }
    }

    /// Combines two measures; missing if either side is missing.
    pub fn zip_with(self, other: Measure, f: impl FnOnce(f64, f64) -> f64) -> Measure {
        match (self, other) {
            (Measure::Present(a), Measure::Present(b)) => Measure::new(f(a, b)),
            _ => Measure::Missing,
        }
    }

    /// `self` when present, otherwise `fallback`.
    pub fn or(self, fallback: Measure) -> Measure {
        if self.is_present() { self } else { fallback }
    }
}

impl From<Option<f64>> for Measure {
    fn from(value: Option<f64>) -> Self {
        value.map(Measure::new).unwrap_or(Measure::Missing)
    }
}

impl Serialize for Measure {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.value().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Measure {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(Option::<f64>::deserialize(deserializer)?.into())
    }
}

/// One CSV data line: `(column name, cell text)` pairs in header order.
///
/// Column names are kept exactly as exported, including stray whitespace,
/// so that header resolution can see the same noise the file carries.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawRow {
    cells: Vec<(String, String)>,
}

impl RawRow {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        RawRow {
            cells: pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    pub fn push(&mut self, column: impl Into<String>, value: impl Into<String>) {
        self.cells.push((column.into(), value.into()));
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.cells.iter().map(|(k, _)| k.as_str())
    }

    pub fn values(&self) -> impl Iterator<Item = &str> {
        self.cells.iter().map(|(_, v)| v.as_str())
    }

    /// Cell for an exact column name. Duplicate names resolve to the first.
    pub fn get(&self, column: &str) -> Option<&str> {
        self.cells
            .iter()
            .find(|(k, _)| k == column)
            .map(|(_, v)| v.as_str())
    }

    /// True when every cell is empty after trimming (or there are no cells).
    pub fn is_blank(&self) -> bool {
        self.values().all(|v| v.trim().is_empty())
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }
}

/// Where a record's stock value came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StockValueSource {
    /// The export's own "Stock Value" column.
    Reported,
    /// Available stock multiplied by ex-VAT cost.
    Computed,
    #[default]
    Unavailable,
}

/// Metrics computed from a record's normalized fields in the same pass.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct DerivedMetrics {
    pub effective_price: Measure,
    pub revenue: Measure,
    pub profit: Measure,
    pub discount_percent: Measure,
    pub stock_value: Measure,
    pub stock_value_source: StockValueSource,
    pub weeks_of_cover: Measure,
    pub content_ready: bool,
}

impl DerivedMetrics {
    /// Weeks of cover clipped to `cap` for charting; the stored value stays uncapped.
    pub fn weeks_of_cover_capped(&self, cap: f64) -> Measure {
        self.weeks_of_cover.map(|w| w.min(cap))
    }
}

/// A normalized catalogue line. Immutable once produced by the normalizer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductRecord {
    pub sku: String,
    pub product_id: Option<String>,
    pub name: String,

    pub brand: String,
    pub parent_category: String,
    pub sub_category: String,
    pub classification: String,

    pub cost_ex_vat: Measure,
    pub sell_ex_vat: Measure,
    pub sell_inc_vat: Measure,
    pub sale_price: Measure,
    pub sale_inc_vat: Measure,

    pub profit_percent: Measure,
    pub reported_stock_value: Measure,
    pub reported_revenue_ytd: Measure,
    pub reported_revenue_last_year: Measure,

    pub units_this_year: Measure,
    pub units_last_year: Measure,
    pub available_stock: Measure,
    pub supplier_stock: Measure,
    pub image_count: Measure,

    pub on_order: bool,
    pub has_pdp: bool,
    pub has_optimised_description: bool,
    pub filters_correct: bool,

    pub metrics: DerivedMetrics,
}

impl ProductRecord {
    /// Text the dashboard search box matches against.
    pub fn search_text(&self) -> String {
        format!("{} {}", self.sku, self.name).to_lowercase()
    }
}
