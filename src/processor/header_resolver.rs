use crate::models::RawRow;
use anyhow::{Result, anyhow};
use serde::{Serialize, Serializer};
use std::collections::HashMap;
use std::fmt;

/// Every column the normalizer knows how to read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum CanonicalField {
    ProductId,
    Sku,
    Brand,
    ParentCategory,
    SubCategory,
    Name,
    CostExVat,
    SellIncVat,
    SellExVat,
    SalePrice,
    SaleIncVat,
    ProfitPercent,
    StockValue,
    RevenueYtd,
    RevenueLastYear,
    AvailableStock,
    SupplierStock,
    UnitsThisYear,
    UnitsLastYear,
    Classification,
    HasPdp,
    OptimisedDescription,
    FiltersCorrect,
    ImageCount,
    OnOrder,
}

impl CanonicalField {
    pub const ALL: [CanonicalField; 25] = [
        CanonicalField::ProductId,
        CanonicalField::Sku,
        CanonicalField::Brand,
        CanonicalField::ParentCategory,
        CanonicalField::SubCategory,
        CanonicalField::Name,
        CanonicalField::CostExVat,
        CanonicalField::SellIncVat,
        CanonicalField::SellExVat,
        CanonicalField::SalePrice,
        CanonicalField::SaleIncVat,
        CanonicalField::ProfitPercent,
        CanonicalField::StockValue,
        CanonicalField::RevenueYtd,
        CanonicalField::RevenueLastYear,
        CanonicalField::AvailableStock,
        CanonicalField::SupplierStock,
        CanonicalField::UnitsThisYear,
        CanonicalField::UnitsLastYear,
        CanonicalField::Classification,
        CanonicalField::HasPdp,
        CanonicalField::OptimisedDescription,
        CanonicalField::FiltersCorrect,
        CanonicalField::ImageCount,
        CanonicalField::OnOrder,
    ];

    /// Stable key used in config files and diagnostics.
    pub fn key(self) -> &'static str {
        match self {
            CanonicalField::ProductId => "product_id",
            CanonicalField::Sku => "sku",
            CanonicalField::Brand => "brand",
            CanonicalField::ParentCategory => "parent_category",
            CanonicalField::SubCategory => "sub_category",
            CanonicalField::Name => "name",
            CanonicalField::CostExVat => "cost_ex_vat",
            CanonicalField::SellIncVat => "sell_inc_vat",
            CanonicalField::SellExVat => "sell_ex_vat",
            CanonicalField::SalePrice => "sale_price",
            CanonicalField::SaleIncVat => "sale_inc_vat",
            CanonicalField::ProfitPercent => "profit_percent",
            CanonicalField::StockValue => "stock_value",
            CanonicalField::RevenueYtd => "revenue_ytd",
            CanonicalField::RevenueLastYear => "revenue_last_year",
            CanonicalField::AvailableStock => "available_stock",
            CanonicalField::SupplierStock => "supplier_stock",
            CanonicalField::UnitsThisYear => "units_this_year",
            CanonicalField::UnitsLastYear => "units_last_year",
            CanonicalField::Classification => "classification",
            CanonicalField::HasPdp => "has_pdp",
            CanonicalField::OptimisedDescription => "has_optimised_description",
            CanonicalField::FiltersCorrect => "filters_correct",
            CanonicalField::ImageCount => "image_count",
            CanonicalField::OnOrder => "on_order",
        }
    }

    pub fn from_key(key: &str) -> Option<CanonicalField> {
        let key = key.trim();
        Self::ALL.into_iter().find(|f| f.key() == key)
    }

    /// Header spellings seen across export versions, most specific first.
    pub fn builtin_aliases(self) -> &'static [&'static str] {
        match self {
            CanonicalField::ProductId => &["Product ID", "ID"],
            CanonicalField::Sku => &["Product SKU", "SKU"],
            CanonicalField::Brand => &["Brand"],
            CanonicalField::ParentCategory => &["Parent Category", "Category"],
            CanonicalField::SubCategory => &["Sub Category 1", "Sub Category", "Subcategory"],
            CanonicalField::Name => &["Product Name", "Name"],
            CanonicalField::CostExVat => &["Cost Price ex VAT", "Cost Price"],
            CanonicalField::SellIncVat => &["Selling Price inc VAT"],
            CanonicalField::SellExVat => &["Selling Price ex VAT", "Selling Price"],
            CanonicalField::SalePrice => &["Sale Price ex VAT", "Sale Price"],
            CanonicalField::SaleIncVat => &["Sale Price inc VAT", "Sale Price"],
            CanonicalField::ProfitPercent => &["Calculated Profit % Per Unit", "Profit %"],
            CanonicalField::StockValue => &["Stock Value"],
            CanonicalField::RevenueYtd => &[
                "Calculated Revenue YTD",
                "Calculated Revenue",
                "Revenue YTD",
            ],
            CanonicalField::RevenueLastYear => &["Calculated Revenue Last Year", "Revenue Last Year"],
            // "Availabile" is how the range export spells it.
            CanonicalField::AvailableStock => &["Availabile Stock", "Available Stock"],
            CanonicalField::SupplierStock => &["Supplier Stock"],
            CanonicalField::UnitsThisYear => &["Total Sales this Year", "Units Sold This Year"],
            CanonicalField::UnitsLastYear => &["Total Sales Last Year", "Units Sold Last Year"],
            CanonicalField::Classification => &["Best Seller Status", "Classification", "Status"],
            CanonicalField::HasPdp => &["Has PDP", "PDP"],
            CanonicalField::OptimisedDescription => {
                &["Optimised Description", "Has Optimised Description"]
            }
            CanonicalField::FiltersCorrect => &["Filters Correct"],
            CanonicalField::ImageCount => &["Image Count", "Number of Images", "Images"],
            CanonicalField::OnOrder => &["On Order"],
        }
    }
}

impl Serialize for CanonicalField {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.key())
    }
}

impl fmt::Display for CanonicalField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// Extra header spellings per field, tried after the built-in ones.
#[derive(Debug, Clone, Default)]
pub struct HeaderAliases {
    extra: HashMap<CanonicalField, Vec<String>>,
}

impl HeaderAliases {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds aliases from config-style `field key -> [header, ...]` entries.
    pub fn from_config(entries: &HashMap<String, Vec<String>>) -> Result<Self> {
        let mut aliases = Self::new();
        for (key, headers) in entries {
            let field = CanonicalField::from_key(key)
                .ok_or_else(|| anyhow!("Unknown canonical field in [headers]: {}", key))?;
            for header in headers {
                aliases.add(field, header.clone());
            }
        }
        Ok(aliases)
    }

    pub fn add(&mut self, field: CanonicalField, header: impl Into<String>) {
        self.extra.entry(field).or_default().push(header.into());
    }

    /// Candidate header names for a field in priority order.
    pub fn candidates(&self, field: CanonicalField) -> impl Iterator<Item = &str> {
        field.builtin_aliases().iter().copied().chain(
            self.extra
                .get(&field)
                .into_iter()
                .flat_map(|v| v.iter().map(String::as_str)),
        )
    }
}

/// Outcome of looking a field up in the current file's headers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    Found { column: String, alias: String },
    NotFound,
}

impl Resolution {
    pub fn column(&self) -> Option<&str> {
        match self {
            Resolution::Found { column, .. } => Some(column),
            Resolution::NotFound => None,
        }
    }

    pub fn is_found(&self) -> bool {
        matches!(self, Resolution::Found { .. })
    }
}

/// Two raw columns that normalized to the same key; the first one is kept.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeaderCollision {
    pub key: String,
    pub kept: String,
    pub discarded: String,
}

/// Strips BOM and carriage returns, trims, lowercases and collapses
/// internal whitespace. Applying it twice gives the same key.
pub fn normalize_header_key(raw: &str) -> String {
    raw.replace(['\u{FEFF}', '\r'], "")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Normalized header key -> column name exactly as it appears in the file.
#[derive(Debug, Clone, Default)]
pub struct HeaderIndex {
    columns: HashMap<String, String>,
    collisions: Vec<HeaderCollision>,
}

impl HeaderIndex {
    /// Indexes the columns of the first populated row, first-seen wins.
    pub fn build(row: &RawRow) -> Self {
        let mut index = HeaderIndex::default();

        for column in row.columns() {
            let key = normalize_header_key(column);
            if key.is_empty() {
                continue;
            }
            match index.columns.get(&key) {
                Some(kept) => {
                    if kept != column {
                        index.collisions.push(HeaderCollision {
                            key,
                            kept: kept.clone(),
                            discarded: column.to_string(),
                        });
                    }
                }
                None => {
                    index.columns.insert(key, column.to_string());
                }
            }
        }

        index
    }

    /// Looks up a single header spelling.
    pub fn resolve(&self, header_name: &str) -> Resolution {
        match self.columns.get(&normalize_header_key(header_name)) {
            Some(column) => Resolution::Found {
                column: column.clone(),
                alias: header_name.to_string(),
            },
            None => Resolution::NotFound,
        }
    }

    /// Tries each candidate spelling of `field` in order.
    pub fn resolve_field(&self, field: CanonicalField, aliases: &HeaderAliases) -> Resolution {
        aliases
            .candidates(field)
            .map(|alias| self.resolve(alias))
            .find(Resolution::is_found)
            .unwrap_or(Resolution::NotFound)
    }

    /// The row's cell for `field`, `None` when no candidate column exists.
    pub fn cell<'r>(
        &self,
        row: &'r RawRow,
        field: CanonicalField,
        aliases: &HeaderAliases,
    ) -> Option<&'r str> {
        match self.resolve_field(field, aliases) {
            Resolution::Found { column, .. } => row.get(&column),
            Resolution::NotFound => None,
        }
    }

    pub fn contains(&self, header_name: &str) -> bool {
        self.columns.contains_key(&normalize_header_key(header_name))
    }

    pub fn collisions(&self) -> &[HeaderCollision] {
        &self.collisions
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}

/// Resolution of every canonical field against one file, computed once per load.
#[derive(Debug, Clone)]
pub struct FieldMap {
    resolved: HashMap<CanonicalField, Resolution>,
}

impl FieldMap {
    pub fn new(index: &HeaderIndex, aliases: &HeaderAliases) -> Self {
        let resolved = CanonicalField::ALL
            .into_iter()
            .map(|field| (field, index.resolve_field(field, aliases)))
            .collect();
        FieldMap { resolved }
    }

    pub fn resolution(&self, field: CanonicalField) -> &Resolution {
        static NOT_FOUND: Resolution = Resolution::NotFound;
        self.resolved.get(&field).unwrap_or(&NOT_FOUND)
    }

    /// The row's cell for `field`, `None` when the column is absent.
    pub fn cell<'r>(&self, row: &'r RawRow, field: CanonicalField) -> Option<&'r str> {
        self.resolution(field).column().and_then(|column| row.get(column))
    }

    pub fn found(&self) -> Vec<(CanonicalField, String)> {
        let mut found: Vec<_> = self
            .resolved
            .iter()
            .filter_map(|(field, r)| r.column().map(|c| (*field, c.to_string())))
            .collect();
        found.sort();
        found
    }

    pub fn missing(&self) -> Vec<CanonicalField> {
        let mut missing: Vec<_> = self
            .resolved
            .iter()
            .filter(|(_, r)| !r.is_found())
            .map(|(field, _)| *field)
            .collect();
        missing.sort();
        missing
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header_row(columns: &[&str]) -> RawRow {
        RawRow::from_pairs(columns.iter().map(|c| (*c, "x")))
    }

    #[test]
    fn test_header_key_normalization() {
        assert_eq!(normalize_header_key("\u{FEFF} Product   SKU \r"), "product sku");
        assert_eq!(normalize_header_key("Sub\tCategory 1"), "sub category 1");
        assert_eq!(normalize_header_key("   "), "");
    }

    #[test]
    fn test_header_key_normalization_is_idempotent() {
        for raw in ["\u{FEFF}Brand\r", "  Cost Price  ex VAT ", "STOCK\u{00A0}Value", ""] {
            let once = normalize_header_key(raw);
            assert_eq!(normalize_header_key(&once), once);
        }
    }

    #[test]
    fn test_noisy_header_resolves_like_clean_header() {
        let noisy = HeaderIndex::build(&header_row(&["\u{FEFF} Product SKU \r", "Brand"]));
        let clean = HeaderIndex::build(&header_row(&["Product SKU", "Brand"]));
        let aliases = HeaderAliases::new();

        assert_eq!(
            noisy.resolve_field(CanonicalField::Sku, &aliases).column(),
            Some("\u{FEFF} Product SKU \r")
        );
        assert_eq!(
            clean.resolve_field(CanonicalField::Sku, &aliases).column(),
            Some("Product SKU")
        );
    }

    #[test]
    fn test_first_seen_column_wins_on_collision() {
        let index = HeaderIndex::build(&header_row(&["Brand", " brand ", "BRAND"]));

        assert_eq!(index.resolve("brand").column(), Some("Brand"));
        assert_eq!(index.len(), 1);
        assert_eq!(index.collisions().len(), 2);
        assert_eq!(index.collisions()[0].discarded, " brand ");
    }

    #[test]
    fn test_absent_field_is_not_found() {
        let index = HeaderIndex::build(&header_row(&["Brand"]));
        assert_eq!(index.resolve("Supplier Stock"), Resolution::NotFound);
        assert_eq!(
            index.resolve_field(CanonicalField::SupplierStock, &HeaderAliases::new()),
            Resolution::NotFound
        );
    }

    #[test]
    fn test_cell_lookup_through_alias() {
        let row = RawRow::from_pairs([("Availabile Stock", "12"), ("Brand", "Makita")]);
        let index = HeaderIndex::build(&row);
        let aliases = HeaderAliases::new();

        assert_eq!(index.cell(&row, CanonicalField::AvailableStock, &aliases), Some("12"));
        assert_eq!(index.cell(&row, CanonicalField::SupplierStock, &aliases), None);
    }

    #[test]
    fn test_alias_priority_and_recorded_alias() {
        let index = HeaderIndex::build(&header_row(&["Calculated Revenue", "Revenue YTD"]));
        let resolution = index.resolve_field(CanonicalField::RevenueYtd, &HeaderAliases::new());

        assert_eq!(
            resolution,
            Resolution::Found {
                column: "Calculated Revenue".to_string(),
                alias: "Calculated Revenue".to_string(),
            }
        );
    }

    #[test]
    fn test_configured_aliases_are_tried_after_builtin() {
        let mut entries = HashMap::new();
        entries.insert("sku".to_string(), vec!["Item Code".to_string()]);
        let aliases = HeaderAliases::from_config(&entries).unwrap();

        let index = HeaderIndex::build(&header_row(&["item code"]));
        assert_eq!(
            index.resolve_field(CanonicalField::Sku, &aliases).column(),
            Some("item code")
        );

        let both = HeaderIndex::build(&header_row(&["Item Code", "SKU"]));
        assert_eq!(both.resolve_field(CanonicalField::Sku, &aliases).column(), Some("SKU"));
    }

    #[test]
    fn test_unknown_alias_key_is_rejected() {
        let mut entries = HashMap::new();
        entries.insert("colour".to_string(), vec!["Colour".to_string()]);
        assert!(HeaderAliases::from_config(&entries).is_err());
    }

    #[test]
    fn test_field_keys_round_trip() {
        for field in CanonicalField::ALL {
            assert_eq!(CanonicalField::from_key(field.key()), Some(field));
        }
    }

    #[test]
    fn test_field_map_cells() {
        let row = RawRow::from_pairs([("Availabile Stock", "12"), ("Brand", "Makita")]);
        let map = FieldMap::new(&HeaderIndex::build(&row), &HeaderAliases::new());

        assert_eq!(map.cell(&row, CanonicalField::AvailableStock), Some("12"));
        assert_eq!(map.cell(&row, CanonicalField::SupplierStock), None);
        assert!(map.missing().contains(&CanonicalField::SupplierStock));
        assert!(map.found().contains(&(CanonicalField::Brand, "Brand".to_string())));
    }
}
