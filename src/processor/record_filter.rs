use crate::models::{Measure, ProductRecord};
use crate::processor::grade::{compare_labels, grade_rank};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Dashboard filter state. Every criterion is optional; unset ones match all.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecordFilter {
    /// Case-insensitive substring of "{sku} {name}".
    pub query: Option<String>,
    pub brand: Option<String>,
    pub parent_category: Option<String>,
    pub sub_category: Option<String>,
    pub classification: Option<String>,
    /// Keep only lines that sold at least one unit this year.
    pub only_selling: bool,
    pub min_stock_value: Option<f64>,
    pub max_stock_value: Option<f64>,
}

fn active(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.is_empty())
}

impl RecordFilter {
    pub fn matches(&self, record: &ProductRecord) -> bool {
        let categorical = [
            (active(&self.brand), &record.brand),
            (active(&self.parent_category), &record.parent_category),
            (active(&self.sub_category), &record.sub_category),
            (active(&self.classification), &record.classification),
        ];
        if categorical
            .iter()
            .any(|(wanted, actual)| wanted.is_some_and(|w| w != actual.as_str()))
        {
            return false;
        }

        if let Some(query) = self.query.as_deref().map(str::trim).filter(|q| !q.is_empty()) {
            if !record.search_text().contains(&query.to_lowercase()) {
                return false;
            }
        }

        if self.only_selling && !record.units_this_year.is_positive() {
            return false;
        }

        let stock_value = record.metrics.stock_value;
        if let Some(min) = self.min_stock_value {
            if !stock_value.value().is_some_and(|v| v >= min) {
                return false;
            }
        }
        if let Some(max) = self.max_stock_value {
            if !stock_value.value().is_some_and(|v| v <= max) {
                return false;
            }
        }

        true
    }

    /// A view over the matching records, in source order.
    pub fn apply<'a>(&self, records: &'a [ProductRecord]) -> Vec<&'a ProductRecord> {
        records.iter().filter(|r| self.matches(r)).collect()
    }

    /// Narrows an existing view, e.g. table filters on top of page filters.
    pub fn refine<'a>(&self, view: &[&'a ProductRecord]) -> Vec<&'a ProductRecord> {
        view.iter().copied().filter(|r| self.matches(r)).collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortColumn {
    Sku,
    Name,
    Brand,
    ParentCategory,
    SubCategory,
    Classification,
    UnitsThisYear,
    UnitsLastYear,
    AvailableStock,
    SupplierStock,
    StockValue,
    ReportedRevenueLastYear,
    ReportedRevenueYtd,
    Revenue,
    Profit,
    ProfitPercent,
    CostExVat,
    SellExVat,
    SellIncVat,
    SaleIncVat,
    DiscountPercent,
    WeeksOfCover,
}

enum SortKey<'a> {
    Text(&'a str),
    Number(Measure),
}

impl SortColumn {
    fn key_of(self, r: &ProductRecord) -> SortKey<'_> {
        use SortColumn::*;
        match self {
            Sku => SortKey::Text(&r.sku),
            Name => SortKey::Text(&r.name),
            Brand => SortKey::Text(&r.brand),
            ParentCategory => SortKey::Text(&r.parent_category),
            SubCategory => SortKey::Text(&r.sub_category),
            Classification => SortKey::Text(&r.classification),
            UnitsThisYear => SortKey::Number(r.units_this_year),
            UnitsLastYear => SortKey::Number(r.units_last_year),
            AvailableStock => SortKey::Number(r.available_stock),
            SupplierStock => SortKey::Number(r.supplier_stock),
            StockValue => SortKey::Number(r.metrics.stock_value),
            ReportedRevenueLastYear => SortKey::Number(r.reported_revenue_last_year),
            ReportedRevenueYtd => SortKey::Number(r.reported_revenue_ytd),
            Revenue => SortKey::Number(r.metrics.revenue),
            Profit => SortKey::Number(r.metrics.profit),
            ProfitPercent => SortKey::Number(r.profit_percent),
            CostExVat => SortKey::Number(r.cost_ex_vat),
            SellExVat => SortKey::Number(r.sell_ex_vat),
            SellIncVat => SortKey::Number(r.sell_inc_vat),
            SaleIncVat => SortKey::Number(r.sale_inc_vat),
            DiscountPercent => SortKey::Number(r.metrics.discount_percent),
            WeeksOfCover => SortKey::Number(r.metrics.weeks_of_cover),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortDirection {
    Asc,
    #[default]
    Desc,
}

impl SortDirection {
    pub fn flipped(self) -> Self {
        match self {
            SortDirection::Asc => SortDirection::Desc,
            SortDirection::Desc => SortDirection::Asc,
        }
    }

    fn apply(self, ordering: Ordering) -> Ordering {
        match self {
            SortDirection::Asc => ordering,
            SortDirection::Desc => ordering.reverse(),
        }
    }
}

/// Missing values sort last whichever way the column is ordered.
pub fn compare_numbers_missing_last(a: Measure, b: Measure, direction: SortDirection) -> Ordering {
    match (a.value(), b.value()) {
        (Some(a), Some(b)) => direction.apply(a.total_cmp(&b)),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// Grades compare by rank (ascending) and come before every other label;
/// other labels compare case-insensitively.
pub fn compare_text(a: &str, b: &str) -> Ordering {
    match (grade_rank(a), grade_rank(b)) {
        (Some(ar), Some(br)) => ar.total_cmp(&br),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => compare_labels(a, b),
    }
}

/// Table ordering chosen by clicking column headers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct TableSort {
    pub column: SortColumn,
    #[serde(default)]
    pub direction: SortDirection,
}

impl TableSort {
    /// New columns start descending.
    pub fn new(column: SortColumn) -> Self {
        TableSort {
            column,
            direction: SortDirection::Desc,
        }
    }

    /// Clicking the active column flips direction; another column starts over.
    pub fn toggle(current: Option<TableSort>, column: SortColumn) -> TableSort {
        match current {
            Some(sort) if sort.column == column => TableSort {
                column,
                direction: sort.direction.flipped(),
            },
            _ => TableSort::new(column),
        }
    }

    pub fn compare(&self, a: &ProductRecord, b: &ProductRecord) -> Ordering {
        match (self.column.key_of(a), self.column.key_of(b)) {
            (SortKey::Number(x), SortKey::Number(y)) => {
                compare_numbers_missing_last(x, y, self.direction)
            }
            (SortKey::Text(x), SortKey::Text(y)) => self.direction.apply(compare_text(x, y)),
            _ => Ordering::Equal,
        }
    }

    /// Sorted copy of a view; ties keep their incoming order.
    pub fn sort<'a>(&self, view: &[&'a ProductRecord]) -> Vec<&'a ProductRecord> {
        let mut sorted = view.to_vec();
        sorted.sort_by(|a, b| self.compare(a, b));
        sorted
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::processor::derived_metrics::tests::blank_record;

    fn record(sku: &str, brand: &str, units: Measure, stock_value: Measure) -> ProductRecord {
        let mut r = ProductRecord {
            sku: sku.to_string(),
            name: format!("{sku} Cordless Drill"),
            brand: brand.to_string(),
            units_this_year: units,
            ..blank_record()
        };
        r.metrics.stock_value = stock_value;
        r
    }

    fn skus(view: &[&ProductRecord]) -> Vec<String> {
        view.iter().map(|r| r.sku.clone()).collect()
    }

    fn sample() -> Vec<ProductRecord> {
        vec![
            record("DHP482", "Makita", Measure::Present(12.0), Measure::Present(300.0)),
            record("GSB18", "Bosch", Measure::Present(0.0), Measure::Missing),
            record("DTD153", "Makita", Measure::Missing, Measure::Present(50.0)),
        ]
    }

    #[test]
    fn test_empty_filter_keeps_everything_in_order() {
        let records = sample();
        let view = RecordFilter::default().apply(&records);
        assert_eq!(skus(&view), vec!["DHP482", "GSB18", "DTD153"]);
    }

    #[test]
    fn test_categorical_and_query_filters() {
        let records = sample();
        let filter = RecordFilter {
            brand: Some("Makita".to_string()),
            query: Some("  dtd ".to_string()),
            ..Default::default()
        };
        assert_eq!(skus(&filter.apply(&records)), vec!["DTD153"]);

        let blank_brand = RecordFilter {
            brand: Some(String::new()),
            ..Default::default()
        };
        assert_eq!(blank_brand.apply(&records).len(), 3);
    }

    #[test]
    fn test_only_selling_and_stock_bounds() {
        let records = sample();
        let selling = RecordFilter {
            only_selling: true,
            ..Default::default()
        };
        assert_eq!(skus(&selling.apply(&records)), vec!["DHP482"]);

        let bounded = RecordFilter {
            min_stock_value: Some(10.0),
            max_stock_value: Some(100.0),
            ..Default::default()
        };
        assert_eq!(skus(&bounded.apply(&records)), vec!["DTD153"]);
    }

    #[test]
    fn test_refine_narrows_a_view() {
        let records = sample();
        let page = RecordFilter {
            brand: Some("Makita".to_string()),
            ..Default::default()
        }
        .apply(&records);
        let table = RecordFilter {
            only_selling: true,
            ..Default::default()
        };
        assert_eq!(skus(&table.refine(&page)), vec!["DHP482"]);
    }

    #[test]
    fn test_missing_numbers_sort_last_in_both_directions() {
        let records = sample();
        let view = RecordFilter::default().apply(&records);

        let desc = TableSort::new(SortColumn::UnitsThisYear).sort(&view);
        assert_eq!(skus(&desc), vec!["DHP482", "GSB18", "DTD153"]);

        let asc = TableSort::toggle(Some(TableSort::new(SortColumn::UnitsThisYear)), SortColumn::UnitsThisYear);
        assert_eq!(asc.direction, SortDirection::Asc);
        assert_eq!(skus(&asc.sort(&view)), vec!["GSB18", "DHP482", "DTD153"]);
    }

    #[test]
    fn test_text_sort_uses_grade_rank_for_grades() {
        let mut records = sample();
        records[0].classification = "B".to_string();
        records[1].classification = "A+".to_string();
        records[2].classification = "A".to_string();
        let view = RecordFilter::default().apply(&records);

        let sort = TableSort::new(SortColumn::Classification);
        assert_eq!(skus(&sort.sort(&view)), vec!["GSB18", "DTD153", "DHP482"]);
    }

    #[test]
    fn test_toggle_switches_column_resets_direction() {
        let current = TableSort {
            column: SortColumn::Profit,
            direction: SortDirection::Asc,
        };
        let next = TableSort::toggle(Some(current), SortColumn::Brand);
        assert_eq!(next, TableSort::new(SortColumn::Brand));
        assert_eq!(TableSort::toggle(None, SortColumn::Sku).direction, SortDirection::Desc);
    }

    #[test]
    fn test_compare_text_is_case_insensitive() {
        assert_eq!(compare_text("makita", "Bosch"), Ordering::Greater);
        assert_eq!(compare_text("A", "B"), Ordering::Greater);
    }

    #[test]
    fn test_compare_text_puts_grades_before_labels() {
        assert_eq!(compare_text("A", "Apple"), Ordering::Less);
        assert_eq!(compare_text("Apple", "B"), Ordering::Greater);
        assert_eq!(compare_text("Discontinued", "Discontinued"), Ordering::Equal);
    }

    #[test]
    fn test_mixed_grade_and_label_column_sorts_both_ways() {
        let labels = [
            "B", "Discontinued", "A", "New Line", "A+", "apple", "C-", "Unknown", "A", "D",
        ];
        let mut records = Vec::new();
        for round in 0..8 {
            for (i, label) in labels.iter().enumerate() {
                let mut r = blank_record();
                r.sku = format!("{round}-{i}");
                r.classification = label.to_string();
                records.push(r);
            }
        }
        records.rotate_left(13);
        let view = RecordFilter::default().apply(&records);
        let classes = |sorted: Vec<&ProductRecord>| -> Vec<String> {
            let mut out: Vec<String> = sorted.iter().map(|r| r.classification.clone()).collect();
            out.dedup();
            out
        };

        let asc = TableSort {
            column: SortColumn::Classification,
            direction: SortDirection::Asc,
        };
        assert_eq!(
            classes(asc.sort(&view)),
            vec!["D", "C-", "B", "A", "A+", "apple", "Discontinued", "New Line", "Unknown"]
        );

        let desc = TableSort::new(SortColumn::Classification);
        assert_eq!(
            classes(desc.sort(&view)),
            vec!["Unknown", "New Line", "Discontinued", "apple", "A+", "A", "B", "C-", "D"]
        );
    }
}
