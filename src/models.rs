//! Defines the core data structures used in the campsite-sentry application.

use crate::error::{AppError, Result};
use crate::table::TableRow;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// CSS class the reservation grid puts on a day cell that can be booked.
pub(crate) const AVAILABLE_CLASS: &str = "grid-available";

/// A named section of the campground with its own reservation calendar.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub(crate) struct MapArea {
    /// The identifier the reservation site uses in its `mapId` parameter.
    pub id: String,
    /// Human readable name used in logs and the notification.
    pub name: String,
}

impl MapArea {
    fn new(id: &str, name: &str) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
        }
    }
}

/// The map areas checked on every run, in check order.
pub(crate) fn default_map_areas() -> Vec<MapArea> {
    vec![
        MapArea::new("-2147483623", "Lakeview"),
        MapArea::new("-2147483625", "Lookout Point"),
        MapArea::new("-2147483624", "Sandy Bay"),
        MapArea::new("-2147483622", "Hillcrest"),
        MapArea::new("-2147483621", "Sunrise"),
    ]
}

/// One row of the grid view: a site and whether each weekend day is open.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct SiteAvailabilityRow {
    pub site: String,
    pub friday: bool,
    pub saturday: bool,
    pub sunday: bool,
}

impl SiteAvailabilityRow {
    /// Reads a grid row: site name from the first cell, then Friday, Saturday
    /// and Sunday from the next three. Any further cells are ignored.
    pub(crate) fn from_table_row(row: &TableRow) -> Result<Self> {
        if row.cells.len() < 4 {
            return Err(AppError::MalformedTable(format!(
                "expected at least 4 cells per site row, found {}",
                row.cells.len()
            )));
        }

        let site = row.cells[0]
            .text
            .lines()
            .next()
            .unwrap_or("")
            .trim()
            .to_string();

        Ok(Self {
            site,
            friday: row.cells[1].has_class(AVAILABLE_CLASS),
            saturday: row.cells[2].has_class(AVAILABLE_CLASS),
            sunday: row.cells[3].has_class(AVAILABLE_CLASS),
        })
    }

    /// A site only counts when every one of the three nights is open.
    pub(crate) fn is_available_all_weekend(&self) -> bool {
        self.friday && self.saturday && self.sunday
    }
}

/// Sites open all weekend within one map area.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub(crate) struct AvailableSiteGroup {
    pub map_area: String,
    pub url: String,
    pub sites_available: Vec<String>,
}

/// The search window sent to the reservation site.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub(crate) struct DateRange {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
}

impl DateRange {
    /// Parses two ISO dates (`YYYY-MM-DD`), rejecting an inverted range.
    pub(crate) fn parse(start: &str, end: &str) -> Result<Self> {
        let start_date = NaiveDate::parse_from_str(start.trim(), "%Y-%m-%d")?;
        let end_date = NaiveDate::parse_from_str(end.trim(), "%Y-%m-%d")?;
        if start_date > end_date {
            return Err(AppError::Config(format!(
                "START_DATE {} is after END_DATE {}",
                start_date, end_date
            )));
        }
        Ok(Self {
            start_date,
            end_date,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::TableCell;

    fn cell(text: &str, classes: &[&str]) -> TableCell {
        TableCell {
            text: text.to_string(),
            classes: classes.iter().map(|c| c.to_string()).collect(),
        }
    }

    fn row(fri: bool, sat: bool, sun: bool) -> TableRow {
        let day = |open: bool| {
            if open {
                cell("", &["grid-cell", AVAILABLE_CLASS])
            } else {
                cell("", &["grid-cell", "grid-unavailable"])
            }
        };
        TableRow {
            cells: vec![cell("A12\nElectric, 30 amp", &[]), day(fri), day(sat), day(sun)],
        }
    }

    #[test]
    fn all_three_days_required() {
        for mask in 0..8u8 {
            let (fri, sat, sun) = (mask & 1 != 0, mask & 2 != 0, mask & 4 != 0);
            let parsed = SiteAvailabilityRow::from_table_row(&row(fri, sat, sun)).unwrap();
            assert_eq!(parsed.is_available_all_weekend(), fri && sat && sun);
        }
    }

    #[test]
    fn site_name_is_first_line_of_first_cell() {
        let parsed = SiteAvailabilityRow::from_table_row(&row(true, true, true)).unwrap();
        assert_eq!(parsed.site, "A12");
    }

    #[test]
    fn site_name_keeps_inline_markup_text() {
        let mut r = row(true, true, true);
        r.cells[0] = cell("Site 12\nElectric", &[]);
        let parsed = SiteAvailabilityRow::from_table_row(&r).unwrap();
        assert_eq!(parsed.site, "Site 12");
    }

    #[test]
    fn date_range_serializes_as_iso_dates() {
        let dates = DateRange::parse("2023-09-01", "2023-09-04").unwrap();
        let json = serde_json::to_value(dates).unwrap();
        assert_eq!(
            json,
            serde_json::json!({ "startDate": "2023-09-01", "endDate": "2023-09-04" })
        );
    }

    #[test]
    fn extra_cells_are_ignored() {
        let mut r = row(false, true, true);
        r.cells.push(cell("", &[AVAILABLE_CLASS]));
        let parsed = SiteAvailabilityRow::from_table_row(&r).unwrap();
        assert!(!parsed.is_available_all_weekend());
    }

    #[test]
    fn short_row_is_malformed() {
        let r = TableRow {
            cells: vec![cell("A12", &[]), cell("", &[AVAILABLE_CLASS])],
        };
        assert!(matches!(
            SiteAvailabilityRow::from_table_row(&r),
            Err(AppError::MalformedTable(_))
        ));
    }

    #[test]
    fn date_range_rejects_inverted_bounds() {
        assert!(DateRange::parse("2023-09-01", "2023-09-04").is_ok());
        assert!(DateRange::parse("2023-09-04", "2023-09-01").is_err());
        assert!(DateRange::parse("09/01/2023", "2023-09-04").is_err());
    }

    #[test]
    fn five_map_areas_in_fixed_order() {
        let names: Vec<String> = default_map_areas().into_iter().map(|a| a.name).collect();
        assert_eq!(
            names,
            ["Lakeview", "Lookout Point", "Sandy Bay", "Hillcrest", "Sunrise"]
        );
    }
}
