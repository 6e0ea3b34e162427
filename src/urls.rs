//! Builds the reservation-site URLs checked for each map area.

use crate::error::Result;
use crate::models::{DateRange, MapArea};
use url::Url;

/// Appends the date range and map id to the configured search URL.
///
/// The base URL already carries its own query string, so parameters are
/// appended with `&` in the order the reservation site expects. The result is
/// parsed once to make sure a broken base URL fails before a browser starts.
pub(crate) fn map_area_url(base_url: &str, dates: &DateRange, area: &MapArea) -> Result<String> {
    let url = format!(
        "{}&startDate={}&endDate={}&mapId={}",
        base_url, dates.start_date, dates.end_date, area.id
    );
    Url::parse(&url)?;
    Ok(url)
}
