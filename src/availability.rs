//! Checks one map area's grid view for sites open the whole weekend.

use crate::browser::{BrowserSession, SessionLauncher};
use crate::error::Result;
use crate::models::{AvailableSiteGroup, MapArea, SiteAvailabilityRow};
use std::time::Instant;

/// Toggle that switches the results page to the per-day grid.
pub(crate) const CALENDAR_VIEW_SELECTOR: &str = r#"[aria-label="Calendar View"]"#;
/// The grid is the first table on the page.
pub(crate) const GRID_TABLE_SELECTOR: &str = "table";

/// Loads `url` in a fresh browser session and returns the sites of `area`
/// that are open Friday, Saturday and Sunday.
///
/// The session is always closed, also when the page does not have the
/// expected structure; in that case the error is returned and no partial
/// result is produced.
pub(crate) fn scrape_map_area(
    launcher: &dyn SessionLauncher,
    area: &MapArea,
    url: &str,
) -> Result<AvailableSiteGroup> {
    let start_time = Instant::now();
    tracing::info!(target: "scrape_task", "Checking {} ({})", area.name, url);

    let mut session = launcher.launch()?;
    let outcome = read_weekend_rows(session.as_mut(), url);
    if let Err(e) = session.close() {
        tracing::warn!(target: "scrape_task", "Failed to close browser for {}: {}", area.name, e);
    }
    let rows = outcome?;

    let sites_available: Vec<String> = rows
        .iter()
        .filter(|row| row.is_available_all_weekend())
        .map(|row| row.site.clone())
        .collect();

    tracing::info!(target: "scrape_task",
        "{} checked in {:.2?}: {} sites listed, {} open all weekend",
        area.name,
        start_time.elapsed(),
        rows.len(),
        sites_available.len()
    );

    Ok(AvailableSiteGroup {
        map_area: area.name.clone(),
        url: url.to_string(),
        sites_available,
    })
}

fn read_weekend_rows(session: &mut dyn BrowserSession, url: &str) -> Result<Vec<SiteAvailabilityRow>> {
    session.navigate(url)?;
    session.wait_idle()?;
    session.click(CALENDAR_VIEW_SELECTOR)?;
    session.wait_idle()?;

    session
        .extract_table(GRID_TABLE_SELECTOR)?
        .iter()
        .skip(1)
        .map(SiteAvailabilityRow::from_table_row)
        .collect()
}

#[cfg(test)]
pub(crate) mod testing {
    //! Scripted browser sessions for exercising the scraper and pipeline.

    use super::*;
    use crate::error::AppError;
    use crate::table::{TableCell, TableRow};
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};

    /// Builds a grid with a header row followed by one row per site.
    pub(crate) fn grid(sites: &[(&str, bool, bool, bool)]) -> Vec<TableRow> {
        let day = |open: bool| TableCell {
            text: String::new(),
            classes: if open {
                vec!["grid-cell".to_string(), "grid-available".to_string()]
            } else {
                vec!["grid-cell".to_string()]
            },
        };
        let header = TableRow {
            cells: ["Site", "Fri", "Sat", "Sun"]
                .iter()
                .map(|t| TableCell {
                    text: t.to_string(),
                    classes: vec![],
                })
                .collect(),
        };
        std::iter::once(header)
            .chain(sites.iter().map(|(name, fri, sat, sun)| TableRow {
                cells: vec![
                    TableCell {
                        text: format!("{}\nDetails", name),
                        classes: vec![],
                    },
                    day(*fri),
                    day(*sat),
                    day(*sun),
                ],
            }))
            .collect()
    }

    /// Serves canned tables keyed by the `mapId` in the URL and records every
    /// browser call in order.
    #[derive(Default, Clone)]
    pub(crate) struct FakeLauncher {
        pub tables: HashMap<String, Vec<TableRow>>,
        pub missing_toggle: Vec<String>,
        pub log: Arc<Mutex<Vec<String>>>,
    }

    impl FakeLauncher {
        pub(crate) fn with_table(mut self, map_id: &str, rows: Vec<TableRow>) -> Self {
            self.tables.insert(map_id.to_string(), rows);
            self
        }

        pub(crate) fn without_toggle(mut self, map_id: &str) -> Self {
            self.missing_toggle.push(map_id.to_string());
            self
        }

        pub(crate) fn events(&self) -> Vec<String> {
            self.log.lock().unwrap().clone()
        }
    }

    impl SessionLauncher for FakeLauncher {
        fn launch(&self) -> Result<Box<dyn BrowserSession>> {
            self.log.lock().unwrap().push("launch".to_string());
            Ok(Box::new(FakeSession {
                launcher: self.clone(),
                map_id: None,
            }))
        }
    }

    struct FakeSession {
        launcher: FakeLauncher,
        map_id: Option<String>,
    }

    impl FakeSession {
        fn record(&self, event: String) {
            self.launcher.log.lock().unwrap().push(event);
        }
    }

    impl BrowserSession for FakeSession {
        fn navigate(&mut self, url: &str) -> Result<()> {
            self.map_id = url
                .rsplit_once("mapId=")
                .map(|(_, id)| id.to_string());
            self.record(format!("navigate {}", url));
            Ok(())
        }

        fn click(&mut self, selector: &str) -> Result<()> {
            let id = self.map_id.clone().unwrap_or_default();
            if self.launcher.missing_toggle.contains(&id) {
                return Err(AppError::SelectorNotFound(selector.to_string()));
            }
            self.record(format!("click {}", selector));
            Ok(())
        }

        fn wait_idle(&mut self) -> Result<()> {
            self.record("idle".to_string());
            Ok(())
        }

        fn extract_table(&mut self, selector: &str) -> Result<Vec<TableRow>> {
            let id = self.map_id.clone().unwrap_or_default();
            self.launcher
                .tables
                .get(&id)
                .cloned()
                .ok_or_else(|| AppError::SelectorNotFound(selector.to_string()))
        }

        fn close(self: Box<Self>) -> Result<()> {
            self.record("close".to_string());
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::{FakeLauncher, grid};
    use super::*;
    use crate::error::AppError;

    fn lakeview() -> MapArea {
        MapArea {
            id: "-2147483623".to_string(),
            name: "Lakeview".to_string(),
        }
    }

    const URL: &str = "https://x.example.com/search?a=1&mapId=-2147483623";

    #[test]
    fn keeps_only_sites_open_all_three_days() {
        let launcher = FakeLauncher::default().with_table(
            "-2147483623",
            grid(&[
                ("A12", true, true, true),
                ("A13", false, true, true),
                ("B7", true, true, true),
                ("B8", true, false, true),
            ]),
        );

        let group = scrape_map_area(&launcher, &lakeview(), URL).unwrap();
        assert_eq!(group.map_area, "Lakeview");
        assert_eq!(group.url, URL);
        assert_eq!(group.sites_available, ["A12", "B7"]);
    }

    #[test]
    fn drives_the_page_in_order_and_closes() {
        let launcher = FakeLauncher::default().with_table("-2147483623", grid(&[]));
        scrape_map_area(&launcher, &lakeview(), URL).unwrap();
        assert_eq!(
            launcher.events(),
            [
                "launch".to_string(),
                format!("navigate {}", URL),
                "idle".to_string(),
                format!("click {}", CALENDAR_VIEW_SELECTOR),
                "idle".to_string(),
                "close".to_string(),
            ]
        );
    }

    #[test]
    fn missing_toggle_fails_but_still_closes() {
        let launcher = FakeLauncher::default()
            .with_table("-2147483623", grid(&[("A12", true, true, true)]))
            .without_toggle("-2147483623");

        let err = scrape_map_area(&launcher, &lakeview(), URL).unwrap_err();
        assert!(matches!(err, AppError::SelectorNotFound(_)));
        assert_eq!(launcher.events().last().map(String::as_str), Some("close"));
    }

    #[test]
    fn header_only_table_yields_empty_group() {
        let launcher = FakeLauncher::default().with_table("-2147483623", grid(&[]));
        let group = scrape_map_area(&launcher, &lakeview(), URL).unwrap();
        assert!(group.sites_available.is_empty());
    }
}
