//! Runs the availability check across all configured map areas.

use crate::availability::scrape_map_area;
use crate::browser::SessionLauncher;
use crate::config::{Config, RunMode, SiteSettings};
use crate::error::{AppError, Result};
use crate::guard::{WindowStatus, check_window};
use crate::models::AvailableSiteGroup;
use crate::notify::{Mailer, Notifier};
use crate::urls::map_area_url;
use chrono::{DateTime, Utc};
use indicatif::{ProgressBar, ProgressStyle};
use std::process::ExitCode;
use std::sync::Arc;

/// How a completed run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum RunOutcome {
    /// Nothing open; no e-mail was sent.
    NoAvailability,
    /// At least one site open; `delivered` reports whether the e-mail went out.
    Notified {
        groups: Vec<AvailableSiteGroup>,
        delivered: bool,
    },
}

/// Checks every map area one after another.
///
/// Each area gets its own browser session on a blocking thread, and the next
/// area only starts once that session has been closed. The first failing
/// area aborts the run.
pub(crate) async fn check_map_areas<L>(
    launcher: Arc<L>,
    site: &SiteSettings,
) -> Result<Vec<AvailableSiteGroup>>
where
    L: SessionLauncher + 'static,
{
    let progress_bar = ProgressBar::new(site.map_areas.len() as u64);
    progress_bar.set_style(
        ProgressStyle::default_bar()
            .template("[{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} {msg}")
            .map_err(|e| AppError::Generic(e.into()))?
            .progress_chars("##-"),
    );

    let mut results = Vec::with_capacity(site.map_areas.len());
    for area in &site.map_areas {
        let url = map_area_url(&site.base_url, &site.dates, area)?;
        progress_bar.set_message(area.name.clone());

        let launcher = launcher.clone();
        let area = area.clone();
        let group = tokio::task::spawn_blocking(move || scrape_map_area(&*launcher, &area, &url))
            .await
            .map_err(|e| AppError::Task(format!("Scrape task failed: {}", e)))??;

        results.push(group);
        progress_bar.inc(1);
    }

    progress_bar.finish_with_message("Map areas checked");
    Ok(results)
}

/// Keeps only the map areas with at least one open site.
pub(crate) fn filter_available(groups: Vec<AvailableSiteGroup>) -> Vec<AvailableSiteGroup> {
    groups
        .into_iter()
        .filter(|group| !group.sites_available.is_empty())
        .collect()
}

/// Scrapes, filters and, when anything is open, sends one notification.
pub(crate) async fn run<L, M>(
    launcher: Arc<L>,
    site: &SiteSettings,
    notifier: &Notifier<M>,
) -> Result<RunOutcome>
where
    L: SessionLauncher + 'static,
    M: Mailer,
{
    let names: Vec<&str> = site.map_areas.iter().map(|a| a.name.as_str()).collect();
    tracing::info!(target: "run_task", "Running scrape of map areas {:?}", names);

    let groups = filter_available(check_map_areas(launcher, site).await?);

    if groups.is_empty() {
        tracing::info!(target: "run_task", "No newly available sites found.");
        return Ok(RunOutcome::NoAvailability);
    }

    tracing::info!(target: "run_task", "Newly available sites: {}", serde_json::to_string(&groups)?);
    let delivered = notifier.notify(&groups, &site.dates).await;

    Ok(RunOutcome::Notified { groups, delivered })
}

/// The whole invocation: date guard, optional transport test, then the run.
///
/// An expired window returns [`AppError::WindowExpired`] before any browser
/// is launched. The guard does not apply in debug mode, whose fixed dates
/// are in the past.
pub(crate) async fn execute<L, M>(
    config: &Config,
    launcher: Arc<L>,
    notifier: &Notifier<M>,
    now: DateTime<Utc>,
) -> Result<RunOutcome>
where
    L: SessionLauncher + 'static,
    M: Mailer,
{
    match config.mode {
        RunMode::Production => {
            let start = config.site.dates.start_date;
            if check_window(start, now) == WindowStatus::Expired {
                return Err(AppError::WindowExpired(start));
            }
        }
        RunMode::Debug => {
            tracing::warn!(target: "run_task", "Debug mode: date guard skipped, scope reduced")
        }
    }

    if config.notification.debug_email {
        tracing::info!(target: "run_task", "DEBUG_EMAIL set, sending test message");
        notifier.send_test_email().await;
    }

    run(launcher, &config.site, notifier).await
}

/// Maps a finished invocation to the process exit status.
pub(crate) fn exit_code(result: &Result<RunOutcome>) -> ExitCode {
    match result {
        Ok(RunOutcome::NoAvailability) => ExitCode::SUCCESS,
        Ok(RunOutcome::Notified { groups, delivered }) => {
            if !delivered {
                tracing::warn!(target: "run_task",
                    "{} map areas had availability but the e-mail was not sent",
                    groups.len()
                );
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::error!(target: "run_task", "Availability check failed: {}", e);
            ExitCode::FAILURE
        }
    }
}
