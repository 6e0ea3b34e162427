//! Browser session capability and its headless Chrome implementation.

use crate::config::BrowserSettings;
use crate::error::{AppError, Result};
use crate::table::{TableRow, rows_from_script_result, table_rows_script};
use headless_chrome::protocol::cdp::Network;
use headless_chrome::protocol::cdp::types::Event;
use headless_chrome::{Browser, LaunchOptions, Tab};
use std::collections::HashSet;
use std::ffi::OsStr;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

/// What the availability scraper needs from a browser.
///
/// Implementations block; callers run them off the async runtime.
pub(crate) trait BrowserSession {
    /// Loads `url` and waits for the navigation to finish.
    fn navigate(&mut self, url: &str) -> Result<()>;
    /// Clicks the first element matching `selector`.
    fn click(&mut self, selector: &str) -> Result<()>;
    /// Waits until the page has no requests in flight.
    fn wait_idle(&mut self) -> Result<()>;
    /// Returns all rows of the first table matching `selector`.
    fn extract_table(&mut self, selector: &str) -> Result<Vec<TableRow>>;
    /// Shuts the session down.
    fn close(self: Box<Self>) -> Result<()>;
}

/// Opens a fresh, isolated browser session.
pub(crate) trait SessionLauncher: Send + Sync {
    fn launch(&self) -> Result<Box<dyn BrowserSession>>;
}

/// Requests the page has started but not yet finished, fed from CDP
/// network events.
#[derive(Debug)]
pub(crate) struct NetworkTracker {
    in_flight: HashSet<String>,
    last_activity: Instant,
}

impl NetworkTracker {
    pub(crate) fn new(now: Instant) -> Self {
        Self {
            in_flight: HashSet::new(),
            last_activity: now,
        }
    }

    pub(crate) fn request_started(&mut self, request_id: &str, now: Instant) {
        self.in_flight.insert(request_id.to_string());
        self.last_activity = now;
    }

    /// Marks a request finished or failed. Ids started before tracking began
    /// still count as activity.
    pub(crate) fn request_settled(&mut self, request_id: &str, now: Instant) {
        self.in_flight.remove(request_id);
        self.last_activity = now;
    }

    pub(crate) fn pending(&self) -> usize {
        self.in_flight.len()
    }

    /// Idle once nothing is in flight and nothing has happened for `window`.
    pub(crate) fn is_idle(&self, now: Instant, window: Duration) -> bool {
        self.in_flight.is_empty() && now.saturating_duration_since(self.last_activity) >= window
    }
}

/// Launches a separate Chrome process per session.
#[derive(Debug, Clone)]
pub(crate) struct ChromeLauncher {
    settings: BrowserSettings,
}

impl ChromeLauncher {
    pub(crate) fn new(settings: BrowserSettings) -> Self {
        Self { settings }
    }
}

impl SessionLauncher for ChromeLauncher {
    fn launch(&self) -> Result<Box<dyn BrowserSession>> {
        tracing::debug!(target: "scrape_task",
            "Launching browser (headless: {}, executable: {:?})",
            self.settings.headless,
            self.settings.executable
        );

        // Containers run unprivileged, so Chrome's own sandbox cannot start.
        let options = LaunchOptions::default_builder()
            .headless(self.settings.headless)
            .sandbox(false)
            .path(self.settings.executable.clone())
            .idle_browser_timeout(self.settings.navigation_timeout + self.settings.idle_timeout)
            .args(vec![OsStr::new("--disable-dev-shm-usage")])
            .build()
            .map_err(|e| AppError::Browser(format!("Invalid launch options: {}", e)))?;

        let browser = Browser::new(options)
            .map_err(|e| AppError::Browser(format!("Failed to launch browser: {}", e)))?;
        let tab = browser
            .new_tab()
            .map_err(|e| AppError::Browser(format!("Failed to open tab: {}", e)))?;
        tab.set_default_timeout(self.settings.navigation_timeout);

        let network = Arc::new(Mutex::new(NetworkTracker::new(Instant::now())));
        let tracker = network.clone();
        tab.add_event_listener(Arc::new(move |event: &Event| {
            let Ok(mut tracker) = tracker.lock() else {
                return;
            };
            match event {
                Event::NetworkRequestWillBeSent(e) => {
                    tracker.request_started(&e.params.request_id, Instant::now())
                }
                Event::NetworkLoadingFinished(e) => {
                    tracker.request_settled(&e.params.request_id, Instant::now())
                }
                Event::NetworkLoadingFailed(e) => {
                    tracker.request_settled(&e.params.request_id, Instant::now())
                }
                _ => {}
            }
        }))
        .map_err(|e| AppError::Browser(format!("Failed to watch network events: {}", e)))?;
        tab.call_method(Network::Enable {
            max_total_buffer_size: None,
            max_resource_buffer_size: None,
            max_post_data_size: None,
            report_direct_socket_traffic: None,
            enable_durable_messages: None,
        })
        .map_err(|e| AppError::Browser(format!("Failed to enable network events: {}", e)))?;

        Ok(Box::new(ChromeSession {
            browser,
            tab,
            network,
            idle_timeout: self.settings.idle_timeout,
            idle_window: self.settings.idle_window,
        }))
    }
}

const IDLE_POLL_INTERVAL: Duration = Duration::from_millis(100);

pub(crate) struct ChromeSession {
    browser: Browser,
    tab: Arc<Tab>,
    network: Arc<Mutex<NetworkTracker>>,
    idle_timeout: Duration,
    idle_window: Duration,
}

impl ChromeSession {
    fn network_state(&self) -> Result<(bool, usize)> {
        let tracker = self
            .network
            .lock()
            .map_err(|e| AppError::Browser(format!("Network tracker unavailable: {}", e)))?;
        Ok((tracker.is_idle(Instant::now(), self.idle_window), tracker.pending()))
    }
}

impl BrowserSession for ChromeSession {
    fn navigate(&mut self, url: &str) -> Result<()> {
        tracing::debug!(target: "scrape_task", "Navigating to {}", url);
        self.tab
            .navigate_to(url)
            .and_then(|tab| tab.wait_until_navigated())
            .map_err(|e| AppError::Navigation {
                url: url.to_string(),
                reason: e.to_string(),
            })?;
        Ok(())
    }

    fn click(&mut self, selector: &str) -> Result<()> {
        let element = self
            .tab
            .wait_for_element(selector)
            .map_err(|_| AppError::SelectorNotFound(selector.to_string()))?;
        // A script click works even when the control is off-screen.
        element
            .call_js_fn("function() { this.click(); }", vec![], false)
            .map_err(|e| AppError::Browser(format!("Failed to click '{}': {}", selector, e)))?;
        tracing::debug!(target: "scrape_task", "Clicked {}", selector);
        Ok(())
    }

    fn wait_idle(&mut self) -> Result<()> {
        let started = Instant::now();
        loop {
            let (idle, pending) = self.network_state()?;
            if idle {
                tracing::debug!(target: "scrape_task", "Network idle after {:.2?}", started.elapsed());
                return Ok(());
            }
            if started.elapsed() >= self.idle_timeout {
                return Err(AppError::Navigation {
                    url: self.tab.get_url(),
                    reason: format!(
                        "{} requests still pending after {:?}",
                        pending, self.idle_timeout
                    ),
                });
            }
            std::thread::sleep(IDLE_POLL_INTERVAL);
        }
    }

    fn extract_table(&mut self, selector: &str) -> Result<Vec<TableRow>> {
        self.tab
            .wait_for_element(selector)
            .map_err(|_| AppError::SelectorNotFound(selector.to_string()))?;

        let result = self
            .tab
            .evaluate(&table_rows_script(selector)?, false)
            .map_err(|e| AppError::Browser(format!("Failed to read table '{}': {}", selector, e)))?;
        rows_from_script_result(result.value, selector)
    }

    fn close(self: Box<Self>) -> Result<()> {
        let ChromeSession { browser, tab, .. } = *self;
        if let Err(e) = tab.close(false) {
            tracing::debug!(target: "scrape_task", "Tab close reported: {}", e);
        }
        // Dropping the browser kills the Chrome process.
        drop(browser);
        Ok(())
    }
}
