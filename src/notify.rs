//! Renders and delivers the availability e-mail.

use crate::config::{NotificationSettings, SmtpSettings};
use crate::error::Result;
use crate::models::{AvailableSiteGroup, DateRange};
use chrono::NaiveDate;
use lettre::message::header::ContentType;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};

/// Body sent instead of real content when testing the transport.
pub(crate) const PLACEHOLDER_BODY: &str =
    "This is a test message from campsite-sentry. No availability data is included.";

/// A fully rendered e-mail, independent of the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct OutgoingEmail {
    pub from: String,
    pub to: Vec<String>,
    pub subject: String,
    pub html: String,
}

/// Something that can deliver an [`OutgoingEmail`].
pub(crate) trait Mailer {
    async fn deliver(&self, email: &OutgoingEmail) -> Result<()>;
}

/// Delivers mail through an authenticated, encrypted SMTP relay.
pub(crate) struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
}

impl SmtpMailer {
    /// Port 465 uses implicit TLS; any other port upgrades with STARTTLS.
    pub(crate) fn new(settings: &SmtpSettings) -> Result<Self> {
        let builder = if settings.port == 465 {
            AsyncSmtpTransport::<Tokio1Executor>::relay(&settings.host)?
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&settings.host)?
        };

        let transport = builder
            .port(settings.port)
            .credentials(Credentials::new(
                settings.user.clone(),
                settings.pass.clone(),
            ))
            .timeout(Some(settings.timeout))
            .build();

        Ok(Self { transport })
    }
}

impl Mailer for SmtpMailer {
    async fn deliver(&self, email: &OutgoingEmail) -> Result<()> {
        let mut builder = Message::builder()
            .from(email.from.parse::<Mailbox>()?)
            .subject(email.subject.clone())
            .header(ContentType::TEXT_HTML);
        for recipient in &email.to {
            builder = builder.to(recipient.parse::<Mailbox>()?);
        }
        let message = builder.body(email.html.clone())?;

        self.transport.send(message).await?;
        Ok(())
    }
}

/// Formats a date like `Sep 01, 2023`.
pub(crate) fn format_date(date: NaiveDate) -> String {
    date.format("%b %d, %Y").to_string()
}

fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// Renders the HTML summary: the date range, then one block per map area
/// with its open sites and a link back to the search page.
pub(crate) fn render_body(groups: &[AvailableSiteGroup], dates: &DateRange) -> String {
    let mut body = format!(
        "<b>Date Range: {} to {}</b><br/><b>Newly Available GRCA Sites:</b><br/><br/>",
        format_date(dates.start_date),
        format_date(dates.end_date)
    );

    for group in groups {
        let sites = group
            .sites_available
            .iter()
            .map(|s| escape_html(s))
            .collect::<Vec<_>>()
            .join(", ");
        let url = escape_html(&group.url);
        body.push_str(&format!(
            "✓ {} -- {}<br/><a href=\"{}\" target=\"_blank\" rel=\"noopener noreferrer\">{}</a><br/><br/>",
            escape_html(&group.map_area),
            sites,
            url,
            url
        ));
    }

    body
}

/// Sends availability summaries to the configured recipients.
pub(crate) struct Notifier<M> {
    mailer: M,
    from: String,
    settings: NotificationSettings,
}

impl<M: Mailer> Notifier<M> {
    pub(crate) fn new(mailer: M, from: String, settings: NotificationSettings) -> Self {
        Self {
            mailer,
            from,
            settings,
        }
    }

    fn compose(&self, html: String) -> OutgoingEmail {
        OutgoingEmail {
            from: self.from.clone(),
            to: self.settings.recipients.clone(),
            subject: self.settings.subject.clone(),
            html: if self.settings.debug_email {
                PLACEHOLDER_BODY.to_string()
            } else {
                html
            },
        }
    }

    /// Sends one summary e-mail. Delivery failures are logged, never returned.
    ///
    /// # Returns
    /// * `true` if the transport accepted the message.
    pub(crate) async fn notify(&self, groups: &[AvailableSiteGroup], dates: &DateRange) -> bool {
        let email = self.compose(render_body(groups, dates));
        self.send(&email).await
    }

    /// Sends the placeholder message to check that the transport works.
    pub(crate) async fn send_test_email(&self) -> bool {
        let email = self.compose(PLACEHOLDER_BODY.to_string());
        self.send(&email).await
    }

    async fn send(&self, email: &OutgoingEmail) -> bool {
        let to = email.to.join(",");
        match self.mailer.deliver(email).await {
            Ok(()) => {
                tracing::info!(target: "notify_task", "Mail sent to {}", to);
                true
            }
            Err(e) => {
                tracing::error!(target: "notify_task", "Failed to send mail to {}: {}", to, e);
                false
            }
        }
    }
}


#[cfg(test)]
mod tests {
    use super::testing::RecordingMailer;
    use super::*;

    fn dates() -> DateRange {
        DateRange::parse("2023-09-01", "2023-09-04").unwrap()
    }

    fn lakeview() -> Vec<AvailableSiteGroup> {
        vec![AvailableSiteGroup {
            map_area: "Lakeview".to_string(),
            url: "https://x".to_string(),
            sites_available: vec!["A12".to_string(), "B7".to_string()],
        }]
    }

    fn settings(recipients: &[&str], debug_email: bool) -> NotificationSettings {
        NotificationSettings {
            recipients: recipients.iter().map(|r| r.to_string()).collect(),
            subject: "GRCA Site Availability Update (!)".to_string(),
            debug_email,
        }
    }

    #[test]
    fn body_lists_dates_sites_and_link() {
        let body = render_body(&lakeview(), &dates());
        assert!(body.contains("Sep 01, 2023 to Sep 04, 2023"));
        assert!(body.contains("✓ Lakeview -- A12, B7"));
        assert!(body.contains("<a href=\"https://x\""));
        assert!(body.contains(">https://x</a>"));
    }

    #[test]
    fn body_escapes_scraped_text() {
        let groups = vec![AvailableSiteGroup {
            map_area: "Sandy Bay".to_string(),
            url: "https://x.example.com/?a=1&mapId=2".to_string(),
            sites_available: vec!["<b>C1</b>".to_string()],
        }];
        let body = render_body(&groups, &dates());
        assert!(body.contains("&lt;b&gt;C1&lt;/b&gt;"));
        assert!(body.contains("a=1&amp;mapId=2"));
    }

    #[test]
    fn formats_dates_with_short_month() {
        let date = NaiveDate::from_ymd_opt(2023, 9, 1).unwrap();
        assert_eq!(format_date(date), "Sep 01, 2023");
    }

    #[tokio::test]
    async fn sends_to_configured_recipients() {
        let mailer = RecordingMailer::default();
        let notifier = Notifier::new(
            mailer.clone(),
            "bot@x.com".to_string(),
            settings(&["a@x.com", "b@x.com"], false),
        );

        assert!(notifier.notify(&lakeview(), &dates()).await);

        let sent = mailer.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].from, "bot@x.com");
        assert_eq!(sent[0].to, ["a@x.com", "b@x.com"]);
        assert!(sent[0].html.contains("A12, B7"));
    }

    #[tokio::test]
    async fn debug_email_replaces_body() {
        let mailer = RecordingMailer::default();
        let notifier = Notifier::new(
            mailer.clone(),
            "bot@x.com".to_string(),
            settings(&["dbg@x.com"], true),
        );

        notifier.notify(&lakeview(), &dates()).await;
        assert!(notifier.send_test_email().await);

        let sent = mailer.sent();
        assert_eq!(sent.len(), 2);
        assert!(sent.iter().all(|m| m.html == PLACEHOLDER_BODY));
    }

    #[tokio::test]
    async fn delivery_failure_is_swallowed() {
        let mailer = RecordingMailer::failing();
        let notifier = Notifier::new(
            mailer.clone(),
            "bot@x.com".to_string(),
            settings(&["a@x.com"], false),
        );

        assert!(!notifier.notify(&lakeview(), &dates()).await);
        assert_eq!(mailer.sent().len(), 1);
    }
}
