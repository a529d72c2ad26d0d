//! Password reset email.

use async_trait::async_trait;
use serde::Serialize;
use tracing::info;

use crate::config::PasswordResetSettings;
use crate::error::Result;

/// A rendered email ready for a transport.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutgoingMail {
    pub to: String,
    pub source: String,
    pub subject: String,
    pub text: String,
    pub html: String,
}

/// Email transport.
#[async_trait]
pub trait MailSender: Send + Sync {
    /// Deliver a mail. Transport failures are [`crate::IdentityError::Upstream`].
    async fn send(&self, mail: &OutgoingMail) -> Result<()>;
}

/// Transport that only logs the envelope. The body carries a reset token and
/// is never written out.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogMailSender;

#[async_trait]
impl MailSender for LogMailSender {
    async fn send(&self, mail: &OutgoingMail) -> Result<()> {
        info!(to = %mail.to, subject = %mail.subject, "mail not sent (log transport)");
        Ok(())
    }
}

/// Render the reset email for `email` carrying the plaintext `reset` token.
pub fn render_reset_mail(settings: &PasswordResetSettings, email: &str, reset: &str) -> OutgoingMail {
    let url = settings.url.replace("{email}", email).replace("{reset}", reset);
    let body = settings.body.replace("{name}", email);

    OutgoingMail {
        to: email.to_string(),
        source: settings.source.clone(),
        subject: settings.subject.clone(),
        text: format!("{body}\n\n{url}"),
        html: format!("{body}<br/><br/><a href=\"{url}\">{url}</a>"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reset_link_carries_email_and_token() {
        let settings = PasswordResetSettings {
            url: "https://app.test/#/reset/{email}/{reset}".into(),
            body: "Hi {name},".into(),
            subject: "Reset".into(),
            source: "noreply@app.test".into(),
        };
        let mail = render_reset_mail(&settings, "ann@test.com", "abc123");

        assert_eq!(mail.to, "ann@test.com");
        assert_eq!(mail.subject, "Reset");
        assert_eq!(
            mail.text,
            "Hi ann@test.com,\n\nhttps://app.test/#/reset/ann@test.com/abc123"
        );
        assert!(mail.html.contains("<a href=\"https://app.test/#/reset/ann@test.com/abc123\">"));
    }

    #[tokio::test]
    async fn log_sender_accepts_everything() {
        let mail = render_reset_mail(&PasswordResetSettings::default(), "a@b.c", "t");
        assert!(LogMailSender.send(&mail).await.is_ok());
    }
}
