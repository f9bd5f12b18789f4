//! Email notifications
//!
//! Mail goes out on a spawned task so a slow or failing SMTP server never
//! holds up or fails the request that triggered it. Without a `mail`
//! section in the config every notification is only logged.

use crate::config::MailConfig;
use crate::models::ApplicationStatus;
use anyhow::{anyhow, Result};
use lettre::{
    message::{header::ContentType, Mailbox},
    transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};

#[derive(Clone)]
struct Mailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

#[derive(Clone)]
pub struct Notifier {
    mailer: Option<Mailer>,
}

impl Notifier {
    /// Notifier that only logs
    pub fn disabled() -> Self {
        Self { mailer: None }
    }

    pub fn from_config(config: Option<&MailConfig>) -> Result<Self> {
        let Some(config) = config else {
            return Ok(Self::disabled());
        };

        let from: Mailbox = config
            .from
            .parse()
            .map_err(|e| anyhow!("Invalid mail.from address: {}", e))?;

        let mut builder = AsyncSmtpTransport::<Tokio1Executor>::relay(&config.smtp_host)
            .map_err(|e| anyhow!("Failed to create SMTP transport: {}", e))?
            .port(config.smtp_port);
        if let (Some(user), Some(pass)) = (&config.username, &config.password) {
            builder = builder.credentials(Credentials::new(user.clone(), pass.clone()));
        }

        tracing::info!(host = %config.smtp_host, port = config.smtp_port, "Email notifications enabled");
        Ok(Self {
            mailer: Some(Mailer {
                transport: builder.build(),
                from,
            }),
        })
    }

    pub fn is_enabled(&self) -> bool {
        self.mailer.is_some()
    }

    /// Queue a plain-text email. Never fails; problems are logged.
    pub fn notify(&self, to: &str, subject: String, body: String) {
        let Some(mailer) = self.mailer.clone() else {
            tracing::debug!(%to, %subject, "Mail disabled, notification skipped");
            return;
        };
        let to = to.to_string();
        tokio::spawn(async move {
            if let Err(e) = send(&mailer, &to, &subject, body).await {
                tracing::warn!(%to, %subject, "Failed to send notification: {:#}", e);
            }
        });
    }

    pub fn application_status_changed(
        &self,
        to: &str,
        applicant_name: &str,
        job_title: &str,
        status: ApplicationStatus,
        note: Option<&str>,
    ) {
        let (subject, body) = application_status_email(applicant_name, job_title, status, note);
        self.notify(to, subject, body);
    }

    pub fn new_message(&self, to: &str, recipient_name: &str, sender_name: &str) {
        let subject = format!("New message from {}", sender_name);
        let body = format!(
            "Hi {},\n\n{} sent you a message on YouthBridge. Sign in to read and reply.\n",
            recipient_name, sender_name
        );
        self.notify(to, subject, body);
    }
}

async fn send(mailer: &Mailer, to: &str, subject: &str, body: String) -> Result<()> {
    let email = Message::builder()
        .from(mailer.from.clone())
        .to(to.parse().map_err(|e| anyhow!("Invalid recipient address: {}", e))?)
        .subject(subject)
        .header(ContentType::TEXT_PLAIN)
        .body(body)
        .map_err(|e| anyhow!("Failed to build email: {}", e))?;

    mailer
        .transport
        .send(email)
        .await
        .map_err(|e| anyhow!("Failed to send email: {}", e))?;
    Ok(())
}

fn application_status_email(
    applicant_name: &str,
    job_title: &str,
    status: ApplicationStatus,
    note: Option<&str>,
) -> (String, String) {
    let subject = format!("Your application for {} is now {}", job_title, status);
    let mut body = format!(
        "Hi {},\n\nThe status of your application for \"{}\" changed to {}.\n",
        applicant_name, job_title, status
    );
    if let Some(note) = note.filter(|n| !n.trim().is_empty()) {
        body.push_str(&format!("\nNote from the employer:\n{}\n", note.trim()));
    }
    (subject, body)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disabled_without_config() {
        let notifier = Notifier::from_config(None).unwrap();
        assert!(!notifier.is_enabled());
        // logging no-op, must not panic outside a runtime
        notifier.new_message("a@example.com", "A", "B");
    }

    #[test]
    fn test_invalid_from_is_rejected() {
        let config = MailConfig {
            smtp_host: "smtp.example.com".into(),
            smtp_port: 587,
            username: None,
            password: None,
            from: "not an address".into(),
        };
        assert!(Notifier::from_config(Some(&config)).is_err());
    }

    #[tokio::test]
    async fn test_enabled_with_config() {
        let config = MailConfig {
            smtp_host: "smtp.example.com".into(),
            smtp_port: 2525,
            username: Some("user".into()),
            password: Some("pass".into()),
            from: "YouthBridge <noreply@example.com>".into(),
        };
        assert!(Notifier::from_config(Some(&config)).unwrap().is_enabled());
    }

    #[test]
    fn test_status_email_text() {
        let (subject, body) = application_status_email(
            "Amina",
            "Junior Dev",
            ApplicationStatus::Interview,
            Some("  Bring your portfolio "),
        );
        assert_eq!(subject, "Your application for Junior Dev is now interview");
        assert!(body.contains("Hi Amina"));
        assert!(body.contains("Bring your portfolio\n"));

        let (_, body) = application_status_email("A", "Job", ApplicationStatus::Rejected, Some(" "));
        assert!(!body.contains("Note from"));
    }
}
