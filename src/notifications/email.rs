//! Transactional email: password resets, team invitations and estimates.
//!
//! Uses the `[email]` section of the config file. When SMTP is not configured
//! every send is a logged no-op, so callers never have to branch on it.

use anyhow::Result;
use lettre::{
    message::{header::ContentType, Mailbox, MultiPart, SinglePart},
    transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};

use crate::config::EmailConfig;
use crate::engine::pricing::QuoteTotals;

/// Service for sending system emails
pub struct SystemEmailService {
    config: EmailConfig,
}

impl SystemEmailService {
    pub fn new(config: EmailConfig) -> Self {
        Self { config }
    }

    /// Check if email sending is configured and enabled
    pub fn is_enabled(&self) -> bool {
        self.config.is_configured()
    }

    pub async fn send_password_reset_email(
        &self,
        to_email: &str,
        reset_url: &str,
        expires_in_minutes: i64,
    ) -> Result<()> {
        if !self.is_enabled() {
            tracing::warn!("Email not configured, skipping password reset email");
            return Ok(());
        }

        let text_body = render_reset_text(reset_url, expires_in_minutes);
        let html_body = render_layout(
            "Reset your password",
            &format!(
                "<p>We received a request to reset your Brushwork password.</p>\
                 <p><a class=\"button\" href=\"{url}\">Choose a new password</a></p>\
                 <p>This link expires in {minutes} minutes and can be used once. \
                 If you didn't ask for it, ignore this email.</p>",
                url = html_escape(reset_url),
                minutes = expires_in_minutes,
            ),
        );

        self.send_email(to_email, "Reset your Brushwork password", &html_body, &text_body)
            .await
    }

    /// Send a team invitation email
    pub async fn send_invitation_email(
        &self,
        to_email: &str,
        role: &str,
        inviter_name: &str,
        accept_url: &str,
        expires_in_days: i64,
    ) -> Result<()> {
        if !self.is_enabled() {
            tracing::warn!(
                "Email not configured, skipping invitation email to {}",
                to_email
            );
            return Ok(());
        }

        let subject = format!("{} invited you to join the crew on Brushwork", inviter_name);
        let text_body = render_invitation_text(role, inviter_name, accept_url, expires_in_days);
        let html_body = render_layout(
            "You're invited",
            &format!(
                "<p>{inviter} has invited you to join the team as <strong>{role}</strong>.</p>\
                 <p><a class=\"button\" href=\"{url}\">Accept invitation</a></p>\
                 <p>This invitation will expire in {days} days.</p>",
                inviter = html_escape(inviter_name),
                role = html_escape(&capitalize_role(role)),
                url = html_escape(accept_url),
                days = expires_in_days,
            ),
        );

        self.send_email(to_email, &subject, &html_body, &text_body)
            .await
    }

    /// Send the client a summary of an estimate that moved to `sent`
    pub async fn send_estimate_email(
        &self,
        to_email: &str,
        client_name: &str,
        project_title: &str,
        totals: &QuoteTotals,
    ) -> Result<()> {
        if !self.is_enabled() {
            tracing::warn!("Email not configured, skipping estimate email");
            return Ok(());
        }

        let subject = format!("Your painting estimate: {}", project_title);
        let text_body = render_estimate_text(client_name, project_title, totals);
        let html_body = render_layout(
            project_title,
            &format!(
                "<p>Hi {client},</p>\
                 <p>Here is your estimate.</p>\
                 <table>\
                 <tr><td>Labor</td><td>${labor}</td></tr>\
                 <tr><td>Materials</td><td>${materials}</td></tr>\
                 <tr><td>Markup</td><td>${markup}</td></tr>\
                 <tr><td>Tax</td><td>${tax}</td></tr>\
                 <tr><td><strong>Total</strong></td><td><strong>${total}</strong></td></tr>\
                 </table>",
                client = html_escape(client_name),
                labor = totals.labor,
                materials = totals.materials,
                markup = totals.markup,
                tax = totals.tax,
                total = totals.total,
            ),
        );

        self.send_email(to_email, &subject, &html_body, &text_body)
            .await
    }

    /// Send an email with HTML and plain text versions
    async fn send_email(
        &self,
        to_email: &str,
        subject: &str,
        html_body: &str,
        text_body: &str,
    ) -> Result<()> {
        let smtp_host = self
            .config
            .smtp_host
            .as_ref()
            .ok_or_else(|| anyhow::anyhow!("SMTP host not configured"))?;
        let from_address = self
            .config
            .from_address
            .as_ref()
            .ok_or_else(|| anyhow::anyhow!("From address not configured"))?;

        let from_mailbox = format!("{} <{}>", self.config.from_name, from_address);
        let from: Mailbox = from_mailbox.parse()?;
        let to: Mailbox = to_email.parse()?;

        let email = Message::builder()
            .from(from)
            .to(to)
            .subject(subject)
            .multipart(
                MultiPart::alternative()
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_PLAIN)
                            .body(text_body.to_string()),
                    )
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_HTML)
                            .body(html_body.to_string()),
                    ),
            )?;

        let mailer = if self.config.smtp_tls {
            AsyncSmtpTransport::<Tokio1Executor>::relay(smtp_host)?
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(smtp_host)
        }
        .port(self.config.smtp_port);

        let mailer = if let (Some(username), Some(password)) =
            (&self.config.smtp_username, &self.config.smtp_password)
        {
            mailer.credentials(Credentials::new(username.clone(), password.clone()))
        } else {
            mailer
        };

        mailer.build().send(email).await?;

        tracing::info!(
            to = %to_email,
            subject = %subject,
            "Email sent successfully"
        );

        Ok(())
    }
}

fn render_layout(heading: &str, body: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html>
<head>
    <meta charset="utf-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>{heading}</title>
    <style>
        body {{ font-family: -apple-system, 'Segoe UI', Roboto, Arial, sans-serif; background-color: #f5f5f5; margin: 0; }}
        .container {{ max-width: 560px; margin: 0 auto; padding: 40px 20px; }}
        .card {{ background-color: #ffffff; border-radius: 8px; padding: 32px 24px; color: #374151; line-height: 1.6; }}
        h1 {{ margin: 0 0 16px; font-size: 22px; color: #111827; }}
        .button {{ display: inline-block; background-color: #b45309; color: #ffffff; padding: 10px 20px; border-radius: 6px; text-decoration: none; }}
        td {{ padding: 4px 12px 4px 0; }}
    </style>
</head>
<body>
    <div class="container">
        <div class="card">
            <h1>{heading}</h1>
            {body}
        </div>
    </div>
</body>
</html>"#,
        heading = html_escape(heading),
        body = body,
    )
}

fn render_reset_text(reset_url: &str, expires_in_minutes: i64) -> String {
    format!(
        r#"Reset your password

We received a request to reset your Brushwork password. To choose a new one, visit:
{reset_url}

This link expires in {expires_in_minutes} minutes and can be used once.

If you didn't ask for a password reset, you can safely ignore this email."#
    )
}

fn render_invitation_text(
    role: &str,
    inviter_name: &str,
    accept_url: &str,
    expires_in_days: i64,
) -> String {
    format!(
        r#"Team Invitation

Hi there,

{inviter_name} has invited you to join the team on Brushwork.

Role: {role}
Invited by: {inviter_name}

To accept this invitation, visit:
{accept_url}

This invitation will expire in {expires_in_days} days.

If you didn't expect this invitation, you can safely ignore this email."#,
        inviter_name = inviter_name,
        role = capitalize_role(role),
        accept_url = accept_url,
        expires_in_days = expires_in_days,
    )
}

fn render_estimate_text(client_name: &str, project_title: &str, totals: &QuoteTotals) -> String {
    format!(
        r#"Hi {client_name},

Here is your estimate for "{project_title}".

Labor:     ${labor}
Materials: ${materials}
Markup:    ${markup}
Tax:       ${tax}
Total:     ${total}

Reply to this email with any questions."#,
        labor = totals.labor,
        materials = totals.materials,
        markup = totals.markup,
        tax = totals.tax,
        total = totals.total,
    )
}

/// Escape HTML special characters
fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}

/// Capitalize role for display
fn capitalize_role(role: &str) -> String {
    let mut chars = role.chars();
    match chars.next() {
        None => String::new(),
        Some(first) => first.to_uppercase().chain(chars).collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_html_escape() {
        assert_eq!(html_escape("<script>"), "&lt;script&gt;");
        assert_eq!(html_escape("Tom & Jerry"), "Tom &amp; Jerry");
    }

    #[test]
    fn test_capitalize_role() {
        assert_eq!(capitalize_role("estimator"), "Estimator");
        assert_eq!(capitalize_role(""), "");
    }

    #[test]
    fn test_render_invitation_text() {
        let text = render_invitation_text("painter", "Dana", "https://brush.work/accept", 7);
        assert!(text.contains("Dana"));
        assert!(text.contains("Painter"));
        assert!(text.contains("https://brush.work/accept"));
        assert!(text.contains("7 days"));
    }

    #[test]
    fn test_render_estimate_text_uses_whole_units() {
        let totals = QuoteTotals {
            labor: 432,
            materials: 195,
            subtotal: 627,
            markup: 125,
            subtotal_with_markup: 752,
            tax: 98,
            total: 850,
        };
        let text = render_estimate_text("Dana", "Living room", &totals);
        assert!(text.contains("Total:     $850"));
        assert!(text.contains("\"Living room\""));
    }

    #[test]
    fn test_layout_escapes_heading() {
        let html = render_layout("<b>", "<p>ok</p>");
        assert!(html.contains("<h1>&lt;b&gt;</h1>"));
        assert!(html.contains("<p>ok</p>"));
    }

    #[tokio::test]
    async fn test_unconfigured_service_is_noop() {
        let service = SystemEmailService::new(EmailConfig::default());
        assert!(!service.is_enabled());
        service
            .send_password_reset_email("dana@example.com", "http://x/reset", 60)
            .await
            .unwrap();
    }
}
