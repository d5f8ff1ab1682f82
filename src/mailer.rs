use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::message::{Attachment, Mailbox, MultiPart, SinglePart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};

use crate::config::SmtpConfig;
use crate::error::{AppError, AppResult};
use crate::receipt::ORGANIZATION_NAME;

pub const RECEIPT_SUBJECT: &str = "Thank you for your donation to My Sister's Closet";
pub const RECEIPT_ATTACHMENT_NAME: &str = "MSC-Donation-Receipt.pdf";

/// A rendered receipt on its way to a donor.
#[derive(Debug, Clone)]
pub struct ReceiptEmail {
    pub to: String,
    pub subject: String,
    pub html: String,
    pub pdf: Vec<u8>,
}

#[async_trait]
pub trait ReceiptMailer: Send + Sync {
    /// Deliver the email; any failure means the receipt was not sent.
    async fn send_receipt(&self, email: ReceiptEmail) -> AppResult<()>;
}

pub struct SmtpMailer {
    transport: Option<(AsyncSmtpTransport<Tokio1Executor>, Mailbox)>,
}

impl SmtpMailer {
    /// Without SMTP settings every send fails with a delivery error.
    pub fn from_config(smtp: Option<&SmtpConfig>) -> anyhow::Result<Self> {
        let Some(smtp) = smtp else {
            tracing::warn!("SMTP_HOST not set; receipt emails are disabled");
            return Ok(Self { transport: None });
        };

        let mut builder = if smtp.port == 465 {
            AsyncSmtpTransport::<Tokio1Executor>::relay(&smtp.host)?
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&smtp.host)?
        }
        .port(smtp.port);
        if let (Some(user), Some(pass)) = (&smtp.username, &smtp.password) {
            builder = builder.credentials(Credentials::new(user.clone(), pass.clone()));
        }

        let from = sender(smtp)?;

        tracing::info!(host = %smtp.host, port = smtp.port, "SMTP mailer configured");
        Ok(Self {
            transport: Some((builder.build(), from)),
        })
    }
}

fn sender(smtp: &SmtpConfig) -> anyhow::Result<Mailbox> {
    let address = smtp
        .from
        .as_ref()
        .or(smtp.username.as_ref())
        .ok_or_else(|| anyhow::anyhow!("SMTP_FROM or SMTP_USER must be set to send email"))?;
    Ok(Mailbox::new(Some(ORGANIZATION_NAME.to_string()), address.parse()?))
}

#[async_trait]
impl ReceiptMailer for SmtpMailer {
    async fn send_receipt(&self, email: ReceiptEmail) -> AppResult<()> {
        let (transport, from) = self
            .transport
            .as_ref()
            .ok_or_else(|| AppError::Delivery("email is not configured".into()))?;

        let to: Mailbox = email
            .to
            .parse()
            .map_err(|e| AppError::Delivery(format!("invalid recipient: {}", e)))?;
        let pdf_type = ContentType::parse("application/pdf")
            .map_err(|e| AppError::Delivery(e.to_string()))?;

        let message = Message::builder()
            .from(from.clone())
            .to(to)
            .subject(email.subject)
            .multipart(
                MultiPart::mixed()
                    .singlepart(SinglePart::html(email.html))
                    .singlepart(
                        Attachment::new(RECEIPT_ATTACHMENT_NAME.to_string()).body(email.pdf, pdf_type),
                    ),
            )
            .map_err(|e| AppError::Delivery(e.to_string()))?;

        transport
            .send(message)
            .await
            .map_err(|e| AppError::Delivery(e.to_string()))?;
        tracing::info!(to = %email.to, "Receipt email sent");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn unconfigured_mailer_refuses_to_send() {
        let mailer = SmtpMailer::from_config(None).unwrap();
        let err = mailer
            .send_receipt(ReceiptEmail {
                to: "jane@example.org".into(),
                subject: RECEIPT_SUBJECT.into(),
                html: "<p>hi</p>".into(),
                pdf: b"%PDF".to_vec(),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Delivery(_)));
    }

    #[test]
    fn sender_falls_back_to_smtp_user() {
        let config = SmtpConfig {
            host: "smtp.example.org".into(),
            port: 587,
            username: Some("office@example.org".into()),
            password: Some("secret".into()),
            from: None,
        };
        let from = sender(&config).unwrap();
        assert_eq!(from.email.to_string(), "office@example.org");
        assert_eq!(from.name.as_deref(), Some(ORGANIZATION_NAME));

        let explicit = SmtpConfig { from: Some("receipts@example.org".into()), ..config };
        assert_eq!(sender(&explicit).unwrap().email.to_string(), "receipts@example.org");
    }
}
