//! Markup for the receipt. Every layout wraps the same `#receipt-preview` region.

use std::fmt::Write as _;

use super::{ReceiptContent, ReceiptGift, ReceiptLogo, ORGANIZATION_NAME};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Layout {
    /// Interactive preview in a browser tab.
    Preview,
    /// Browser printing: everything but the receipt is hidden.
    Print,
    /// Source for the PDF; page size and margins come from the PDF engine.
    Document,
}

const BASE_CSS: &str = r#"
body { font-family: Georgia, 'Times New Roman', serif; color: #222; margin: 0; background: #fff; }
.receipt { max-width: 7.5in; margin: 0 auto; padding: 0.25in; font-size: 11pt; line-height: 1.45; }
.receipt header { display: flex; align-items: center; gap: 16px; border-bottom: 3px solid #F052A1; padding-bottom: 8px; }
.receipt header img { max-height: 72px; }
.receipt header h1 { font-size: 20pt; margin: 0; color: #F052A1; }
.receipt .meta { display: flex; justify-content: space-between; margin: 12px 0; font-weight: bold; }
.receipt .donor p { margin: 0; }
.receipt table.items { width: 100%; border-collapse: collapse; margin: 12px 0; }
.receipt table.items th, .receipt table.items td { border: 1px solid #ccc; padding: 4px 8px; text-align: left; }
.receipt table.items td.value, .receipt table.items th.value { text-align: right; }
.receipt table.items tr.total td { font-weight: bold; background: #fbe3ef; }
.receipt .amount { font-size: 13pt; font-weight: bold; margin: 12px 0; }
.receipt .signature { margin-top: 24px; }
.receipt .signature .name { margin-top: 28px; font-weight: bold; }
.receipt .tax-notice { margin-top: 20px; font-size: 9pt; color: #555; border-top: 1px solid #ddd; padding-top: 8px; }
"#;

const PRINT_CSS: &str = r#"
@media print {
  body * { visibility: hidden; }
  #receipt-preview, #receipt-preview * { visibility: visible; }
  #receipt-preview { position: absolute; left: 0; top: 0; width: 100%; }
}
@page { size: letter; margin: 0.4in; }
"#;

const DOCUMENT_CSS: &str = r#"
* { -webkit-print-color-adjust: exact; print-color-adjust: exact; }
.receipt { padding: 0; }
"#;

pub fn escape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
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

/// Full HTML page for the given layout.
pub fn render(content: &ReceiptContent, layout: Layout, logo: Option<&ReceiptLogo>) -> String {
    let extra_css = match layout {
        Layout::Preview => "",
        Layout::Print => PRINT_CSS,
        Layout::Document => DOCUMENT_CSS,
    };
    format!(
        "<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n<meta charset=\"utf-8\">\n\
         <title>Donation Receipt {id}</title>\n<style>{base}{extra}</style>\n</head>\n\
         <body>\n{body}</body>\n</html>\n",
        id = escape(&content.receipt_id),
        base = BASE_CSS,
        extra = extra_css,
        body = receipt_region(content, logo),
    )
}

fn receipt_region(content: &ReceiptContent, logo: Option<&ReceiptLogo>) -> String {
    let mut html = String::new();
    html.push_str("<div id=\"receipt-preview\" class=\"receipt\">\n<header>");
    if let Some(logo) = logo {
        let _ = write!(
            html,
            "<img src=\"{}\" alt=\"{}\">",
            logo.data_uri(),
            escape(ORGANIZATION_NAME)
        );
    }
    let _ = writeln!(html, "<h1>{}</h1></header>", escape(ORGANIZATION_NAME));

    let _ = writeln!(
        html,
        "<div class=\"meta\"><span>Receipt #{}</span><span>Date: {}</span></div>",
        escape(&content.receipt_id),
        escape(&content.date)
    );

    html.push_str("<section class=\"donor\">\n");
    let _ = writeln!(html, "<p class=\"donor-name\">{}</p>", escape(&content.donor.name));
    for (class, value) in [
        ("donor-address", &content.donor.address),
        ("donor-phone", &content.donor.phone),
        ("donor-email", &content.donor.email),
    ] {
        if let Some(value) = value {
            let _ = writeln!(html, "<p class=\"{}\">{}</p>", class, escape(value));
        }
    }
    html.push_str("</section>\n");

    html.push_str("<section class=\"letter\">\n");
    let _ = writeln!(html, "<p>Dear {},</p>", escape(&content.donor.name));
    for paragraph in &content.letter {
        let _ = writeln!(html, "<p>{}</p>", escape(paragraph));
    }
    html.push_str("</section>\n");

    match &content.gift {
        ReceiptGift::Cash { amount } => {
            let _ = writeln!(
                html,
                "<p class=\"amount\">Donation Amount: {}</p>",
                escape(amount)
            );
        }
        ReceiptGift::InKind { items, total } => {
            html.push_str(
                "<table class=\"items\">\n<thead><tr><th>Item Description</th>\
                 <th class=\"value\">Estimated Value</th></tr></thead>\n<tbody>\n",
            );
            for item in items {
                let _ = writeln!(
                    html,
                    "<tr><td>{}</td><td class=\"value\">{}</td></tr>",
                    escape(&item.description),
                    escape(&item.value)
                );
            }
            let _ = writeln!(
                html,
                "<tr class=\"total\"><td>Total Value</td><td class=\"value\">{}</td></tr>",
                escape(total)
            );
            html.push_str("</tbody>\n</table>\n");
        }
    }

    let _ = writeln!(
        html,
        "<section class=\"signature\"><p>{}</p><p class=\"name\">{}</p><p>{}</p></section>",
        escape(content.signature.closing),
        escape(content.signature.name),
        escape(content.signature.title)
    );
    let _ = writeln!(html, "<p class=\"tax-notice\">{}</p>", escape(content.tax_notice));
    html.push_str("</div>\n");
    html
}

/// Short HTML body for the receipt email; the PDF rides along as an attachment.
pub fn render_email(content: &ReceiptContent) -> String {
    let mut html = String::new();
    let _ = writeln!(
        html,
        "<div style=\"font-family: Arial, sans-serif; color: #222;\">\n\
         <h2 style=\"color: #F052A1;\">Thank you for your donation!</h2>\n\
         <p>Dear {},</p>\n\
         <p>Thank you for your generous {} donation to {}. Your donation receipt is attached \
         to this email.</p>",
        escape(&content.donor.name),
        escape(&content.type_label.to_lowercase()),
        escape(ORGANIZATION_NAME)
    );
    let _ = writeln!(
        html,
        "<ul>\n<li><strong>Receipt ID:</strong> {}</li>\n<li><strong>Date:</strong> {}</li>\n\
         <li><strong>Total:</strong> {}</li>\n</ul>",
        escape(&content.receipt_id),
        escape(&content.date),
        escape(content.total())
    );
    let _ = writeln!(
        html,
        "<p>{}</p>\n<p>{}<br>{}</p>\n<p style=\"font-size: 12px; color: #666;\">{}</p>\n</div>",
        escape(content.signature.closing),
        escape(content.signature.name),
        escape(content.signature.title),
        escape(content.tax_notice)
    );
    html
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::{DonationItem, DonationRecord, Donor, Gift};
    use chrono::{NaiveDate, Utc};
    use rust_decimal::Decimal;

    fn content(gift: Gift, donor: Donor) -> ReceiptContent {
        ReceiptContent::from_record(&DonationRecord {
            id: 7,
            date: NaiveDate::from_ymd_opt(2024, 11, 2).unwrap(),
            donor,
            gift,
            created_at: Utc::now(),
        })
    }

    fn jane() -> Donor {
        Donor {
            donor_name: "Jane <Doe>".into(),
            donor_email: Some("jane@example.org".into()),
            ..Donor::default()
        }
    }

    #[test]
    fn escapes_markup() {
        assert_eq!(escape("a & <b> \"c\" 'd'"), "a &amp; &lt;b&gt; &quot;c&quot; &#39;d&#39;");
    }

    #[test]
    fn cash_receipt_has_amount_line_and_no_table() {
        let html = render(
            &content(Gift::Cash { amount: Decimal::new(10000, 2) }, jane()),
            Layout::Preview,
            None,
        );
        assert!(html.contains("Donation Amount: $100.00"));
        assert!(!html.contains("<table"));
        assert!(html.contains("Receipt #MSC-0007"));
        assert!(html.contains("Date: 11/02/2024"));
        assert!(html.contains("Jane &lt;Doe&gt;"));
        assert!(html.contains("donor-email"));
        assert!(!html.contains("donor-address"));
        assert!(!html.contains("donor-phone"));
        assert!(!html.contains("@media print"));
    }

    #[test]
    fn in_kind_receipt_has_table_with_total_row() {
        let gift = Gift::in_kind(vec![
            DonationItem { description: "Coat".into(), value: Decimal::from(40) },
            DonationItem { description: "Scarf".into(), value: Decimal::new(550, 2) },
        ])
        .unwrap();
        let html = render(&content(gift, jane()), Layout::Document, None);
        assert!(html.contains("<table class=\"items\">"));
        assert!(html.contains("<td>Scarf</td><td class=\"value\">$5.50</td>"));
        assert!(html.contains("<tr class=\"total\"><td>Total Value</td><td class=\"value\">$45.50</td></tr>"));
        assert!(!html.contains("Donation Amount"));
    }

    #[test]
    fn print_layout_hides_everything_but_the_receipt() {
        let html = render(
            &content(Gift::Cash { amount: Decimal::ONE }, jane()),
            Layout::Print,
            None,
        );
        assert!(html.contains("body * { visibility: hidden; }"));
        assert!(html.contains("#receipt-preview, #receipt-preview * { visibility: visible; }"));
        assert!(html.contains("@page { size: letter; margin: 0.4in; }"));
    }

    #[test]
    fn logo_is_embedded_inline() {
        let logo = ReceiptLogo::from_bytes("image/png", b"logo");
        let html = render(
            &content(Gift::Cash { amount: Decimal::ONE }, jane()),
            Layout::Document,
            Some(&logo),
        );
        assert!(html.contains("<img src=\"data:image/png;base64,bG9nbw==\""));
    }

    #[test]
    fn email_summarises_the_receipt() {
        let html = render_email(&content(Gift::Cash { amount: Decimal::new(2500, 2) }, jane()));
        assert!(html.contains("Dear Jane &lt;Doe&gt;,"));
        assert!(html.contains("generous cash donation"));
        assert!(html.contains("MSC-0007"));
        assert!(html.contains("$25.00"));
        assert!(html.contains("Sandy Keller"));
    }
}
