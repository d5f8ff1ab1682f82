//! Receipt content shared by every output channel.
//!
//! A [`ReceiptContent`] is built once from a stored donation and then handed to
//! the preview, print, PDF and email renderers, which only decide layout.

use std::path::Path;

use base64::Engine as _;
use serde::Serialize;

use crate::db::models::{DonationRecord, DonationType, Gift};
use crate::format::{display_date, format_currency, format_phone, receipt_id};

pub mod html;
pub mod pdf;

pub const ORGANIZATION_NAME: &str = "My Sister's Closet";

const IN_KIND_LETTER: &[&str] = &[
    "On behalf of the women we serve and My Sister's Closet staff, we wish to thank you for \
     contributing to our organization. Your support is deeply appreciated. Your generous gift will \
     help us to provide essential tools and training to low-income and at-risk women who have the \
     immediate goal of moving beyond poverty by finding sustainable employment. By helping these \
     vulnerable women remarket themselves as credible, professional, and reliable job candidates, \
     we can directly increase their chances of eventually becoming self-sufficient.",
    "Since 1998, MSC has helped thousands of voucher clients with essential mentoring and advocacy \
     assistance to overcome obstacles such as homelessness and domestic violence. In many cases, \
     these individuals have not been able to move forward because they lack basic life skills and \
     education. My Sister's Closet of Monroe County helps them take critical steps to change their \
     ability to move into better-paying jobs with benefits. By providing this unique assistance, \
     they are able to change their economic standing and provide better lives for their children.",
    "My Sister's Closet also provides emergency clothing and hygiene products (hats, gloves, \
     chapstick, sunscreen, dry socks, shoes, etc.) to over one hundred indigent walk-ins. In \
     addition, approximately 800 local women each year seek out My Sister's Closet for discounted \
     professional clothing and free image consulting.",
    "We can only continue to provide these life-changing services because of your valuable support.",
];

const CASH_LETTER: &[&str] = &[
    "On behalf of the women we serve, thank you for your generous gift. MSC uses unique mentoring, \
     advocacy, tools and training services to help clients living in poverty or at-risk \
     circumstances stabilize their lives and meet with life success. By helping these women \
     remarket themselves as credible, professional, and reliable job candidates, we can directly \
     increase their chances of becoming self-sufficient.",
    "Since 1998, MSC has helped thousands of women move past obstacles such as homelessness and \
     domestic violence, and into better-paying jobs with benefits. By providing these \
     life-changing services, they are able to improve their economic standing and provide \
     brighter lives for their children.",
];

const TAX_NOTICE: &str = "This letter serves as your official receipt for tax purposes. \
     My Sister's Closet is a registered non-profit organization. No goods or services were \
     provided in exchange for this donation.";

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct ReceiptDonor {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct ReceiptLine {
    pub description: String,
    pub value: String,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ReceiptGift {
    Cash { amount: String },
    InKind { items: Vec<ReceiptLine>, total: String },
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct Signature {
    pub closing: &'static str,
    pub name: &'static str,
    pub title: &'static str,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct ReceiptContent {
    pub receipt_id: String,
    pub donation_id: i64,
    pub donation_type: DonationType,
    pub type_label: &'static str,
    /// `MM/DD/YYYY`
    pub date: String,
    pub donor: ReceiptDonor,
    pub gift: ReceiptGift,
    pub letter: Vec<&'static str>,
    pub signature: Signature,
    pub tax_notice: &'static str,
}

fn present(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

impl ReceiptContent {
    pub fn from_record(record: &DonationRecord) -> Self {
        let donation_type = record.donation_type();
        let gift = match &record.gift {
            Gift::Cash { amount } => ReceiptGift::Cash {
                amount: format_currency(Some(*amount)),
            },
            Gift::InKind { items, total_value } => ReceiptGift::InKind {
                items: items
                    .iter()
                    .map(|item| ReceiptLine {
                        description: item.description.clone(),
                        value: format_currency(Some(item.value)),
                    })
                    .collect(),
                total: format_currency(Some(*total_value)),
            },
        };
        let letter = match donation_type {
            DonationType::Cash => CASH_LETTER,
            DonationType::InKind => IN_KIND_LETTER,
        };

        ReceiptContent {
            receipt_id: receipt_id(record.id),
            donation_id: record.id,
            donation_type,
            type_label: donation_type.label(),
            date: display_date(record.date),
            donor: ReceiptDonor {
                name: record.donor.donor_name.clone(),
                address: record.donor.address_line(),
                phone: present(&record.donor.donor_phone).map(|p| format_phone(&p)),
                email: present(&record.donor.donor_email),
            },
            gift,
            letter: letter.to_vec(),
            signature: Signature {
                closing: "Warmest and sincerest thanks and appreciation!",
                name: "Sandy Keller",
                title: "Founder / Executive Director",
            },
            tax_notice: TAX_NOTICE,
        }
    }

    /// The amount line for cash gifts, the table total for in-kind ones.
    pub fn total(&self) -> &str {
        match &self.gift {
            ReceiptGift::Cash { amount } => amount,
            ReceiptGift::InKind { total, .. } => total,
        }
    }
}

/// Logo bytes carried inline so rendered documents need nothing external.
#[derive(Debug, Clone)]
pub struct ReceiptLogo {
    mime: &'static str,
    encoded: String,
}

impl ReceiptLogo {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let bytes = std::fs::read(path)
            .map_err(|e| anyhow::anyhow!("reading logo {}: {}", path.display(), e))?;
        let mime = match path.extension().and_then(|e| e.to_str()).map(str::to_lowercase) {
            Some(ext) if ext == "jpg" || ext == "jpeg" => "image/jpeg",
            Some(ext) if ext == "svg" => "image/svg+xml",
            _ => "image/png",
        };
        Ok(Self::from_bytes(mime, &bytes))
    }

    pub fn from_bytes(mime: &'static str, bytes: &[u8]) -> Self {
        Self {
            mime,
            encoded: base64::engine::general_purpose::STANDARD.encode(bytes),
        }
    }

    pub fn data_uri(&self) -> String {
        format!("data:{};base64,{}", self.mime, self.encoded)
    }
}
