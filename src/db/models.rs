use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum DonationType {
    #[serde(rename = "cash")]
    Cash,
    #[serde(rename = "in-kind")]
    InKind,
}

impl DonationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DonationType::Cash => "cash",
            DonationType::InKind => "in-kind",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            DonationType::Cash => "Cash",
            DonationType::InKind => "In-Kind",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "cash" => Some(DonationType::Cash),
            "in-kind" | "inkind" | "in_kind" => Some(DonationType::InKind),
            _ => None,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct DonationItem {
    pub description: String,
    #[serde(with = "rust_decimal::serde::str")]
    pub value: Decimal,
}

/// What was given. Exactly one shape per donation, fixed by its type.
#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(tag = "type")]
pub enum Gift {
    #[serde(rename = "cash")]
    Cash {
        #[serde(with = "rust_decimal::serde::str")]
        amount: Decimal,
    },
    #[serde(rename = "in-kind")]
    InKind {
        items: Vec<DonationItem>,
        #[serde(with = "rust_decimal::serde::str")]
        total_value: Decimal,
    },
}

impl Gift {
    /// Build an in-kind gift whose total is the exact sum of its items.
    /// `None` when the sum does not fit in a `Decimal`.
    pub fn in_kind(items: Vec<DonationItem>) -> Option<Self> {
        let total_value = items
            .iter()
            .try_fold(Decimal::ZERO, |sum, item| sum.checked_add(item.value))?;
        Some(Gift::InKind { items, total_value })
    }

    pub fn donation_type(&self) -> DonationType {
        match self {
            Gift::Cash { .. } => DonationType::Cash,
            Gift::InKind { .. } => DonationType::InKind,
        }
    }

    /// Amount for cash gifts, total value for in-kind ones.
    pub fn value(&self) -> Decimal {
        match self {
            Gift::Cash { amount } => *amount,
            Gift::InKind { total_value, .. } => *total_value,
        }
    }
}

/// Donor contact details; every field but the name is optional.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct Donor {
    pub donor_name: String,
    pub street_address: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub zip_code: Option<String>,
    /// Digits only.
    pub donor_phone: Option<String>,
    pub donor_email: Option<String>,
}

impl Donor {
    /// Single-line address, `street, city, state zip`, skipping blank parts.
    pub fn address_line(&self) -> Option<String> {
        let state_zip = [self.state.as_deref(), self.zip_code.as_deref()]
            .into_iter()
            .flatten()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join(" ");
        let parts: Vec<&str> = [self.street_address.as_deref(), self.city.as_deref()]
            .into_iter()
            .flatten()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .chain(Some(state_zip.as_str()).filter(|s| !s.is_empty()))
            .collect();
        if parts.is_empty() {
            None
        } else {
            Some(parts.join(", "))
        }
    }
}

/// A validated donation ready to be stored.
#[derive(Debug, Clone, PartialEq)]
pub struct NewDonation {
    pub date: NaiveDate,
    pub donor: Donor,
    pub gift: Gift,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct DonationRecord {
    pub id: i64,
    pub date: NaiveDate,
    #[serde(flatten)]
    pub donor: Donor,
    #[serde(flatten)]
    pub gift: Gift,
    pub created_at: DateTime<Utc>,
}

impl DonationRecord {
    pub fn donation_type(&self) -> DonationType {
        self.gift.donation_type()
    }
}

/// Narrowing applied to listings and exports. All bounds are inclusive.
#[derive(Deserialize, Debug, Clone, Default, PartialEq)]
pub struct DonationFilter {
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    #[serde(rename = "type")]
    pub donation_type: Option<DonationType>,
}

impl DonationFilter {
    pub fn matches(&self, record: &DonationRecord) -> bool {
        self.start_date.map_or(true, |start| record.date >= start)
            && self.end_date.map_or(true, |end| record.date <= end)
            && self
                .donation_type
                .map_or(true, |t| record.donation_type() == t)
    }
}

#[derive(Debug, Clone)]
pub struct Admin {
    pub id: i64,
    pub username: String,
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(date: (i32, u32, u32), gift: Gift) -> DonationRecord {
        DonationRecord {
            id: 1,
            date: NaiveDate::from_ymd_opt(date.0, date.1, date.2).unwrap(),
            donor: Donor {
                donor_name: "Jane Doe".into(),
                ..Donor::default()
            },
            gift,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn address_line_skips_missing_parts() {
        let donor = Donor {
            donor_name: "Jane".into(),
            street_address: Some("12 Main St".into()),
            city: Some("Stroudsburg".into()),
            state: Some("PA".into()),
            zip_code: Some("18360".into()),
            ..Donor::default()
        };
        assert_eq!(donor.address_line().as_deref(), Some("12 Main St, Stroudsburg, PA 18360"));

        let partial = Donor {
            city: Some("Stroudsburg".into()),
            zip_code: Some("18360".into()),
            ..Donor::default()
        };
        assert_eq!(partial.address_line().as_deref(), Some("Stroudsburg, 18360"));
        assert_eq!(Donor::default().address_line(), None);
    }

    #[test]
    fn in_kind_total_is_item_sum() {
        let gift = Gift::in_kind(vec![
            DonationItem { description: "Coat".into(), value: Decimal::new(4000, 2) },
            DonationItem { description: "Shoes".into(), value: Decimal::new(1255, 2) },
        ])
        .unwrap();
        assert_eq!(gift.value(), Decimal::new(5255, 2));
        assert_eq!(gift.donation_type(), DonationType::InKind);
    }

    #[test]
    fn in_kind_total_overflow_is_none() {
        let huge = Decimal::MAX;
        let items = vec![
            DonationItem { description: "Painting".into(), value: huge },
            DonationItem { description: "Sculpture".into(), value: huge },
        ];
        assert_eq!(Gift::in_kind(items), None);
    }

    #[test]
    fn item_values_serialize_without_rounding() {
        let item = DonationItem {
            description: "Coat".into(),
            value: "12.3456789012345678".parse().unwrap(),
        };
        let json = serde_json::to_string(&item).unwrap();
        assert_eq!(json, r#"{"description":"Coat","value":"12.3456789012345678"}"#);
        let back: DonationItem = serde_json::from_str(&json).unwrap();
        assert_eq!(back, item);
    }

    #[test]
    fn filter_bounds_are_inclusive() {
        let r = record((2024, 3, 5), Gift::Cash { amount: Decimal::ONE });
        let day = NaiveDate::from_ymd_opt(2024, 3, 5);
        let filter = DonationFilter { start_date: day, end_date: day, donation_type: None };
        assert!(filter.matches(&r));

        let wrong_type = DonationFilter {
            donation_type: Some(DonationType::InKind),
            ..DonationFilter::default()
        };
        assert!(!wrong_type.matches(&r));

        let later = DonationFilter {
            start_date: NaiveDate::from_ymd_opt(2024, 3, 6),
            ..DonationFilter::default()
        };
        assert!(!later.matches(&r));
    }

    #[test]
    fn record_serializes_flat() {
        let r = record((2024, 3, 5), Gift::Cash { amount: Decimal::new(2550, 2) });
        let json = serde_json::to_value(&r).unwrap();
        assert_eq!(json["type"], "cash");
        assert_eq!(json["amount"], "25.50");
        assert_eq!(json["donor_name"], "Jane Doe");
        assert_eq!(json["date"], "2024-03-05");
        assert!(json.get("items").is_none());
    }
}
