use std::path::Path;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use r2d2::Pool;
use r2d2_sqlite::rusqlite::{self, params, types::Type, Connection, OptionalExtension, Row};
use r2d2_sqlite::SqliteConnectionManager;
use rust_decimal::Decimal;

use crate::error::{AppError, AppResult};
use crate::format::CANONICAL_DATE_FORMAT;

pub mod migrations;
pub mod models;

use models::{Admin, DonationFilter, DonationItem, DonationRecord, Donor, Gift, NewDonation};

pub type DbPool = Pool<SqliteConnectionManager>;

/// Build the connection pool and bring the schema up to date before anything
/// else gets a handle on it.
pub fn open(path: impl AsRef<Path>) -> anyhow::Result<DbPool> {
    let pool = init_pool(path)?;
    let mut conn = pool.get()?;
    let applied = migrations::run(&mut conn)?;
    if applied.is_empty() {
        tracing::info!("Database schema is up to date");
    } else {
        tracing::info!(?applied, "Database migrations applied");
    }
    Ok(pool)
}

pub fn init_pool(path: impl AsRef<Path>) -> anyhow::Result<DbPool> {
    let manager = SqliteConnectionManager::file(path.as_ref())
        .with_init(|conn| conn.busy_timeout(std::time::Duration::from_secs(5)));
    let pool = Pool::builder()
        .max_size(8)
        .connection_timeout(std::time::Duration::from_secs(30))
        .build(manager)
        .map_err(|e| anyhow::anyhow!("Failed to create DB pool: {}", e))?;
    Ok(pool)
}

async fn with_conn<T, F>(pool: &DbPool, f: F) -> AppResult<T>
where
    F: FnOnce(&mut Connection) -> AppResult<T> + Send + 'static,
    T: Send + 'static,
{
    let pool = pool.clone();
    tokio::task::spawn_blocking(move || {
        let mut conn = pool.get()?;
        f(&mut conn)
    })
    .await?
}

/// Single source of truth for donation records. Records are never updated in place.
#[derive(Clone)]
pub struct DonationStore {
    pool: DbPool,
}

const DONATION_COLUMNS: &str = "id, type, date, donor_name, street_address, city, state, zip_code, \
     donor_phone, donor_email, amount, items, total_value, created_at";

impl DonationStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub async fn create(&self, donation: NewDonation) -> AppResult<DonationRecord> {
        with_conn(&self.pool, move |conn| {
            let created_at = Utc::now();
            let (amount, items, total_value) = match &donation.gift {
                Gift::Cash { amount } => (Some(amount.to_string()), None, None),
                Gift::InKind { items, total_value } => (
                    None,
                    Some(
                        serde_json::to_string(items)
                            .map_err(|e| AppError::Storage(format!("encode items: {}", e)))?,
                    ),
                    Some(total_value.to_string()),
                ),
            };
            let donor = &donation.donor;

            conn.execute(
                "INSERT INTO donations (
                    type, date, donor_name, street_address, city, state, zip_code,
                    donor_phone, donor_email, amount, items, total_value, created_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
                params![
                    donation.gift.donation_type().as_str(),
                    donation.date.format(CANONICAL_DATE_FORMAT).to_string(),
                    donor.donor_name,
                    donor.street_address,
                    donor.city,
                    donor.state,
                    donor.zip_code,
                    donor.donor_phone,
                    donor.donor_email,
                    amount,
                    items,
                    total_value,
                    created_at.to_rfc3339(),
                ],
            )?;
            let id = conn.last_insert_rowid();

            Ok(DonationRecord {
                id,
                date: donation.date,
                donor: donation.donor,
                gift: donation.gift,
                created_at,
            })
        })
        .await
    }

    /// Records matching `filter`, newest gift date first.
    pub async fn list(&self, filter: DonationFilter) -> AppResult<Vec<DonationRecord>> {
        with_conn(&self.pool, move |conn| {
            let mut clauses: Vec<&str> = Vec::new();
            let mut values: Vec<String> = Vec::new();
            if let Some(start) = filter.start_date {
                clauses.push("date >= ?");
                values.push(start.format(CANONICAL_DATE_FORMAT).to_string());
            }
            if let Some(end) = filter.end_date {
                clauses.push("date <= ?");
                values.push(end.format(CANONICAL_DATE_FORMAT).to_string());
            }
            if let Some(kind) = filter.donation_type {
                clauses.push("type = ?");
                values.push(kind.as_str().to_string());
            }

            let mut sql = format!("SELECT {} FROM donations", DONATION_COLUMNS);
            if !clauses.is_empty() {
                sql.push_str(" WHERE ");
                sql.push_str(&clauses.join(" AND "));
            }
            sql.push_str(" ORDER BY date DESC, id DESC");

            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt.query_map(rusqlite::params_from_iter(values.iter()), row_to_donation)?;
            let records = rows.collect::<Result<Vec<_>, _>>()?;
            Ok(records)
        })
        .await
    }

    pub async fn get(&self, id: i64) -> AppResult<DonationRecord> {
        with_conn(&self.pool, move |conn| {
            let sql = format!("SELECT {} FROM donations WHERE id = ?1", DONATION_COLUMNS);
            conn.query_row(&sql, params![id], row_to_donation)
                .optional()?
                .ok_or_else(AppError::donation_not_found)
        })
        .await
    }

    /// Permanently remove a record. Its id is never handed out again.
    pub async fn delete(&self, id: i64) -> AppResult<()> {
        with_conn(&self.pool, move |conn| {
            let removed = conn.execute("DELETE FROM donations WHERE id = ?1", params![id])?;
            if removed == 0 {
                return Err(AppError::donation_not_found());
            }
            Ok(())
        })
        .await
    }
}

fn conversion_error<E>(idx: usize, e: E) -> rusqlite::Error
where
    E: std::error::Error + Send + Sync + 'static,
{
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e))
}

fn decimal_column(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<Decimal>> {
    let raw: Option<String> = row.get(idx)?;
    raw.map(|s| Decimal::from_str(&s).map_err(|e| conversion_error(idx, e)))
        .transpose()
}

#[derive(Debug, thiserror::Error)]
#[error("{0}")]
struct CorruptRow(String);

fn row_to_donation(row: &Row<'_>) -> rusqlite::Result<DonationRecord> {
    let kind: String = row.get(1)?;
    let date: String = row.get(2)?;
    let date = NaiveDate::parse_from_str(&date, CANONICAL_DATE_FORMAT)
        .map_err(|e| conversion_error(2, e))?;

    let gift = match kind.as_str() {
        "cash" => Gift::Cash {
            amount: decimal_column(row, 10)?
                .ok_or_else(|| conversion_error(10, CorruptRow("cash donation without amount".into())))?,
        },
        "in-kind" => {
            let raw: Option<String> = row.get(11)?;
            let items: Vec<DonationItem> = match raw {
                Some(json) => serde_json::from_str(&json).map_err(|e| conversion_error(11, e))?,
                None => Vec::new(),
            };
            match decimal_column(row, 12)? {
                Some(total_value) => Gift::InKind { items, total_value },
                None => Gift::in_kind(items).ok_or_else(|| {
                    conversion_error(11, CorruptRow("in-kind item values overflow".into()))
                })?,
            }
        }
        other => {
            return Err(conversion_error(
                1,
                CorruptRow(format!("unknown donation type {:?}", other)),
            ))
        }
    };

    let created_at: String = row.get(13)?;
    let created_at = DateTime::parse_from_rfc3339(&created_at)
        .map_err(|e| conversion_error(13, e))?
        .with_timezone(&Utc);

    Ok(DonationRecord {
        id: row.get(0)?,
        date,
        donor: Donor {
            donor_name: row.get(3)?,
            street_address: row.get(4)?,
            city: row.get(5)?,
            state: row.get(6)?,
            zip_code: row.get(7)?,
            donor_phone: row.get(8)?,
            donor_email: row.get(9)?,
        },
        gift,
        created_at,
    })
}

/// Administrator credentials. Only used to authenticate.
#[derive(Clone)]
pub struct AdminStore {
    pool: DbPool,
}

impl AdminStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub async fn find_by_username(&self, username: &str) -> AppResult<Option<Admin>> {
        let username = username.to_string();
        with_conn(&self.pool, move |conn| {
            let admin = conn
                .query_row(
                    "SELECT id, username, password_hash, created_at FROM admins WHERE username = ?1",
                    params![username],
                    |row| {
                        let created_at: String = row.get(3)?;
                        let created_at = DateTime::parse_from_rfc3339(&created_at)
                            .map_err(|e| conversion_error(3, e))?
                            .with_timezone(&Utc);
                        Ok(Admin {
                            id: row.get(0)?,
                            username: row.get(1)?,
                            password_hash: row.get(2)?,
                            created_at,
                        })
                    },
                )
                .optional()?;
            Ok(admin)
        })
        .await
    }

    /// Create the account, or replace its password hash when it already exists.
    pub async fn upsert(&self, username: &str, password_hash: &str) -> AppResult<()> {
        let username = username.to_string();
        let password_hash = password_hash.to_string();
        with_conn(&self.pool, move |conn| {
            conn.execute(
                "INSERT INTO admins (username, password_hash, created_at) VALUES (?1, ?2, ?3)
                 ON CONFLICT(username) DO UPDATE SET password_hash = excluded.password_hash",
                params![username, password_hash, Utc::now().to_rfc3339()],
            )?;
            Ok(())
        })
        .await
    }
}
