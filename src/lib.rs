//! Donation records, receipts and spreadsheet exports for My Sister's Closet.

use std::sync::Arc;
use std::time::Instant;

use axum::extract::FromRef;

pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod export;
pub mod extract;
pub mod format;
pub mod import;
pub mod mailer;
pub mod notify;
pub mod receipt;
pub mod routes;
pub mod tasks;
pub mod validation;

use auth::JwtKeys;
use config::Config;
use db::{AdminStore, DbPool, DonationStore};
use export::MonthlyLog;
use mailer::ReceiptMailer;
use receipt::pdf::{PdfEngine, PdfRenderer};
use receipt::ReceiptLogo;
use tasks::SideEffects;

#[derive(Clone)]
pub struct AppState {
    pub donations: DonationStore,
    pub admins: AdminStore,
    pub jwt: JwtKeys,
    pub receipts: PdfRenderer,
    pub logo: Option<Arc<ReceiptLogo>>,
    pub mailer: Arc<dyn ReceiptMailer>,
    pub side_effects: SideEffects,
    pub monthly_log: MonthlyLog,
    pub started_at: Instant,
}

impl AppState {
    /// Wire the stores and collaborators together. The side-effect receiver is
    /// owned by whoever runs the worker.
    pub fn new(
        config: &Config,
        pool: DbPool,
        pdf_engine: Arc<dyn PdfEngine>,
        mailer: Arc<dyn ReceiptMailer>,
        side_effects: SideEffects,
    ) -> anyhow::Result<Self> {
        let logo = match &config.receipt_logo_path {
            Some(path) => Some(Arc::new(ReceiptLogo::load(path)?)),
            None => {
                tracing::warn!("RECEIPT_LOGO_PATH not set; receipts will render without a logo");
                None
            }
        };

        Ok(Self {
            donations: DonationStore::new(pool.clone()),
            admins: AdminStore::new(pool),
            jwt: JwtKeys::new(&config.jwt_secret, config.jwt_ttl_hours),
            receipts: PdfRenderer::new(pdf_engine, config.pdf_max_concurrency),
            logo,
            mailer,
            side_effects,
            monthly_log: MonthlyLog::new(&config.excel_log_dir),
            started_at: Instant::now(),
        })
    }
}

impl FromRef<AppState> for JwtKeys {
    fn from_ref(state: &AppState) -> Self {
        state.jwt.clone()
    }
}
