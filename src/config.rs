use std::env;
use std::path::PathBuf;

/// Process configuration, read once at startup.
///
/// | Variable | Default |
/// |----------|---------|
/// | DATABASE_PATH | database.sqlite |
/// | HTTP_PORT | 5002 |
/// | JWT_SECRET | required |
/// | JWT_TTL_HOURS | 24 |
/// | EXCEL_LOG_DIR | excel-logs |
/// | RECEIPT_LOGO_PATH | unset |
/// | PDF_MAX_CONCURRENCY | 2 |
/// | CHROME_PATH | unset (auto-detect) |
/// | SMTP_HOST / SMTP_PORT / SMTP_USER / SMTP_PASS / SMTP_FROM | unset / 587 |
/// | ALLOWED_ORIGINS | localhost in development, required in production |
/// | RUST_ENV | development |
/// | RATE_LIMIT_PER_SECOND / RATE_LIMIT_BURST | 20 / 60 |
/// | STATIC_DIR | unset |
#[derive(Debug, Clone)]
pub struct Config {
    pub database_path: PathBuf,
    pub http_port: u16,
    pub jwt_secret: String,
    pub jwt_ttl_hours: i64,
    pub excel_log_dir: PathBuf,
    pub receipt_logo_path: Option<PathBuf>,
    pub pdf_max_concurrency: usize,
    pub chrome_path: Option<PathBuf>,
    pub smtp: Option<SmtpConfig>,
    pub allowed_origins: Vec<String>,
    pub environment: String,
    pub rate_limit_per_second: u64,
    pub rate_limit_burst: u32,
    pub static_dir: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    /// Falls back to the SMTP user when unset.
    pub from: Option<String>,
}

fn var(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parsed<T: std::str::FromStr>(key: &str, default: T) -> T {
    var(key).and_then(|v| v.parse().ok()).unwrap_or(default)
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        let jwt_secret = var("JWT_SECRET").ok_or_else(|| anyhow::anyhow!("JWT_SECRET must be set"))?;
        let environment = var("RUST_ENV").unwrap_or_else(|| "development".into());

        let allowed_origins: Vec<String> = var("ALLOWED_ORIGINS")
            .map(|v| {
                v.split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();
        if allowed_origins.is_empty() && environment == "production" {
            anyhow::bail!("ALLOWED_ORIGINS must be set in production");
        }

        let smtp = var("SMTP_HOST").map(|host| SmtpConfig {
            host,
            port: parsed("SMTP_PORT", 587),
            username: var("SMTP_USER"),
            password: var("SMTP_PASS"),
            from: var("SMTP_FROM"),
        });

        Ok(Self {
            database_path: var("DATABASE_PATH")
                .unwrap_or_else(|| "database.sqlite".into())
                .into(),
            http_port: parsed("HTTP_PORT", 5002),
            jwt_secret,
            jwt_ttl_hours: parsed("JWT_TTL_HOURS", 24),
            excel_log_dir: var("EXCEL_LOG_DIR").unwrap_or_else(|| "excel-logs".into()).into(),
            receipt_logo_path: var("RECEIPT_LOGO_PATH").map(PathBuf::from),
            pdf_max_concurrency: parsed("PDF_MAX_CONCURRENCY", 2),
            chrome_path: var("CHROME_PATH").map(PathBuf::from),
            smtp,
            allowed_origins,
            environment,
            rate_limit_per_second: parsed("RATE_LIMIT_PER_SECOND", 20),
            rate_limit_burst: parsed("RATE_LIMIT_BURST", 60),
            static_dir: var("STATIC_DIR").map(PathBuf::from),
        })
    }

    /// Development defaults rooted in `dir`; used by tests and tooling.
    pub fn for_dir(dir: &std::path::Path, jwt_secret: impl Into<String>) -> Self {
        Self {
            database_path: dir.join("database.sqlite"),
            http_port: 0,
            jwt_secret: jwt_secret.into(),
            jwt_ttl_hours: 24,
            excel_log_dir: dir.join("excel-logs"),
            receipt_logo_path: None,
            pdf_max_concurrency: 2,
            chrome_path: None,
            smtp: None,
            allowed_origins: Vec::new(),
            environment: "development".into(),
            rate_limit_per_second: 20,
            rate_limit_burst: 60,
            static_dir: None,
        }
    }

    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }
}
