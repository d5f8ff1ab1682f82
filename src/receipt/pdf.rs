//! PDF generation through a headless browser.
//!
//! Rendering is blocking and memory hungry, so [`PdfRenderer`] caps the number of
//! renders in flight and [`ChromePdfEngine`] keeps launched browsers around between
//! calls instead of starting one per receipt.

use std::io::Write as _;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use headless_chrome::types::PrintToPdfOptions;
use headless_chrome::{Browser, LaunchOptions};
use parking_lot::Mutex;
use tokio::sync::Semaphore;

use crate::error::{AppError, AppResult};

#[derive(Debug, Clone, PartialEq)]
pub struct PdfOptions {
    pub paper_width_in: f64,
    pub paper_height_in: f64,
    pub margin_in: f64,
    pub print_background: bool,
}

impl Default for PdfOptions {
    /// US letter with 0.4in margins.
    fn default() -> Self {
        Self {
            paper_width_in: 8.5,
            paper_height_in: 11.0,
            margin_in: 0.4,
            print_background: true,
        }
    }
}

/// Turns an HTML file on disk into PDF bytes. Called from the blocking pool.
pub trait PdfEngine: Send + Sync {
    fn render(&self, html_path: &Path, options: &PdfOptions) -> anyhow::Result<Vec<u8>>;
}

pub struct ChromePdfEngine {
    chrome_path: Option<PathBuf>,
    idle: Mutex<Vec<Browser>>,
    max_idle: usize,
}

impl ChromePdfEngine {
    pub fn new(chrome_path: Option<PathBuf>, max_idle: usize) -> Self {
        Self {
            chrome_path,
            idle: Mutex::new(Vec::new()),
            max_idle,
        }
    }

    fn launch(&self) -> anyhow::Result<Browser> {
        let options = LaunchOptions::default_builder()
            .headless(true)
            .sandbox(false)
            .path(self.chrome_path.clone())
            .idle_browser_timeout(Duration::from_secs(60 * 60))
            .build()
            .map_err(|e| anyhow::anyhow!("invalid browser launch options: {}", e))?;
        tracing::debug!("Launching headless browser for PDF rendering");
        Browser::new(options)
    }

    fn print(browser: &Browser, html_path: &Path, options: &PdfOptions) -> anyhow::Result<Vec<u8>> {
        let tab = browser.new_tab()?;
        let url = format!("file://{}", html_path.display());
        tab.navigate_to(&url)?;
        tab.wait_until_navigated()?;
        let pdf = tab.print_to_pdf(Some(PrintToPdfOptions {
            paper_width: Some(options.paper_width_in),
            paper_height: Some(options.paper_height_in),
            margin_top: Some(options.margin_in),
            margin_bottom: Some(options.margin_in),
            margin_left: Some(options.margin_in),
            margin_right: Some(options.margin_in),
            print_background: Some(options.print_background),
            ..Default::default()
        }))?;
        if let Err(e) = tab.close(true) {
            tracing::debug!("Closing render tab failed: {}", e);
        }
        Ok(pdf)
    }

    fn release(&self, browser: Browser) {
        let mut idle = self.idle.lock();
        if idle.len() < self.max_idle {
            idle.push(browser);
        }
    }
}

impl PdfEngine for ChromePdfEngine {
    fn render(&self, html_path: &Path, options: &PdfOptions) -> anyhow::Result<Vec<u8>> {
        let pooled = self.idle.lock().pop();

        // A pooled browser may have died while idle; retry once on a fresh one.
        if let Some(browser) = pooled {
            match Self::print(&browser, html_path, options) {
                Ok(pdf) => {
                    self.release(browser);
                    return Ok(pdf);
                }
                Err(e) => tracing::warn!("Pooled browser failed, relaunching: {}", e),
            }
        }

        let browser = self.launch()?;
        let pdf = Self::print(&browser, html_path, options)?;
        self.release(browser);
        Ok(pdf)
    }
}

/// Bounded front door to a [`PdfEngine`].
#[derive(Clone)]
pub struct PdfRenderer {
    engine: Arc<dyn PdfEngine>,
    permits: Arc<Semaphore>,
    options: PdfOptions,
}

impl PdfRenderer {
    pub fn new(engine: Arc<dyn PdfEngine>, max_concurrency: usize) -> Self {
        Self {
            engine,
            permits: Arc::new(Semaphore::new(max_concurrency.max(1))),
            options: PdfOptions::default(),
        }
    }

    /// Render a complete HTML document. The markup is staged in a temporary file
    /// that is removed once the engine returns, whatever the outcome.
    pub async fn render(&self, html: String) -> AppResult<Vec<u8>> {
        let _permit = self
            .permits
            .acquire()
            .await
            .map_err(|e| AppError::Render(e.to_string()))?;

        let engine = Arc::clone(&self.engine);
        let options = self.options.clone();
        let result = tokio::task::spawn_blocking(move || -> anyhow::Result<Vec<u8>> {
            let mut staged = tempfile::Builder::new()
                .prefix("msc-receipt-")
                .suffix(".html")
                .tempfile()?;
            staged.write_all(html.as_bytes())?;
            staged.flush()?;
            engine.render(staged.path(), &options)
        })
        .await
        .map_err(|e| AppError::Render(e.to_string()))?;

        result.map_err(|e| {
            tracing::error!("PDF rendering failed: {:#}", e);
            AppError::Render(e.to_string())
        })
    }
}
