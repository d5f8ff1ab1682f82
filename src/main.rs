use std::net::SocketAddr;
use std::sync::Arc;

use axum::http::{header, HeaderValue, Method};
use socketioxide::SocketIo;
use tower_governor::governor::GovernorConfigBuilder;
use tower_governor::GovernorLayer;
use tower_http::cors::CorsLayer;
use tower_http::services::{ServeDir, ServeFile};
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use msc_receipts::config::Config;
use msc_receipts::mailer::SmtpMailer;
use msc_receipts::notify::{ChangeNotifier, SocketIoNotifier};
use msc_receipts::receipt::pdf::ChromePdfEngine;
use msc_receipts::tasks::{SideEffectWorker, SideEffects, SIDE_EFFECT_QUEUE_CAPACITY};
use msc_receipts::{db, routes, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if it exists
    dotenvy::dotenv().ok();

    // Initialize Tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "msc_receipts=info,tower_http=info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting MSC donation receipt service...");
    let config = Config::from_env()?;

    tracing::info!(path = %config.database_path.display(), "Opening database");
    let pool = db::open(&config.database_path)?;
    tracing::info!("Database ready");

    let (socket_layer, io) = SocketIo::new_layer();
    let notifier: Arc<dyn ChangeNotifier> = Arc::new(SocketIoNotifier::new(io));
    let (side_effects, side_effect_rx) = SideEffects::channel(SIDE_EFFECT_QUEUE_CAPACITY);

    let mailer = Arc::new(SmtpMailer::from_config(config.smtp.as_ref())?);
    let pdf_engine = Arc::new(ChromePdfEngine::new(
        config.chrome_path.clone(),
        config.pdf_max_concurrency,
    ));
    let state = AppState::new(&config, pool, pdf_engine, mailer, side_effects)?;

    let worker = tokio::spawn(
        SideEffectWorker::new(state.monthly_log.clone(), notifier).run(side_effect_rx),
    );

    let governor_config = Arc::new(
        GovernorConfigBuilder::default()
            .per_second(config.rate_limit_per_second)
            .burst_size(config.rate_limit_burst)
            .finish()
            .ok_or_else(|| anyhow::anyhow!("invalid RATE_LIMIT_PER_SECOND / RATE_LIMIT_BURST"))?,
    );

    let cors = cors_layer(&config);

    let mut app = routes::router(state);
    if let Some(static_dir) = &config.static_dir {
        tracing::info!(dir = %static_dir.display(), "Serving client build");
        app = app.fallback_service(
            ServeDir::new(static_dir).fallback(ServeFile::new(static_dir.join("index.html"))),
        );
    }

    let app = app
        .layer(socket_layer)
        .layer(cors)
        .layer(GovernorLayer {
            config: governor_config,
        })
        .layer(TraceLayer::new_for_http())
        .layer(SetResponseHeaderLayer::overriding(
            header::X_CONTENT_TYPE_OPTIONS,
            HeaderValue::from_static("nosniff"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::X_FRAME_OPTIONS,
            HeaderValue::from_static("DENY"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::STRICT_TRANSPORT_SECURITY,
            HeaderValue::from_static("max-age=31536000; includeSubDomains"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::CONTENT_SECURITY_POLICY,
            HeaderValue::from_static("default-src 'self'; style-src 'self' 'unsafe-inline'; img-src 'self' data:; connect-src 'self' ws: wss:;"),
        ));

    let addr = SocketAddr::from(([0, 0, 0, 0], config.http_port));
    tracing::info!("listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // The router held the last queue sender; the worker drains and exits.
    if let Err(e) = worker.await {
        tracing::error!("Side-effect worker ended abnormally: {}", e);
    }
    Ok(())
}

fn cors_layer(config: &Config) -> CorsLayer {
    let mut origins: Vec<HeaderValue> = config
        .allowed_origins
        .iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!("Ignoring invalid ALLOWED_ORIGINS entry: {}", origin);
                None
            }
        })
        .collect();

    if origins.is_empty() {
        origins = vec![
            HeaderValue::from_static("http://localhost:3000"),
            HeaderValue::from_static("http://127.0.0.1:3000"),
        ];
    }

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION, header::ACCEPT])
        .allow_credentials(true)
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("failed to install signal handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("signal received, starting graceful shutdown");
}
