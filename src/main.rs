use std::sync::Arc;

use actix_web::middleware::{Logger, NormalizePath};
use actix_web::web::Data;
use actix_web::{App, HttpServer};
use tokio::sync::watch;
use tracing::{info, warn};
use tracing_appender::rolling;
use tracing_subscriber::EnvFilter;
use utoipa::OpenApi; // ← needed for ApiDoc::openapi()
use utoipa_swagger_ui::SwaggerUi;

use hrm_attendance::attendance::scheduler;
use hrm_attendance::config::Config;
use hrm_attendance::db::init_db;
use hrm_attendance::docs::ApiDoc;
use hrm_attendance::routes;
use hrm_attendance::state::AppState;
use hrm_attendance::store::{AttendanceStore, MemoryStore, MySqlStore};

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env()?;

    // Rolling daily log
    let file_appender = rolling::daily(&config.log_dir, "attendance.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::fmt()
        .with_writer(non_blocking)
        .with_env_filter(EnvFilter::new(&config.log_level))
        .with_ansi(false)
        .with_target(false) // removes module path
        .with_level(true)
        .with_thread_ids(false)
        .with_thread_names(false)
        .pretty()
        .init();

    info!("Server starting...");

    let store: Arc<dyn AttendanceStore> = match &config.database_url {
        Some(url) => Arc::new(MySqlStore::new(init_db(url).await?)),
        None => {
            warn!("DATABASE_URL not set, attendance data is kept in memory only");
            Arc::new(MemoryStore::new())
        }
    };

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let state = Data::new(AppState::new(&config, store, shutdown_rx.clone())?);

    if config.sweep_enabled {
        actix_web::rt::spawn(scheduler::run_nightly(
            state.initializer.clone(),
            config.tz_offset,
            shutdown_rx,
        ));
    } else {
        info!("Nightly attendance sweep disabled");
    }

    // Clone values for the closure (avoid move issues)
    let server_addr = config.server_addr.clone();
    let config_data = config.clone();

    HttpServer::new(move || {
        App::new()
            .wrap(Logger::default())
            .wrap(NormalizePath::trim())
            .service(
                SwaggerUi::new("/swagger-ui/{_:.*}") // ← important: wildcard {_:.*} to match JS/CSS files
                    .url("/api-doc/openapi.json", ApiDoc::openapi()),
            )
            .app_data(state.clone())
            .app_data(Data::new(config_data.clone()))
            // Attendance routes with auth + rate limiting
            .configure(|cfg| routes::configure(cfg, &config_data))
    })
    .bind(server_addr)?
    .run()
    .await?;

    // stop the sweep between ledgers
    let _ = shutdown_tx.send(true);
    info!("Server stopped");
    Ok(())
}
