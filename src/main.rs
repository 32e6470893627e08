use actix_web::middleware::NormalizePath;
use actix_web::web::Data;
use actix_web::{App, HttpServer, Responder, get};
use std::sync::Arc;

mod api;
mod attendance;
mod auth;
mod config;
mod db;
mod docs;
mod model;
mod routes;

use attendance::clock::SystemClock;
use attendance::lifecycle::SessionLifecycle;
use attendance::locks::EmployeeLocks;
use attendance::mysql::{MySqlEvidenceSink, MySqlSessionStore, MySqlShiftCalendar};
use config::Config;
use db::init_db;

use crate::docs::ApiDoc;
use tracing::{error, info};
use tracing_appender::rolling;
use utoipa::OpenApi; // ← needed for ApiDoc::openapi()
use utoipa_swagger_ui::SwaggerUi;

#[get("/")]
async fn index() -> impl Responder {
    "Presensi attendance service"
}

fn startup_error(e: impl std::fmt::Display) -> std::io::Error {
    error!(error = %e, "Startup failed");
    std::io::Error::other(e.to_string())
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    let config = Config::from_env().map_err(|e| std::io::Error::other(format!("{e:#}")))?;

    // Rolling daily log
    let file_appender = rolling::daily(&config.log_dir, "app.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::fmt()
        .with_writer(non_blocking)
        .with_max_level(tracing::Level::DEBUG)
        .with_ansi(false)
        .with_target(false) // removes module path
        .with_level(true)
        .with_thread_ids(false)
        .with_thread_names(false)
        .pretty()
        .init();

    info!("Server starting...");

    let pool = init_db(&config.database_url, config.run_migrations)
        .await
        .map_err(startup_error)?;

    let clock = SystemClock::with_offset_minutes(config.attendance.utc_offset_minutes)
        .ok_or_else(|| startup_error("ATTENDANCE_UTC_OFFSET_MINUTES is out of range"))?;

    let lifecycle = Data::new(SessionLifecycle::new(
        Arc::new(MySqlShiftCalendar::new(pool.clone())),
        Arc::new(MySqlSessionStore::new(pool.clone())),
        Arc::new(MySqlEvidenceSink::new(pool)),
        Arc::new(clock),
        EmployeeLocks::new(config.attendance.employee_lock_idle()),
        config.attendance.policy(),
    ));

    let server_addr = config.server_addr.clone();
    let config_data = config.clone();

    HttpServer::new(move || {
        App::new()
            .wrap(actix_web::middleware::Logger::default())
            .wrap(NormalizePath::trim())
            .service(
                SwaggerUi::new("/swagger-ui/{_:.*}") // ← important: wildcard {_:.*} to match JS/CSS files
                    .url("/api-doc/openapi.json", ApiDoc::openapi()),
            )
            .app_data(lifecycle.clone())
            .app_data(Data::new(config.clone()))
            .service(index)
            .configure(|cfg| routes::configure(cfg, config_data.clone()))
    })
    .bind(server_addr)?
    .run()
    .await
}
