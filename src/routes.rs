use crate::{
    api::attendance,
    auth::middleware::auth_middleware,
    config::Config,
    error::AttendanceError,
};
use actix_governor::{
    Governor, GovernorConfigBuilder, PeerIpKeyExtractor, governor::middleware::NoOpMiddleware,
};
use actix_web::{middleware::from_fn, web};

// Helper to build per-route limiter
fn build_limiter(requests_per_min: u32) -> Governor<PeerIpKeyExtractor, NoOpMiddleware> {
    let requests_per_min = requests_per_min.max(1);
    let per_ms = (60_000 / requests_per_min as u64).max(1);
    let cfg = GovernorConfigBuilder::default()
        .per_millisecond(per_ms)
        .burst_size(requests_per_min)
        .key_extractor(PeerIpKeyExtractor)
        .finish()
        .expect("period and burst size are non-zero");
    Governor::new(&cfg)
}

/// Malformed bodies, paths and queries answer with the same `{"message"}`
/// shape as domain validation errors.
fn extractor_configs(cfg: &mut web::ServiceConfig) {
    cfg.app_data(
        web::JsonConfig::default()
            .error_handler(|err, _req| AttendanceError::Validation(err.to_string()).into()),
    )
    .app_data(
        web::PathConfig::default()
            .error_handler(|err, _req| AttendanceError::Validation(err.to_string()).into()),
    )
    .app_data(
        web::QueryConfig::default()
            .error_handler(|err, _req| AttendanceError::Validation(err.to_string()).into()),
    );
}

pub fn configure(cfg: &mut web::ServiceConfig, config: &Config) {
    let punch_limiter = build_limiter(config.rate_punch_per_min);
    let protected_limiter = build_limiter(config.rate_protected_per_min);

    extractor_configs(cfg);

    // Protected routes
    cfg.service(
        web::scope(&config.api_prefix)
            .wrap(from_fn(auth_middleware)) // authentication
            .wrap(protected_limiter) // rate limiting
            .service(
                web::scope("/attendance")
                    // /attendance/punch
                    .service(
                        web::resource("/punch")
                            .wrap(punch_limiter)
                            .route(web::post().to(attendance::punch)),
                    )
                    // /attendance/today/{employee_id}
                    .service(
                        web::resource("/today/{employee_id}")
                            .route(web::get().to(attendance::today)),
                    )
                    // /attendance/records/{employee_id}?month=YYYY-MM
                    .service(
                        web::resource("/records/{employee_id}")
                            .route(web::get().to(attendance::month_records)),
                    )
                    // /attendance/records/{employee_id}/{date}/punch/{which}
                    .service(
                        web::resource("/records/{employee_id}/{date}/punch/{which}")
                            .route(web::put().to(attendance::set_punch))
                            .route(web::delete().to(attendance::delete_punch)),
                    )
                    // /attendance/records/{employee_id}/{date}/status
                    .service(
                        web::resource("/records/{employee_id}/{date}/status")
                            .route(web::put().to(attendance::set_status)),
                    )
                    // /attendance/ledger/{employee_id}
                    .service(
                        web::resource("/ledger/{employee_id}")
                            .route(web::put().to(attendance::configure_ledger)),
                    )
                    // /attendance/anomalies/{employee_id}
                    .service(
                        web::resource("/anomalies/{employee_id}")
                            .route(web::get().to(attendance::anomalies)),
                    )
                    // /attendance/device/...
                    .service(
                        web::resource("/device/verify")
                            .route(web::post().to(attendance::verify_device)),
                    )
                    .service(
                        web::resource("/device/requests/{id}/approve")
                            .route(web::put().to(attendance::approve_device)),
                    )
                    .service(
                        web::resource("/device/requests/{id}/reject")
                            .route(web::put().to(attendance::reject_device)),
                    )
                    // /attendance/sweep
                    .service(web::resource("/sweep").route(web::post().to(attendance::run_sweep))),
            ),
    );
}
