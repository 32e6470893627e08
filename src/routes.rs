use crate::{api::attendance, auth::middleware::auth_middleware, config::Config};
use actix_governor::{
    Governor, GovernorConfigBuilder, PeerIpKeyExtractor, governor::middleware::NoOpMiddleware,
};
use actix_web::{Scope, middleware::from_fn, web};
use std::sync::Arc;

pub fn configure(cfg: &mut web::ServiceConfig, config: Config) {
    // Helper to build per-route limiter
    fn build_limiter(requests_per_min: u32) -> Governor<PeerIpKeyExtractor, NoOpMiddleware> {
        let requests_per_min = requests_per_min.max(1);
        let cfg = GovernorConfigBuilder::default()
            .per_millisecond((60_000 / requests_per_min as u64).max(1))
            .burst_size(requests_per_min)
            .key_extractor(PeerIpKeyExtractor)
            .finish()
            .expect("limiter period and burst are non-zero");
        Governor::new(&cfg)
    }

    let attendance_limiter = Arc::new(build_limiter(config.rate_attendance_per_min));
    let protected_limiter = Arc::new(build_limiter(config.rate_protected_per_min));

    // Protected routes
    cfg.service(
        web::scope(&config.api_prefix)
            .wrap(from_fn(auth_middleware)) // authentication
            .wrap(protected_limiter) // rate limiting
            .service(attendance_scope().wrap(attendance_limiter)),
    );
}

pub fn attendance_scope() -> Scope {
    web::scope("/attendance")
        // /attendance
        .service(
            web::resource("")
                .route(web::post().to(attendance::check_in))
                .route(web::put().to(attendance::check_out)),
        )
        // /attendance/auto-checkout
        .service(web::resource("/auto-checkout").route(web::post().to(attendance::auto_checkout)))
        // /attendance/unfinished
        .service(web::resource("/unfinished").route(web::get().to(attendance::unfinished)))
        // /attendance/recap
        .service(web::resource("/recap").route(web::get().to(attendance::recap)))
        // /attendance/sweep
        .service(web::resource("/sweep").route(web::post().to(attendance::sweep)))
}

// API REQUEST
//  └─ Authorization: Bearer access_token (issued by the portal's auth service)
