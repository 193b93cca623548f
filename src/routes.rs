use crate::{api::attendance, config::Config};
use actix_governor::{
    Governor, GovernorConfigBuilder, PeerIpKeyExtractor, governor::middleware::NoOpMiddleware,
};
use actix_web::web;
use std::sync::Arc;

pub fn configure(cfg: &mut web::ServiceConfig, config: Config) {
    // Helper to build per-route limiter
    fn build_limiter(requests_per_min: u32) -> Governor<PeerIpKeyExtractor, NoOpMiddleware> {
        let per_ms = if requests_per_min == 0 {
            1
        } else {
            60_000 / requests_per_min as u64
        };
        let cfg = GovernorConfigBuilder::default()
            .per_millisecond(per_ms)
            .burst_size(requests_per_min)
            .key_extractor(PeerIpKeyExtractor)
            .finish()
            .unwrap();
        Governor::new(&cfg)
    }

    let protected_limiter = Arc::new(build_limiter(config.rate_protected_per_min));

    cfg.service(
        web::scope(&config.api_prefix)
            // rate limiting; authentication happens per-handler via AuthStaff
            .wrap(protected_limiter)
            .service(
                web::scope("/attendance")
                    .service(web::resource("/clock-in").route(web::post().to(attendance::clock_in)))
                    .service(
                        web::resource("/clock-out").route(web::post().to(attendance::clock_out)),
                    )
                    .service(
                        web::resource("/break/start").route(web::post().to(attendance::break_start)),
                    )
                    .service(
                        web::resource("/break/end").route(web::post().to(attendance::break_end)),
                    )
                    .service(web::resource("/today").route(web::get().to(attendance::today)))
                    .service(
                        web::resource("/stats/overview")
                            .route(web::get().to(attendance::stats_overview)),
                    )
                    .service(
                        web::resource("/summary/{category}/{staff_id}")
                            .route(web::get().to(attendance::summary)),
                    )
                    // /attendance
                    .service(web::resource("").route(web::get().to(attendance::list)))
                    // /attendance/{id}, registered after the fixed paths
                    .service(
                        web::resource("/{id}")
                            .route(web::get().to(attendance::get_record))
                            .route(web::put().to(attendance::amend))
                            .route(web::delete().to(attendance::remove)),
                    ),
            ),
    );
}
