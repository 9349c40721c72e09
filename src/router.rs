use std::sync::Arc;

use axum::{Router, routing::post};

use crate::{
    AppState,
    middleware::{RateLimiter, log_errors, rate_limit},
    routes,
};

/// 生成接口走限流闸门，批改接口直接放行
pub fn app_router(state: AppState, rate_limiter: Arc<RateLimiter>) -> Router {
    let limited_routes = Router::new()
        .route("/generate-choukai", post(routes::exercise::generate_choukai))
        .layer(axum::middleware::from_fn_with_state(
            rate_limiter,
            rate_limit,
        ));

    let open_routes = Router::new().route("/check-answer", post(routes::exercise::check_answer));

    let router = Router::new().nest(
        &state.config.api_base_uri,
        Router::new().merge(limited_routes).merge(open_routes),
    );

    // 添加日志中间件
    let router = router.layer(axum::middleware::from_fn(log_errors));

    // 根据编译模式决定是否添加CORS
    #[cfg(debug_assertions)]
    let router = {
        tracing::debug!("Adding CORS layer for development mode");
        router.layer(tower_http::cors::CorsLayer::permissive())
    };

    router.with_state(state)
}
