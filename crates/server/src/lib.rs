pub mod error;
pub mod routes;

use std::sync::Arc;

use axum::Router;
use db::DBService;
use services::services::{config::Config, notification::Notifier};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

#[derive(Clone)]
pub struct AppState {
    pub db: DBService,
    pub notifier: Notifier,
    pub config: Arc<Config>,
}

/// Assemble the full application router.
pub fn app_router(state: AppState) -> Router {
    let api = Router::new()
        .merge(routes::health::router(&state))
        .merge(routes::leads::router(&state))
        .merge(routes::artisans::router(&state))
        .merge(routes::assignments::router(&state))
        .merge(routes::bookings::router(&state))
        .merge(routes::reviews::router(&state))
        .merge(routes::notifications::router(&state))
        .merge(routes::admin::router(&state));

    Router::new()
        .nest("/api", api)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
