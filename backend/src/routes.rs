// src/routes.rs

use axum::{
    Router,
    http::{HeaderValue, Method, header},
    middleware,
    routing::{get, post, put},
};
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::{
    handlers::{analytic, attempt, pack_session},
    state::AppState,
    utils::jwt::auth_middleware,
};

/// Assembles the main application router.
///
/// * Every route sits behind the bearer-token check.
/// * Applies global middleware (Trace, CORS).
pub fn create_router(state: AppState) -> Router {
    let origins = [
        HeaderValue::from_static("http://localhost:3000"),
        HeaderValue::from_static("http://127.0.0.1:3000"),
    ];

    let cors = CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::PUT])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE]);

    let question_routes = Router::new()
        .route("/answer", post(attempt::answer))
        .route("/answer/{id}", get(attempt::get_latest_answer))
        .route("/answers", post(attempt::get_latest_answers))
        .route("/clear-answer", post(attempt::clear_answer))
        .route("/submit-answer", post(attempt::submit_answer))
        .route("/mark", post(attempt::mark))
        .route("/add-remove-mark", put(attempt::add_remove_mark))
        .route("/marks", post(attempt::get_marks));

    let analytic_routes = Router::new()
        .route("/attempt", get(analytic::attempt_summary))
        .route("/point", get(analytic::get_point))
        .route("/point-list", get(analytic::list_points));

    let pack_routes = Router::new()
        .route("/take", post(pack_session::take))
        .route("/finish", post(pack_session::finish))
        .route("/attempt", get(pack_session::list));

    Router::new()
        .nest("/api/question", question_routes)
        .nest("/api/analytic", analytic_routes)
        .nest("/api/question-pack", pack_routes)
        // Unmatched paths still 404 instead of 401.
        .route_layer(middleware::from_fn_with_state(state.clone(), auth_middleware))
        // Global Middleware (applied from outside in)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors),
        )
        .with_state(state)
}
