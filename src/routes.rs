// src/routes.rs

use axum::{
    Router,
    extract::DefaultBodyLimit,
    http::{HeaderValue, Method, header},
    middleware,
    routing::{get, post},
};
use tower::ServiceBuilder;
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    trace::TraceLayer,
};

use crate::{
    handlers::{auth, generation, question_set, test_history},
    state::AppState,
    utils::jwt::auth_middleware,
};

const FRONTEND_ORIGINS: [&str; 2] = ["http://localhost:3000", "http://127.0.0.1:3000"];

/// Assembles the main application router.
///
/// * Public routes: registration and login.
/// * Everything else sits behind `auth_middleware`.
/// * Global middleware: Trace, CORS.
pub fn create_router(state: AppState) -> Router {
    let origins = FRONTEND_ORIGINS.map(HeaderValue::from_static);

    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST, Method::DELETE])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE]);

    let auth_routes = Router::new()
        .route("/register", post(auth::register))
        .route("/login", post(auth::login))
        .merge(
            Router::new()
                .route("/me", get(auth::me))
                .route_layer(middleware::from_fn_with_state(state.clone(), auth_middleware)),
        );

    let protected_routes = Router::new()
        .route(
            "/generate-questions",
            post(generation::generate_questions)
                .layer(DefaultBodyLimit::max(state.config.max_upload_bytes())),
        )
        .route("/generate-pdf", post(generation::generate_pdf))
        .route(
            "/question-sets",
            post(question_set::create_question_set).get(question_set::list_question_sets),
        )
        .route(
            "/question-sets/{id}",
            get(question_set::get_question_set).delete(question_set::delete_question_set),
        )
        .route(
            "/test-history",
            post(test_history::submit_test).get(test_history::list_test_history),
        )
        .route_layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    Router::new()
        .nest("/api/auth", auth_routes)
        .nest("/api", protected_routes)
        // Global Middleware (applied from outside in)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors),
        )
        .with_state(state)
}
