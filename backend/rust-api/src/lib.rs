use axum::{
    http::{header, HeaderValue, Method},
    middleware,
    routing::{get, post, put},
    Router,
};
use std::sync::Arc;
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    trace::TraceLayer,
};

pub mod config;
pub mod extractors;
pub mod handlers;
pub mod metrics;
pub mod middlewares;
pub mod models;
pub mod services;
pub mod storage;
pub mod utils;

pub use config::Config;
pub use services::AppState;

fn cors_layer(origins: &[String]) -> CorsLayer {
    let allow_origin = if origins.is_empty() || origins.iter().any(|o| o == "*") {
        AllowOrigin::from(Any)
    } else {
        AllowOrigin::list(
            origins
                .iter()
                .filter_map(|origin| HeaderValue::from_str(origin).ok()),
        )
    };

    CorsLayer::new()
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
        .allow_origin(allow_origin)
}

pub fn create_router(app_state: Arc<AppState>) -> Router {
    let cors = cors_layer(&app_state.config.cors_origins);

    Router::new()
        .route("/", get(handlers::root))
        .route("/health", get(handlers::health_check))
        .route(
            "/metrics",
            get(handlers::metrics_handler)
                .layer(middleware::from_fn(handlers::metrics_auth_middleware)),
        )
        .nest("/api/v1/auth", auth_routes(app_state.clone()))
        .nest("/api/v1/users", user_routes(app_state.clone()))
        .nest("/api/v1/questions", question_routes(app_state.clone()))
        .nest("/api/v1/quiz", quiz_routes(app_state.clone()))
        .nest("/api/v1/analytics", analytics_routes(app_state.clone()))
        .fallback(handlers::not_found)
        .with_state(app_state)
        .layer(cors)
        .layer(middleware::from_fn(
            middlewares::metrics::metrics_middleware,
        ))
        .layer(middleware::from_fn(
            middlewares::trace::trace_context_middleware,
        ))
        .layer(TraceLayer::new_for_http())
}

fn auth_routes(app_state: Arc<AppState>) -> Router<Arc<AppState>> {
    let public_routes = Router::new()
        .route("/register", post(handlers::auth::register))
        .route("/login", post(handlers::auth::login));

    let protected_routes = Router::new()
        .route(
            "/me",
            get(handlers::auth::me).put(handlers::auth::update_me),
        )
        .route("/profile", get(handlers::auth::profile))
        .route("/change-password", post(handlers::auth::change_password))
        .route_layer(middleware::from_fn_with_state(
            app_state,
            middlewares::auth::auth_middleware,
        ));

    public_routes.merge(protected_routes)
}

fn user_routes(app_state: Arc<AppState>) -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(handlers::users::list_users))
        .route("/{id}", get(handlers::users::get_user))
        .route("/{id}/status", put(handlers::users::update_status))
        .route_layer(middleware::from_fn(
            middlewares::auth::admin_guard_middleware,
        ))
        .route_layer(middleware::from_fn_with_state(
            app_state,
            middlewares::auth::auth_middleware,
        ))
}

fn question_routes(app_state: Arc<AppState>) -> Router<Arc<AppState>> {
    let staff_routes = Router::new()
        .route(
            "/",
            get(handlers::questions::list_questions).post(handlers::questions::create_question),
        )
        .route("/stats/count", get(handlers::questions::count_questions))
        .route(
            "/difficulty/{difficulty}",
            get(handlers::questions::questions_by_difficulty),
        )
        .route("/tags", get(handlers::questions::questions_by_tags))
        .route(
            "/{id}",
            get(handlers::questions::get_question)
                .put(handlers::questions::update_question)
                .delete(handlers::questions::delete_question),
        )
        .route_layer(middleware::from_fn(
            middlewares::auth::staff_guard_middleware,
        ));

    let learner_routes = Router::new().route(
        "/{id}/student",
        get(handlers::questions::get_student_question),
    );

    staff_routes
        .merge(learner_routes)
        .route_layer(middleware::from_fn_with_state(
            app_state,
            middlewares::auth::auth_middleware,
        ))
}

fn quiz_routes(app_state: Arc<AppState>) -> Router<Arc<AppState>> {
    Router::new()
        .route("/start", post(handlers::quiz::start_quiz))
        .route("/history", get(handlers::quiz::quiz_history))
        .route("/recommendations", get(handlers::quiz::recommendations))
        .route("/next-difficulty", get(handlers::quiz::next_difficulty))
        .route("/performance", get(handlers::quiz::performance))
        .route("/{id}", get(handlers::quiz::get_quiz))
        .route("/{id}/submit", post(handlers::quiz::submit_quiz))
        .route_layer(middleware::from_fn_with_state(
            app_state,
            middlewares::auth::auth_middleware,
        ))
}

fn analytics_routes(app_state: Arc<AppState>) -> Router<Arc<AppState>> {
    let staff_routes = Router::new()
        .route("/users/{id}", get(handlers::analytics::learner_analytics))
        .route_layer(middleware::from_fn(
            middlewares::auth::staff_guard_middleware,
        ));

    let admin_routes = Router::new()
        .route("/admin", get(handlers::analytics::admin_analytics))
        .route_layer(middleware::from_fn(
            middlewares::auth::admin_guard_middleware,
        ));

    Router::new()
        .route("/me", get(handlers::analytics::my_analytics))
        .merge(staff_routes)
        .merge(admin_routes)
        .route_layer(middleware::from_fn_with_state(
            app_state,
            middlewares::auth::auth_middleware,
        ))
}
