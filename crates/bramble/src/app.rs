use std::time::Duration;

use axum::{
    http::{header, HeaderName, HeaderValue, Method, StatusCode},
    routing::{get, post},
    Router,
};
use tower_http::{cors::CorsLayer, timeout::TimeoutLayer, trace::TraceLayer};

use crate::handlers::{
    auth::{poll_handoff, poll_oauth, redeem_handoff, store_handoff},
    common::{DEV_HEADER, EXTENSION_HEADER, SERVICE_HEADER, TOKEN_HEADER},
    error_report::report_error,
    files::{download_file, upload_file},
    google_auth::relay_google_auth,
    graphs::count_graph,
    payment_methods::{
        create_payment_method, delete_payment_method, list_payment_methods,
        set_default_payment_method,
    },
    price::get_price,
    query::run_query,
    request_path::get_request_path,
    stripe_account::manage_stripe_account,
    subscriptions::{cancel_subscription, create_subscription, finish_subscription, meter_usage},
    tokens::{check_token, create_token},
    users::{get_user, init_user, lookup_users, update_user},
};
use crate::state::AppState;

/// Create the application router with all routes and middleware.
pub fn create_app(state: AppState) -> Router {
    // Browser calls come from the editor's origin; everything else is
    // server to server and bypasses CORS anyway.
    let origin = state
        .config
        .cors_origin
        .parse::<HeaderValue>()
        .unwrap_or_else(|_| HeaderValue::from_static("https://thicket.app"));
    let cors = CorsLayer::new()
        .allow_origin(origin)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([
            header::AUTHORIZATION,
            header::CONTENT_TYPE,
            HeaderName::from_static(DEV_HEADER),
            HeaderName::from_static(EXTENSION_HEADER),
            HeaderName::from_static(SERVICE_HEADER),
            HeaderName::from_static(TOKEN_HEADER),
        ]);

    Router::new()
        .route(
            "/auth",
            get(poll_handoff).post(redeem_handoff).put(store_handoff),
        )
        .route("/oauth", get(poll_oauth))
        .route("/check", get(check_token))
        .route("/token", post(create_token))
        .route("/users", get(lookup_users))
        .route("/user", get(get_user).post(init_user).put(update_user))
        .route("/price", get(get_price))
        .route(
            "/payment-methods",
            get(list_payment_methods)
                .post(create_payment_method)
                .put(set_default_payment_method)
                .delete(delete_payment_method),
        )
        .route("/subscribe", post(create_subscription))
        .route("/unsubscribe", post(cancel_subscription))
        .route("/finish-subscription", post(finish_subscription))
        .route("/meter", post(meter_usage))
        .route("/stripe-account", post(manage_stripe_account))
        .route("/file", get(download_file).put(upload_file))
        .route("/graphs", post(count_graph))
        .route("/query", post(run_query))
        .route("/request-path", get(get_request_path))
        .route("/error", post(report_error))
        .route("/google-auth", post(relay_google_auth))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            Duration::from_secs(10),
        ))
        .with_state(state)
}
