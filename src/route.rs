//! Route definitions for the feedback API
//!
//! Routes come in three groups that differ only in the gate in front of them.

use axum::routing::{get, patch, post};
use axum::{middleware, Router};

use crate::database::AppState;
use crate::handler::{
    activate_account, create_user, current_user, get_analytics, get_business, get_links,
    get_qr_code, get_user_analytics, list_users, login, logout, rating_page, reset_user_code,
    save_business, save_links, save_qr_code, submit_rating, update_user,
};
use crate::middleware::{require_admin, require_authenticated};

/// Creates and configures the application router
///
/// # Route Definitions
///
/// Public:
/// - `POST /api/login`, `POST /api/activate`
/// - `GET|POST /api/rating/{qr_code_id}` - customer scan and rating
///
/// Session (bearer token):
/// - `POST /api/logout`, `GET /api/user`, `GET /api/user/analytics`
/// - `GET|POST /api/business`, `/api/qrcode`, `/api/links`
/// - `GET /api/analytics`
///
/// Admin:
/// - `GET|POST /api/users`, `PATCH /api/users/{id}`, `POST /api/users/{id}/reset-code`
///
/// # Example Usage
///
/// ```no_run
/// # use rateflow::auth::SessionStore;
/// # use rateflow::database::AppState;
/// # use rateflow::route::create_app;
/// # use rateflow::store::Repository;
/// let state = AppState::new(Repository::in_memory(), SessionStore::default(), 7);
/// let app = create_app(state);
/// // axum::serve(listener, app).await.unwrap();
/// ```
pub fn create_app(state: AppState) -> Router {
    let public_routes = Router::new()
        .route("/login", post(login))
        .route("/activate", post(activate_account))
        .route("/rating/{qr_code_id}", get(rating_page).post(submit_rating));

    let session_routes = Router::new()
        .route("/logout", post(logout))
        .route("/user", get(current_user))
        .route("/user/analytics", get(get_user_analytics))
        .route("/business", get(get_business).post(save_business))
        .route("/qrcode", get(get_qr_code).post(save_qr_code))
        .route("/links", get(get_links).post(save_links))
        .route("/analytics", get(get_analytics))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            require_authenticated,
        ));

    // Layers wrap outside-in: authentication runs first, then the admin check.
    let admin_routes = Router::new()
        .route("/users", get(list_users).post(create_user))
        .route("/users/{id}", patch(update_user))
        .route("/users/{id}/reset-code", post(reset_user_code))
        .route_layer(middleware::from_fn(require_admin))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            require_authenticated,
        ));

    let api_routes = Router::new()
        .merge(public_routes)
        .merge(session_routes)
        .merge(admin_routes);

    Router::new().nest("/api", api_routes).with_state(state)
}
