//! HTTP request handlers
//!
//! Handlers are grouped by audience:
//! - session handlers for the business owner's dashboard
//! - public handlers behind the printed QR code and the activation page
//! - admin handlers for inviting and managing accounts

use axum::{
    extract::{Path, State},
    http::{header::USER_AGENT, HeaderMap, StatusCode},
    response::IntoResponse,
    Extension, Json,
};
use chrono::Utc;
use tracing::{debug, info, warn};

use crate::activation::{self, generate_activation_code};
use crate::analytics;
use crate::auth::{hash_password, verify_password};
use crate::database::AppState;
use crate::error::{ApiJson, AppError};
use crate::middleware::Principal;
use crate::model::{
    ActivateRequest, ActivateResponse, AnalyticEvent, Business, BusinessPatch, CreateUserRequest,
    Link, LinkPatch, LoginRequest, LoginResponse, NewAnalyticEvent, NewBusiness, NewLink,
    NewQrCode, NewUser, QrCode, QrCodePatch, RatingPage, RatingRequest, UpdateUserRequest, User,
    UserPatch, UserView,
};
use crate::rating::{decide, parse_rating};
use crate::validation;

/// Looks up the business owned by the logged-in user
fn owned_business(state: &AppState, user_id: u64) -> Result<Business, AppError> {
    state
        .db
        .get_by_foreign_key::<Business>("userId", user_id)?
        .ok_or(AppError::NotFound("Business not found"))
}

fn parse_id(raw: &str, message: &'static str) -> Result<u64, AppError> {
    raw.trim()
        .parse()
        .map_err(|_| AppError::Validation(message.to_string()))
}

/// Coarse device class from the `User-Agent` header
///
/// Android phones advertise `Mobi`; an Android agent without it is a tablet.
pub fn device_type(headers: &HeaderMap) -> Option<String> {
    let agent = headers.get(USER_AGENT)?.to_str().ok()?;
    let is_mobi = agent.contains("Mobi");
    let class = if agent.contains("iPad")
        || agent.contains("Tablet")
        || (agent.contains("Android") && !is_mobi)
    {
        "tablet"
    } else if is_mobi || agent.contains("iPhone") {
        "mobile"
    } else {
        "desktop"
    };
    Some(class.to_string())
}

/// Logs a user in
///
/// # Response
///
/// - **200 OK** - `{ token, user }`
/// - **401 Unauthorized** - Unknown username or wrong password
/// - **403 Forbidden** - Account exists but has not been activated
pub async fn login(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<LoginRequest>,
) -> Result<impl IntoResponse, AppError> {
    let user = state
        .db
        .get_by_foreign_key::<User>("username", payload.username.as_str())?;

    let Some(user) = user else {
        warn!(username = %payload.username, "login for unknown user");
        return Err(AppError::Unauthorized);
    };
    if !verify_password(&payload.password, &user.password)? {
        warn!(user_id = user.id, "login with wrong password");
        return Err(AppError::Unauthorized);
    }
    if !user.is_active {
        return Err(AppError::Forbidden("Account is not active"));
    }

    let token = state.sessions.create(user.id);
    info!(user_id = user.id, "user logged in");

    Ok(Json(LoginResponse {
        token,
        user: user.into(),
    }))
}

/// Ends the caller's session
pub async fn logout(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
) -> StatusCode {
    state.sessions.revoke(&principal.token);
    StatusCode::NO_CONTENT
}

/// Returns the logged-in user
pub async fn current_user(Extension(principal): Extension<Principal>) -> Json<UserView> {
    Json(principal.user.into())
}

/// Returns the caller's business profile
///
/// - **404 Not Found** - No profile saved yet
pub async fn get_business(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
) -> Result<Json<Business>, AppError> {
    owned_business(&state, principal.user.id).map(Json)
}

/// Creates the caller's business profile, or merges the posted fields into it
///
/// Optional fields left out of the body keep their stored value; `null`
/// clears them.
///
/// - **201 Created** - First save
/// - **200 OK** - Existing profile updated
/// - **400 Bad Request** - JSON issue list
pub async fn save_business(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    ApiJson(input): ApiJson<BusinessPatch>,
) -> Result<impl IntoResponse, AppError> {
    validation::check_business(&input).map_err(AppError::Invalid)?;

    let existing = state
        .db
        .get_by_foreign_key::<Business>("userId", principal.user.id)?;

    match existing {
        Some(business) => {
            let updated = state
                .db
                .update::<Business>(business.id, &input)?
                .ok_or(AppError::NotFound("Business not found"))?;
            Ok((StatusCode::OK, Json(updated)))
        }
        None => {
            let business = state.db.create::<Business>(NewBusiness {
                user_id: principal.user.id,
                fields: input.into(),
            })?;
            info!(business_id = business.id, user_id = principal.user.id, "business created");
            Ok((StatusCode::CREATED, Json(business)))
        }
    }
}

/// Returns the QR code settings of the caller's business
///
/// - **200 OK** - The QR code
/// - **404 Not Found** - No business profile, or no settings saved yet
pub async fn get_qr_code(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
) -> Result<Json<QrCode>, AppError> {
    let business = owned_business(&state, principal.user.id)?;
    state
        .db
        .get_by_foreign_key::<QrCode>("businessId", business.id)?
        .map(Json)
        .ok_or(AppError::NotFound("QR code not found"))
}

/// Creates or updates the QR code settings
///
/// On first save omitted fields take the defaults (300px, black on white,
/// level M, logo on). Later saves keep the stored value of omitted fields.
///
/// - **201 Created** - First save
/// - **200 OK** - Existing settings updated
/// - **400 Bad Request** - JSON issue list (size outside 64..=2048, bad color)
/// - **404 Not Found** - No business profile
pub async fn save_qr_code(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    ApiJson(input): ApiJson<QrCodePatch>,
) -> Result<impl IntoResponse, AppError> {
    let business = owned_business(&state, principal.user.id)?;
    validation::check_qr_code(&input).map_err(AppError::Invalid)?;

    match state
        .db
        .get_by_foreign_key::<QrCode>("businessId", business.id)?
    {
        Some(qr_code) => {
            let updated = state
                .db
                .update::<QrCode>(qr_code.id, &input)?
                .ok_or(AppError::NotFound("QR code not found"))?;
            Ok((StatusCode::OK, Json(updated)))
        }
        None => {
            let qr_code = state.db.create::<QrCode>(NewQrCode {
                business_id: business.id,
                fields: input.into(),
            })?;
            info!(qr_code_id = qr_code.id, business_id = business.id, "qr code created");
            Ok((StatusCode::CREATED, Json(qr_code)))
        }
    }
}

/// Returns the destination links of the caller's business
///
/// - **200 OK** - The links
/// - **404 Not Found** - No business profile, or no links saved yet
pub async fn get_links(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
) -> Result<Json<Link>, AppError> {
    let business = owned_business(&state, principal.user.id)?;
    state
        .db
        .get_by_foreign_key::<Link>("businessId", business.id)?
        .map(Json)
        .ok_or(AppError::NotFound("Links not found"))
}

/// Creates or updates the destination links
///
/// - **201 Created** - First save
/// - **200 OK** - Existing links updated
/// - **400 Bad Request** - JSON issue list (either URL missing or not http(s))
/// - **404 Not Found** - No business profile
pub async fn save_links(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    ApiJson(input): ApiJson<LinkPatch>,
) -> Result<impl IntoResponse, AppError> {
    let business = owned_business(&state, principal.user.id)?;
    validation::check_links(&input).map_err(AppError::Invalid)?;

    match state
        .db
        .get_by_foreign_key::<Link>("businessId", business.id)?
    {
        Some(link) => {
            let updated = state
                .db
                .update::<Link>(link.id, &input)?
                .ok_or(AppError::NotFound("Links not found"))?;
            Ok((StatusCode::OK, Json(updated)))
        }
        None => {
            let link = state.db.create::<Link>(NewLink {
                business_id: business.id,
                fields: input.into(),
            })?;
            Ok((StatusCode::CREATED, Json(link)))
        }
    }
}

/// Dashboard numbers for the caller's business
///
/// # Response
///
/// ```json
/// {
///   "totalScans": 3,
///   "ratingsSubmitted": 1,
///   "fiveStarRatings": 0,
///   "ratingDistribution": { "1": 0, "2": 0, "3": 0, "4": 1, "5": 0 },
///   "scansOverTime": { "2026-03-01": 0, "...": 0, "2026-03-07": 3 },
///   "recentActivity": [...]
/// }
/// ```
pub async fn get_analytics(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
) -> Result<Json<analytics::Dashboard>, AppError> {
    let business = owned_business(&state, principal.user.id)?;
    let events = state
        .db
        .filter_by_foreign_key::<AnalyticEvent>("businessId", business.id)?;

    Ok(Json(analytics::dashboard(
        &events,
        Utc::now().date_naive(),
        state.analytics_window_days,
    )))
}

/// Summary of the events attributed to the logged-in user
pub async fn get_user_analytics(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
) -> Result<Json<analytics::UserSummary>, AppError> {
    let events = state
        .db
        .filter_by_foreign_key::<AnalyticEvent>("userId", principal.user.id)?;
    Ok(Json(analytics::user_summary(&events, principal.user.id)))
}

/// Loads a QR code and the business it belongs to
fn scanned_qr_code(state: &AppState, qr_code_id: u64) -> Result<(QrCode, Business), AppError> {
    let qr_code = state
        .db
        .get::<QrCode>(qr_code_id)?
        .ok_or(AppError::NotFound("QR code not found"))?;
    let business = state
        .db
        .get::<Business>(qr_code.business_id)?
        .ok_or(AppError::NotFound("Business not found"))?;
    Ok((qr_code, business))
}

/// Public landing page of a scanned QR code
///
/// Records an unrated scan event, then returns the business and QR code.
///
/// - **400 Bad Request** - Non-numeric id
/// - **404 Not Found** - Unknown QR code (nothing is recorded)
pub async fn rating_page(
    Path(qr_code_id): Path<String>,
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<RatingPage>, AppError> {
    let qr_code_id = parse_id(&qr_code_id, "Invalid QR code ID")?;
    let (qr_code, business) = scanned_qr_code(&state, qr_code_id)?;

    let mut scan = NewAnalyticEvent::scan(business.id, qr_code.id);
    scan.user_id = Some(business.user_id);
    scan.device_type = device_type(&headers);
    let event = state.db.create::<AnalyticEvent>(scan)?;
    debug!(event_id = event.id, qr_code_id, "scan recorded");

    Ok(Json(RatingPage { business, qr_code }))
}

/// Customer submits a star rating
///
/// The rating is checked before anything is looked up, and the event is
/// written only once a destination has been decided.
///
/// - **200 OK** - `{ redirectUrl }`, plus `prefillRating` for five stars
/// - **400 Bad Request** - Non-numeric id or rating outside 1..=5
/// - **404 Not Found** - Unknown QR code, business or links
pub async fn submit_rating(
    Path(qr_code_id): Path<String>,
    State(state): State<AppState>,
    headers: HeaderMap,
    ApiJson(payload): ApiJson<RatingRequest>,
) -> Result<impl IntoResponse, AppError> {
    let qr_code_id = parse_id(&qr_code_id, "Invalid QR code ID")?;
    let rating = parse_rating(&payload.rating)?;

    let (qr_code, business) = scanned_qr_code(&state, qr_code_id)?;
    let link = state
        .db
        .get_by_foreign_key::<Link>("businessId", business.id)?
        .ok_or(AppError::NotFound("Links not found"))?;

    let decision = decide(rating, &link)?;

    let event = state.db.create::<AnalyticEvent>(NewAnalyticEvent {
        business_id: business.id,
        qr_code_id: qr_code.id,
        user_id: Some(business.user_id),
        scan_date: Utc::now(),
        rating: Some(rating),
        destination: Some(decision.destination),
        customer_email: payload.customer_email.filter(|v| !v.trim().is_empty()),
        customer_feedback: payload.customer_feedback.filter(|v| !v.trim().is_empty()),
        location: None,
        device_type: device_type(&headers),
    })?;
    debug!(event_id = event.id, qr_code_id, rating, "rating recorded");

    Ok(Json(decision.redirect))
}

/// Activates an invited account
///
/// - **200 OK** - `{ success: true, message }`
/// - **400 Bad Request** - Email unknown or code wrong / already used
pub async fn activate_account(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<ActivateRequest>,
) -> Result<Json<ActivateResponse>, AppError> {
    activation::activate(&state.db, payload.email.trim(), payload.activation_code.trim())?;

    Ok(Json(ActivateResponse {
        success: true,
        message: "Account activated successfully".to_string(),
    }))
}

/// Lists every account
pub async fn list_users(State(state): State<AppState>) -> Result<Json<Vec<UserView>>, AppError> {
    let users = state.db.all::<User>()?;
    Ok(Json(users.into_iter().map(UserView::from).collect()))
}

/// Invites a new user
///
/// The account starts inactive with a fresh activation code, which is part
/// of the response so the admin can pass it on.
///
/// - **201 Created** - The new user
/// - **400 Bad Request** - Issue list, or duplicate username/email
pub async fn create_user(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<CreateUserRequest>,
) -> Result<impl IntoResponse, AppError> {
    validation::check_new_user(&payload).map_err(AppError::Invalid)?;

    let username = payload.username.trim().to_string();
    let email = payload.email.trim().to_string();

    if state
        .db
        .get_by_foreign_key::<User>("username", username.as_str())?
        .is_some()
    {
        return Err(AppError::Validation("Username already exists".to_string()));
    }
    if state
        .db
        .get_by_foreign_key::<User>("email", email.as_str())?
        .is_some()
    {
        return Err(AppError::Validation("Email already exists".to_string()));
    }

    let user = state.db.create::<User>(NewUser {
        username,
        email,
        password: hash_password(&payload.password)?,
        is_admin: payload.is_admin,
        is_active: false,
        activation_code: Some(generate_activation_code()),
    })?;
    info!(user_id = user.id, username = %user.username, "user invited");

    Ok((StatusCode::CREATED, Json(UserView::from(user))))
}

/// Toggles a user's active/admin flags
///
/// Deactivating a user also ends their sessions.
pub async fn update_user(
    Path(id): Path<String>,
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<UpdateUserRequest>,
) -> Result<Json<UserView>, AppError> {
    let id = parse_id(&id, "Invalid user ID")?;
    let patch = UserPatch {
        is_active: payload.is_active,
        is_admin: payload.is_admin,
        ..Default::default()
    };

    let user = state
        .db
        .update::<User>(id, &patch)?
        .ok_or(AppError::NotFound("User not found"))?;

    if !user.is_active {
        let revoked = state.sessions.revoke_user(user.id);
        debug!(user_id = user.id, revoked, "sessions revoked");
    }
    info!(user_id = user.id, is_active = user.is_active, is_admin = user.is_admin, "user updated");

    Ok(Json(user.into()))
}

/// Issues a fresh activation code and deactivates the account
///
/// # Response
///
/// ```json
/// { "userId": 2, "username": "owner", "email": "owner@example.com", "activationCode": "x7Kp2QaZ" }
/// ```
pub async fn reset_user_code(
    Path(id): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<activation::IssuedCode>, AppError> {
    let id = parse_id(&id, "Invalid user ID")?;
    let issued = activation::reset_activation_code(&state.db, id)?;
    state.sessions.revoke_user(issued.user_id);
    Ok(Json(issued))
}
