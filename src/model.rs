//! Data models for the feedback collector
//!
//! This module defines the five stored entity kinds, the `New*` payloads used
//! to create them (which carry the column defaults) and the `*Patch` payloads
//! merged into existing rows, plus the request/response bodies of the HTTP API.
//!
//! Every type serializes with camelCase field names, matching the JSON the
//! dashboard client sends and expects.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::store::{Entity, EntityKind};

/// Registered account
///
/// The password field holds an Argon2 PHC string. It is stored with the row
/// but never leaves the server: API responses use [`UserView`].
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: u64,
    pub username: String,
    pub email: String,
    pub password: String,
    pub is_admin: bool,
    pub is_active: bool,
    pub activation_code: Option<String>,
}

#[derive(Serialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub password: String,
    pub is_admin: bool,
    pub is_active: bool,
    pub activation_code: Option<String>,
}

/// Partial user update
///
/// `activation_code` is doubly optional: `Some(None)` clears the stored code.
#[derive(Serialize, Debug, Clone, Default)]
#[serde(rename_all = "camelCase")]
pub struct UserPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_admin: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_active: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub activation_code: Option<Option<String>>,
}

impl Entity for User {
    const KIND: EntityKind = EntityKind::User;
    type New = NewUser;
    type Patch = UserPatch;
}

/// Public projection of a [`User`] without the password hash
///
/// The activation code stays visible: only admins list users, and they relay
/// the code to the invitee.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UserView {
    pub id: u64,
    pub username: String,
    pub email: String,
    pub is_admin: bool,
    pub is_active: bool,
    pub activation_code: Option<String>,
}

impl From<User> for UserView {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            username: user.username,
            email: user.email,
            is_admin: user.is_admin,
            is_active: user.is_active,
            activation_code: user.activation_code,
        }
    }
}

/// Business profile, one per user
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Business {
    pub id: u64,
    pub user_id: u64,
    pub name: String,
    pub logo_url: Option<String>,
    pub description: Option<String>,
    pub address: Option<String>,
    pub phone: Option<String>,
    pub website: Option<String>,
}

/// Business profile fields stored on first save
#[derive(Serialize, Debug, Clone, Default)]
#[serde(rename_all = "camelCase")]
pub struct BusinessInput {
    pub name: String,
    pub logo_url: Option<String>,
    pub description: Option<String>,
    pub address: Option<String>,
    pub phone: Option<String>,
    pub website: Option<String>,
}

#[derive(Serialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct NewBusiness {
    pub user_id: u64,
    #[serde(flatten)]
    pub fields: BusinessInput,
}

/// Business profile form as posted by the owner
///
/// `name` is required on every save. The optional columns distinguish an
/// omitted key (`None`, stored value kept) from an explicit `null`
/// (`Some(None)`, stored value cleared).
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
#[serde(rename_all = "camelCase")]
pub struct BusinessPatch {
    #[serde(default)]
    pub name: String,
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub logo_url: Option<Option<String>>,
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub description: Option<Option<String>>,
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub address: Option<Option<String>>,
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub phone: Option<Option<String>>,
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub website: Option<Option<String>>,
}

impl From<BusinessPatch> for BusinessInput {
    fn from(patch: BusinessPatch) -> Self {
        Self {
            name: patch.name,
            logo_url: patch.logo_url.flatten(),
            description: patch.description.flatten(),
            address: patch.address.flatten(),
            phone: patch.phone.flatten(),
            website: patch.website.flatten(),
        }
    }
}

impl Entity for Business {
    const KIND: EntityKind = EntityKind::Business;
    type New = NewBusiness;
    type Patch = BusinessPatch;
}

/// QR symbol error-correction level
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ErrorCorrection {
    L,
    #[default]
    M,
    Q,
    H,
}

/// Styling of a business's QR code
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct QrCode {
    pub id: u64,
    pub business_id: u64,
    pub size: u32,
    pub fg_color: String,
    pub bg_color: String,
    pub error_correction: ErrorCorrection,
    pub logo_enabled: bool,
}

pub const DEFAULT_QR_SIZE: u32 = 300;
pub const DEFAULT_FG_COLOR: &str = "#000000";
pub const DEFAULT_BG_COLOR: &str = "#FFFFFF";

fn default_fg_color() -> String {
    DEFAULT_FG_COLOR.to_string()
}

fn default_bg_color() -> String {
    DEFAULT_BG_COLOR.to_string()
}

/// QR settings stored on first save, defaults filled in
#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct QrCodeInput {
    pub size: u32,
    pub fg_color: String,
    pub bg_color: String,
    pub error_correction: ErrorCorrection,
    pub logo_enabled: bool,
}

impl Default for QrCodeInput {
    fn default() -> Self {
        Self {
            size: DEFAULT_QR_SIZE,
            fg_color: default_fg_color(),
            bg_color: default_bg_color(),
            error_correction: ErrorCorrection::default(),
            logo_enabled: true,
        }
    }
}

#[derive(Serialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct NewQrCode {
    pub business_id: u64,
    #[serde(flatten)]
    pub fields: QrCodeInput,
}

/// QR settings form as posted by the owner
///
/// Every field is optional: omitted (or `null`) fields keep the stored value
/// on update and take the defaults on first save. `size` is accepted as a
/// number or a numeric string since the settings form posts it from a text
/// input.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct QrCodePatch {
    #[serde(
        default,
        deserialize_with = "number_or_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub size: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fg_color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bg_color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_correction: Option<ErrorCorrection>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logo_enabled: Option<bool>,
}

impl From<QrCodePatch> for QrCodeInput {
    fn from(patch: QrCodePatch) -> Self {
        Self {
            size: patch.size.unwrap_or(DEFAULT_QR_SIZE),
            fg_color: patch.fg_color.unwrap_or_else(default_fg_color),
            bg_color: patch.bg_color.unwrap_or_else(default_bg_color),
            error_correction: patch.error_correction.unwrap_or_default(),
            logo_enabled: patch.logo_enabled.unwrap_or(true),
        }
    }
}

impl Entity for QrCode {
    const KIND: EntityKind = EntityKind::QrCode;
    type New = NewQrCode;
    type Patch = QrCodePatch;
}

/// Destination pair a rating resolves to
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Link {
    pub id: u64,
    pub business_id: u64,
    pub google_review_url: String,
    pub prefill_rating: bool,
    pub feedback_form_url: String,
    pub pass_rating: bool,
}

/// Destination links stored on first save
#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LinkInput {
    pub google_review_url: String,
    pub prefill_rating: bool,
    pub feedback_form_url: String,
    pub pass_rating: bool,
}

#[derive(Serialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct NewLink {
    pub business_id: u64,
    #[serde(flatten)]
    pub fields: LinkInput,
}

/// Links form as posted by the owner
///
/// Both URLs are required on every save; the two flags keep their stored
/// value when omitted and default to on at creation.
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
#[serde(rename_all = "camelCase")]
pub struct LinkPatch {
    #[serde(default)]
    pub google_review_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prefill_rating: Option<bool>,
    #[serde(default)]
    pub feedback_form_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pass_rating: Option<bool>,
}

impl From<LinkPatch> for LinkInput {
    fn from(patch: LinkPatch) -> Self {
        Self {
            google_review_url: patch.google_review_url,
            prefill_rating: patch.prefill_rating.unwrap_or(true),
            feedback_form_url: patch.feedback_form_url,
            pass_rating: patch.pass_rating.unwrap_or(true),
        }
    }
}

impl Entity for Link {
    const KIND: EntityKind = EntityKind::Link;
    type New = NewLink;
    type Patch = LinkPatch;
}

/// Where a rating sent the customer
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Destination {
    GoogleReview,
    FeedbackForm,
}

/// One immutable row of the scan/rating log
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AnalyticEvent {
    pub id: u64,
    pub business_id: u64,
    pub qr_code_id: u64,
    pub user_id: Option<u64>,
    pub scan_date: DateTime<Utc>,
    pub rating: Option<i64>,
    pub destination: Option<Destination>,
    pub customer_email: Option<String>,
    pub customer_feedback: Option<String>,
    pub location: Option<String>,
    pub device_type: Option<String>,
}

#[derive(Serialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct NewAnalyticEvent {
    pub business_id: u64,
    pub qr_code_id: u64,
    pub user_id: Option<u64>,
    pub scan_date: DateTime<Utc>,
    pub rating: Option<i64>,
    pub destination: Option<Destination>,
    pub customer_email: Option<String>,
    pub customer_feedback: Option<String>,
    pub location: Option<String>,
    pub device_type: Option<String>,
}

impl NewAnalyticEvent {
    /// A bare scan: no rating, no destination, stamped now
    pub fn scan(business_id: u64, qr_code_id: u64) -> Self {
        Self {
            business_id,
            qr_code_id,
            user_id: None,
            scan_date: Utc::now(),
            rating: None,
            destination: None,
            customer_email: None,
            customer_feedback: None,
            location: None,
            device_type: None,
        }
    }
}

/// Events are append-only; the empty patch type makes updates a no-op merge.
#[derive(Serialize, Debug, Clone, Default)]
pub struct NoPatch {}

impl Entity for AnalyticEvent {
    const KIND: EntityKind = EntityKind::AnalyticEvent;
    type New = NewAnalyticEvent;
    type Patch = NoPatch;
}

/// Request payload for logging in
#[derive(Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

/// Response returned after a successful login
///
/// The token goes into `Authorization: Bearer <token>` on later requests.
#[derive(Serialize, Deserialize, Debug)]
pub struct LoginResponse {
    pub token: String,
    pub user: UserView,
}

/// Request payload for creating (inviting) a user
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateUserRequest {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub is_admin: bool,
}

/// Admin toggles on an existing user
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateUserRequest {
    pub is_active: Option<bool>,
    pub is_admin: Option<bool>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivateRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub activation_code: String,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct ActivateResponse {
    pub success: bool,
    pub message: String,
}

/// Customer rating submission
///
/// `rating` is taken as raw JSON so that fractional or out-of-range values
/// reach the decision rule and come back as a 400 rather than a parse error.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RatingRequest {
    #[serde(default)]
    pub rating: serde_json::Value,
    pub customer_email: Option<String>,
    pub customer_feedback: Option<String>,
}

/// Payload of the public rating page
#[derive(Serialize, Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct RatingPage {
    pub business: Business,
    pub qr_code: QrCode,
}

/// Maps a present key (even `null`) to `Some`, so a missing key stays `None`
fn present<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: serde::Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

fn number_or_string<'de, D>(deserializer: D) -> Result<Option<u32>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Number(u32),
        Text(String),
    }

    match Option::<Raw>::deserialize(deserializer)? {
        None => Ok(None),
        Some(Raw::Number(n)) => Ok(Some(n)),
        Some(Raw::Text(s)) => s.trim().parse().map(Some).map_err(serde::de::Error::custom),
    }
}
