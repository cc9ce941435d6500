//! Field checks for the admin forms
//!
//! Each `check_*` returns every issue found rather than stopping at the
//! first, so the dashboard can highlight all offending fields at once.

use url::Url;

use crate::error::Issue;
use crate::model::{BusinessPatch, CreateUserRequest, LinkPatch, QrCodePatch};

pub const MIN_USERNAME_LEN: usize = 3;
pub const MIN_PASSWORD_LEN: usize = 6;
pub const QR_SIZE_RANGE: std::ops::RangeInclusive<u32> = 64..=2048;

fn issues_or_ok(issues: Vec<Issue>) -> Result<(), Vec<Issue>> {
    if issues.is_empty() {
        Ok(())
    } else {
        Err(issues)
    }
}

/// `local@domain.tld`, no whitespace
pub fn is_valid_email(email: &str) -> bool {
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !email.chars().any(char::is_whitespace)
        && !domain.contains('@')
        && domain
            .split_once('.')
            .is_some_and(|(host, tld)| !host.is_empty() && !tld.is_empty() && !tld.ends_with('.'))
}

/// Absolute http(s) URL
pub fn is_valid_url(raw: &str) -> bool {
    Url::parse(raw).is_ok_and(|url| matches!(url.scheme(), "http" | "https") && url.has_host())
}

/// `#RGB` or `#RRGGBB`
pub fn is_hex_color(raw: &str) -> bool {
    raw.strip_prefix('#').is_some_and(|hex| {
        matches!(hex.len(), 3 | 6) && hex.chars().all(|c| c.is_ascii_hexdigit())
    })
}

pub fn check_business(input: &BusinessPatch) -> Result<(), Vec<Issue>> {
    let mut issues = Vec::new();
    if input.name.trim().is_empty() {
        issues.push(Issue::new("name", "Business name is required"));
    }
    for (field, value) in [("logoUrl", &input.logo_url), ("website", &input.website)] {
        if let Some(url) = value.as_ref().and_then(|v| v.as_deref()).filter(|v| !v.is_empty()) {
            if !is_valid_url(url) {
                issues.push(Issue::new(field, "Please enter a valid URL"));
            }
        }
    }
    issues_or_ok(issues)
}

/// Checks only the fields present in the form
pub fn check_qr_code(input: &QrCodePatch) -> Result<(), Vec<Issue>> {
    let mut issues = Vec::new();
    if input.size.is_some_and(|size| !QR_SIZE_RANGE.contains(&size)) {
        issues.push(Issue::new(
            "size",
            format!(
                "Size must be between {} and {}",
                QR_SIZE_RANGE.start(),
                QR_SIZE_RANGE.end()
            ),
        ));
    }
    for (field, value) in [("fgColor", &input.fg_color), ("bgColor", &input.bg_color)] {
        if value.as_deref().is_some_and(|color| !is_hex_color(color)) {
            issues.push(Issue::new(field, "Color must be a hex value like #1A2B3C"));
        }
    }
    issues_or_ok(issues)
}

pub fn check_links(input: &LinkPatch) -> Result<(), Vec<Issue>> {
    let mut issues = Vec::new();
    for (field, value) in [
        ("googleReviewUrl", &input.google_review_url),
        ("feedbackFormUrl", &input.feedback_form_url),
    ] {
        if !is_valid_url(value) {
            issues.push(Issue::new(field, "Please enter a valid URL"));
        }
    }
    issues_or_ok(issues)
}

pub fn check_new_user(input: &CreateUserRequest) -> Result<(), Vec<Issue>> {
    let mut issues = Vec::new();
    if input.username.trim().chars().count() < MIN_USERNAME_LEN {
        issues.push(Issue::new(
            "username",
            format!("Username must be at least {MIN_USERNAME_LEN} characters"),
        ));
    }
    if !is_valid_email(&input.email) {
        issues.push(Issue::new("email", "Please enter a valid email address"));
    }
    if input.password.chars().count() < MIN_PASSWORD_LEN {
        issues.push(Issue::new(
            "password",
            format!("Password must be at least {MIN_PASSWORD_LEN} characters"),
        ));
    }
    issues_or_ok(issues)
}
