//! Rating-to-destination decision
//!
//! Five stars go to the public review page; anything lower goes to the
//! private feedback form, optionally carrying the rating along as a query
//! parameter.

use serde::Serialize;
use thiserror::Error;

use crate::model::{Destination, Link};

pub const MIN_RATING: i64 = 1;
pub const MAX_RATING: i64 = 5;

#[derive(Debug, Error, PartialEq, Eq)]
#[error("Invalid rating. Must be between 1 and 5.")]
pub struct InvalidRating;

/// Where the customer's browser should go next
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Redirect {
    pub redirect_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prefill_rating: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decision {
    pub redirect: Redirect,
    pub destination: Destination,
}

/// Validates a rating arriving as raw JSON
///
/// Only integral numbers pass; `3.0` is accepted as `3`, `3.5` is not.
pub fn parse_rating(raw: &serde_json::Value) -> Result<i64, InvalidRating> {
    let rating = match raw {
        serde_json::Value::Number(n) => match n.as_i64() {
            Some(v) => v,
            None => n
                .as_f64()
                .filter(|v| v.fract() == 0.0 && v.abs() < i64::MAX as f64)
                .map(|v| v as i64)
                .ok_or(InvalidRating)?,
        },
        _ => return Err(InvalidRating),
    };
    check_range(rating)
}

fn check_range(rating: i64) -> Result<i64, InvalidRating> {
    if (MIN_RATING..=MAX_RATING).contains(&rating) {
        Ok(rating)
    } else {
        Err(InvalidRating)
    }
}

/// Maps a rating onto the business's destination links
pub fn decide(rating: i64, link: &Link) -> Result<Decision, InvalidRating> {
    let rating = check_range(rating)?;

    if rating == MAX_RATING {
        return Ok(Decision {
            redirect: Redirect {
                redirect_url: link.google_review_url.clone(),
                prefill_rating: Some(link.prefill_rating),
            },
            destination: Destination::GoogleReview,
        });
    }

    let mut url = link.feedback_form_url.clone();
    if link.pass_rating {
        let separator = if url.contains('?') { '&' } else { '?' };
        url.push(separator);
        url.push_str("rating=");
        url.push_str(&rating.to_string());
    }

    Ok(Decision {
        redirect: Redirect {
            redirect_url: url,
            prefill_rating: None,
        },
        destination: Destination::FeedbackForm,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn link(feedback: &str, pass_rating: bool, prefill_rating: bool) -> Link {
        Link {
            id: 1,
            business_id: 1,
            google_review_url: "https://g/r1".into(),
            prefill_rating,
            feedback_form_url: feedback.into(),
            pass_rating,
        }
    }

    #[test]
    fn five_stars_go_to_review_regardless_of_pass_rating() {
        for pass in [true, false] {
            for prefill in [true, false] {
                let decision = decide(5, &link("https://f", pass, prefill)).unwrap();
                assert_eq!(decision.redirect.redirect_url, "https://g/r1");
                assert_eq!(decision.redirect.prefill_rating, Some(prefill));
                assert_eq!(decision.destination, Destination::GoogleReview);
            }
        }
    }

    #[test]
    fn low_ratings_append_with_question_mark() {
        for rating in 1..=4 {
            let decision = decide(rating, &link("https://f/form", true, true)).unwrap();
            assert_eq!(
                decision.redirect.redirect_url,
                format!("https://f/form?rating={rating}")
            );
            assert_eq!(decision.destination, Destination::FeedbackForm);
            assert_eq!(decision.redirect.prefill_rating, None);
        }
    }

    #[test]
    fn existing_query_string_uses_ampersand() {
        let decision = decide(3, &link("https://f?x=1", true, true)).unwrap();
        assert_eq!(decision.redirect.redirect_url, "https://f?x=1&rating=3");
    }

    #[test]
    fn pass_rating_off_leaves_url_untouched() {
        let decision = decide(2, &link("https://f?x=1", false, true)).unwrap();
        assert_eq!(decision.redirect.redirect_url, "https://f?x=1");
    }

    #[test]
    fn out_of_range_is_rejected() {
        let l = link("https://f", true, true);
        for rating in [0, 6, -1, i64::MAX] {
            assert_eq!(decide(rating, &l), Err(InvalidRating));
        }
    }

    #[test]
    fn parse_rating_rejects_non_integers() {
        assert_eq!(parse_rating(&json!(4)), Ok(4));
        assert_eq!(parse_rating(&json!(4.0)), Ok(4));
        assert_eq!(parse_rating(&json!(3.5)), Err(InvalidRating));
        assert_eq!(parse_rating(&json!("4")), Err(InvalidRating));
        assert_eq!(parse_rating(&json!(null)), Err(InvalidRating));
        assert_eq!(parse_rating(&json!(0)), Err(InvalidRating));
    }

    #[test]
    fn redirect_omits_prefill_for_feedback() {
        let decision = decide(1, &link("https://f", false, true)).unwrap();
        assert_eq!(json!(decision.redirect), json!({ "redirectUrl": "https://f" }));
    }
}
