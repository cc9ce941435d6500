//! Read-side aggregation over the analytics event log
//!
//! Every function here is a pure pass over a slice of events. Callers pass
//! in "today" explicitly so the date window does not depend on the clock.

use std::collections::BTreeMap;

use chrono::{Days, NaiveDate};
use serde::Serialize;

use crate::model::AnalyticEvent;
use crate::rating::{MAX_RATING, MIN_RATING};

/// How many events the dashboard's activity feed shows
pub const RECENT_ACTIVITY_LIMIT: usize = 10;

/// Counts per star value; keys 1 through 5 are always present
pub fn rating_distribution(events: &[AnalyticEvent]) -> BTreeMap<i64, u64> {
    let mut distribution: BTreeMap<i64, u64> =
        (MIN_RATING..=MAX_RATING).map(|star| (star, 0)).collect();

    for rating in events.iter().filter_map(|event| event.rating) {
        if let Some(count) = distribution.get_mut(&rating) {
            *count += 1;
        }
    }

    distribution
}

/// Events per UTC calendar day over the `days` days ending with `today`
///
/// Keys are `YYYY-MM-DD`; every day in the window is present, zero-filled.
pub fn scans_over_time(
    events: &[AnalyticEvent],
    today: NaiveDate,
    days: u32,
) -> BTreeMap<String, u64> {
    let mut counts: BTreeMap<NaiveDate, u64> = (0..u64::from(days))
        .filter_map(|back| today.checked_sub_days(Days::new(back)))
        .map(|date| (date, 0))
        .collect();

    for event in events {
        if let Some(count) = counts.get_mut(&event.scan_date.date_naive()) {
            *count += 1;
        }
    }

    counts
        .into_iter()
        .map(|(date, count)| (date.format("%Y-%m-%d").to_string(), count))
        .collect()
}

#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct Summary {
    pub total_scans: u64,
    pub ratings_submitted: u64,
    pub five_star_ratings: u64,
}

pub fn summarize(events: &[AnalyticEvent]) -> Summary {
    events.iter().fold(Summary::default(), |mut summary, event| {
        summary.total_scans += 1;
        if let Some(rating) = event.rating {
            summary.ratings_submitted += 1;
            if rating == MAX_RATING {
                summary.five_star_ratings += 1;
            }
        }
        summary
    })
}

/// Newest events first, at most [`RECENT_ACTIVITY_LIMIT`]
///
/// Events with the same timestamp are ordered by descending id.
pub fn recent_activity(events: &[AnalyticEvent]) -> Vec<AnalyticEvent> {
    let mut sorted = events.to_vec();
    sorted.sort_by(|a, b| b.scan_date.cmp(&a.scan_date).then(b.id.cmp(&a.id)));
    sorted.truncate(RECENT_ACTIVITY_LIMIT);
    sorted
}

/// Payload of the business dashboard
#[derive(Serialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct Dashboard {
    #[serde(flatten)]
    pub summary: Summary,
    pub rating_distribution: BTreeMap<i64, u64>,
    pub scans_over_time: BTreeMap<String, u64>,
    pub recent_activity: Vec<AnalyticEvent>,
}

pub fn dashboard(events: &[AnalyticEvent], today: NaiveDate, window_days: u32) -> Dashboard {
    Dashboard {
        summary: summarize(events),
        rating_distribution: rating_distribution(events),
        scans_over_time: scans_over_time(events, today, window_days),
        recent_activity: recent_activity(events),
    }
}

#[derive(Serialize, Debug, Clone, Copy, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct UserSummary {
    pub total_scans: u64,
    pub ratings_submitted: u64,
    pub average_rating: f64,
    pub feedback_count: u64,
}

/// Summary over the events attributed to one user
pub fn user_summary(events: &[AnalyticEvent], user_id: u64) -> UserSummary {
    let mut summary = UserSummary::default();
    let mut rating_sum = 0i64;

    for event in events.iter().filter(|event| event.user_id == Some(user_id)) {
        summary.total_scans += 1;
        if let Some(rating) = event.rating {
            summary.ratings_submitted += 1;
            rating_sum += rating;
        }
        if event
            .customer_feedback
            .as_deref()
            .is_some_and(|feedback| !feedback.trim().is_empty())
        {
            summary.feedback_count += 1;
        }
    }

    if summary.ratings_submitted > 0 {
        summary.average_rating = rating_sum as f64 / summary.ratings_submitted as f64;
    }
    summary
}
