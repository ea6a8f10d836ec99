//! Rain evaluation over the next 24 hours of a forecast.

use std::collections::BTreeSet;

use chrono::{DateTime, Duration, FixedOffset, Utc};
use serde::{Deserialize, Serialize};

use crate::model::{Condition, Forecast, ForecastEntry, RainAssessment};

const JST_OFFSET_SECS: i32 = 9 * 60 * 60;

/// Japan Standard Time, the zone all labels and "today" are computed in.
pub fn jst() -> FixedOffset {
    FixedOffset::east_opt(JST_OFFSET_SECS).expect("UTC+9 is a valid offset")
}

pub fn now_jst() -> DateTime<FixedOffset> {
    Utc::now().with_timezone(&jst())
}

/// Strings that mark a condition as rain. Matching is exact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RainIndicators {
    /// Matched against [`Condition::category`].
    pub categories: BTreeSet<String>,
    /// Matched against [`Condition::description`].
    pub descriptions: BTreeSet<String>,
}

impl Default for RainIndicators {
    fn default() -> Self {
        Self {
            categories: ["Rain", "雨"].into_iter().map(String::from).collect(),
            descriptions: ["雨", "小雨", "強い雨"].into_iter().map(String::from).collect(),
        }
    }
}

impl RainIndicators {
    pub fn is_rain(&self, condition: &Condition) -> bool {
        self.categories.contains(&condition.category)
            || self.descriptions.contains(&condition.description)
    }

    pub fn entry_is_rain(&self, entry: &ForecastEntry) -> bool {
        entry.conditions.iter().any(|c| self.is_rain(c))
    }
}

/// Entries strictly inside `(now, now + 24h)`, in forecast order.
pub fn upcoming_entries<'a>(
    forecast: &'a Forecast,
    now: DateTime<FixedOffset>,
) -> impl Iterator<Item = &'a ForecastEntry> + 'a {
    let start = now.with_timezone(&Utc);
    let horizon = start + Duration::hours(24);

    forecast
        .entries
        .iter()
        .filter(move |e| e.timestamp > start && e.timestamp < horizon)
}

/// `MM/DD HH:MM` in JST.
pub fn slot_label(timestamp: DateTime<Utc>) -> String {
    timestamp.with_timezone(&jst()).format("%m/%d %H:%M").to_string()
}

/// Decide whether an umbrella is needed in the 24 hours after `now`.
pub fn need_umbrella(
    forecast: &Forecast,
    now: DateTime<FixedOffset>,
    indicators: &RainIndicators,
) -> RainAssessment {
    let matching_timestamps: Vec<String> = upcoming_entries(forecast, now)
        .filter(|e| indicators.entry_is_rain(e))
        .map(|e| slot_label(e.timestamp))
        .collect();

    let needs_umbrella = !matching_timestamps.is_empty();
    let message = needs_umbrella.then(|| {
        let today = now.with_timezone(&jst()).format("%Y-%m-%d");
        format!(
            "本日({today})は以下の時間帯で雨の予報があります: [{}]",
            matching_timestamps.join(" ")
        )
    });

    RainAssessment {
        needs_umbrella,
        matching_timestamps,
        message,
    }
}
