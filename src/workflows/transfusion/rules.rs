use super::domain::PatientContext;
use super::features::{mean_interval_days, DEFAULT_INTERVAL_DAYS};
use chrono::{Duration, NaiveDate};

/// Shortest interval any estimate will schedule.
pub const MIN_INTERVAL_DAYS: f64 = 7.0;

const NO_HISTORY_CONFIDENCE: f64 = 0.5;
const SINGLE_EVENT_CONFIDENCE: f64 = 0.6;
const MEAN_INTERVAL_CONFIDENCE: f64 = 0.75;

/// Hb-adjusted interval estimate that needs no trained model.
#[derive(Debug, Clone, PartialEq)]
pub struct RuleEstimate {
    pub next_date: NaiveDate,
    pub interval_days: i64,
    pub confidence: f64,
    pub explanation: String,
}

/// Adds `days` to `date`, clamping at the last representable calendar day.
fn advance(date: NaiveDate, days: i64) -> NaiveDate {
    Duration::try_days(days)
        .and_then(|offset| date.checked_add_signed(offset))
        .unwrap_or(NaiveDate::MAX)
}

/// Rule-based next transfusion estimate.
///
/// * no history: `currentDate` plus 21 days
/// * one event: 14, 21 or 28 days after it depending on the latest Hb
/// * more: the mean historical interval shifted by three days for low or high Hb
pub fn estimate(context: &PatientContext) -> RuleEstimate {
    let history = context.chronological_history();
    let last_hb = context.last_hb;

    let Some(last) = history.last() else {
        let interval_days = DEFAULT_INTERVAL_DAYS as i64;
        return RuleEstimate {
            next_date: advance(context.current_date, interval_days),
            interval_days,
            confidence: NO_HISTORY_CONFIDENCE,
            explanation: format!(
                "Rule-based prediction: Default {interval_days}-day interval (insufficient history)"
            ),
        };
    };

    match mean_interval_days(&history) {
        None => {
            let interval_days = if last_hb < 8.0 {
                14
            } else if last_hb < 9.0 {
                21
            } else {
                28
            };
            RuleEstimate {
                next_date: advance(last.date, interval_days),
                interval_days,
                confidence: SINGLE_EVENT_CONFIDENCE,
                explanation: format!(
                    "Rule-based prediction: {interval_days}-day interval based on Hb level ({last_hb:.1} g/dL)"
                ),
            }
        }
        Some(mean) => {
            let adjustment = if last_hb < 8.0 {
                -3.0
            } else if last_hb > 10.0 {
                3.0
            } else {
                0.0
            };
            let interval_days = (mean + adjustment).max(MIN_INTERVAL_DAYS).trunc() as i64;
            RuleEstimate {
                next_date: advance(last.date, interval_days),
                interval_days,
                confidence: MEAN_INTERVAL_CONFIDENCE,
                explanation: format!(
                    "Rule-based prediction: {interval_days}-day interval (mean: {mean:.1} days, adjusted for Hb {last_hb:.1} g/dL)"
                ),
            }
        }
    }
}
