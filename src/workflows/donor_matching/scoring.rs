//! Pure factor scorers. Every function returns a value in `[0, 1]`.

use super::domain::BloodType;
use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, Utc};

pub const EXACT_MATCH: f64 = 1.0;
pub const COMPATIBLE_MATCH: f64 = 0.8;
pub const INCOMPATIBLE: f64 = 0.0;

pub const SAME_CITY: f64 = 1.0;
pub const SAME_STATE: f64 = 0.7;
pub const DIFFERENT_STATE: f64 = 0.3;

const EMERGENCY_AVAILABLE: f64 = 0.4;
const ROUTINE_ONLY: f64 = 0.1;
const ELIGIBLE_NOW: f64 = 0.6;
const PRIOR_DONOR_WITHOUT_SCHEDULE: f64 = 0.5;

const NEW_DONOR_PRIOR: f64 = 0.5;
const DONATIONS_FOR_FULL_SCORE: f64 = 10.0;

/// Scores how well a donor group serves the requested group.
///
/// Unknown symbols on either side score as incompatible.
pub fn blood_type_match(requested: &str, donor: &str) -> f64 {
    let (Some(requested), Some(donor)) = (BloodType::parse(requested), BloodType::parse(donor))
    else {
        return INCOMPATIBLE;
    };

    if !donor.can_donate_to(requested) {
        INCOMPATIBLE
    } else if requested == donor {
        EXACT_MATCH
    } else {
        COMPATIBLE_MATCH
    }
}

/// Exact, case-insensitive city/state comparison.
pub fn location_proximity(
    requested_city: &str,
    requested_state: &str,
    donor_city: &str,
    donor_state: &str,
) -> f64 {
    let same_state = normalize(requested_state) == normalize(donor_state);
    let same_city = normalize(requested_city) == normalize(donor_city);

    if same_state && same_city {
        SAME_CITY
    } else if same_state {
        SAME_STATE
    } else {
        DIFFERENT_STATE
    }
}

fn normalize(value: &str) -> String {
    value.trim().to_lowercase()
}

/// Combines the emergency flag with how soon the donor becomes eligible again.
///
/// An eligibility date that cannot be parsed is treated as "eligible now".
pub fn availability(
    available_for_emergency: bool,
    next_eligible_date: Option<&str>,
    last_donation_date: Option<&str>,
    now: DateTime<Utc>,
) -> f64 {
    let base = if available_for_emergency {
        EMERGENCY_AVAILABLE
    } else {
        ROUTINE_ONLY
    };

    let next_eligible_date = next_eligible_date.filter(|value| !value.trim().is_empty());
    let last_donation_date = last_donation_date.filter(|value| !value.trim().is_empty());

    let eligibility = match (next_eligible_date, last_donation_date) {
        (Some(raw), _) => match parse_instant(raw) {
            Some(eligible_at) => eligibility_from_wait(eligible_at, now),
            None => {
                tracing::debug!(value = raw, "unparseable eligibility date treated as eligible");
                ELIGIBLE_NOW
            }
        },
        (None, None) => ELIGIBLE_NOW,
        (None, Some(_)) => PRIOR_DONOR_WITHOUT_SCHEDULE,
    };

    (base + eligibility).clamp(0.0, 1.0)
}

fn eligibility_from_wait(eligible_at: DateTime<FixedOffset>, now: DateTime<Utc>) -> f64 {
    let eligible_at = eligible_at.with_timezone(&Utc);
    if eligible_at <= now {
        return ELIGIBLE_NOW;
    }

    match (eligible_at - now).num_days() {
        days if days <= 7 => 0.5,
        days if days <= 14 => 0.4,
        days if days <= 28 => 0.3,
        _ => 0.1,
    }
}

/// Accepts RFC 3339 timestamps (including a trailing `Z`), naive ISO timestamps and plain
/// dates. Naive values are read as UTC.
pub fn parse_instant(value: &str) -> Option<DateTime<FixedOffset>> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return None;
    }

    if let Ok(instant) = DateTime::parse_from_rfc3339(trimmed) {
        return Some(instant);
    }

    let utc = FixedOffset::east_opt(0)?;
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(trimmed, format) {
            return Some(naive.and_utc().with_timezone(&utc));
        }
    }

    NaiveDate::parse_from_str(trimmed, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc().with_timezone(&utc))
}

/// Linear ramp to a full score at ten donations; first-time donors get a neutral prior.
pub fn donation_history(total_donations: u32) -> f64 {
    if total_donations == 0 {
        return NEW_DONOR_PRIOR;
    }

    (f64::from(total_donations) / DONATIONS_FOR_FULL_SCORE).min(1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0)
            .single()
            .expect("valid instant")
    }

    fn in_days(days: i64) -> String {
        (now() + Duration::days(days)).to_rfc3339()
    }

    #[test]
    fn blood_type_scores_are_discrete() {
        for requested in BloodType::ALL {
            for donor in BloodType::ALL {
                let score = blood_type_match(requested.symbol(), donor.symbol());
                assert!(
                    [INCOMPATIBLE, COMPATIBLE_MATCH, EXACT_MATCH].contains(&score),
                    "{requested:?} <- {donor:?} scored {score}"
                );
                if requested == donor {
                    assert_eq!(score, EXACT_MATCH);
                }
            }
        }
    }

    #[test]
    fn ab_positive_donor_only_serves_ab_positive() {
        for requested in BloodType::ALL {
            let score = blood_type_match(requested.symbol(), "AB+");
            if requested == BloodType::AbPositive {
                assert_eq!(score, EXACT_MATCH);
            } else {
                assert_eq!(score, INCOMPATIBLE);
            }
        }
    }

    #[test]
    fn compatible_but_different_groups_score_point_eight() {
        assert_eq!(blood_type_match("AB+", "O-"), COMPATIBLE_MATCH);
        assert_eq!(blood_type_match("A+", "O+"), COMPATIBLE_MATCH);
        assert_eq!(blood_type_match("O-", "O+"), INCOMPATIBLE);
    }

    #[test]
    fn unknown_blood_types_degrade_to_zero() {
        assert_eq!(blood_type_match("O+", "Z+"), INCOMPATIBLE);
        assert_eq!(blood_type_match("", "O-"), INCOMPATIBLE);
    }

    #[test]
    fn location_ignores_case_and_whitespace() {
        assert_eq!(
            location_proximity("Mumbai", "Maharashtra", "  mumbai ", "MAHARASHTRA"),
            SAME_CITY
        );
        assert_eq!(
            location_proximity("Mumbai", "Maharashtra", "Pune", "maharashtra"),
            SAME_STATE
        );
        assert_eq!(
            location_proximity("Mumbai", "Maharashtra", "Mumbai", "Gujarat"),
            DIFFERENT_STATE
        );
    }

    #[test]
    fn blank_cities_in_same_state_match() {
        assert_eq!(location_proximity("", "Goa", "", "Goa"), SAME_CITY);
        assert_eq!(location_proximity("", "Goa", "Panaji", "Goa"), SAME_STATE);
        assert_eq!(location_proximity("", "Goa", "Panaji", "Kerala"), DIFFERENT_STATE);
    }

    #[test]
    fn emergency_donor_eligible_now_scores_one() {
        let today = now().date_naive().format("%Y-%m-%d").to_string();
        assert_eq!(availability(true, Some(today.as_str()), None, now()), 1.0);
        assert_eq!(availability(true, Some(in_days(-3).as_str()), Some("2024-01-01"), now()), 1.0);
    }

    #[test]
    fn future_eligibility_steps_down_with_wait() {
        let cases = [(3, 0.5), (7, 0.5), (10, 0.4), (20, 0.3), (45, 0.1)];
        for (days, eligibility) in cases {
            let score = availability(false, Some(in_days(days).as_str()), None, now());
            assert!(
                (score - (0.1 + eligibility)).abs() < 1e-9,
                "{days} days scored {score}"
            );
        }
    }

    #[test]
    fn unparseable_eligibility_fails_open() {
        assert!((availability(false, Some("next tuesday"), None, now()) - 0.7).abs() < 1e-9);
    }

    #[test]
    fn missing_eligibility_uses_donation_history() {
        assert!((availability(false, None, None, now()) - 0.7).abs() < 1e-9);
        assert!((availability(false, None, Some("2024-12-01"), now()) - 0.6).abs() < 1e-9);
        assert!((availability(true, Some(""), Some("2024-12-01"), now()) - 0.9).abs() < 1e-9);
    }

    #[test]
    fn parse_instant_normalizes_zulu_suffix() {
        let zulu = parse_instant("2025-03-01T12:00:00Z").expect("zulu parses");
        let offset = parse_instant("2025-03-01T12:00:00+00:00").expect("offset parses");
        let naive = parse_instant("2025-03-01T12:00:00").expect("naive parses");
        assert_eq!(zulu, offset);
        assert_eq!(zulu, naive);
        assert!(parse_instant("2025-03-01").is_some());
        assert!(parse_instant("03/01/2025").is_none());
    }

    #[test]
    fn donation_history_ramps_and_caps() {
        assert_eq!(donation_history(0), 0.5);
        assert!((donation_history(1) - 0.1).abs() < 1e-9);
        assert!((donation_history(5) - 0.5).abs() < 1e-9);
        assert_eq!(donation_history(10), 1.0);
        assert_eq!(donation_history(250), 1.0);

        let mut previous = donation_history(1);
        for count in 2..40 {
            let current = donation_history(count);
            assert!(current >= previous);
            previous = current;
        }
    }
}
