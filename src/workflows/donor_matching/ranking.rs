use super::domain::{Donor, RecipientRequest, Urgency};
use super::scoring;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Number of ranked donors returned to the caller.
pub const MAX_PREDICTIONS: usize = 10;

/// Per-factor weights. Always sums to 1.0.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WeightVector {
    pub blood_type: f64,
    pub location: f64,
    pub availability: f64,
    pub history: f64,
}

impl WeightVector {
    /// Emergencies trade donation history for proximity.
    pub fn for_urgency(urgency: Urgency) -> Self {
        match urgency {
            Urgency::Emergency => Self {
                blood_type: 0.40,
                location: 0.35,
                availability: 0.20,
                history: 0.05,
            },
            Urgency::Normal => Self {
                blood_type: 0.40,
                location: 0.25,
                availability: 0.20,
                history: 0.15,
            },
        }
    }

    pub fn total(&self) -> f64 {
        self.blood_type + self.location + self.availability + self.history
    }

    pub fn is_normalized(&self) -> bool {
        (self.total() - 1.0).abs() < 1e-9
    }

    pub fn apply(&self, factors: &FactorScores) -> f64 {
        factors.blood_type_match * self.blood_type
            + factors.location_proximity * self.location
            + factors.availability * self.availability
            + factors.donation_history * self.history
    }
}

/// The four factor scores for one donor, each in `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FactorScores {
    pub blood_type_match: f64,
    pub location_proximity: f64,
    pub availability: f64,
    pub donation_history: f64,
}

impl FactorScores {
    pub fn for_donor(request: &RecipientRequest, donor: &Donor, now: DateTime<Utc>) -> Self {
        Self {
            blood_type_match: scoring::blood_type_match(
                &request.blood_type,
                donor.blood_type.as_deref().unwrap_or_default(),
            ),
            location_proximity: scoring::location_proximity(
                request.location.city(),
                request.location.state(),
                donor.city.as_deref().unwrap_or_default(),
                donor.state.as_deref().unwrap_or_default(),
            ),
            availability: scoring::availability(
                donor.available_for_emergency,
                donor.next_eligible_date.as_deref(),
                donor.last_donation_date.as_deref(),
                now,
            ),
            donation_history: scoring::donation_history(donor.total_donations),
        }
    }

    fn rounded(self) -> Self {
        Self {
            blood_type_match: round_to(self.blood_type_match, 2),
            location_proximity: round_to(self.location_proximity, 2),
            availability: round_to(self.availability, 2),
            donation_history: round_to(self.donation_history, 2),
        }
    }
}

/// Ranked entry returned to the caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DonorPrediction {
    pub donor_id: Option<String>,
    pub compatibility_score: f64,
    pub factors: FactorScores,
}

/// Ranking result with the bookkeeping counters the API reports.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DonorRanking {
    pub predictions: Vec<DonorPrediction>,
    pub total_donors: usize,
    pub matched_donors: usize,
    pub urgency: Urgency,
}

/// Scores every donor against the request and keeps the best [`MAX_PREDICTIONS`].
///
/// Ties on the rounded score keep the order in which donors were submitted.
pub fn rank_donors(request: &RecipientRequest, donors: &[Donor], now: DateTime<Utc>) -> DonorRanking {
    let weights = WeightVector::for_urgency(request.urgency);

    if donors.is_empty() {
        return DonorRanking {
            predictions: Vec::new(),
            total_donors: 0,
            matched_donors: 0,
            urgency: request.urgency,
        };
    }

    let mut scored: Vec<(usize, DonorPrediction)> = donors
        .iter()
        .enumerate()
        .map(|(index, donor)| {
            let factors = FactorScores::for_donor(request, donor, now);
            let overall = weights.apply(&factors).clamp(0.0, 1.0);
            let prediction = DonorPrediction {
                donor_id: donor.donor_id.clone(),
                compatibility_score: round_to(overall, 3),
                factors: factors.rounded(),
            };
            (index, prediction)
        })
        .collect();

    let matched_donors = scored.len();

    scored.sort_by(|(left_index, left), (right_index, right)| {
        right
            .compatibility_score
            .partial_cmp(&left.compatibility_score)
            .unwrap_or(Ordering::Equal)
            .then(left_index.cmp(right_index))
    });
    scored.truncate(MAX_PREDICTIONS);

    tracing::debug!(
        total = donors.len(),
        urgency = request.urgency.label(),
        best = scored.first().map(|(_, p)| p.compatibility_score),
        "ranked donors"
    );

    DonorRanking {
        predictions: scored.into_iter().map(|(_, prediction)| prediction).collect(),
        total_donors: donors.len(),
        matched_donors,
        urgency: request.urgency,
    }
}

pub(crate) fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}
