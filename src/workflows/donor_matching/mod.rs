//! Donor ranking: four factor scorers combined by an urgency-dependent weight vector.

pub mod domain;
pub mod import;
pub mod ranking;
pub mod router;
pub mod scoring;

pub use domain::{
    BloodType, Donor, DonorRankingRequest, DonorRequestError, Location, RecipientRequest, Urgency,
};
pub use import::{DonorImportError, DonorRosterImporter};
pub use ranking::{
    rank_donors, DonorPrediction, DonorRanking, FactorScores, WeightVector, MAX_PREDICTIONS,
};
pub use router::donor_router;
