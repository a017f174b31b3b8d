pub mod donor_matching;
pub mod transfusion;
