use super::domain::Donor;
use serde::{Deserialize, Deserializer};
use std::io::Read;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DonorImportError {
    #[error("failed to read donor roster: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid donor roster CSV: {0}")]
    Csv(#[from] csv::Error),
    #[error("row {row} has an invalid totalDonations value '{value}'")]
    InvalidDonationCount { row: usize, value: String },
}

/// Loads a donor roster exported as CSV with the same column names as the JSON API.
pub struct DonorRosterImporter;

impl DonorRosterImporter {
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Vec<Donor>, DonorImportError> {
        let file = std::fs::File::open(path)?;
        Self::from_reader(file)
    }

    pub fn from_reader<R: Read>(reader: R) -> Result<Vec<Donor>, DonorImportError> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(reader);
        let mut donors = Vec::new();

        for (index, record) in csv_reader.deserialize::<RosterRow>().enumerate() {
            let row = record?;
            donors.push(row.into_donor(index + 1)?);
        }

        Ok(donors)
    }
}

#[derive(Debug, Deserialize)]
struct RosterRow {
    #[serde(rename = "donorId", default, deserialize_with = "empty_string_as_none")]
    donor_id: Option<String>,
    #[serde(rename = "bloodType", default, deserialize_with = "empty_string_as_none")]
    blood_type: Option<String>,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    city: Option<String>,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    state: Option<String>,
    #[serde(
        rename = "lastDonationDate",
        default,
        deserialize_with = "empty_string_as_none"
    )]
    last_donation_date: Option<String>,
    #[serde(
        rename = "totalDonations",
        default,
        deserialize_with = "empty_string_as_none"
    )]
    total_donations: Option<String>,
    #[serde(
        rename = "availableForEmergency",
        default,
        deserialize_with = "empty_string_as_none"
    )]
    available_for_emergency: Option<String>,
    #[serde(
        rename = "nextEligibleDate",
        default,
        deserialize_with = "empty_string_as_none"
    )]
    next_eligible_date: Option<String>,
}

impl RosterRow {
    fn into_donor(self, row: usize) -> Result<Donor, DonorImportError> {
        let total_donations = match self.total_donations {
            Some(value) => value
                .parse::<u32>()
                .map_err(|_| DonorImportError::InvalidDonationCount { row, value })?,
            None => 0,
        };

        Ok(Donor {
            donor_id: self.donor_id,
            blood_type: self.blood_type,
            city: self.city,
            state: self.state,
            last_donation_date: self.last_donation_date,
            total_donations,
            available_for_emergency: self
                .available_for_emergency
                .as_deref()
                .map(parse_flag)
                .unwrap_or(false),
            next_eligible_date: self.next_eligible_date,
        })
    }
}

fn parse_flag(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "true" | "yes" | "y" | "1"
    )
}

fn empty_string_as_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let opt = Option::<String>::deserialize(deserializer)?;
    Ok(opt.filter(|value| !value.trim().is_empty()))
}
