use serde::{Deserialize, Serialize};

/// ABO/Rh groups recognised by the compatibility table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BloodType {
    #[serde(rename = "O-")]
    ONegative,
    #[serde(rename = "O+")]
    OPositive,
    #[serde(rename = "A-")]
    ANegative,
    #[serde(rename = "A+")]
    APositive,
    #[serde(rename = "B-")]
    BNegative,
    #[serde(rename = "B+")]
    BPositive,
    #[serde(rename = "AB-")]
    AbNegative,
    #[serde(rename = "AB+")]
    AbPositive,
}

impl BloodType {
    pub const ALL: [BloodType; 8] = [
        BloodType::ONegative,
        BloodType::OPositive,
        BloodType::ANegative,
        BloodType::APositive,
        BloodType::BNegative,
        BloodType::BPositive,
        BloodType::AbNegative,
        BloodType::AbPositive,
    ];

    /// Parses the canonical symbol (`"O-"`, `"AB+"`, ...). Surrounding whitespace is ignored,
    /// anything else must match exactly.
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim() {
            "O-" => Some(Self::ONegative),
            "O+" => Some(Self::OPositive),
            "A-" => Some(Self::ANegative),
            "A+" => Some(Self::APositive),
            "B-" => Some(Self::BNegative),
            "B+" => Some(Self::BPositive),
            "AB-" => Some(Self::AbNegative),
            "AB+" => Some(Self::AbPositive),
            _ => None,
        }
    }

    pub fn symbol(self) -> &'static str {
        match self {
            Self::ONegative => "O-",
            Self::OPositive => "O+",
            Self::ANegative => "A-",
            Self::APositive => "A+",
            Self::BNegative => "B-",
            Self::BPositive => "B+",
            Self::AbNegative => "AB-",
            Self::AbPositive => "AB+",
        }
    }

    /// Recipient groups that can safely receive red cells from this donor group.
    pub fn compatible_recipients(self) -> &'static [BloodType] {
        use BloodType::*;
        match self {
            ONegative => &Self::ALL,
            OPositive => &[OPositive, APositive, BPositive, AbPositive],
            ANegative => &[ANegative, APositive, AbNegative, AbPositive],
            APositive => &[APositive, AbPositive],
            BNegative => &[BNegative, BPositive, AbNegative, AbPositive],
            BPositive => &[BPositive, AbPositive],
            AbNegative => &[AbNegative, AbPositive],
            AbPositive => &[AbPositive],
        }
    }

    pub fn can_donate_to(self, recipient: BloodType) -> bool {
        self.compatible_recipients().contains(&recipient)
    }
}

/// Request-level urgency flag selecting the weight vector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Urgency {
    Emergency,
    #[default]
    Normal,
}

impl Urgency {
    /// Anything other than `emergency` (case-insensitive) is treated as a routine request.
    pub fn from_label(value: Option<&str>) -> Self {
        match value.map(|raw| raw.trim().to_ascii_lowercase()) {
            Some(label) if label == "emergency" => Self::Emergency,
            _ => Self::Normal,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Emergency => "emergency",
            Self::Normal => "normal",
        }
    }
}

/// Candidate donor as submitted by the caller. Never persisted.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Donor {
    #[serde(default)]
    pub donor_id: Option<String>,
    #[serde(default)]
    pub blood_type: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub last_donation_date: Option<String>,
    #[serde(default)]
    pub total_donations: u32,
    #[serde(default)]
    pub available_for_emergency: bool,
    #[serde(default)]
    pub next_eligible_date: Option<String>,
}

/// City/state pair used by the proximity scorer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
}

impl Location {
    pub fn new(city: impl Into<String>, state: impl Into<String>) -> Self {
        Self {
            city: Some(city.into()),
            state: Some(state.into()),
        }
    }

    pub fn city(&self) -> &str {
        self.city.as_deref().unwrap_or_default()
    }

    pub fn state(&self) -> &str {
        self.state.as_deref().unwrap_or_default()
    }

    fn is_empty(&self) -> bool {
        self.city.is_none() && self.state.is_none()
    }
}

/// Raw ranking request body. Fields stay optional so validation can report all gaps at once.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DonorRankingRequest {
    #[serde(default)]
    pub blood_type: Option<String>,
    #[serde(default)]
    pub location: Option<Location>,
    #[serde(default)]
    pub urgency: Option<String>,
    #[serde(default)]
    pub donors: Vec<Donor>,
}

/// Validated recipient side of a ranking request.
#[derive(Debug, Clone, PartialEq)]
pub struct RecipientRequest {
    pub blood_type: String,
    pub location: Location,
    pub urgency: Urgency,
}

impl DonorRankingRequest {
    pub fn validate(&self) -> Result<RecipientRequest, DonorRequestError> {
        let mut missing = Vec::new();

        let blood_type = self
            .blood_type
            .as_deref()
            .filter(|value| !value.trim().is_empty());
        if blood_type.is_none() {
            missing.push("bloodType");
        }

        let location = self.location.as_ref().filter(|location| !location.is_empty());
        if location.is_none() {
            missing.push("location");
        }

        match (blood_type, location) {
            (Some(blood_type), Some(location)) => Ok(RecipientRequest {
                blood_type: blood_type.to_string(),
                location: location.clone(),
                urgency: Urgency::from_label(self.urgency.as_deref()),
            }),
            _ => Err(DonorRequestError::MissingFields { fields: missing }),
        }
    }
}

/// Validation failures for ranking requests.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DonorRequestError {
    #[error("Blood type and location are required (missing: {})", .fields.join(", "))]
    MissingFields { fields: Vec<&'static str> },
}

impl DonorRequestError {
    pub fn missing_fields(&self) -> &[&'static str] {
        match self {
            DonorRequestError::MissingFields { fields } => fields,
        }
    }
}
