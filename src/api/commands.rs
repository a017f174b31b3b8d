use super::infra::{load_predictor, parse_date};
use crate::config::AppConfig;
use crate::error::AppError;
use crate::workflows::donor_matching::{
    rank_donors, DonorRanking, DonorRankingRequest, DonorRosterImporter, Location,
};
use crate::workflows::transfusion::{ModelArtifact, TransfusionPredictionRequest};
use chrono::{NaiveDate, NaiveTime, Utc};
use clap::Args;
use std::path::PathBuf;

#[derive(Args, Debug)]
pub(crate) struct DonorRankArgs {
    /// Donor roster CSV (donorId, bloodType, city, state, ...)
    #[arg(long)]
    pub(crate) csv: PathBuf,
    /// Recipient blood type, e.g. O+
    #[arg(long)]
    pub(crate) blood_type: String,
    /// Recipient city
    #[arg(long)]
    pub(crate) city: String,
    /// Recipient state
    #[arg(long)]
    pub(crate) state: Option<String>,
    /// `emergency` or `normal` (default)
    #[arg(long)]
    pub(crate) urgency: Option<String>,
    /// Evaluate eligibility as of this date (defaults to now)
    #[arg(long, value_parser = parse_date)]
    pub(crate) today: Option<NaiveDate>,
}

#[derive(Args, Debug)]
pub(crate) struct TransfusionPredictArgs {
    /// JSON file shaped like the /predict-next-transfusion body
    #[arg(long)]
    pub(crate) request: PathBuf,
    /// Directory holding the trained model (defaults to APP_MODEL_DIR)
    #[arg(long)]
    pub(crate) model_dir: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub(crate) struct ModelInfoArgs {
    /// Directory holding the trained model (defaults to APP_MODEL_DIR)
    #[arg(long)]
    pub(crate) model_dir: Option<PathBuf>,
}

pub(crate) fn run_donor_ranking(args: DonorRankArgs) -> Result<(), AppError> {
    let DonorRankArgs {
        csv,
        blood_type,
        city,
        state,
        urgency,
        today,
    } = args;

    let donors = DonorRosterImporter::from_path(&csv)?;
    let request = DonorRankingRequest {
        blood_type: Some(blood_type),
        location: Some(Location {
            city: Some(city),
            state,
        }),
        urgency,
        donors: Vec::new(),
    };

    let recipient = match request.validate() {
        Ok(recipient) => recipient,
        Err(err) => {
            println!("Cannot rank donors: {}", err);
            return Ok(());
        }
    };

    let now = today
        .map(|date| date.and_time(NaiveTime::MIN).and_utc())
        .unwrap_or_else(Utc::now);
    let ranking = rank_donors(&recipient, &donors, now);
    render_ranking(&ranking, &csv);

    Ok(())
}

fn render_ranking(ranking: &DonorRanking, source: &std::path::Path) {
    println!("Donor ranking ({} urgency)", ranking.urgency.label());
    println!(
        "Roster: {} ({} donors, {} scored)",
        source.display(),
        ranking.total_donors,
        ranking.matched_donors
    );

    if ranking.predictions.is_empty() {
        println!("No donors provided");
        return;
    }

    for (rank, prediction) in ranking.predictions.iter().enumerate() {
        let factors = &prediction.factors;
        println!(
            "{:>2}. {:<12} score {:.3} | blood {:.2} | location {:.2} | availability {:.2} | history {:.2}",
            rank + 1,
            prediction.donor_id.as_deref().unwrap_or("-"),
            prediction.compatibility_score,
            factors.blood_type_match,
            factors.location_proximity,
            factors.availability,
            factors.donation_history
        );
    }
}

fn resolve_model_dir(model_dir: Option<PathBuf>) -> Result<PathBuf, AppError> {
    match model_dir {
        Some(dir) => Ok(dir),
        None => Ok(AppConfig::load()?.model.directory),
    }
}

pub(crate) fn run_transfusion_prediction(args: TransfusionPredictArgs) -> Result<(), AppError> {
    let raw = std::fs::read_to_string(&args.request)?;
    let request: TransfusionPredictionRequest = serde_json::from_str(&raw)?;

    let predictor = load_predictor(&resolve_model_dir(args.model_dir)?);
    let prediction = predictor.handle(&request)?;

    println!("{}", serde_json::to_string_pretty(&prediction)?);
    Ok(())
}

pub(crate) fn run_model_info(args: ModelInfoArgs) -> Result<(), AppError> {
    let model_dir = resolve_model_dir(args.model_dir)?;

    match ModelArtifact::load_from_dir(&model_dir)? {
        Some(artifact) => {
            println!("{}", serde_json::to_string_pretty(&artifact.metadata().info())?);
        }
        None => {
            println!(
                "No model found in {}; predictions use the rule-based estimator",
                model_dir.display()
            );
        }
    }

    Ok(())
}
