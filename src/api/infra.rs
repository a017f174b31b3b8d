use crate::workflows::transfusion::{ModelArtifact, TransfusionPredictor};
use chrono::NaiveDate;
use metrics_exporter_prometheus::PrometheusHandle;
use std::path::Path;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

/// Builds the transfusion predictor from whatever artifact `model_dir` holds.
///
/// A missing or broken artifact is logged and the service runs rule-based.
pub(crate) fn load_predictor(model_dir: &Path) -> TransfusionPredictor {
    match ModelArtifact::load_from_dir(model_dir) {
        Ok(Some(artifact)) => {
            tracing::info!(
                dir = %model_dir.display(),
                version = artifact.version().unwrap_or("unknown"),
                columns = artifact.metadata().feature_columns.len(),
                "transfusion model loaded"
            );
            TransfusionPredictor::new(Some(Arc::new(artifact)))
        }
        Ok(None) => {
            tracing::info!(
                dir = %model_dir.display(),
                "no transfusion model found, using rule-based predictions"
            );
            TransfusionPredictor::rule_based()
        }
        Err(err) => {
            tracing::warn!(
                dir = %model_dir.display(),
                error = %err,
                "failed to load transfusion model, using rule-based predictions"
            );
            TransfusionPredictor::rule_based()
        }
    }
}

pub(crate) fn parse_date(value: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .map_err(|err| format!("invalid date '{value}': {err}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_date_accepts_iso_dates() {
        assert_eq!(
            parse_date("2025-06-10"),
            Ok(NaiveDate::from_ymd_opt(2025, 6, 10).expect("valid date"))
        );
        assert!(parse_date("10/06/2025").is_err());
    }

    #[test]
    fn broken_model_directory_falls_back_to_rules() {
        let dir = tempfile::tempdir().expect("temp dir");
        std::fs::write(
            dir.path().join(crate::workflows::transfusion::REGRESSOR_FILE),
            "not json",
        )
        .expect("write fixture");

        assert!(!load_predictor(dir.path()).has_model());
    }
}
