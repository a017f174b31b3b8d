//! Next-transfusion forecasting: a trained regressor when one is available, Hb-adjusted
//! interval rules otherwise.

pub mod domain;
pub mod features;
pub mod model;
pub mod predictor;
pub mod router;
pub mod rules;

#[cfg(test)]
mod tests;

pub use domain::{
    HistoryEntry, InvalidField, LabValues, PatientContext, PredictionMethod,
    PredictionRequestError, TransfusionEvent, TransfusionPrediction, TransfusionPredictionRequest,
};
pub use features::{derive_features, FeatureVector, FEATURE_COLUMNS};
pub use model::{
    InferenceError, LinearRegressor, ModelArtifact, ModelInfo, ModelLoadError, ModelMetadata,
    ModelMetrics, RegressionTree, Regressor, SerializedRegressor, SplitMetrics, TreeEnsemble,
    TreeNode, METADATA_FILE, REGRESSOR_FILE,
};
pub use predictor::{predict_with_model, FallbackReason, TransfusionPredictor, MODEL_CONFIDENCE};
pub use router::transfusion_router;
pub use rules::RuleEstimate;
