use super::features::FeatureVector;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;

/// Serialized regressor expected inside the model directory.
pub const REGRESSOR_FILE: &str = "transfusion_predictor.json";
/// Metadata sidecar written next to the regressor.
pub const METADATA_FILE: &str = "model_info.json";

#[derive(Debug, Error, PartialEq)]
pub enum InferenceError {
    #[error("feature '{column}' required by the model is not available")]
    MissingColumn { column: String },
    #[error("model expects {expected} features but received {found}")]
    ArityMismatch { expected: usize, found: usize },
    #[error("tree {tree} references node {node} which does not exist")]
    MalformedTree { tree: usize, node: usize },
    #[error("tree {tree} does not terminate in a leaf")]
    UnterminatedTree { tree: usize },
    #[error("model produced a non-finite value ({0})")]
    NonFiniteOutput(f64),
    #[error("model output of {0} days is out of range")]
    OutOfRange(f64),
    #[error("{0}")]
    Backend(String),
}

#[derive(Debug, Error)]
pub enum ModelLoadError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("invalid model metadata: {0}")]
    InvalidMetadata(String),
}

/// Numeric regressor predicting the days until the next transfusion.
pub trait Regressor: Send + Sync + fmt::Debug {
    /// Number of inputs expected per row.
    fn feature_count(&self) -> usize;

    fn predict(&self, row: &[f64]) -> Result<f64, InferenceError>;
}

/// One node of a regression tree. Splits send values `<= threshold` left.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TreeNode {
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
        /// Direction taken when the feature value is NaN.
        #[serde(default)]
        default_left: bool,
    },
    Leaf {
        value: f64,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegressionTree {
    pub nodes: Vec<TreeNode>,
}

impl RegressionTree {
    fn evaluate(&self, tree: usize, row: &[f64]) -> Result<f64, InferenceError> {
        let mut index = 0;
        // A well-formed tree reaches a leaf in fewer hops than it has nodes.
        for _ in 0..=self.nodes.len() {
            let node = self
                .nodes
                .get(index)
                .ok_or(InferenceError::MalformedTree { tree, node: index })?;
            match node {
                TreeNode::Leaf { value } => return Ok(*value),
                TreeNode::Split {
                    feature,
                    threshold,
                    left,
                    right,
                    default_left,
                } => {
                    let value = row.get(*feature).copied().ok_or(
                        InferenceError::ArityMismatch {
                            expected: feature + 1,
                            found: row.len(),
                        },
                    )?;
                    let go_left = if value.is_nan() {
                        *default_left
                    } else {
                        value <= *threshold
                    };
                    index = if go_left { *left } else { *right };
                }
            }
        }
        Err(InferenceError::UnterminatedTree { tree })
    }
}

/// Additive ensemble of regression trees, as produced by gradient boosting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TreeEnsemble {
    pub n_features: usize,
    #[serde(default)]
    pub base_score: f64,
    pub trees: Vec<RegressionTree>,
}

impl Regressor for TreeEnsemble {
    fn feature_count(&self) -> usize {
        self.n_features
    }

    fn predict(&self, row: &[f64]) -> Result<f64, InferenceError> {
        check_arity(self.n_features, row)?;
        self.trees
            .iter()
            .enumerate()
            .try_fold(self.base_score, |total, (index, tree)| {
                Ok(total + tree.evaluate(index, row)?)
            })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinearRegressor {
    pub intercept: f64,
    pub coefficients: Vec<f64>,
}

impl Regressor for LinearRegressor {
    fn feature_count(&self) -> usize {
        self.coefficients.len()
    }

    fn predict(&self, row: &[f64]) -> Result<f64, InferenceError> {
        check_arity(self.coefficients.len(), row)?;
        Ok(self
            .coefficients
            .iter()
            .zip(row)
            .fold(self.intercept, |total, (weight, value)| total + weight * value))
    }
}

/// On-disk regressor document, discriminated by `kind`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SerializedRegressor {
    TreeEnsemble(TreeEnsemble),
    Linear(LinearRegressor),
}

impl Regressor for SerializedRegressor {
    fn feature_count(&self) -> usize {
        match self {
            SerializedRegressor::TreeEnsemble(model) => model.feature_count(),
            SerializedRegressor::Linear(model) => model.feature_count(),
        }
    }

    fn predict(&self, row: &[f64]) -> Result<f64, InferenceError> {
        match self {
            SerializedRegressor::TreeEnsemble(model) => model.predict(row),
            SerializedRegressor::Linear(model) => model.predict(row),
        }
    }
}

fn check_arity(expected: usize, row: &[f64]) -> Result<(), InferenceError> {
    if row.len() == expected {
        Ok(())
    } else {
        Err(InferenceError::ArityMismatch {
            expected,
            found: row.len(),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SplitMetrics {
    pub mae: f64,
    pub rmse: f64,
    pub r2: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelMetrics {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub train: Option<SplitMetrics>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub test: Option<SplitMetrics>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub coverage_7_days: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub coverage_14_days: Option<f64>,
}

/// Training metadata stored beside the regressor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelMetadata {
    pub feature_columns: Vec<String>,
    #[serde(default)]
    pub feature_importance: BTreeMap<String, f64>,
    #[serde(default)]
    pub metrics: ModelMetrics,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trained_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_version: Option<String>,
}

/// Public summary of a loaded model, as served by `/model-info`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModelInfo<'a> {
    pub model_version: Option<&'a str>,
    pub trained_at: Option<&'a str>,
    pub metrics: &'a ModelMetrics,
    pub feature_importance: &'a BTreeMap<String, f64>,
}

impl ModelMetadata {
    pub fn info(&self) -> ModelInfo<'_> {
        ModelInfo {
            model_version: self.model_version.as_deref(),
            trained_at: self.trained_at.as_deref(),
            metrics: &self.metrics,
            feature_importance: &self.feature_importance,
        }
    }

    pub fn new(feature_columns: Vec<String>) -> Self {
        Self {
            feature_columns,
            feature_importance: BTreeMap::new(),
            metrics: ModelMetrics::default(),
            trained_at: None,
            model_version: None,
        }
    }

    /// Column with the highest importance. Falls back to the first declared column.
    pub fn top_feature(&self) -> Option<&str> {
        self.feature_importance
            .iter()
            .filter(|(_, importance)| importance.is_finite())
            .fold(None::<(&String, f64)>, |best, (name, importance)| match best {
                Some((_, current)) if current >= *importance => best,
                _ => Some((name, *importance)),
            })
            .map(|(name, _)| name.as_str())
            .or_else(|| self.feature_columns.first().map(String::as_str))
    }

    fn validate(&self) -> Result<(), ModelLoadError> {
        if self.feature_columns.is_empty() {
            return Err(ModelLoadError::InvalidMetadata(
                "feature_columns must not be empty".to_string(),
            ));
        }
        let mut seen = HashSet::new();
        for column in &self.feature_columns {
            if !seen.insert(column.as_str()) {
                return Err(ModelLoadError::InvalidMetadata(format!(
                    "feature column '{column}' is listed twice"
                )));
            }
        }
        Ok(())
    }
}

/// Loaded regressor paired with its metadata. Read-only after construction.
#[derive(Debug, Clone)]
pub struct ModelArtifact {
    metadata: ModelMetadata,
    regressor: Arc<dyn Regressor>,
}

impl ModelArtifact {
    pub fn new<R>(metadata: ModelMetadata, regressor: R) -> Result<Self, ModelLoadError>
    where
        R: Regressor + 'static,
    {
        metadata.validate()?;
        if regressor.feature_count() != metadata.feature_columns.len() {
            return Err(ModelLoadError::InvalidMetadata(format!(
                "regressor expects {} features but metadata declares {} columns",
                regressor.feature_count(),
                metadata.feature_columns.len()
            )));
        }
        Ok(Self {
            metadata,
            regressor: Arc::new(regressor),
        })
    }

    /// Loads `transfusion_predictor.json` and `model_info.json` from `dir`.
    ///
    /// Returns `Ok(None)` when no regressor has been trained into the directory yet.
    pub fn load_from_dir(dir: impl AsRef<Path>) -> Result<Option<Self>, ModelLoadError> {
        let dir = dir.as_ref();
        let regressor_path = dir.join(REGRESSOR_FILE);
        if !regressor_path.exists() {
            return Ok(None);
        }

        let regressor: SerializedRegressor = read_json(&regressor_path)?;
        let metadata: ModelMetadata = read_json(&dir.join(METADATA_FILE))?;

        Self::new(metadata, regressor).map(Some)
    }

    pub fn metadata(&self) -> &ModelMetadata {
        &self.metadata
    }

    pub fn version(&self) -> Option<&str> {
        self.metadata.model_version.as_deref()
    }

    /// Orders the feature values by the model's declared columns.
    pub fn align(&self, features: &FeatureVector) -> Result<Vec<f64>, InferenceError> {
        self.metadata
            .feature_columns
            .iter()
            .map(|column| {
                features
                    .get(column)
                    .ok_or_else(|| InferenceError::MissingColumn {
                        column: column.clone(),
                    })
            })
            .collect()
    }

    /// Raw model output in days for the given features.
    pub fn predict_days(&self, features: &FeatureVector) -> Result<f64, InferenceError> {
        let row = self.align(features)?;
        let days = self.regressor.predict(&row)?;
        if days.is_finite() {
            Ok(days)
        } else {
            Err(InferenceError::NonFiniteOutput(days))
        }
    }
}

fn read_json<T>(path: &Path) -> Result<T, ModelLoadError>
where
    T: for<'de> Deserialize<'de>,
{
    let raw = std::fs::read_to_string(path).map_err(|source| ModelLoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&raw).map_err(|source| ModelLoadError::Parse {
        path: path.to_path_buf(),
        source,
    })
}
