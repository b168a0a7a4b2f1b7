//! Plant classifier
//!
//! Turns uploaded image bytes into a class prediction. The model behind it is
//! an opaque scorer: an exported ONNX network when built with the `onnx`
//! feature and the model file loads, otherwise the deterministic
//! feature-hash model in [`fallback`].

pub mod fallback;
pub mod labels;
#[cfg(feature = "onnx")]
pub mod onnx;
pub mod preprocess;

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use serde::Serialize;

use crate::config::Config;
use fallback::FeatureHashModel;

pub use labels::ClassNames;
pub use preprocess::{preprocess, PreparedImage};

pub const OUT_OF_SCOPE_LABEL: &str = "OUT OF SCOPE - Not a recognized medicinal plant";

pub const LOW_CONFIDENCE_WARNING: &str = "Low confidence prediction. This plant may not be in our trained database. NEVER use unidentified plants for medical purposes.";

pub const MEDICAL_DISCLAIMER: &str = "MEDICAL DISCLAIMER: This is AI prediction only. Always consult healthcare professionals before using any plant medicinally.";

pub const SAFETY_NOTE: &str = "Never consume unknown plants. Misidentification can be dangerous or fatal.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelKind {
    Onnx,
    FeatureHash,
}

impl ModelKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Onnx => "onnx",
            Self::FeatureHash => "feature_hash",
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ClassifierError {
    #[error("{0}")]
    Decode(String),
    #[error("model returned {actual} scores for {expected} classes")]
    OutputMismatch { expected: usize, actual: usize },
    #[error("inference failed: {0}")]
    Inference(String),
    #[cfg(feature = "onnx")]
    #[error("model load failed: {0}")]
    Load(String),
}

/// Scores a prepared image, one value per class in class order
pub trait ScoringModel: Send + Sync {
    fn name(&self) -> &str;
    fn kind(&self) -> ModelKind;
    fn score(&self, image: &PreparedImage) -> Result<Vec<f32>, ClassifierError>;
}

/// Outcome of one classification
#[derive(Debug, Clone, Serialize)]
pub struct Classification {
    /// Top label, or the out-of-scope label below the threshold
    pub predicted_class: String,
    pub confidence: f64,
    pub top_class: String,
    pub top_index: usize,
    pub in_scope: bool,
    /// `(label, probability)` in class order
    pub probabilities: Vec<(String, f64)>,
    pub model_kind: ModelKind,
    pub warning: &'static str,
}

impl Classification {
    /// Label to probability map, class order preserved
    pub fn all_predictions(&self) -> serde_json::Map<String, serde_json::Value> {
        self.probabilities
            .iter()
            .map(|(label, p)| (label.clone(), serde_json::Value::from(*p)))
            .collect()
    }
}

/// Model status for health and info endpoints
#[derive(Debug, Clone, Serialize)]
pub struct ClassifierStatus {
    pub model_loaded: bool,
    pub model_type: ModelKind,
    pub model_name: String,
    pub model_path: String,
    pub class_count: usize,
    pub inference_count: u64,
    pub avg_latency_ms: f64,
}

pub struct Classifier {
    model: Box<dyn ScoringModel>,
    classes: ClassNames,
    threshold: f32,
    image_size: u32,
    model_path: PathBuf,
    inference_count: AtomicU64,
    latency_sum_us: AtomicU64,
}

impl Classifier {
    /// Class names and model from the configured paths, falling back to the
    /// defaults and the feature-hash model
    pub fn load(config: &Config) -> Self {
        let classes = ClassNames::load(&config.class_names_path);
        let model = load_model(&config.model_path, classes.len());

        tracing::info!(
            "Classifier ready: model={} ({}), classes={}, threshold={}",
            model.name(),
            model.kind().as_str(),
            classes.len(),
            config.confidence_threshold
        );

        Self::new(
            model,
            classes,
            config.confidence_threshold,
            config.image_size,
            config.model_path.clone(),
        )
    }

    pub fn new(
        model: Box<dyn ScoringModel>,
        classes: ClassNames,
        threshold: f32,
        image_size: u32,
        model_path: PathBuf,
    ) -> Self {
        Self {
            model,
            classes,
            threshold,
            image_size,
            model_path,
            inference_count: AtomicU64::new(0),
            latency_sum_us: AtomicU64::new(0),
        }
    }

    pub fn classes(&self) -> &ClassNames {
        &self.classes
    }

    pub fn threshold(&self) -> f32 {
        self.threshold
    }

    pub fn image_size(&self) -> u32 {
        self.image_size
    }

    pub fn model_kind(&self) -> ModelKind {
        self.model.kind()
    }

    pub fn classify(&self, bytes: &[u8]) -> Result<Classification, ClassifierError> {
        let start = Instant::now();

        let image = preprocess(bytes, self.image_size)?;
        let scores = self.model.score(&image)?;
        let classification = self.interpret(scores)?;

        self.latency_sum_us
            .fetch_add(start.elapsed().as_micros() as u64, Ordering::Relaxed);
        self.inference_count.fetch_add(1, Ordering::Relaxed);

        tracing::debug!(
            top = %classification.top_class,
            confidence = classification.confidence,
            in_scope = classification.in_scope,
            "classified image"
        );

        Ok(classification)
    }

    /// Validate, normalise and threshold raw model scores
    pub fn interpret(&self, scores: Vec<f32>) -> Result<Classification, ClassifierError> {
        if scores.len() != self.classes.len() {
            return Err(ClassifierError::OutputMismatch {
                expected: self.classes.len(),
                actual: scores.len(),
            });
        }

        let probabilities = normalize(scores)?;

        let (top_index, confidence) = probabilities
            .iter()
            .copied()
            .enumerate()
            .fold((0, f32::MIN), |best, (i, p)| if p > best.1 { (i, p) } else { best });

        let top_class = self
            .classes
            .get(top_index)
            .ok_or(ClassifierError::OutputMismatch {
                expected: self.classes.len(),
                actual: probabilities.len(),
            })?
            .to_string();

        // Thresholded on the reported, rounded confidence
        let confidence = round4(confidence);
        let in_scope = confidence >= round4(self.threshold);
        let (predicted_class, warning) = if in_scope {
            (top_class.clone(), MEDICAL_DISCLAIMER)
        } else {
            (OUT_OF_SCOPE_LABEL.to_string(), LOW_CONFIDENCE_WARNING)
        };

        Ok(Classification {
            predicted_class,
            confidence,
            top_class,
            top_index,
            in_scope,
            probabilities: self
                .classes
                .iter()
                .zip(&probabilities)
                .map(|(label, p)| (label.to_string(), round4(*p)))
                .collect(),
            model_kind: self.model.kind(),
            warning,
        })
    }

    pub fn status(&self) -> ClassifierStatus {
        let count = self.inference_count.load(Ordering::Relaxed);
        let sum = self.latency_sum_us.load(Ordering::Relaxed);
        let avg = if count > 0 { (sum as f64 / count as f64) / 1000.0 } else { 0.0 };

        ClassifierStatus {
            model_loaded: self.model.kind() == ModelKind::Onnx,
            model_type: self.model.kind(),
            model_name: self.model.name().to_string(),
            model_path: self.model_path.display().to_string(),
            class_count: self.classes.len(),
            inference_count: count,
            avg_latency_ms: avg,
        }
    }

    pub fn preprocessing(&self) -> String {
        preprocess::describe(self.image_size)
    }
}

#[cfg(feature = "onnx")]
fn load_model(path: &Path, class_count: usize) -> Box<dyn ScoringModel> {
    match onnx::OnnxModel::load(path, class_count) {
        Ok(model) => Box::new(model),
        Err(e) => {
            tracing::warn!("{}; using feature-hash model", e);
            Box::new(FeatureHashModel::new(class_count))
        }
    }
}

#[cfg(not(feature = "onnx"))]
fn load_model(path: &Path, class_count: usize) -> Box<dyn ScoringModel> {
    tracing::warn!(
        "Built without the onnx feature, {} not loaded; using feature-hash model",
        path.display()
    );
    Box::new(FeatureHashModel::new(class_count))
}

/// Scores that already form a distribution pass through, anything else is
/// treated as logits
fn normalize(scores: Vec<f32>) -> Result<Vec<f32>, ClassifierError> {
    if scores.iter().any(|s| !s.is_finite()) {
        return Err(ClassifierError::Inference("model returned non-finite scores".to_string()));
    }

    let sum: f32 = scores.iter().sum();
    if scores.iter().all(|s| *s >= 0.0) && (sum - 1.0).abs() < 1e-3 {
        return Ok(scores);
    }

    let max = scores.iter().copied().fold(f32::MIN, f32::max);
    let exps: Vec<f32> = scores.iter().map(|s| (s - max).exp()).collect();
    let total: f32 = exps.iter().sum();
    Ok(exps.into_iter().map(|e| e / total).collect())
}

fn round4(value: f32) -> f64 {
    (value as f64 * 10_000.0).round() / 10_000.0
}
