//! ONNX Runtime model
//!
//! The exported Keras classifier takes an NHWC `[1, S, S, 3]` float tensor
//! and returns one score per class.

use std::path::Path;

use ndarray::Array4;
use ort::session::{builder::GraphOptimizationLevel, Session};
use ort::value::{Value, ValueType};
use parking_lot::Mutex;

use super::preprocess::PreparedImage;
use super::{ClassifierError, ModelKind, ScoringModel};

pub struct OnnxModel {
    session: Mutex<Session>,
    output_name: String,
    name: String,
}

impl OnnxModel {
    /// Load a model whose output holds one score per class
    pub fn load(path: &Path, class_count: usize) -> Result<Self, ClassifierError> {
        if !path.exists() {
            return Err(ClassifierError::Load(format!("model not found: {}", path.display())));
        }

        tracing::info!("Loading ONNX model from {}", path.display());

        let session = Session::builder()
            .map_err(|e| ClassifierError::Load(format!("session builder: {}", e)))?
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .map_err(|e| ClassifierError::Load(format!("optimization level: {}", e)))?
            .commit_from_file(path)
            .map_err(|e| ClassifierError::Load(format!("load model: {}", e)))?;

        let output = session
            .outputs
            .first()
            .ok_or_else(|| ClassifierError::Load("model defines no outputs".to_string()))?;

        if let ValueType::Tensor { shape, .. } = &output.output_type {
            check_output_width(shape, class_count)?;
        }
        let output_name = output.name.clone();

        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "onnx".to_string());

        Ok(Self { session: Mutex::new(session), output_name, name })
    }
}

/// A fixed last output dimension must match the class list; dynamic (`-1`)
/// dimensions are checked per inference instead
fn check_output_width(dims: &[i64], class_count: usize) -> Result<(), ClassifierError> {
    match dims.last() {
        Some(&width) if width > 0 && width as usize != class_count => Err(ClassifierError::Load(format!(
            "model outputs {} scores but {} class names are configured",
            width, class_count
        ))),
        _ => Ok(()),
    }
}

impl ScoringModel for OnnxModel {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> ModelKind {
        ModelKind::Onnx
    }

    fn score(&self, image: &PreparedImage) -> Result<Vec<f32>, ClassifierError> {
        let [n, h, w, c] = image.shape();
        let input = Array4::<f32>::from_shape_vec((n, h, w, c), image.pixels.clone())
            .map_err(|e| ClassifierError::Inference(format!("input shape: {}", e)))?;

        let tensor = Value::from_array(input)
            .map_err(|e| ClassifierError::Inference(format!("tensor: {}", e)))?;

        let mut session = self.session.lock();
        let outputs = session
            .run(ort::inputs![tensor])
            .map_err(|e| ClassifierError::Inference(format!("run: {}", e)))?;

        let output = outputs
            .get(&self.output_name)
            .ok_or_else(|| ClassifierError::Inference("missing output".to_string()))?;

        let scores = output
            .try_extract_tensor::<f32>()
            .map_err(|e| ClassifierError::Inference(format!("extract: {}", e)))?
            .1
            .to_vec();

        Ok(scores)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_model_is_a_load_error() {
        let result = OnnxModel::load(Path::new("/nonexistent/model.onnx"), 10);
        assert!(matches!(result, Err(ClassifierError::Load(_))));
    }

    #[test]
    fn output_width_must_match_class_count() {
        assert!(check_output_width(&[1, 10], 10).is_ok());
        assert!(check_output_width(&[-1, 10], 10).is_ok());
        assert!(check_output_width(&[-1, -1], 10).is_ok());
        assert!(check_output_width(&[], 10).is_ok());
        assert!(matches!(check_output_width(&[1, 5], 10), Err(ClassifierError::Load(_))));
    }
}
