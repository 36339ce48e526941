//! Model loading and inference behind two small traits so the session can be
//! exercised without an ONNX file.

use anyhow::{Context, Result, anyhow};
use ndarray::{Array4, CowArray};
use once_cell::sync::OnceCell;
use ort::{
    GraphOptimizationLevel, SessionBuilder, environment::Environment, session::Session,
    tensor::OrtOwnedTensor, value::Value,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Runs one batch through the network and returns the raw output vector.
pub trait Classifier {
    fn predict(&self, batch: &Array4<f32>) -> Result<Vec<f32>>;
}

/// Produces a ready classifier; called once per prediction unless cached.
pub trait ModelLoader {
    fn load(&self) -> Result<Box<dyn Classifier>>;
}

static ORT_ENV: OnceCell<Arc<Environment>> = OnceCell::new();

fn environment() -> Result<Arc<Environment>> {
    ORT_ENV
        .get_or_try_init(|| -> Result<Arc<Environment>> {
            let env = Environment::builder()
                .with_name("bloodgroup-predictor")
                .build()
                .context("failed to initialize ONNX Runtime environment")?;
            Ok(env.into_arc())
        })
        .cloned()
}

/// Blood group network exported to ONNX, run through ONNX Runtime.
pub struct OnnxClassifier {
    session: Session,
}

impl OnnxClassifier {
    pub fn new(model_path: &Path) -> Result<Self> {
        if !model_path.exists() {
            anyhow::bail!("model file is missing: {}", model_path.display());
        }
        let env = environment()?;
        let session = SessionBuilder::new(&env)?
            .with_optimization_level(GraphOptimizationLevel::Level1)?
            .with_model_from_file(model_path)
            .with_context(|| format!("cannot load model {}", model_path.display()))?;
        tracing::info!("loaded model {}", model_path.display());
        Ok(Self { session })
    }
}

impl Classifier for OnnxClassifier {
    fn predict(&self, batch: &Array4<f32>) -> Result<Vec<f32>> {
        let input_array = batch.clone().into_dyn();
        let cow = CowArray::from(input_array.view());
        let input = Value::from_array(self.session.allocator(), &cow)
            .map_err(|e| anyhow!("cannot build input tensor: {e}"))?;
        let outputs: Vec<Value> = self.session.run(vec![input])?;
        let Some(first) = outputs.first() else {
            anyhow::bail!("model returned no outputs");
        };
        let probs: OrtOwnedTensor<f32, _> = first.try_extract()?;
        let scores: Vec<f32> = probs.view().iter().cloned().collect();
        Ok(scores)
    }
}

/// Loads [`OnnxClassifier`] from a fixed path.
#[derive(Debug, Clone)]
pub struct OnnxModelLoader {
    pub model_path: PathBuf,
}

impl OnnxModelLoader {
    pub fn new(model_path: impl Into<PathBuf>) -> Self {
        Self {
            model_path: model_path.into(),
        }
    }
}

impl ModelLoader for OnnxModelLoader {
    fn load(&self) -> Result<Box<dyn Classifier>> {
        Ok(Box::new(OnnxClassifier::new(&self.model_path)?))
    }
}

pub fn softmax(logits: &[f32]) -> Vec<f32> {
    let max = logits.iter().cloned().fold(f32::NEG_INFINITY, f32::max);
    let exps: Vec<f32> = logits.iter().map(|&x| (x - max).exp()).collect();
    let sum: f32 = exps.iter().sum();
    if sum == 0.0 {
        return vec![0.0; logits.len()];
    }
    exps.into_iter().map(|x| x / sum).collect()
}

/// Index and value of the highest score; the first one wins on ties.
pub fn best_class(scores: &[f32]) -> Option<(usize, f32)> {
    scores
        .iter()
        .copied()
        .enumerate()
        .fold(None, |best, (idx, score)| match best {
            Some((_, top)) if score <= top => best,
            _ => Some((idx, score)),
        })
}
