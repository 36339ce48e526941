//! Prediction session: holds the selected image and drives validity check,
//! preprocessing, model inference and result formatting.

use crate::config::PipelineConfig;
use crate::labels::{BloodGroup, ClassLabelTable};
use crate::model::{Classifier, ModelLoader, OnnxModelLoader, best_class, softmax};
use crate::preprocess::{PreprocessError, add_batch_dimension, preprocess_image};
use crate::validity::{EdgeDensityFilter, FingerprintCheck};
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const NO_SELECTION_MESSAGE: &str = "Please upload a fingerprint image first.";
pub const NOT_A_FINGERPRINT_MESSAGE: &str = "Uploaded image is not a valid fingerprint.";
pub const PROGRESS_MESSAGE: &str = "Prediction in Progress...";

#[derive(Debug, Error)]
pub enum PredictError {
    #[error("no image selected")]
    NoSelection,
    #[error("{} did not pass the fingerprint check", .0.display())]
    NotAFingerprint(PathBuf),
    #[error("model unavailable: {0}")]
    ModelUnavailable(String),
    #[error(transparent)]
    UnreadableImage(#[from] PreprocessError),
    #[error("inference failed: {0}")]
    InferenceFailed(String),
}

impl PredictError {
    /// Text shown to the user for this failure.
    pub fn user_message(&self) -> String {
        match self {
            PredictError::NoSelection => NO_SELECTION_MESSAGE.to_string(),
            PredictError::NotAFingerprint(_) => NOT_A_FINGERPRINT_MESSAGE.to_string(),
            PredictError::ModelUnavailable(detail) | PredictError::InferenceFailed(detail) => {
                format!("Error: {detail}")
            }
            PredictError::UnreadableImage(e) => format!("Error: {e}"),
        }
    }
}

/// Winning class and its probability.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Prediction {
    pub group: BloodGroup,
    /// Probability in [0,1].
    pub confidence: f32,
}

impl Prediction {
    /// Confidence in [0,100].
    pub fn confidence_percent(&self) -> f32 {
        self.confidence * 100.0
    }

    pub fn confidence_label(&self) -> String {
        format!("{:.2}%", self.confidence_percent())
    }

    pub fn summary(&self) -> String {
        format!(
            "Predicted Blood Group: {} ({} confidence)",
            self.group,
            self.confidence_label()
        )
    }
}

/// How a status line should be rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tone {
    Success,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusMessage {
    pub text: String,
    pub tone: Tone,
}

impl StatusMessage {
    pub fn from_outcome(outcome: &Result<Prediction, PredictError>) -> Self {
        match outcome {
            Ok(prediction) => Self {
                text: prediction.summary(),
                tone: Tone::Success,
            },
            Err(e) => Self {
                text: e.user_message(),
                tone: Tone::Error,
            },
        }
    }
}

/// Receives show/hide notifications for the transient progress indicator.
pub trait ProgressObserver {
    fn started(&mut self);
    fn finished(&mut self);
}

/// Observer for callers that show no progress.
impl ProgressObserver for () {
    fn started(&mut self) {}
    fn finished(&mut self) {}
}

/// Hides the indicator when dropped, whichever way the prediction ends.
struct InFlight<'a> {
    observer: &'a mut dyn ProgressObserver,
}

impl<'a> InFlight<'a> {
    fn start(observer: &'a mut dyn ProgressObserver) -> Self {
        observer.started();
        Self { observer }
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.observer.finished();
    }
}

/// A selected image that passed the fingerprint check.
///
/// Only [`PredictionSession::check_preconditions`] hands these out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckedImage(PathBuf);

impl CheckedImage {
    pub fn path(&self) -> &Path {
        &self.0
    }
}

/// Per-window state: the selected image plus everything needed to classify it.
pub struct PredictionSession {
    selected: Option<PathBuf>,
    config: PipelineConfig,
    labels: ClassLabelTable,
    check: Box<dyn FingerprintCheck>,
    loader: Box<dyn ModelLoader>,
    cached: Option<Box<dyn Classifier>>,
}

impl PredictionSession {
    /// Session with the edge-density filter and the ONNX model from `config`.
    pub fn new(config: PipelineConfig) -> Self {
        let check = Box::new(EdgeDensityFilter::from_config(&config));
        let loader = Box::new(OnnxModelLoader::new(config.model_path.clone()));
        Self::with_parts(config, ClassLabelTable::default(), check, loader)
    }

    pub fn with_parts(
        config: PipelineConfig,
        labels: ClassLabelTable,
        check: Box<dyn FingerprintCheck>,
        loader: Box<dyn ModelLoader>,
    ) -> Self {
        Self {
            selected: None,
            config,
            labels,
            check,
            loader,
            cached: None,
        }
    }

    /// Replace the selection; an empty path clears it.
    pub fn select_image(&mut self, path: impl Into<PathBuf>) {
        let path = path.into();
        if path.as_os_str().is_empty() {
            self.selected = None;
        } else {
            tracing::info!("selected {}", path.display());
            self.selected = Some(path);
        }
    }

    pub fn clear_selection(&mut self) {
        self.selected = None;
    }

    pub fn selected_image(&self) -> Option<&Path> {
        self.selected.as_deref()
    }

    pub fn has_cached_model(&self) -> bool {
        self.cached.is_some()
    }

    /// The selected path, provided one is set and it passes the fingerprint check.
    pub fn check_preconditions(&self) -> Result<CheckedImage, PredictError> {
        let path = self.selected.clone().ok_or(PredictError::NoSelection)?;
        if !self.check.is_fingerprint(&path) {
            return Err(PredictError::NotAFingerprint(path));
        }
        Ok(CheckedImage(path))
    }

    /// Check preconditions, then load, preprocess and classify the selected image.
    ///
    /// `progress` is notified only once the preconditions hold, and is always
    /// told the prediction finished before this returns.
    pub fn predict(
        &mut self,
        progress: &mut dyn ProgressObserver,
    ) -> Result<Prediction, PredictError> {
        let image = self.check_preconditions()?;
        self.predict_checked(&image, progress)
    }

    /// Classify an image whose preconditions were already checked, without
    /// running the fingerprint check again.
    pub fn predict_checked(
        &mut self,
        image: &CheckedImage,
        progress: &mut dyn ProgressObserver,
    ) -> Result<Prediction, PredictError> {
        let path = image.path();
        let _in_flight = InFlight::start(progress);
        let result = self.run_model(path);
        match &result {
            Ok(p) => tracing::info!(
                "predicted {} ({}) for {}",
                p.group,
                p.confidence_label(),
                path.display()
            ),
            Err(e) => tracing::warn!("prediction failed for {}: {e}", path.display()),
        }
        result
    }

    fn run_model(&mut self, path: &Path) -> Result<Prediction, PredictError> {
        let fresh;
        let classifier: &dyn Classifier = if self.config.cache_model {
            if self.cached.is_none() {
                self.cached = Some(self.load_model()?);
            }
            match self.cached.as_deref() {
                Some(c) => c,
                None => return Err(PredictError::ModelUnavailable("model cache empty".into())),
            }
        } else {
            fresh = self.load_model()?;
            fresh.as_ref()
        };

        let tensor = preprocess_image(path, self.config.input_width, self.config.input_height)?;
        let batch = add_batch_dimension(tensor);
        let raw = classifier
            .predict(&batch)
            .map_err(|e| PredictError::InferenceFailed(format!("{e:#}")))?;
        interpret_output(&raw, &self.labels, self.config.apply_softmax)
    }

    fn load_model(&self) -> Result<Box<dyn Classifier>, PredictError> {
        self.loader
            .load()
            .map_err(|e| PredictError::ModelUnavailable(format!("{e:#}")))
    }
}

/// Validate the model output and map its best entry to a blood group.
pub fn interpret_output(
    raw: &[f32],
    labels: &ClassLabelTable,
    apply_softmax: bool,
) -> Result<Prediction, PredictError> {
    if raw.len() != labels.len() {
        return Err(PredictError::InferenceFailed(format!(
            "model returned {} scores, expected {}",
            raw.len(),
            labels.len()
        )));
    }
    if raw.iter().any(|v| !v.is_finite()) {
        return Err(PredictError::InferenceFailed(
            "model returned non-finite scores".into(),
        ));
    }
    let probs = if apply_softmax {
        softmax(raw)
    } else {
        raw.to_vec()
    };
    let (index, prob) = best_class(&probs)
        .ok_or_else(|| PredictError::InferenceFailed("model returned no scores".into()))?;
    let group = labels.get(index).ok_or_else(|| {
        PredictError::InferenceFailed(format!("no blood group for output index {index}"))
    })?;
    Ok(Prediction {
        group,
        confidence: prob.clamp(0.0, 1.0),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rstest::rstest;

    #[rstest]
    #[case(&[0.05, 0.85, 0.05, 0.05], BloodGroup::B, "85.00%")]
    #[case(&[0.9, 0.05, 0.03, 0.02], BloodGroup::A, "90.00%")]
    #[case(&[0.1, 0.1, 0.7, 0.1], BloodGroup::AB, "70.00%")]
    #[case(&[0.0, 0.0, 0.0, 1.0], BloodGroup::O, "100.00%")]
    fn output_maps_to_label_and_percentage(
        #[case] raw: &[f32],
        #[case] group: BloodGroup,
        #[case] label: &str,
    ) {
        let p = interpret_output(raw, &ClassLabelTable::default(), false).unwrap();
        assert_eq!(p.group, group);
        assert_eq!(p.confidence_label(), label);
    }

    #[test]
    fn summary_matches_display_format() {
        let p = Prediction {
            group: BloodGroup::B,
            confidence: 0.85,
        };
        assert_eq!(p.summary(), "Predicted Blood Group: B (85.00% confidence)");
    }

    #[test]
    fn wrong_output_length_is_inference_failure() {
        let err = interpret_output(&[0.5, 0.5], &ClassLabelTable::default(), false).unwrap_err();
        assert!(matches!(err, PredictError::InferenceFailed(_)));
        assert!(err.user_message().starts_with("Error: "));
    }

    #[test]
    fn nan_output_is_inference_failure() {
        let err = interpret_output(&[f32::NAN, 0.2, 0.3, 0.1], &ClassLabelTable::default(), false)
            .unwrap_err();
        assert!(matches!(err, PredictError::InferenceFailed(_)));
    }

    #[test]
    fn out_of_range_scores_are_clamped() {
        let p = interpret_output(&[0.1, 1.7, 0.2, -0.3], &ClassLabelTable::default(), false)
            .unwrap();
        assert_eq!(p.group, BloodGroup::B);
        assert_eq!(p.confidence, 1.0);
        assert!((0.0..=100.0).contains(&p.confidence_percent()));
    }

    #[test]
    fn logits_are_normalized_when_requested() {
        let p = interpret_output(&[0.0, 0.0, 0.0, 0.0], &ClassLabelTable::default(), true)
            .unwrap();
        assert_eq!(p.group, BloodGroup::A);
        assert_relative_eq!(p.confidence, 0.25, epsilon = 1e-6);
    }

    #[test]
    fn each_error_kind_has_its_own_message() {
        assert_eq!(
            PredictError::NoSelection.user_message(),
            "Please upload a fingerprint image first."
        );
        assert_eq!(
            PredictError::NotAFingerprint(PathBuf::from("x.png")).user_message(),
            "Uploaded image is not a valid fingerprint."
        );
        assert_eq!(
            PredictError::ModelUnavailable("model file is missing: m.onnx".into()).user_message(),
            "Error: model file is missing: m.onnx"
        );
        assert_eq!(
            PredictError::InferenceFailed("shape mismatch".into()).user_message(),
            "Error: shape mismatch"
        );
    }

    #[test]
    fn status_tone_follows_outcome() {
        let ok: Result<Prediction, PredictError> = Ok(Prediction {
            group: BloodGroup::O,
            confidence: 0.5,
        });
        assert_eq!(StatusMessage::from_outcome(&ok).tone, Tone::Success);
        let err: Result<Prediction, PredictError> = Err(PredictError::NoSelection);
        let status = StatusMessage::from_outcome(&err);
        assert_eq!(status.tone, Tone::Error);
        assert_eq!(status.text, NO_SELECTION_MESSAGE);
    }

    #[test]
    fn unit_observer_works_for_headless_callers() {
        let mut session = PredictionSession::new(PipelineConfig::default());
        let err = session.predict(&mut ()).unwrap_err();
        assert!(matches!(err, PredictError::NoSelection));
    }

    #[test]
    fn empty_path_clears_selection() {
        let mut session = PredictionSession::new(PipelineConfig::default());
        session.select_image("finger.png");
        assert_eq!(session.selected_image(), Some(Path::new("finger.png")));
        session.select_image("");
        assert_eq!(session.selected_image(), None);
        session.select_image("other.jpg");
        session.clear_selection();
        assert_eq!(session.selected_image(), None);
    }
}
