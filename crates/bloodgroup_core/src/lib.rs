//! Fingerprint validity check and blood group prediction.
//!
//! A [`PredictionSession`] owns the selected image path. Calling
//! [`PredictionSession::predict`] rejects missing selections and images that
//! fail the edge-density [`FingerprintCheck`], then runs the ONNX model on a
//! normalized 128x128x1 tensor and maps the best output to a [`BloodGroup`].

pub mod config;
pub mod labels;
pub mod model;
pub mod pipeline;
pub mod preprocess;
pub mod validity;

pub use config::{ConfigError, PipelineConfig};
pub use labels::{BloodGroup, ClassLabelTable, LabelTableError};
pub use model::{Classifier, ModelLoader, OnnxClassifier, OnnxModelLoader};
pub use pipeline::{
    CheckedImage, NO_SELECTION_MESSAGE, NOT_A_FINGERPRINT_MESSAGE, PROGRESS_MESSAGE, PredictError,
    Prediction, PredictionSession, ProgressObserver, StatusMessage, Tone,
};
pub use preprocess::{PreprocessError, add_batch_dimension, preprocess_image};
pub use validity::{EdgeDensityFilter, FingerprintCheck};

/// File extensions offered by the image picker.
pub const SUPPORTED_EXTENSIONS: [&str; 3] = ["jpg", "jpeg", "png"];

pub fn is_supported_image(path: &std::path::Path) -> bool {
    match path.extension().and_then(|s| s.to_str()) {
        Some(ext) => {
            let ext = ext.to_ascii_lowercase();
            SUPPORTED_EXTENSIONS.contains(&ext.as_str())
        }
        None => false,
    }
}
