use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info};

use crate::app::{
    classifier::LeafClassifier,
    config::Normalization,
    diseases::{self, DiseaseInfo},
    error::DetectError,
    gradcam, image_utils, overlay,
};

#[derive(Debug, Clone)]
pub struct DetectorSettings {
    pub input_size: u32,
    pub normalization: Normalization,
    pub threshold: f64,
    pub overlay_alpha: f32,
}

#[derive(Debug, Serialize)]
pub struct Detection {
    #[serde(rename = "class")]
    pub class_name: String,
    pub confidence: f64,
    pub all_probabilities: Vec<f64>,
    pub original_image: String,
    pub gradcam_image: String,
    pub disease_info: DiseaseInfo,
}

pub struct Detector {
    model: Arc<LeafClassifier>,
    settings: DetectorSettings,
}

impl Detector {
    pub fn new(model: Arc<LeafClassifier>, settings: DetectorSettings) -> Self {
        Self { model, settings }
    }

    pub fn settings(&self) -> &DetectorSettings {
        &self.settings
    }

    pub fn model(&self) -> &LeafClassifier {
        &self.model
    }

    /// Classifies one upload and renders its Grad-CAM overlay.
    pub fn detect(&self, image_data: &[u8]) -> Result<Detection, DetectError> {
        let rgb = image_utils::load_rgb(image_data, self.settings.input_size)?;
        let input = image_utils::to_input_tensor(&rgb, self.settings.normalization, self.model.device());

        let probabilities = self.model.probabilities(&input)?;
        let (class_index, confidence) = argmax(&probabilities);
        let confidence = confidence as f64;
        debug!(class_index, confidence, "classified");

        if confidence < self.settings.threshold {
            return Err(DetectError::LowConfidence {
                class_index,
                confidence,
            });
        }

        let heatmap = gradcam::grad_cam(&self.model, &input, class_index as i64)?;
        debug!(peak = ?heatmap.peak(), "grad-cam hot spot");
        let superimposed = overlay::superimpose(&rgb, &heatmap, self.settings.overlay_alpha);

        let class_name = diseases::by_index(class_index)
            .map(|d| d.name.to_string())
            .unwrap_or_else(|| format!("Class {}", class_index));

        info!(class = %class_name, confidence, "detection complete");

        Ok(Detection {
            disease_info: diseases::info_for(&class_name),
            class_name,
            confidence,
            all_probabilities: probabilities.iter().map(|&p| p as f64).collect(),
            original_image: image_utils::encode_jpeg_base64(&rgb)?,
            gradcam_image: image_utils::encode_jpeg_base64(&superimposed)?,
        })
    }
}

/// Index and value of the largest entry; the first one wins on ties.
fn argmax(values: &[f32]) -> (usize, f32) {
    values
        .iter()
        .copied()
        .enumerate()
        .fold((0, f32::NEG_INFINITY), |best, (i, v)| {
            if v > best.1 { (i, v) } else { best }
        })
}
