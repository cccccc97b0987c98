//! Gradient-weighted class activation maps.
//!
//! The class logit is back-propagated to the activations of the last
//! convolutional layer; the per-channel mean of those gradients weights the
//! activation channels, and the rectified sum is scaled into `[0, 1]`.

use tch::{Device, Kind, TchError, Tensor};
use tracing::debug;

use crate::app::classifier::LeafClassifier;

#[derive(Debug, Clone, PartialEq)]
pub struct Heatmap {
    pub width: u32,
    pub height: u32,
    /// Row-major, one value per cell, each in `[0, 1]`.
    pub values: Vec<f32>,
}

impl Heatmap {
    pub fn get(&self, x: u32, y: u32) -> f32 {
        self.values[(y * self.width + x) as usize]
    }

    pub fn peak(&self) -> (u32, u32) {
        let idx = self
            .values
            .iter()
            .enumerate()
            .fold(0, |best, (i, v)| if *v > self.values[best] { i } else { best });
        (idx as u32 % self.width, idx as u32 / self.width)
    }
}

/// Grad-CAM of `class_index` for the first image in `input`.
pub fn grad_cam(
    model: &LeafClassifier,
    input: &Tensor,
    class_index: i64,
) -> Result<Heatmap, TchError> {
    if class_index < 0 || class_index >= model.num_classes() {
        return Err(TchError::Kind(format!(
            "class index {class_index} out of range for {} classes",
            model.num_classes()
        )));
    }

    let activations = tch::no_grad(|| model.features(input))
        .detach()
        .set_requires_grad(true);
    let logits = model.head(&activations);
    let score = logits.f_select(1, class_index)?.sum(Kind::Float);

    let gradients = Tensor::f_run_backward(&[&score], &[&activations], false, false)?
        .into_iter()
        .next()
        .ok_or_else(|| TchError::Kind("no gradient for last conv activations".into()))?;

    heatmap_from_gradients(&activations.detach(), &gradients)
}

/// Combines last-conv activations and their gradients, both `[N, C, h, w]`.
pub fn heatmap_from_gradients(
    activations: &Tensor,
    gradients: &Tensor,
) -> Result<Heatmap, TchError> {
    let (_, channels, height, width) = activations.size4()?;

    let weights = gradients.f_mean_dim([0i64, 2, 3].as_slice(), false, Kind::Float)?;
    let weighted = activations.f_select(0, 0)? * weights.f_view([channels, 1, 1])?;
    let cam = weighted
        .f_sum_dim_intlist([0i64].as_slice(), false, Kind::Float)?
        .clamp_min(0.0);

    let peak = cam.max().double_value(&[]);
    debug!(peak, height, width, "grad-cam raw peak");
    let cam = if peak.is_finite() && peak > 0.0 {
        cam / peak
    } else {
        cam.zeros_like()
    };

    let cam = cam.to_device(Device::Cpu).contiguous().view([-1i64]);
    let values = Vec::<f32>::try_from(&cam)?;

    Ok(Heatmap {
        width: width as u32,
        height: height as u32,
        values,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::classifier::tests::tiny_classifier;
    use approx::assert_relative_eq;

    fn tensor4(data: &[f32], shape: [i64; 4]) -> Tensor {
        Tensor::from_slice(data).reshape(shape)
    }

    #[test]
    fn test_weighted_sum_is_rectified_and_normalized() {
        // two channels, 2x2
        let acts = tensor4(&[1.0, 2.0, 3.0, 4.0, 4.0, 0.0, 0.0, 1.0], [1, 2, 2, 2]);
        // channel 0 mean gradient 1.0, channel 1 mean gradient -0.5
        let grads = tensor4(&[1.0, 1.0, 1.0, 1.0, -0.5, -0.5, -0.5, -0.5], [1, 2, 2, 2]);

        let heatmap = heatmap_from_gradients(&acts, &grads).unwrap();
        assert_eq!((heatmap.width, heatmap.height), (2, 2));

        // raw: [1 - 2, 2 - 0, 3 - 0, 4 - 0.5] = [-1, 2, 3, 3.5]
        let expected = [0.0, 2.0 / 3.5, 3.0 / 3.5, 1.0];
        for (got, want) in heatmap.values.iter().zip(expected) {
            assert_relative_eq!(*got, want, epsilon = 1e-6);
        }
        assert_eq!(heatmap.peak(), (1, 1));
    }

    #[test]
    fn test_all_negative_map_is_zero_not_nan() {
        let acts = tensor4(&[1.0, 1.0, 1.0, 1.0], [1, 1, 2, 2]);
        let grads = tensor4(&[-1.0, -1.0, -1.0, -1.0], [1, 1, 2, 2]);

        let heatmap = heatmap_from_gradients(&acts, &grads).unwrap();
        assert!(heatmap.values.iter().all(|v| *v == 0.0));
    }

    #[test]
    fn test_grad_cam_on_model() {
        let model = tiny_classifier(10);
        let input = Tensor::rand([1, 3, 32, 32], (Kind::Float, Device::Cpu));

        let heatmap = grad_cam(&model, &input, 3).unwrap();
        assert_eq!((heatmap.width, heatmap.height), (16, 16));
        assert_eq!(heatmap.values.len(), 256);
        assert!(heatmap.values.iter().all(|v| (0.0..=1.0).contains(v)));

        let max = heatmap.values.iter().cloned().fold(0.0f32, f32::max);
        assert!(max == 0.0 || (max - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_grad_cam_rejects_unknown_class() {
        let model = tiny_classifier(10);
        let input = Tensor::rand([1, 3, 32, 32], (Kind::Float, Device::Cpu));

        assert!(grad_cam(&model, &input, 10).is_err());
        assert!(grad_cam(&model, &input, -1).is_err());
    }
}
