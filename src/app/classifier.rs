use std::path::Path;

use anyhow::{Result, bail};
use tch::nn::{self, ModuleT, SequentialT};
use tch::{Device, Kind, Tensor};

const HIDDEN_UNITS: i64 = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Layer {
    /// 3x3 convolution, padding 1, followed by ReLU.
    Conv(i64),
    /// 2x2 max pooling.
    Pool,
}

use Layer::{Conv, Pool};

/// VGG16 convolutional base without its final pooling step, so the last
/// entry is the conv layer Grad-CAM reads from.
pub const VGG16_FEATURES: &[Layer] = &[
    Conv(64),
    Conv(64),
    Pool,
    Conv(128),
    Conv(128),
    Pool,
    Conv(256),
    Conv(256),
    Conv(256),
    Pool,
    Conv(512),
    Conv(512),
    Conv(512),
    Pool,
    Conv(512),
    Conv(512),
    Conv(512),
];

pub struct LeafClassifier {
    var_store: nn::VarStore,
    features: SequentialT,
    head: SequentialT,
    num_classes: i64,
    device: Device,
}

unsafe impl Send for LeafClassifier {}
unsafe impl Sync for LeafClassifier {}

impl LeafClassifier {
    /// Builds the network with freshly initialised weights.
    pub fn new(device: Device, layout: &[Layer], num_classes: i64) -> Result<Self> {
        let channels = match layout.last() {
            Some(Conv(_)) => layout
                .iter()
                .filter_map(|layer| match layer {
                    Conv(c) => Some(*c),
                    Pool => None,
                })
                .last()
                .unwrap_or_default(),
            _ => bail!("feature layout must end with a convolution"),
        };
        if num_classes < 1 {
            bail!("classifier needs at least one class");
        }

        let var_store = nn::VarStore::new(device);
        let root = var_store.root();
        let features = features(&(&root / "features"), layout);
        let head = head(&(&root / "classifier"), channels, num_classes);

        Ok(Self {
            var_store,
            features,
            head,
            num_classes,
            device,
        })
    }

    /// Builds the network and restores frozen weights from `path`.
    pub fn load(
        path: impl AsRef<Path>,
        device: Device,
        layout: &[Layer],
        num_classes: i64,
    ) -> Result<Self> {
        let mut model = Self::new(device, layout, num_classes)?;
        model.var_store.load(path.as_ref())?;
        model.var_store.freeze();
        Ok(model)
    }

    /// Activations of the last conv layer, `[N, C, h, w]`.
    pub fn features(&self, xs: &Tensor) -> Tensor {
        self.features.forward_t(xs, false)
    }

    /// Class logits computed from last-conv activations.
    pub fn head(&self, activations: &Tensor) -> Tensor {
        self.head.forward_t(activations, false)
    }

    pub fn logits(&self, xs: &Tensor) -> Tensor {
        self.head(&self.features(xs))
    }

    /// Softmax over classes for the first image of the batch.
    pub fn probabilities(&self, xs: &Tensor) -> Result<Vec<f32>, tch::TchError> {
        let probs = tch::no_grad(|| self.logits(xs).softmax(-1, Kind::Float));
        let probs = probs
            .f_select(0, 0)?
            .to_device(Device::Cpu)
            .contiguous();
        Vec::<f32>::try_from(&probs)
    }

    pub fn num_classes(&self) -> i64 {
        self.num_classes
    }

    pub fn device(&self) -> Device {
        self.device
    }
}

fn features(p: &nn::Path, layout: &[Layer]) -> SequentialT {
    let conv_config = nn::ConvConfig {
        padding: 1,
        ..Default::default()
    };
    let mut seq = nn::seq_t();
    let mut c_in = 3;
    for (idx, layer) in layout.iter().enumerate() {
        match *layer {
            Conv(c_out) => {
                seq = seq
                    .add(nn::conv2d(p / idx, c_in, c_out, 3, conv_config))
                    .add_fn(|xs| xs.relu());
                c_in = c_out;
            }
            Pool => seq = seq.add_fn(|xs| xs.max_pool2d_default(2)),
        }
    }
    seq
}

fn head(p: &nn::Path, channels: i64, num_classes: i64) -> SequentialT {
    nn::seq_t()
        .add_fn(|xs| xs.max_pool2d_default(2))
        .add_fn(|xs| xs.adaptive_avg_pool2d([1, 1]).flatten(1, -1))
        .add(nn::linear(p / "fc1", channels, HIDDEN_UNITS, Default::default()))
        .add_fn(|xs| xs.relu())
        .add_fn_t(|xs, train| xs.dropout(0.5, train))
        .add(nn::linear(p / "fc2", HIDDEN_UNITS, num_classes, Default::default()))
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use approx::assert_relative_eq;

    pub(crate) const TINY_FEATURES: &[Layer] = &[Conv(4), Pool, Conv(8)];

    pub(crate) fn tiny_classifier(num_classes: i64) -> LeafClassifier {
        tch::manual_seed(7);
        LeafClassifier::new(Device::Cpu, TINY_FEATURES, num_classes).unwrap()
    }

    #[test]
    fn test_feature_map_shape() {
        let model = tiny_classifier(10);
        let xs = Tensor::rand([1, 3, 32, 32], (Kind::Float, Device::Cpu));

        let acts = model.features(&xs);
        assert_eq!(acts.size(), vec![1, 8, 16, 16]);

        let logits = model.head(&acts);
        assert_eq!(logits.size(), vec![1, 10]);
    }

    #[test]
    fn test_vgg16_feature_stride() {
        let model = LeafClassifier::new(Device::Cpu, VGG16_FEATURES, 10).unwrap();
        let xs = Tensor::zeros([1, 3, 64, 64], (Kind::Float, Device::Cpu));
        assert_eq!(model.features(&xs).size(), vec![1, 512, 4, 4]);
    }

    #[test]
    fn test_probabilities_sum_to_one() {
        let model = tiny_classifier(10);
        let xs = Tensor::rand([1, 3, 32, 32], (Kind::Float, Device::Cpu));

        let probs = model.probabilities(&xs).unwrap();
        assert_eq!(probs.len(), 10);
        assert!(probs.iter().all(|p| (0.0..=1.0).contains(p)));
        assert_relative_eq!(probs.iter().sum::<f32>(), 1.0, epsilon = 1e-5);
    }

    #[test]
    fn test_layout_must_end_with_conv() {
        assert!(LeafClassifier::new(Device::Cpu, &[Conv(4), Pool], 10).is_err());
        assert!(LeafClassifier::new(Device::Cpu, &[], 10).is_err());
        assert!(LeafClassifier::new(Device::Cpu, TINY_FEATURES, 0).is_err());
    }

    #[test]
    fn test_load_missing_weights_fails() {
        let result = LeafClassifier::load(
            "/nonexistent/model.safetensors",
            Device::Cpu,
            TINY_FEATURES,
            10,
        );
        assert!(result.is_err());
    }
}
