//! SkinNet classifier architecture.
//!
//! An EfficientNetV2-flavored convolutional classifier: a strided stem,
//! a stack of depthwise-separable mobile blocks, a 1x1 `top_conv`, global
//! average pooling, and a dense softmax head. The forward path can expose a
//! named layer's activation as a second output for gradient-based
//! explanation, so no layer-behavior substitution is ever needed.

use burn::module::Ignored;
use burn::nn::{
    conv::{Conv2d, Conv2dConfig},
    pool::{AdaptiveAvgPool2d, AdaptiveAvgPool2dConfig},
    BatchNorm, BatchNormConfig, Linear, LinearConfig, PaddingConfig2d,
};
use burn::prelude::*;
use burn::tensor::activation::{silu, softmax};
use serde::{Deserialize, Serialize};

use dermal_core::{ImageTensor, ImgShape, DEFAULT_IMG_SIZE};

use crate::error::{ModelError, Result};
use crate::layers::{LayerKind, LayerRef, LayerTree};

/// Configuration for the SkinNet classifier.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SkinNetConfig {
    /// Number of output classes.
    pub n_classes: usize,
    /// Square input edge length.
    pub image_size: usize,
    /// Channels produced by the stem convolution.
    pub stem_channels: usize,
    /// Number of mobile blocks.
    pub n_blocks: usize,
    /// Channel expansion factor inside each block.
    pub expansion: usize,
    /// Channels produced by the top convolution.
    pub head_channels: usize,
}

impl Default for SkinNetConfig {
    fn default() -> Self {
        Self {
            n_classes: 7,
            image_size: DEFAULT_IMG_SIZE,
            stem_channels: 24,
            n_blocks: 4,
            expansion: 4,
            head_channels: 256,
        }
    }
}

impl SkinNetConfig {
    /// Create a new config with the specified class count and input size.
    pub fn new(n_classes: usize, image_size: usize) -> Self {
        Self {
            n_classes,
            image_size,
            ..Default::default()
        }
    }

    /// Set the stem width.
    #[must_use]
    pub fn with_stem_channels(mut self, stem_channels: usize) -> Self {
        self.stem_channels = stem_channels;
        self
    }

    /// Set the number of mobile blocks.
    #[must_use]
    pub fn with_n_blocks(mut self, n_blocks: usize) -> Self {
        self.n_blocks = n_blocks;
        self
    }

    /// Set the top convolution width.
    #[must_use]
    pub fn with_head_channels(mut self, head_channels: usize) -> Self {
        self.head_channels = head_channels;
        self
    }

    /// Output channels of block `i` (zero-based).
    fn block_channels(&self, i: usize) -> usize {
        (self.stem_channels << (i + 1)).min(256)
    }

    /// Initialize the model.
    pub fn init<B: Backend>(&self, device: &B::Device) -> SkinNet<B> {
        let stem_conv = Conv2dConfig::new([3, self.stem_channels], [3, 3])
            .with_stride([2, 2])
            .with_padding(PaddingConfig2d::Explicit(1, 1))
            .with_bias(false)
            .init(device);
        let stem_bn = BatchNormConfig::new(self.stem_channels).init(device);

        let mut blocks = Vec::with_capacity(self.n_blocks);
        let mut c_in = self.stem_channels;
        for i in 0..self.n_blocks {
            let c_out = self.block_channels(i);
            let stride = if i == 0 { 1 } else { 2 };
            blocks.push(MbBlock::new(c_in, c_out, stride, self.expansion, device));
            c_in = c_out;
        }

        let top_conv = Conv2dConfig::new([c_in, self.head_channels], [1, 1])
            .with_bias(false)
            .init(device);
        let top_bn = BatchNormConfig::new(self.head_channels).init(device);
        let avg_pool = AdaptiveAvgPool2dConfig::new([1, 1]).init();
        let classifier = LinearConfig::new(self.head_channels, self.n_classes).init(device);

        SkinNet {
            stem_conv,
            stem_bn,
            blocks,
            top_conv,
            top_bn,
            avg_pool,
            classifier,
            input_shape: Ignored(ImgShape::square(self.image_size)),
        }
    }
}

/// Record a layer's output into the capture slot when its name matches the
/// target, re-marking it as a differentiable leaf so the class-score
/// gradient with respect to it stays retrievable after backward.
fn tap<B: Backend>(
    out: Tensor<B, 4>,
    name: &str,
    target: Option<&str>,
    slot: &mut Option<Tensor<B, 4>>,
) -> Tensor<B, 4> {
    if target == Some(name) {
        let out = out.detach().require_grad();
        *slot = Some(out.clone());
        out
    } else {
        out
    }
}

/// Mobile inverted-bottleneck block.
///
/// Expand 1x1 conv, depthwise conv, project 1x1 conv, each with batch norm;
/// residual connection when the block preserves shape.
#[derive(Module, Debug)]
pub struct MbBlock<B: Backend> {
    expand: Conv2d<B>,
    bn1: BatchNorm<B, 2>,
    dwconv: Conv2d<B>,
    bn2: BatchNorm<B, 2>,
    project: Conv2d<B>,
    bn3: BatchNorm<B, 2>,
    residual: Ignored<bool>,
}

impl<B: Backend> MbBlock<B> {
    /// Create a new block.
    pub fn new(
        in_channels: usize,
        out_channels: usize,
        stride: usize,
        expansion: usize,
        device: &B::Device,
    ) -> Self {
        let mid = in_channels * expansion;

        let expand = Conv2dConfig::new([in_channels, mid], [1, 1])
            .with_bias(false)
            .init(device);
        let bn1 = BatchNormConfig::new(mid).init(device);

        // Depthwise: each channel convolved separately.
        let dwconv = Conv2dConfig::new([mid, mid], [3, 3])
            .with_stride([stride, stride])
            .with_padding(PaddingConfig2d::Explicit(1, 1))
            .with_groups(mid)
            .with_bias(false)
            .init(device);
        let bn2 = BatchNormConfig::new(mid).init(device);

        let project = Conv2dConfig::new([mid, out_channels], [1, 1])
            .with_bias(false)
            .init(device);
        let bn3 = BatchNormConfig::new(out_channels).init(device);

        Self {
            expand,
            bn1,
            dwconv,
            bn2,
            project,
            bn3,
            residual: Ignored(stride == 1 && in_channels == out_channels),
        }
    }

    /// Forward pass.
    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        self.forward_capture(x, "", None, &mut None)
    }

    /// Forward pass that records the named sub-layer's output, if targeted.
    pub fn forward_capture(
        &self,
        x: Tensor<B, 4>,
        prefix: &str,
        target: Option<&str>,
        slot: &mut Option<Tensor<B, 4>>,
    ) -> Tensor<B, 4> {
        let shortcut = self.residual.0.then(|| x.clone());

        let h = tap(
            self.expand.forward(x),
            &format!("{prefix}.expand_conv"),
            target,
            slot,
        );
        let h = silu(self.bn1.forward(h));
        let h = tap(
            self.dwconv.forward(h),
            &format!("{prefix}.dwconv"),
            target,
            slot,
        );
        let h = silu(self.bn2.forward(h));
        let h = tap(
            self.project.forward(h),
            &format!("{prefix}.project_conv"),
            target,
            slot,
        );
        let h = self.bn3.forward(h);

        match shortcut {
            Some(s) => h + s,
            None => h,
        }
    }
}

/// The skin-condition classifier.
#[derive(Module, Debug)]
pub struct SkinNet<B: Backend> {
    stem_conv: Conv2d<B>,
    stem_bn: BatchNorm<B, 2>,
    blocks: Vec<MbBlock<B>>,
    top_conv: Conv2d<B>,
    top_bn: BatchNorm<B, 2>,
    avg_pool: AdaptiveAvgPool2d,
    classifier: Linear<B>,
    input_shape: Ignored<ImgShape>,
}

impl<B: Backend> SkinNet<B> {
    /// The input shape this model was built for.
    #[must_use]
    pub fn input_shape(&self) -> ImgShape {
        self.input_shape.0
    }

    /// Forward pass returning logits of shape `(1, n_classes)`.
    ///
    /// Inference-mode only: the architecture carries no training-time
    /// behaviors such as dropout, so outputs are deterministic for fixed
    /// weights.
    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 2> {
        self.forward_with_capture(x, None).0
    }

    /// Forward pass returning class probabilities.
    pub fn forward_probs(&self, x: Tensor<B, 4>) -> Tensor<B, 2> {
        softmax(self.forward(x), 1)
    }

    /// Forward pass that additionally exposes the target layer's output.
    ///
    /// When `target` names a layer on the executed path, its activation is
    /// returned as the second output; otherwise the slot comes back `None`.
    pub fn forward_with_capture(
        &self,
        x: Tensor<B, 4>,
        target: Option<&LayerRef>,
    ) -> (Tensor<B, 2>, Option<Tensor<B, 4>>) {
        let mut slot = None;
        let t = target.map(LayerRef::name);

        let h = tap(self.stem_conv.forward(x), "stem_conv", t, &mut slot);
        let mut h = silu(self.stem_bn.forward(h));
        for (i, block) in self.blocks.iter().enumerate() {
            h = block.forward_capture(h, &format!("block{}", i + 1), t, &mut slot);
        }
        let h = tap(self.top_conv.forward(h), "top_conv", t, &mut slot);
        let h = silu(self.top_bn.forward(h));
        let h = self.avg_pool.forward(h);
        let h = h.flatten::<2>(1, 3);
        let logits = self.classifier.forward(h);

        (logits, slot)
    }

    /// Classify a preprocessed image, returning per-class probabilities.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::ShapeMismatch`] when the tensor does not match
    /// the declared input shape; the preprocessing selector interprets this
    /// as "try the next candidate".
    pub fn predict(&self, input: &ImageTensor<B>) -> Result<Vec<f32>> {
        let expected = self.input_shape.0;
        if input.shape() != expected {
            return Err(ModelError::ShapeMismatch {
                expected: expected.to_string(),
                got: input.shape().to_string(),
            });
        }

        let probs = self.forward_probs(input.inner().clone());
        probs
            .into_data()
            .to_vec::<f32>()
            .map_err(|e| ModelError::Readback(format!("{e:?}")))
    }

    /// Describe the model graph as an arena layer tree.
    pub fn layer_tree(&self) -> LayerTree {
        let mut tree = LayerTree::new();
        tree.push_root("stem_conv", LayerKind::Conv);
        for i in 1..=self.blocks.len() {
            let prefix = format!("block{i}");
            let c1 = tree.push_node(format!("{prefix}.expand_conv"), LayerKind::Conv);
            let c2 = tree.push_node(format!("{prefix}.dwconv"), LayerKind::DepthwiseConv);
            let c3 = tree.push_node(format!("{prefix}.project_conv"), LayerKind::Conv);
            tree.push_root_block(prefix, vec![c1, c2, c3]);
        }
        tree.push_root("top_conv", LayerKind::Conv);
        tree.push_root("avg_pool", LayerKind::Pool);
        tree.push_root("classifier", LayerKind::Dense);
        tree
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layers::find_explainable_layer;
    use burn_ndarray::NdArray;

    fn tiny_config() -> SkinNetConfig {
        SkinNetConfig::new(7, 32)
            .with_stem_channels(4)
            .with_n_blocks(2)
            .with_head_channels(16)
    }

    #[test]
    fn test_forward_shape() {
        let device = Default::default();
        let model: SkinNet<NdArray> = tiny_config().init(&device);
        let x = Tensor::zeros([1, 3, 32, 32], &device);
        let logits = model.forward(x);
        assert_eq!(logits.dims(), [1, 7]);
    }

    #[test]
    fn test_probs_sum_to_one() {
        let device = Default::default();
        let model: SkinNet<NdArray> = tiny_config().init(&device);
        let x = Tensor::ones([1, 3, 32, 32], &device);
        let probs = model.forward_probs(x);
        let sum: f32 = probs.sum().into_scalar().elem();
        assert!((sum - 1.0).abs() < 1e-4);
    }

    #[test]
    fn test_predict_shape_mismatch() {
        let device = Default::default();
        let model: SkinNet<NdArray> = tiny_config().init(&device);
        let input =
            ImageTensor::new(Tensor::zeros([1, 3, 16, 16], &device), "div255").unwrap();
        assert!(matches!(
            model.predict(&input),
            Err(ModelError::ShapeMismatch { .. })
        ));
    }

    #[test]
    fn test_capture_on_executed_path() {
        let device = Default::default();
        let model: SkinNet<NdArray> = tiny_config().init(&device);
        let x = Tensor::zeros([1, 3, 32, 32], &device);
        let layer = LayerRef::new("top_conv");
        let (logits, captured) = model.forward_with_capture(x, Some(&layer));
        assert_eq!(logits.dims(), [1, 7]);
        let captured = captured.expect("top_conv is always on the executed path");
        assert_eq!(captured.dims()[1], 16);
    }

    #[test]
    fn test_capture_missing_layer_is_none() {
        let device = Default::default();
        let model: SkinNet<NdArray> = tiny_config().init(&device);
        let x = Tensor::zeros([1, 3, 32, 32], &device);
        let layer = LayerRef::new("block9.dwconv");
        let (_, captured) = model.forward_with_capture(x, Some(&layer));
        assert!(captured.is_none());
    }

    #[test]
    fn test_layer_tree_matches_capture_names() {
        let device = Default::default();
        let model: SkinNet<NdArray> = tiny_config().init(&device);
        let tree = model.layer_tree();

        assert!(tree.resolve("block2.dwconv").is_some());
        assert!(tree.resolve("top_conv").is_some());

        let target = find_explainable_layer(&tree).unwrap();
        assert_eq!(target.name(), "top_conv");

        // The located layer must be capturable on the real forward path.
        let x = Tensor::zeros([1, 3, 32, 32], &device);
        let (_, captured) = model.forward_with_capture(x, Some(&target));
        assert!(captured.is_some());
    }
}
