//! Grad-CAM saliency computation.
//!
//! One tracked forward pass with the target layer's activation exposed as a
//! differentiable leaf, one backward pass from the chosen class score, then
//! channel-wise gradient pooling and weighted summation. The tracked graph,
//! captured activation, and gradients all drop at the end of the call.

use burn::tensor::backend::AutodiffBackend;
use burn::tensor::activation::softmax;
use burn::prelude::*;
use ndarray::Array2;

use dermal_core::ImageTensor;
use dermal_models::{AutodiffNdArray, LayerRef, LoadedModel, ModelStore, SkinNet};

use crate::capture::ActivationCapture;
use crate::error::{ExplainError, Result};
use crate::heatmap::Heatmap;

/// Compute a Grad-CAM heatmap for one image.
///
/// Runs the model forward with the target layer captured, backpropagates the
/// softmax score of `class_index` (the predicted class when `None`) to the
/// captured activation, pools the gradient per channel, and sums the
/// gradient-weighted channels into a raw map that [`Heatmap::from_raw`]
/// normalizes.
///
/// Returns the heatmap together with the class probabilities from the same
/// forward pass, so callers never pay for a second one.
///
/// # Errors
///
/// * [`ExplainError::CaptureFailed`] when the target layer is not on the
///   executed forward path.
/// * [`ExplainError::NoGradient`] when the class score has no gradient path
///   to the captured activation.
/// * [`ExplainError::Readback`] on backend data-transfer failures.
pub fn compute_saliency<B: AutodiffBackend>(
    input: &ImageTensor<B>,
    model: &SkinNet<B>,
    target: &LayerRef,
    class_index: Option<usize>,
) -> Result<(Heatmap, Vec<f32>)> {
    let (logits, slot) = model.forward_with_capture(input.inner().clone(), Some(target));
    let capture = ActivationCapture::from_slot(target.name(), slot)?;

    let probs = softmax(logits, 1);
    let preds: Vec<f32> = probs
        .clone()
        .inner()
        .into_data()
        .to_vec()
        .map_err(|e| ExplainError::Readback(format!("{e:?}")))?;

    let idx = match class_index {
        Some(i) if i < preds.len() => i,
        Some(i) => {
            tracing::warn!(requested = i, n_classes = preds.len(), "class index out of range; using predicted class");
            argmax(&preds)
        }
        None => argmax(&preds),
    };

    let score: Tensor<B, 1> = probs.slice([0..1, idx..idx + 1]).reshape([1]);
    let grads = score.backward();
    let grad = capture
        .activation()
        .grad(&grads)
        .ok_or_else(|| ExplainError::NoGradient(target.name().to_string()))?;

    let (h, w) = capture.spatial_dims();
    let activation = capture.activation().clone().inner();

    // Global-average-pool the gradient per channel, then weight each
    // activation channel by its pooled gradient and collapse channels.
    let pooled = grad.mean_dim(2).mean_dim(3);
    let cam = (activation * pooled).sum_dim(1);

    let raw: Vec<f32> = cam
        .into_data()
        .to_vec()
        .map_err(|e| ExplainError::Readback(format!("{e:?}")))?;
    let raw = Array2::from_shape_vec((h, w), raw)
        .map_err(|e| ExplainError::Readback(e.to_string()))?;

    tracing::debug!(layer = capture.layer(), class = idx, h, w, "saliency computed");

    Ok((Heatmap::from_raw(raw), preds))
}

/// [`compute_saliency`] under the store's capture guard.
///
/// Holds the guard for the whole computation so two capture windows on the
/// shared handle never interleave. Plain classification is unaffected.
pub fn compute_saliency_guarded(
    store: &ModelStore,
    loaded: &LoadedModel,
    input: &ImageTensor<AutodiffNdArray>,
    target: &LayerRef,
    class_index: Option<usize>,
) -> Result<(Heatmap, Vec<f32>)> {
    let _guard = store.capture_guard();
    compute_saliency(input, &loaded.model, target, class_index)
}

fn argmax(preds: &[f32]) -> usize {
    let mut best = 0;
    for (i, &p) in preds.iter().enumerate() {
        if p > preds[best] {
            best = i;
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::module::AutodiffModule;
    use burn::tensor::Distribution;
    use dermal_models::SkinNetConfig;

    type B = AutodiffNdArray;

    fn tiny_model(device: &<B as Backend>::Device) -> SkinNet<B> {
        SkinNetConfig::new(7, 32)
            .with_stem_channels(4)
            .with_n_blocks(2)
            .with_head_channels(16)
            .init(device)
    }

    fn random_input(device: &<B as Backend>::Device) -> ImageTensor<B> {
        let t = Tensor::<B, 4>::random([1, 3, 32, 32], Distribution::Default, device);
        ImageTensor::new(t, "div255").unwrap()
    }

    #[test]
    fn test_saliency_in_unit_range_with_preds() {
        let device = Default::default();
        let model = tiny_model(&device);
        let input = random_input(&device);
        let target = LayerRef::new("top_conv");

        let (map, preds) = compute_saliency(&input, &model, &target, None).unwrap();

        assert_eq!(preds.len(), 7);
        let sum: f32 = preds.iter().sum();
        assert!((sum - 1.0).abs() < 1e-4);
        for &v in map.values() {
            assert!((0.0..=1.0).contains(&v));
        }
    }

    #[test]
    fn test_off_path_layer_is_capture_failure() {
        let device = Default::default();
        let model = tiny_model(&device);
        let input = random_input(&device);
        let target = LayerRef::new("block9.dwconv");

        assert!(matches!(
            compute_saliency(&input, &model, &target, None),
            Err(ExplainError::CaptureFailed(_))
        ));
    }

    #[test]
    fn test_explicit_class_index() {
        let device = Default::default();
        let model = tiny_model(&device);
        let input = random_input(&device);
        let target = LayerRef::new("top_conv");

        let (map, _) = compute_saliency(&input, &model, &target, Some(3)).unwrap();
        assert!(map.values().iter().all(|v| v.is_finite()));
    }

    #[test]
    fn test_out_of_range_class_falls_back_to_argmax() {
        let device = Default::default();
        let model = tiny_model(&device);
        let input = random_input(&device);
        let target = LayerRef::new("top_conv");

        assert!(compute_saliency(&input, &model, &target, Some(99)).is_ok());
    }

    #[test]
    fn test_capture_leaves_model_behavior_unchanged() {
        let device = Default::default();
        let model = tiny_model(&device);
        let input = random_input(&device);
        let target = LayerRef::new("block2.dwconv");

        let plain = model.valid();
        let before: Vec<f32> = plain
            .forward_probs(input.inner().clone().inner())
            .into_data()
            .to_vec()
            .unwrap();

        let (_, during) = compute_saliency(&input, &model, &target, None).unwrap();

        let after: Vec<f32> = plain
            .forward_probs(input.inner().clone().inner())
            .into_data()
            .to_vec()
            .unwrap();

        assert_eq!(before, after);
        for (a, b) in before.iter().zip(during.iter()) {
            assert!((a - b).abs() < 1e-5);
        }
    }
}
