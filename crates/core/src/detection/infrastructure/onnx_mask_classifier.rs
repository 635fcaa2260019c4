use std::fs;
use std::path::Path;

use crate::detection::domain::mask_classifier::{MaskClassifier, Recognition};
use crate::shared::frame::Frame;

use super::execution_provider::preferred_execution_providers;

/// Mask/no-mask image classifier backed by an ONNX Runtime session.
///
/// Expects a MobileNet-style model: `[1, size, size, 3]` float input in
/// [-1, 1] and one score per label. Scores that are not already a
/// probability distribution are passed through softmax.
pub struct OnnxMaskClassifier {
    session: ort::session::Session,
    labels: Vec<String>,
    input_size: u32,
}

impl OnnxMaskClassifier {
    pub fn new(
        model_path: &Path,
        labels_path: &Path,
        input_size: u32,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        let labels = parse_labels(&fs::read_to_string(labels_path)?);
        if labels.is_empty() {
            return Err(format!("no labels in {}", labels_path.display()).into());
        }

        let session = ort::session::Session::builder()?
            .with_execution_providers(preferred_execution_providers())?
            .commit_from_file(model_path)?;
        log::info!(
            "Loaded mask classifier from {} ({} labels, {input_size}px input)",
            model_path.display(),
            labels.len()
        );
        Ok(Self {
            session,
            labels,
            input_size,
        })
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }
}

impl MaskClassifier for OnnxMaskClassifier {
    fn classify(&mut self, face: &Frame) -> Result<Vec<Recognition>, Box<dyn std::error::Error>> {
        if face.dimensions() != (self.input_size, self.input_size) {
            return Err(format!(
                "classifier expects {0}x{0} input, got {1}x{2}",
                self.input_size,
                face.width(),
                face.height()
            )
            .into());
        }

        let input = ort::value::Tensor::from_array(preprocess(face))?;
        let outputs = self.session.run(ort::inputs![input])?;
        require_outputs(outputs.len())?;
        let scores = outputs[0].try_extract_array::<f32>()?;
        let scores = scores.as_slice().ok_or("Cannot get score slice")?;

        if scores.len() != self.labels.len() {
            return Err(format!(
                "classifier produced {} scores for {} labels",
                scores.len(),
                self.labels.len()
            )
            .into());
        }
        Ok(rank(&self.labels, &to_probabilities(scores)))
    }
}

fn require_outputs(found: usize) -> Result<(), String> {
    if found == 0 {
        return Err("mask classifier model produced no outputs".to_string());
    }
    Ok(())
}

/// One label per line; blank lines and surrounding whitespace ignored.
fn parse_labels(text: &str) -> Vec<String> {
    text.lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(String::from)
        .collect()
}

/// NHWC float tensor with pixels mapped from [0,255] to [-1,1].
fn preprocess(face: &Frame) -> ndarray::Array4<f32> {
    let src = face.as_ndarray();
    let (w, h) = (face.width() as usize, face.height() as usize);
    let channels = face.channels() as usize;

    ndarray::Array4::from_shape_fn((1, h, w, 3), |(_, y, x, c)| {
        (src[[y, x, c.min(channels - 1)]] as f32 - 127.5) / 127.5
    })
}

fn to_probabilities(scores: &[f32]) -> Vec<f32> {
    let sum: f32 = scores.iter().sum();
    let is_distribution = scores.iter().all(|&s| (0.0..=1.0).contains(&s)) && (sum - 1.0).abs() < 1e-3;
    if is_distribution {
        return scores.to_vec();
    }

    let max = scores.iter().cloned().fold(f32::NEG_INFINITY, f32::max);
    let exps: Vec<f32> = scores.iter().map(|&s| (s - max).exp()).collect();
    let total: f32 = exps.iter().sum();
    exps.into_iter().map(|e| e / total).collect()
}

/// Labels paired with probabilities, best first.
fn rank(labels: &[String], probabilities: &[f32]) -> Vec<Recognition> {
    let mut ranked: Vec<Recognition> = labels
        .iter()
        .zip(probabilities)
        .map(|(label, &p)| Recognition::new(label.clone(), p))
        .collect();
    ranked.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));
    ranked
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_parse_labels_skips_blank_lines() {
        let labels = parse_labels("mask\n\n  no_mask \r\n");
        assert_eq!(labels, vec!["mask".to_string(), "no_mask".to_string()]);
    }

    #[test]
    fn test_missing_outputs_are_an_error() {
        assert!(require_outputs(0).is_err());
        assert!(require_outputs(1).is_ok());
    }

    #[test]
    fn test_preprocess_maps_to_signed_unit_range() {
        let mut data = vec![0u8; 4 * 4 * 3];
        data[0] = 255;
        let face = Frame::new(data, 4, 4, 3);

        let tensor = preprocess(&face);

        assert_eq!(tensor.shape(), &[1, 4, 4, 3]);
        assert_relative_eq!(tensor[[0, 0, 0, 0]], 1.0);
        assert_relative_eq!(tensor[[0, 0, 0, 1]], -1.0);
    }

    #[test]
    fn test_probabilities_pass_through() {
        let p = to_probabilities(&[0.25, 0.75]);
        assert_eq!(p, vec![0.25, 0.75]);
    }

    #[test]
    fn test_logits_are_softmaxed() {
        let p = to_probabilities(&[2.0, 0.0]);
        assert_relative_eq!(p[0] + p[1], 1.0, epsilon = 1e-6);
        assert_relative_eq!(p[0], 0.880_797, epsilon = 1e-5);
    }

    #[test]
    fn test_rank_orders_best_first() {
        let labels = vec!["mask".to_string(), "no_mask".to_string()];
        let ranked = rank(&labels, &[0.3, 0.7]);
        assert_eq!(ranked[0], Recognition::new("no_mask", 0.7));
        assert_eq!(ranked[1], Recognition::new("mask", 0.3));
    }
}
