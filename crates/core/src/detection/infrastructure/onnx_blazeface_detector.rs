//! BlazeFace face detector using ONNX Runtime via `ort`.
//!
//! Runs on the detector crop and reports crop-space boxes with per-frame
//! sequential ids. No tracking and no landmarks.
use std::path::Path;

use crate::detection::domain::face_detector::FaceDetector;
use crate::detection::domain::face_observation::FaceObservation;
use crate::geometry::bounding_box::BoundingBox;
use crate::shared::frame::Frame;

use super::execution_provider::preferred_execution_providers;

/// BlazeFace model input resolution.
const INPUT_SIZE: u32 = 128;

/// Default detection score threshold.
pub const DEFAULT_CONFIDENCE: f32 = 0.5;

const NMS_IOU_THRESH: f64 = 0.3;

/// Number of BlazeFace anchors (short-range model).
const NUM_ANCHORS: usize = 896;

/// Values per anchor in the regressor output: box (4) + 6 keypoints (12).
const REGRESSOR_STRIDE: usize = 16;

pub struct OnnxBlazefaceDetector {
    session: ort::session::Session,
    confidence: f32,
    anchors: Vec<[f32; 2]>,
}

impl OnnxBlazefaceDetector {
    pub fn new(model_path: &Path, confidence: f32) -> Result<Self, Box<dyn std::error::Error>> {
        let session = ort::session::Session::builder()?
            .with_execution_providers(preferred_execution_providers())?
            .commit_from_file(model_path)?;
        log::info!("Loaded BlazeFace detector from {}", model_path.display());
        Ok(Self {
            session,
            confidence,
            anchors: generate_anchors(),
        })
    }
}

impl FaceDetector for OnnxBlazefaceDetector {
    fn detect(&mut self, image: &Frame) -> Result<Vec<FaceObservation>, Box<dyn std::error::Error>> {
        if image.width() == 0 || image.height() == 0 {
            return Ok(Vec::new());
        }

        let input = ort::value::Tensor::from_array(preprocess(image, INPUT_SIZE))?;
        let outputs = self.session.run(ort::inputs![input])?;

        // [1, 896, 16] regressors and [1, 896, 1] scores
        if outputs.len() < 2 {
            return Err(format!("BlazeFace model expected 2 outputs, got {}", outputs.len()).into());
        }
        let regressors = outputs[0].try_extract_array::<f32>()?;
        let scores = outputs[1].try_extract_array::<f32>()?;
        let reg_data = regressors.as_slice().ok_or("Cannot get regressor slice")?;
        let score_data = scores.as_slice().ok_or("Cannot get score slice")?;

        let mut candidates = decode(
            reg_data,
            score_data,
            &self.anchors,
            self.confidence,
            image.width() as f64,
            image.height() as f64,
        );
        let kept = nms(&mut candidates, NMS_IOU_THRESH);

        Ok(kept
            .into_iter()
            .enumerate()
            .map(|(id, c)| FaceObservation::new(id as u32, c.bbox))
            .collect())
    }
}

/// Nearest-neighbour resize to `size × size`, RGB scaled to [0,1], NCHW.
fn preprocess(frame: &Frame, size: u32) -> ndarray::Array4<f32> {
    let src = frame.as_ndarray();
    let src_h = frame.height() as usize;
    let src_w = frame.width() as usize;
    let channels = frame.channels() as usize;
    let s = size as usize;

    let mut tensor = ndarray::Array4::<f32>::zeros((1, 3, s, s));
    for y in 0..s {
        let src_y = (((y as f64 + 0.5) * src_h as f64 / s as f64) as usize).min(src_h - 1);
        for x in 0..s {
            let src_x = (((x as f64 + 0.5) * src_w as f64 / s as f64) as usize).min(src_w - 1);
            for c in 0..3 {
                // Grayscale sources repeat their single channel
                let value = src[[src_y, src_x, c.min(channels - 1)]];
                tensor[[0, c, y, x]] = value as f32 / 255.0;
            }
        }
    }
    tensor
}

/// Short-range anchors: a 16×16 grid with 2 anchors per cell, then an 8×8
/// grid with 6.
fn generate_anchors() -> Vec<[f32; 2]> {
    let mut anchors = Vec::with_capacity(NUM_ANCHORS);
    for (stride, per_cell) in [(8usize, 2usize), (16, 6)] {
        let grid = INPUT_SIZE as usize / stride;
        for y in 0..grid {
            for x in 0..grid {
                let center = [
                    (x as f32 + 0.5) / grid as f32,
                    (y as f32 + 0.5) / grid as f32,
                ];
                anchors.extend(std::iter::repeat(center).take(per_cell));
            }
        }
    }
    anchors
}

#[derive(Clone, Debug, PartialEq)]
struct Candidate {
    bbox: BoundingBox,
    score: f32,
}

/// Turns raw anchor regressions into image-space boxes above `threshold`,
/// clamped to the image.
fn decode(
    regressors: &[f32],
    scores: &[f32],
    anchors: &[[f32; 2]],
    threshold: f32,
    width: f64,
    height: f64,
) -> Vec<Candidate> {
    let input = INPUT_SIZE as f32;
    let mut out = Vec::new();

    for (i, (&raw, anchor)) in scores.iter().zip(anchors).enumerate() {
        let score = sigmoid(raw);
        if score < threshold {
            continue;
        }
        let offset = i * REGRESSOR_STRIDE;
        let Some(reg) = regressors.get(offset..offset + 4) else {
            break;
        };

        let cx = (anchor[0] + reg[0] / input) as f64;
        let cy = (anchor[1] + reg[1] / input) as f64;
        let w = (reg[2] / input) as f64;
        let h = (reg[3] / input) as f64;

        let bbox = BoundingBox::new(
            ((cx - w / 2.0) * width).max(0.0),
            ((cy - h / 2.0) * height).max(0.0),
            ((cx + w / 2.0) * width).min(width),
            ((cy + h / 2.0) * height).min(height),
        );
        if !bbox.is_degenerate() {
            out.push(Candidate { bbox, score });
        }
    }
    out
}

fn nms(candidates: &mut [Candidate], iou_thresh: f64) -> Vec<Candidate> {
    candidates.sort_by(|a, b| b.score.total_cmp(&a.score));

    let mut keep: Vec<Candidate> = Vec::new();
    for c in candidates.iter() {
        if keep.iter().all(|k| iou(&k.bbox, &c.bbox) <= iou_thresh) {
            keep.push(c.clone());
        }
    }
    keep
}

fn iou(a: &BoundingBox, b: &BoundingBox) -> f64 {
    let w = (a.right.min(b.right) - a.left.max(b.left)).max(0.0);
    let h = (a.bottom.min(b.bottom) - a.top.max(b.top)).max(0.0);
    let inter = w * h;
    if inter == 0.0 {
        return 0.0;
    }
    inter / (a.width() * a.height() + b.width() * b.height() - inter)
}

fn sigmoid(x: f32) -> f32 {
    1.0 / (1.0 + (-x).exp())
}
