//! BlazeFace face detector using ONNX Runtime via `ort`.
//!
//! Short-range BlazeFace: 128x128 input, 896 anchors, one box plus six
//! landmarks per anchor. Results are mapped back into the pixel space of
//! the frame tensor that was passed in.
use std::path::Path;

use ort::session::builder::SessionBuilder;

use crate::detection::domain::face_detector::FaceDetector;
use crate::detection::domain::observation::{DetectionResult, Observation, Point};
use crate::shared::frame_tensor::FrameTensor;

/// BlazeFace model input resolution.
const INPUT_SIZE: u32 = 128;

/// Default confidence threshold.
pub const DEFAULT_CONFIDENCE: f64 = 0.75;

/// Upper bound on faces returned per frame.
pub const DEFAULT_MAX_FACES: usize = 10;

const NMS_IOU_THRESH: f64 = 0.3;

/// Number of BlazeFace anchors (short-range model).
const NUM_ANCHORS: usize = 896;

const NUM_LANDMARKS: usize = 6;

/// Values per anchor in the regressor output: 4 box + 6 * 2 landmark.
const REGRESSOR_STRIDE: usize = 4 + NUM_LANDMARKS * 2;

/// BlazeFace face detector backed by an ONNX Runtime session.
pub struct OnnxBlazefaceDetector {
    session: ort::session::Session,
    confidence: f64,
    max_faces: usize,
    anchors: Vec<[f32; 2]>,
}

impl OnnxBlazefaceDetector {
    /// Load a BlazeFace ONNX model with a default session.
    pub fn new(model_path: &Path, confidence: f64) -> Result<Self, Box<dyn std::error::Error>> {
        Self::from_builder(ort::session::Session::builder()?, model_path, confidence)
    }

    /// Load a BlazeFace ONNX model on an already-configured backend.
    pub fn from_builder(
        builder: SessionBuilder,
        model_path: &Path,
        confidence: f64,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        let session = builder.commit_from_file(model_path)?;
        Ok(Self {
            session,
            confidence,
            max_faces: DEFAULT_MAX_FACES,
            anchors: generate_anchors(),
        })
    }

    pub fn with_max_faces(mut self, max_faces: usize) -> Self {
        self.max_faces = max_faces.max(1);
        self
    }
}

impl FaceDetector for OnnxBlazefaceDetector {
    fn estimate_faces(
        &mut self,
        tensor: &FrameTensor,
    ) -> Result<DetectionResult, Box<dyn std::error::Error>> {
        let input_tensor = preprocess(tensor, INPUT_SIZE);

        let input_value = ort::value::Tensor::from_array(input_tensor)?;
        let outputs = self.session.run(ort::inputs![input_value])?;

        // BlazeFace outputs two tensors:
        // - regressors: [1, 896, 16] (box deltas + keypoints)
        // - classificators: [1, 896, 1] (confidence scores)
        if outputs.len() < 2 {
            return Err(
                format!("BlazeFace model expected 2 outputs, got {}", outputs.len()).into(),
            );
        }

        let first = outputs[0].try_extract_array::<f32>()?;
        let second = outputs[1].try_extract_array::<f32>()?;
        let (regressors, scores) = if first.shape().last() == Some(&REGRESSOR_STRIDE) {
            (first, second)
        } else {
            (second, first)
        };
        let reg_data = regressors.as_slice().ok_or("Cannot get regressor slice")?;
        let score_data = scores.as_slice().ok_or("Cannot get score slice")?;

        let candidates = decode(
            reg_data,
            score_data,
            &self.anchors,
            self.confidence as f32,
            tensor.width() as f32,
            tensor.height() as f32,
        );
        Ok(DetectionResult::new(select_faces(candidates, self.max_faces)))
    }
}

// ---------------------------------------------------------------------------
// Preprocessing
// ---------------------------------------------------------------------------

/// Resize the tensor to `size × size` and normalize to [-1,1] NCHW float32.
fn preprocess(tensor: &FrameTensor, size: u32) -> ndarray::Array4<f32> {
    let src = tensor.as_ndarray();
    let src_h = tensor.height() as usize;
    let src_w = tensor.width() as usize;
    let depth = tensor.depth() as usize;
    let s = size as usize;

    let mut out = ndarray::Array4::<f32>::zeros((1, 3, s, s));

    for y in 0..s {
        let src_y = (((y as f64 + 0.5) * src_h as f64 / s as f64) as usize).min(src_h - 1);
        for x in 0..s {
            let src_x = (((x as f64 + 0.5) * src_w as f64 / s as f64) as usize).min(src_w - 1);
            for c in 0..3 {
                let v = src[[src_y, src_x, c.min(depth - 1)]] as f32;
                out[[0, c, y, x]] = v / 127.5 - 1.0;
            }
        }
    }

    out
}

// ---------------------------------------------------------------------------
// Anchor generation (BlazeFace short-range)
// ---------------------------------------------------------------------------

/// Generate BlazeFace anchors for the short-range model.
///
/// The short-range model uses two feature map sizes: 16×16 and 8×8,
/// with 2 and 6 anchors per cell respectively.
fn generate_anchors() -> Vec<[f32; 2]> {
    let strides = [(8, 2), (16, 6)]; // (stride, anchors_per_cell)
    let mut anchors = Vec::with_capacity(NUM_ANCHORS);

    for &(stride, num) in &strides {
        let grid_size = INPUT_SIZE as usize / stride;
        for y in 0..grid_size {
            for x in 0..grid_size {
                let cx = (x as f32 + 0.5) / grid_size as f32;
                let cy = (y as f32 + 0.5) / grid_size as f32;
                for _ in 0..num {
                    anchors.push([cx, cy]);
                }
            }
        }
    }

    anchors
}

// ---------------------------------------------------------------------------
// Decoding
// ---------------------------------------------------------------------------

/// Turn raw model outputs into observations scaled to `frame_w × frame_h`.
fn decode(
    reg_data: &[f32],
    score_data: &[f32],
    anchors: &[[f32; 2]],
    confidence: f32,
    frame_w: f32,
    frame_h: f32,
) -> Vec<Observation> {
    let input = INPUT_SIZE as f32;
    let mut out = Vec::new();

    for (i, &raw_score) in score_data.iter().enumerate().take(anchors.len()) {
        let score = sigmoid(raw_score);
        if score < confidence {
            continue;
        }

        let offset = i * REGRESSOR_STRIDE;
        if offset + REGRESSOR_STRIDE > reg_data.len() {
            break;
        }
        let reg = &reg_data[offset..offset + REGRESSOR_STRIDE];
        let anchor = anchors[i];

        let cx = anchor[0] + reg[0] / input;
        let cy = anchor[1] + reg[1] / input;
        let w = reg[2] / input;
        let h = reg[3] / input;

        let top_left = Point::new(
            ((cx - w / 2.0) * frame_w).max(0.0),
            ((cy - h / 2.0) * frame_h).max(0.0),
        );
        let bottom_right = Point::new(
            ((cx + w / 2.0) * frame_w).min(frame_w),
            ((cy + h / 2.0) * frame_h).min(frame_h),
        );

        let landmarks = (0..NUM_LANDMARKS)
            .map(|k| {
                let lx = anchor[0] + reg[4 + k * 2] / input;
                let ly = anchor[1] + reg[5 + k * 2] / input;
                Point::new(lx * frame_w, ly * frame_h)
            })
            .collect();

        out.push(Observation {
            top_left,
            bottom_right,
            landmarks,
            probability: score,
        });
    }

    out
}

// ---------------------------------------------------------------------------
// NMS
// ---------------------------------------------------------------------------

/// Suppress overlapping candidates, then keep at most `max_faces`, best first.
fn select_faces(candidates: Vec<Observation>, max_faces: usize) -> Vec<Observation> {
    let mut kept = nms(candidates, NMS_IOU_THRESH);
    kept.truncate(max_faces);
    kept
}

fn nms(mut dets: Vec<Observation>, iou_thresh: f64) -> Vec<Observation> {
    dets.sort_by(|a, b| {
        b.probability
            .partial_cmp(&a.probability)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let mut keep: Vec<Observation> = Vec::new();
    for det in dets {
        if keep.iter().all(|k| bbox_iou(k, &det) <= iou_thresh) {
            keep.push(det);
        }
    }
    keep
}

fn bbox_iou(a: &Observation, b: &Observation) -> f64 {
    let x1 = a.top_left.x.max(b.top_left.x) as f64;
    let y1 = a.top_left.y.max(b.top_left.y) as f64;
    let x2 = a.bottom_right.x.min(b.bottom_right.x) as f64;
    let y2 = a.bottom_right.y.min(b.bottom_right.y) as f64;

    let inter = (x2 - x1).max(0.0) * (y2 - y1).max(0.0);
    if inter == 0.0 {
        return 0.0;
    }
    let area_a = (a.width() * a.height()) as f64;
    let area_b = (b.width() * b.height()) as f64;
    inter / (area_a + area_b - inter)
}

fn sigmoid(x: f32) -> f32 {
    1.0 / (1.0 + (-x).exp())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
