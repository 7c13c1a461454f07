//! Face embedder capability and a FaceNet-style ONNX implementation.
//!
//! The embedder turns a fixed-size RGB face crop into a raw embedding. The
//! ONNX embedder expects a 160×160 input and produces a 512-dimensional
//! vector, the geometry of the FaceNet-512 model.

use crate::embedding::Embedding;
use async_trait::async_trait;
use image::RgbImage;
use ndarray::Array4;
use ort::session::Session;
use ort::value::TensorRef;
use std::path::Path;
use std::sync::{Arc, Mutex};
use thiserror::Error;

pub const FACENET_INPUT_SIZE: u32 = 160;
pub const FACENET_EMBEDDING_DIM: usize = 512;
pub const FACENET_MODEL_FILE: &str = "facenet_512.onnx";

#[derive(Error, Debug)]
pub enum EmbedderError {
    #[error("model file not found: {0}")]
    ModelNotFound(String),
    #[error("input must be {expected}x{expected}, got {width}x{height}")]
    InputSize { expected: u32, width: u32, height: u32 },
    #[error("inference failed: {0}")]
    InferenceFailed(String),
    #[error("ort: {0}")]
    Ort(#[from] ort::Error),
}

/// Turns a fixed-size face image into a raw embedding.
///
/// An `Err` or an empty embedding both mean "no signature for this frame".
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Side length of the square input image.
    fn input_size(&self) -> u32;

    async fn embed(&self, face: &RgbImage) -> Result<Embedding, EmbedderError>;
}

/// Memory layout of the model's input tensor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TensorLayout {
    /// `[1, H, W, 3]`, the layout of TFLite/Keras FaceNet exports.
    #[default]
    Nhwc,
    /// `[1, 3, H, W]`.
    Nchw,
}

#[derive(Debug, Clone, Copy)]
pub struct EmbedderOptions {
    pub input_size: u32,
    pub embedding_dim: usize,
    pub layout: TensorLayout,
    pub intra_threads: usize,
}

impl Default for EmbedderOptions {
    fn default() -> Self {
        Self {
            input_size: FACENET_INPUT_SIZE,
            embedding_dim: FACENET_EMBEDDING_DIM,
            layout: TensorLayout::Nhwc,
            intra_threads: 2,
        }
    }
}

/// ONNX Runtime embedder. Inference runs on the blocking thread pool.
pub struct OnnxEmbedder {
    session: Arc<Mutex<Session>>,
    options: EmbedderOptions,
}

impl OnnxEmbedder {
    /// Load an ONNX embedding model from `model_path`.
    pub fn load(model_path: &str, options: EmbedderOptions) -> Result<Self, EmbedderError> {
        if !Path::new(model_path).exists() {
            return Err(EmbedderError::ModelNotFound(model_path.to_string()));
        }

        let session = Session::builder()?
            .with_intra_threads(options.intra_threads)?
            .commit_from_file(model_path)?;

        tracing::info!(
            path = model_path,
            inputs = ?session.inputs().iter().map(|i| (i.name(), i.dtype())).collect::<Vec<_>>(),
            outputs = ?session.outputs().iter().map(|o| o.name()).collect::<Vec<_>>(),
            input_size = options.input_size,
            layout = ?options.layout,
            "loaded embedding model"
        );

        Ok(Self {
            session: Arc::new(Mutex::new(session)),
            options,
        })
    }

    fn run(session: &Mutex<Session>, input: Array4<f32>, dim: usize) -> Result<Embedding, EmbedderError> {
        let mut session = session
            .lock()
            .map_err(|_| EmbedderError::InferenceFailed("session lock poisoned".into()))?;

        let outputs = session.run(ort::inputs![TensorRef::from_array_view(input.view())?])?;

        let (_, raw_data) = outputs[0]
            .try_extract_tensor::<f32>()
            .map_err(|e| EmbedderError::InferenceFailed(format!("embedding extraction: {e}")))?;

        let raw: Vec<f32> = raw_data.to_vec();
        if raw.len() != dim {
            return Err(EmbedderError::InferenceFailed(format!(
                "expected {dim}-dim embedding, got {}",
                raw.len()
            )));
        }

        Ok(Embedding::new(raw))
    }
}

#[async_trait]
impl Embedder for OnnxEmbedder {
    fn input_size(&self) -> u32 {
        self.options.input_size
    }

    async fn embed(&self, face: &RgbImage) -> Result<Embedding, EmbedderError> {
        let expected = self.options.input_size;
        if face.dimensions() != (expected, expected) {
            return Err(EmbedderError::InputSize {
                expected,
                width: face.width(),
                height: face.height(),
            });
        }

        let input = preprocess(face, self.options.layout);
        let session = Arc::clone(&self.session);
        let dim = self.options.embedding_dim;

        tokio::task::spawn_blocking(move || Self::run(&session, input, dim))
            .await
            .map_err(|e| EmbedderError::InferenceFailed(format!("inference task: {e}")))?
    }
}

/// Standardize an RGB face crop into a float tensor.
///
/// Uses per-image whitening: `(x - mean) / max(std, 1/sqrt(N))` over all
/// channel values, the preprocessing FaceNet models are trained with.
pub fn preprocess(face: &RgbImage, layout: TensorLayout) -> Array4<f32> {
    let (w, h) = (face.width() as usize, face.height() as usize);
    let raw = face.as_raw();
    let n = raw.len().max(1) as f32;

    let mean = raw.iter().map(|&c| c as f32).sum::<f32>() / n;
    let var = raw.iter().map(|&c| (c as f32 - mean).powi(2)).sum::<f32>() / n;
    let std = var.sqrt().max(1.0 / n.sqrt());

    let mut tensor = match layout {
        TensorLayout::Nhwc => Array4::<f32>::zeros((1, h, w, 3)),
        TensorLayout::Nchw => Array4::<f32>::zeros((1, 3, h, w)),
    };

    for (x, y, pixel) in face.enumerate_pixels() {
        let (x, y) = (x as usize, y as usize);
        for c in 0..3 {
            let v = (pixel.0[c] as f32 - mean) / std;
            match layout {
                TensorLayout::Nhwc => tensor[[0, y, x, c]] = v,
                TensorLayout::Nchw => tensor[[0, c, y, x]] = v,
            }
        }
    }

    tensor
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    #[test]
    fn test_preprocess_output_shape() {
        let face = RgbImage::new(FACENET_INPUT_SIZE, FACENET_INPUT_SIZE);
        let s = FACENET_INPUT_SIZE as usize;
        assert_eq!(preprocess(&face, TensorLayout::Nhwc).shape(), &[1, s, s, 3]);
        assert_eq!(preprocess(&face, TensorLayout::Nchw).shape(), &[1, 3, s, s]);
    }

    #[test]
    fn test_preprocess_zero_mean_unit_std() {
        let mut face = RgbImage::new(4, 4);
        for (i, p) in face.pixels_mut().enumerate() {
            let v = (i * 15) as u8;
            *p = Rgb([v, v / 2, 255 - v]);
        }
        let t = preprocess(&face, TensorLayout::Nhwc);
        let n = t.len() as f32;
        let mean = t.iter().sum::<f32>() / n;
        let std = (t.iter().map(|v| (v - mean).powi(2)).sum::<f32>() / n).sqrt();
        assert!(mean.abs() < 1e-4, "mean {mean}");
        assert!((std - 1.0).abs() < 1e-3, "std {std}");
    }

    #[test]
    fn test_preprocess_uniform_image_is_finite() {
        let face = RgbImage::from_pixel(8, 8, Rgb([90, 90, 90]));
        let t = preprocess(&face, TensorLayout::Nchw);
        assert!(t.iter().all(|v| v.is_finite() && v.abs() < 1e-6));
    }

    #[test]
    fn test_preprocess_layout_places_channels() {
        let mut face = RgbImage::new(2, 1);
        face.put_pixel(1, 0, Rgb([255, 0, 0]));
        let nhwc = preprocess(&face, TensorLayout::Nhwc);
        let nchw = preprocess(&face, TensorLayout::Nchw);
        assert_eq!(nhwc[[0, 0, 1, 0]], nchw[[0, 0, 0, 1]]);
        assert!(nhwc[[0, 0, 1, 0]] > nhwc[[0, 0, 1, 1]]);
    }

    #[test]
    fn test_load_missing_model() {
        let err = OnnxEmbedder::load("/nonexistent/facenet_512.onnx", EmbedderOptions::default())
            .err()
            .expect("missing model must fail");
        assert!(matches!(err, EmbedderError::ModelNotFound(_)));
    }
}
