//! facegate-core — Face recognition decision pipeline.
//!
//! Gates detected faces on framing and pose, normalizes embeddings, matches
//! them against an enrolled gallery with a combined L2 / cosine rule, and
//! runs all of it through a single-flight frame pipeline. Detection,
//! embedding generation and storage are injected capabilities.

pub mod alignment;
pub mod brightness;
pub mod crop;
pub mod detector;
pub mod embedding;
pub mod gallery;
pub mod matcher;
pub mod pipeline;
pub mod recognizer;
pub mod types;

pub use alignment::{AlignmentFeedback, AlignmentGate, AlignmentVerdict, GateBounds};
pub use brightness::{normalize_brightness, BrightnessPolicy};
pub use detector::{Detector, DetectorError};
pub use embedding::{Embedding, NormalizedEmbedding};
pub use gallery::{GalleryError, GallerySource, StaticGallery};
pub use matcher::{DualMetricMatcher, MatchThresholds, Matcher};
pub use pipeline::{FrameOutcome, FramePipeline, PipelineEvent, PipelineStats};
pub use recognizer::{Embedder, EmbedderError, EmbedderOptions, OnnxEmbedder, TensorLayout};
pub use types::{EnrolledIdentity, FaceObservation, MatchResult};
