//! Single-flight frame pipeline.
//!
//! Each accepted frame runs detect → gate → crop/brightness/resize → embed →
//! normalize → match. Only one frame is evaluated at a time: a frame that
//! arrives while another is in flight is dropped on the spot, never queued,
//! so recognition always runs on a recent frame.
//!
//! The busy flag is taken with a compare-and-set and released by a guard on
//! drop, which covers success, every error path, panics inside a stage, and
//! the evaluating future being dropped.

use crate::alignment::{AlignmentGate, AlignmentVerdict, GateBounds};
use crate::brightness::BrightnessPolicy;
use crate::crop::{self, CropError};
use crate::detector::Detector;
use crate::gallery::{GalleryError, GallerySource};
use crate::matcher::{DualMetricMatcher, Matcher};
use crate::recognizer::Embedder;
use crate::types::MatchResult;
use image::RgbImage;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc;

/// Observable per-frame outputs.
#[derive(Debug, Clone, PartialEq)]
pub enum PipelineEvent {
    /// Framing feedback, emitted for every accepted frame.
    Alignment(AlignmentVerdict),
    /// Emitted only when an embedding was produced and compared.
    Recognition(MatchResult),
}

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("face crop failed: {0}")]
    Crop(#[from] CropError),
    #[error(transparent)]
    Gallery(#[from] GalleryError),
}

/// How a submitted frame ended.
#[derive(Debug)]
pub enum FrameOutcome {
    /// Another frame was in flight.
    Dropped,
    NoFace,
    Misaligned(AlignmentVerdict),
    /// The embedder failed or returned an empty embedding.
    EmbeddingUnavailable,
    Recognized(MatchResult),
    Failed(PipelineError),
}

/// Frame counters since construction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PipelineStats {
    pub accepted: u64,
    pub dropped: u64,
    /// Accepted frames that have returned the pipeline to idle.
    pub completed: u64,
}

#[derive(Debug, Default)]
struct PipelineState {
    busy: AtomicBool,
    accepted: AtomicU64,
    dropped: AtomicU64,
    completed: AtomicU64,
}

impl PipelineState {
    fn try_acquire(self: &Arc<Self>) -> Option<BusyGuard> {
        if self
            .busy
            .compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
            .is_ok()
        {
            self.accepted.fetch_add(1, Ordering::Relaxed);
            Some(BusyGuard { state: Arc::clone(self) })
        } else {
            self.dropped.fetch_add(1, Ordering::Relaxed);
            None
        }
    }
}

/// Holds the pipeline busy; returns it to idle when dropped.
struct BusyGuard {
    state: Arc<PipelineState>,
}

impl Drop for BusyGuard {
    fn drop(&mut self) {
        self.state.completed.fetch_add(1, Ordering::Relaxed);
        self.state.busy.store(false, Ordering::Release);
    }
}

pub struct FramePipeline {
    detector: Arc<dyn Detector>,
    embedder: Arc<dyn Embedder>,
    gallery: Arc<dyn GallerySource>,
    matcher: Box<dyn Matcher>,
    gate: AlignmentGate,
    brightness: BrightnessPolicy,
    events: mpsc::UnboundedSender<PipelineEvent>,
    state: Arc<PipelineState>,
}

impl FramePipeline {
    pub fn new(
        detector: Arc<dyn Detector>,
        embedder: Arc<dyn Embedder>,
        gallery: Arc<dyn GallerySource>,
        events: mpsc::UnboundedSender<PipelineEvent>,
    ) -> Self {
        Self {
            detector,
            embedder,
            gallery,
            matcher: Box::new(DualMetricMatcher::default()),
            gate: AlignmentGate::default(),
            brightness: BrightnessPolicy::default(),
            events,
            state: Arc::default(),
        }
    }

    pub fn with_gate(mut self, bounds: GateBounds) -> Self {
        self.gate = AlignmentGate::new(bounds);
        self
    }

    pub fn with_matcher(mut self, matcher: Box<dyn Matcher>) -> Self {
        self.matcher = matcher;
        self
    }

    pub fn with_brightness(mut self, policy: BrightnessPolicy) -> Self {
        self.brightness = policy;
        self
    }

    pub fn is_busy(&self) -> bool {
        self.state.busy.load(Ordering::Acquire)
    }

    pub fn stats(&self) -> PipelineStats {
        PipelineStats {
            accepted: self.state.accepted.load(Ordering::Relaxed),
            dropped: self.state.dropped.load(Ordering::Relaxed),
            completed: self.state.completed.load(Ordering::Relaxed),
        }
    }

    /// Evaluate `frame` if the pipeline is idle, otherwise drop it.
    ///
    /// Returns once the frame has been fully evaluated (or dropped).
    pub async fn process_frame(&self, frame: RgbImage) -> FrameOutcome {
        let Some(_guard) = self.state.try_acquire() else {
            tracing::trace!("pipeline busy; frame dropped");
            return FrameOutcome::Dropped;
        };
        self.evaluate(frame).await
    }

    /// Fire-and-forget variant for frame callbacks: admits the frame and
    /// evaluates it on a spawned task. Returns `false` if it was dropped.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn submit(self: &Arc<Self>, frame: RgbImage) -> bool {
        let Some(guard) = self.state.try_acquire() else {
            tracing::trace!("pipeline busy; frame dropped");
            return false;
        };
        let pipeline = Arc::clone(self);
        tokio::spawn(async move {
            let _guard = guard;
            pipeline.evaluate(frame).await;
        });
        true
    }

    async fn evaluate(&self, frame: RgbImage) -> FrameOutcome {
        match self.run_stages(&frame).await {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::warn!(error = %e, "frame evaluation failed");
                FrameOutcome::Failed(e)
            }
        }
    }

    async fn run_stages(&self, frame: &RgbImage) -> Result<FrameOutcome, PipelineError> {
        let faces = match self.detector.detect(frame).await {
            Ok(faces) => faces,
            Err(e) => {
                tracing::warn!(error = %e, "detector failed; treating as no face");
                Vec::new()
            }
        };

        let Some(face) = faces.first() else {
            self.emit(PipelineEvent::Alignment(AlignmentVerdict::no_face()));
            return Ok(FrameOutcome::NoFace);
        };

        let verdict = self.gate.evaluate(face.width, face.yaw, face.pitch, face.roll);
        self.emit(PipelineEvent::Alignment(verdict));
        if !verdict.aligned {
            tracing::debug!(feedback = %verdict.feedback, width = face.width, "face not aligned");
            return Ok(FrameOutcome::Misaligned(verdict));
        }

        let prepared = crop::prepare_face(frame, face, self.embedder.input_size(), &self.brightness)?;

        let raw = match self.embedder.embed(&prepared).await {
            Ok(embedding) if !embedding.is_empty() => embedding,
            Ok(_) => {
                tracing::warn!("embedder returned an empty embedding; skipping recognition");
                return Ok(FrameOutcome::EmbeddingUnavailable);
            }
            Err(e) => {
                tracing::warn!(error = %e, "embedder failed; skipping recognition");
                return Ok(FrameOutcome::EmbeddingUnavailable);
            }
        };

        let query = raw.normalize();
        let gallery = self.gallery.list_enrolled().await?;
        let result = self.matcher.find_best_match(&query, &gallery);

        tracing::info!(
            gallery_size = gallery.len(),
            recognized = result.identity.as_ref().map(|i| i.name.as_str()),
            l2 = result.l2_distance,
            cosine = result.similarity,
            "frame evaluated"
        );

        self.emit(PipelineEvent::Recognition(result.clone()));
        Ok(FrameOutcome::Recognized(result))
    }

    fn emit(&self, event: PipelineEvent) {
        if self.events.send(event).is_err() {
            tracing::debug!("pipeline event receiver closed");
        }
    }
}
