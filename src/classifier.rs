//! Classifier capability and per-cycle decisions.
//!
//! The trained models are external collaborators: each one accepts the fused
//! 128x57x1 tensor and returns a single scalar confidence in `[0, 1]`, with
//! no state persisting between invocations. The pipeline evaluates a list of
//! named [`Classifier`] instances against the identical tensor each cycle
//! instead of duplicating per-model code paths.

use anyhow::Result;
use async_trait::async_trait;

use crate::fusion::FusedTensor;

/// Confidence above which a classifier's label is considered fired.
pub const FIRE_THRESHOLD: f32 = 0.5;

/// Capability: evaluate the fused tensor to a scalar confidence.
///
/// # Contract
/// - Input is always shape 128x57x1 (batch dimension 1).
/// - Output is a confidence in `[0, 1]`.
/// - No state persists between invocations.
#[async_trait]
pub trait Classifier: Send + Sync {
    /// The activity label this model detects.
    fn label(&self) -> &str;

    /// Evaluate the tensor to a confidence.
    async fn evaluate(&self, tensor: &FusedTensor) -> Result<f32>;
}

/// One classifier's verdict for one inference cycle.
#[derive(Debug, Clone, PartialEq)]
pub struct Verdict {
    /// The activity label.
    pub label: String,
    /// Raw model confidence.
    pub confidence: f32,
    /// Whether the confidence cleared [`FIRE_THRESHOLD`].
    pub fired: bool,
}

/// The per-cycle collection of independent verdicts plus the aggregate.
///
/// Recomputed from scratch every inference cycle; never accumulated or
/// averaged across cycles.
#[derive(Debug, Clone, PartialEq)]
pub struct DecisionSet {
    /// One verdict per classifier, in evaluation order.
    pub verdicts: Vec<Verdict>,
    /// Aggregate on/off label: on iff any verdict fired.
    pub active: bool,
}

impl DecisionSet {
    /// Build a decision set from `(label, confidence)` pairs.
    pub fn from_confidences<I, S>(confidences: I) -> Self
    where
        I: IntoIterator<Item = (S, f32)>,
        S: Into<String>,
    {
        let verdicts: Vec<Verdict> = confidences
            .into_iter()
            .map(|(label, confidence)| Verdict {
                label: label.into(),
                confidence,
                fired: confidence > FIRE_THRESHOLD,
            })
            .collect();
        let active = verdicts.iter().any(|v| v.fired);
        Self { verdicts, active }
    }

    /// Labels of the verdicts that fired, in evaluation order.
    pub fn fired_labels(&self) -> Vec<String> {
        self.verdicts
            .iter()
            .filter(|v| v.fired)
            .map(|v| v.label.clone())
            .collect()
    }
}

/// Stub classifier returning a fixed confidence.
///
/// Stands in for a real model in tests and headless runs, the same way the
/// mock sensors stand in for drivers.
pub struct ConstantClassifier {
    label: String,
    confidence: f32,
}

impl ConstantClassifier {
    /// Create a stub with the given label and fixed confidence.
    pub fn new(label: impl Into<String>, confidence: f32) -> Self {
        Self {
            label: label.into(),
            confidence,
        }
    }
}

#[async_trait]
impl Classifier for ConstantClassifier {
    fn label(&self) -> &str {
        &self.label
    }

    async fn evaluate(&self, _tensor: &FusedTensor) -> Result<f32> {
        Ok(self.confidence)
    }
}
