//! Ensemble inference and the per-class evaluation pipeline.
//!
//! A pass streams batches through [`predict`], folds each batch's
//! `(true, predicted)` pairs into [`ConfusionCounts`] and finally turns the
//! counts into [`AggregateMetrics`] with [`finalize`].

pub mod accumulator;
pub mod aggregator;
pub mod confusion;
pub mod metrics;
pub mod report;
pub mod runner;

pub use accumulator::ConfusionCounts;
pub use aggregator::predict;
pub use confusion::ConfusionMatrix;
pub use metrics::{finalize, macro_precision, macro_recall, AggregateMetrics, PerClassMetrics};
pub use report::classification_report;
pub use runner::evaluate;
