//! Failure classification

pub mod classifier;

pub use classifier::ErrorClassifier;
