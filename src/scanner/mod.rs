//! QR Scanner
//!
//! Samples camera frames, decodes QR symbols and screens what they carry.

pub mod controller;
pub mod decoder;
pub mod sampler;

pub use controller::{ScanOutcome, ScanReport, ScannerConfig, ScannerController};
pub use decoder::DecodeOptions;
