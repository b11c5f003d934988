//! Producer side: audio decoding, spectrum analysis and the snapshot handoff.

pub mod analyzer;
pub mod decode;
pub mod snapshot;

pub use analyzer::SpectrumAnalyzer;
pub use snapshot::SnapshotBuffer;
