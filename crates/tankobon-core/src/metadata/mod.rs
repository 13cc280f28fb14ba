//! Series metadata: the local model, merging, sidecars and atomic JSON I/O.

mod atomic;
mod merge;
mod model;

pub use atomic::{atomic_read_json, atomic_write_bytes, atomic_write_json};
pub use merge::{fill_record_gaps, merge_record};
pub use model::{SeriesJson, SeriesJsonMetadata, SeriesMetadata, SeriesRecord, StaffBuckets};
