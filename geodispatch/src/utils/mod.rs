//! Utility functions for timestamp handling.
//!
//! Job snapshots carry their run timestamps as ISO strings, so parsing has to
//! be lenient about the shapes the job store produces.

pub mod timestamps;

pub use timestamps::{format_iso8601, iso_timestamp, parse_timestamp, Timestamp, TimestampError};
