//! Records of training progress and the telemetry interface.
//!
//! The coordinator converts every episode result into a [`Record`] and hands it to a
//! [`Recorder`]. Recorders are fire-and-forget sinks: [`Recorder::write`] never fails, and
//! implementations are expected to log and swallow their own I/O errors.
//!
//! ```rust
//! use a3c_core::record::{Record, RecordValue};
//!
//! let mut record = Record::from_scalar("episode", 12.0);
//! record.insert("reward", RecordValue::Scalar(-1.0));
//! record.insert("worker", RecordValue::String("w3".to_string()));
//! assert_eq!(record.get_scalar("reward").unwrap(), -1.0);
//! ```
mod base;
mod buffered_recorder;
mod recorder;

pub use base::{Record, RecordValue};
pub use buffered_recorder::BufferedRecorder;
pub use recorder::Recorder;
