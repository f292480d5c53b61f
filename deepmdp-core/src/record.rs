//! Types and traits for recording training metrics.
//!
//! * [`Record`] - a container of key-value pairs of various data types
//! * [`RecordValue`] - the values that can be stored in a [`Record`]
//! * [`Recorder`] - the sink the agent writes its metrics to
//! * [`BufferedRecorder`] - a recorder that keeps records in memory
//! * [`NullRecorder`] - a recorder that discards all records
//!
//! ```rust
//! use deepmdp_core::record::{BufferedRecorder, Recorder};
//!
//! let mut recorder = BufferedRecorder::new();
//! recorder.log("train_critic/loss", 0.25, 10);
//! assert_eq!(recorder.scalars("train_critic/loss"), vec![(10, 0.25)]);
//! ```
mod base;
mod buffered_recorder;
mod null_recorder;
mod recorder;

pub use base::{Record, RecordValue};
pub use buffered_recorder::BufferedRecorder;
pub use null_recorder::NullRecorder;
pub use recorder::{Recorder, STEP_KEY};
