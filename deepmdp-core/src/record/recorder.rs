use super::{Record, RecordValue};

/// Key under which [`Recorder::log`] stores the step index.
pub const STEP_KEY: &str = "opt_steps";

/// Writes records to an output destination.
///
/// Implementations must tolerate being called at every optimization step.
pub trait Recorder {
    /// Writes a record to the [`Recorder`].
    fn write(&mut self, record: Record);

    /// Logs a scalar value under `key` at `step`.
    ///
    /// The default implementation writes a record holding `key` and
    /// [`STEP_KEY`].
    fn log(&mut self, key: &str, value: f32, step: usize) {
        let mut record = Record::from_scalar(key, value);
        record.insert(STEP_KEY, RecordValue::Scalar(step as f32));
        self.write(record);
    }
}
