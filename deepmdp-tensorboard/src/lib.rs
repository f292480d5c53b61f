//! Writes metrics of the agent to TFRecord files readable by tensorboard.
use deepmdp_core::record::{Record, RecordValue, Recorder, STEP_KEY};
use log::warn;
use std::path::Path;
use tensorboard_rs::summary_writer::SummaryWriter;

/// Write records to TFRecord.
pub struct TensorboardRecorder {
    writer: SummaryWriter,
    step_key: String,
}

impl TensorboardRecorder {
    /// Construct a [`TensorboardRecorder`].
    ///
    /// TFRecord will be stored in `logdir`.
    pub fn new<P: AsRef<Path>>(logdir: P) -> Self {
        Self {
            writer: SummaryWriter::new(logdir),
            step_key: STEP_KEY.to_string(),
        }
    }

    /// Flushes pending events to the file.
    pub fn flush(&mut self) {
        self.writer.flush();
    }
}

impl Recorder for TensorboardRecorder {
    /// Write a given [Record] into a TFRecord.
    ///
    /// A record without the step key is dropped.
    fn write(&mut self, record: Record) {
        let step = match record.get(&self.step_key) {
            Some(RecordValue::Scalar(v)) => *v as usize,
            _ => {
                warn!("Record without {} is discarded", self.step_key);
                return;
            }
        };

        for (k, RecordValue::Scalar(v)) in record.iter() {
            if *k != self.step_key {
                self.writer.add_scalar(k, *v, step);
            }
        }
    }

    fn log(&mut self, key: &str, value: f32, step: usize) {
        self.writer.add_scalar(key, value, step);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempdir::TempDir;

    #[test]
    fn test_write_scalars_to_logdir() {
        let dir = TempDir::new("tensorboard_recorder").unwrap();
        let mut recorder = TensorboardRecorder::new(dir.path());
        recorder.log("train_critic/loss", 0.5, 0);
        recorder.write(Record::from_slice(&[
            ("train_ae/ae_loss", RecordValue::Scalar(0.1)),
            (STEP_KEY, RecordValue::Scalar(1.0)),
        ]));
        // no step key, dropped
        recorder.write(Record::from_scalar("train_actor/loss", 0.2));
        recorder.flush();

        let n_files = std::fs::read_dir(dir.path()).unwrap().count();
        assert!(n_files > 0);
    }
}
