use super::{Record, RecordValue, Recorder, STEP_KEY};

/// Buffered recorder.
///
/// Keeps every written [`Record`] in memory. It is mainly used to inspect
/// the metrics an agent emits.
#[derive(Debug, Default)]
pub struct BufferedRecorder {
    buf: Vec<Record>,
}

impl BufferedRecorder {
    /// Constructs the recorder.
    pub fn new() -> Self {
        Self { buf: Vec::new() }
    }

    /// Returns an iterator over the records.
    pub fn iter(&self) -> std::slice::Iter<Record> {
        self.buf.iter()
    }

    /// Returns the number of stored records.
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    /// Returns `true` if nothing has been written.
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Returns `(step, value)` pairs of the scalar logged under `key`.
    ///
    /// Records without [`STEP_KEY`] are reported at step 0.
    pub fn scalars(&self, key: &str) -> Vec<(usize, f32)> {
        self.buf
            .iter()
            .filter_map(|record| match record.get(key) {
                Some(RecordValue::Scalar(v)) => {
                    let step = record.get_scalar(STEP_KEY).unwrap_or(0.0) as usize;
                    Some((step, *v))
                }
                _ => None,
            })
            .collect()
    }
}

impl Recorder for BufferedRecorder {
    /// Writes a [`Record`] to the buffer.
    fn write(&mut self, record: Record) {
        self.buf.push(record);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_log::test;

    #[test]
    fn test_scalars_are_keyed_by_step() {
        let mut recorder = BufferedRecorder::new();
        recorder.log("train/batch_reward", 1.5, 0);
        recorder.log("train_critic/loss", 0.3, 0);
        recorder.log("train/batch_reward", 2.5, 1);

        assert_eq!(recorder.len(), 3);
        assert_eq!(
            recorder.scalars("train/batch_reward"),
            vec![(0, 1.5), (1, 2.5)]
        );
        assert!(recorder.scalars("train_actor/loss").is_empty());
    }
}
