//! Writes training records of A3C as TensorBoard event files.
use a3c_core::record::{Record, RecordValue, Recorder};
use log::warn;
use std::path::Path;
use tensorboard_rs::summary_writer::SummaryWriter;

const STEP_KEY: &str = "episode";

/// Write records to TFRecord.
pub struct TensorboardRecorder {
    writer: SummaryWriter,
    ignore_unsupported_value: bool,
}

impl TensorboardRecorder {
    /// Construct a [`TensorboardRecorder`].
    ///
    /// TFRecord will be stored in `logdir`. Records are indexed by their `episode` value.
    pub fn new<P: AsRef<Path>>(logdir: P) -> Self {
        Self {
            writer: SummaryWriter::new(logdir),
            ignore_unsupported_value: true,
        }
    }

    /// Construct a [`TensorboardRecorder`] with warnings on unsupported record values.
    pub fn new_with_check_unsupported_value<P: AsRef<Path>>(logdir: P) -> Self {
        Self {
            ignore_unsupported_value: false,
            ..Self::new(logdir)
        }
    }
}

impl Recorder for TensorboardRecorder {
    /// Write a given [Record] into a TFRecord.
    ///
    /// Scalars are written as TensorBoard scalars. Records without the step key are skipped.
    fn write(&mut self, record: Record) {
        let step = match record.get(STEP_KEY) {
            Some(RecordValue::Scalar(v)) => *v as usize,
            _ => {
                warn!("Record without scalar {:?} is skipped", STEP_KEY);
                return;
            }
        };

        for (k, v) in record.iter() {
            if k != STEP_KEY {
                match v {
                    RecordValue::Scalar(v) => self.writer.add_scalar(k, *v, step),
                    RecordValue::String(_) => {
                        if !self.ignore_unsupported_value {
                            warn!("Unsupported value: {:?}", (k, v));
                        }
                    }
                };
            }
        }
    }

    fn flush(&mut self) {
        self.writer.flush();
    }
}
