use super::Record;

/// Writes a record to an output destination with [`Recorder::write`].
///
/// Implementations must not panic or block on I/O failures; a failed write is logged and the
/// record dropped.
pub trait Recorder {
    /// Write a record to the [`Recorder`].
    fn write(&mut self, record: Record);

    /// Flushes buffered records, if any.
    fn flush(&mut self) {}
}

impl<R: Recorder + ?Sized> Recorder for Box<R> {
    fn write(&mut self, record: Record) {
        (**self).write(record)
    }

    fn flush(&mut self) {
        (**self).flush()
    }
}
