use std::io::{self, Write};

use serde::Serialize;

use podtail_types::LogRecord;

use crate::filter::CompiledFilter;

/// Ordered consumer of log records.
///
/// A sink is driven from a single drain thread, one record at a time, in
/// the order records arrive on the fan-in channel.
pub trait LineSink: Send + 'static {
    fn write_record(&mut self, record: &LogRecord) -> io::Result<()>;

    /// Called whenever the channel runs empty, and once at the end
    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl LineSink for Box<dyn LineSink> {
    fn write_record(&mut self, record: &LogRecord) -> io::Result<()> {
        (**self).write_record(record)
    }

    fn flush(&mut self) -> io::Result<()> {
        (**self).flush()
    }
}

/// Writes `[pod] line` per record
pub struct TextSink<W> {
    writer: W,
}

impl<W: Write + Send + 'static> TextSink<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }
}

impl<W: Write + Send + 'static> LineSink for TextSink<W> {
    fn write_record(&mut self, record: &LogRecord) -> io::Result<()> {
        writeln!(self.writer, "[{}] {}", record.pod_name(), record.line)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.writer.flush()
    }
}

#[derive(Serialize)]
struct JsonLine<'a> {
    namespace: &'a str,
    pod: &'a str,
    line: &'a str,
}

/// Writes one JSON object per record
pub struct JsonSink<W> {
    writer: W,
}

impl<W: Write + Send + 'static> JsonSink<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }
}

impl<W: Write + Send + 'static> LineSink for JsonSink<W> {
    fn write_record(&mut self, record: &LogRecord) -> io::Result<()> {
        let line = JsonLine {
            namespace: &record.source.namespace,
            pod: &record.source.name,
            line: &record.line,
        };
        serde_json::to_writer(&mut self.writer, &line)?;
        self.writer.write_all(b"\n")
    }

    fn flush(&mut self) -> io::Result<()> {
        self.writer.flush()
    }
}

/// Passes on only the records matching a filter
pub struct FilteredSink<K> {
    inner: K,
    filter: CompiledFilter,
}

impl<K: LineSink> FilteredSink<K> {
    pub fn new(inner: K, filter: CompiledFilter) -> Self {
        Self { inner, filter }
    }
}

impl<K: LineSink> LineSink for FilteredSink<K> {
    fn write_record(&mut self, record: &LogRecord) -> io::Result<()> {
        if self.filter.matches(record) {
            self.inner.write_record(record)
        } else {
            Ok(())
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}
