//! Durable append-only log.
//!
//! Each entry opens one stream, appends a record per changed value and
//! finishes the stream when it is unpublished. Timestamps are microseconds
//! since the log was opened and never go backwards.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Read, Write};
use std::path::Path;
use std::rc::Rc;
use std::time::Instant;

use robolog_common::{Format, Value, ValueKind};
use serde::{Deserialize, Serialize};

use crate::error::{Result, TelemetryError};

/// Identifier of one stream in the durable log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StreamId(pub u32);

/// One durable log record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "record", rename_all = "snake_case")]
pub enum LogRecord {
    /// A stream was opened for `path`.
    Start {
        stream: StreamId,
        timestamp_us: u64,
        path: String,
        kind: ValueKind,
    },
    /// A stream received a new value.
    Value {
        stream: StreamId,
        timestamp_us: u64,
        value: Value,
    },
    /// A stream was closed.
    Finish { stream: StreamId, timestamp_us: u64 },
}

impl LogRecord {
    pub fn timestamp_us(&self) -> u64 {
        match self {
            LogRecord::Start { timestamp_us, .. }
            | LogRecord::Value { timestamp_us, .. }
            | LogRecord::Finish { timestamp_us, .. } => *timestamp_us,
        }
    }
}

/// Destination for durable-tier values and mirrored live values.
pub trait DurableLog {
    /// Open a stream for `path`.
    fn open(&mut self, path: &str, kind: ValueKind) -> Result<StreamId>;

    /// Append a value to a stream.
    fn append(&mut self, stream: StreamId, value: &Value) -> Result<()>;

    /// Close a stream.
    fn close(&mut self, stream: StreamId) -> Result<()>;

    /// Push buffered records to storage. Called once per frame.
    fn flush(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Monotonic microsecond clock anchored at log creation.
#[derive(Debug)]
struct LogClock {
    start: Instant,
    last: u64,
}

impl LogClock {
    fn new() -> Self {
        Self {
            start: Instant::now(),
            last: 0,
        }
    }

    fn now_us(&mut self) -> u64 {
        let elapsed = self.start.elapsed().as_micros() as u64;
        self.last = self.last.max(elapsed);
        self.last
    }
}

/// Assigns stream ids and stamps records.
#[derive(Debug)]
struct RecordBuilder {
    clock: LogClock,
    next_stream: u32,
}

impl RecordBuilder {
    fn new() -> Self {
        Self {
            clock: LogClock::new(),
            next_stream: 0,
        }
    }

    fn start(&mut self, path: &str, kind: ValueKind) -> (StreamId, LogRecord) {
        let stream = StreamId(self.next_stream);
        self.next_stream += 1;
        let record = LogRecord::Start {
            stream,
            timestamp_us: self.clock.now_us(),
            path: path.to_string(),
            kind,
        };
        (stream, record)
    }

    fn value(&mut self, stream: StreamId, value: &Value) -> LogRecord {
        LogRecord::Value {
            stream,
            timestamp_us: self.clock.now_us(),
            value: value.clone(),
        }
    }

    fn finish(&mut self, stream: StreamId) -> LogRecord {
        LogRecord::Finish {
            stream,
            timestamp_us: self.clock.now_us(),
        }
    }
}

/// Log that discards every record.
#[derive(Debug, Default)]
pub struct NullLog {
    next_stream: u32,
}

impl DurableLog for NullLog {
    fn open(&mut self, _path: &str, _kind: ValueKind) -> Result<StreamId> {
        let stream = StreamId(self.next_stream);
        self.next_stream += 1;
        Ok(stream)
    }

    fn append(&mut self, _stream: StreamId, _value: &Value) -> Result<()> {
        Ok(())
    }

    fn close(&mut self, _stream: StreamId) -> Result<()> {
        Ok(())
    }
}

#[derive(Debug)]
struct MemoryInner {
    builder: RecordBuilder,
    records: Vec<LogRecord>,
}

/// In-memory log.
///
/// Clones share the same record buffer, so a caller can keep a clone to
/// inspect what was written after handing the log to the sinks.
#[derive(Debug, Clone)]
pub struct MemoryLog {
    inner: Rc<RefCell<MemoryInner>>,
}

impl Default for MemoryLog {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryLog {
    pub fn new() -> Self {
        Self {
            inner: Rc::new(RefCell::new(MemoryInner {
                builder: RecordBuilder::new(),
                records: Vec::new(),
            })),
        }
    }

    /// Copy of every record written so far.
    pub fn records(&self) -> Vec<LogRecord> {
        self.inner.borrow().records.clone()
    }

    /// Values appended under `path`, in order.
    pub fn values_for(&self, path: &str) -> Vec<Value> {
        let inner = self.inner.borrow();
        let streams: Vec<StreamId> = inner
            .records
            .iter()
            .filter_map(|record| match record {
                LogRecord::Start { stream, path: p, .. } if p == path => Some(*stream),
                _ => None,
            })
            .collect();

        inner
            .records
            .iter()
            .filter_map(|record| match record {
                LogRecord::Value { stream, value, .. } if streams.contains(stream) => {
                    Some(value.clone())
                }
                _ => None,
            })
            .collect()
    }
}

impl DurableLog for MemoryLog {
    fn open(&mut self, path: &str, kind: ValueKind) -> Result<StreamId> {
        let mut inner = self.inner.borrow_mut();
        let (stream, record) = inner.builder.start(path, kind);
        inner.records.push(record);
        Ok(stream)
    }

    fn append(&mut self, stream: StreamId, value: &Value) -> Result<()> {
        let mut inner = self.inner.borrow_mut();
        let record = inner.builder.value(stream, value);
        inner.records.push(record);
        Ok(())
    }

    fn close(&mut self, stream: StreamId) -> Result<()> {
        let mut inner = self.inner.borrow_mut();
        let record = inner.builder.finish(stream);
        inner.records.push(record);
        Ok(())
    }
}

/// File-backed log.
///
/// JSON logs hold one record per line. CBOR logs hold records prefixed with
/// their length as a little-endian `u32`.
#[derive(Debug)]
pub struct FileLog {
    writer: BufWriter<File>,
    format: Format,
    builder: RecordBuilder,
}

impl FileLog {
    /// Create (or truncate) a log file, creating parent directories as needed.
    pub fn create(path: impl AsRef<Path>, format: Format) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let file = File::create(path)?;
        tracing::info!(path = %path.display(), format = ?format, "Opened durable log");

        Ok(Self {
            writer: BufWriter::new(file),
            format,
            builder: RecordBuilder::new(),
        })
    }

    fn write(&mut self, record: &LogRecord) -> Result<()> {
        match self.format {
            Format::Json => {
                serde_json::to_writer(&mut self.writer, record)?;
                self.writer.write_all(b"\n")?;
            }
            Format::Cbor => {
                let mut buf = Vec::new();
                ciborium::into_writer(record, &mut buf)?;
                let len = u32::try_from(buf.len())
                    .map_err(|_| TelemetryError::durable("record larger than 4 GiB"))?;
                self.writer.write_all(&len.to_le_bytes())?;
                self.writer.write_all(&buf)?;
            }
        }
        Ok(())
    }

    /// Read every record back from a log file.
    ///
    /// Empty arrays are given back the array kind their stream was opened with.
    pub fn read_all(path: impl AsRef<Path>, format: Format) -> Result<Vec<LogRecord>> {
        let file = File::open(path)?;
        let mut reader = BufReader::new(file);
        let mut records = Vec::new();

        match format {
            Format::Json => {
                for line in reader.lines() {
                    let line = line?;
                    if line.trim().is_empty() {
                        continue;
                    }
                    records.push(serde_json::from_str(&line)?);
                }
            }
            Format::Cbor => {
                let mut len_buf = [0u8; 4];
                loop {
                    match reader.read_exact(&mut len_buf) {
                        Ok(()) => {}
                        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => break,
                        Err(e) => return Err(e.into()),
                    }
                    let mut buf = vec![0u8; u32::from_le_bytes(len_buf) as usize];
                    reader.read_exact(&mut buf)?;
                    let record = ciborium::from_reader(buf.as_slice())
                        .map_err(|e| TelemetryError::durable(e.to_string()))?;
                    records.push(record);
                }
            }
        }

        Ok(restore_kinds(records))
    }
}

fn restore_kinds(records: Vec<LogRecord>) -> Vec<LogRecord> {
    let mut kinds = HashMap::new();
    records
        .into_iter()
        .map(|record| match record {
            LogRecord::Start { stream, kind, .. } => {
                kinds.insert(stream, kind);
                record
            }
            LogRecord::Value {
                stream,
                timestamp_us,
                value,
            } => {
                let value = match kinds.get(&stream) {
                    Some(kind) => value.with_kind(*kind),
                    None => value,
                };
                LogRecord::Value {
                    stream,
                    timestamp_us,
                    value,
                }
            }
            other => other,
        })
        .collect()
}

impl DurableLog for FileLog {
    fn open(&mut self, path: &str, kind: ValueKind) -> Result<StreamId> {
        let (stream, record) = self.builder.start(path, kind);
        self.write(&record)?;
        Ok(stream)
    }

    fn append(&mut self, stream: StreamId, value: &Value) -> Result<()> {
        let record = self.builder.value(stream, value);
        self.write(&record)
    }

    fn close(&mut self, stream: StreamId) -> Result<()> {
        let record = self.builder.finish(stream);
        self.write(&record)
    }

    fn flush(&mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }
}

impl Drop for FileLog {
    fn drop(&mut self) {
        if let Err(e) = self.writer.flush() {
            tracing::warn!(error = %e, "Failed to flush durable log on drop");
        }
    }
}
