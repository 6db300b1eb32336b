//! Shared test converters for integration tests.

#![allow(dead_code)]

use markwerk::core::dispatch::ConversionContext;
use markwerk::core::stream::{ByteSource, read_all};
use markwerk::plugins::{Converter, Plugin};
use markwerk::{ConversionResult, MarkwerkError, Result, StreamDescriptor};
use std::io::{Seek, SeekFrom};
use std::sync::Mutex;

type AcceptFn = Box<dyn Fn(&StreamDescriptor) -> bool + Send + Sync>;

/// What a [`StubConverter`] does when asked to convert.
pub enum Behavior {
    /// Return the stream content as Markdown.
    Echo,
    /// Return fixed Markdown.
    Fixed(String),
    /// Read the whole stream, then fail with a parsing error.
    Fail(String),
    /// Panic inside `convert`.
    Panic,
}

/// Configurable converter used to exercise dispatch.
pub struct StubConverter {
    name: String,
    accepts: AcceptFn,
    behavior: Behavior,
    consume_in_accepts: bool,
    panic_in_accepts: bool,
    /// Stream offsets observed on entry to `accepts` and `convert`.
    pub offsets: Mutex<Vec<u64>>,
}

impl StubConverter {
    pub fn new(name: &str, behavior: Behavior) -> Self {
        Self {
            name: name.to_string(),
            accepts: Box::new(|_| true),
            behavior,
            consume_in_accepts: false,
            panic_in_accepts: false,
            offsets: Mutex::new(Vec::new()),
        }
    }

    pub fn accepting(mut self, accepts: impl Fn(&StreamDescriptor) -> bool + Send + Sync + 'static) -> Self {
        self.accepts = Box::new(accepts);
        self
    }

    /// Read the whole stream inside `accepts` before answering.
    pub fn consuming_in_accepts(mut self) -> Self {
        self.consume_in_accepts = true;
        self
    }

    pub fn panicking_in_accepts(mut self) -> Self {
        self.panic_in_accepts = true;
        self
    }

    fn record_offset(&self, source: &mut dyn ByteSource) {
        if let Ok(offset) = source.seek(SeekFrom::Current(0)) {
            self.offsets.lock().unwrap().push(offset);
        }
    }
}

impl Plugin for StubConverter {
    fn name(&self) -> &str {
        &self.name
    }

    fn version(&self) -> String {
        "1.0.0".to_string()
    }

    fn initialize(&self) -> Result<()> {
        Ok(())
    }

    fn shutdown(&self) -> Result<()> {
        Ok(())
    }
}

impl Converter for StubConverter {
    fn accepts(&self, source: &mut dyn ByteSource, descriptor: &StreamDescriptor, _ctx: &ConversionContext<'_>) -> bool {
        self.record_offset(source);
        if self.panic_in_accepts {
            panic!("{} cannot decide", self.name);
        }
        if self.consume_in_accepts {
            let _ = read_all(source);
        }
        (self.accepts)(descriptor)
    }

    fn convert(
        &self,
        source: &mut dyn ByteSource,
        _descriptor: &StreamDescriptor,
        _ctx: &ConversionContext<'_>,
    ) -> Result<ConversionResult> {
        self.record_offset(source);
        match &self.behavior {
            Behavior::Echo => {
                let bytes = read_all(source)?;
                Ok(ConversionResult::new(String::from_utf8_lossy(&bytes).into_owned()))
            }
            Behavior::Fixed(markdown) => Ok(ConversionResult::new(markdown.clone())),
            Behavior::Fail(message) => {
                let _ = read_all(source)?;
                Err(MarkwerkError::parsing(message.clone()))
            }
            Behavior::Panic => panic!("{} exploded", self.name),
        }
    }
}
