#![forbid(unsafe_code)]

//! `tracing` output routed to the browser console.
//!
//! `tracing-subscriber`'s fmt layer writes one formatted event per writer;
//! [`ConsoleWriter`] buffers it and hands the finished line to
//! `console.{error,warn,info,log,debug}` when the writer is dropped. Native
//! builds (tests, tooling) fall back to stderr.
//!
//! Timestamps are disabled: `SystemTime::now()` is unavailable on
//! `wasm32-unknown-unknown`.

use std::io;

use tracing::level_filters::LevelFilter;
use tracing::{Level, Metadata};
use tracing_subscriber::fmt::MakeWriter;

/// Console method an event is written through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsoleLevel {
    Error,
    Warn,
    Info,
    Log,
    Debug,
}

impl ConsoleLevel {
    #[must_use]
    pub fn for_level(level: &Level) -> Self {
        match *level {
            Level::ERROR => Self::Error,
            Level::WARN => Self::Warn,
            Level::INFO => Self::Info,
            Level::DEBUG => Self::Log,
            Level::TRACE => Self::Debug,
        }
    }
}

/// Parse a level name (`off`, `error`, ..., `trace`), case-insensitively.
#[must_use]
pub fn parse_level(name: &str) -> Option<LevelFilter> {
    name.trim().parse::<LevelFilter>().ok()
}

/// Buffers one formatted event and emits it on drop.
#[derive(Debug)]
pub struct ConsoleWriter {
    level: ConsoleLevel,
    buf: Vec<u8>,
}

impl ConsoleWriter {
    #[must_use]
    pub const fn new(level: ConsoleLevel) -> Self {
        Self {
            level,
            buf: Vec::new(),
        }
    }

    /// Take the buffered text without its trailing newline; `None` if blank.
    fn take_message(&mut self) -> Option<String> {
        if self.buf.is_empty() {
            return None;
        }
        let bytes = std::mem::take(&mut self.buf);
        let text = String::from_utf8_lossy(&bytes);
        let trimmed = text.trim_end_matches(['\n', '\r']);
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_owned())
        }
    }
}

impl io::Write for ConsoleWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.buf.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        if let Some(message) = self.take_message() {
            emit(self.level, &message);
        }
        Ok(())
    }
}

impl Drop for ConsoleWriter {
    fn drop(&mut self) {
        if let Some(message) = self.take_message() {
            emit(self.level, &message);
        }
    }
}

/// [`MakeWriter`] that picks the console method from the event's level.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConsoleMakeWriter;

impl<'a> MakeWriter<'a> for ConsoleMakeWriter {
    type Writer = ConsoleWriter;

    fn make_writer(&'a self) -> Self::Writer {
        ConsoleWriter::new(ConsoleLevel::Log)
    }

    fn make_writer_for(&'a self, meta: &Metadata<'_>) -> Self::Writer {
        ConsoleWriter::new(ConsoleLevel::for_level(meta.level()))
    }
}

/// Install the global console subscriber. Returns `false` if one was
/// already installed (a second `init` is harmless).
pub fn init(level: LevelFilter) -> bool {
    tracing_subscriber::fmt()
        .with_writer(ConsoleMakeWriter)
        .with_max_level(level)
        .without_time()
        .with_ansi(false)
        .with_target(false)
        .try_init()
        .is_ok()
}

#[cfg(target_arch = "wasm32")]
fn emit(level: ConsoleLevel, message: &str) {
    let value = wasm_bindgen::JsValue::from_str(message);
    match level {
        ConsoleLevel::Error => web_sys::console::error_1(&value),
        ConsoleLevel::Warn => web_sys::console::warn_1(&value),
        ConsoleLevel::Info => web_sys::console::info_1(&value),
        ConsoleLevel::Log => web_sys::console::log_1(&value),
        ConsoleLevel::Debug => web_sys::console::debug_1(&value),
    }
}

#[cfg(not(target_arch = "wasm32"))]
fn emit(_level: ConsoleLevel, message: &str) {
    eprintln!("{message}");
}
