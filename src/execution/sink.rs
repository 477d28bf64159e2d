//! Output sinks for step processes

use std::collections::HashMap;
use std::io;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};
use tokio::io::AsyncWrite;

/// Writable stream a process output is copied into
pub type SinkWriter = Box<dyn AsyncWrite + Send + Unpin>;

/// Standard output and standard error destinations for one step
pub struct SinkStreams {
    pub stdout: SinkWriter,
    pub stderr: SinkWriter,
}

/// Provides output destinations for step processes
///
/// Opening and closing the underlying streams is the sink's business; the
/// runner only writes and flushes.
pub trait Sink: Send + Sync {
    fn open(&self, step: &str) -> io::Result<SinkStreams>;
}

/// Passes output through to this process's stdout and stderr
#[derive(Debug, Clone, Copy, Default)]
pub struct InheritSink;

impl Sink for InheritSink {
    fn open(&self, _step: &str) -> io::Result<SinkStreams> {
        Ok(SinkStreams {
            stdout: Box::new(tokio::io::stdout()),
            stderr: Box::new(tokio::io::stderr()),
        })
    }
}

/// Discards all output
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

impl Sink for NullSink {
    fn open(&self, _step: &str) -> io::Result<SinkStreams> {
        Ok(SinkStreams {
            stdout: Box::new(tokio::io::sink()),
            stderr: Box::new(tokio::io::sink()),
        })
    }
}

/// Output captured for a single step
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CapturedOutput {
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
}

impl CapturedOutput {
    pub fn stdout_lossy(&self) -> String {
        String::from_utf8_lossy(&self.stdout).into_owned()
    }

    pub fn stderr_lossy(&self) -> String {
        String::from_utf8_lossy(&self.stderr).into_owned()
    }
}

type Captures = Arc<Mutex<HashMap<String, CapturedOutput>>>;

/// Keeps every step's output in memory
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    captures: Captures,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Output captured so far for `step`
    pub fn output(&self, step: &str) -> Option<CapturedOutput> {
        self.captures
            .lock()
            .ok()
            .and_then(|captures| captures.get(step).cloned())
    }
}

impl Sink for MemorySink {
    fn open(&self, step: &str) -> io::Result<SinkStreams> {
        self.captures
            .lock()
            .map_err(|_| io::Error::other("memory sink lock poisoned"))?
            .entry(step.to_string())
            .or_default();

        Ok(SinkStreams {
            stdout: Box::new(MemoryWriter {
                captures: Arc::clone(&self.captures),
                step: step.to_string(),
                stream: Stream::Stdout,
            }),
            stderr: Box::new(MemoryWriter {
                captures: Arc::clone(&self.captures),
                step: step.to_string(),
                stream: Stream::Stderr,
            }),
        })
    }
}

#[derive(Debug, Clone, Copy)]
enum Stream {
    Stdout,
    Stderr,
}

struct MemoryWriter {
    captures: Captures,
    step: String,
    stream: Stream,
}

impl AsyncWrite for MemoryWriter {
    fn poll_write(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        let mut captures = match self.captures.lock() {
            Ok(captures) => captures,
            Err(_) => return Poll::Ready(Err(io::Error::other("memory sink lock poisoned"))),
        };
        let entry = captures.entry(self.step.clone()).or_default();
        match self.stream {
            Stream::Stdout => entry.stdout.extend_from_slice(buf),
            Stream::Stderr => entry.stderr.extend_from_slice(buf),
        }
        Poll::Ready(Ok(buf.len()))
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }
}
