use std::fmt::Debug;
use std::io::Write;
use std::sync::{Arc, Mutex};

/// Line-oriented sink for console output. `log!` asks for a writer once per
/// line; a logger that returns `None` discards the line.
pub trait Logger: Debug + Send {
    fn line_writer(&mut self) -> Option<&mut dyn Write>;
}

/// Discards everything
#[derive(Debug, Default)]
pub struct DummyLogger;

/// Default logger of a console, writes to standard error.
#[derive(Debug)]
pub struct StderrLogger(std::io::Stderr);

/// Appends to a file, every line prefixed with a timestamp.
#[derive(Debug)]
pub struct FileLogger(std::fs::File);

/// Collects output in memory. Clones share the same buffer, so a test can
/// keep one half and hand the other to a console.
#[derive(Debug, Clone, Default)]
pub struct VecLogger(Arc<Mutex<Vec<u8>>>);

fn secs_since_unix_epoch() -> f64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|dur| dur.as_secs_f64())
        .unwrap_or(0.)
}

impl StderrLogger {
    pub fn new() -> Self {
        Self(std::io::stderr())
    }
}

impl Default for StderrLogger {
    fn default() -> Self {
        Self::new()
    }
}

impl FileLogger {
    pub fn new(file: std::fs::File) -> Self {
        Self(file)
    }
}

impl VecLogger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything logged so far, one entry per line.
    pub fn lines(&self) -> Vec<String> {
        let buffer = match self.0.lock() {
            Ok(buffer) => buffer,
            Err(poisoned) => poisoned.into_inner(),
        };
        String::from_utf8_lossy(&buffer).lines().map(String::from).collect()
    }

    pub fn contains(&self, needle: &str) -> bool {
        self.lines().iter().any(|line| line.contains(needle))
    }

    pub fn clear(&self) {
        if let Ok(mut buffer) = self.0.lock() {
            buffer.clear();
        }
    }
}

/////////////////
impl Logger for DummyLogger {
    fn line_writer(&mut self) -> Option<&mut dyn Write> {
        None
    }
}

impl Logger for StderrLogger {
    fn line_writer(&mut self) -> Option<&mut dyn Write> {
        Some(&mut self.0)
    }
}

impl Logger for FileLogger {
    fn line_writer(&mut self) -> Option<&mut dyn Write> {
        let _ = write!(&mut self.0, "[{:.6}] ", secs_since_unix_epoch());
        Some(&mut self.0)
    }
}

impl Logger for VecLogger {
    fn line_writer(&mut self) -> Option<&mut dyn Write> {
        Some(self)
    }
}
///////////////////
impl Write for VecLogger {
    fn flush(&mut self) -> Result<(), std::io::Error> {
        Ok(())
    }
    fn write(&mut self, data: &[u8]) -> Result<usize, std::io::Error> {
        match self.0.lock() {
            Ok(mut buffer) => buffer.extend_from_slice(data),
            Err(poisoned) => poisoned.into_inner().extend_from_slice(data),
        }
        Ok(data.len())
    }
}
