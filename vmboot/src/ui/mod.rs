//! Operator-facing console output

use std::io::Write;
use std::sync::Mutex;

use colored::Colorize;

pub trait Ui: Send + Sync {
    fn say(&self, msg: &str);

    fn error(&self, msg: &str);
}

/// Ui printing to stdout, errors to stderr
pub struct ConsoleUi {
    out: Mutex<Box<dyn Write + Send>>,
    err: Mutex<Box<dyn Write + Send>>,
}

impl ConsoleUi {
    pub fn new() -> Self {
        Self::with_writers(Box::new(std::io::stdout()), Box::new(std::io::stderr()))
    }

    pub fn with_writers(out: Box<dyn Write + Send>, err: Box<dyn Write + Send>) -> Self {
        Self {
            out: Mutex::new(out),
            err: Mutex::new(err),
        }
    }
}

impl Default for ConsoleUi {
    fn default() -> Self {
        Self::new()
    }
}

fn write_line(writer: &Mutex<Box<dyn Write + Send>>, line: &str) {
    // best effort
    if let Ok(mut w) = writer.lock() {
        let _ = writeln!(w, "{}", line);
        let _ = w.flush();
    }
}

impl Ui for ConsoleUi {
    fn say(&self, msg: &str) {
        write_line(&self.out, msg);
    }

    fn error(&self, msg: &str) {
        write_line(&self.err, &msg.red().to_string());
    }
}
