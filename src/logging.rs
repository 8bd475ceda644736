// Logging setup
//
// env_logger is installed before anything else runs, so messages from
// config loading are not lost. Records always go to stderr; once the config
// names a log file, the same records are copied there too.

use env_logger::{Builder, Target};
use log::LevelFilter;
use parking_lot::Mutex;
use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::Path;
use std::sync::Arc;

/// Writer behind env_logger: stderr plus an optional log file
#[derive(Clone, Default)]
pub struct LogOutput {
    file: Arc<Mutex<Option<File>>>,
}

impl LogOutput {
    /// Truncate `path`, write the header and copy every later record into it
    pub fn attach_file(&self, path: &Path) -> io::Result<()> {
        let mut file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(path)?;

        writeln!(file, "=== Vulkan Setup Log ===")?;
        writeln!(file, "Started: {:?}", std::time::SystemTime::now())?;
        writeln!(file)?;

        *self.file.lock() = Some(file);
        Ok(())
    }
}

impl Write for LogOutput {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        io::stderr().write_all(buf)?;
        if let Some(file) = self.file.lock().as_mut() {
            file.write_all(buf)?;
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        io::stderr().flush()?;
        if let Some(file) = self.file.lock().as_mut() {
            file.flush()?;
        }
        Ok(())
    }
}

fn builder(output: &LogOutput) -> Builder {
    let mut builder = Builder::new();
    builder.filter_level(LevelFilter::Info);
    builder.target(Target::Pipe(Box::new(output.clone())));
    builder
}

/// Install the global logger. `RUST_LOG` overrides the default `info` level.
pub fn init() -> LogOutput {
    let output = LogOutput::default();
    let mut builder = builder(&output);
    builder.parse_default_env();
    if builder.try_init().is_err() {
        log::warn!("Logger already initialized");
    }
    output
}
