//! A small, teacher-style logger: colorized when stdout is a tty, timestamped,
//! and showing `module:line` in debug builds. Installed once from `main`.

use log::{Level, LevelFilter, Log, Metadata, Record};
use parking_lot::Mutex;
use std::io::{self, Write};

struct Logger<W> {
  writer: Mutex<W>,
  color: bool,
}

impl<W: Write + Send + Sync> Log for Logger<W> {
  fn enabled(&self, _metadata: &Metadata) -> bool { true }

  fn log(&self, record: &Record) {
    if let Err(e) = self.log_inner(record) {
      eprintln!("logger failed to write: {e}");
    }
  }

  fn flush(&self) {
    let _ = self.writer.lock().flush();
  }
}

impl<W: Write> Logger<W> {
  fn log_inner(&self, record: &Record) -> io::Result<()> {
    let now = chrono::Local::now();
    let mut w = self.writer.lock();
    write!(w, "{} ", now.format("%Y-%m-%d %H:%M:%S%.3f"))?;
    #[cfg(debug_assertions)]
    {
      if let Some(path) = record.module_path() {
        write!(w, "{path}")?;
      }
      if let Some(line) = record.line() {
        write!(w, ":{line}")?;
      }
      write!(w, " ")?;
    }
    if self.color {
      match record.level() {
        Level::Trace => write!(w, "[\x1b[36mTRACE\x1b[0m]")?,
        Level::Debug => write!(w, "[\x1b[34mDEBUG\x1b[0m]")?,
        Level::Info => write!(w, "[\x1b[32mINFO\x1b[0m]")?,
        Level::Warn => write!(w, "[\x1b[33mWARN\x1b[0m]")?,
        Level::Error => write!(w, "[\x1b[31m\x1b[1mERROR\x1b[0m]")?,
      }
    } else {
      write!(w, "[{}]", record.level())?;
    }
    writeln!(w, " {}", record.args())?;
    Ok(())
  }
}

/// Installs the global logger at the given level, writing to stdout.
pub fn init_with_level(level: LevelFilter) {
  init_with_level_writer(level, io::stdout());
}

pub fn init_with_level_writer<W: Write + Send + Sync + 'static>(level: LevelFilter, writer: W) {
  #[cfg(unix)]
  let color = unsafe { libc::isatty(libc::STDOUT_FILENO) } != 0;
  #[cfg(not(unix))]
  let color = false;

  let logger = Box::new(Logger { writer: Mutex::new(writer), color });
  // Only the first call wins; subsequent calls (e.g. from tests) are ignored.
  let _ = log::set_boxed_logger(logger).map(|()| log::set_max_level(level));
}
