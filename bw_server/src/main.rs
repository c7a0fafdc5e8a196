#[macro_use]
extern crate log;

use bw_server::{config::Config, server::Server};
use clap::Parser;
use log::LevelFilter;
use std::{
  io::BufRead,
  process::ExitCode,
};

/// Launches the server with no required arguments (§6): config is read from
/// (and written back to, if missing) `config.json` in the current directory.
#[derive(Parser, Debug)]
#[clap(about, version, author)]
struct Args {
  /// Path to the config file (§6's JSON document).
  #[clap(long, default_value = "config.json")]
  config:    String,
  /// Logging verbosity.
  #[clap(long, default_value = "info")]
  log_level: LevelFilter,
}

fn main() -> ExitCode {
  let args = Args::parse();
  bw_common::logging::init_with_level(args.log_level);

  let config = match Config::load(&args.config) {
    Ok(c) => c,
    Err(e) => {
      error!("failed to load config: {e}");
      return ExitCode::FAILURE;
    }
  };

  let server = match Server::start(config) {
    Ok(s) => s,
    Err(e) => {
      error!("failed to start server: {e}");
      return ExitCode::FAILURE;
    }
  };

  // Blocks on stdin until the operator types `stop` (§6); any other line is
  // ignored rather than treated as an error, so a stray newline from a
  // supervising process doesn't bring the server down.
  let stdin = std::io::stdin();
  for line in stdin.lock().lines() {
    match line {
      Ok(line) if line.trim() == "stop" => break,
      Ok(_) => {}
      Err(e) => {
        error!("stdin read failed: {e}");
        break;
      }
    }
  }

  server.stop();
  ExitCode::SUCCESS
}
