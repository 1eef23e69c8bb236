//! Logging for the finsent binary and library.
//!
//! Records go to stderr so stdout stays free for the metrics report.

use chrono::Local;
use env_logger::{Builder, Env, Target};
use log::{debug, Level};
use std::io::Write;

fn level_color(level: Level) -> &'static str {
    match level {
        | Level::Error => "\x1b[31m",
        | Level::Warn => "\x1b[33m",
        | Level::Info => "\x1b[32m",
        | Level::Debug => "\x1b[36m",
        | Level::Trace => "\x1b[35m",
    }
}

/// Install the global logger. `FINSENT_LOG` overrides `level`,
/// `FINSENT_LOG_STYLE` controls colouring. Later calls are no-ops.
pub fn init_logging(level: &str) {
    let env = Env::default()
        .filter_or("FINSENT_LOG", level)
        .write_style_or("FINSENT_LOG_STYLE", "auto");

    let installed = Builder::from_env(env)
        .format(|buf, record| {
            writeln!(
                buf,
                "{} {}{:5}\x1b[0m [{}] {}",
                Local::now().format("%H:%M:%S%.3f"),
                level_color(record.level()),
                record.level(),
                record.target(),
                record.args()
            )
        })
        .target(Target::Stderr)
        .try_init()
        .is_ok();

    if installed {
        debug!("finsent logging at {}", level);
    }
}
