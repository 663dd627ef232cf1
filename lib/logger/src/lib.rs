#![no_std]

use crate_interface::call_interface;
use log::LevelFilter;

struct SimpleLogger;

/// Forwards every accepted record to whatever console/serial backend the
/// surrounding kernel registers via [`LogInterface`]. This crate owns the
/// filtering policy (level, `init`) but not the byte-level output — that
/// stays an external collaborator's job, same split as the rest of this
/// subsystem's boundary with the console driver.
impl log::Log for SimpleLogger {
    fn enabled(&self, _metadata: &log::Metadata) -> bool {
        true
    }
    fn log(&self, record: &log::Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        call_interface!(LogInterface::print_log(record));
    }
    fn flush(&self) {}
}

/// Interface a console/serial driver implements with `#[import_interface]`
/// to receive formatted log records from this crate.
#[crate_interface::def_interface]
pub trait LogInterface: Send + Sync {
    fn print_log(record: &log::Record);
}

/// Installs the global logger and sets the max level from the `LOG` env var
/// baked in at build time (`trace`, `debug`, `info`, `warn`, `error`; any
/// other value, including unset, disables logging).
pub fn init() {
    static LOGGER: SimpleLogger = SimpleLogger;
    log::set_logger(&LOGGER).ok();
    log::set_max_level(match option_env!("LOG") {
        Some("trace") => LevelFilter::Trace,
        Some("debug") => LevelFilter::Debug,
        Some("info") => LevelFilter::Info,
        Some("warn") => LevelFilter::Warn,
        Some("error") => LevelFilter::Error,
        _ => LevelFilter::Off,
    });
}
