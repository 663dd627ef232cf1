//! Console backend for the [`logger`] crate's [`LogInterface`].
//!
//! `logger` owns level filtering; this crate only turns an already-accepted
//! `log::Record` into colored console output.

use logger::LogInterface;
use mutex::SpinNoIrqLock;

use crate::println;

static LOG_LOCK: SpinNoIrqLock<()> = SpinNoIrqLock::new(());

fn level_color(level: log::Level) -> u8 {
    match level {
        log::Level::Error => 31,
        log::Level::Warn => 93,
        log::Level::Info => 34,
        log::Level::Debug => 32,
        log::Level::Trace => 90,
    }
}

struct LogInterfaceImpl;

#[crate_interface::impl_interface]
impl LogInterface for LogInterfaceImpl {
    fn print_log(record: &log::Record) {
        let _guard = LOG_LOCK.lock();
        println!(
            "\u{1B}[{}m[{:>5}][{}:{}] {}\u{1B}[0m",
            level_color(record.level()),
            record.level(),
            record.file().unwrap_or("?"),
            record.line().unwrap_or(0),
            record.args()
        );
    }
}
