//! Browser console plumbing: a `log` backend and a panic hook.

use log::{Level, LevelFilter, Metadata, Record};

#[cfg_attr(not(target_arch = "wasm32"), allow(dead_code))]
struct ConsoleLogger;

impl log::Log for ConsoleLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let msg = format!("[{}] {}: {}", record.level(), record.target(), record.args());
        match record.level() {
            Level::Error => web_sys::console::error_1(&msg.into()),
            Level::Warn => web_sys::console::warn_1(&msg.into()),
            _ => web_sys::console::log_1(&msg.into()),
        }
    }

    fn flush(&self) {}
}

#[cfg_attr(not(target_arch = "wasm32"), allow(dead_code))]
static LOGGER: ConsoleLogger = ConsoleLogger;

/// Route `log` records to the console. The first call installs the logger;
/// later calls only change the level.
pub fn init_logging(level: LevelFilter) {
    #[cfg(target_arch = "wasm32")]
    {
        use std::sync::Once;
        static SET_LOGGER: Once = Once::new();
        SET_LOGGER.call_once(|| {
            let _ = log::set_logger(&LOGGER);
        });
    }
    log::set_max_level(level);
}

pub fn init_panic_hook() {
    #[cfg(target_arch = "wasm32")]
    {
        use std::sync::Once;
        static SET_HOOK: Once = Once::new();
        SET_HOOK.call_once(|| {
            std::panic::set_hook(Box::new(|info| {
                let msg = format!("KeymapKit WASM panic: {info}");
                web_sys::console::error_1(&msg.into());
            }));
        });
    }
}
