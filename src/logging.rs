// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Logger initialisation for embedding applications and tests.
//!
//! `limbtrace` logs through the [`log`] facade only; it never installs a
//! global logger on its own. Call [`init_logger`] once, early, if you want
//! a sensible default (matching the verbosity levels used throughout the
//! rest of the crate: 0 = errors only, 1 = info, 2 = debug, 3+ = trace).

use fern::colors::{Color, ColoredLevelConfig};
use log::LevelFilter;

/// Install a `fern`-backed logger at the requested verbosity.
///
/// Calling this more than once returns an error from the underlying `log`
/// crate (via `set_logger`); embedding applications that already have a
/// logger installed should not call this at all.
pub fn init_logger(verbosity: u8) -> Result<(), log::SetLoggerError> {
    let level = match verbosity {
        0 => LevelFilter::Error,
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };

    let colors = ColoredLevelConfig::new()
        .error(Color::Red)
        .warn(Color::Yellow)
        .info(Color::Green)
        .debug(Color::Blue)
        .trace(Color::BrightBlack);

    fern::Dispatch::new()
        .format(move |out, message, record| {
            out.finish(format_args!(
                "[{} {}] {}",
                record.target(),
                colors.color(record.level()),
                message
            ))
        })
        .level(level)
        .chain(std::io::stderr())
        .apply()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    // `fern::Dispatch::apply` installs a process-wide global logger, so the
    // first-succeeds/second-fails behaviour can only be asserted from a
    // single test that controls both calls; `#[serial]` keeps it isolated
    // from any other test in this binary that might also touch the logger.
    #[test]
    #[serial]
    fn only_the_first_init_succeeds() {
        assert!(init_logger(2).is_ok());
        assert!(init_logger(1).is_err());
    }
}
