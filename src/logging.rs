//! Run-level logging init, in the common `log4rs` idiom: stderr by
//! default, an optional file appender when `--log-filepath` is given.

use std::path::Path;

use log4rs::append::console::ConsoleAppender;
use log4rs::append::file::FileAppender;
use log4rs::config::{Appender, Config as LogConfig, Root};
use log4rs::encode::pattern::PatternEncoder;

const PATTERN: &str = "{d(%Y-%m-%d %H:%M:%S)} {l} [{M}] {m}{n}";

/// Initializes logging at `level`, optionally mirroring to `log_filepath`.
/// Returns the log4rs handle so the caller can keep it alive for the run.
pub fn init_logging(log_filepath: Option<&std::path::PathBuf>, level: log::LevelFilter) -> log4rs::Handle {
    let stderr = ConsoleAppender::builder()
        .encoder(Box::new(PatternEncoder::new(PATTERN)))
        .target(log4rs::append::console::Target::Stderr)
        .build();

    let mut builder = LogConfig::builder().appender(Appender::builder().build("stderr", Box::new(stderr)));
    let mut root = Root::builder().appender("stderr");

    if let Some(path) = log_filepath {
        if let Some(appender) = build_file_appender(path) {
            builder = builder.appender(Appender::builder().build("logfile", Box::new(appender)));
            root = root.appender("logfile");
        }
    }

    let config = builder.build(root.build(level)).expect("logging config is well-formed");
    log4rs::init_config(config).expect("logging initializes exactly once per process")
}

fn build_file_appender(path: &Path) -> Option<FileAppender> {
    FileAppender::builder()
        .encoder(Box::new(PatternEncoder::new(PATTERN)))
        .build(path)
        .ok()
}
