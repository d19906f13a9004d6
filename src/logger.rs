use chrono::Local;
use env_logger::Builder;
use log::LevelFilter;
use std::io::Write;

const CRATE_TARGET: &str = "release_console";
const TIMESTAMP: &str = "%Y-%m-%dT%H:%M:%S";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LogFormat {
    Plain,
    /// Adds the source location of every record.
    Debug,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct LoggerSettings {
    format: LogFormat,
    level: LevelFilter,
}

impl LoggerSettings {
    /// Unparseable values fall back to the plain format at `info`.
    fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let debug = lookup("LOG_DEBUG")
            .and_then(|v| v.trim().parse::<bool>().ok())
            .unwrap_or(false);
        let level = lookup("LOG_LEVEL")
            .and_then(|v| v.trim().parse::<LevelFilter>().ok())
            .unwrap_or(LevelFilter::Info);

        Self {
            format: if debug { LogFormat::Debug } else { LogFormat::Plain },
            level,
        }
    }

    fn builder(self) -> Builder {
        let mut builder = Builder::new();
        match self.format {
            LogFormat::Plain => {
                builder.format(|buf, record| {
                    writeln!(
                        buf,
                        "{} [{}] - {}",
                        Local::now().format(TIMESTAMP),
                        record.level(),
                        record.args()
                    )
                });
                builder.filter(None, LevelFilter::Info);
            }
            LogFormat::Debug => {
                builder.format(|buf, record| {
                    writeln!(
                        buf,
                        "{} [{}] - {}:{} - {}",
                        Local::now().format(TIMESTAMP),
                        record.level(),
                        record.file().unwrap_or("?"),
                        record.line().unwrap_or(0),
                        record.args()
                    )
                });
                builder.filter(None, LevelFilter::Info);
            }
        }
        builder.filter(Some(CRATE_TARGET), self.level);
        builder
    }
}

pub fn init_from_environment() {
    let settings = LoggerSettings::from_lookup(|key| std::env::var(key).ok());
    settings.builder().init();
    log::debug!("Logger initialized with {settings:?}");
}
