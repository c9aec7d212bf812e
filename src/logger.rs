use log::{LevelFilter, SetLoggerError};
use simplelog::{Config, ConfigBuilder, WriteLogger};
use std::io::{stderr, Write};

/// `[%F %T]`-stamped lines with the target, so log output never mixes with
/// the command stream on stdout.
pub fn config() -> Config {
    ConfigBuilder::new()
        .set_time_format_str("[%F %T]")
        .set_time_to_local(true)
        .set_target_level(LevelFilter::Error)
        .set_thread_level(LevelFilter::Off)
        .build()
}

pub fn logger<W: Write + Send + 'static>(level: LevelFilter, writer: W) -> Box<WriteLogger<W>> {
    WriteLogger::new(level, config(), writer)
}

pub fn init(level: LevelFilter) -> Result<(), SetLoggerError> {
    WriteLogger::init(level, config(), stderr())
}

pub fn parse_level(input: Option<&str>) -> Result<LevelFilter, String> {
    match input {
        None => Ok(LevelFilter::Warn),
        Some(level) => level
            .parse()
            .map_err(|_| format!("unknown log level: {}", level)),
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use chrono::NaiveDateTime;
    use log::{Level, Log, Record};
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Default)]
    struct Output(Arc<Mutex<Vec<u8>>>);

    impl Write for Output {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().write(buf)
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    impl Output {
        fn lines(&self) -> Vec<String> {
            String::from_utf8(self.0.lock().unwrap().clone())
                .unwrap()
                .lines()
                .map(str::to_string)
                .collect()
        }
    }

    fn write_record(logger: &dyn Log, level: Level, message: &str) {
        logger.log(
            &Record::builder()
                .level(level)
                .target("touchscreen_harness::device")
                .args(format_args!("{}", message))
                .build(),
        );
    }

    mod logger {
        use super::*;

        #[test]
        fn stamps_lines_with_date_and_time() {
            let output = Output::default();
            let logger = logger(LevelFilter::Info, output.clone());
            write_record(&*logger, Level::Info, "registered");
            let lines = output.lines();
            assert_eq!(lines.len(), 1);
            let line = &lines[0];
            assert!(line.starts_with('['));
            assert!(NaiveDateTime::parse_from_str(&line[1..20], "%F %T").is_ok(), "{}", line);
            assert!(line.contains("INFO"), "{}", line);
            assert!(line.contains("touchscreen_harness::device"), "{}", line);
            assert!(line.ends_with("registered"), "{}", line);
        }

        #[test]
        fn drops_records_above_the_level() {
            let output = Output::default();
            let logger = logger(LevelFilter::Info, output.clone());
            write_record(&*logger, Level::Warn, "kept");
            write_record(&*logger, Level::Debug, "dropped");
            let lines = output.lines();
            assert_eq!(lines.len(), 1);
            assert!(lines[0].ends_with("kept"));
        }

        #[test]
        fn drops_everything_when_off() {
            let output = Output::default();
            let logger = logger(LevelFilter::Off, output.clone());
            write_record(&*logger, Level::Error, "dropped");
            assert!(output.lines().is_empty());
        }
    }

    mod parse_level {
        use super::*;

        #[test]
        fn defaults_to_warn() {
            assert_eq!(parse_level(None), Ok(LevelFilter::Warn));
        }

        #[test]
        fn is_case_insensitive() {
            assert_eq!(parse_level(Some("DEBUG")), Ok(LevelFilter::Debug));
        }

        #[test]
        fn rejects_unknown_levels() {
            assert!(parse_level(Some("loud")).is_err());
        }
    }
}
