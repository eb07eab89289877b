//! Logging macros
//!
//! Thin sugar over [`Logger::log`](crate::Logger::log): the message is a
//! template with `{name}` placeholders and the trailing `key = value` pairs
//! become the record's properties.
//!
//! # Examples
//!
//! ```
//! use logtape::{get_logger, info, props};
//!
//! let logger = get_logger(["my-app", "http"]);
//!
//! info!(logger, "Server started");
//!
//! let port = 8080;
//! info!(logger, "Listening on port {port}", port = port);
//!
//! let properties = props! { "user" => "alice", "attempts" => 3 };
//! logger.warn(("Login retry for {user}", properties));
//! ```

/// Build a [`Properties`](crate::Properties) bag.
///
/// ```
/// use logtape::props;
///
/// let bag = props! { "id" => 7, "name" => "job" };
/// assert_eq!(bag.len(), 2);
/// ```
#[macro_export]
macro_rules! props {
    () => {
        $crate::Properties::new()
    };
    ($($key:expr => $value:expr),+ $(,)?) => {{
        let mut properties = $crate::Properties::new();
        $(properties.insert($key, $value);)+
        properties
    }};
}

/// Log a template at an explicit level.
///
/// ```
/// # use logtape::{get_logger, LogLevel};
/// use logtape::log;
/// let logger = get_logger("jobs");
/// log!(logger, LogLevel::Info, "Simple message");
/// log!(logger, LogLevel::Error, "Job {id} failed", id = 500);
/// ```
#[macro_export]
macro_rules! log {
    ($logger:expr, $level:expr, $template:expr $(,)?) => {
        $logger.log($level, $template, $crate::Properties::new())
    };
    ($logger:expr, $level:expr, $template:expr, $($key:ident = $value:expr),+ $(,)?) => {
        $logger.log(
            $level,
            $template,
            $crate::props! { $(stringify!($key) => $value),+ },
        )
    };
}

#[macro_export]
macro_rules! trace {
    ($logger:expr, $($arg:tt)+) => {
        $crate::log!($logger, $crate::LogLevel::Trace, $($arg)+)
    };
}

#[macro_export]
macro_rules! debug {
    ($logger:expr, $($arg:tt)+) => {
        $crate::log!($logger, $crate::LogLevel::Debug, $($arg)+)
    };
}

#[macro_export]
macro_rules! info {
    ($logger:expr, $($arg:tt)+) => {
        $crate::log!($logger, $crate::LogLevel::Info, $($arg)+)
    };
}

/// Log a warning-level template.
#[macro_export]
macro_rules! warn {
    ($logger:expr, $($arg:tt)+) => {
        $crate::log!($logger, $crate::LogLevel::Warning, $($arg)+)
    };
}

#[macro_export]
macro_rules! error {
    ($logger:expr, $($arg:tt)+) => {
        $crate::log!($logger, $crate::LogLevel::Error, $($arg)+)
    };
}

#[macro_export]
macro_rules! fatal {
    ($logger:expr, $($arg:tt)+) => {
        $crate::log!($logger, $crate::LogLevel::Fatal, $($arg)+)
    };
}

#[cfg(test)]
mod tests {
    use crate::core::{sink_fn, LogLevel, LogRecord, Logger, Value};
    use parking_lot::Mutex;
    use std::sync::Arc;

    fn collecting_logger() -> (Logger, Arc<Mutex<Vec<LogRecord>>>) {
        let logger = Logger::isolated_root().get_child("macros");
        let records = Arc::new(Mutex::new(Vec::new()));
        let sink_records = Arc::clone(&records);
        logger.add_sink(sink_fn("collect", move |r: &LogRecord| {
            sink_records.lock().push(r.clone());
            Ok(())
        }));
        (logger, records)
    }

    #[test]
    fn test_props_macro() {
        let bag = props! { "a" => 1, "b" => "two", };
        assert_eq!(bag.get("a"), Some(&Value::Int(1)));
        assert_eq!(bag.get("b"), Some(&Value::String("two".into())));
        assert!(props! {}.is_empty());
    }

    #[test]
    fn test_level_macros() {
        let (logger, records) = collecting_logger();
        trace!(logger, "t");
        debug!(logger, "d");
        info!(logger, "Hello {name}", name = "world");
        warn!(logger, "w");
        error!(logger, "e", code = 500,);
        fatal!(logger, "f");

        let records = records.lock();
        let levels: Vec<_> = records.iter().map(|r| r.level).collect();
        assert_eq!(levels, LogLevel::ALL.to_vec());
        assert_eq!(records[2].message().to_string(), "Hello \"world\"");
        assert_eq!(records[4].properties().get("code"), Some(&Value::Int(500)));
    }
}
