//! Fingers-crossed buffering example
//!
//! Debug output is held back per request and only printed for the request
//! that fails.
//!
//! Run with: cargo run --example fingers_crossed

use logtape::prelude::*;
use logtape::sinks::{CategoryIsolation, ContextIsolation};
use std::sync::Arc;
use std::time::Duration;

fn handle(logger: &Logger, request: &str, fail: bool) {
    with_context(props! { "request" => request }, || {
        logger.debug("Parsing headers for {request}");
        logger.get_child("db").debug("Loading session");
        if fail {
            logger.error("Request {request} failed");
        } else {
            logger.info("Request {request} done");
        }
    });
}

fn main() -> Result<()> {
    println!("=== logtape - Fingers-Crossed Example ===\n");

    let buffered = fingers_crossed(
        Arc::new(ConsoleSink::plain()),
        FingersCrossedOptions::new()
            .with_trigger_level(LogLevel::Error)
            .with_max_buffer_size(100)
            .isolate_by_category(CategoryIsolation::Descendant)
            .isolate_by_context(
                ContextIsolation::new(["request"])
                    .with_buffer_ttl(Duration::from_secs(60))
                    .with_max_contexts(1000),
            ),
    )?;

    configure(
        Config::new()
            .sink("buffered", buffered)
            .logger(LoggerConfig::new("server").with_sinks(["buffered"])),
    )?;

    let logger = get_logger("server");
    handle(&logger, "r-1", false);
    handle(&logger, "r-2", true);
    handle(&logger, "r-3", false);

    println!("\nOnly r-2's history was printed.");
    reset()?;
    Ok(())
}
