//! Basic logger usage example
//!
//! Demonstrates configuring the process-wide logger tree, message templates
//! and implicit context.
//!
//! Run with: cargo run --example basic_usage

use logtape::prelude::*;
use logtape::sinks::TextFormatter;
use logtape::{info, warn};
use std::sync::Arc;

fn main() -> Result<()> {
    println!("=== logtape - Basic Usage Example ===\n");

    configure(
        Config::new()
            .sink("console", Arc::new(ConsoleSink::new()))
            .sink(
                "plain",
                Arc::new(ConsoleSink::with_formatter(
                    TextFormatter::new().with_properties(true),
                )),
            )
            .logger(
                LoggerConfig::new("my-app")
                    .with_sinks(["console"])
                    .with_lowest_level(Some(LogLevel::Debug)),
            )
            .logger(
                LoggerConfig::new(["my-app", "audit"])
                    .with_sinks(["plain"])
                    .with_parent_sinks(ParentSinks::Override),
            ),
    )?;

    let logger = get_logger("my-app");

    println!("1. Logging at different levels:");
    logger.trace("This trace message is below the threshold");
    logger.debug("This is a debug message");
    logger.info("This is an info message");
    logger.warn("This is a warning message");
    logger.error("This is an error message");
    logger.fatal("This is a fatal message");

    println!("\n2. Message templates:");
    logger.info((
        "User {user.name} signed in from {ip}",
        props! { "user" => props! { "name" => "alice" }, "ip" => "10.0.0.7" },
    ));
    info!(logger, "Listening on port {port}", port = 8080);

    println!("\n3. Child categories and overrides:");
    let audit = logger.get_child("audit");
    warn!(audit, "Permission change for {role}", role = "admin");

    println!("\n4. Implicit context:");
    with_context(props! { "request_id" => "req-42" }, || {
        logger.get_child("http").info("Handling {request_id}");
    });

    reset()?;
    println!("\n=== Example completed successfully! ===");
    Ok(())
}
