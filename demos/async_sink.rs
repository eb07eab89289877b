//! Async sink example
//!
//! Wraps an asynchronous handler into a sink and disposes it asynchronously
//! so every queued record is delivered before exit.
//!
//! Run with: cargo run --example async_sink

use async_trait::async_trait;
use logtape::prelude::*;
use logtape::sinks::{from_async_sink, AsyncSink, JsonLinesFormatter, Formatter};
use std::sync::Arc;
use std::time::Duration;

struct DelayedPrinter {
    formatter: JsonLinesFormatter,
}

#[async_trait]
impl AsyncSink for DelayedPrinter {
    async fn emit(&self, record: LogRecord) -> Result<()> {
        // Stand-in for a network round trip.
        tokio::time::sleep(Duration::from_millis(10)).await;
        println!("{}", self.formatter.format(&record));
        Ok(())
    }

    fn name(&self) -> &str {
        "delayed-printer"
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    println!("=== logtape - Async Sink Example ===\n");

    let sink = from_async_sink(DelayedPrinter {
        formatter: JsonLinesFormatter::new(),
    })?;
    configure_async(
        Config::new()
            .sink("remote", Arc::new(sink))
            .logger(LoggerConfig::new("worker").with_sinks(["remote"])),
    )
    .await?;

    let logger = get_logger("worker");
    for job in 0..5 {
        logger.info(("Finished job {job}", props! { "job" => job }));
    }

    in_context(props! { "batch" => "nightly" }, async {
        logger
            .log_async(LogLevel::Info, "Batch {batch} summary: {rows} rows", || async {
                tokio::time::sleep(Duration::from_millis(5)).await;
                props! { "rows" => 1280 }
            })
            .await;
    })
    .await;

    reset_async().await?;
    println!("\nAll records delivered.");
    Ok(())
}
