//! Criterion benchmarks for logtape

use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use logtape::prelude::*;
use logtape::sinks::CategoryIsolation;
use logtape::{parse_message_template, resolve_property_path, sink_fn};

fn null_sink() -> SinkRef {
    sink_fn("null", |record: &LogRecord| {
        black_box(record.message());
        Ok(())
    })
}

// ============================================================================
// Template Benchmarks
// ============================================================================

fn bench_template_parsing(c: &mut Criterion) {
    let mut group = c.benchmark_group("template_parsing");
    group.throughput(Throughput::Elements(1));

    let properties = props! {
        "user" => props! { "name" => "alice", "roles" => vec!["admin", "dev"] },
        "count" => 42,
    };

    group.bench_function("no_placeholders", |b| {
        b.iter(|| parse_message_template(black_box("Server started"), &properties));
    });

    group.bench_function("simple_placeholder", |b| {
        b.iter(|| parse_message_template(black_box("Processed {count} items"), &properties));
    });

    group.bench_function("nested_path", |b| {
        b.iter(|| {
            parse_message_template(
                black_box("User {user.name} has role {user.roles[0]}"),
                &properties,
            )
        });
    });

    group.bench_function("escaped_braces", |b| {
        b.iter(|| parse_message_template(black_box("{{literal}} and {count}"), &properties));
    });

    group.bench_function("resolve_path", |b| {
        b.iter(|| resolve_property_path(&properties, black_box("user[\"roles\"][1]")));
    });

    group.finish();
}

// ============================================================================
// Dispatch Benchmarks
// ============================================================================

fn bench_dispatch(c: &mut Criterion) {
    let mut group = c.benchmark_group("dispatch");
    group.throughput(Throughput::Elements(1));

    let root = Logger::isolated_root();
    root.add_sink(null_sink());
    let logger = root.get_child(["bench", "db"]);

    group.bench_function("info_literal", |b| {
        b.iter(|| logger.info(black_box("Info message")));
    });

    group.bench_function("info_with_properties", |b| {
        b.iter(|| logger.info(("Query took {ms}ms", props! { "ms" => 12 })));
    });

    group.bench_function("below_threshold", |b| {
        logger.set_lowest_level(Some(LogLevel::Warning));
        b.iter(|| logger.debug(black_box("Dropped message")));
        logger.set_lowest_level(Some(LogLevel::Trace));
    });

    group.bench_function("with_context", |b| {
        b.iter(|| {
            with_context(props! { "request" => "r-1" }, || {
                logger.info("Handled {request}");
            })
        });
    });

    group.finish();
}

// ============================================================================
// Fingers-Crossed Benchmarks
// ============================================================================

fn bench_fingers_crossed(c: &mut Criterion) {
    let mut group = c.benchmark_group("fingers_crossed");
    group.throughput(Throughput::Elements(1));

    let root = Logger::isolated_root();
    let options = FingersCrossedOptions::new()
        .isolate_by_category(CategoryIsolation::Descendant)
        .with_max_buffer_size(1000);
    let sink = match fingers_crossed(null_sink(), options) {
        Ok(sink) => sink,
        Err(e) => panic!("invalid benchmark options: {}", e),
    };
    root.add_sink(sink);
    let logger = root.get_child("worker");

    group.bench_function("buffer_debug", |b| {
        b.iter(|| logger.debug(black_box("Buffered step")));
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_template_parsing,
    bench_dispatch,
    bench_fingers_crossed,
);

criterion_main!(benches);
