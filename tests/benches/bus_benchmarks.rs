//! # Bus Benchmarks
//!
//! | Path | What it covers |
//! |------|----------------|
//! | envelope | JSON encode and decode of commands and events |
//! | dispatch | decode, self-filter, targeting and handler lookup per message |

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use fleet_bus::{Channel, CommandRegistry, Dispatcher};
use fleet_types::{
    CommandMessage, CommandName, Envelope, EventKind, EventOptions, InstanceId, InstanceRole,
};
use serde_json::json;

fn id(value: &str) -> InstanceId {
    InstanceId::new(value).unwrap()
}

/// A command every instance acts on when `targets` is 0, otherwise one listing
/// `worker-0` among `targets` instances.
fn command_json(targets: usize) -> String {
    let mut command = CommandMessage::new(CommandName::RestartEventBus)
        .with_payload(json!({"reason": "benchmark"}))
        .stamped(id("main"));
    if targets > 0 {
        command = command.with_targets((0..targets).map(|i| id(&format!("worker-{i}"))).collect());
    }
    Envelope::Command(command).to_json().unwrap()
}

// ============================================================================
// Envelope codec
// ============================================================================

fn bench_envelope_codec(c: &mut Criterion) {
    let mut group = c.benchmark_group("envelope");

    let command = Envelope::Command(
        CommandMessage::new(CommandName::ReloadLicense).stamped(id("main")),
    );
    group.bench_function("encode_command", |b| {
        b.iter(|| black_box(command.to_json().unwrap()))
    });

    let raw = command.to_json().unwrap();
    group.bench_function("decode_command", |b| {
        b.iter(|| black_box(Envelope::from_json(black_box(&raw)).unwrap()))
    });

    let event = Envelope::new_event(
        EventKind::Workflow,
        EventOptions::named("fleet.workflow.activated").with_message("activated"),
    );
    group.bench_function("anonymize_and_encode_event", |b| {
        b.iter(|| black_box(event.anonymize().to_json().unwrap()))
    });

    group.finish();
}

// ============================================================================
// Dispatch
// ============================================================================

fn bench_dispatch(c: &mut Criterion) {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .build()
        .unwrap();

    let handled = Arc::new(AtomicUsize::new(0));
    let mut registry = CommandRegistry::new(InstanceRole::Worker);
    let counter = handled.clone();
    registry
        .register_fn(CommandName::RestartEventBus, move |_| {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::Relaxed);
                Ok(())
            }
        })
        .unwrap();
    let dispatcher = Dispatcher::new(Some(id("worker-0")), Arc::new(registry));

    let mut group = c.benchmark_group("dispatch");
    group.measurement_time(Duration::from_secs(5));
    group.throughput(Throughput::Elements(1));

    for targets in [0, 10, 100] {
        let raw = command_json(targets);
        let outcome = runtime.block_on(dispatcher.dispatch(Channel::Commands, &raw));
        assert!(outcome.is_handled(), "{targets} targets: {outcome:?}");
        group.bench_with_input(BenchmarkId::new("handled", targets), &raw, |b, raw| {
            b.to_async(&runtime)
                .iter(|| dispatcher.dispatch(Channel::Commands, black_box(raw)))
        });
    }

    let own = Envelope::Command(CommandMessage::new(CommandName::GetId).stamped(id("worker-0")))
        .to_json()
        .unwrap();
    group.bench_function("self_origin", |b| {
        b.to_async(&runtime)
            .iter(|| dispatcher.dispatch(Channel::Commands, black_box(&own)))
    });

    group.bench_function("undecodable", |b| {
        b.to_async(&runtime)
            .iter(|| dispatcher.dispatch(Channel::Commands, black_box("{not json")))
    });

    group.finish();
    black_box(handled.load(Ordering::Relaxed));
}

criterion_group!(benches, bench_envelope_codec, bench_dispatch);
criterion_main!(benches);
