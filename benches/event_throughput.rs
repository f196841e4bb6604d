use std::sync::OnceLock;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use desim::prelude::*;

#[derive(Debug, Clone)]
struct Tick;

impl EventMessage for Tick {
    fn class_name(&self) -> &'static str {
        "Tick"
    }
    fn header(&self) -> &'static [&'static str] {
        &[]
    }
    fn field_values(&self) -> Vec<FieldValue> {
        Vec::new()
    }
}

struct Ticker {
    name: String,
    time: f64,
}

fn ticker_descriptor() -> &'static ClassDescriptor<Ticker> {
    static CELL: OnceLock<ClassDescriptor<Ticker>> = OnceLock::new();
    CELL.get_or_init(|| {
        ClassDescriptorBuilder::new()
            .handler("Tick", handle_tick)
            .sends("Tick")
            .class_priority(ClassPriority::LOW)
            .build()
            .unwrap()
    })
}

fn handle_tick(_obj: &mut Ticker, _msg: &dyn EventMessage, gate: &mut SendGate) -> desim::error::Result<()> {
    gate.send_event(1.0, gate.sender(), Box::new(Tick), false)
}

impl SimObject for Ticker {
    fn name(&self) -> &str {
        &self.name
    }
    fn class_name(&self) -> &'static str {
        "Ticker"
    }
    fn class_priority(&self) -> u8 {
        ClassPriority::LOW
    }
    fn time(&self) -> f64 {
        self.time
    }
    fn set_time(&mut self, time: f64) {
        self.time = time;
    }
    fn handler_priority(&self, message_class: &str) -> Option<u32> {
        ticker_descriptor().handler_priority(message_class)
    }
    fn handled_message_classes(&self) -> Vec<&'static str> {
        ticker_descriptor().handled_message_classes()
    }
    fn sent_message_classes(&self) -> Vec<&'static str> {
        ticker_descriptor().sent_message_classes()
    }
    fn init_before_run(&mut self, gate: &mut SendGate) -> desim::error::Result<()> {
        gate.send_event(0.0, gate.sender(), Box::new(Tick), false)
    }
    fn dispatch(&mut self, message: &dyn EventMessage, gate: &mut SendGate) -> desim::error::Result<()> {
        desim::registry::dispatch_via_descriptor(self, ticker_descriptor(), &self.name, message, gate)
    }
}

fn build_sim(num_tickers: usize, max_time: f64) -> Simulator {
    let mut sim = Simulator::new();
    for i in 0..num_tickers {
        sim.add(Box::new(Ticker {
            name: format!("ticker-{i}"),
            time: 0.0,
        }))
        .unwrap();
    }
    sim.initialize().unwrap();
    let _ = max_time;
    sim
}

fn bench_event_throughput(c: &mut Criterion) {
    let mut group = c.benchmark_group("event_throughput");

    for num_tickers in [1, 10, 100, 1000].iter() {
        group.bench_with_input(
            BenchmarkId::new("tickers", num_tickers),
            num_tickers,
            |b, &num_tickers| {
                b.iter_with_setup(
                    || build_sim(num_tickers, 1000.0),
                    |mut sim| {
                        let config = SimulationConfig::new(1000.0);
                        black_box(sim.simulate(&config).unwrap());
                    },
                );
            },
        );
    }

    group.finish();
}

fn bench_single_ticker_long_run(c: &mut Criterion) {
    let mut group = c.benchmark_group("single_ticker_throughput");
    group.sample_size(10);

    for max_time in [10_000.0, 100_000.0, 1_000_000.0].iter() {
        group.bench_with_input(
            BenchmarkId::new("max_time", max_time),
            max_time,
            |b, &max_time| {
                b.iter_with_setup(
                    || build_sim(1, max_time),
                    |mut sim| {
                        let config = SimulationConfig::new(max_time);
                        black_box(sim.simulate(&config).unwrap());
                    },
                );
            },
        );
    }

    group.finish();
}

criterion_group!(benches, bench_event_throughput, bench_single_ticker_long_run);
criterion_main!(benches);
