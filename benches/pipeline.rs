//! Integration benchmark for the SwitchBot processing pipeline.
//!
//! Drives the full application loop the way the app.rs tests do: a
//! FakeScanner feeds advertisements through `run_with` into a sink that
//! only counts batches.

use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use switchbot_probe::app::{Options, ScanFuture, Scanner, run_with};
use switchbot_probe::output::{MetricBatch, MetricSink, PushFuture};
use switchbot_probe::{
    AdStructure, AdValue, Backend, DeviceConfig, DeviceRegistry, Emitter, MacAddress,
    RawAdvertisement,
};
use tokio::runtime::Runtime;
use tokio::sync::mpsc;

/// Meter service data: battery 100, 5.2 °C, 50 %
const METER: [u8; 8] = [0x00, 0x0d, 0x54, 0x00, 0xE4, 0x02, 0x85, 0x32];

fn mac(i: u8) -> MacAddress {
    MacAddress([0xAA, 0xBB, 0xCC, 0xDD, 0xEE, i])
}

fn meter_advertisement(address: MacAddress) -> RawAdvertisement {
    RawAdvertisement::new(
        address,
        vec![
            AdStructure::new(0x01, AdValue::Data(vec![0x06])),
            AdStructure::new(0x16, AdValue::Data(METER.to_vec())),
        ],
    )
}

fn registry(devices: u8) -> Arc<DeviceRegistry> {
    let configs = (0..devices).map(|i| DeviceConfig {
        address: mac(i),
        location: format!("room{i}"),
        device_type: "meter".to_string(),
        name: format!("Meter {i}"),
    });
    Arc::new(DeviceRegistry::new(configs).unwrap())
}

struct FakeScanner {
    advertisements: Vec<RawAdvertisement>,
}

impl Scanner for FakeScanner {
    fn start_scan(&self, _backend: Backend) -> ScanFuture<'_> {
        let advertisements = self.advertisements.clone();
        Box::pin(async move {
            let (tx, rx) = mpsc::channel(advertisements.len().max(1));
            tokio::spawn(async move {
                for adv in advertisements {
                    let _ = tx.send(adv).await;
                }
            });
            Ok(rx)
        })
    }
}

#[derive(Clone, Default)]
struct CountingSink {
    batches: Arc<AtomicUsize>,
}

impl MetricSink for CountingSink {
    fn name(&self) -> &str {
        "counting"
    }

    fn push<'a>(&'a self, batch: &'a MetricBatch) -> PushFuture<'a> {
        black_box(batch);
        self.batches.fetch_add(1, Ordering::Relaxed);
        Box::pin(async { Ok(()) })
    }
}

fn options(throttle: Option<std::time::Duration>) -> Options {
    Options {
        config: "settings.json".into(),
        verbose: false,
        throttle,
        backend: Backend::default(),
        job: None,
    }
}

fn run(rt: &Runtime, registry: &Arc<DeviceRegistry>, scanner: &FakeScanner, options: &Options) -> usize {
    let sink = CountingSink::default();
    let emitter = Emitter::new(vec![Box::new(sink.clone())]);
    rt.block_on(async {
        run_with(options, registry.clone(), scanner, emitter)
            .await
            .unwrap();
    });
    sink.batches.load(Ordering::Relaxed)
}

/// Benchmark batch processing through the full pipeline
fn bench_batch_pipeline(c: &mut Criterion) {
    let mut group = c.benchmark_group("batch_pipeline");
    let rt = Runtime::new().unwrap();
    let registry = registry(1);
    let options = options(None);

    for batch_size in [1, 10, 100] {
        group.throughput(Throughput::Elements(batch_size as u64));
        group.bench_with_input(
            BenchmarkId::from_parameter(batch_size),
            &batch_size,
            |b, &size| {
                let scanner = FakeScanner {
                    advertisements: (0..size).map(|_| meter_advertisement(mac(0))).collect(),
                };
                b.iter(|| black_box(run(&rt, &registry, &scanner, &options)))
            },
        );
    }

    group.finish();
}

/// Every observation re-renders the whole state, so cost grows with the device count
fn bench_multi_device_pipeline(c: &mut Criterion) {
    let mut group = c.benchmark_group("multi_device_pipeline");
    let rt = Runtime::new().unwrap();
    let options = options(None);

    for devices in [1u8, 10, 50] {
        let registry = registry(devices);
        let scanner = FakeScanner {
            advertisements: (0..devices).map(|i| meter_advertisement(mac(i))).collect(),
        };

        group.throughput(Throughput::Elements(u64::from(devices)));
        group.bench_with_input(BenchmarkId::from_parameter(devices), &devices, |b, _| {
            b.iter(|| black_box(run(&rt, &registry, &scanner, &options)))
        });
    }

    group.finish();
}

/// 100 observations of one device with a one hour throttle: one emission
fn bench_throttled_pipeline(c: &mut Criterion) {
    let mut group = c.benchmark_group("throttled_pipeline");
    let rt = Runtime::new().unwrap();
    let registry = registry(1);
    let options = options(Some(std::time::Duration::from_secs(3600)));
    let scanner = FakeScanner {
        advertisements: (0..100).map(|_| meter_advertisement(mac(0))).collect(),
    };

    group.throughput(Throughput::Elements(100));
    group.bench_function("100_same_mac_throttled", |b| {
        b.iter(|| {
            let batches = run(&rt, &registry, &scanner, &options);
            debug_assert_eq!(batches, 1);
            black_box(batches)
        })
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_batch_pipeline,
    bench_multi_device_pipeline,
    bench_throttled_pipeline,
);
criterion_main!(benches);
