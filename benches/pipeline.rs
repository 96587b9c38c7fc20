//! Integration benchmark for the host capture pipeline.
//!
//! Benchmarks the full application loop using the same patterns as the
//! tests in app.rs - with a FakeSource feeding transport lines through
//! run_with_io.

use ble_sniffer::agent::transport::encode_line;
use ble_sniffer::app::{Options, run_with_io};
use ble_sniffer::hci::frame::DEFAULT_TAG;
use ble_sniffer::{
    AddressType, AdvType, CaptureSession, DecodedAdvertisement, LineSource, MacAddress,
    RawAdvertisement, SourceError,
};
use clap::Parser;
use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use std::future::Future;
use std::pin::Pin;
use tokio::runtime::Runtime;
use tokio::sync::mpsc;

/// Name, flags, battery service and Apple manufacturer data
fn payload() -> Vec<u8> {
    let mut payload = vec![0x02, 0x01, 0x06];
    payload.extend_from_slice(&[0x07, 0x09, b'S', b'e', b'n', b's', b'o', b'r']);
    payload.extend_from_slice(&[0x03, 0x03, 0x0F, 0x18]);
    payload.extend_from_slice(&[0x05, 0xFF, 0x4C, 0x00, 0x02, 0x15]);
    payload
}

fn line(mac: MacAddress, rssi: i8) -> String {
    let raw = RawAdvertisement::new(
        mac,
        rssi,
        37,
        0,
        AdvType::AdvInd,
        AddressType::Public,
        &payload(),
    );
    encode_line(DEFAULT_TAG, &DecodedAdvertisement::decode(raw))
}

/// Lines from `devices` distinct addresses, round-robin.
fn lines(count: usize, devices: u8) -> Vec<String> {
    (0..count)
        .map(|i| {
            let mac = MacAddress([0xAA, 0xBB, 0xCC, 0xDD, 0xEE, (i % devices as usize) as u8]);
            line(mac, -40 - (i % 50) as i8)
        })
        .collect()
}

/// A fake source that yields prepared lines, similar to the one in app.rs tests.
struct FakeSource {
    lines: Vec<String>,
}

impl LineSource for FakeSource {
    fn open(
        &self,
    ) -> Pin<Box<dyn Future<Output = Result<mpsc::Receiver<String>, SourceError>> + Send + '_>>
    {
        let lines = self.lines.clone();
        Box::pin(async move {
            let (tx, rx) = mpsc::channel::<String>(lines.len().max(1));
            tokio::spawn(async move {
                for line in lines {
                    let _ = tx.send(line).await;
                }
            });
            Ok(rx)
        })
    }
}

fn run(rt: &Runtime, options: Options, lines: &[String]) -> CaptureSession {
    let source = FakeSource {
        lines: lines.to_vec(),
    };
    rt.block_on(async {
        run_with_io(options, &source, std::future::pending())
            .await
            .unwrap()
    })
}

/// Benchmark batch processing through the full pipeline
fn bench_batch_pipeline(c: &mut Criterion) {
    let mut group = c.benchmark_group("batch_pipeline");
    let rt = Runtime::new().unwrap();

    for batch_size in [1, 100, 1000] {
        let input = lines(batch_size, 10);
        group.throughput(Throughput::Elements(batch_size as u64));
        group.bench_with_input(
            BenchmarkId::from_parameter(batch_size),
            &input,
            |b, input| {
                b.iter(|| {
                    let options = Options::parse_from(["ble-sniffer"]);
                    black_box(run(&rt, options, input))
                })
            },
        );
    }

    group.finish();
}

/// Benchmark with a MAC filter that rejects nine devices out of ten
fn bench_filtered_pipeline(c: &mut Criterion) {
    let mut group = c.benchmark_group("filtered_pipeline");
    let rt = Runtime::new().unwrap();
    let input = lines(1000, 10);

    group.throughput(Throughput::Elements(1000));
    group.bench_function("1000_lines_one_device", |b| {
        b.iter(|| {
            let options = Options::parse_from([
                "ble-sniffer",
                "--filter-mac",
                "AA:BB:CC:DD:EE:00",
            ]);
            let session = run(&rt, options, &input);
            debug_assert_eq!(session.devices().len(), 1);
            black_box(session)
        })
    });

    group.finish();
}

/// Benchmark with many distinct devices
fn bench_multi_device_pipeline(c: &mut Criterion) {
    let mut group = c.benchmark_group("multi_device_pipeline");
    let rt = Runtime::new().unwrap();
    let input = lines(1000, 200);

    group.throughput(Throughput::Elements(1000));
    group.bench_function("200_different_devices", |b| {
        b.iter(|| {
            let options = Options::parse_from(["ble-sniffer"]);
            black_box(run(&rt, options, &input))
        })
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_batch_pipeline,
    bench_filtered_pipeline,
    bench_multi_device_pipeline,
);
criterion_main!(benches);
