//! Performance benchmarks for logship

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use logship::config::ShipperConfig;
use logship::encoder::RecordEncoder;
use logship::handler::Handler;
use logship::policy::ErrorHandling;
use logship::types::{LogEntry, LogLevel};
use std::time::Duration;
use tokio::io::AsyncReadExt;
use tokio::net::TcpListener;
use tokio::runtime::Runtime;

/// Spawn a local endpoint that reads and discards everything it receives
async fn spawn_sink() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let address = listener.local_addr().unwrap().to_string();

    tokio::spawn(async move {
        loop {
            if let Ok((mut stream, _)) = listener.accept().await {
                tokio::spawn(async move {
                    let mut buf = vec![0; 64 * 1024];
                    while let Ok(n) = stream.read(&mut buf).await {
                        if n == 0 {
                            break;
                        }
                    }
                });
            }
        }
    });

    address
}

/// Benchmark wire encoding of a single entry
fn bench_encode(c: &mut Criterion) {
    let entry = LogEntry::new(LogLevel::Info, "bench", "Benchmark message")
        .with_field("user_id", "12345")
        .with_field("latency_ms", 42)
        .with_process_metadata();
    let mut encoder = RecordEncoder::new("2bfbea1e-10c3-4419-bdad-7e6435882e1f");

    let mut group = c.benchmark_group("encode");
    group.throughput(Throughput::Elements(1));
    group.bench_function("log_entry", |b| {
        b.iter(|| encoder.encode_to_vec(&entry).unwrap())
    });
    group.finish();
}

/// Benchmark submit-to-delivery throughput over loopback TCP
fn bench_submit_throughput(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let address = rt.block_on(spawn_sink());

    let mut group = c.benchmark_group("submit_throughput");
    group.measurement_time(Duration::from_secs(10));
    group.sample_size(10);

    for message_count in [100u64, 1000, 5000].iter() {
        group.throughput(Throughput::Elements(*message_count));
        group.bench_with_input(
            BenchmarkId::from_parameter(message_count),
            message_count,
            |b, &count| {
                let address = address.clone();
                b.to_async(&rt).iter(|| {
                    let address = address.clone();
                    async move {
                        let config = ShipperConfig::new("bench")
                            .with_tls(false)
                            .with_address(address)
                            .with_queue_capacity(count as usize)
                            .with_error_handling(ErrorHandling::Ignore);
                        let handler = Handler::new(config).unwrap();

                        for i in 0..count {
                            let entry =
                                LogEntry::new(LogLevel::Info, "bench", format!("Benchmark message {}", i));
                            handler.submit(entry).unwrap();
                        }

                        while handler.stats().delivered < count {
                            tokio::task::yield_now().await;
                        }
                        handler.join().await.unwrap();
                    }
                });
            },
        );
    }

    group.finish();
}

criterion_group!(benches, bench_encode, bench_submit_throughput);
criterion_main!(benches);
