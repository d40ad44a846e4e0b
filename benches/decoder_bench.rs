//! Performance benchmarks for the card frame decoder and line assembler.
//!
//! Run benchmarks with:
//! ```sh
//! cargo bench --bench decoder_bench
//! ```

use criterion::{Criterion, Throughput, criterion_group, criterion_main};
use doorkeeper_protocol::{CardDecoder, LineAssembler, lock::parse_status};
use std::hint::black_box;

const FRAME: &[u8] = b"\x0213005D1DA5F6\x03";

/// Benchmark decoding a single frame byte by byte.
fn bench_decode_frame(c: &mut Criterion) {
    let mut group = c.benchmark_group("card_decoder");
    group.throughput(Throughput::Bytes(FRAME.len() as u64));

    group.bench_function("decode_frame", |b| {
        b.iter(|| {
            let mut decoder = CardDecoder::new();
            for &byte in black_box(FRAME) {
                if decoder.add_byte(byte) {
                    black_box(decoder.get_id());
                }
            }
        });
    });

    group.finish();
}

/// Benchmark splitting and parsing a burst of lock status replies.
fn bench_status_lines(c: &mut Criterion) {
    let burst = "OK: status locked closed lowered 1234\r\n".repeat(16);
    let mut group = c.benchmark_group("lock_status");
    group.throughput(Throughput::Elements(16));

    group.bench_function("assemble_and_parse", |b| {
        b.iter(|| {
            let mut lines = LineAssembler::new();
            lines.feed(black_box(burst.as_bytes()));
            while let Some(line) = lines.next_line() {
                black_box(parse_status(&line).ok());
            }
        });
    });

    group.finish();
}

criterion_group!(benches, bench_decode_frame, bench_status_lines);
criterion_main!(benches);
