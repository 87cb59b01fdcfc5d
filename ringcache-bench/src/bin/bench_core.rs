//! # Core Benchmark Harness
//!
//! Purpose: a dependency-free, repeatable benchmark driver for the three
//! hot paths a node actually spends cycles on: the byte-budgeted LRU
//! engine, the consistent-hash ring's key lookup, and a Group's cached
//! `Get`. Fixed PRNG seed, pre-built buffers, direct calls instead of
//! dynamic dispatch.
//!
//! ## Design Principles
//! 1. **Deterministic Workload**: a fixed PRNG seed keeps runs comparable.
//! 2. **Allocation Control**: keys/values are pre-built, off the hot path.
//! 3. **Zero-Cost Dispatch**: call the concrete types directly.

use std::env;
use std::hint::black_box;
use std::sync::Arc;
use std::time::{Duration, Instant};

use ringcache_common::{ByteView, Error};
use ringcache_core::{Getter, GetterFunc, Group, Lru, Ring};

const DEFAULT_KEY_COUNT: usize = 1 << 14;
const DEFAULT_OP_COUNT: usize = 500_000;
const DEFAULT_VALUE_SIZE: usize = 128;
const RING_REPLICAS: usize = 50;
const RING_NODE_COUNT: usize = 8;

struct BenchConfig {
    key_count: usize,
    key_mask: usize,
    op_count: usize,
    value_size: usize,
}

impl BenchConfig {
    fn from_args() -> Self {
        let mut args = env::args().skip(1);
        let requested_keys = parse_usize(args.next(), DEFAULT_KEY_COUNT);
        let op_count = parse_usize(args.next(), DEFAULT_OP_COUNT);
        let value_size = parse_usize(args.next(), DEFAULT_VALUE_SIZE);

        let key_count = normalize_power_of_two(requested_keys);
        BenchConfig {
            key_count,
            key_mask: key_count - 1,
            op_count,
            value_size,
        }
    }
}

fn parse_usize(value: Option<String>, fallback: usize) -> usize {
    value.and_then(|raw| raw.parse().ok()).unwrap_or(fallback)
}

fn normalize_power_of_two(value: usize) -> usize {
    let value = value.max(1);
    if value.is_power_of_two() {
        value
    } else {
        value.next_power_of_two()
    }
}

/// Tiny deterministic PRNG, avoiding an external dependency for the bench
/// harness's own workload generation.
struct XorShift64 {
    state: u64,
}

impl XorShift64 {
    fn new(seed: u64) -> Self {
        Self { state: seed }
    }

    fn next_u64(&mut self) -> u64 {
        let mut x = self.state;
        x ^= x << 13;
        x ^= x >> 7;
        x ^= x << 17;
        self.state = x;
        x
    }

    #[inline]
    fn next_index(&mut self, mask: usize) -> usize {
        (self.next_u64() as usize) & mask
    }
}

fn build_keys(count: usize) -> Vec<String> {
    (0..count).map(|i| format!("key-{i:08x}")).collect()
}

fn build_value(size: usize, seed: u64) -> Vec<u8> {
    let mut buffer = vec![0u8; size];
    buffer[..8.min(size)].copy_from_slice(&seed.to_le_bytes()[..8.min(size)]);
    buffer
}

fn report(label: &str, ops: usize, elapsed: Duration) {
    let secs = elapsed.as_secs_f64();
    let ops_per_sec = (ops as f64) / secs;
    let nanos_per_op = (secs * 1e9) / (ops as f64);
    println!("{label}: {ops} ops in {secs:.3}s ({ops_per_sec:.0} ops/s, {nanos_per_op:.1} ns/op)");
}

fn bench_lru(config: &BenchConfig) {
    let lru = Lru::<ByteView>::new(0);
    let keys = build_keys(config.key_count);
    let far_future = Instant::now() + Duration::from_secs(3600);

    for (i, key) in keys.iter().enumerate() {
        let value = build_value(config.value_size, i as u64);
        lru.add(key, ByteView::new(value, far_future), far_future);
    }

    let mut rng = XorShift64::new(0xA5A5_A5A5_A5A5_A5A5);
    let start = Instant::now();
    for _ in 0..config.op_count {
        let idx = rng.next_index(config.key_mask);
        let hit = lru.get(&keys[idx]);
        black_box(hit);
    }
    report("LRU GET", config.op_count, start.elapsed());

    let mut rng = XorShift64::new(0x5A5A_5A5A_5A5A_5A5A);
    let start = Instant::now();
    for _ in 0..config.op_count {
        let idx = rng.next_index(config.key_mask);
        let value = build_value(config.value_size, idx as u64);
        lru.add(&keys[idx], ByteView::new(value, far_future), far_future);
    }
    report("LRU ADD", config.op_count, start.elapsed());
}

fn bench_ring(config: &BenchConfig) {
    let ring = Ring::new(RING_REPLICAS);
    let nodes: Vec<String> = (0..RING_NODE_COUNT).map(|i| format!("10.0.0.{i}")).collect();
    ring.add_nodes(&nodes);

    let keys = build_keys(config.key_count);
    let mut rng = XorShift64::new(0x1234_5678_9ABC_DEF0);
    let start = Instant::now();
    for _ in 0..config.op_count {
        let idx = rng.next_index(config.key_mask);
        let owner = ring.get(&keys[idx]);
        black_box(owner);
    }
    report("RING GET", config.op_count, start.elapsed());
}

async fn bench_group(config: &BenchConfig) {
    let keys = build_keys(config.key_count);
    let getter: Arc<dyn Getter> = Arc::new(GetterFunc(|key: &str| Ok(key.as_bytes().to_vec())));
    let group = Group::new("bench", 64 << 20, 1 << 20, getter);

    // Warm the main tier so the benchmark measures the cache-hit path, not
    // the (single-flighted, I/O-bound) miss path.
    for key in &keys {
        let _ = group.get(key).await;
    }

    let mut rng = XorShift64::new(0x0FED_CBA9_8765_4321);
    let start = Instant::now();
    for _ in 0..config.op_count {
        let idx = rng.next_index(config.key_mask);
        match group.get(&keys[idx]).await {
            Ok(view) => {
                black_box(view);
            }
            Err(Error::NotFound(_)) => {}
            Err(err) => panic!("unexpected group error: {err}"),
        }
    }
    report("GROUP GET (cached)", config.op_count, start.elapsed());
}

fn main() {
    let config = BenchConfig::from_args();
    println!(
        "keys={}, ops={}, value_size={}",
        config.key_count, config.op_count, config.value_size
    );

    bench_lru(&config);
    bench_ring(&config);

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(4)
        .enable_time()
        .build()
        .expect("failed to build bench runtime");
    runtime.block_on(bench_group(&config));
}
