use hdrhistogram::Histogram;
use seat_alloc::{Fleet, Request};
use std::time::Instant;

const SEGMENTS: i16 = 10;
const TRAINS: i32 = 100;
const SEATS: i32 = 3000;

fn main() {
    println!("Preparing Latency Benchmark...");

    let mut fleet = Fleet::new(SEGMENTS, TRAINS, SEATS);
    fleet.warm_up();

    let mut histogram = Histogram::<u64>::new_with_bounds(1, 100_000, 3).unwrap();

    const ITERATIONS: u64 = 1_000_000;

    println!("Running {} iterations...", ITERATIONS);

    let mut rng = 12345u64; // Simple LCG for speed
    let mut booked = 0u64;
    let mut total_duration = std::time::Duration::new(0, 0);

    for request_id in 0..ITERATIONS {
        rng = rng.wrapping_mul(6364136223846793005).wrapping_add(1);
        let r = rng >> 32;
        let train = (r % TRAINS as u64) as i32;
        let start = ((r >> 8) % SEGMENTS as u64) as i16;
        let stop = start + 1 + ((r >> 16) % (SEGMENTS - start) as u64) as i16;
        let request = Request::new(request_id as i64, train, start, stop);

        let begin = Instant::now();
        let seat = std::hint::black_box(fleet.book(&request));
        let elapsed = begin.elapsed();

        if seat > 0 {
            booked += 1;
        }
        histogram.record(elapsed.as_nanos() as u64).unwrap_or(());
        total_duration += elapsed;
    }

    println!("\n=== Latency Report (ns) ===");
    println!("Total Ops:  {}", ITERATIONS);
    println!("Booked:     {}", booked);
    println!("Throughput: {:.2} ops/sec", ITERATIONS as f64 / total_duration.as_secs_f64());
    println!("---------------------------");
    println!("Min:    {:6} ns", histogram.min());
    println!("P50:    {:6} ns", histogram.value_at_quantile(0.50));
    println!("P90:    {:6} ns", histogram.value_at_quantile(0.90));
    println!("P99:    {:6} ns", histogram.value_at_quantile(0.99));
    println!("P99.9:  {:6} ns", histogram.value_at_quantile(0.999));
    println!("P99.99: {:6} ns", histogram.value_at_quantile(0.9999));
    println!("Max:    {:6} ns", histogram.max());
    println!("---------------------------");
    println!("Arena:  {:?}", fleet.arena());
}
