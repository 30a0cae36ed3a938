//! Number routing pipeline demonstrating junctions and fan-out sinks
//!
//! Pipeline:
//! 1. Source: numbers 1-100
//! 2. Filter: keep only even numbers
//! 3. Transform: multiply by 10
//! 4. Junction: values up to 500 go to the "small" pipeline, the rest to "large"
//!    and closes both once the source runs dry
//! 5. The "large" pipeline fans out by last digit of the hundreds
//!
//! Usage: RUST_LOG=debug cargo run --example routing_tree --release

use pipeflow::{FilterStage, Junction, MapStage, Pipeline, PipelineBuilder, Queue};
use std::collections::HashMap;
use std::time::Instant;
use tracing_subscriber::EnvFilter;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    println!("Number Routing Pipeline");
    println!("=======================");
    let start = Instant::now();

    let numbers = PipelineBuilder::<u64>::new()
        .name("numbers")
        .capacity(50)
        .debug(true)
        .stage(FilterStage::new("even_filter", |n: &u64| n % 2 == 0))
        .stage(MapStage::new("multiply_by_10", |n: u64| n * 10))
        .build();

    let small = PipelineBuilder::<u64>::new()
        .name("small")
        .capacity(50)
        .stage(MapStage::new("halve", |n: u64| n / 2))
        .build();
    let large: Pipeline<u64> = Pipeline::buffered(50, Vec::new());
    large.debug();

    let mut junction = Junction::new(|n: &u64| if *n <= 500 { "small" } else { "large" });
    junction
        .add_pipeline("small", &small)
        .add_pipeline("large", &large)
        .close_destinations_on_exit();
    let junction_metrics = junction.metrics();
    numbers.add_junction(junction);

    let round = Queue::unbounded("round_hundreds");
    let other = Queue::unbounded("other");
    let destinations = HashMap::from([("round", round.clone())]);
    large.attach_sink_fan_out(destinations, other.clone(), |n: &u64| {
        if n % 100 == 0 {
            Ok(Some("round"))
        } else {
            Err(format!("{n} is not a multiple of 100"))
        }
    });

    let source = Queue::new("source", 50);
    numbers.attach_source(source.clone());
    let producer = std::thread::spawn(move || {
        for n in 1..=100 {
            source.send(n);
        }
        source.close();
    });

    let small_results: Vec<u64> = std::iter::from_fn(|| small.dequeue()).collect();
    producer.join().expect("Producer panicked");
    numbers.join()?;
    small.join()?;
    large.join()?;

    println!("\n=== Final Results ===");
    println!("Small (halved): {} values, sum {}", small_results.len(), small_results.iter().sum::<u64>());
    println!("Large, round hundreds: {:?}", round.iter().collect::<Vec<_>>());
    println!("Large, other: {} values", other.iter().count());
    println!("Junction: {}", junction_metrics.snapshot().format());
    println!("\nPipeline execution time: {:.3}s", start.elapsed().as_secs_f64());

    Ok(())
}
