//! Word frequency counter pipeline
//!
//! Reads lines from stdin, splits them into words, cleans the words, and
//! counts frequencies at the sink. A tap mirrors every cleaned word to a
//! second consumer that tracks the longest word seen.
//!
//! Usage: cargo run --example word_count --release
//!        (Then type lines of text and press Ctrl-D to finish)
//!        RUST_LOG=debug shows pipeline trace lines

use pipeflow::{PipelineBuilder, Queue, Stage, TransformStage};
use std::collections::HashMap;
use std::io::{self, BufRead};
use tracing_subscriber::EnvFilter;

/// Splits each line into lowercase words
struct LineSplitterStage;

impl Stage<String> for LineSplitterStage {
    fn process(&self, input: &Queue<String>, output: &Queue<String>) {
        for line in input {
            for word in line.split_whitespace() {
                output.send(word.to_lowercase());
            }
        }
    }

    fn name(&self) -> &str {
        "line_splitter"
    }
}

fn get_top_n(counts: &HashMap<String, usize>, n: usize) -> Vec<(String, usize)> {
    let mut items: Vec<_> = counts.iter().map(|(k, v)| (k.clone(), *v)).collect();
    items.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    items.into_iter().take(n).collect()
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    println!("Word Frequency Counter Pipeline");
    println!("================================");
    println!("Enter lines of text (Ctrl-D to finish):");
    println!();

    let cleaner = TransformStage::new("word_cleaner", |word: String| {
        let cleaned: String = word.chars().filter(|c| c.is_alphanumeric()).collect();
        (cleaned.len() > 2).then_some(cleaned)
    });
    let cleaner_metrics = cleaner.metrics();

    let pipeline = PipelineBuilder::<String>::new()
        .name("word_count")
        .capacity(100)
        .debug(true)
        .stage(LineSplitterStage)
        .stage(cleaner)
        .build();

    let lines = Queue::new("stdin", 100);
    pipeline.attach_source(lines.clone());

    let longest = Queue::new("longest", 100);
    pipeline.attach_tap(longest.clone());
    let words = Queue::new("words", 100);
    pipeline.attach_sink(words.clone());

    let longest_thread = std::thread::spawn(move || {
        longest
            .iter()
            .max_by_key(|word| word.len())
            .unwrap_or_default()
    });

    let reader_thread = std::thread::spawn(move || {
        let stdin = io::stdin();
        for line in stdin.lock().lines().map_while(Result::ok) {
            lines.send(line);
        }
        lines.close();
    });

    let mut counts: HashMap<String, usize> = HashMap::new();
    for word in &words {
        *counts.entry(word).or_insert(0) += 1;
    }

    reader_thread.join().expect("Reader thread panicked");
    let longest_word = longest_thread.join().expect("Tap consumer panicked");
    pipeline.join()?;

    println!("\n=== Top 10 Words ===");
    for (i, (word, count)) in get_top_n(&counts, 10).iter().enumerate() {
        println!("{:2}. {} ({})", i + 1, word, count);
    }
    println!("\nLongest word: {longest_word}");
    println!("Cleaner: {}", cleaner_metrics.snapshot().format());

    Ok(())
}
