use pipeflow::{
    FilterStage, Junction, MapStage, Pipeline, PipelineBuilder, Queue, Stage, TransformStage,
    WorkerStage,
};
use std::collections::HashMap;
use std::thread;
use std::time::{Duration, Instant};

/// Feed `0..limit` into a fresh queue from a background thread, then close it
fn int_generator(limit: i32) -> Queue<i32> {
    let out = Queue::new("ints", 0);
    let writer = out.clone();
    thread::spawn(move || {
        for i in 0..limit {
            writer.send(i);
        }
        writer.close();
    });
    out
}

fn animal_generator(limit: usize) -> Queue<String> {
    const ANIMALS: [&str; 4] = ["cat", "dog", "toad", "dinosaur"];
    let out = Queue::new("animals", 0);
    let writer = out.clone();
    thread::spawn(move || {
        for i in 0..limit {
            writer.send(ANIMALS[i % ANIMALS.len()].to_string());
        }
        writer.close();
    });
    out
}

fn doubling() -> Box<dyn Stage<i32>> {
    Box::new(MapStage::new("double", |x: i32| x * 2))
}

fn subtracting() -> Box<dyn Stage<i32>> {
    Box::new(MapStage::new("subtract", |x: i32| x - 1))
}

fn pluralizing() -> Box<dyn Stage<String>> {
    Box::new(MapStage::new("pluralize", |s: String| s + "s"))
}

#[test]
fn test_source_through_two_stages_to_sink() {
    let pipeline = PipelineBuilder::<i32>::new()
        .name("arith")
        .debug(true)
        .stage(doubling())
        .stage(subtracting())
        .build();

    pipeline.attach_source(int_generator(20));
    let sink = Queue::new("out", 0);
    pipeline.attach_sink(sink.clone());

    let output: Vec<i32> = sink.iter().collect();
    assert_eq!(output, (0..20).map(|x| x * 2 - 1).collect::<Vec<_>>());
    assert_eq!(output.first(), Some(&-1));
    assert_eq!(output.last(), Some(&37));
    assert!(sink.is_closed());
    pipeline.join().expect("Pipeline tasks failed");
}

#[test]
fn test_enqueue_dequeue_with_timeout() {
    let pipeline = Pipeline::buffered(4, vec![doubling(), subtracting()]);

    for i in 0..4 {
        pipeline.enqueue(i);
    }
    for expected in [-1, 1, 3] {
        assert_eq!(pipeline.dequeue(), Some(expected));
    }
    assert_eq!(pipeline.dequeue_timeout(Duration::from_millis(50)), Some(5));
    assert_eq!(pipeline.dequeue_timeout(Duration::from_millis(1)), None);

    pipeline.close();
    assert_eq!(pipeline.dequeue(), None);
    pipeline.join().expect("Pipeline tasks failed");
}

#[test]
fn test_dequeue_timeout_waits_at_least_the_deadline() {
    let pipeline: Pipeline<i32> = Pipeline::new(vec![doubling()]);
    let start = Instant::now();
    assert_eq!(pipeline.dequeue_timeout(Duration::from_millis(20)), None);
    assert!(start.elapsed() >= Duration::from_millis(20));

    // A value that misses the deadline is still delivered later
    let writer = pipeline.clone();
    let feeder = thread::spawn(move || {
        thread::sleep(Duration::from_millis(30));
        writer.enqueue(21);
    });
    assert_eq!(pipeline.dequeue_timeout(Duration::from_millis(1)), None);
    assert_eq!(pipeline.dequeue(), Some(42));
    feeder.join().expect("Feeder panicked");
}

#[test]
fn test_closing_source_closes_sink_after_all_items() {
    let pipeline = PipelineBuilder::<i32>::new()
        .capacity(3)
        .stage(FilterStage::new("odd", |x: &i32| x % 2 == 1))
        .build();

    pipeline.attach_source(int_generator(11));
    let sink = Queue::unbounded("odds");
    pipeline.attach_sink(sink.clone());
    pipeline.join().expect("Pipeline tasks failed");

    assert!(sink.is_closed());
    assert_eq!(sink.iter().collect::<Vec<_>>(), vec![1, 3, 5, 7, 9]);
}

#[test]
fn test_sink_fan_out_by_name() {
    let pipeline = Pipeline::new(vec![pluralizing()]);
    pipeline.attach_source(animal_generator(20));

    let keys = ["dogs", "cats", "toads"];
    let fanout: HashMap<String, Queue<String>> = keys
        .iter()
        .map(|key| (key.to_string(), Queue::unbounded(*key)))
        .collect();
    let unrouted = Queue::unbounded("unrouted");
    pipeline.attach_sink_fan_out(fanout.clone(), unrouted.clone(), |item: &String| {
        Ok::<_, String>(Some(item.clone()))
    });
    pipeline.join().expect("Pipeline tasks failed");

    for key in keys {
        let items: Vec<String> = fanout[key].iter().collect();
        assert_eq!(items.len(), 5, "{key}");
        assert!(items.iter().all(|item| item == key));
    }
    assert_eq!(unrouted.iter().collect::<Vec<_>>(), vec!["dinosaurs"; 5]);
}

#[test]
fn test_fan_out_with_enqueued_items() {
    let pipeline = Pipeline::new(vec![pluralizing()]);
    let feeder = {
        let pipeline = pipeline.clone();
        thread::spawn(move || {
            for animal in &animal_generator(10) {
                pipeline.enqueue(animal);
            }
            pipeline.close();
        })
    };

    let dogs = Queue::unbounded("dogs");
    let unrouted = Queue::unbounded("unrouted");
    let fanout = HashMap::from([("dogs".to_string(), dogs.clone())]);
    pipeline.attach_sink_fan_out(fanout, unrouted.clone(), |item: &String| {
        if item.is_empty() {
            Err("empty item")
        } else {
            Ok(Some(item.clone()))
        }
    });

    feeder.join().expect("Feeder panicked");
    pipeline.join().expect("Pipeline tasks failed");

    let dogs: Vec<String> = dogs.iter().collect();
    let unrouted: Vec<String> = unrouted.iter().collect();
    // Every item lands in exactly one place
    assert_eq!(dogs.len() + unrouted.len(), 10);
    assert_eq!(dogs, vec!["dogs"; 3]);
    assert!(!unrouted.contains(&"dogs".to_string()));
}

#[test]
fn test_dequeue_with_a_tap() {
    let pipeline = Pipeline::new(vec![doubling(), subtracting()]);
    pipeline.debug();
    pipeline.attach_source(int_generator(20));

    let tap_out = Queue::new("tap", 0);
    pipeline.attach_tap(tap_out.clone());
    let sink = Queue::new("out", 0);
    pipeline.attach_sink(sink.clone());

    for start in 0..20 {
        let out_val = sink.recv().expect("Sink closed early");
        let tap_val = tap_out.recv().expect("Tap closed early");
        assert_eq!(out_val, tap_val);
        assert_eq!(out_val, start * 2 - 1);
    }
    assert_eq!(sink.recv(), None);
    assert_eq!(tap_out.recv(), None);
    pipeline.join().expect("Pipeline tasks failed");
}

#[test]
fn test_add_pipe_interface() {
    let pipeline: Pipeline<i32> = Pipeline::new(Vec::new());
    pipeline.add_pipe(doubling()).add_pipe(doubling());

    let writer = pipeline.clone();
    thread::spawn(move || writer.enqueue(2));
    assert_eq!(pipeline.dequeue(), Some(8));
}

#[test]
fn test_junction_small_and_big() {
    let pipeline: Pipeline<i32> = Pipeline::buffered(4, Vec::new());
    let mut junction = Junction::new(|x: &i32| if *x > 2 { "big" } else { "small" });

    let small = Pipeline::new(vec![doubling()]);
    let big = Pipeline::new(vec![subtracting()]);
    junction.add_pipeline("small", &small).add_pipeline("big", &big);
    pipeline.add_junction(junction);

    for i in &int_generator(4) {
        pipeline.enqueue(i);
    }

    assert_eq!(small.dequeue(), Some(0));
    assert_eq!(small.dequeue(), Some(2));
    assert_eq!(small.dequeue(), Some(4));
    assert_eq!(big.dequeue(), Some(2));
}

#[test]
fn test_junction_parity_after_stage() {
    let source = PipelineBuilder::<i32>::new()
        .name("source")
        .capacity(4)
        .stage(subtracting())
        .build();
    let mut junction = Junction::new(|x: &i32| if x.rem_euclid(2) == 0 { "even" } else { "odd" });

    let even: Pipeline<i32> = Pipeline::buffered(4, Vec::new());
    let odd: Pipeline<i32> = Pipeline::buffered(4, Vec::new());
    junction
        .add_pipeline("even", &even)
        .add_pipeline("odd", &odd)
        .close_destinations_on_exit();
    source.add_junction(junction);

    for i in 0..4 {
        source.enqueue(i);
    }
    source.close();
    source.join().expect("Source pipeline failed");

    // 0 -> -1 odd, 1 -> 0 even, 2 -> 1 odd, 3 -> 2 even
    assert_eq!(odd.tail().iter().collect::<Vec<_>>(), vec![-1, 1]);
    assert_eq!(even.tail().iter().collect::<Vec<_>>(), vec![0, 2]);
}

#[test]
fn test_junction_unregistered_key_does_not_disturb_others() {
    let source: Pipeline<i32> = Pipeline::buffered(8, Vec::new());
    let mut junction = Junction::new(|x: &i32| x % 3);
    let zeros: Pipeline<i32> = Pipeline::buffered(8, Vec::new());
    let ones: Pipeline<i32> = Pipeline::buffered(8, Vec::new());
    junction.add_pipeline(0, &zeros).add_pipeline(1, &ones);
    let metrics = junction.metrics();
    source.add_junction(junction);

    for i in 0..9 {
        source.enqueue(i);
    }
    source.close();
    source.join().expect("Source pipeline failed");
    zeros.close();
    ones.close();

    assert_eq!(zeros.tail().iter().collect::<Vec<_>>(), vec![0, 3, 6]);
    assert_eq!(ones.tail().iter().collect::<Vec<_>>(), vec![1, 4, 7]);
    assert_eq!(metrics.total_dropped(), 3);
}

#[test]
fn test_chained_junctions_form_a_routing_tree() {
    let root: Pipeline<i32> = Pipeline::buffered(4, Vec::new());
    let positive: Pipeline<i32> = Pipeline::buffered(4, Vec::new());
    let negative: Pipeline<i32> = Pipeline::buffered(4, Vec::new());
    let small = Pipeline::buffered(4, vec![doubling()]);
    let large: Pipeline<i32> = Pipeline::buffered(4, Vec::new());

    let mut by_sign = Junction::new(|x: &i32| *x >= 0);
    by_sign
        .add_pipeline(true, &positive)
        .add_pipeline(false, &negative)
        .close_destinations_on_exit();
    root.add_junction(by_sign);

    let mut by_size = Junction::new(|x: &i32| *x < 10);
    by_size
        .add_pipeline(true, &small)
        .add_pipeline(false, &large)
        .close_destinations_on_exit();
    positive.add_junction(by_size);

    for item in [5, -3, 12, 0, -8, 30] {
        root.enqueue(item);
    }
    root.close();
    root.join().expect("Root failed");
    positive.join().expect("Positive branch failed");

    assert_eq!(small.tail().iter().collect::<Vec<_>>(), vec![10, 0]);
    assert_eq!(large.tail().iter().collect::<Vec<_>>(), vec![12, 30]);
    assert_eq!(negative.tail().iter().collect::<Vec<_>>(), vec![-3, -8]);
}

#[test]
fn test_two_junctions_merge_into_one_pipeline() {
    let left: Pipeline<i32> = Pipeline::buffered(4, Vec::new());
    let right: Pipeline<i32> = Pipeline::buffered(4, Vec::new());
    let merged: Pipeline<i32> = Pipeline::buffered(16, Vec::new());

    for source in [&left, &right] {
        let mut junction = Junction::new(|_: &i32| "merged");
        junction.add_pipeline("merged", &merged);
        source.add_junction(junction);
    }

    for i in 0..3 {
        left.enqueue(i);
    }
    left.close();
    left.join().expect("Left junction failed");

    // The merged pipeline is still open for the second junction
    for i in 10..13 {
        right.enqueue(i);
    }
    right.close();
    right.join().expect("Right junction failed");

    merged.close();
    let output: Vec<i32> = merged.tail().iter().collect();
    assert_eq!(output, vec![0, 1, 2, 10, 11, 12]);
}

#[test]
fn test_full_junction_destination_stalls_other_keys() {
    let source: Pipeline<i32> = Pipeline::buffered(8, Vec::new());
    let slow: Pipeline<i32> = Pipeline::buffered(1, Vec::new());
    let fast: Pipeline<i32> = Pipeline::buffered(8, Vec::new());

    let mut junction = Junction::new(|x: &i32| if *x < 100 { "slow" } else { "fast" });
    junction.add_pipeline("slow", &slow).add_pipeline("fast", &fast);
    source.add_junction(junction);

    // The second slow item does not fit, so the relay stops before 100
    for item in [1, 2, 100] {
        source.enqueue(item);
    }
    assert_eq!(fast.dequeue_timeout(Duration::from_millis(50)), None);

    assert_eq!(slow.dequeue(), Some(1));
    assert_eq!(fast.dequeue_timeout(Duration::from_secs(5)), Some(100));
    assert_eq!(slow.dequeue(), Some(2));

    source.close();
    source.join().expect("Junction failed");
}

#[test]
fn test_undrained_unrouted_queue_stalls_fan_out() {
    let pipeline: Pipeline<i32> = Pipeline::buffered(8, Vec::new());
    let even = Queue::unbounded("even");
    let unrouted = Queue::new("unrouted", 1);
    let destinations = HashMap::from([("even", even.clone())]);
    pipeline.attach_sink_fan_out(destinations, unrouted.clone(), |x: &i32| {
        Ok::<_, String>((x % 2 == 0).then_some("even"))
    });

    // 1 fills the unrouted queue, 3 blocks the relay ahead of 2
    for item in [1, 3, 2] {
        pipeline.enqueue(item);
    }
    assert_eq!(even.recv_timeout(Duration::from_millis(50)), None);

    assert_eq!(unrouted.recv(), Some(1));
    assert_eq!(even.recv_timeout(Duration::from_secs(5)), Some(2));
    assert_eq!(unrouted.recv(), Some(3));

    pipeline.close();
    pipeline.join().expect("Pipeline tasks failed");
    assert!(even.is_closed());
}

#[test]
fn test_transform_and_worker_stages() {
    let parsed = TransformStage::new("parse", |s: String| s.parse::<i64>().ok().map(|n| n.to_string()));
    let parse_metrics = parsed.metrics();
    let splitter = WorkerStage::new("split", |input: &Queue<String>, output: &Queue<String>| {
        for item in input {
            for ch in item.chars() {
                output.send(ch.to_string());
            }
        }
    });

    let pipeline = PipelineBuilder::<String>::new()
        .capacity(16)
        .stage(parsed)
        .stage(splitter)
        .build();

    for raw in ["12", "x", "345"] {
        pipeline.enqueue(raw.to_string());
    }
    pipeline.close();

    let output: Vec<String> = std::iter::from_fn(|| pipeline.dequeue()).collect();
    assert_eq!(output, vec!["1", "2", "3", "4", "5"]);
    assert_eq!(parse_metrics.total_processed(), 2);
    assert_eq!(parse_metrics.total_dropped(), 1);
    pipeline.join().expect("Pipeline tasks failed");
}

#[test]
fn test_slow_sink_blocks_bounded_pipeline() {
    let pipeline = PipelineBuilder::<i32>::new()
        .capacity(1)
        .stage(doubling())
        .build();

    for i in 0..3 {
        pipeline.enqueue(i);
    }
    // Head, stage and tail each hold one item; nothing more fits
    assert!(pipeline.try_enqueue(3).is_err());

    assert_eq!(pipeline.dequeue(), Some(0));
    assert_eq!(pipeline.dequeue(), Some(2));
    assert_eq!(pipeline.dequeue(), Some(4));
    pipeline.close();
    pipeline.join().expect("Pipeline tasks failed");
}
