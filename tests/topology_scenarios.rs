//! End-to-end routing over the in-memory log with scripted capabilities.

use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use voxparse::codec::{decode_parsed, encode_command};
use voxparse::pipeline::{Pipeline, PipelineConfig, PipelineReport};
use voxparse::stt::{MockRecognition, MockRecognizer};
use voxparse::translate::MockTranslator;
use voxparse::transport::{LogTransport, MemoryLog};
use voxparse::{ParsedVoiceCommand, VoiceCommand};

const INPUT: &str = "voice-commands";
const RECOGNIZED: &str = "recognized-commands";
const UNRECOGNIZED: &str = "unrecognized-commands";

fn new_log(partitions: u32) -> MemoryLog {
    MemoryLog::new()
        .with_topic(INPUT, partitions)
        .unwrap()
        .with_topic(RECOGNIZED, partitions)
        .unwrap()
        .with_topic(UNRECOGNIZED, partitions)
        .unwrap()
}

fn produce(log: &MemoryLog, id: &str, audio_len: usize, language: &str) {
    let command = VoiceCommand::new(id, vec![0x2a; audio_len], "FLAC", language);
    log.append(INPUT, id, &encode_command(&command).unwrap())
        .unwrap();
}

fn config() -> PipelineConfig {
    PipelineConfig {
        poll_interval: Duration::from_millis(10),
        shutdown_timeout: Duration::from_secs(5),
        ..PipelineConfig::default()
    }
}

/// Runs the pipeline until `expected` records are committed, then stops it.
fn run(
    log: &MemoryLog,
    recognizer: Arc<MockRecognizer>,
    translator: Arc<MockTranslator>,
    expected: u64,
) -> PipelineReport {
    let handle = Pipeline::new(config())
        .start(Arc::new(log.clone()), recognizer, translator)
        .unwrap();

    let deadline = Instant::now() + Duration::from_secs(10);
    loop {
        let committed: u64 = handle.stats().values().map(|s| s.committed()).sum();
        if committed >= expected || handle.is_finished() {
            break;
        }
        assert!(Instant::now() < deadline, "only {} of {} records committed", committed, expected);
        thread::sleep(Duration::from_millis(10));
    }

    let report = handle.stop();
    assert!(report.is_clean(), "pipeline failed: {:?}", report.failures);
    report
}

fn outputs(log: &MemoryLog, topic: &str) -> Vec<ParsedVoiceCommand> {
    log.records(topic)
        .unwrap()
        .iter()
        .map(|record| {
            let parsed = decode_parsed(&record.value).unwrap();
            assert_eq!(record.key.as_deref(), Some(parsed.id.as_str()));
            parsed
        })
        .collect()
}

#[test]
fn short_audio_produces_nothing_and_calls_nothing() {
    let log = new_log(1);
    produce(&log, "tiny", 10, "en-US");
    produce(&log, "empty", 0, "es-AR");

    let recognizer = Arc::new(MockRecognizer::new());
    let translator = Arc::new(MockTranslator::new("en"));
    let report = run(&log, recognizer.clone(), translator.clone(), 2);

    assert!(outputs(&log, RECOGNIZED).is_empty());
    assert!(outputs(&log, UNRECOGNIZED).is_empty());
    assert_eq!(recognizer.calls(), 0);
    assert_eq!(translator.calls(), 0);
    assert_eq!(report.totals().dropped, 2);
    assert_eq!(log.committed("voxparse", INPUT, 0).unwrap(), 2);
}

#[test]
fn confident_english_command_is_recognized_without_translation() {
    let log = new_log(3);
    produce(&log, "X", 20, "en-US");

    let recognizer = Arc::new(
        MockRecognizer::new().with_script("X", MockRecognition::new("call John", 0.98)),
    );
    let translator = Arc::new(MockTranslator::new("en"));
    run(&log, recognizer, translator.clone(), 1);

    let recognized = outputs(&log, RECOGNIZED);
    assert_eq!(recognized.len(), 1);
    assert_eq!(recognized[0].id, "X");
    assert_eq!(recognized[0].text, "call John");
    assert_eq!(recognized[0].audio_codec.as_deref(), Some("FLAC"));
    assert!(outputs(&log, UNRECOGNIZED).is_empty());
    assert_eq!(translator.calls(), 0);
}

#[test]
fn confident_spanish_command_is_translated_once() {
    let log = new_log(3);
    produce(&log, "Y", 20, "es-AR");

    let recognizer = Arc::new(
        MockRecognizer::new().with_script("Y", MockRecognition::new("llamar a Juan", 0.98)),
    );
    let translator = Arc::new(MockTranslator::new("en-US").with_phrase("llamar a Juan", "call John"));
    let report = run(&log, recognizer, translator.clone(), 1);

    let recognized = outputs(&log, RECOGNIZED);
    assert_eq!(recognized.len(), 1);
    assert_eq!(recognized[0].id, "Y");
    assert_eq!(recognized[0].text, "call John");
    assert_eq!(recognized[0].language, "en-US");
    assert!((recognized[0].confidence - 0.98).abs() < f64::EPSILON);
    assert!(outputs(&log, UNRECOGNIZED).is_empty());
    assert_eq!(translator.calls(), 1);
    assert_eq!(report.totals().translated, 1);
}

#[test]
fn low_confidence_command_is_unrecognized() {
    let log = new_log(3);
    produce(&log, "Z", 20, "en-US");

    let recognizer = Arc::new(MockRecognizer::new().with_default("call John", 0.30));
    let translator = Arc::new(MockTranslator::new("en"));
    run(&log, recognizer, translator.clone(), 1);

    let unrecognized = outputs(&log, UNRECOGNIZED);
    assert_eq!(unrecognized.len(), 1);
    assert_eq!(unrecognized[0].id, "Z");
    assert!(outputs(&log, RECOGNIZED).is_empty());
    assert_eq!(translator.calls(), 0);
}

#[test]
fn score_equal_to_threshold_is_unrecognized() {
    let log = new_log(1);
    produce(&log, "edge", 20, "es-AR");

    let recognizer = Arc::new(MockRecognizer::new().with_default("llamar a Juan", 0.90));
    let translator = Arc::new(MockTranslator::new("en"));
    run(&log, recognizer, translator.clone(), 1);

    assert_eq!(outputs(&log, UNRECOGNIZED).len(), 1);
    assert!(outputs(&log, RECOGNIZED).is_empty());
    assert_eq!(translator.calls(), 0);
}

#[test]
fn every_surviving_record_reaches_exactly_one_topic() {
    let log = new_log(3);
    let mut expected_ids = Vec::new();
    for i in 0..30 {
        let id = format!("cmd-{}", i);
        let language = if i % 2 == 0 { "en-US" } else { "es-AR" };
        let audio_len = if i % 5 == 0 { 8 } else { 32 };
        produce(&log, &id, audio_len, language);
        if audio_len > 10 {
            expected_ids.push(id);
        }
    }

    let mut recognizer = MockRecognizer::new().with_default("call John", 0.50);
    for i in (0..30).filter(|i| i % 3 == 0) {
        recognizer = recognizer.with_script(
            &format!("cmd-{}", i),
            MockRecognition::new("call John", 0.99),
        );
    }
    let translator = Arc::new(MockTranslator::new("en-US").with_text("call John"));
    let report = run(&log, Arc::new(recognizer), translator, 30);

    let recognized = outputs(&log, RECOGNIZED);
    let unrecognized = outputs(&log, UNRECOGNIZED);
    let mut seen: Vec<String> = recognized
        .iter()
        .chain(unrecognized.iter())
        .map(|parsed| parsed.id.clone())
        .collect();
    seen.sort();
    expected_ids.sort();

    assert_eq!(seen, expected_ids);
    assert_eq!(report.totals().dropped, 6);
    assert_eq!(report.totals().committed(), 30);
}

#[test]
fn outputs_keep_per_key_order_within_a_partition() {
    let log = new_log(2);
    // Same id twice: a retried command must come out in the order it went in
    produce(&log, "repeat", 20, "en-US");
    produce(&log, "repeat", 20, "es-AR");

    let recognizer = Arc::new(MockRecognizer::new().with_default("call John", 0.99));
    let translator = Arc::new(MockTranslator::new("en-GB").with_text("call John"));
    run(&log, recognizer, translator, 2);

    let recognized = outputs(&log, RECOGNIZED);
    assert_eq!(recognized.len(), 2);
    assert_eq!(recognized[0].language, "en-US");
    assert_eq!(recognized[1].language, "en-GB");
}

#[test]
fn demo_capabilities_route_the_sample_commands() {
    let log = new_log(3);
    produce(&log, "26679943-f55e-4731-986e-c5c5395715de", 20, "en-US");
    produce(&log, "9821f112-ec35-4679-91e7-c558de479bc5", 20, "es-AR");
    produce(&log, "ffffffff-0000-0000-0000-000000000000", 20, "en-US");

    run(
        &log,
        Arc::new(MockRecognizer::demo()),
        Arc::new(MockTranslator::demo("en-US")),
        3,
    );

    let recognized = outputs(&log, RECOGNIZED);
    assert_eq!(recognized.len(), 2);
    assert!(recognized.iter().all(|parsed| parsed.text == "call John"));
    assert_eq!(outputs(&log, UNRECOGNIZED).len(), 1);
}

#[test]
fn transport_positions_are_committed_per_partition() {
    let log = new_log(3);
    for i in 0..9 {
        produce(&log, &format!("id-{}", i), 20, "en-US");
    }

    run(
        &log,
        Arc::new(MockRecognizer::new().with_default("call John", 0.99)),
        Arc::new(MockTranslator::new("en")),
        9,
    );

    let mut total = 0;
    for partition in 0..3 {
        total += log.committed("voxparse", INPUT, partition).unwrap();
    }
    assert_eq!(total, 9);
    assert_eq!(log.partitions(RECOGNIZED).unwrap(), 3);
}
