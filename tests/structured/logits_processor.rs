//! Tests for the per-sequence logits processor driven like a generation loop.

use std::sync::Arc;

use pie_grammar::GrammarError;
use pie_grammar::matcher::GrammarMatcher;
use pie_grammar::tokenizer::{TokenizerInfo, VocabType};

const NEG: f32 = f32::NEG_INFINITY;

fn shared_matcher(ebnf: &str, vocab: &[&str]) -> Arc<GrammarMatcher> {
    let encoded: Vec<String> = vocab.iter().map(|s| s.to_string()).collect();
    let eos = encoded.len() as u32 - 1;
    let tokenizer = Arc::new(TokenizerInfo::new(&encoded, VocabType::Raw, eos, None).unwrap());
    Arc::new(GrammarMatcher::from_ebnf(ebnf, "root", tokenizer).unwrap())
}

/// Greedy decode: pick the highest surviving logit each step.
fn argmax(logits: &[f32]) -> u32 {
    logits
        .iter()
        .enumerate()
        .max_by(|a, b| a.1.total_cmp(b.1))
        .map(|(i, _)| i as u32)
        .unwrap()
}

#[test]
fn test_greedy_generation_follows_grammar() {
    // ids: 0 "yes", 1 "no", 2 "maybe", 3 "!", 4 EOS
    let vocab = ["yes", "no", "maybe", "!", "</s>"];
    let m = shared_matcher("root ::= (\"yes\" | \"no\") \"!\"\n", &vocab);
    let mut processor = m.logits_processor();

    // The unconstrained model prefers "maybe", then EOS.
    let model = [0.1, 0.2, 0.9, 0.3, 0.5];
    let mut ids: Vec<u32> = vec![42, 7]; // prompt
    loop {
        let mut logits = model.to_vec();
        processor.process(&ids, &mut logits).unwrap();
        let next = argmax(&logits);
        ids.push(next);
        if next == 4 {
            break;
        }
    }
    assert_eq!(&ids[2..], [1, 3, 4]);
}

#[test]
fn test_masks_only_rejected_entries() {
    let m = shared_matcher("root ::= [ab]+\n", &["a", "b", "c", "</s>"]);
    let mut processor = m.logits_processor();
    let mut logits = vec![1.0, -2.0, 3.0, 4.0];
    processor.process(&[], &mut logits).unwrap();
    assert_eq!(logits, [1.0, -2.0, NEG, NEG]);

    let mut logits = vec![1.0, -2.0, 3.0, 4.0];
    processor.process(&[0], &mut logits).unwrap();
    assert_eq!(logits, [1.0, -2.0, NEG, 4.0]);
}

#[test]
fn test_sessions_are_independent() {
    let m = shared_matcher("root ::= \"a\" \"b\"\n", &["a", "b", "</s>"]);
    let mut first = m.logits_processor();
    let mut second = m.logits_processor();
    let mut logits = vec![0.0; 3];

    first.process(&[], &mut logits).unwrap();
    first.process(&[0], &mut logits).unwrap();
    assert_eq!(logits, [NEG, 0.0, NEG]);

    let mut logits = vec![0.0; 3];
    second.process(&[], &mut logits).unwrap();
    assert_eq!(logits, [0.0, NEG, NEG]);
}

#[test]
fn test_sequence_length_protocol() {
    let m = shared_matcher("root ::= \"a\"*\n", &["a", "</s>"]);
    let mut processor = m.logits_processor();
    let mut logits = vec![0.0; 2];
    processor.process(&[0, 0], &mut logits).unwrap();

    let err = processor.process(&[0, 0], &mut logits).unwrap_err();
    assert_eq!(err, GrammarError::SequenceLength { expected: 3, actual: 2 });
    assert!(!err.is_grammar_error());

    // A valid call still works afterwards.
    processor.process(&[0, 0, 0], &mut logits).unwrap();
}

#[test]
fn test_unfiltered_token_is_fatal() {
    let m = shared_matcher("root ::= \"a\"\n", &["a", "b", "</s>"]);
    let mut processor = m.logits_processor();
    let mut logits = vec![0.0; 3];
    processor.process(&[], &mut logits).unwrap();
    assert!(matches!(
        processor.process(&[1], &mut logits),
        Err(GrammarError::TokenRejected { token_id: 1, byte_offset: 0 })
    ));
}

#[test]
fn test_logits_vector_too_short() {
    let m = shared_matcher("root ::= \"a\"\n", &["a", "b", "</s>"]);
    let mut processor = m.logits_processor();
    let mut logits = vec![0.0; 2];
    assert_eq!(
        processor.process(&[], &mut logits),
        Err(GrammarError::LogitsLength { expected: 3, actual: 2 })
    );
}

#[test]
fn test_reset_restarts_session() {
    let m = shared_matcher("root ::= \"a\"\n", &["a", "</s>"]);
    let mut processor = m.logits_processor();
    let mut logits = vec![0.0; 2];
    processor.process(&[], &mut logits).unwrap();
    processor.process(&[0], &mut logits).unwrap();
    assert!(processor.can_terminate());

    processor.reset();
    let mut logits = vec![0.0; 2];
    processor.process(&[9, 9, 9], &mut logits).unwrap();
    assert_eq!(logits, [0.0, NEG]);
}

#[test]
fn test_retry_after_short_logits() {
    let m = shared_matcher("root ::= \"a\" \"b\"\n", &["a", "b", "</s>"]);
    let mut processor = m.logits_processor();
    let mut logits = vec![0.0; 3];
    processor.process(&[], &mut logits).unwrap();

    let mut short = vec![0.0; 1];
    assert_eq!(
        processor.process(&[0], &mut short),
        Err(GrammarError::LogitsLength { expected: 3, actual: 1 })
    );

    // The same step succeeds once the caller supplies full logits.
    let mut logits = vec![0.0; 3];
    processor.process(&[0], &mut logits).unwrap();
    assert_eq!(logits, [NEG, 0.0, NEG]);

    let mut logits = vec![0.0; 3];
    processor.process(&[0, 1], &mut logits).unwrap();
    assert_eq!(logits, [NEG, NEG, 0.0]);
    assert!(processor.can_terminate());
}
