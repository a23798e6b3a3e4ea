//! Grammar-constrained token generation.
//!
//! Restricts a language model's output to the language of an EBNF grammar.
//! The grammar compiles to flat bytecode; a pushdown automaton tracks every
//! parse still alive as a set of explicit stacks; and a byte trie over the
//! vocabulary turns "which tokens keep some parse alive" into one bitmap
//! per automaton state, memoized per stack.
//!
//! # Usage
//!
//! The typical flow is:
//!
//! 1. **Build a vocabulary** from your LLM's tokenizer
//! 2. **Create a matcher** (compiles the grammar, builds the token trie)
//! 3. **Per sequence**, create a [`LogitsProcessor`] and call it once per
//!    step: it advances by the newest token and masks the logits
//!
//! ```rust
//! use std::sync::Arc;
//! use pie_grammar::matcher::GrammarMatcher;
//! use pie_grammar::tokenizer::{TokenizerInfo, VocabType};
//!
//! // Build tokenizer from vocabulary; id 3 is end-of-sequence.
//! let vocab: Vec<String> = vec!["yes".into(), "no".into(), "maybe".into(), "</s>".into()];
//! let tokenizer = Arc::new(TokenizerInfo::new(&vocab, VocabType::Raw, 3, None).unwrap());
//!
//! // Create matcher from EBNF
//! let matcher = Arc::new(
//!     GrammarMatcher::from_ebnf(r#"root ::= "yes" | "no""#, "root", tokenizer).unwrap()
//! );
//!
//! let mut processor = matcher.logits_processor();
//! let mut logits = vec![0.0f32; 4];
//! processor.process(&[], &mut logits).unwrap();
//! assert_eq!(logits[0], 0.0);                // "yes" allowed
//! assert_eq!(logits[1], 0.0);                // "no" allowed
//! assert_eq!(logits[2], f32::NEG_INFINITY);  // "maybe" blocked
//! assert_eq!(logits[3], f32::NEG_INFINITY);  // too early to stop
//!
//! // The model picked "yes"; only end-of-sequence remains.
//! let mut logits = vec![0.0f32; 4];
//! processor.process(&[0], &mut logits).unwrap();
//! assert_eq!(logits[3], 0.0);
//! assert!(processor.can_terminate());
//! ```
//!
//! # Grammar syntax
//!
//! ```text
//! root   ::= "{" ws pair ("," ws pair)* ws "}"   # comment
//! pair   ::= key ws ":" ws [0-9]+
//! key    ::= [a-z_]+
//! ws     ::= [ \t\n]*
//! ```
//!
//! See [`grammar::compiler`] for the full syntax and its desugaring.

pub mod bitmask;
pub mod compiled_grammar;
pub mod config;
pub mod error;
pub mod grammar;
pub mod matcher;
pub mod processor;
pub mod telemetry;
pub mod tokenizer;
pub mod trie;

pub use config::SamplerConfig;
pub use error::{GrammarError, Result};
pub use grammar::Grammar;
pub use matcher::GrammarMatcher;
pub use processor::LogitsProcessor;
pub use tokenizer::{TokenizerInfo, VocabType, Vocabulary};
