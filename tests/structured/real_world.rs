//! Larger grammars: JSON, arithmetic, and a small tool-call format.

use std::sync::Arc;

use pie_grammar::matcher::GrammarMatcher;
use pie_grammar::tokenizer::{TokenizerInfo, VocabType};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn make_matcher(ebnf: &str, vocab: &[&str]) -> GrammarMatcher {
    let mut encoded: Vec<String> = vocab.iter().map(|s| s.to_string()).collect();
    encoded.push("</s>".into());
    let eos = encoded.len() as u32 - 1;
    let tokenizer = Arc::new(TokenizerInfo::new(&encoded, VocabType::Raw, eos, None).unwrap());
    GrammarMatcher::from_ebnf(ebnf, "root", tokenizer).unwrap()
}

fn is_grammar_accept_string(grammar_ebnf: &str, input: &str) -> bool {
    let m = make_matcher(grammar_ebnf, &["dummy"]);
    m.can_terminate(&m.accept_str(input, &m.initial_stacks()))
}

/// Tokenize `input` greedily (longest match) with `vocab` and drive the matcher
/// token by token, checking each token was marked allowed first.
fn drive_tokens(m: &GrammarMatcher, vocab: &[&str], input: &str) -> bool {
    let mut stacks = m.initial_stacks();
    let mut rest = input;
    while !rest.is_empty() {
        let Some((id, tok)) = vocab
            .iter()
            .enumerate()
            .filter(|(_, t)| rest.starts_with(**t))
            .max_by_key(|(_, t)| t.len())
        else {
            return false;
        };
        if !m.acceptance_for_stackset(&stacks).get(id) {
            return false;
        }
        stacks = match m.accept_token(id as u32, &stacks) {
            Ok(s) => s,
            Err(_) => return false,
        };
        rest = &rest[tok.len()..];
    }
    m.acceptance_for_stackset(&stacks).get(vocab.len())
}

const JSON_GRAMMAR: &str = r#"
root ::= value
value ::= object | array | string | number | "true" | "false" | "null"
object ::= "{" ws ( pair ( "," ws pair )* )? "}" ws
pair ::= string ":" ws value
array ::= "[" ws ( value ( "," ws value )* )? "]" ws
string ::= "\"" char* "\"" ws
char ::= [ !#-\[\]-~\x80-\xff] | "\\" escape
escape ::= ["\\/bfnrt] | "u" [0-9a-fA-F] [0-9a-fA-F] [0-9a-fA-F] [0-9a-fA-F]
number ::= integer fraction? exponent? ws
integer ::= "-"? ( "0" | [1-9] [0-9]* )
fraction ::= "." [0-9]+
exponent ::= [eE] [+\x2d]? [0-9]+
ws ::= [ \t\n]*
"#;

// ---------------------------------------------------------------------------
// JSON acceptance
// ---------------------------------------------------------------------------

#[test]
fn test_json_simple_object() {
    assert!(is_grammar_accept_string(JSON_GRAMMAR, r#"{"name": "John", "age": 30}"#));
}

#[test]
fn test_json_nested() {
    assert!(is_grammar_accept_string(JSON_GRAMMAR, r#"{"a": {"b": [1, 2, 3]}}"#));
}

#[test]
fn test_json_scalars() {
    for input in ["true", "false", "null", "0", "-12.5e+3", r#""é\n""#, "[]", "{}"] {
        assert!(is_grammar_accept_string(JSON_GRAMMAR, input), "{input}");
    }
}

#[test]
fn test_json_rejects() {
    for input in ["{", "[1,]", "01", r#"{"a" 1}"#, r#""\q""#, "tru", "{}}"] {
        assert!(!is_grammar_accept_string(JSON_GRAMMAR, input), "{input}");
    }
}

#[test]
fn test_json_token_driven() {
    let vocab = [
        "{", "}", "[", "]", ",", ":", " ", "\"", "\"name", "\":", "Al", "ice", "1", "23", "true",
        "null", "\"}", "e", "-",
    ];
    let m = make_matcher(JSON_GRAMMAR, &vocab);
    assert!(drive_tokens(&m, &vocab, r#"{"name": "Alice", "name": [123, true, null]}"#));
    assert!(!drive_tokens(&m, &vocab, r#"{"name": ]"#));
}

// ---------------------------------------------------------------------------
// Arithmetic expressions
// ---------------------------------------------------------------------------

const EXPR_GRAMMAR: &str = r#"
root ::= expr
expr ::= term (("+" | "-") term)*
term ::= factor (("*" | "/") factor)*
factor ::= number | "(" expr ")"
number ::= [0-9]+
"#;

#[test]
fn test_arithmetic() {
    assert!(is_grammar_accept_string(EXPR_GRAMMAR, "1+2*3"));
    assert!(is_grammar_accept_string(EXPR_GRAMMAR, "(1+2)*(3-4)/5"));
    assert!(!is_grammar_accept_string(EXPR_GRAMMAR, "1+"));
    assert!(!is_grammar_accept_string(EXPR_GRAMMAR, "(1+2"));
    assert!(!is_grammar_accept_string(EXPR_GRAMMAR, "1**2"));
}

#[test]
fn test_arithmetic_bitmask_after_operator() {
    let vocab = ["1", "+", "(", ")", "12", "+1"];
    let m = make_matcher(EXPR_GRAMMAR, &vocab);
    let stacks = m.accept_str("1+", &m.initial_stacks());
    let allowed: Vec<u32> = m.acceptance_for_stackset(&stacks).iter_ones().collect();
    // A number or an opening parenthesis; not an operator, not EOS.
    assert_eq!(allowed, [0, 2, 4]);
}

// ---------------------------------------------------------------------------
// Tool-call format with comments
// ---------------------------------------------------------------------------

const TOOL_GRAMMAR: &str = r#"
# A call is a name followed by keyword arguments.
root ::= name "(" ( arg ( ", " arg )* )? ")"   # no trailing comma
name ::= [a-z_]+
arg ::= name "=" ( [0-9]+ | "'" [a-zA-Z ]* "'" )
"#;

#[test]
fn test_tool_call() {
    assert!(is_grammar_accept_string(TOOL_GRAMMAR, "search(query='rust trie', limit=5)"));
    assert!(is_grammar_accept_string(TOOL_GRAMMAR, "noop()"));
    assert!(!is_grammar_accept_string(TOOL_GRAMMAR, "search(limit=5,)"));
    assert!(!is_grammar_accept_string(TOOL_GRAMMAR, "Search()"));
}
