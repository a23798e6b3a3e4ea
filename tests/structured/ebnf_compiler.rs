//! Tests for the EBNF compiler: debug dump format, desugaring shape, and error cases.

use std::sync::Arc;

use pie_grammar::GrammarError;
use pie_grammar::compiled_grammar::CompiledGrammar;
use pie_grammar::grammar::{END, END_OF_GRAMMAR, Grammar, RuleId};
use pie_grammar::matcher::StackEngine;

fn dump(input: &str) -> String {
    Grammar::from_ebnf(input).unwrap().to_string()
}

fn syntax_error(input: &str) -> (usize, usize, String, String) {
    match Grammar::from_ebnf(input) {
        Err(GrammarError::Syntax { line, column, message, near }) => (line, column, message, near),
        other => panic!("expected syntax error for {input:?}, got {other:?}"),
    }
}

// ---------------------------------------------------------------------------
// Debug dump
// ---------------------------------------------------------------------------

#[test]
fn test_dump_plus_helper_precedes_parent() {
    assert_eq!(
        dump(r#"root ::= "a"+"#),
        "<0>root_1' ::= <2>[a] <5>root_1' | <9>[a]\n\
         <14>root ::= <16>root_1'\n\
         0001 0006 0002 0061 0061 0001 0001 0000 0004 0002 0061 0061 0000 0000 \
         0000 0003 0001 0001 0000 0000 ffff\n"
    );
}

#[test]
fn test_dump_empty_alternate() {
    let out = dump(r#"root ::= "a" |"#);
    assert_eq!(out.lines().next(), Some("<0>root ::= <2>[a] |"));
}

#[test]
fn test_dump_escapes_class_bytes() {
    let out = dump(r#"root ::= [\]\x2d\\] "\n" [\x00-\x1f]"#);
    assert_eq!(out.lines().next(), Some(r"<0>root ::= <2>[\]\x2d\\] <9>[\n] <12>[\x00-\x1f]"));
}

#[test]
fn test_dump_ends_with_sentinel() {
    let out = dump("root ::= [0-9]\n");
    assert!(out.trim_end().ends_with("ffff"));
}

// ---------------------------------------------------------------------------
// Structure
// ---------------------------------------------------------------------------

#[test]
fn test_symbol_ids_first_seen() {
    let g = Grammar::from_ebnf("root ::= value ws\nws ::= [ ]*\nvalue ::= [0-9]\n").unwrap();
    let symbols = g.symbols();
    assert_eq!(symbols.id_of("root"), Some(RuleId(0)));
    assert_eq!(symbols.id_of("value"), Some(RuleId(1)));
    assert_eq!(symbols.id_of("ws"), Some(RuleId(2)));
    // `[ ]*` inside ws synthesizes ws_3'.
    assert_eq!(symbols.id_of("ws_3'"), Some(RuleId(3)));
    assert_eq!(symbols.len(), 4);
    assert_eq!(g.num_rules(), 4);
}

#[test]
fn test_every_rule_defined_once() {
    let src = "root ::= (a | b)+ c?\na ::= \"a\"\nb ::= \"b\"\nc ::= \"c\"\n";
    let g = Grammar::from_ebnf(src).unwrap();
    let mut ids: Vec<u32> = g.rule_offsets().map(|(_, id)| id.0).collect();
    ids.sort_unstable();
    let expected: Vec<u32> = (0..g.symbols().len() as u32).collect();
    assert_eq!(ids, expected);
}

#[test]
fn test_user_rule_spelled_like_helper_defined_later() {
    // The group becomes helper 1 before the user's `root_1` is seen.
    let g = Grammar::from_ebnf("root ::= (\"a\") root_1\nroot_1 ::= \"b\"\n").unwrap();
    let helper = g.symbols().id_of("root_1'").unwrap();
    let user = g.symbols().id_of("root_1").unwrap();
    assert_ne!(helper, user);

    let engine = StackEngine::new(Arc::new(CompiledGrammar::new(g, "root").unwrap()), 16);
    let accepts = |input: &[u8]| {
        engine.accept_bytes(input, &engine.initial_stacks()).can_terminate()
    };
    assert!(accepts(b"ab"));
    assert!(!accepts(b"aa"));
}

#[test]
fn test_undefined_rule_spelled_like_helper() {
    let g = Grammar::from_ebnf("root ::= (\"a\") root_1\n").unwrap();
    assert_eq!(
        CompiledGrammar::new(g, "root").err(),
        Some(GrammarError::UndefinedRule { name: "root_1".into() })
    );
}

#[test]
fn test_unicode_rule_name_round_trip() {
    let g = Grammar::from_ebnf("ルート ::= 数字+\n数字 ::= [0-9]\n").unwrap();
    assert!(g.to_string().contains("ルート ::="));
    let engine = StackEngine::new(Arc::new(CompiledGrammar::new(g, "ルート").unwrap()), 16);
    let stacks = engine.accept_bytes(b"2024", &engine.initial_stacks());
    assert!(stacks.can_terminate());
}

#[test]
fn test_escape_round_trip() {
    let g = Grammar::from_ebnf(r#"x ::= "\n""#).unwrap();
    assert_eq!(g.class_ranges(2).unwrap().collect::<Vec<_>>(), [(10, 10)]);

    let g = Grammar::from_ebnf(r#"y ::= "\x41""#).unwrap();
    assert_eq!(g.class_ranges(2).unwrap().collect::<Vec<_>>(), [(65, 65)]);
}

#[test]
fn test_empty_grammar() {
    let g = Grammar::from_ebnf("  # nothing here\n\n").unwrap();
    assert_eq!(g.bytecode(), [END_OF_GRAMMAR]);
    assert_eq!(g.num_rules(), 0);
}

#[test]
fn test_alternates_span_lines() {
    let g = Grammar::from_ebnf("root ::= \"a\" |\n  \"b\" |\n  \"c\"\n").unwrap();
    let code = g.bytecode();
    // rule id, three single-item alternates, rule terminator, sentinel
    assert_eq!(code.len(), 1 + 3 * 5 + 1 + 1);
    assert_eq!(code[code.len() - 2], END);
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[test]
fn test_error_unterminated_literal() {
    let (_, _, message, _) = syntax_error("root ::= \"abc");
    assert_eq!(message, "unterminated string literal");
}

#[test]
fn test_error_missing_assign() {
    let (line, column, message, near) = syntax_error("root = \"a\"");
    assert_eq!(message, "expecting ::=");
    assert_eq!((line, column), (1, 6));
    assert!(near.starts_with("= \"a\""));
}

#[test]
fn test_error_unknown_escape() {
    let (_, _, message, _) = syntax_error(r#"root ::= "\q""#);
    assert_eq!(message, "unknown escape");
}

#[test]
fn test_error_bad_hex_escape() {
    let (_, _, message, _) = syntax_error(r#"root ::= "\x4""#);
    assert_eq!(message, "expecting \\xNN");
}

#[test]
fn test_error_repetition_placement() {
    let (_, _, message, _) = syntax_error("root ::= *");
    assert_eq!(message, "expecting preceding item to */+/?");
}

#[test]
fn test_error_unbalanced_group() {
    let (_, _, message, _) = syntax_error("root ::= (\"a\" \"b\"\n");
    assert_eq!(message, "expecting ')'");
    let (_, _, message, _) = syntax_error("root ::= \"a\")\n");
    assert_eq!(message, "expecting newline or end");
}

#[test]
fn test_error_reports_later_line() {
    let (line, _, _, _) = syntax_error("root ::= item\nitem ::= [z-a]\n");
    assert_eq!(line, 2);
}

#[test]
fn test_syntax_errors_are_grammar_errors() {
    let err = Grammar::from_ebnf("::=").unwrap_err();
    assert!(err.is_grammar_error());
    assert!(err.to_string().contains("expecting name"));
}
