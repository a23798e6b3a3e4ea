//! EBNF compiler: recursive descent straight to bytecode.
//!
//! Surface syntax:
//! - `name ::= alt | alt ...`, one rule per line (alternates may continue
//!   on the next line after `|`, and anywhere inside parentheses)
//! - Rule names made of Unicode letters and digits, `-` and `_`
//! - String literals `"..."`, one byte item per UTF-8 byte
//! - Byte classes `[a-z0-9_]`
//! - Grouping `( ... )`, postfix `*`, `+`, `?`
//! - Escapes `\xNN`, `\"`, `\[`, `\]`, `\\`, `\r`, `\n`, `\t`
//! - `#` comments to end of line
//!
//! Groups and repetitions are desugared into synthesized helper rules:
//!
//! ```text
//! ( A | B )  -->  S' ::= A | B
//! S*         -->  S' ::= S S' |
//! S+         -->  S' ::= S S' | S
//! S?         -->  S' ::= S |
//! ```
//!
//! Helper rules are emitted as soon as they are complete, so they precede
//! the rule that uses them in the bytecode.

use rustc_hash::FxHashSet;
use tracing::debug;

use super::symbols::SymbolTable;
use super::{END, END_OF_GRAMMAR, Grammar, RULE_REF, RuleId};
use crate::error::{GrammarError, Result};

/// Compile EBNF source text into bytecode and its symbol table.
pub fn compile(source: &str) -> Result<Grammar> {
    let mut compiler = Compiler::new(source);
    compiler.skip_space(true);
    while compiler.peek().is_some() {
        compiler.parse_rule()?;
    }
    if compiler.symbols.len() >= END_OF_GRAMMAR as usize {
        return Err(compiler.error("too many rules"));
    }
    compiler.out.push(END_OF_GRAMMAR);

    debug!(
        rules = compiler.symbols.len(),
        bytecode_len = compiler.out.len(),
        "compiled grammar"
    );

    Ok(Grammar {
        bytecode: compiler.out,
        symbols: compiler.symbols,
    })
}

impl Grammar {
    /// Parse an EBNF grammar string.
    ///
    /// # Example
    /// ```
    /// use pie_grammar::grammar::Grammar;
    ///
    /// let grammar = Grammar::from_ebnf(r#"root ::= "hello" | "world""#).unwrap();
    /// assert_eq!(grammar.num_rules(), 1);
    /// ```
    pub fn from_ebnf(source: &str) -> Result<Grammar> {
        compile(source)
    }
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '-' || c == '_'
}

fn hex_digit(c: u8) -> Option<u32> {
    match c {
        b'0'..=b'9' => Some((c - b'0') as u32),
        b'a'..=b'f' => Some((c - b'a' + 10) as u32),
        b'A'..=b'F' => Some((c - b'A' + 10) as u32),
        _ => None,
    }
}

/// Append a complete alternate: size field, items, terminator.
fn push_alternate(out: &mut Vec<u32>, items: &[u32]) {
    out.push(items.len() as u32 + 1);
    out.extend_from_slice(items);
    out.push(END);
}

struct Compiler<'a> {
    src: &'a str,
    pos: usize,
    symbols: SymbolTable,
    defined: FxHashSet<RuleId>,
    out: Vec<u32>,
}

impl<'a> Compiler<'a> {
    fn new(src: &'a str) -> Self {
        Self {
            src,
            pos: 0,
            symbols: SymbolTable::new(),
            defined: FxHashSet::default(),
            out: Vec::new(),
        }
    }

    fn rest(&self) -> &'a [u8] {
        &self.src.as_bytes()[self.pos..]
    }

    fn peek(&self) -> Option<u8> {
        self.src.as_bytes().get(self.pos).copied()
    }

    fn peek_at(&self, delta: usize) -> Option<u8> {
        self.src.as_bytes().get(self.pos + delta).copied()
    }

    fn advance(&mut self) {
        if self.pos < self.src.len() {
            self.pos += 1;
        }
    }

    fn error(&self, msg: &str) -> GrammarError {
        let consumed = &self.src.as_bytes()[..self.pos];
        let line = consumed.iter().filter(|&&b| b == b'\n').count() + 1;
        let line_start = consumed
            .iter()
            .rposition(|&b| b == b'\n')
            .map_or(0, |i| i + 1);
        GrammarError::syntax(line, self.pos - line_start + 1, msg, self.rest())
    }

    /// Skip whitespace and `#` comments. Unless `newline_ok`, stop at a line break.
    fn skip_space(&mut self, newline_ok: bool) {
        while let Some(c) = self.peek() {
            if c == b'#' {
                while let Some(c) = self.peek() {
                    if c == b'\r' || c == b'\n' {
                        break;
                    }
                    self.advance();
                }
            } else if c.is_ascii_whitespace() {
                if !newline_ok && (c == b'\r' || c == b'\n') {
                    break;
                }
                self.advance();
            } else {
                break;
            }
        }
    }

    /// Byte length of the rule name starting at the cursor, 0 if none.
    fn name_len(&self) -> usize {
        self.src.get(self.pos..).map_or(0, |rest| {
            rest.chars().take_while(|&c| is_word_char(c)).map(char::len_utf8).sum()
        })
    }

    fn parse_name(&mut self) -> Result<&'a str> {
        let len = self.name_len();
        if len == 0 {
            return Err(self.error("expecting name"));
        }
        let start = self.pos;
        self.pos += len;
        let src = self.src;
        Ok(&src[start..self.pos])
    }

    /// Parse one byte of a literal or class, resolving escapes.
    fn parse_char(&mut self, in_class: bool) -> Result<u32> {
        match self.peek() {
            None => Err(self.error("unexpected end of input")),
            Some(b'\\') => {
                let value = match self.peek_at(1) {
                    Some(b'x') => {
                        let hi = self.peek_at(2).and_then(hex_digit);
                        let lo = self.peek_at(3).and_then(hex_digit);
                        match (hi, lo) {
                            (Some(hi), Some(lo)) => {
                                self.pos += 2;
                                (hi << 4) | lo
                            }
                            _ => return Err(self.error("expecting \\xNN")),
                        }
                    }
                    Some(c @ (b'"' | b'[' | b']' | b'\\')) => c as u32,
                    Some(b'r') => b'\r' as u32,
                    Some(b'n') => b'\n' as u32,
                    Some(b't') => b'\t' as u32,
                    _ => return Err(self.error("unknown escape")),
                };
                self.pos += 2;
                Ok(value)
            }
            Some(c) if in_class && !c.is_ascii() => Err(self.error(
                "non-ASCII character in class; spell bytes as \\xNN",
            )),
            Some(c) => {
                self.advance();
                Ok(c as u32)
            }
        }
    }

    fn parse_sequence(
        &mut self,
        rule_name: &str,
        outbuf: &mut Vec<u32>,
        is_nested: bool,
    ) -> Result<()> {
        let out_start = outbuf.len();
        // Alternate size, patched once the sequence is complete.
        outbuf.push(0);

        let mut last_sym_start = outbuf.len();
        while let Some(c) = self.peek() {
            match c {
                b'"' => {
                    self.advance();
                    last_sym_start = outbuf.len();
                    loop {
                        match self.peek() {
                            None => return Err(self.error("unterminated string literal")),
                            Some(b'"') => break,
                            Some(_) => {
                                let b = self.parse_char(false)?;
                                outbuf.extend([2, b, b]);
                            }
                        }
                    }
                    self.advance();
                    self.skip_space(is_nested);
                }
                b'[' => {
                    self.advance();
                    last_sym_start = outbuf.len();
                    outbuf.push(0);
                    loop {
                        match self.peek() {
                            None => return Err(self.error("unterminated character class")),
                            Some(b']') => break,
                            Some(_) => {
                                let lo = self.parse_char(true)?;
                                let hi = if self.peek() == Some(b'-')
                                    && !matches!(self.peek_at(1), None | Some(b']'))
                                {
                                    self.advance();
                                    self.parse_char(true)?
                                } else {
                                    lo
                                };
                                if lo > hi {
                                    return Err(self.error("character range is out of order"));
                                }
                                outbuf.extend([lo, hi]);
                            }
                        }
                    }
                    let count = outbuf.len() - last_sym_start - 1;
                    if count == 0 {
                        return Err(self.error("empty character class"));
                    }
                    outbuf[last_sym_start] = count as u32;
                    self.advance();
                    self.skip_space(is_nested);
                }
                _ if self.name_len() > 0 => {
                    let name = self.parse_name()?;
                    let ref_id = self.symbols.intern(name);
                    self.skip_space(is_nested);
                    last_sym_start = outbuf.len();
                    outbuf.extend([RULE_REF, ref_id.0]);
                }
                b'(' => {
                    self.advance();
                    self.skip_space(true);
                    let sub_id = self.symbols.synthesize(rule_name);
                    self.parse_alternates(rule_name, sub_id, true)?;
                    last_sym_start = outbuf.len();
                    outbuf.extend([RULE_REF, sub_id.0]);
                    if self.peek() != Some(b')') {
                        return Err(self.error("expecting ')'"));
                    }
                    self.advance();
                    self.skip_space(is_nested);
                }
                op @ (b'*' | b'+' | b'?') => {
                    if outbuf.len() == last_sym_start {
                        return Err(self.error("expecting preceding item to */+/?"));
                    }
                    let sub_id = self.symbols.synthesize(rule_name);
                    let item = outbuf.split_off(last_sym_start);

                    self.out.push(sub_id.0);
                    let mut first = item.clone();
                    if op != b'?' {
                        first.extend([RULE_REF, sub_id.0]);
                    }
                    push_alternate(&mut self.out, &first);
                    push_alternate(&mut self.out, if op == b'+' { &item } else { &[] });
                    self.out.push(END);
                    self.defined.insert(sub_id);

                    outbuf.extend([RULE_REF, sub_id.0]);
                    self.advance();
                    self.skip_space(is_nested);
                }
                _ => break,
            }
        }

        outbuf[out_start] = (outbuf.len() - out_start) as u32;
        outbuf.push(END);
        Ok(())
    }

    fn parse_alternates(
        &mut self,
        rule_name: &str,
        rule_id: RuleId,
        is_nested: bool,
    ) -> Result<()> {
        let mut outbuf = Vec::new();
        self.parse_sequence(rule_name, &mut outbuf, is_nested)?;
        while self.peek() == Some(b'|') {
            self.advance();
            self.skip_space(true);
            self.parse_sequence(rule_name, &mut outbuf, is_nested)?;
        }
        self.out.push(rule_id.0);
        self.out.extend_from_slice(&outbuf);
        self.out.push(END);
        self.defined.insert(rule_id);
        Ok(())
    }

    fn parse_rule(&mut self) -> Result<()> {
        let name = self.parse_name()?;
        self.skip_space(false);
        let rule_id = self.symbols.intern(name);
        if self.defined.contains(&rule_id) {
            return Err(self.error(&format!("rule \"{}\" defined multiple times", name)));
        }

        if !self.rest().starts_with(b"::=") {
            return Err(self.error("expecting ::="));
        }
        self.pos += 3;
        self.skip_space(true);

        self.parse_alternates(name, rule_id, false)?;

        match self.peek() {
            Some(b'\r') => {
                self.advance();
                if self.peek() == Some(b'\n') {
                    self.advance();
                }
            }
            Some(b'\n') => self.advance(),
            None => {}
            Some(_) => return Err(self.error("expecting newline or end")),
        }
        self.skip_space(true);
        Ok(())
    }
}
