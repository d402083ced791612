//! Byte-level lexer for Laye source.
//!
//! Scans one source file into a token stream. Whitespace and comments
//! become trivia attached to the surrounding tokens; keyword recognition is
//! a classification pass over scanned identifiers. The lexer never aborts:
//! bytes it cannot make sense of produce an `Unknown` token and a
//! diagnostic, and scanning continues.

use std::rc::Rc;

use crate::context::Context;
use crate::diag::Severity;
use crate::source::{Location, SourceId};
use crate::token::{keyword_kind, Token, TokenKind, Trivia, TriviaKind};

pub struct Lexer<'ctx> {
    ctx: &'ctx mut Context,
    source: SourceId,
    text: Rc<str>,
    pos: usize,
}

/// Lexes an entire file, ending with an `Eof` token that carries any
/// trailing trivia.
pub fn lex_file(ctx: &mut Context, source: SourceId) -> Vec<Token> {
    let mut lexer = Lexer::new(ctx, source);
    let mut tokens = Vec::new();
    loop {
        let token = lexer.next_token();
        let done = token.kind == TokenKind::Eof;
        tokens.push(token);
        if done {
            break;
        }
    }
    tokens
}

impl<'ctx> Lexer<'ctx> {
    pub fn new(ctx: &'ctx mut Context, source: SourceId) -> Self {
        let text = ctx.source_text(source);
        Lexer { ctx, source, text, pos: 0 }
    }

    fn at_end(&self) -> bool {
        self.pos >= self.text.len()
    }

    fn peek(&self) -> u8 {
        self.text.as_bytes().get(self.pos).copied().unwrap_or(0)
    }

    fn peek_at(&self, n: usize) -> u8 {
        self.text.as_bytes().get(self.pos + n).copied().unwrap_or(0)
    }

    fn advance(&mut self) -> u8 {
        let b = self.peek();
        self.pos += 1;
        b
    }

    fn location_from(&self, start: usize) -> Location {
        Location::new(self.source, start as u32, (self.pos - start) as u32)
    }

    fn diagnose(&mut self, severity: Severity, location: Location, message: String) {
        self.ctx.diagnose(severity, location, message);
    }

    pub fn next_token(&mut self) -> Token {
        let leading = self.read_trivia(false);
        let mut token = self.lex_token();
        token.leading = leading;
        if token.kind != TokenKind::Eof {
            token.trailing = self.read_trivia(true);
        }
        token
    }

    /// Reads a run of trivia. In trailing mode the run ends after the first
    /// piece that contains a newline, even when that newline sits inside a
    /// delimited comment.
    fn read_trivia(&mut self, trailing: bool) -> Vec<Trivia> {
        let mut trivia = Vec::new();
        while !self.at_end() {
            let start = self.pos;
            let mut saw_newline = false;
            match self.peek() {
                b' ' | b'\t' | b'\r' | b'\n' => {
                    while matches!(self.peek(), b' ' | b'\t' | b'\r' | b'\n') && !self.at_end() {
                        if self.peek() == b'\n' {
                            saw_newline = true;
                            if trailing {
                                self.advance();
                                break;
                            }
                        }
                        self.advance();
                    }
                    trivia.push(Trivia {
                        kind: TriviaKind::Whitespace,
                        location: self.location_from(start),
                    });
                }
                b'/' if self.peek_at(1) == b'/' => {
                    while !self.at_end() && self.peek() != b'\n' {
                        self.advance();
                    }
                    trivia.push(Trivia {
                        kind: TriviaKind::LineComment,
                        location: self.location_from(start),
                    });
                }
                b'#' => {
                    while !self.at_end() && self.peek() != b'\n' {
                        self.advance();
                    }
                    trivia.push(Trivia {
                        kind: TriviaKind::HashComment,
                        location: self.location_from(start),
                    });
                }
                b'/' if self.peek_at(1) == b'*' => {
                    saw_newline = self.lex_delimited_comment();
                    trivia.push(Trivia {
                        kind: TriviaKind::DelimitedComment,
                        location: self.location_from(start),
                    });
                }
                _ => break,
            }
            if trailing && saw_newline {
                break;
            }
        }
        trivia
    }

    /// Consumes a `/* ... */` comment with nesting. Returns whether the
    /// comment contained a newline. An unterminated comment produces
    /// exactly one diagnostic regardless of nesting depth.
    fn lex_delimited_comment(&mut self) -> bool {
        let start = self.pos;
        self.advance();
        self.advance();
        let mut depth = 1usize;
        let mut saw_newline = false;
        while depth > 0 {
            if self.at_end() {
                let location = self.location_from(start);
                self.diagnose(
                    Severity::Error,
                    location,
                    "unterminated delimited comment".to_string(),
                );
                break;
            }
            if self.peek() == b'/' && self.peek_at(1) == b'*' {
                self.advance();
                self.advance();
                depth += 1;
            } else if self.peek() == b'*' && self.peek_at(1) == b'/' {
                self.advance();
                self.advance();
                depth -= 1;
            } else {
                if self.peek() == b'\n' {
                    saw_newline = true;
                }
                self.advance();
            }
        }
        saw_newline
    }

    fn lex_token(&mut self) -> Token {
        let start = self.pos;
        if self.at_end() {
            return Token::new(TokenKind::Eof, self.location_from(start));
        }

        let b = self.peek();
        match b {
            b'0'..=b'9' => self.lex_number(start),
            b'"' => self.lex_string(start),
            b'\'' => self.lex_rune(start),
            _ if is_ident_start(b) => self.lex_ident(start),
            _ => self.lex_punctuation(start),
        }
    }

    fn lex_punctuation(&mut self, start: usize) -> Token {
        let b = self.advance();
        let kind = match b {
            b':' if self.peek() == b':' => {
                self.advance();
                TokenKind::ColonColon
            }
            b'=' if self.peek() == b'=' => {
                self.advance();
                TokenKind::EqualEqual
            }
            b'=' if self.peek() == b'>' => {
                self.advance();
                TokenKind::EqualGreater
            }
            b'!' if self.peek() == b'=' => {
                self.advance();
                TokenKind::BangEqual
            }
            b'<' if self.peek() == b'<' && self.peek_at(1) == b'=' => {
                self.advance();
                self.advance();
                TokenKind::LessLessEqual
            }
            b'<' if self.peek() == b'<' => {
                self.advance();
                TokenKind::LessLess
            }
            b'<' if self.peek() == b'=' => {
                self.advance();
                TokenKind::LessEqual
            }
            b'<' if self.peek() == b'-' => {
                self.advance();
                TokenKind::LessMinus
            }
            b'>' if self.peek() == b'>' && self.peek_at(1) == b'=' => {
                self.advance();
                self.advance();
                TokenKind::GreaterGreaterEqual
            }
            b'>' if self.peek() == b'>' => {
                self.advance();
                TokenKind::GreaterGreater
            }
            b'>' if self.peek() == b'=' => {
                self.advance();
                TokenKind::GreaterEqual
            }
            b'+' if self.peek() == b'=' => {
                self.advance();
                TokenKind::PlusEqual
            }
            b'-' if self.peek() == b'=' => {
                self.advance();
                TokenKind::MinusEqual
            }
            b'*' if self.peek() == b'=' => {
                self.advance();
                TokenKind::StarEqual
            }
            b'/' if self.peek() == b'=' => {
                self.advance();
                TokenKind::SlashEqual
            }
            b'%' if self.peek() == b'=' => {
                self.advance();
                TokenKind::PercentEqual
            }
            b'&' if self.peek() == b'=' => {
                self.advance();
                TokenKind::AmpersandEqual
            }
            b'|' if self.peek() == b'=' => {
                self.advance();
                TokenKind::PipeEqual
            }
            b'~' if self.peek() == b'=' => {
                self.advance();
                TokenKind::TildeEqual
            }
            _ => match TokenKind::from_byte(b) {
                Some(kind) => kind,
                None => {
                    // Resynchronize on UTF-8 boundaries so a stray
                    // multi-byte character produces one token, not four.
                    while !self.at_end() && (self.peek() & 0xC0) == 0x80 {
                        self.advance();
                    }
                    let location = self.location_from(start);
                    let text = self.ctx.location_text(location).to_string();
                    self.diagnose(
                        Severity::Error,
                        location,
                        format!("invalid character '{text}' in source"),
                    );
                    return Token::new(TokenKind::Unknown, location);
                }
            },
        };
        Token::new(kind, self.location_from(start))
    }

    fn lex_ident(&mut self, start: usize) -> Token {
        while is_ident_continue(self.peek()) {
            self.advance();
        }
        let location = self.location_from(start);
        let text = Rc::clone(&self.text);
        let text = &text[start..self.pos];

        let mut token = Token::new(TokenKind::Ident, location);
        if let Some(kind) = keyword_kind(text) {
            token.kind = kind;
            return token;
        }
        if let Some((kind, width)) = sized_primitive(text) {
            token.kind = kind;
            token.int_value = width as u64;
            return token;
        }
        token.text = self.ctx.intern(text);
        token
    }

    fn lex_number(&mut self, start: usize) -> Token {
        let text = Rc::clone(&self.text);
        while self.peek().is_ascii_digit() || self.peek() == b'_' {
            self.advance();
        }
        let digits_end = self.pos;

        if self.peek() == b'#' {
            return self.lex_radix_number(start, digits_end);
        }

        if self.peek() == b'.' && self.peek_at(1).is_ascii_digit() {
            return self.lex_decimal_float(start, digits_end);
        }

        // A digit run flowing into identifier characters is rewound and
        // re-lexed as an identifier.
        if is_ident_start(self.peek()) {
            self.pos = start;
            while is_ident_continue(self.peek()) {
                self.advance();
            }
            let location = self.location_from(start);
            let mut token = Token::new(TokenKind::Ident, location);
            token.text = self.ctx.intern(&text[start..self.pos]);
            return token;
        }

        let text = &text[start..digits_end];
        let location = self.location_from(start);
        if text.ends_with('_') {
            self.diagnose(
                Severity::Error,
                location,
                "numeric literal may not end with an underscore".to_string(),
            );
        }
        let mut token = Token::new(TokenKind::LitInt, location);
        token.int_value = fold_digits(text, 10, &mut false);
        token
    }

    fn lex_radix_number(&mut self, start: usize, base_end: usize) -> Token {
        let text = Rc::clone(&self.text);
        let base = fold_digits(&text[start..base_end], 10, &mut false);
        self.advance(); // '#'

        let valid_base = (2..=36).contains(&base);
        if !valid_base {
            let location = self.location_from(start);
            self.diagnose(
                Severity::Error,
                location,
                format!("integer base must be between 2 and 36, got {base}"),
            );
        }
        let base = if valid_base { base as u32 } else { 36 };

        let digits_start = self.pos;
        while self.peek().is_ascii_alphanumeric() || self.peek() == b'_' {
            self.advance();
        }
        let digits_end = self.pos;

        let mut is_float = false;
        let mut fraction_start = digits_end;
        if self.peek() == b'.' && self.peek_at(1).is_ascii_alphanumeric() {
            self.advance();
            fraction_start = self.pos;
            while self.peek().is_ascii_alphanumeric() || self.peek() == b'_' {
                self.advance();
            }
            is_float = true;
        }
        let location = self.location_from(start);

        let digits = &text[digits_start..digits_end];
        if digits.is_empty() {
            self.diagnose(
                Severity::Error,
                location,
                "expected digits after '#' in integer literal".to_string(),
            );
        }
        if digits.starts_with('_') || digits.ends_with('_') {
            self.diagnose(
                Severity::Error,
                location,
                "numeric literal may not start or end with an underscore".to_string(),
            );
        }

        // Invalid digits for the base are reported once per literal and
        // read as `base - 1` so lexing can continue.
        let mut reported = false;
        let int_value = fold_digits(digits, base, &mut reported);
        let fraction = &text[fraction_start..self.pos];
        let frac_digits = if is_float { fraction } else { "" };
        let float_value = if is_float {
            let mut value = int_value as f64;
            let mut scale = 1.0 / base as f64;
            for c in frac_digits.chars().filter(|&c| c != '_') {
                value += digit_value(c, base, &mut reported) as f64 * scale;
                scale /= base as f64;
            }
            value
        } else {
            0.0
        };
        if reported {
            self.diagnose(
                Severity::Error,
                location,
                format!("literal contains digits invalid in base {base}"),
            );
        }

        let mut token = Token::new(
            if is_float { TokenKind::LitFloat } else { TokenKind::LitInt },
            location,
        );
        token.int_value = int_value;
        token.float_value = float_value;
        token
    }

    fn lex_decimal_float(&mut self, start: usize, int_end: usize) -> Token {
        let text = Rc::clone(&self.text);
        self.advance(); // '.'
        let frac_start = self.pos;
        while self.peek().is_ascii_digit() || self.peek() == b'_' {
            self.advance();
        }
        let location = self.location_from(start);

        let int_text = &text[start..int_end];
        let frac_text = &text[frac_start..self.pos];
        if int_text.ends_with('_') || frac_text.starts_with('_') || frac_text.ends_with('_') {
            self.diagnose(
                Severity::Error,
                location,
                "numeric literal may not start or end with an underscore".to_string(),
            );
        }

        let mut value = fold_digits(int_text, 10, &mut false) as f64;
        let mut scale = 0.1;
        for c in frac_text.chars().filter(|&c| c != '_') {
            value += (c as u8 - b'0') as f64 * scale;
            scale /= 10.0;
        }

        let mut token = Token::new(TokenKind::LitFloat, location);
        token.float_value = value;
        token
    }

    fn lex_string(&mut self, start: usize) -> Token {
        self.advance(); // '"'
        let mut value = String::new();
        let mut terminated = false;
        while !self.at_end() {
            match self.peek() {
                b'"' => {
                    self.advance();
                    terminated = true;
                    break;
                }
                b'\n' => break,
                b'\\' => {
                    if let Some(c) = self.lex_escape() {
                        value.push(c);
                    }
                }
                _ => {
                    let c = self.current_char();
                    value.push(c);
                    self.pos += c.len_utf8();
                }
            }
        }
        let location = self.location_from(start);
        if !terminated {
            self.diagnose(Severity::Error, location, "unterminated string literal".to_string());
        }
        let mut token = Token::new(TokenKind::LitString, location);
        token.text = self.ctx.intern(&value);
        token
    }

    fn lex_rune(&mut self, start: usize) -> Token {
        self.advance(); // '\''
        let mut token_value: Option<char> = None;

        if self.peek() == b'\'' {
            self.advance();
            let location = self.location_from(start);
            self.diagnose(Severity::Error, location, "empty rune literal".to_string());
            let mut token = Token::new(TokenKind::LitRune, location);
            token.text = self.ctx.intern("");
            return token;
        }

        if !self.at_end() && self.peek() != b'\n' {
            if self.peek() == b'\\' {
                token_value = self.lex_escape();
            } else {
                let c = self.current_char();
                self.pos += c.len_utf8();
                token_value = Some(c);
            }
        }

        let mut terminated = false;
        let mut extra = false;
        while !self.at_end() && self.peek() != b'\n' {
            if self.peek() == b'\'' {
                self.advance();
                terminated = true;
                break;
            }
            extra = true;
            self.advance();
        }

        let location = self.location_from(start);
        if !terminated {
            self.diagnose(Severity::Error, location, "unterminated rune literal".to_string());
        } else if extra {
            self.diagnose(
                Severity::Error,
                location,
                "rune literal contains more than one character".to_string(),
            );
        }

        let value = token_value.unwrap_or('\0');
        let mut token = Token::new(TokenKind::LitRune, location);
        token.int_value = value as u64;
        token.text = self.ctx.intern(&value.to_string());
        token
    }

    /// Consumes a `\\`-escape; the cursor sits on the backslash.
    fn lex_escape(&mut self) -> Option<char> {
        let start = self.pos;
        self.advance(); // '\\'
        let escape = self.advance();
        match escape {
            b'\\' => Some('\\'),
            b'"' => Some('"'),
            b'\'' => Some('\''),
            b'a' => Some('\x07'),
            b'b' => Some('\x08'),
            b'f' => Some('\x0C'),
            b'n' => Some('\n'),
            b'r' => Some('\r'),
            b't' => Some('\t'),
            b'v' => Some('\x0B'),
            b'0' => Some('\0'),
            b'x' => {
                let hi = self.peek();
                let lo = self.peek_at(1);
                if hi.is_ascii_hexdigit() && lo.is_ascii_hexdigit() {
                    self.advance();
                    self.advance();
                    let value = (hex_value(hi) << 4) | hex_value(lo);
                    Some(value as char)
                } else {
                    let location = self.location_from(start);
                    self.diagnose(
                        Severity::Error,
                        location,
                        "\\x escape requires exactly two hex digits".to_string(),
                    );
                    None
                }
            }
            _ => {
                let location = self.location_from(start);
                let text = self.ctx.location_text(location).to_string();
                self.diagnose(
                    Severity::Error,
                    location,
                    format!("unrecognized escape sequence '{text}'"),
                );
                None
            }
        }
    }

    fn current_char(&self) -> char {
        self.text[self.pos..].chars().next().unwrap_or('\0')
    }
}

fn is_ident_start(b: u8) -> bool {
    b.is_ascii_alphabetic() || b == b'_'
}

fn is_ident_continue(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_'
}

fn hex_value(b: u8) -> u8 {
    match b {
        b'0'..=b'9' => b - b'0',
        b'a'..=b'f' => b - b'a' + 10,
        _ => b - b'A' + 10,
    }
}

fn digit_value(c: char, base: u32, reported: &mut bool) -> u64 {
    let value = match c {
        '0'..='9' => (c as u8 - b'0') as u32,
        'a'..='z' => (c as u8 - b'a') as u32 + 10,
        'A'..='Z' => (c as u8 - b'A') as u32 + 10,
        _ => base,
    };
    if value >= base {
        *reported = true;
        return (base - 1) as u64;
    }
    value as u64
}

fn fold_digits(text: &str, base: u32, reported: &mut bool) -> u64 {
    let mut value: u64 = 0;
    for c in text.chars().filter(|&c| c != '_') {
        value = value
            .wrapping_mul(base as u64)
            .wrapping_add(digit_value(c, base, reported));
    }
    value
}

/// Reclassifies identifiers shaped like `i32`/`u16`/`b1`/`f64` into sized
/// primitive tokens. Bool and integer widths are 1..=65535; float widths
/// are limited to 32, 64, 80 and 128. Anything else stays an identifier.
fn sized_primitive(text: &str) -> Option<(TokenKind, u16)> {
    let (head, digits) = text.split_at(1);
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let width: u32 = digits.parse().ok()?;
    let kind = match head {
        "i" => TokenKind::IntSized,
        "u" => TokenKind::UintSized,
        "b" => TokenKind::BoolSized,
        "f" => TokenKind::FloatSized,
        _ => return None,
    };
    if kind == TokenKind::FloatSized {
        if !matches!(width, 32 | 64 | 80 | 128) {
            return None;
        }
    } else if !(1..=65535).contains(&width) {
        return None;
    }
    Some((kind, width as u16))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::Options;
    use std::path::PathBuf;

    fn lex(source: &str) -> (Context, Vec<Token>) {
        let mut ctx = Context::new(Options::default());
        let id = ctx.add_source(PathBuf::from("test.laye"), source.to_string());
        let tokens = lex_file(&mut ctx, id);
        (ctx, tokens)
    }

    fn kinds(tokens: &[Token]) -> Vec<TokenKind> {
        tokens.iter().map(|t| t.kind).collect()
    }

    #[test]
    fn lexes_identifiers_and_keywords() {
        let (_, tokens) = lex("int foo bool noreturn");
        assert_eq!(
            kinds(&tokens),
            vec![
                TokenKind::Int,
                TokenKind::Ident,
                TokenKind::Bool,
                TokenKind::NoReturn,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn sized_primitives_carry_their_width() {
        let (_, tokens) = lex("i32 u16 b1 f80");
        assert_eq!(tokens[0].kind, TokenKind::IntSized);
        assert_eq!(tokens[0].int_value, 32);
        assert_eq!(tokens[1].kind, TokenKind::UintSized);
        assert_eq!(tokens[1].int_value, 16);
        assert_eq!(tokens[2].kind, TokenKind::BoolSized);
        assert_eq!(tokens[2].int_value, 1);
        assert_eq!(tokens[3].kind, TokenKind::FloatSized);
        assert_eq!(tokens[3].int_value, 80);
    }

    #[test]
    fn f7_is_just_an_identifier() {
        let (_, tokens) = lex("f7");
        assert_eq!(tokens[0].kind, TokenKind::Ident);
    }

    #[test]
    fn underscore_separators_do_not_change_value() {
        let (_, tokens) = lex("1_000");
        assert_eq!(tokens[0].kind, TokenKind::LitInt);
        assert_eq!(tokens[0].int_value, 1000);
    }

    #[test]
    fn radix_literal_base_three() {
        let (_, tokens) = lex("3#21");
        assert_eq!(tokens[0].kind, TokenKind::LitInt);
        assert_eq!(tokens[0].int_value, 7);
    }

    #[test]
    fn radix_literal_hex() {
        let (_, tokens) = lex("16#ff");
        assert_eq!(tokens[0].int_value, 255);
    }

    #[test]
    fn invalid_radix_digit_reports_once_and_recovers() {
        let (ctx, tokens) = lex("2#19");
        assert_eq!(tokens[0].kind, TokenKind::LitInt);
        // 1, then 9 read as base-1 = 1.
        assert_eq!(tokens[0].int_value, 3);
        assert_eq!(ctx.diagnostics().len(), 1);
    }

    #[test]
    fn decimal_float() {
        let (_, tokens) = lex("3.5");
        assert_eq!(tokens[0].kind, TokenKind::LitFloat);
        assert!((tokens[0].float_value - 3.5).abs() < 1e-9);
    }

    #[test]
    fn digit_led_identifier_rewinds() {
        let (ctx, tokens) = lex("123abc");
        assert_eq!(tokens[0].kind, TokenKind::Ident);
        assert_eq!(ctx.interner.resolve(tokens[0].text), "123abc");
        assert!(!ctx.has_reported_errors());
    }

    #[test]
    fn multi_byte_operators() {
        let (_, tokens) = lex(":: == != <= >= << >> <<= >>= => <- += -= *= /= %= &= |= ~=");
        assert_eq!(
            kinds(&tokens),
            vec![
                TokenKind::ColonColon,
                TokenKind::EqualEqual,
                TokenKind::BangEqual,
                TokenKind::LessEqual,
                TokenKind::GreaterEqual,
                TokenKind::LessLess,
                TokenKind::GreaterGreater,
                TokenKind::LessLessEqual,
                TokenKind::GreaterGreaterEqual,
                TokenKind::EqualGreater,
                TokenKind::LessMinus,
                TokenKind::PlusEqual,
                TokenKind::MinusEqual,
                TokenKind::StarEqual,
                TokenKind::SlashEqual,
                TokenKind::PercentEqual,
                TokenKind::AmpersandEqual,
                TokenKind::PipeEqual,
                TokenKind::TildeEqual,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn string_escapes() {
        let (ctx, tokens) = lex(r#""a\tb\x41\n""#);
        assert_eq!(tokens[0].kind, TokenKind::LitString);
        assert_eq!(ctx.interner.resolve(tokens[0].text), "a\tbA\n");
    }

    #[test]
    fn unterminated_string_is_diagnosed() {
        let (ctx, tokens) = lex("\"oops\n");
        assert_eq!(tokens[0].kind, TokenKind::LitString);
        assert!(ctx.has_reported_errors());
    }

    #[test]
    fn rune_literal_carries_code_point() {
        let (_, tokens) = lex("'x'");
        assert_eq!(tokens[0].kind, TokenKind::LitRune);
        assert_eq!(tokens[0].int_value, 'x' as u64);
    }

    #[test]
    fn empty_rune_is_diagnosed() {
        let (ctx, _) = lex("''");
        assert!(ctx.has_reported_errors());
    }

    #[test]
    fn rune_with_extra_characters_is_diagnosed() {
        let (ctx, tokens) = lex("'ab'");
        assert_eq!(tokens[0].kind, TokenKind::LitRune);
        assert!(ctx.has_reported_errors());
    }

    #[test]
    fn nested_comment_is_one_trivia() {
        let (ctx, tokens) = lex("a /* outer /* inner */ still outer */ b");
        assert_eq!(tokens[1].kind, TokenKind::Ident);
        assert!(!ctx.has_reported_errors());
        let all: Vec<_> = tokens
            .iter()
            .flat_map(|t| t.leading.iter().chain(t.trailing.iter()))
            .filter(|t| t.kind == TriviaKind::DelimitedComment)
            .collect();
        assert_eq!(all.len(), 1);
    }

    #[test]
    fn unterminated_nested_comment_reports_exactly_once() {
        let (ctx, _) = lex("/* a /* b /* c ");
        assert_eq!(ctx.diagnostics().len(), 1);
        assert!(ctx.has_reported_errors());
    }

    #[test]
    fn unknown_byte_produces_unknown_token_and_continues() {
        let (ctx, tokens) = lex("a $ b");
        assert_eq!(
            kinds(&tokens),
            vec![TokenKind::Ident, TokenKind::Unknown, TokenKind::Ident, TokenKind::Eof]
        );
        assert!(ctx.has_reported_errors());
    }

    #[test]
    fn tokens_and_trivia_reconstruct_the_source() {
        let source = "int main() { // comment\n  return 1_0; /* done */ }\n";
        let (_, tokens) = lex(source);
        let mut spans: Vec<(u32, u32)> = Vec::new();
        for token in &tokens {
            for trivia in &token.leading {
                spans.push((trivia.location.offset, trivia.location.length));
            }
            spans.push((token.location.offset, token.location.length));
            for trivia in &token.trailing {
                spans.push((trivia.location.offset, trivia.location.length));
            }
        }
        spans.sort();
        let mut rebuilt = String::new();
        for (offset, length) in spans {
            rebuilt.push_str(&source[offset as usize..(offset + length) as usize]);
        }
        assert_eq!(rebuilt, source);
    }
}
