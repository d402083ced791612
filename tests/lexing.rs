//! Lexer behavior over whole files: source reconstruction from tokens and
//! trivia, numeric literal values, and recovery diagnostics.

use std::path::PathBuf;

use layec::context::{Context, Options};
use layec::lexer::lex_file;
use layec::token::{Token, TokenKind};

fn lex(source: &str) -> (Context, Vec<Token>) {
    let mut ctx = Context::new(Options::default());
    let id = ctx.add_source(PathBuf::from("input.laye"), source.to_string());
    let tokens = lex_file(&mut ctx, id);
    (ctx, tokens)
}

fn reconstruct(source: &str, tokens: &[Token]) -> String {
    let mut spans: Vec<(u32, u32)> = Vec::new();
    for token in tokens {
        for trivia in &token.leading {
            spans.push((trivia.location.offset, trivia.location.length));
        }
        spans.push((token.location.offset, token.location.length));
        for trivia in &token.trailing {
            spans.push((trivia.location.offset, trivia.location.length));
        }
    }
    spans.sort();
    spans
        .iter()
        .map(|&(offset, length)| &source[offset as usize..(offset + length) as usize])
        .collect()
}

#[test]
fn token_and_trivia_spans_tile_the_source() {
    let source = "\
// a leading comment
int main() {
    /* nested /* comment */ here */
    int x = 1_000; # hash comment
    return x;
}
";
    let (ctx, tokens) = lex(source);
    assert!(!ctx.has_reported_errors(), "{}", ctx.render_diagnostics());
    assert_eq!(reconstruct(source, &tokens), source);
}

#[test]
fn spans_tile_even_with_bad_input() {
    let source = "int $ x = `;\n";
    let (ctx, tokens) = lex(source);
    assert!(ctx.has_reported_errors());
    assert_eq!(reconstruct(source, &tokens), source);
}

#[test]
fn underscored_decimal_equals_plain_decimal() {
    let (_, tokens) = lex("1_000");
    assert_eq!(tokens[0].kind, TokenKind::LitInt);
    assert_eq!(tokens[0].int_value, 1000);
}

#[test]
fn radix_three_literal() {
    let (ctx, tokens) = lex("3#21");
    assert!(!ctx.has_reported_errors());
    assert_eq!(tokens[0].kind, TokenKind::LitInt);
    assert_eq!(tokens[0].int_value, 7);
}

#[test]
fn radix_thirty_six_uses_letters() {
    let (_, tokens) = lex("36#zz");
    assert_eq!(tokens[0].int_value, 35 * 36 + 35);
}

#[test]
fn unterminated_nested_comment_reports_exactly_one_error() {
    let (ctx, _) = lex("int x; /* one /* two /* three ");
    let errors = ctx
        .diagnostics()
        .diagnostics()
        .iter()
        .filter(|d| d.severity.is_error())
        .count();
    assert_eq!(errors, 1);
}

#[test]
fn keywords_and_sized_primitives_classify() {
    let (_, tokens) = lex("struct variant i32 u8 b1 f64 xyzzy varargs");
    let kinds: Vec<TokenKind> = tokens.iter().map(|t| t.kind).collect();
    assert_eq!(
        kinds,
        vec![
            TokenKind::Struct,
            TokenKind::Variant,
            TokenKind::IntSized,
            TokenKind::UintSized,
            TokenKind::BoolSized,
            TokenKind::FloatSized,
            TokenKind::Xyzzy,
            TokenKind::Varargs,
            TokenKind::Eof,
        ]
    );
}

#[test]
fn rune_escapes_decode() {
    let (ctx, tokens) = lex(r"'\x41' '\n' '\0'");
    assert!(!ctx.has_reported_errors());
    assert_eq!(tokens[0].int_value, 'A' as u64);
    assert_eq!(tokens[1].int_value, '\n' as u64);
    assert_eq!(tokens[2].int_value, 0);
}
