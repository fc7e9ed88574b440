//! Tokens of the embedded expression language

use logos::Logos;

use crate::error::{ParseError, Span};
use crate::parser::lexer::unescape;

#[derive(Logos, Debug, Clone, PartialEq)]
#[logos(skip r"[ \t\r\f]+|#[^\n]*")]
pub enum Token {
    #[token("if")]
    If,
    #[token("then")]
    Then,
    #[token("else")]
    Else,
    #[token("true")]
    True,
    #[token("false")]
    False,
    #[token("null")]
    Null,

    #[regex(r"[a-zA-Z_][a-zA-Z0-9_]*", |lex| lex.slice().to_string())]
    Ident(String),

    #[regex(r"[0-9]+", |lex| lex.slice().parse::<i64>().ok())]
    Int(i64),

    #[regex(r"[0-9]+\.[0-9]+([eE][+-]?[0-9]+)?", |lex| lex.slice().parse::<f64>().ok())]
    Float(f64),

    #[regex(r#""([^"\\]|\\.)*""#, |lex| unescape(lex.slice()))]
    #[regex(r#"'([^'\\]|\\.)*'"#, |lex| unescape(lex.slice()))]
    Str(String),

    // Operators
    #[token("==")]
    EqEq,
    #[token("!=")]
    NotEq,
    #[token("<=")]
    LtEq,
    #[token(">=")]
    GtEq,
    #[token("<")]
    Lt,
    #[token(">")]
    Gt,
    #[token("&&")]
    AndAnd,
    #[token("||")]
    OrOr,
    #[token("!")]
    Bang,
    #[token("=")]
    Assign,
    #[token("+")]
    Plus,
    #[token("-")]
    Minus,
    #[token("*")]
    Star,
    #[token("/")]
    Slash,
    #[token("%")]
    Percent,

    // Punctuation
    #[token(".")]
    Dot,
    #[token(",")]
    Comma,
    #[token(":")]
    Colon,
    #[token("(")]
    ParenOpen,
    #[token(")")]
    ParenClose,
    #[token("[")]
    BracketOpen,
    #[token("]")]
    BracketClose,
    #[token("{")]
    BraceOpen,
    #[token("}")]
    BraceClose,

    /// Statement separator: newline or `;`
    #[token("\n")]
    #[token(";")]
    Sep,
}

/// Lex an expression block.
///
/// Separators inside brackets are dropped so that a call or literal may span
/// lines, and runs of separators collapse into one.
pub fn lex(input: &str) -> Result<Vec<(Token, Span)>, Vec<ParseError>> {
    let mut tokens: Vec<(Token, Span)> = Vec::new();
    let mut errors = Vec::new();
    let mut depth = 0usize;

    for (tok, span) in Token::lexer(input).spanned() {
        let tok = match tok {
            Ok(tok) => tok,
            Err(()) => {
                errors.push(ParseError::Syntax {
                    message: format!("Unexpected character(s) '{}'", &input[span.clone()]),
                    span,
                    expected: vec![],
                });
                continue;
            }
        };
        match tok {
            Token::ParenOpen | Token::BracketOpen | Token::BraceOpen => depth += 1,
            Token::ParenClose | Token::BracketClose | Token::BraceClose => {
                depth = depth.saturating_sub(1)
            }
            Token::Sep => {
                let after_sep = matches!(tokens.last(), None | Some((Token::Sep, _)));
                if depth > 0 || after_sep {
                    continue;
                }
            }
            _ => {}
        }
        tokens.push((tok, span));
    }

    if errors.is_empty() {
        Ok(tokens)
    } else {
        Err(errors)
    }
}

pub(crate) fn describe(tok: &Token) -> String {
    match tok {
        Token::Ident(s) => format!("name '{}'", s),
        Token::Str(s) => format!("string \"{}\"", s),
        Token::Int(n) => format!("number {}", n),
        Token::Float(n) => format!("number {}", n),
        Token::Sep => "end of statement".to_string(),
        other => format!("'{}'", symbol(other)),
    }
}

fn symbol(tok: &Token) -> &'static str {
    match tok {
        Token::If => "if",
        Token::Then => "then",
        Token::Else => "else",
        Token::True => "true",
        Token::False => "false",
        Token::Null => "null",
        Token::EqEq => "==",
        Token::NotEq => "!=",
        Token::LtEq => "<=",
        Token::GtEq => ">=",
        Token::Lt => "<",
        Token::Gt => ">",
        Token::AndAnd => "&&",
        Token::OrOr => "||",
        Token::Bang => "!",
        Token::Assign => "=",
        Token::Plus => "+",
        Token::Minus => "-",
        Token::Star => "*",
        Token::Slash => "/",
        Token::Percent => "%",
        Token::Dot => ".",
        Token::Comma => ",",
        Token::Colon => ":",
        Token::ParenOpen => "(",
        Token::ParenClose => ")",
        Token::BracketOpen => "[",
        Token::BracketClose => "]",
        Token::BraceOpen => "{",
        Token::BraceClose => "}",
        Token::Ident(_) | Token::Str(_) | Token::Int(_) | Token::Float(_) | Token::Sep => "",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens(input: &str) -> Vec<Token> {
        lex(input).unwrap().into_iter().map(|(t, _)| t).collect()
    }

    #[test]
    fn test_string_escapes_match_dsl() {
        assert_eq!(
            tokens(r#"'a\tb\r\n' "q\"""#),
            vec![
                Token::Str("a\tb\r\n".to_string()),
                Token::Str("q\"".to_string()),
            ]
        );
    }

    #[test]
    fn test_keywords_and_operators() {
        assert_eq!(
            tokens("if a >= 1 then b else !c"),
            vec![
                Token::If,
                Token::Ident("a".to_string()),
                Token::GtEq,
                Token::Int(1),
                Token::Then,
                Token::Ident("b".to_string()),
                Token::Else,
                Token::Bang,
                Token::Ident("c".to_string()),
            ]
        );
    }

    #[test]
    fn test_newlines_inside_brackets_are_dropped() {
        assert_eq!(
            tokens("f(\n  1,\n  2\n)\nx"),
            vec![
                Token::Ident("f".to_string()),
                Token::ParenOpen,
                Token::Int(1),
                Token::Comma,
                Token::Int(2),
                Token::ParenClose,
                Token::Sep,
                Token::Ident("x".to_string()),
            ]
        );
    }

    #[test]
    fn test_separator_runs_collapse() {
        assert_eq!(
            tokens("\n\na;\n\n;b # trailing comment\n"),
            vec![
                Token::Ident("a".to_string()),
                Token::Sep,
                Token::Ident("b".to_string()),
                Token::Sep,
            ]
        );
    }

    #[test]
    fn test_stray_character_reported() {
        let errors = lex("a $ b").unwrap_err();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].message().contains("'$'"));
    }
}
