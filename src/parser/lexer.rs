//! Lexer for the topology DSL using logos

use logos::Logos;

use crate::error::ParseError;

/// Byte range in source text
pub type Span = std::ops::Range<usize>;

#[derive(Logos, Debug, Clone, PartialEq)]
#[logos(skip r"[ \t\n\r\f]+")]
pub enum Token {
    // Delimiters
    #[token("{")]
    BraceOpen,
    #[token("}")]
    BraceClose,
    #[token("(")]
    ParenOpen,
    #[token(")")]
    ParenClose,
    #[token("[")]
    BracketOpen,
    #[token("]")]
    BracketClose,
    #[token(",")]
    Comma,
    #[token(".")]
    Dot,

    #[token("true", |_| true)]
    #[token("True", |_| true)]
    #[token("false", |_| false)]
    #[token("False", |_| false)]
    Bool(bool),

    // Literals - identifiers must come after keywords
    #[regex(r"[a-zA-Z_][a-zA-Z0-9_]*", |lex| lex.slice().to_string(), priority = 1)]
    Ident(String),

    #[regex(r#""([^"\\]|\\.)*""#, |lex| unescape(lex.slice()))]
    #[regex(r#"'([^'\\]|\\.)*'"#, |lex| unescape(lex.slice()))]
    String(String),

    #[regex(r"-?[0-9]+", |lex| lex.slice().parse::<i64>().ok())]
    Int(i64),

    #[regex(r"-?[0-9]+\.[0-9]+([eE][+-]?[0-9]+)?", |lex| lex.slice().parse::<f64>().ok())]
    #[regex(r"-?[0-9]+[eE][+-]?[0-9]+", |lex| lex.slice().parse::<f64>().ok())]
    Float(f64),

    /// Fenced code block; the body between the fences is kept verbatim
    #[token("```", code_block)]
    Code(String),

    #[regex(r"#[^\n]*", logos::skip)]
    LineComment,
}

/// Consume everything up to the closing fence. An unterminated block is a lex error.
fn code_block(lex: &mut logos::Lexer<Token>) -> Option<String> {
    let rest = lex.remainder();
    let end = rest.find("```")?;
    let body = rest[..end].to_string();
    lex.bump(end + 3);
    Some(body)
}

/// Strip the quotes of a string literal and resolve escapes.
/// Shared by the DSL and sandbox lexers.
pub(crate) fn unescape(quoted: &str) -> String {
    let inner = &quoted[1..quoted.len() - 1];
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('r') => out.push('\r'),
            Some(other) => out.push(other),
            None => out.push('\\'),
        }
    }
    out
}

/// Lex input string into tokens with spans.
///
/// Unlike a plain token iterator this reports every unrecognized slice, so that
/// an unterminated code block or a stray character surfaces as a syntax error.
pub fn lex(input: &str) -> Result<Vec<(Token, Span)>, Vec<ParseError>> {
    let mut tokens = Vec::new();
    let mut errors = Vec::new();

    for (tok, span) in Token::lexer(input).spanned() {
        match tok {
            Ok(t) => tokens.push((t, span)),
            Err(()) => {
                let error = lex_error(input, span);
                let unterminated = error.message() == UNTERMINATED_CODE_BLOCK;
                errors.push(error);
                // The rest of the input belongs to the open block
                if unterminated {
                    break;
                }
            }
        }
    }

    if errors.is_empty() {
        Ok(tokens)
    } else {
        Err(errors)
    }
}

const UNTERMINATED_CODE_BLOCK: &str = "Unterminated code block";

fn lex_error(input: &str, span: Span) -> ParseError {
    let text = &input[span.clone()];
    let message = if text.starts_with("```") {
        UNTERMINATED_CODE_BLOCK.to_string()
    } else if text.starts_with(|c: char| c.is_ascii_digit() || c == '-') {
        format!("Invalid number '{}'", text)
    } else {
        format!("Unexpected character(s) '{}'", text)
    };
    ParseError::Syntax {
        span,
        message,
        expected: vec![],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens(input: &str) -> Vec<Token> {
        lex(input)
            .expect("Should lex")
            .into_iter()
            .map(|(t, _)| t)
            .collect()
    }

    #[test]
    fn test_delimiters() {
        assert_eq!(
            tokens("{ } ( ) [ ] , ."),
            vec![
                Token::BraceOpen,
                Token::BraceClose,
                Token::ParenOpen,
                Token::ParenClose,
                Token::BracketOpen,
                Token::BracketClose,
                Token::Comma,
                Token::Dot,
            ]
        );
    }

    #[test]
    fn test_identifiers_and_strings() {
        assert_eq!(
            tokens(r#"name "web 1" 'db'"#),
            vec![
                Token::Ident("name".to_string()),
                Token::String("web 1".to_string()),
                Token::String("db".to_string()),
            ]
        );
    }

    #[test]
    fn test_string_escapes() {
        assert_eq!(
            tokens(r#""a\"b\\c\n""#),
            vec![Token::String("a\"b\\c\n".to_string())]
        );
    }

    #[test]
    fn test_numbers() {
        assert_eq!(
            tokens("42 -3 3.5 -0.25 1e3"),
            vec![
                Token::Int(42),
                Token::Int(-3),
                Token::Float(3.5),
                Token::Float(-0.25),
                Token::Float(1000.0),
            ]
        );
    }

    #[test]
    fn test_booleans() {
        assert_eq!(
            tokens("true False trueish"),
            vec![
                Token::Bool(true),
                Token::Bool(false),
                Token::Ident("trueish".to_string()),
            ]
        );
    }

    #[test]
    fn test_comments_skipped() {
        assert_eq!(
            tokens("components # the section\n{ }"),
            vec![
                Token::Ident("components".to_string()),
                Token::BraceOpen,
                Token::BraceClose,
            ]
        );
    }

    #[test]
    fn test_code_block_verbatim() {
        let input = "processor ```\n  component.add_label(\"x\") # keep\n```";
        assert_eq!(
            tokens(input),
            vec![
                Token::Ident("processor".to_string()),
                Token::Code("\n  component.add_label(\"x\") # keep\n".to_string()),
            ]
        );
    }

    #[test]
    fn test_unterminated_code_block() {
        let errors = lex("name ```1 + 2").unwrap_err();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].to_string().contains("Unterminated code block"));
    }

    #[test]
    fn test_unterminated_code_block_stops_lexing() {
        let errors = lex("components { Host(name ```'a' + @ ) }").unwrap_err();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].span(), &(23..26));
    }

    #[test]
    fn test_unexpected_character() {
        let errors = lex("name @").unwrap_err();
        assert!(errors[0].to_string().contains("'@'"));
    }

    #[test]
    fn test_spans() {
        let lexed = lex("id \"x\"").unwrap();
        assert_eq!(lexed[0].1, 0..2);
        assert_eq!(lexed[1].1, 3..6);
    }
}
