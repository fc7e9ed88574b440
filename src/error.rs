//! Error types for parsing and interpretation

use ariadne::{Color, Label, Report, ReportKind, Source};
use chumsky::error::{Rich, RichPattern, RichReason};
use thiserror::Error;

/// Byte range in source text
pub type Span = std::ops::Range<usize>;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ParseError {
    #[error("Parse error at {span:?}: {message}")]
    Syntax {
        span: Span,
        message: String,
        expected: Vec<String>,
    },
}

impl ParseError {
    pub fn span(&self) -> &Span {
        match self {
            ParseError::Syntax { span, .. } => span,
        }
    }

    pub fn message(&self) -> &str {
        match self {
            ParseError::Syntax { message, .. } => message,
        }
    }

    /// 1-based line and column of the error start within `source`
    pub fn location(&self, source: &str) -> (usize, usize) {
        let offset = self.span().start.min(source.len());
        let before = &source[..offset];
        let line = before.matches('\n').count() + 1;
        let column = before
            .rfind('\n')
            .map(|nl| before[nl + 1..].chars().count())
            .unwrap_or_else(|| before.chars().count())
            + 1;
        (line, column)
    }

    /// Format the error with source context using ariadne
    pub fn format(&self, source: &str, filename: &str) -> String {
        let mut buf = Vec::new();
        match self {
            ParseError::Syntax {
                span,
                message,
                expected,
            } => {
                let expected_str = if expected.is_empty() {
                    String::new()
                } else {
                    format!("\nExpected: {}", expected.join(", "))
                };

                let written = Report::build(ReportKind::Error, filename, span.start)
                    .with_message(message)
                    .with_label(
                        Label::new((filename, span.clone()))
                            .with_message(format!("{}{}", message, expected_str))
                            .with_color(Color::Red),
                    )
                    .finish()
                    .write((filename, Source::from(source)), &mut buf);
                if written.is_err() {
                    return format!("{}{}", message, expected_str);
                }
            }
        }
        String::from_utf8_lossy(&buf).into_owned()
    }

    /// Build a syntax error from a chumsky error over any token type
    pub(crate) fn from_rich<T>(err: Rich<'_, T>, describe: fn(&T) -> String) -> Self {
        let message = match err.reason() {
            RichReason::ExpectedFound { found, .. } => {
                let found_str = match found {
                    Some(tok) => describe(tok),
                    None => "end of input".to_string(),
                };
                format!("Unexpected {}", found_str)
            }
            RichReason::Custom(msg) => msg.to_string(),
        };

        let expected: Vec<String> = err
            .expected()
            .filter_map(|e| match e {
                RichPattern::Token(tok) => Some(describe(tok)),
                RichPattern::Label(label) => Some(label.to_string()),
                RichPattern::EndOfInput => Some("end of input".to_string()),
                RichPattern::Identifier(s) => Some(format!("identifier '{}'", s)),
                RichPattern::Any => Some("any token".to_string()),
                RichPattern::SomethingElse => None,
            })
            .collect();

        ParseError::Syntax {
            span: err.span().into_range(),
            message,
            expected,
        }
    }
}

impl<'a> From<Rich<'a, crate::parser::lexer::Token>> for ParseError {
    fn from(err: Rich<'a, crate::parser::lexer::Token>) -> Self {
        ParseError::from_rich(err, format_token)
    }
}

/// Format a token for human-readable error messages
fn format_token(tok: &crate::parser::lexer::Token) -> String {
    use crate::parser::lexer::Token;
    match tok {
        Token::Ident(s) => format!("identifier '{}'", s),
        Token::String(s) => format!("string \"{}\"", s),
        Token::Int(n) => format!("number {}", n),
        Token::Float(n) => format!("number {}", n),
        Token::Bool(b) => format!("boolean {}", b),
        Token::Code(_) => "code block".to_string(),
        Token::BraceOpen => "'{'".to_string(),
        Token::BraceClose => "'}'".to_string(),
        Token::ParenOpen => "'('".to_string(),
        Token::ParenClose => "')'".to_string(),
        Token::BracketOpen => "'['".to_string(),
        Token::BracketClose => "']'".to_string(),
        Token::Comma => "','".to_string(),
        Token::Dot => "'.'".to_string(),
        Token::LineComment => "comment".to_string(),
    }
}

/// Errors raised while interpreting a parsed model. All of them abort the run.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SemanticError {
    #[error("Property '{property}' is required on `{element}`.")]
    MissingProperty { property: String, element: String },

    #[error("Expected {expected} type for '{property}', but was {found} on `{source_name}`.")]
    TypeMismatch {
        property: String,
        expected: &'static str,
        found: &'static str,
        source_name: String,
    },

    #[error("Invalid value for '{property}' on `{element}`: {reason}")]
    InvalidValue {
        property: String,
        element: String,
        reason: String,
    },

    #[error("Failed to find related component '{target}'. Reference from component {component}.")]
    UnresolvedRelation { target: String, component: String },

    #[error("Component '{uid}' already exists.")]
    DuplicateComponent { uid: String },

    #[error("Relation '{external_id}' already exists.")]
    DuplicateRelation { external_id: String },

    #[error("Ambiguous name '{name}': {count} components share it.")]
    AmbiguousName { name: String, count: usize },

    #[error("Event `{event}` requires a non-empty 'identifiers' list.")]
    EmptyIdentifiers { event: String },

    #[error("Malformed link '{link}' on event `{event}`; expected '[description](url)'.")]
    MalformedLink { link: String, event: String },

    #[error("Invalid health state '{state}' on `{element}`; expected CLEAR, DEVIATING or CRITICAL.")]
    InvalidHealthState { state: String, element: String },

    #[error(
        "Failed to evaluate property '{property}' on `{element}`. Expression |\n {expression} \n |.\n Errors:\n {}",
        errors.join("\n ")
    )]
    Evaluation {
        property: String,
        element: String,
        expression: String,
        errors: Vec<String>,
    },
}
