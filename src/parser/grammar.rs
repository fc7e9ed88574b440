//! Parser implementation using chumsky

use chumsky::input::{Stream, ValueInput};
use chumsky::prelude::*;

use crate::error::ParseError;
use crate::parser::ast::*;
use crate::parser::lexer::{lex, Token};

/// Parse DSL source code into an AST
pub fn parse(input: &str) -> Result<TopologyModel, Vec<ParseError>> {
    let len = input.len();

    let tokens = lex(input)?;
    let token_iter = tokens.into_iter().map(|(tok, span)| (tok, span.into()));

    // Turn the token iterator into a stream that chumsky can use
    let token_stream = Stream::from_iter(token_iter)
        // Split (Token, SimpleSpan) into token and span parts
        .map((len..len).into(), |(t, s): (_, _)| (t, s));

    model_parser(input)
        .parse(token_stream)
        .into_result()
        .map_err(|errs| errs.into_iter().map(|e| e.into()).collect())
}

/// Helper to extract span range from chumsky's MapExtra
fn span_range(e: &impl chumsky::span::Span<Offset = usize>) -> std::ops::Range<usize> {
    e.start()..e.end()
}

/// Component types are written verbatim; runs of whitespace collapse to one space
fn normalize_type(raw: &str) -> String {
    raw.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn keyword<'a, I>(word: &str) -> impl Parser<'a, I, (), extra::Err<Rich<'a, Token>>> + Clone
where
    I: ValueInput<'a, Token = Token, Span = SimpleSpan>,
{
    just(Token::Ident(word.to_string())).ignored()
}

/// Property keyword restricted to the keywords valid in `context`
fn property_key<'a, I>(
    context: &'static str,
    allowed: fn(&PropertyKey) -> bool,
) -> impl Parser<'a, I, Spanned<PropertyKey>, extra::Err<Rich<'a, Token>>> + Clone
where
    I: ValueInput<'a, Token = Token, Span = SimpleSpan>,
{
    select! {
        Token::Ident(s) => s,
    }
    .try_map(move |s, span: SimpleSpan| {
        PropertyKey::from_str(&s)
            .filter(|k| allowed(k))
            .map(|k| Spanned::new(k, span_range(&span)))
            .ok_or_else(|| {
                Rich::custom(span, format!("'{}' is not a valid {} property", s, context))
            })
    })
}

fn value_parser<'a, I>(
) -> impl Parser<'a, I, Spanned<PropertyValue>, extra::Err<Rich<'a, Token>>> + Clone
where
    I: ValueInput<'a, Token = Token, Span = SimpleSpan>,
{
    recursive(|value| {
        let scalar = select! {
            Token::String(s) => PropertyValue::String(s),
            // Bare identifiers are string values
            Token::Ident(s) => PropertyValue::String(s),
            Token::Int(n) => PropertyValue::Int(n),
            Token::Float(n) => PropertyValue::Float(n),
            Token::Bool(b) => PropertyValue::Bool(b),
            Token::Code(c) => PropertyValue::Code(c),
        };

        let list = value
            .clone()
            .separated_by(just(Token::Comma))
            .allow_trailing()
            .collect::<Vec<_>>()
            .delimited_by(just(Token::BracketOpen), just(Token::BracketClose))
            .map(PropertyValue::List);

        let member_key = select! {
            Token::Ident(s) => s,
            Token::String(s) => s,
        }
        .map_with(|k, e| Spanned::new(k, span_range(&e.span())));

        let member = member_key
            .then(value)
            .map(|(key, value)| ObjectMember { key, value });

        let object = member
            .separated_by(just(Token::Comma))
            .allow_trailing()
            .collect::<Vec<_>>()
            .delimited_by(just(Token::BraceOpen), just(Token::BraceClose))
            .map(PropertyValue::Object);

        choice((scalar, list, object))
            .map_with(|v, e| Spanned::new(v, span_range(&e.span())))
            .boxed()
    })
}

fn model_parser<'a, I>(
    source: &'a str,
) -> impl Parser<'a, I, TopologyModel, extra::Err<Rich<'a, Token>>> + Clone
where
    I: ValueInput<'a, Token = Token, Span = SimpleSpan>,
{
    let value = value_parser();

    let component_properties = property_list(
        property_key("component", |k| PropertyKey::COMPONENT.contains(k)),
        value.clone(),
    );
    let default_properties = property_list(
        property_key("defaults", PropertyKey::allowed_in_defaults),
        value.clone(),
    );
    let event_properties = property_list(
        property_key("event", |k| PropertyKey::EVENT.contains(k)),
        value,
    );

    let defaults = keyword("defaults")
        .ignore_then(
            default_properties.delimited_by(just(Token::BraceOpen), just(Token::BraceClose)),
        )
        .map_with(|properties, e| Spanned::new(Defaults { properties }, span_range(&e.span())));

    // Component type: identifier words joined by dots or whitespace, captured verbatim
    let word = select! {
        Token::Ident(_) => (),
    };
    let component_type = word
        .clone()
        .then(choice((just(Token::Dot).ignored(), word)).repeated())
        .map_with(move |_, e| {
            let range = span_range(&e.span());
            Spanned::new(normalize_type(&source[range.clone()]), range)
        });

    let component = component_type
        .then(component_properties.delimited_by(just(Token::ParenOpen), just(Token::ParenClose)))
        .map_with(|(component_type, properties), e| {
            Spanned::new(
                ComponentDecl {
                    component_type,
                    properties,
                },
                span_range(&e.span()),
            )
        });

    let components = keyword("components").ignore_then(
        component
            .repeated()
            .collect::<Vec<_>>()
            .delimited_by(just(Token::BraceOpen), just(Token::BraceClose)),
    );

    let event_kind = select! {
        Token::Ident(s) => s,
    }
    .try_map(|s, span: SimpleSpan| {
        EventKind::from_str(&s)
            .map(|k| Spanned::new(k, span_range(&span)))
            .ok_or_else(|| Rich::custom(span, format!("Unknown event type '{}'", s)))
    });

    let event = event_kind
        .then(event_properties.delimited_by(just(Token::ParenOpen), just(Token::ParenClose)))
        .map_with(|(kind, properties), e| {
            Spanned::new(EventDecl { kind, properties }, span_range(&e.span()))
        });

    let events = keyword("events").ignore_then(
        event
            .repeated()
            .collect::<Vec<_>>()
            .delimited_by(just(Token::BraceOpen), just(Token::BraceClose)),
    );

    defaults
        .or_not()
        .then(components)
        .then(events.or_not())
        .then_ignore(end())
        .map(|((defaults, components), events)| TopologyModel {
            defaults,
            components,
            events: events.unwrap_or_default(),
        })
}

/// Sequence of `key value` properties; commas between them are optional (inline form)
fn property_list<'a, I, K, V>(
    key: K,
    value: V,
) -> impl Parser<'a, I, Vec<Spanned<Property>>, extra::Err<Rich<'a, Token>>> + Clone
where
    I: ValueInput<'a, Token = Token, Span = SimpleSpan>,
    K: Parser<'a, I, Spanned<PropertyKey>, extra::Err<Rich<'a, Token>>> + Clone,
    V: Parser<'a, I, Spanned<PropertyValue>, extra::Err<Rich<'a, Token>>> + Clone,
{
    key.then(value)
        .map_with(|(key, value), e| Spanned::new(Property { key, value }, span_range(&e.span())))
        .then_ignore(just(Token::Comma).or_not())
        .repeated()
        .collect::<Vec<_>>()
}
