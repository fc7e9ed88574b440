//! Expression parser using chumsky

use chumsky::input::{Stream, ValueInput};
use chumsky::prelude::*;

use crate::error::ParseError;
use crate::sandbox::ast::*;
use crate::sandbox::lexer::{describe, lex, Token};
use crate::value::Value;

/// Parse an expression block into statements
pub fn parse(input: &str) -> Result<Block, Vec<ParseError>> {
    let len = input.len();

    let tokens = lex(input)?;
    let token_iter = tokens.into_iter().map(|(tok, span)| (tok, span.into()));
    let token_stream = Stream::from_iter(token_iter).map((len..len).into(), |(t, s): (_, _)| (t, s));

    block_parser()
        .parse(token_stream)
        .into_result()
        .map_err(|errs| {
            errs.into_iter()
                .map(|e| ParseError::from_rich(e, describe))
                .collect()
        })
}

enum Postfix {
    Attr(String),
    Index(Expr),
    Call(Vec<Expr>),
}

fn block_parser<'a, I>() -> impl Parser<'a, I, Block, extra::Err<Rich<'a, Token>>>
where
    I: ValueInput<'a, Token = Token, Span = SimpleSpan>,
{
    let expr = expr_parser();
    let name = select! { Token::Ident(s) => s };

    let assign = name
        .then_ignore(just(Token::Assign))
        .then(expr.clone())
        .map(|(name, value)| Stmt::Assign(name, value));
    let statement = assign.or(expr.map(Stmt::Expr));

    statement
        .separated_by(just(Token::Sep))
        .allow_leading()
        .allow_trailing()
        .collect::<Vec<_>>()
        .then_ignore(end())
        .map(|statements| Block { statements })
}

fn expr_parser<'a, I>() -> impl Parser<'a, I, Expr, extra::Err<Rich<'a, Token>>> + Clone
where
    I: ValueInput<'a, Token = Token, Span = SimpleSpan>,
{
    recursive(|expr| {
        let literal = select! {
            Token::Int(n) => Expr::Literal(Value::Int(n)),
            Token::Float(x) => Expr::Literal(Value::Float(x)),
            Token::Str(s) => Expr::Literal(Value::String(s)),
            Token::True => Expr::Literal(Value::Bool(true)),
            Token::False => Expr::Literal(Value::Bool(false)),
            Token::Null => Expr::Literal(Value::Null),
        };
        let name = select! { Token::Ident(s) => s };

        let items = expr
            .clone()
            .separated_by(just(Token::Comma))
            .allow_trailing()
            .collect::<Vec<_>>();

        let list = items
            .clone()
            .delimited_by(just(Token::BracketOpen), just(Token::BracketClose))
            .map(Expr::List);

        let map_key = select! {
            Token::Ident(s) => s,
            Token::Str(s) => s,
        };
        let map = map_key
            .then_ignore(just(Token::Colon))
            .then(expr.clone())
            .separated_by(just(Token::Comma))
            .allow_trailing()
            .collect::<Vec<_>>()
            .delimited_by(just(Token::BraceOpen), just(Token::BraceClose))
            .map(Expr::Map);

        let conditional = just(Token::If)
            .ignore_then(expr.clone())
            .then_ignore(just(Token::Then))
            .then(expr.clone())
            .then_ignore(just(Token::Else))
            .then(expr.clone())
            .map(|((cond, then), otherwise)| Expr::If {
                cond: Box::new(cond),
                then: Box::new(then),
                otherwise: Box::new(otherwise),
            });

        let parenthesized = expr
            .clone()
            .delimited_by(just(Token::ParenOpen), just(Token::ParenClose));

        let atom = choice((
            literal,
            conditional,
            name.clone().map(Expr::Name),
            list,
            map,
            parenthesized,
        ))
        .boxed();

        // Postfix: attribute access, indexing and calls, left to right
        let postfix = choice((
            just(Token::Dot).ignore_then(name).map(Postfix::Attr),
            expr.clone()
                .delimited_by(just(Token::BracketOpen), just(Token::BracketClose))
                .map(Postfix::Index),
            items
                .delimited_by(just(Token::ParenOpen), just(Token::ParenClose))
                .map(Postfix::Call),
        ));
        let access = atom
            .foldl(postfix.repeated(), |base, op| match op {
                Postfix::Attr(attr) => Expr::Attr(Box::new(base), attr),
                Postfix::Index(index) => Expr::Index(Box::new(base), Box::new(index)),
                Postfix::Call(args) => Expr::Call(Box::new(base), args),
            })
            .boxed();

        let unary = choice((
            just(Token::Minus).to(UnaryOp::Neg),
            just(Token::Bang).to(UnaryOp::Not),
        ))
        .repeated()
        .foldr(access, |op, operand| Expr::Unary(op, Box::new(operand)))
        .boxed();

        let product = unary
            .clone()
            .foldl(
                choice((
                    just(Token::Star).to(BinaryOp::Mul),
                    just(Token::Slash).to(BinaryOp::Div),
                    just(Token::Percent).to(BinaryOp::Rem),
                ))
                .then(unary)
                .repeated(),
                |left, (op, right)| Expr::binary(left, op, right),
            )
            .boxed();

        let sum = product
            .clone()
            .foldl(
                choice((
                    just(Token::Plus).to(BinaryOp::Add),
                    just(Token::Minus).to(BinaryOp::Sub),
                ))
                .then(product)
                .repeated(),
                |left, (op, right)| Expr::binary(left, op, right),
            )
            .boxed();

        let comparison = sum
            .clone()
            .foldl(
                choice((
                    just(Token::LtEq).to(BinaryOp::Le),
                    just(Token::GtEq).to(BinaryOp::Ge),
                    just(Token::Lt).to(BinaryOp::Lt),
                    just(Token::Gt).to(BinaryOp::Gt),
                ))
                .then(sum)
                .repeated(),
                |left, (op, right)| Expr::binary(left, op, right),
            )
            .boxed();

        let equality = comparison
            .clone()
            .foldl(
                choice((
                    just(Token::EqEq).to(BinaryOp::Eq),
                    just(Token::NotEq).to(BinaryOp::Ne),
                ))
                .then(comparison)
                .repeated(),
                |left, (op, right)| Expr::binary(left, op, right),
            )
            .boxed();

        let conjunction = equality
            .clone()
            .foldl(
                just(Token::AndAnd).to(BinaryOp::And).then(equality).repeated(),
                |left, (op, right)| Expr::binary(left, op, right),
            )
            .boxed();

        conjunction
            .clone()
            .foldl(
                just(Token::OrOr).to(BinaryOp::Or).then(conjunction).repeated(),
                |left, (op, right)| Expr::binary(left, op, right),
            )
            .boxed()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn single(input: &str) -> Expr {
        let block = parse(input).expect("Should parse");
        assert_eq!(block.statements.len(), 1);
        match block.statements.into_iter().next() {
            Some(Stmt::Expr(e)) => e,
            other => panic!("expected expression, got {:?}", other),
        }
    }

    fn int(n: i64) -> Expr {
        Expr::Literal(Value::Int(n))
    }

    #[test]
    fn test_precedence() {
        assert_eq!(
            single("1 + 2 * 3"),
            Expr::binary(int(1), BinaryOp::Add, Expr::binary(int(2), BinaryOp::Mul, int(3)))
        );
    }

    #[test]
    fn test_left_associative_subtraction() {
        assert_eq!(
            single("5 - 2 - 1"),
            Expr::binary(Expr::binary(int(5), BinaryOp::Sub, int(2)), BinaryOp::Sub, int(1))
        );
    }

    #[test]
    fn test_unary_binds_tighter_than_product() {
        assert_eq!(
            single("-2 * 3"),
            Expr::binary(
                Expr::Unary(UnaryOp::Neg, Box::new(int(2))),
                BinaryOp::Mul,
                int(3)
            )
        );
    }

    #[test]
    fn test_method_call_chain() {
        let expr = single("component.name.to_upper()");
        assert_eq!(
            expr,
            Expr::Call(
                Box::new(Expr::Attr(
                    Box::new(Expr::Attr(
                        Box::new(Expr::Name("component".to_string())),
                        "name".to_string()
                    )),
                    "to_upper".to_string()
                )),
                vec![]
            )
        );
    }

    #[test]
    fn test_conditional_and_collections() {
        let expr = single("if x then [1, 2][0] else {a: 1, 'b c': 2}");
        assert!(matches!(expr, Expr::If { .. }));
    }

    #[test]
    fn test_statements_and_assignment() {
        let block = parse("x = 1\ny = x + 1; y\n").unwrap();
        assert_eq!(block.statements.len(), 3);
        assert!(matches!(&block.statements[0], Stmt::Assign(n, _) if n == "x"));
        assert!(matches!(&block.statements[2], Stmt::Expr(Expr::Name(n)) if n == "y"));
    }

    #[test]
    fn test_empty_block() {
        assert!(parse("\n  \n").unwrap().statements.is_empty());
    }

    #[test]
    fn test_multiline_call() {
        let block = parse("component.set_property(\n  'k',\n  1\n)").unwrap();
        assert_eq!(block.statements.len(), 1);
    }

    #[test]
    fn test_incomplete_expression_is_error() {
        let errors = parse("1 +").unwrap_err();
        assert!(!errors.is_empty());
    }
}
