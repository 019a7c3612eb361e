//! Recursive-descent parser over the restricted grammar.
//!
//! Precedence, low to high: `or`, `and`, comparison, additive,
//! multiplicative, unary, primary. Anything outside this grammar (calls,
//! indexing, attribute access on non-mapping types, imports) simply has no
//! production and fails to parse, so unsupported syntax is rejected at
//! parse time rather than discovered mid-execution.

use crate::ast::{BinaryOp, Expr, Literal, UnaryOp};
use crate::error::ExpressionError;
use crate::lexer::{tokenize, Token};

/// Parse a restricted expression string into an [`Expr`] tree.
pub fn parse(src: &str) -> Result<Expr, ExpressionError> {
    let tokens = tokenize(src)?;
    let mut parser = Parser { tokens, pos: 0 };
    let expr = parser.parse_or()?;
    if parser.pos != parser.tokens.len() {
        return Err(ExpressionError::InvalidExpression(format!(
            "unexpected trailing tokens after position {}",
            parser.pos
        )));
    }
    Ok(expr)
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn advance(&mut self) -> Option<Token> {
        let tok = self.tokens.get(self.pos).cloned();
        self.pos += 1;
        tok
    }

    fn parse_or(&mut self) -> Result<Expr, ExpressionError> {
        let mut lhs = self.parse_and()?;
        while matches!(self.peek(), Some(Token::Or)) {
            self.advance();
            let rhs = self.parse_and()?;
            lhs = Expr::Binary(Box::new(lhs), BinaryOp::Or, Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_and(&mut self) -> Result<Expr, ExpressionError> {
        let mut lhs = self.parse_comparison()?;
        while matches!(self.peek(), Some(Token::And)) {
            self.advance();
            let rhs = self.parse_comparison()?;
            lhs = Expr::Binary(Box::new(lhs), BinaryOp::And, Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_comparison(&mut self) -> Result<Expr, ExpressionError> {
        let lhs = self.parse_additive()?;
        let op = match self.peek() {
            Some(Token::Eq) => Some(BinaryOp::Eq),
            Some(Token::Ne) => Some(BinaryOp::Ne),
            Some(Token::Lt) => Some(BinaryOp::Lt),
            Some(Token::Le) => Some(BinaryOp::Le),
            Some(Token::Gt) => Some(BinaryOp::Gt),
            Some(Token::Ge) => Some(BinaryOp::Ge),
            _ => None,
        };
        let Some(op) = op else {
            return Ok(lhs);
        };
        self.advance();
        let rhs = self.parse_additive()?;
        Ok(Expr::Binary(Box::new(lhs), op, Box::new(rhs)))
    }

    fn parse_additive(&mut self) -> Result<Expr, ExpressionError> {
        let mut lhs = self.parse_multiplicative()?;
        loop {
            let op = match self.peek() {
                Some(Token::Plus) => BinaryOp::Add,
                Some(Token::Minus) => BinaryOp::Sub,
                _ => break,
            };
            self.advance();
            let rhs = self.parse_multiplicative()?;
            lhs = Expr::Binary(Box::new(lhs), op, Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_multiplicative(&mut self) -> Result<Expr, ExpressionError> {
        let mut lhs = self.parse_unary()?;
        loop {
            let op = match self.peek() {
                Some(Token::Star) => BinaryOp::Mul,
                Some(Token::Slash) => BinaryOp::Div,
                Some(Token::Percent) => BinaryOp::Mod,
                _ => break,
            };
            self.advance();
            let rhs = self.parse_unary()?;
            lhs = Expr::Binary(Box::new(lhs), op, Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_unary(&mut self) -> Result<Expr, ExpressionError> {
        match self.peek() {
            Some(Token::Not) => {
                self.advance();
                let operand = self.parse_unary()?;
                Ok(Expr::Unary(UnaryOp::Not, Box::new(operand)))
            }
            Some(Token::Minus) => {
                self.advance();
                let operand = self.parse_unary()?;
                Ok(Expr::Unary(UnaryOp::Neg, Box::new(operand)))
            }
            Some(Token::Plus) => {
                self.advance();
                let operand = self.parse_unary()?;
                Ok(Expr::Unary(UnaryOp::Pos, Box::new(operand)))
            }
            _ => self.parse_primary(),
        }
    }

    fn parse_primary(&mut self) -> Result<Expr, ExpressionError> {
        match self.advance() {
            Some(Token::Int(v)) => Ok(Expr::Literal(Literal::Int(v))),
            Some(Token::Float(v)) => Ok(Expr::Literal(Literal::Float(v))),
            Some(Token::Str(v)) => Ok(Expr::Literal(Literal::Str(v))),
            Some(Token::True) => Ok(Expr::Literal(Literal::Bool(true))),
            Some(Token::False) => Ok(Expr::Literal(Literal::Bool(false))),
            Some(Token::Ident(name)) => {
                let mut path = vec![name];
                while matches!(self.peek(), Some(Token::Dot)) {
                    self.advance();
                    match self.advance() {
                        Some(Token::Ident(part)) => path.push(part),
                        _ => {
                            return Err(ExpressionError::InvalidExpression(
                                "expected identifier after '.'".into(),
                            ))
                        }
                    }
                }
                Ok(Expr::Var(path))
            }
            Some(Token::LParen) => {
                let inner = self.parse_or()?;
                match self.advance() {
                    Some(Token::RParen) => Ok(inner),
                    _ => Err(ExpressionError::InvalidExpression(
                        "expected closing parenthesis".into(),
                    )),
                }
            }
            other => Err(ExpressionError::InvalidExpression(format!(
                "unexpected token: {other:?}"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_simple_comparison() {
        let expr = parse("x > 0").unwrap();
        assert_eq!(
            expr,
            Expr::Binary(
                Box::new(Expr::Var(vec!["x".into()])),
                BinaryOp::Gt,
                Box::new(Expr::Literal(Literal::Int(0)))
            )
        );
    }

    #[test]
    fn parses_and_or_precedence() {
        // `a or b and c` should parse as `a or (b and c)`.
        let expr = parse("a or b and c").unwrap();
        match expr {
            Expr::Binary(_, BinaryOp::Or, rhs) => {
                assert!(matches!(*rhs, Expr::Binary(_, BinaryOp::And, _)));
            }
            other => panic!("unexpected shape: {other:?}"),
        }
    }

    #[test]
    fn parses_parentheses() {
        let expr = parse("(a or b) and c").unwrap();
        match expr {
            Expr::Binary(lhs, BinaryOp::And, _) => {
                assert!(matches!(*lhs, Expr::Binary(_, BinaryOp::Or, _)));
            }
            other => panic!("unexpected shape: {other:?}"),
        }
    }

    #[test]
    fn parses_dotted_path() {
        let expr = parse("a.b.c == 1").unwrap();
        match expr {
            Expr::Binary(lhs, BinaryOp::Eq, _) => {
                assert_eq!(*lhs, Expr::Var(vec!["a".into(), "b".into(), "c".into()]));
            }
            other => panic!("unexpected shape: {other:?}"),
        }
    }

    #[test]
    fn rejects_function_call_syntax() {
        assert!(parse("f(x)").is_err());
    }

    #[test]
    fn rejects_indexing_syntax() {
        assert!(parse("a[0]").is_err());
    }

    #[test]
    fn rejects_trailing_garbage() {
        assert!(parse("x > 0 1").is_err());
    }
}
