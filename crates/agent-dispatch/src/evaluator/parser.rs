//! Recursive-descent parser producing the statement tree.

use super::{
    ScriptError,
    lexer::{Spanned, Token, tokenize},
};
use serde_json::Value;

/// Maximum nesting depth of statements, expressions and literals.
///
/// Every level costs a handful of recursive frames in both the parser and the
/// interpreter, so the limit keeps both well within a 2 MiB thread stack.
pub(super) const MAX_DEPTH: usize = 64;

#[derive(Debug, Clone, PartialEq)]
pub(super) enum Stmt {
    Declare(Vec<(String, Option<Expr>)>),
    Expr(Expr),
    If(Expr, Box<Stmt>, Option<Box<Stmt>>),
    While(Expr, Box<Stmt>),
    For {
        init: Option<Box<Stmt>>,
        test: Option<Expr>,
        update: Option<Expr>,
        body: Box<Stmt>,
    },
    ForOf(String, Expr, Box<Stmt>),
    Block(Vec<Stmt>),
    Return(Option<Expr>),
    Throw(Expr),
    Try {
        body: Vec<Stmt>,
        param: Option<String>,
        handler: Option<Vec<Stmt>>,
        finalizer: Option<Vec<Stmt>>,
    },
    Break,
    Continue,
    Empty,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Pow,
    Eq,
    NotEq,
    StrictEq,
    StrictNotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum LogicalOp {
    And,
    Or,
    Coalesce,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum UnaryOp {
    Not,
    Neg,
    Plus,
    TypeOf,
}

#[derive(Debug, Clone, PartialEq)]
pub(super) enum Expr {
    Literal(Value),
    Undefined,
    Ident(String),
    Array(Vec<Expr>),
    Object(Vec<(String, Expr)>),
    Member {
        object: Box<Expr>,
        property: Box<Expr>,
        optional: bool,
    },
    Call(Box<Expr>, Vec<Expr>),
    Unary(UnaryOp, Box<Expr>),
    Binary(BinaryOp, Box<Expr>, Box<Expr>),
    Logical(LogicalOp, Box<Expr>, Box<Expr>),
    Conditional(Box<Expr>, Box<Expr>, Box<Expr>),
    Assign(Option<BinaryOp>, Box<Expr>, Box<Expr>),
    Update {
        target: Box<Expr>,
        delta: f64,
        prefix: bool,
    },
}

/// Parses the source into a list of statements.
pub(super) fn parse(source: &str) -> Result<Vec<Stmt>, ScriptError> {
    let tokens = tokenize(source)?;
    let mut parser = Parser {
        tokens,
        pos: 0,
        depth: 0,
    };
    let mut program = Vec::new();
    while !parser.at_eof() {
        program.push(parser.statement()?);
    }
    Ok(program)
}

struct Parser {
    tokens: Vec<Spanned>,
    pos: usize,
    depth: usize,
}

impl Parser {
    fn peek(&self) -> &Token {
        &self.tokens[self.pos.min(self.tokens.len() - 1)].token
    }

    fn peek_at(&self, offset: usize) -> &Token {
        &self.tokens[(self.pos + offset).min(self.tokens.len() - 1)].token
    }

    fn line(&self) -> usize {
        self.tokens[self.pos.min(self.tokens.len() - 1)].line
    }

    fn at_eof(&self) -> bool {
        matches!(self.peek(), Token::Eof)
    }

    fn advance(&mut self) -> Token {
        let token = self.peek().clone();
        if !matches!(token, Token::Eof) {
            self.pos += 1;
        }
        token
    }

    fn is_punct(&self, punct: &str) -> bool {
        matches!(self.peek(), Token::Punct(p) if *p == punct)
    }

    fn is_keyword(&self, keyword: &str) -> bool {
        matches!(self.peek(), Token::Ident(name) if name == keyword)
    }

    fn eat_punct(&mut self, punct: &str) -> bool {
        if self.is_punct(punct) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn eat_keyword(&mut self, keyword: &str) -> bool {
        if self.is_keyword(keyword) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect_punct(&mut self, punct: &str) -> Result<(), ScriptError> {
        if self.eat_punct(punct) {
            Ok(())
        } else {
            Err(self.unexpected(&format!("`{punct}`")))
        }
    }

    fn expect_ident(&mut self) -> Result<String, ScriptError> {
        match self.peek() {
            Token::Ident(name) if !is_reserved(name) => {
                let name = name.clone();
                self.pos += 1;
                Ok(name)
            }
            _ => Err(self.unexpected("an identifier")),
        }
    }

    fn unexpected(&self, expected: &str) -> ScriptError {
        let found = match self.peek() {
            Token::Number(n) => format!("number `{n}`"),
            Token::Str(s) => format!("string \"{s}\""),
            Token::Ident(name) => format!("`{name}`"),
            Token::Punct(p) => format!("`{p}`"),
            Token::Eof => "end of input".to_owned(),
        };
        ScriptError::syntax(self.line(), format!("expected {expected} but found {found}"))
    }

    fn enter(&mut self) -> Result<(), ScriptError> {
        self.depth += 1;
        if self.depth > MAX_DEPTH {
            Err(ScriptError::syntax(self.line(), "maximum nesting depth exceeded"))
        } else {
            Ok(())
        }
    }

    fn leave(&mut self) {
        self.depth -= 1;
    }

    fn end_statement(&mut self) -> Result<(), ScriptError> {
        if self.eat_punct(";") || self.is_punct("}") || self.at_eof() {
            return Ok(());
        }
        let previous_line = self.tokens[self.pos.saturating_sub(1)].line;
        if self.line() > previous_line {
            Ok(())
        } else {
            Err(self.unexpected("`;`"))
        }
    }

    fn statement(&mut self) -> Result<Stmt, ScriptError> {
        self.enter()?;
        let stmt = self.statement_inner();
        self.leave();
        stmt
    }

    fn statement_inner(&mut self) -> Result<Stmt, ScriptError> {
        if self.eat_punct(";") {
            return Ok(Stmt::Empty);
        }
        if self.is_punct("{") {
            return Ok(Stmt::Block(self.block()?));
        }
        let keyword = match self.peek() {
            Token::Ident(name) => name.clone(),
            _ => String::new(),
        };
        match keyword.as_str() {
            "let" | "const" | "var" => {
                let stmt = self.declaration()?;
                self.end_statement()?;
                Ok(stmt)
            }
            "if" => {
                self.pos += 1;
                self.expect_punct("(")?;
                let test = self.expression()?;
                self.expect_punct(")")?;
                let consequent = Box::new(self.statement()?);
                let alternate = if self.eat_keyword("else") {
                    Some(Box::new(self.statement()?))
                } else {
                    None
                };
                Ok(Stmt::If(test, consequent, alternate))
            }
            "while" => {
                self.pos += 1;
                self.expect_punct("(")?;
                let test = self.expression()?;
                self.expect_punct(")")?;
                Ok(Stmt::While(test, Box::new(self.statement()?)))
            }
            "for" => {
                self.pos += 1;
                self.for_statement()
            }
            "return" => {
                self.pos += 1;
                let argument = if self.is_punct(";") || self.is_punct("}") || self.at_eof() {
                    None
                } else {
                    Some(self.expression()?)
                };
                self.end_statement()?;
                Ok(Stmt::Return(argument))
            }
            "throw" => {
                self.pos += 1;
                let argument = self.expression()?;
                self.end_statement()?;
                Ok(Stmt::Throw(argument))
            }
            "try" => {
                self.pos += 1;
                self.try_statement()
            }
            "break" => {
                self.pos += 1;
                self.end_statement()?;
                Ok(Stmt::Break)
            }
            "continue" => {
                self.pos += 1;
                self.end_statement()?;
                Ok(Stmt::Continue)
            }
            "function" | "class" | "async" | "await" | "import" | "export" => Err(
                ScriptError::syntax(self.line(), format!("`{keyword}` is not supported")),
            ),
            _ => {
                let expr = self.expression()?;
                self.end_statement()?;
                Ok(Stmt::Expr(expr))
            }
        }
    }

    fn block(&mut self) -> Result<Vec<Stmt>, ScriptError> {
        self.expect_punct("{")?;
        let mut body = Vec::new();
        while !self.is_punct("}") {
            if self.at_eof() {
                return Err(self.unexpected("`}`"));
            }
            body.push(self.statement()?);
        }
        self.pos += 1;
        Ok(body)
    }

    fn declaration(&mut self) -> Result<Stmt, ScriptError> {
        self.pos += 1;
        let mut bindings = Vec::new();
        loop {
            let name = self.expect_ident()?;
            let init = if self.eat_punct("=") {
                Some(self.assignment()?)
            } else {
                None
            };
            bindings.push((name, init));
            if !self.eat_punct(",") {
                break;
            }
        }
        Ok(Stmt::Declare(bindings))
    }

    fn for_statement(&mut self) -> Result<Stmt, ScriptError> {
        self.expect_punct("(")?;
        let is_declaration = matches!(self.peek(), Token::Ident(k) if matches!(k.as_str(), "let" | "const" | "var"));
        if is_declaration && matches!(self.peek_at(2), Token::Ident(k) if k == "of") {
            self.pos += 1;
            let name = self.expect_ident()?;
            self.pos += 1;
            let iterable = self.expression()?;
            self.expect_punct(")")?;
            let body = Box::new(self.statement()?);
            return Ok(Stmt::ForOf(name, iterable, body));
        }
        let init = if self.is_punct(";") {
            None
        } else if is_declaration {
            Some(Box::new(self.declaration()?))
        } else {
            Some(Box::new(Stmt::Expr(self.expression()?)))
        };
        self.expect_punct(";")?;
        let test = if self.is_punct(";") {
            None
        } else {
            Some(self.expression()?)
        };
        self.expect_punct(";")?;
        let update = if self.is_punct(")") {
            None
        } else {
            Some(self.expression()?)
        };
        self.expect_punct(")")?;
        let body = Box::new(self.statement()?);
        Ok(Stmt::For {
            init,
            test,
            update,
            body,
        })
    }

    fn try_statement(&mut self) -> Result<Stmt, ScriptError> {
        let body = self.block()?;
        let mut param = None;
        let handler = if self.eat_keyword("catch") {
            if self.eat_punct("(") {
                param = Some(self.expect_ident()?);
                self.expect_punct(")")?;
            }
            Some(self.block()?)
        } else {
            None
        };
        let finalizer = if self.eat_keyword("finally") {
            Some(self.block()?)
        } else {
            None
        };
        if handler.is_none() && finalizer.is_none() {
            return Err(self.unexpected("`catch` or `finally`"));
        }
        Ok(Stmt::Try {
            body,
            param,
            handler,
            finalizer,
        })
    }

    fn expression(&mut self) -> Result<Expr, ScriptError> {
        self.enter()?;
        let expr = self.assignment();
        self.leave();
        expr
    }

    fn assignment(&mut self) -> Result<Expr, ScriptError> {
        let target = self.conditional()?;
        let op = match self.peek() {
            Token::Punct("=") => None,
            Token::Punct("+=") => Some(BinaryOp::Add),
            Token::Punct("-=") => Some(BinaryOp::Sub),
            Token::Punct("*=") => Some(BinaryOp::Mul),
            Token::Punct("/=") => Some(BinaryOp::Div),
            Token::Punct("%=") => Some(BinaryOp::Rem),
            _ => return Ok(target),
        };
        if !is_assignable(&target) {
            return Err(ScriptError::syntax(
                self.line(),
                "invalid left-hand side in assignment",
            ));
        }
        self.pos += 1;
        let value = self.expression()?;
        Ok(Expr::Assign(op, Box::new(target), Box::new(value)))
    }

    fn conditional(&mut self) -> Result<Expr, ScriptError> {
        let test = self.binary(0)?;
        if !self.eat_punct("?") {
            return Ok(test);
        }
        let consequent = self.expression()?;
        self.expect_punct(":")?;
        let alternate = self.expression()?;
        Ok(Expr::Conditional(
            Box::new(test),
            Box::new(consequent),
            Box::new(alternate),
        ))
    }

    /// Precedence climbing over the binary and logical operators.
    fn binary(&mut self, min_precedence: u8) -> Result<Expr, ScriptError> {
        let mut left = self.unary()?;
        loop {
            let Token::Punct(punct) = self.peek() else {
                break;
            };
            let Some((precedence, operator)) = binary_operator(punct) else {
                break;
            };
            if precedence < min_precedence {
                break;
            }
            self.pos += 1;
            // `**` is right-associative.
            let next_precedence = if punct_is_pow(&operator) {
                precedence
            } else {
                precedence + 1
            };
            self.enter()?;
            let right = self.binary(next_precedence);
            self.leave();
            let right = right?;
            left = match operator {
                Operator::Binary(op) => Expr::Binary(op, Box::new(left), Box::new(right)),
                Operator::Logical(op) => Expr::Logical(op, Box::new(left), Box::new(right)),
            };
        }
        Ok(left)
    }

    fn unary(&mut self) -> Result<Expr, ScriptError> {
        let op = match self.peek() {
            Token::Punct("!") => Some(UnaryOp::Not),
            Token::Punct("-") => Some(UnaryOp::Neg),
            Token::Punct("+") => Some(UnaryOp::Plus),
            Token::Ident(name) if name == "typeof" => Some(UnaryOp::TypeOf),
            _ => None,
        };
        if let Some(op) = op {
            self.pos += 1;
            self.enter()?;
            let argument = self.unary();
            self.leave();
            return Ok(Expr::Unary(op, Box::new(argument?)));
        }
        if self.is_punct("++") || self.is_punct("--") {
            let delta = if self.is_punct("++") { 1.0 } else { -1.0 };
            self.pos += 1;
            self.enter()?;
            let target = self.unary();
            self.leave();
            let target = target?;
            if !is_assignable(&target) {
                return Err(ScriptError::syntax(
                    self.line(),
                    "invalid operand for prefix update",
                ));
            }
            return Ok(Expr::Update {
                target: Box::new(target),
                delta,
                prefix: true,
            });
        }
        if self.eat_keyword("new") {
            return self.postfix();
        }
        self.postfix()
    }

    fn postfix(&mut self) -> Result<Expr, ScriptError> {
        let mut expr = self.primary()?;
        loop {
            if self.eat_punct(".") || self.is_punct("?.") {
                let optional = self.eat_punct("?.");
                let name = match self.advance() {
                    Token::Ident(name) => name,
                    _ => {
                        self.pos -= 1;
                        return Err(self.unexpected("a property name"));
                    }
                };
                expr = Expr::Member {
                    object: Box::new(expr),
                    property: Box::new(Expr::Literal(Value::String(name))),
                    optional,
                };
            } else if self.eat_punct("[") {
                let property = self.expression()?;
                self.expect_punct("]")?;
                expr = Expr::Member {
                    object: Box::new(expr),
                    property: Box::new(property),
                    optional: false,
                };
            } else if self.eat_punct("(") {
                let mut args = Vec::new();
                while !self.is_punct(")") {
                    args.push(self.assignment()?);
                    if !self.eat_punct(",") {
                        break;
                    }
                }
                self.expect_punct(")")?;
                expr = Expr::Call(Box::new(expr), args);
            } else if (self.is_punct("++") || self.is_punct("--")) && is_assignable(&expr) {
                let delta = if self.is_punct("++") { 1.0 } else { -1.0 };
                self.pos += 1;
                return Ok(Expr::Update {
                    target: Box::new(expr),
                    delta,
                    prefix: false,
                });
            } else {
                return Ok(expr);
            }
        }
    }

    fn primary(&mut self) -> Result<Expr, ScriptError> {
        self.enter()?;
        let expr = self.primary_inner();
        self.leave();
        expr
    }

    fn primary_inner(&mut self) -> Result<Expr, ScriptError> {
        let line = self.line();
        match self.advance() {
            Token::Number(n) => Ok(Expr::Literal(number_literal(n))),
            Token::Str(s) => Ok(Expr::Literal(Value::String(s))),
            Token::Ident(name) => match name.as_str() {
                "true" => Ok(Expr::Literal(Value::Bool(true))),
                "false" => Ok(Expr::Literal(Value::Bool(false))),
                "null" => Ok(Expr::Literal(Value::Null)),
                "undefined" => Ok(Expr::Undefined),
                _ if is_reserved(&name) => {
                    self.pos -= 1;
                    Err(self.unexpected("an expression"))
                }
                _ => Ok(Expr::Ident(name)),
            },
            Token::Punct("(") => {
                let expr = self.expression()?;
                self.expect_punct(")")?;
                Ok(expr)
            }
            Token::Punct("[") => {
                let mut items = Vec::new();
                while !self.is_punct("]") {
                    items.push(self.assignment()?);
                    if !self.eat_punct(",") {
                        break;
                    }
                }
                self.expect_punct("]")?;
                Ok(Expr::Array(items))
            }
            Token::Punct("{") => self.object_literal(),
            Token::Eof => Err(ScriptError::syntax(line, "unexpected end of input")),
            _ => {
                self.pos -= 1;
                Err(self.unexpected("an expression"))
            }
        }
    }

    fn object_literal(&mut self) -> Result<Expr, ScriptError> {
        let mut properties = Vec::new();
        while !self.is_punct("}") {
            let key = match self.advance() {
                Token::Ident(name) => name,
                Token::Str(s) => s,
                Token::Number(n) => number_literal(n).to_string(),
                _ => {
                    self.pos -= 1;
                    return Err(self.unexpected("a property key"));
                }
            };
            let value = if self.eat_punct(":") {
                self.assignment()?
            } else {
                Expr::Ident(key.clone())
            };
            properties.push((key, value));
            if !self.eat_punct(",") {
                break;
            }
        }
        self.expect_punct("}")?;
        Ok(Expr::Object(properties))
    }
}

enum Operator {
    Binary(BinaryOp),
    Logical(LogicalOp),
}

fn punct_is_pow(operator: &Operator) -> bool {
    matches!(operator, Operator::Binary(BinaryOp::Pow))
}

fn binary_operator(punct: &str) -> Option<(u8, Operator)> {
    use Operator::{Binary, Logical};
    let entry = match punct {
        "??" => (1, Logical(LogicalOp::Coalesce)),
        "||" => (2, Logical(LogicalOp::Or)),
        "&&" => (3, Logical(LogicalOp::And)),
        "==" => (4, Binary(BinaryOp::Eq)),
        "!=" => (4, Binary(BinaryOp::NotEq)),
        "===" => (4, Binary(BinaryOp::StrictEq)),
        "!==" => (4, Binary(BinaryOp::StrictNotEq)),
        "<" => (5, Binary(BinaryOp::Lt)),
        "<=" => (5, Binary(BinaryOp::LtEq)),
        ">" => (5, Binary(BinaryOp::Gt)),
        ">=" => (5, Binary(BinaryOp::GtEq)),
        "+" => (6, Binary(BinaryOp::Add)),
        "-" => (6, Binary(BinaryOp::Sub)),
        "*" => (7, Binary(BinaryOp::Mul)),
        "/" => (7, Binary(BinaryOp::Div)),
        "%" => (7, Binary(BinaryOp::Rem)),
        "**" => (8, Binary(BinaryOp::Pow)),
        _ => return None,
    };
    Some(entry)
}

fn is_assignable(expr: &Expr) -> bool {
    matches!(
        expr,
        Expr::Ident(_) | Expr::Member {
            optional: false,
            ..
        }
    )
}

fn is_reserved(name: &str) -> bool {
    matches!(
        name,
        "let"
            | "const"
            | "var"
            | "if"
            | "else"
            | "while"
            | "for"
            | "of"
            | "return"
            | "throw"
            | "try"
            | "catch"
            | "finally"
            | "break"
            | "continue"
            | "new"
            | "typeof"
            | "function"
            | "class"
    )
}

/// Converts a numeric literal, keeping integral values as JSON integers.
pub(super) fn number_literal(n: f64) -> Value {
    if n.fract() == 0.0 && n.abs() < 9_007_199_254_740_992.0 {
        Value::from(n as i64)
    } else {
        serde_json::Number::from_f64(n)
            .map(Value::Number)
            .unwrap_or(Value::Null)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn it_respects_operator_precedence() {
        let program = parse("1 + 2 * 3").unwrap();
        let Stmt::Expr(Expr::Binary(BinaryOp::Add, left, right)) = &program[0] else {
            panic!("unexpected tree: {program:?}");
        };
        assert_eq!(**left, Expr::Literal(Value::from(1)));
        assert!(matches!(**right, Expr::Binary(BinaryOp::Mul, _, _)));
    }

    #[test]
    fn it_parses_statements() {
        let program = parse(
            "let total = 0;
             for (const item of items) { total += item.price }
             if (total > 10) { throw new Error('too much') } else return total",
        )
        .unwrap();
        assert_eq!(program.len(), 3);
        assert!(matches!(program[1], Stmt::ForOf(ref name, _, _) if name == "item"));
        assert!(matches!(program[2], Stmt::If(_, _, Some(_))));
    }

    #[test]
    fn it_parses_classic_for_loops_and_try() {
        let program = parse(
            "for (let i = 0; i < 3; i++) {}
             try { risky() } catch (e) { log(e) } finally { done() }",
        )
        .unwrap();
        assert!(matches!(program[0], Stmt::For { .. }));
        assert!(matches!(
            program[1],
            Stmt::Try {
                param: Some(_),
                handler: Some(_),
                finalizer: Some(_),
                ..
            }
        ));
    }

    #[test]
    fn it_rejects_invalid_syntax() {
        assert!(parse("let = 1").is_err());
        assert!(parse("1 = 2").is_err());
        assert!(parse("return (1").is_err());
        assert!(parse("function f() {}").is_err());
        assert!(parse("a b").is_err());
        assert!(parse(&"(".repeat(500)).is_err());
    }

    fn nested_arrays(depth: usize) -> String {
        format!("return {}1{}", "[".repeat(depth), "]".repeat(depth))
    }

    #[test]
    fn it_limits_nesting_depth() {
        // The statement, its expression and the innermost literal take three levels.
        assert!(parse(&nested_arrays(MAX_DEPTH - 3)).is_ok());
        for depth in [MAX_DEPTH - 2, MAX_DEPTH - 1, 10_000] {
            let err = parse(&nested_arrays(depth)).unwrap_err();
            assert!(err.to_string().contains("maximum nesting depth exceeded"));
        }
        assert!(parse(&format!("x = {}", "{a: ".repeat(10_000))).is_err());
        assert!(parse(&format!("{}1", "- ".repeat(10_000))).is_err());
        assert!(parse(&format!("{}x", "++".repeat(10_000))).is_err());
        assert!(parse(&format!("1{}", " ** 1".repeat(10_000))).is_err());
        assert!(parse(&"if (a) ".repeat(10_000)).is_err());
    }
}
