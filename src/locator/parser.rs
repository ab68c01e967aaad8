//! Tokenizer and recursive-descent parser for the locator language

use super::ast::{Axis, CompareOp, Expr, Function, LocationPath, NodeTest, Step};
use crate::error::QueryError;

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Slash,
    DoubleSlash,
    LBracket,
    RBracket,
    LParen,
    RParen,
    At,
    Comma,
    Pipe,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    Dot,
    DotDot,
    Star,
    ColonColon,
    Literal(String),
    Number(f64),
    Name(String),
}

fn is_name_start(c: char) -> bool {
    c.is_alphabetic() || c == '_'
}

fn is_name_char(c: char) -> bool {
    c.is_alphanumeric() || matches!(c, '-' | '_' | '.')
}

fn syntax_error(source: &str, position: usize, message: impl Into<String>) -> QueryError {
    QueryError::Syntax {
        locator: source.to_string(),
        position,
        message: message.into(),
    }
}

fn tokenize(source: &str) -> Result<Vec<(Token, usize)>, QueryError> {
    let mut tokens = Vec::new();
    let mut pos = 0;

    while let Some(c) = source[pos..].chars().next() {
        let start = pos;
        let next = source[pos + c.len_utf8()..].chars().next();

        let token = match c {
            ' ' | '\t' | '\r' | '\n' => {
                pos += 1;
                continue;
            }
            '/' if next == Some('/') => {
                pos += 2;
                Token::DoubleSlash
            }
            '/' => {
                pos += 1;
                Token::Slash
            }
            '[' | ']' | '(' | ')' | '@' | ',' | '|' | '=' | '*' => {
                pos += 1;
                match c {
                    '[' => Token::LBracket,
                    ']' => Token::RBracket,
                    '(' => Token::LParen,
                    ')' => Token::RParen,
                    '@' => Token::At,
                    ',' => Token::Comma,
                    '|' => Token::Pipe,
                    '=' => Token::Eq,
                    _ => Token::Star,
                }
            }
            '!' if next == Some('=') => {
                pos += 2;
                Token::Ne
            }
            '<' | '>' => {
                let or_equal = next == Some('=');
                pos += if or_equal { 2 } else { 1 };
                match (c, or_equal) {
                    ('<', false) => Token::Lt,
                    ('<', true) => Token::Le,
                    ('>', false) => Token::Gt,
                    _ => Token::Ge,
                }
            }
            ':' if next == Some(':') => {
                pos += 2;
                Token::ColonColon
            }
            '.' if next == Some('.') => {
                pos += 2;
                Token::DotDot
            }
            '.' if !next.is_some_and(|n| n.is_ascii_digit()) => {
                pos += 1;
                Token::Dot
            }
            '\'' | '"' => {
                let body = &source[pos + 1..];
                let end = body
                    .find(c)
                    .ok_or_else(|| syntax_error(source, start, "unterminated string literal"))?;
                pos += end + 2;
                Token::Literal(body[..end].to_string())
            }
            c if c.is_ascii_digit() || c == '.' => {
                let len = source[pos..]
                    .find(|ch: char| !(ch.is_ascii_digit() || ch == '.'))
                    .unwrap_or(source.len() - pos);
                let text = &source[pos..pos + len];
                let value = text
                    .parse::<f64>()
                    .map_err(|_| syntax_error(source, start, format!("invalid number `{text}`")))?;
                pos += len;
                Token::Number(value)
            }
            c if is_name_start(c) => {
                let len = source[pos..]
                    .find(|ch: char| !is_name_char(ch))
                    .unwrap_or(source.len() - pos);
                let name = &source[pos..pos + len];
                pos += len;
                Token::Name(name.to_string())
            }
            other => {
                return Err(syntax_error(source, start, format!("unexpected character `{other}`")));
            }
        };

        tokens.push((token, start));
    }

    Ok(tokens)
}

/// Deepest expression nesting a locator may use. Brackets, parentheses,
/// function arguments and chained operators all count.
const MAX_NESTING: usize = 64;

/// Parse locator source into an expression.
pub(super) fn parse(source: &str) -> Result<Expr, QueryError> {
    let tokens = tokenize(source)?;
    let mut parser = Parser {
        source,
        tokens,
        pos: 0,
        depth: 0,
    };

    let expr = parser.or_expr()?;
    if parser.peek().is_some() {
        return Err(parser.error("unexpected trailing input"));
    }
    Ok(expr)
}

struct Parser<'a> {
    source: &'a str,
    tokens: Vec<(Token, usize)>,
    pos: usize,
    depth: usize,
}

impl Parser<'_> {
    fn peek(&self) -> Option<&Token> {
        self.peek_at(0)
    }

    fn peek_at(&self, offset: usize) -> Option<&Token> {
        self.tokens.get(self.pos + offset).map(|(token, _)| token)
    }

    fn advance(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).map(|(token, _)| token.clone())?;
        self.pos += 1;
        Some(token)
    }

    fn eat(&mut self, expected: &Token) -> bool {
        if self.peek() == Some(expected) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, expected: &Token, what: &str) -> Result<(), QueryError> {
        if self.eat(expected) {
            Ok(())
        } else {
            Err(self.error(format!("expected {what}")))
        }
    }

    fn error(&self, message: impl Into<String>) -> QueryError {
        let position = self
            .tokens
            .get(self.pos)
            .map_or(self.source.len(), |(_, offset)| *offset);
        syntax_error(self.source, position, message)
    }

    fn peek_keyword(&self, keyword: &str) -> bool {
        matches!(self.peek(), Some(Token::Name(name)) if name == keyword)
    }

    fn nest(&mut self) -> Result<(), QueryError> {
        self.depth += 1;
        if self.depth > MAX_NESTING {
            return Err(self.error("locator nests too deeply"));
        }
        Ok(())
    }

    fn or_expr(&mut self) -> Result<Expr, QueryError> {
        let outer = self.depth;
        self.nest()?;
        let expr = self.or_chain();
        self.depth = outer;
        expr
    }

    fn or_chain(&mut self) -> Result<Expr, QueryError> {
        let mut left = self.and_expr()?;
        while self.peek_keyword("or") {
            self.pos += 1;
            self.nest()?;
            let right = self.and_expr()?;
            left = Expr::Or(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn and_expr(&mut self) -> Result<Expr, QueryError> {
        let mut left = self.equality_expr()?;
        while self.peek_keyword("and") {
            self.pos += 1;
            self.nest()?;
            let right = self.equality_expr()?;
            left = Expr::And(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn equality_expr(&mut self) -> Result<Expr, QueryError> {
        let mut left = self.relational_expr()?;
        loop {
            let op = match self.peek() {
                Some(Token::Eq) => CompareOp::Eq,
                Some(Token::Ne) => CompareOp::Ne,
                _ => return Ok(left),
            };
            self.pos += 1;
            self.nest()?;
            let right = self.relational_expr()?;
            left = Expr::Compare(op, Box::new(left), Box::new(right));
        }
    }

    fn relational_expr(&mut self) -> Result<Expr, QueryError> {
        let mut left = self.union_expr()?;
        loop {
            let op = match self.peek() {
                Some(Token::Lt) => CompareOp::Lt,
                Some(Token::Le) => CompareOp::Le,
                Some(Token::Gt) => CompareOp::Gt,
                Some(Token::Ge) => CompareOp::Ge,
                _ => return Ok(left),
            };
            self.pos += 1;
            self.nest()?;
            let right = self.union_expr()?;
            left = Expr::Compare(op, Box::new(left), Box::new(right));
        }
    }

    fn union_expr(&mut self) -> Result<Expr, QueryError> {
        let mut left = self.path_expr()?;
        while self.eat(&Token::Pipe) {
            self.nest()?;
            let right = self.path_expr()?;
            if !left.yields_nodes() || !right.yields_nodes() {
                return Err(self.error("`|` needs node-sets on both sides"));
            }
            left = Expr::Union(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn path_expr(&mut self) -> Result<Expr, QueryError> {
        match self.peek() {
            Some(Token::Slash) => {
                self.pos += 1;
                let steps = if self.starts_step() {
                    self.relative_steps()?
                } else {
                    Vec::new()
                };
                Ok(Expr::Path(LocationPath {
                    absolute: true,
                    steps,
                }))
            }
            Some(Token::DoubleSlash) => {
                self.pos += 1;
                let mut steps = vec![descendant_or_self()];
                steps.extend(self.relative_steps()?);
                Ok(Expr::Path(LocationPath {
                    absolute: true,
                    steps,
                }))
            }
            Some(Token::Literal(_) | Token::Number(_) | Token::LParen) => self.filter_expr(),
            Some(Token::Name(name))
                if self.peek_at(1) == Some(&Token::LParen) && name != "text" && name != "node" =>
            {
                self.filter_expr()
            }
            _ => Ok(Expr::Path(LocationPath {
                absolute: false,
                steps: self.relative_steps()?,
            })),
        }
    }

    fn filter_expr(&mut self) -> Result<Expr, QueryError> {
        let primary = self.primary_expr()?;
        let predicates = self.predicates()?;

        let mut steps = Vec::new();
        if self.eat(&Token::Slash) {
            steps = self.relative_steps()?;
        } else if self.eat(&Token::DoubleSlash) {
            steps.push(descendant_or_self());
            steps.extend(self.relative_steps()?);
        }

        if predicates.is_empty() && steps.is_empty() {
            return Ok(primary);
        }
        if !primary.yields_nodes() {
            return Err(self.error("predicates and paths need a node-set"));
        }
        Ok(Expr::Filter {
            primary: Box::new(primary),
            predicates,
            steps,
        })
    }

    fn primary_expr(&mut self) -> Result<Expr, QueryError> {
        if !matches!(
            self.peek(),
            Some(Token::Literal(_) | Token::Number(_) | Token::LParen | Token::Name(_))
        ) {
            return Err(self.error("expected an expression"));
        }

        match self.advance() {
            Some(Token::Literal(value)) => Ok(Expr::Literal(value)),
            Some(Token::Number(value)) => Ok(Expr::Number(value)),
            Some(Token::Name(name)) => self.function_call(name),
            _ => {
                let inner = self.or_expr()?;
                self.expect(&Token::RParen, "`)`")?;
                Ok(inner)
            }
        }
    }

    fn function_call(&mut self, name: String) -> Result<Expr, QueryError> {
        let function =
            Function::from_name(&name).ok_or_else(|| QueryError::UnknownFunction(name.clone()))?;
        self.expect(&Token::LParen, "`(`")?;

        let mut args = Vec::new();
        if !self.eat(&Token::RParen) {
            loop {
                args.push(self.or_expr()?);
                if self.eat(&Token::RParen) {
                    break;
                }
                self.expect(&Token::Comma, "`,` or `)`")?;
            }
        }

        let (min, max) = function.arity();
        if args.len() < min || max.is_some_and(|max| args.len() > max) {
            let expected = match max {
                Some(max) if max == min => min.to_string(),
                Some(max) => format!("{min} to {max}"),
                None => format!("at least {min}"),
            };
            return Err(QueryError::Arity {
                function: name,
                expected,
                found: args.len(),
            });
        }

        Ok(Expr::Call(function, args))
    }

    fn starts_step(&self) -> bool {
        matches!(
            self.peek(),
            Some(Token::Dot | Token::DotDot | Token::At | Token::Star | Token::Name(_))
        )
    }

    fn relative_steps(&mut self) -> Result<Vec<Step>, QueryError> {
        let mut steps = vec![self.step()?];
        loop {
            if self.eat(&Token::Slash) {
                steps.push(self.step()?);
            } else if self.eat(&Token::DoubleSlash) {
                steps.push(descendant_or_self());
                steps.push(self.step()?);
            } else {
                return Ok(steps);
            }
        }
    }

    fn step(&mut self) -> Result<Step, QueryError> {
        if self.eat(&Token::Dot) {
            return Ok(Step::new(Axis::SelfAxis, NodeTest::Node));
        }
        if self.eat(&Token::DotDot) {
            return Ok(Step::new(Axis::Parent, NodeTest::Node));
        }

        let axis = if self.eat(&Token::At) {
            Axis::Attribute
        } else if let (Some(Token::Name(name)), Some(Token::ColonColon)) =
            (self.peek(), self.peek_at(1))
        {
            let axis = Axis::from_name(name).ok_or_else(|| QueryError::UnknownAxis(name.clone()))?;
            self.pos += 2;
            axis
        } else {
            Axis::Child
        };

        let test = self.node_test()?;
        let mut step = Step::new(axis, test);
        step.predicates = self.predicates()?;
        Ok(step)
    }

    fn node_test(&mut self) -> Result<NodeTest, QueryError> {
        if self.eat(&Token::Star) {
            return Ok(NodeTest::Any);
        }

        let name = match self.peek() {
            Some(Token::Name(name)) => name.clone(),
            _ => return Err(self.error("expected a node test")),
        };

        if self.peek_at(1) == Some(&Token::LParen) {
            let test = match name.as_str() {
                "text" => NodeTest::Text,
                "node" => NodeTest::Node,
                _ => return Err(self.error(format!("`{name}()` is not a node test"))),
            };
            self.pos += 2;
            self.expect(&Token::RParen, "`)`")?;
            return Ok(test);
        }

        self.pos += 1;
        Ok(NodeTest::Name(name.to_ascii_lowercase()))
    }

    fn predicates(&mut self) -> Result<Vec<Expr>, QueryError> {
        let mut predicates = Vec::new();
        while self.eat(&Token::LBracket) {
            predicates.push(self.or_expr()?);
            self.expect(&Token::RBracket, "`]`")?;
        }
        Ok(predicates)
    }
}

fn descendant_or_self() -> Step {
    Step::new(Axis::DescendantOrSelf, NodeTest::Node)
}
