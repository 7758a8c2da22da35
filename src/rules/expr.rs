use serde_json::Value;

use super::error::RuleError;
use crate::storage::{Record, Store};

/// Evaluation scope for a rule expression: the authenticated user (if any),
/// the existing record, the incoming payload, and the public partition for
/// `get()` lookups.
pub struct Scope<'a> {
    pub user: Option<&'a Record>,
    pub data: &'a Value,
    pub new_data: &'a Value,
    pub store: &'a Store,
}

/// A closed-form rule predicate, parsed once at startup.
///
/// Grammar: `||`, `&&`, `!`, equality (`=`, `==`, `!=`), parentheses, field
/// paths rooted at `user`/`data`/`newData`, string/number/bool/null
/// literals, and the helpers `get(collection, id)` and
/// `isOwner(user, object)`.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Literal(Value),
    Path(PathRoot, Vec<String>),
    Get(Box<Expr>, Box<Expr>),
    IsOwner(Box<Expr>, Box<Expr>),
    Eq(Box<Expr>, Box<Expr>),
    Ne(Box<Expr>, Box<Expr>),
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
    Not(Box<Expr>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathRoot {
    User,
    Data,
    NewData,
}

impl Expr {
    pub fn parse(input: &str) -> Result<Self, RuleError> {
        let tokens = tokenize(input)?;
        let mut parser = Parser { tokens, pos: 0 };
        let expr = parser.parse_or()?;
        if parser.pos != parser.tokens.len() {
            return Err(RuleError::InvalidExpression(input.to_string()));
        }
        Ok(expr)
    }

    /// Evaluate to a truth value. Failed `get()` lookups and missing path
    /// segments yield null, which is falsy: a rule that cannot resolve
    /// denies rather than erroring.
    pub fn truthy(&self, scope: &Scope) -> bool {
        is_truthy(&self.eval(scope))
    }

    fn eval(&self, scope: &Scope) -> Value {
        match self {
            Expr::Literal(value) => value.clone(),
            Expr::Path(root, segments) => {
                let base = match root {
                    PathRoot::User => match scope.user {
                        Some(user) => Value::Object(user.clone()),
                        None => Value::Null,
                    },
                    PathRoot::Data => scope.data.clone(),
                    PathRoot::NewData => scope.new_data.clone(),
                };
                segments.iter().fold(base, |value, segment| {
                    value.get(segment).cloned().unwrap_or(Value::Null)
                })
            }
            Expr::Get(collection, id) => {
                let collection = as_string(collection.eval(scope));
                let id = as_string(id.eval(scope));
                match (collection, id) {
                    (Some(collection), Some(id)) => scope
                        .store
                        .get(&collection, &id)
                        .map(Value::Object)
                        .unwrap_or(Value::Null),
                    _ => Value::Null,
                }
            }
            Expr::IsOwner(user, object) => {
                let user = user.eval(scope);
                let object = object.eval(scope);
                let user_id = user.get("_id");
                let owner_id = object.get("_ownerId");
                Value::Bool(match (user_id, owner_id) {
                    (Some(a), Some(b)) => loose_eq(a, b),
                    _ => false,
                })
            }
            Expr::Eq(a, b) => Value::Bool(loose_eq(&a.eval(scope), &b.eval(scope))),
            Expr::Ne(a, b) => Value::Bool(!loose_eq(&a.eval(scope), &b.eval(scope))),
            Expr::And(a, b) => Value::Bool(is_truthy(&a.eval(scope)) && is_truthy(&b.eval(scope))),
            Expr::Or(a, b) => Value::Bool(is_truthy(&a.eval(scope)) || is_truthy(&b.eval(scope))),
            Expr::Not(inner) => Value::Bool(!is_truthy(&inner.eval(scope))),
        }
    }
}

fn as_string(value: Value) -> Option<String> {
    value.as_str().map(str::to_string)
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0).unwrap_or(true),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

fn loose_eq(a: &Value, b: &Value) -> bool {
    if let (Some(x), Some(y)) = (a.as_f64(), b.as_f64()) {
        return x == y;
    }
    a == b
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Ident(String),
    Literal(Value),
    Dot,
    Comma,
    LParen,
    RParen,
    OpEq,
    OpNe,
    OpAnd,
    OpOr,
    OpNot,
}

fn tokenize(input: &str) -> Result<Vec<Token>, RuleError> {
    let invalid = || RuleError::InvalidExpression(input.to_string());
    let mut tokens = Vec::new();
    let chars: Vec<char> = input.chars().collect();
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        match c {
            ' ' | '\t' | '\n' | '\r' => i += 1,
            '.' => {
                tokens.push(Token::Dot);
                i += 1;
            }
            ',' => {
                tokens.push(Token::Comma);
                i += 1;
            }
            '(' => {
                tokens.push(Token::LParen);
                i += 1;
            }
            ')' => {
                tokens.push(Token::RParen);
                i += 1;
            }
            '|' => {
                if chars.get(i + 1) != Some(&'|') {
                    return Err(invalid());
                }
                tokens.push(Token::OpOr);
                i += 2;
            }
            '&' => {
                if chars.get(i + 1) != Some(&'&') {
                    return Err(invalid());
                }
                tokens.push(Token::OpAnd);
                i += 2;
            }
            '!' => {
                if chars.get(i + 1) == Some(&'=') {
                    tokens.push(Token::OpNe);
                    i += 2;
                    while chars.get(i) == Some(&'=') {
                        i += 1;
                    }
                } else {
                    tokens.push(Token::OpNot);
                    i += 1;
                }
            }
            '=' => {
                // `=`, `==` and `===` all mean equality here
                tokens.push(Token::OpEq);
                i += 1;
                while chars.get(i) == Some(&'=') {
                    i += 1;
                }
            }
            '\'' | '"' => {
                let quote = c;
                let mut out = String::new();
                i += 1;
                loop {
                    match chars.get(i) {
                        Some(&ch) if ch == quote => {
                            i += 1;
                            break;
                        }
                        Some(&ch) => {
                            out.push(ch);
                            i += 1;
                        }
                        None => return Err(invalid()),
                    }
                }
                tokens.push(Token::Literal(Value::from(out)));
            }
            c if c.is_ascii_digit() => {
                let start = i;
                while i < chars.len() && (chars[i].is_ascii_digit() || chars[i] == '.') {
                    i += 1;
                }
                let number: String = chars[start..i].iter().collect();
                let parsed: serde_json::Number =
                    number.parse().map_err(|_| invalid())?;
                tokens.push(Token::Literal(Value::Number(parsed)));
            }
            c if c.is_ascii_alphabetic() || c == '_' => {
                let start = i;
                while i < chars.len() && (chars[i].is_ascii_alphanumeric() || chars[i] == '_') {
                    i += 1;
                }
                let word: String = chars[start..i].iter().collect();
                match word.as_str() {
                    "true" => tokens.push(Token::Literal(Value::Bool(true))),
                    "false" => tokens.push(Token::Literal(Value::Bool(false))),
                    "null" => tokens.push(Token::Literal(Value::Null)),
                    _ => tokens.push(Token::Ident(word)),
                }
            }
            _ => return Err(invalid()),
        }
    }
    Ok(tokens)
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
        let token = self.tokens.get(self.pos).cloned();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn expect(&mut self, token: Token) -> Result<(), RuleError> {
        if self.advance().as_ref() == Some(&token) {
            Ok(())
        } else {
            Err(self.fail())
        }
    }

    fn fail(&self) -> RuleError {
        RuleError::InvalidExpression(format!("unexpected token at position {}", self.pos))
    }

    fn parse_or(&mut self) -> Result<Expr, RuleError> {
        let mut left = self.parse_and()?;
        while self.peek() == Some(&Token::OpOr) {
            self.advance();
            let right = self.parse_and()?;
            left = Expr::Or(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> Result<Expr, RuleError> {
        let mut left = self.parse_comparison()?;
        while self.peek() == Some(&Token::OpAnd) {
            self.advance();
            let right = self.parse_comparison()?;
            left = Expr::And(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_comparison(&mut self) -> Result<Expr, RuleError> {
        let left = self.parse_unary()?;
        match self.peek() {
            Some(Token::OpEq) => {
                self.advance();
                let right = self.parse_unary()?;
                Ok(Expr::Eq(Box::new(left), Box::new(right)))
            }
            Some(Token::OpNe) => {
                self.advance();
                let right = self.parse_unary()?;
                Ok(Expr::Ne(Box::new(left), Box::new(right)))
            }
            _ => Ok(left),
        }
    }

    fn parse_unary(&mut self) -> Result<Expr, RuleError> {
        if self.peek() == Some(&Token::OpNot) {
            self.advance();
            let inner = self.parse_unary()?;
            return Ok(Expr::Not(Box::new(inner)));
        }
        self.parse_operand()
    }

    fn parse_operand(&mut self) -> Result<Expr, RuleError> {
        match self.advance() {
            Some(Token::Literal(value)) => Ok(Expr::Literal(value)),
            Some(Token::LParen) => {
                let inner = self.parse_or()?;
                self.expect(Token::RParen)?;
                Ok(inner)
            }
            Some(Token::Ident(word)) => match word.as_str() {
                "get" => {
                    self.expect(Token::LParen)?;
                    let collection = self.parse_or()?;
                    self.expect(Token::Comma)?;
                    let id = self.parse_or()?;
                    self.expect(Token::RParen)?;
                    Ok(Expr::Get(Box::new(collection), Box::new(id)))
                }
                "isOwner" => {
                    self.expect(Token::LParen)?;
                    let user = self.parse_or()?;
                    self.expect(Token::Comma)?;
                    let object = self.parse_or()?;
                    self.expect(Token::RParen)?;
                    Ok(Expr::IsOwner(Box::new(user), Box::new(object)))
                }
                "user" => self.parse_path(PathRoot::User),
                "data" => self.parse_path(PathRoot::Data),
                "newData" => self.parse_path(PathRoot::NewData),
                _ => Err(self.fail()),
            },
            _ => Err(self.fail()),
        }
    }

    fn parse_path(&mut self, root: PathRoot) -> Result<Expr, RuleError> {
        let mut segments = Vec::new();
        while self.peek() == Some(&Token::Dot) {
            self.advance();
            match self.advance() {
                Some(Token::Ident(segment)) => segments.push(segment),
                _ => return Err(self.fail()),
            }
        }
        Ok(Expr::Path(root, segments))
    }
}
