//! Calculator evaluator: arithmetic with variables.
//!
//! Grammar (lowest to highest precedence):
//!
//! ```text
//! statement := IDENT '=' expr | expr
//! expr      := term (('+' | '-') term)*
//! term      := unary (('*' | '/' | '//' | '%') unary)*
//! unary     := ('+' | '-') unary | power
//! power     := atom ('**' unary)?
//! atom      := NUMBER | IDENT | '(' expr ')'
//! ```
//!
//! Integers stay integers (checked `i64`), `/` always produces a float, `//`
//! floors and `%` takes the sign of the divisor.  A bare expression prints
//! its value; an assignment prints nothing.
//!
//! A line ending in `\` or leaving a `(` open asks for a continuation line.
//! An empty line while a statement is pending forces evaluation.

use std::collections::HashMap;
use std::fmt;

use super::{Evaluator, PushOutcome};

#[derive(Debug, Clone, Copy, PartialEq)]
enum Value {
    Int(i64),
    Float(f64),
}

impl Value {
    fn as_f64(self) -> f64 {
        match self {
            Value::Int(i) => i as f64,
            Value::Float(f) => f,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Value::Int(i) => write!(f, "{i}"),
            Value::Float(v) if v.is_finite() && v.fract() == 0.0 && v.abs() < 1e16 => {
                write!(f, "{v:.1}")
            }
            Value::Float(v) => write!(f, "{v}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Num(Value),
    Ident(String),
    Op(&'static str),
    LParen,
    RParen,
    Assign,
}

type EvalResult<T> = Result<T, String>;

/// Arithmetic REPL with persistent variables.
#[derive(Debug, Default)]
pub struct CalcEvaluator {
    variables: HashMap<String, Value>,
    pending: Vec<String>,
    output: Vec<String>,
}

impl CalcEvaluator {
    pub fn new() -> Self {
        Self::default()
    }

    fn run(&mut self, source: &str) {
        match self.execute(source) {
            Ok(Some(value)) => self.output.push(value.to_string()),
            Ok(None) => {}
            Err(message) => self.output.push(format!("Error: {message}")),
        }
    }

    fn execute(&mut self, source: &str) -> EvalResult<Option<Value>> {
        let tokens = tokenize(source)?;
        if tokens.is_empty() {
            return Ok(None);
        }

        if let [Token::Ident(name), Token::Assign, rest @ ..] = tokens.as_slice() {
            let value = Parser::new(rest, &self.variables).parse_all()?;
            self.variables.insert(name.clone(), value);
            return Ok(None);
        }

        Parser::new(&tokens, &self.variables).parse_all().map(Some)
    }
}

impl Evaluator for CalcEvaluator {
    fn push(&mut self, line: &str) -> PushOutcome {
        let trimmed = line.trim_end_matches(['\r', ' ', '\t']);

        if trimmed.is_empty() {
            if !self.pending.is_empty() {
                let source = self.pending.join(" ");
                self.pending.clear();
                self.run(&source);
            }
            return PushOutcome { needs_more: false };
        }

        if let Some(head) = trimmed.strip_suffix('\\') {
            self.pending.push(head.to_string());
            return PushOutcome { needs_more: true };
        }

        self.pending.push(trimmed.to_string());
        let source = self.pending.join(" ");
        if paren_depth(&source) > 0 {
            return PushOutcome { needs_more: true };
        }

        self.pending.clear();
        self.run(&source);
        PushOutcome { needs_more: false }
    }

    fn drain_output(&mut self) -> Vec<String> {
        std::mem::take(&mut self.output)
    }

    fn name(&self) -> &'static str {
        "calc"
    }
}

fn paren_depth(source: &str) -> i64 {
    source.chars().fold(0, |depth, c| match c {
        '(' => depth + 1,
        ')' => depth - 1,
        _ => depth,
    })
}

// ── Lexer ─────────────────────────────────────────────────────────────────────

fn tokenize(source: &str) -> EvalResult<Vec<Token>> {
    let chars: Vec<char> = source.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        match c {
            ' ' | '\t' | '\r' => i += 1,
            '0'..='9' | '.' => {
                let start = i;
                while i < chars.len() && (chars[i].is_ascii_digit() || chars[i] == '.') {
                    i += 1;
                }
                let text: String = chars[start..i].iter().collect();
                tokens.push(Token::Num(parse_number(&text)?));
            }
            c if c.is_alphabetic() || c == '_' => {
                let start = i;
                while i < chars.len() && (chars[i].is_alphanumeric() || chars[i] == '_') {
                    i += 1;
                }
                tokens.push(Token::Ident(chars[start..i].iter().collect()));
            }
            '(' => {
                tokens.push(Token::LParen);
                i += 1;
            }
            ')' => {
                tokens.push(Token::RParen);
                i += 1;
            }
            '=' => {
                tokens.push(Token::Assign);
                i += 1;
            }
            '*' | '/' => {
                let doubled = chars.get(i + 1) == Some(&c);
                tokens.push(Token::Op(match (c, doubled) {
                    ('*', true) => "**",
                    ('*', false) => "*",
                    ('/', true) => "//",
                    _ => "/",
                }));
                i += if doubled { 2 } else { 1 };
            }
            '+' => {
                tokens.push(Token::Op("+"));
                i += 1;
            }
            '-' => {
                tokens.push(Token::Op("-"));
                i += 1;
            }
            '%' => {
                tokens.push(Token::Op("%"));
                i += 1;
            }
            other => return Err(format!("invalid character '{other}'")),
        }
    }

    Ok(tokens)
}

fn parse_number(text: &str) -> EvalResult<Value> {
    if text.contains('.') {
        text.parse::<f64>()
            .map(Value::Float)
            .map_err(|_| format!("invalid number '{text}'"))
    } else {
        text.parse::<i64>()
            .map(Value::Int)
            .map_err(|_| format!("integer literal too large '{text}'"))
    }
}

// ── Parser / interpreter ──────────────────────────────────────────────────────

struct Parser<'a> {
    tokens: &'a [Token],
    pos: usize,
    variables: &'a HashMap<String, Value>,
}

impl<'a> Parser<'a> {
    fn new(tokens: &'a [Token], variables: &'a HashMap<String, Value>) -> Self {
        Self {
            tokens,
            pos: 0,
            variables,
        }
    }

    fn parse_all(&mut self) -> EvalResult<Value> {
        let value = self.expr()?;
        if self.pos != self.tokens.len() {
            return Err("invalid syntax".to_string());
        }
        Ok(value)
    }

    fn peek(&self) -> Option<&'a Token> {
        self.tokens.get(self.pos)
    }

    fn eat_op(&mut self, ops: &[&str]) -> Option<&'static str> {
        match self.peek() {
            Some(Token::Op(op)) if ops.contains(op) => {
                self.pos += 1;
                Some(*op)
            }
            _ => None,
        }
    }

    fn expr(&mut self) -> EvalResult<Value> {
        let mut lhs = self.term()?;
        while let Some(op) = self.eat_op(&["+", "-"]) {
            let rhs = self.term()?;
            lhs = binary(op, lhs, rhs)?;
        }
        Ok(lhs)
    }

    fn term(&mut self) -> EvalResult<Value> {
        let mut lhs = self.unary()?;
        while let Some(op) = self.eat_op(&["*", "/", "//", "%"]) {
            let rhs = self.unary()?;
            lhs = binary(op, lhs, rhs)?;
        }
        Ok(lhs)
    }

    fn unary(&mut self) -> EvalResult<Value> {
        match self.eat_op(&["-", "+"]) {
            Some("-") => match self.unary()? {
                Value::Int(i) => i
                    .checked_neg()
                    .map(Value::Int)
                    .ok_or_else(|| "integer overflow".to_string()),
                Value::Float(f) => Ok(Value::Float(-f)),
            },
            Some(_) => self.unary(),
            None => self.power(),
        }
    }

    fn power(&mut self) -> EvalResult<Value> {
        let base = self.atom()?;
        if self.eat_op(&["**"]).is_some() {
            let exponent = self.unary()?;
            return binary("**", base, exponent);
        }
        Ok(base)
    }

    fn atom(&mut self) -> EvalResult<Value> {
        let token = self.peek().ok_or_else(|| "unexpected end of input".to_string())?;
        self.pos += 1;
        match token {
            Token::Num(v) => Ok(*v),
            Token::Ident(name) => self
                .variables
                .get(name)
                .copied()
                .ok_or_else(|| format!("name '{name}' is not defined")),
            Token::LParen => {
                let inner = self.expr()?;
                match self.peek() {
                    Some(Token::RParen) => {
                        self.pos += 1;
                        Ok(inner)
                    }
                    _ => Err("invalid syntax: expected ')'".to_string()),
                }
            }
            _ => Err("invalid syntax".to_string()),
        }
    }
}

fn binary(op: &str, lhs: Value, rhs: Value) -> EvalResult<Value> {
    let overflow = || "integer overflow".to_string();

    if let (Value::Int(a), Value::Int(b)) = (lhs, rhs) {
        return match op {
            "+" => a.checked_add(b).map(Value::Int).ok_or_else(overflow),
            "-" => a.checked_sub(b).map(Value::Int).ok_or_else(overflow),
            "*" => a.checked_mul(b).map(Value::Int).ok_or_else(overflow),
            "/" if b == 0 => Err("division by zero".to_string()),
            "/" => Ok(Value::Float(a as f64 / b as f64)),
            "//" | "%" if b == 0 => Err("integer division or modulo by zero".to_string()),
            "//" => {
                let q = a.checked_div_euclid(b).ok_or_else(overflow)?;
                let r = a.checked_rem_euclid(b).ok_or_else(overflow)?;
                Ok(Value::Int(q - i64::from(b < 0 && r != 0)))
            }
            "%" => {
                let r = a.checked_rem_euclid(b).ok_or_else(overflow)?;
                Ok(Value::Int(if b < 0 && r != 0 { r + b } else { r }))
            }
            "**" if b < 0 => Ok(Value::Float((a as f64).powf(b as f64))),
            "**" => u32::try_from(b)
                .ok()
                .and_then(|e| a.checked_pow(e))
                .map(Value::Int)
                .ok_or_else(overflow),
            _ => Err(format!("unsupported operator '{op}'")),
        };
    }

    let (a, b) = (lhs.as_f64(), rhs.as_f64());
    match op {
        "+" => Ok(Value::Float(a + b)),
        "-" => Ok(Value::Float(a - b)),
        "*" => Ok(Value::Float(a * b)),
        "/" | "//" | "%" if b == 0.0 => Err("float division by zero".to_string()),
        "/" => Ok(Value::Float(a / b)),
        "//" => Ok(Value::Float((a / b).floor())),
        "%" => Ok(Value::Float(a - b * (a / b).floor())),
        "**" => Ok(Value::Float(a.powf(b))),
        _ => Err(format!("unsupported operator '{op}'")),
    }
}
