//! Cut expressions over named per-event variables.
//!
//! Region definitions in the analysis configuration are written as strings
//! such as `"bjets_n >= 2 && meff_4j > 800"`. Supported syntax: arithmetic
//! (`+ - * /`), comparisons (`== != < <= > >=`), boolean operators
//! (`&& || !`), parentheses and the functions `abs`, `sqrt`, `min`, `max`.
//! Booleans are represented as `1.0` / `0.0`; a value `> 0` passes.
//!
//! An expression is compiled once, then bound to a variable catalogue so
//! that evaluation is a plain walk over indices into the per-event row.

use std::iter::Peekable;
use std::str::CharIndices;

use vbsel_core::{Error, Result};

#[derive(Debug, Clone)]
enum Node {
    Num(f64),
    Var(usize),
    Neg(Box<Node>),
    Not(Box<Node>),
    Binary(Op, Box<Node>, Box<Node>),
    Call(Func, Vec<Node>),
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Op {
    Add,
    Sub,
    Mul,
    Div,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
}

impl Op {
    /// Left/right binding power; higher binds tighter.
    fn binding_power(self) -> (u8, u8) {
        match self {
            Op::Or => (1, 2),
            Op::And => (3, 4),
            Op::Eq | Op::Ne | Op::Lt | Op::Le | Op::Gt | Op::Ge => (5, 6),
            Op::Add | Op::Sub => (7, 8),
            Op::Mul | Op::Div => (9, 10),
        }
    }

    fn apply(self, lhs: f64, rhs: f64) -> f64 {
        let truth = |b: bool| if b { 1.0 } else { 0.0 };
        match self {
            Op::Add => lhs + rhs,
            Op::Sub => lhs - rhs,
            Op::Mul => lhs * rhs,
            Op::Div => lhs / rhs,
            Op::Eq => truth(lhs == rhs),
            Op::Ne => truth(lhs != rhs),
            Op::Lt => truth(lhs < rhs),
            Op::Le => truth(lhs <= rhs),
            Op::Gt => truth(lhs > rhs),
            Op::Ge => truth(lhs >= rhs),
            Op::And => truth(lhs > 0.0 && rhs > 0.0),
            Op::Or => truth(lhs > 0.0 || rhs > 0.0),
        }
    }
}

const PREFIX_BP: u8 = 11;

#[derive(Debug, Clone, Copy)]
enum Func {
    Abs,
    Sqrt,
    Min,
    Max,
}

impl Func {
    fn lookup(name: &str) -> Option<(Func, usize)> {
        match name {
            "abs" => Some((Func::Abs, 1)),
            "sqrt" => Some((Func::Sqrt, 1)),
            "min" => Some((Func::Min, 2)),
            "max" => Some((Func::Max, 2)),
            _ => None,
        }
    }
}

fn eval(node: &Node, row: &[f64]) -> f64 {
    match node {
        Node::Num(v) => *v,
        Node::Var(i) => row[*i],
        Node::Neg(a) => -eval(a, row),
        Node::Not(a) => {
            if eval(a, row) > 0.0 {
                0.0
            } else {
                1.0
            }
        }
        Node::Binary(op, a, b) => op.apply(eval(a, row), eval(b, row)),
        Node::Call(f, args) => match f {
            Func::Abs => eval(&args[0], row).abs(),
            Func::Sqrt => eval(&args[0], row).sqrt(),
            Func::Min => eval(&args[0], row).min(eval(&args[1], row)),
            Func::Max => eval(&args[0], row).max(eval(&args[1], row)),
        },
    }
}

fn remap(node: &Node, slots: &[usize]) -> Node {
    match node {
        Node::Num(v) => Node::Num(*v),
        Node::Var(i) => Node::Var(slots[*i]),
        Node::Neg(a) => Node::Neg(Box::new(remap(a, slots))),
        Node::Not(a) => Node::Not(Box::new(remap(a, slots))),
        Node::Binary(op, a, b) => {
            Node::Binary(*op, Box::new(remap(a, slots)), Box::new(remap(b, slots)))
        }
        Node::Call(f, args) => Node::Call(*f, args.iter().map(|a| remap(a, slots)).collect()),
    }
}

/// A parsed expression whose variables are numbered by first occurrence.
#[derive(Debug, Clone)]
pub struct CompiledExpr {
    source: String,
    ast: Node,
    variables: Vec<String>,
}

impl CompiledExpr {
    /// Parse an expression string.
    pub fn compile(input: &str) -> Result<Self> {
        let tokens = tokenize(input)?;
        let mut parser = Parser { tokens: &tokens, pos: 0, depth: 0, variables: Vec::new() };
        let ast = parser.parse_expr(0)?;
        if let Some(tok) = parser.tokens.get(parser.pos) {
            return Err(Error::Expression(format!("unexpected {tok:?} in '{input}'")));
        }
        Ok(CompiledExpr { source: input.to_string(), ast, variables: parser.variables })
    }

    /// Source text.
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Variable names referenced by the expression, in first-occurrence order.
    pub fn variables(&self) -> &[String] {
        &self.variables
    }

    /// Evaluate with `values` ordered like [`CompiledExpr::variables`].
    pub fn eval_row(&self, values: &[f64]) -> f64 {
        eval(&self.ast, values)
    }

    /// Resolve every variable through `lookup` into a slot of a wider row.
    ///
    /// Fails on the first name `lookup` does not know.
    pub fn bind(&self, lookup: impl Fn(&str) -> Option<usize>) -> Result<BoundExpr> {
        let slots = self
            .variables
            .iter()
            .map(|name| {
                lookup(name).ok_or_else(|| {
                    Error::Expression(format!("unknown variable '{name}' in '{}'", self.source))
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(BoundExpr { source: self.source.clone(), ast: remap(&self.ast, &slots) })
    }
}

/// An expression bound to row slots of a variable catalogue.
#[derive(Debug, Clone)]
pub struct BoundExpr {
    source: String,
    ast: Node,
}

impl BoundExpr {
    /// Source text.
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Numeric value over a full catalogue row.
    pub fn eval(&self, row: &[f64]) -> f64 {
        eval(&self.ast, row)
    }

    /// Whether the expression is true (`> 0`) for this row.
    pub fn passes(&self, row: &[f64]) -> bool {
        self.eval(row) > 0.0
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Num(f64),
    Ident(String),
    Op(Op),
    Minus,
    Bang,
    LParen,
    RParen,
    Comma,
}

fn tokenize(input: &str) -> Result<Vec<Token>> {
    let mut out = Vec::new();
    let mut chars: Peekable<CharIndices<'_>> = input.char_indices().peekable();

    while let Some((start, c)) = chars.next() {
        let next = chars.peek().map(|&(_, n)| n);
        let tok = match (c, next) {
            _ if c.is_whitespace() => continue,
            ('&', Some('&')) => Token::Op(Op::And),
            ('|', Some('|')) => Token::Op(Op::Or),
            ('=', Some('=')) => Token::Op(Op::Eq),
            ('!', Some('=')) => Token::Op(Op::Ne),
            ('<', Some('=')) => Token::Op(Op::Le),
            ('>', Some('=')) => Token::Op(Op::Ge),
            ('<', _) => {
                out.push(Token::Op(Op::Lt));
                continue;
            }
            ('>', _) => {
                out.push(Token::Op(Op::Gt));
                continue;
            }
            ('!', _) => {
                out.push(Token::Bang);
                continue;
            }
            ('+', _) => {
                out.push(Token::Op(Op::Add));
                continue;
            }
            ('-', _) => {
                out.push(Token::Minus);
                continue;
            }
            ('*', _) => {
                out.push(Token::Op(Op::Mul));
                continue;
            }
            ('/', _) => {
                out.push(Token::Op(Op::Div));
                continue;
            }
            ('(', _) => {
                out.push(Token::LParen);
                continue;
            }
            (')', _) => {
                out.push(Token::RParen);
                continue;
            }
            (',', _) => {
                out.push(Token::Comma);
                continue;
            }
            _ if c.is_ascii_digit() || c == '.' => {
                let mut end = start + c.len_utf8();
                let mut prev = c;
                while let Some(&(i, d)) = chars.peek() {
                    let exp_sign = (d == '+' || d == '-') && (prev == 'e' || prev == 'E');
                    if d.is_ascii_digit() || d == '.' || d == 'e' || d == 'E' || exp_sign {
                        end = i + d.len_utf8();
                        prev = d;
                        chars.next();
                    } else {
                        break;
                    }
                }
                let text = &input[start..end];
                let value = text
                    .parse::<f64>()
                    .map_err(|_| Error::Expression(format!("invalid number '{text}'")))?;
                out.push(Token::Num(value));
                continue;
            }
            _ if c.is_ascii_alphabetic() || c == '_' => {
                let mut end = start + c.len_utf8();
                while let Some(&(i, d)) = chars.peek() {
                    if d.is_ascii_alphanumeric() || d == '_' {
                        end = i + d.len_utf8();
                        chars.next();
                    } else {
                        break;
                    }
                }
                out.push(Token::Ident(input[start..end].to_string()));
                continue;
            }
            _ => {
                return Err(Error::Expression(format!(
                    "unexpected character '{c}' at offset {start}"
                )));
            }
        };
        // Two-character operator: consume the second character.
        chars.next();
        out.push(tok);
    }

    Ok(out)
}

/// Maximum nesting of sub-expressions.
const MAX_DEPTH: usize = 64;

struct Parser<'a> {
    tokens: &'a [Token],
    pos: usize,
    depth: usize,
    variables: Vec<String>,
}

impl Parser<'_> {
    fn bump(&mut self) -> Option<Token> {
        let tok = self.tokens.get(self.pos).cloned();
        if tok.is_some() {
            self.pos += 1;
        }
        tok
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn peek_infix(&self) -> Option<Op> {
        match self.peek()? {
            Token::Op(op) => Some(*op),
            Token::Minus => Some(Op::Sub),
            _ => None,
        }
    }

    fn slot(&mut self, name: &str) -> usize {
        match self.variables.iter().position(|v| v == name) {
            Some(i) => i,
            None => {
                self.variables.push(name.to_string());
                self.variables.len() - 1
            }
        }
    }

    fn parse_expr(&mut self, min_bp: u8) -> Result<Node> {
        if self.depth >= MAX_DEPTH {
            return Err(Error::Expression(format!("nesting deeper than {MAX_DEPTH}")));
        }
        self.depth += 1;
        let node = self.parse_binary(min_bp);
        self.depth -= 1;
        node
    }

    fn parse_binary(&mut self, min_bp: u8) -> Result<Node> {
        let mut lhs = self.parse_prefix()?;
        while let Some(op) = self.peek_infix() {
            let (l_bp, r_bp) = op.binding_power();
            if l_bp < min_bp {
                break;
            }
            self.pos += 1;
            let rhs = self.parse_expr(r_bp)?;
            lhs = Node::Binary(op, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_prefix(&mut self) -> Result<Node> {
        match self.bump() {
            Some(Token::Num(v)) => Ok(Node::Num(v)),
            Some(Token::Minus) => Ok(Node::Neg(Box::new(self.parse_expr(PREFIX_BP)?))),
            Some(Token::Bang) => Ok(Node::Not(Box::new(self.parse_expr(PREFIX_BP)?))),
            Some(Token::LParen) => {
                let inner = self.parse_expr(0)?;
                self.expect(Token::RParen)?;
                Ok(inner)
            }
            Some(Token::Ident(name)) if self.peek() == Some(&Token::LParen) => {
                self.pos += 1;
                self.parse_call(&name)
            }
            Some(Token::Ident(name)) => Ok(Node::Var(self.slot(&name))),
            other => Err(Error::Expression(format!(
                "expected a number, variable or '(', found {other:?}"
            ))),
        }
    }

    fn parse_call(&mut self, name: &str) -> Result<Node> {
        let (func, arity) = Func::lookup(name)
            .ok_or_else(|| Error::Expression(format!("unknown function '{name}'")))?;
        let mut args = vec![self.parse_expr(0)?];
        while self.peek() == Some(&Token::Comma) {
            self.pos += 1;
            args.push(self.parse_expr(0)?);
        }
        self.expect(Token::RParen)?;
        if args.len() != arity {
            return Err(Error::Expression(format!(
                "{name}() takes {arity} argument(s), got {}",
                args.len()
            )));
        }
        Ok(Node::Call(func, args))
    }

    fn expect(&mut self, want: Token) -> Result<()> {
        match self.bump() {
            Some(t) if t == want => Ok(()),
            other => Err(Error::Expression(format!("expected {want:?}, found {other:?}"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn eval_str(s: &str, vals: &[f64]) -> f64 {
        CompiledExpr::compile(s).unwrap().eval_row(vals)
    }

    #[test]
    fn deep_nesting_is_an_error() {
        let deep = format!("{}x{}", "(".repeat(200), ")".repeat(200));
        assert!(CompiledExpr::compile(&deep).is_err());
        let ok = format!("{}x{}", "(".repeat(10), ")".repeat(10));
        assert!(CompiledExpr::compile(&ok).is_ok());
    }

    #[test]
    fn precedence() {
        assert_eq!(eval_str("2 + 3 * 4", &[]), 14.0);
        assert_eq!(eval_str("(2 + 3) * 4", &[]), 20.0);
        assert_eq!(eval_str("10 - 4 - 3", &[]), 3.0);
        assert_eq!(eval_str("-2 * 3", &[]), -6.0);
    }

    #[test]
    fn cut_with_counts() {
        let e = CompiledExpr::compile("bjets_n >= 2 && meff_4j > 800").unwrap();
        assert_eq!(e.variables(), ["bjets_n", "meff_4j"]);
        assert_eq!(e.eval_row(&[2.0, 900.0]), 1.0);
        assert_eq!(e.eval_row(&[1.0, 900.0]), 0.0);
        assert_eq!(e.eval_row(&[3.0, 500.0]), 0.0);
    }

    #[test]
    fn or_not_and_functions() {
        assert_eq!(eval_str("!(x > 3) || y == 1", &[5.0, 1.0]), 1.0);
        assert_eq!(eval_str("!(x > 3) || y == 1", &[5.0, 0.0]), 0.0);
        assert_eq!(eval_str("abs(x) < 2.5", &[-2.0]), 1.0);
        assert_eq!(eval_str("max(a, b) - min(a, b)", &[3.0, 7.0]), 4.0);
        assert_eq!(eval_str("sqrt(x)", &[16.0]), 4.0);
    }

    #[test]
    fn scientific_notation_and_repeated_variables() {
        let e = CompiledExpr::compile("met > 2.5e2 && met < 1E3").unwrap();
        assert_eq!(e.variables(), ["met"]);
        assert_eq!(e.eval_row(&[300.0]), 1.0);
        assert_eq!(e.eval_row(&[1000.0]), 0.0);
    }

    #[test]
    fn bind_maps_to_catalogue_slots() {
        let catalogue = ["jets_n", "met", "Z_mass"];
        let e = CompiledExpr::compile("Z_mass > 81 && Z_mass < 101 && met < 50").unwrap();
        let bound = e.bind(|n| catalogue.iter().position(|c| *c == n)).unwrap();
        assert!(bound.passes(&[4.0, 20.0, 91.0]));
        assert!(!bound.passes(&[4.0, 80.0, 91.0]));
        assert_eq!(bound.source(), e.source());
    }

    #[test]
    fn bind_rejects_unknown_variables() {
        let e = CompiledExpr::compile("mystery > 1").unwrap();
        let err = e.bind(|_| None).unwrap_err();
        assert!(err.to_string().contains("mystery"));
    }

    #[test]
    fn syntax_errors() {
        assert!(CompiledExpr::compile("a >").is_err());
        assert!(CompiledExpr::compile("(a > 1").is_err());
        assert!(CompiledExpr::compile("a > 1)").is_err());
        assert!(CompiledExpr::compile("a $ 1").is_err());
        assert!(CompiledExpr::compile("pow(a, 2)").is_err());
        assert!(CompiledExpr::compile("min(a)").is_err());
    }
}
