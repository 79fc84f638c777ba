//! Value expressions
//!
//! The text body of `<direction>`, `<speed>`, `<wait>`, `<param>` and friends is a
//! small arithmetic language:
//!
//! - numbers, `+ - * / %`, unary minus, parentheses
//! - `$rand` (uniform in [0, 1)), `$rank` (difficulty in [0, 1])
//! - `$1`, `$2`, ... positional parameters bound at `*Ref` call sites
//! - `$direction` (degrees) and `$speed` of the bullet evaluating the expression

use rand::Rng;
use rand_pcg::Pcg32;

use crate::consts::{MAX_EXPR_DEPTH, MAX_EXPR_OPS, SPEED_EPSILON};
use crate::error::{PatternError, Result};

/// Binary operators, lowest precedence first
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
}

/// A parsed value expression
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Const(f32),
    /// Zero-based index into the parameter list (`$1` is index 0)
    Param(usize),
    Rand,
    Rank,
    Direction,
    Speed,
    Neg(Box<Expr>),
    Binary(BinOp, Box<Expr>, Box<Expr>),
}

/// Everything an expression can read while it is evaluated
pub struct EvalScope<'a> {
    pub params: &'a [f32],
    pub rank: f32,
    pub rng: &'a mut Pcg32,
    /// Current bullet direction in degrees
    pub direction: f32,
    pub speed: f32,
}

impl Expr {
    /// Parse an expression from its source text
    pub fn parse(text: &str) -> Result<Expr> {
        let mut parser = Parser {
            text,
            chars: text.chars().collect(),
            pos: 0,
            depth: 0,
            ops: 0,
        };
        let expr = parser.expr()?;
        parser.skip_ws();
        if parser.pos < parser.chars.len() {
            return Err(parser.error(format!(
                "unexpected '{}' at {}",
                parser.chars[parser.pos], parser.pos
            )));
        }
        Ok(expr)
    }

    pub fn eval(&self, scope: &mut EvalScope<'_>) -> f32 {
        match self {
            Expr::Const(v) => *v,
            Expr::Param(i) => scope.params.get(*i).copied().unwrap_or(0.0),
            Expr::Rand => scope.rng.random::<f32>(),
            Expr::Rank => scope.rank,
            Expr::Direction => scope.direction,
            Expr::Speed => scope.speed,
            Expr::Neg(e) => -e.eval(scope),
            Expr::Binary(op, a, b) => {
                let a = a.eval(scope);
                let b = b.eval(scope);
                match op {
                    BinOp::Add => a + b,
                    BinOp::Sub => a - b,
                    BinOp::Mul => a * b,
                    // Degenerate divisors floor to zero instead of producing inf/NaN
                    BinOp::Div if b.abs() < SPEED_EPSILON => 0.0,
                    BinOp::Rem if b.abs() < SPEED_EPSILON => 0.0,
                    BinOp::Div => a / b,
                    BinOp::Rem => a % b,
                }
            }
        }
    }
}

/// Recursive descent over the expression text
struct Parser<'a> {
    text: &'a str,
    chars: Vec<char>,
    pos: usize,
    /// Current parenthesis/unary nesting
    depth: usize,
    /// Binary operators seen so far
    ops: usize,
}

impl Parser<'_> {
    fn error(&self, reason: impl Into<String>) -> PatternError {
        PatternError::expression(self.text.trim(), reason)
    }

    fn enter(&mut self) -> Result<()> {
        self.depth += 1;
        if self.depth > MAX_EXPR_DEPTH {
            return Err(self.error(format!("nested deeper than {} levels", MAX_EXPR_DEPTH)));
        }
        Ok(())
    }

    fn leave(&mut self) {
        self.depth -= 1;
    }

    fn binary(&mut self, op: BinOp, lhs: Expr, rhs: Expr) -> Result<Expr> {
        self.ops += 1;
        if self.ops > MAX_EXPR_OPS {
            return Err(self.error(format!("more than {} operators", MAX_EXPR_OPS)));
        }
        Ok(Expr::Binary(op, Box::new(lhs), Box::new(rhs)))
    }

    fn skip_ws(&mut self) {
        while self.pos < self.chars.len() && self.chars[self.pos].is_whitespace() {
            self.pos += 1;
        }
    }

    fn peek(&mut self) -> Option<char> {
        self.skip_ws();
        self.chars.get(self.pos).copied()
    }

    fn expr(&mut self) -> Result<Expr> {
        let mut lhs = self.term()?;
        while let Some(c) = self.peek() {
            let op = match c {
                '+' => BinOp::Add,
                '-' => BinOp::Sub,
                _ => break,
            };
            self.pos += 1;
            let rhs = self.term()?;
            lhs = self.binary(op, lhs, rhs)?;
        }
        Ok(lhs)
    }

    fn term(&mut self) -> Result<Expr> {
        let mut lhs = self.unary()?;
        while let Some(c) = self.peek() {
            let op = match c {
                '*' => BinOp::Mul,
                '/' => BinOp::Div,
                '%' => BinOp::Rem,
                _ => break,
            };
            self.pos += 1;
            let rhs = self.unary()?;
            lhs = self.binary(op, lhs, rhs)?;
        }
        Ok(lhs)
    }

    fn unary(&mut self) -> Result<Expr> {
        match self.peek() {
            Some('-') => {
                self.pos += 1;
                self.enter()?;
                let operand = self.unary()?;
                self.leave();
                Ok(match operand {
                    Expr::Const(v) => Expr::Const(-v),
                    e => Expr::Neg(Box::new(e)),
                })
            }
            Some('+') => {
                self.pos += 1;
                self.enter()?;
                let operand = self.unary()?;
                self.leave();
                Ok(operand)
            }
            _ => self.primary(),
        }
    }

    fn primary(&mut self) -> Result<Expr> {
        match self.peek() {
            Some('(') => {
                self.pos += 1;
                self.enter()?;
                let inner = self.expr()?;
                if self.peek() != Some(')') {
                    return Err(self.error("missing ')'"));
                }
                self.pos += 1;
                self.leave();
                Ok(inner)
            }
            Some('$') => {
                self.pos += 1;
                self.variable()
            }
            Some(c) if c.is_ascii_digit() || c == '.' => self.number(),
            Some(c) => Err(self.error(format!("unexpected '{}' at {}", c, self.pos))),
            None => Err(self.error("unexpected end of expression")),
        }
    }

    fn number(&mut self) -> Result<Expr> {
        let start = self.pos;
        while self.pos < self.chars.len()
            && (self.chars[self.pos].is_ascii_digit() || self.chars[self.pos] == '.')
        {
            self.pos += 1;
        }
        let literal: String = self.chars[start..self.pos].iter().collect();
        literal
            .parse::<f32>()
            .map(Expr::Const)
            .map_err(|_| self.error(format!("bad number '{}'", literal)))
    }

    fn variable(&mut self) -> Result<Expr> {
        let start = self.pos;
        while self.pos < self.chars.len() && self.chars[self.pos].is_ascii_alphanumeric() {
            self.pos += 1;
        }
        let name: String = self.chars[start..self.pos].iter().collect();
        match name.as_str() {
            "rand" => Ok(Expr::Rand),
            "rank" => Ok(Expr::Rank),
            "direction" => Ok(Expr::Direction),
            "speed" => Ok(Expr::Speed),
            n => match n.parse::<usize>() {
                Ok(i) if i >= 1 => Ok(Expr::Param(i - 1)),
                _ => Err(self.error(format!("unknown variable '${}'", n))),
            },
        }
    }
}
