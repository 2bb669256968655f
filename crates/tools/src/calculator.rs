//! Calculator tool: a sandboxed expression evaluator.
//!
//! Accepts arithmetic (`+ - * / // % **`), comparisons (chained), boolean
//! logic (`and`, `or`, `not`, `True`, `False`) and the `math` namespace
//! (`math.sqrt(2)`, `math.pi`, ...). There are no names, assignments or
//! calls outside `math`, so nothing can reach the filesystem or network.
//! Uses a recursive-descent parser; no dependencies beyond std.

use async_trait::async_trait;
use sleuth_core::error::ToolError;
use sleuth_core::tool::{OutputSchema, Tool, ToolResult};

use crate::records::ExecResult;

const MAX_EXPRESSION_CHARS: usize = 500;
const MAX_NESTING: usize = 64;

pub struct CalculatorTool;

#[async_trait]
impl Tool for CalculatorTool {
    fn name(&self) -> &str {
        "calculator"
    }

    fn description(&self) -> &str {
        "Safely evaluate an expression for calculations. Supports arithmetic \
         (+, -, *, /, //, %, **), comparisons, and/or/not, True/False and math.* \
         functions and constants (e.g. math.sqrt, math.log, math.pi). \
         No imports, assignments or other names."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "expression": {
                    "type": "string",
                    "description": "The expression to evaluate, e.g. 'math.sqrt(2) * (3 + 4)'"
                }
            },
            "required": ["expression"]
        })
    }

    fn output_schema(&self) -> Option<OutputSchema> {
        Some(ExecResult::schema())
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<ToolResult, ToolError> {
        let expr = arguments["expression"]
            .as_str()
            .ok_or_else(|| ToolError::InvalidArguments("Missing 'expression' argument".into()))?;

        ToolResult::structured(&run(expr))
    }
}

/// Evaluate `expression` into an [`ExecResult`]. Never fails; problems are
/// reported through `ok = false` and the result text.
pub fn run(expression: &str) -> ExecResult {
    let trimmed = expression.trim();
    let result = if trimmed.chars().count() > MAX_EXPRESSION_CHARS {
        Err("Expression too long".to_string())
    } else {
        match evaluate(trimmed) {
            Ok(value) => Ok(value.to_string()),
            Err(CalcError::Unsafe) => {
                Err("Expression contains unsupported or unsafe constructs".to_string())
            }
            Err(CalcError::Invalid(msg)) => Err(format!("Execution error: {msg}")),
        }
    };

    match result {
        Ok(result) => ExecResult {
            expression: expression.to_string(),
            result,
            ok: true,
        },
        Err(result) => ExecResult {
            expression: expression.to_string(),
            result,
            ok: false,
        },
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum CalcError {
    /// A name or construct outside the allowed grammar.
    Unsafe,
    /// Syntax or evaluation error.
    Invalid(String),
}

impl From<String> for CalcError {
    fn from(msg: String) -> Self {
        Self::Invalid(msg)
    }
}

impl From<&str> for CalcError {
    fn from(msg: &str) -> Self {
        Self::Invalid(msg.to_string())
    }
}

/// A computed value. Integers stay exact until an operation needs floats.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Value {
    Int(i64),
    Float(f64),
    Bool(bool),
}

impl Value {
    fn as_f64(self) -> f64 {
        match self {
            Value::Int(i) => i as f64,
            Value::Float(f) => f,
            Value::Bool(b) => f64::from(u8::from(b)),
        }
    }

    /// Integer view, with booleans counting as 0/1.
    fn as_int(self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(i),
            Value::Bool(b) => Some(i64::from(b)),
            Value::Float(_) => None,
        }
    }

    fn truthy(self) -> bool {
        match self {
            Value::Int(i) => i != 0,
            Value::Float(f) => f != 0.0,
            Value::Bool(b) => b,
        }
    }
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Int(i) => write!(f, "{i}"),
            Value::Bool(true) => write!(f, "True"),
            Value::Bool(false) => write!(f, "False"),
            Value::Float(x) if x.is_nan() => write!(f, "nan"),
            Value::Float(x) if x.is_infinite() => {
                write!(f, "{}", if *x > 0.0 { "inf" } else { "-inf" })
            }
            Value::Float(x) if x.fract() == 0.0 && x.abs() < 1e16 => write!(f, "{x:.1}"),
            Value::Float(x) => write!(f, "{x}"),
        }
    }
}

/// Evaluate an expression string.
pub fn evaluate(expr: &str) -> Result<Value, CalcError> {
    let tokens = tokenize(expr)?;
    let mut parser = Parser::new(&tokens);
    let result = parser.parse_or()?;
    if let Some(tok) = parser.peek() {
        return Err(format!("Unexpected token at position {}: {tok:?}", parser.pos).into());
    }
    Ok(result)
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Int(i64),
    Float(f64),
    Name(String),
    Plus,
    Minus,
    Star,
    DoubleStar,
    Slash,
    DoubleSlash,
    Percent,
    LParen,
    RParen,
    Comma,
    Dot,
    Lt,
    Le,
    Gt,
    Ge,
    EqEq,
    NotEq,
}

const KEYWORDS: &[&str] = &["and", "or", "not", "True", "False", "math"];

fn tokenize(input: &str) -> Result<Vec<Token>, CalcError> {
    let mut tokens = Vec::new();
    let chars: Vec<char> = input.chars().collect();
    let mut i = 0;

    let next_is = |i: usize, c: char| chars.get(i + 1) == Some(&c);

    while i < chars.len() {
        match chars[i] {
            ' ' | '\t' | '\n' | '\r' => i += 1,
            '+' => { tokens.push(Token::Plus); i += 1; }
            '-' => { tokens.push(Token::Minus); i += 1; }
            '*' if next_is(i, '*') => { tokens.push(Token::DoubleStar); i += 2; }
            '*' => { tokens.push(Token::Star); i += 1; }
            '/' if next_is(i, '/') => { tokens.push(Token::DoubleSlash); i += 2; }
            '/' => { tokens.push(Token::Slash); i += 1; }
            '%' => { tokens.push(Token::Percent); i += 1; }
            '(' => { tokens.push(Token::LParen); i += 1; }
            ')' => { tokens.push(Token::RParen); i += 1; }
            ',' => { tokens.push(Token::Comma); i += 1; }
            '<' if next_is(i, '=') => { tokens.push(Token::Le); i += 2; }
            '<' => { tokens.push(Token::Lt); i += 1; }
            '>' if next_is(i, '=') => { tokens.push(Token::Ge); i += 2; }
            '>' => { tokens.push(Token::Gt); i += 1; }
            '=' if next_is(i, '=') => { tokens.push(Token::EqEq); i += 2; }
            '!' if next_is(i, '=') => { tokens.push(Token::NotEq); i += 2; }
            '.' if !chars.get(i + 1).is_some_and(|c| c.is_ascii_digit()) => {
                tokens.push(Token::Dot);
                i += 1;
            }
            c if c.is_ascii_digit() || c == '.' => {
                let start = i;
                let mut is_float = false;
                while i < chars.len() {
                    match chars[i] {
                        '0'..='9' | '_' => i += 1,
                        '.' => { is_float = true; i += 1; }
                        'e' | 'E' => {
                            is_float = true;
                            i += 1;
                            if matches!(chars.get(i), Some('+') | Some('-')) {
                                i += 1;
                            }
                        }
                        _ => break,
                    }
                }
                let literal: String = chars[start..i].iter().filter(|c| **c != '_').collect();
                let token = if is_float {
                    literal.parse().map(Token::Float).ok()
                } else {
                    literal.parse().map(Token::Int).ok()
                };
                tokens.push(token.ok_or_else(|| format!("Invalid number: {literal}"))?);
            }
            c if c.is_alphabetic() || c == '_' => {
                let start = i;
                while i < chars.len() && (chars[i].is_alphanumeric() || chars[i] == '_') {
                    i += 1;
                }
                let name: String = chars[start..i].iter().collect();
                // Attribute names after `math.` are checked by the parser.
                let after_dot = tokens.last() == Some(&Token::Dot);
                if !after_dot && !KEYWORDS.contains(&name.as_str()) {
                    return Err(CalcError::Unsafe);
                }
                tokens.push(Token::Name(name));
            }
            '"' | '\'' | '[' | ']' | '{' | '}' | '=' | ':' | ';' | '@' | '~' | '&' | '|' | '^' => {
                return Err(CalcError::Unsafe);
            }
            c => return Err(format!("Unexpected character: '{c}'").into()),
        }
    }

    Ok(tokens)
}

struct Parser<'a> {
    tokens: &'a [Token],
    pos: usize,
    depth: usize,
}

impl<'a> Parser<'a> {
    fn new(tokens: &'a [Token]) -> Self {
        Self { tokens, pos: 0, depth: 0 }
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn peek_name(&self, name: &str) -> bool {
        matches!(self.peek(), Some(Token::Name(n)) if n == name)
    }

    fn consume(&mut self) -> Option<&Token> {
        let tok = self.tokens.get(self.pos);
        if tok.is_some() {
            self.pos += 1;
        }
        tok
    }

    fn expect(&mut self, expected: Token) -> Result<(), CalcError> {
        match self.consume() {
            Some(tok) if *tok == expected => Ok(()),
            Some(tok) => Err(format!("Expected {expected:?}, found {tok:?}").into()),
            None => Err(format!("Expected {expected:?}, found end of expression").into()),
        }
    }

    // or = and ('or' and)*
    fn parse_or(&mut self) -> Result<Value, CalcError> {
        self.depth += 1;
        if self.depth > MAX_NESTING {
            return Err("Expression nested too deeply".into());
        }
        let mut left = self.parse_and()?;
        while self.peek_name("or") {
            self.consume();
            let right = self.parse_and()?;
            if !left.truthy() {
                left = right;
            }
        }
        self.depth -= 1;
        Ok(left)
    }

    // and = not ('and' not)*
    fn parse_and(&mut self) -> Result<Value, CalcError> {
        let mut left = self.parse_not()?;
        while self.peek_name("and") {
            self.consume();
            let right = self.parse_not()?;
            if left.truthy() {
                left = right;
            }
        }
        Ok(left)
    }

    // not = 'not' not | comparison
    fn parse_not(&mut self) -> Result<Value, CalcError> {
        if self.peek_name("not") {
            self.consume();
            let val = self.parse_not()?;
            return Ok(Value::Bool(!val.truthy()));
        }
        self.parse_comparison()
    }

    // comparison = sum (cmp_op sum)*, chained like `a < b < c`
    fn parse_comparison(&mut self) -> Result<Value, CalcError> {
        let first = self.parse_sum()?;
        let mut left = first;
        let mut outcome: Option<bool> = None;

        loop {
            let op = match self.peek() {
                Some(tok @ (Token::Lt | Token::Le | Token::Gt | Token::Ge | Token::EqEq | Token::NotEq)) => tok.clone(),
                _ => break,
            };
            self.consume();
            let right = self.parse_sum()?;
            let (a, b) = (left.as_f64(), right.as_f64());
            let holds = match op {
                Token::Lt => a < b,
                Token::Le => a <= b,
                Token::Gt => a > b,
                Token::Ge => a >= b,
                Token::EqEq => a == b,
                _ => a != b,
            };
            outcome = Some(outcome.unwrap_or(true) && holds);
            left = right;
        }

        Ok(outcome.map_or(first, Value::Bool))
    }

    // sum = term (('+' | '-') term)*
    fn parse_sum(&mut self) -> Result<Value, CalcError> {
        let mut left = self.parse_term()?;
        loop {
            match self.peek() {
                Some(Token::Plus) => {
                    self.consume();
                    let right = self.parse_term()?;
                    left = int_or_float(left, right, i64::checked_add, |a, b| a + b);
                }
                Some(Token::Minus) => {
                    self.consume();
                    let right = self.parse_term()?;
                    left = int_or_float(left, right, i64::checked_sub, |a, b| a - b);
                }
                _ => break,
            }
        }
        Ok(left)
    }

    // term = unary (('*' | '/' | '//' | '%') unary)*
    fn parse_term(&mut self) -> Result<Value, CalcError> {
        let mut left = self.parse_unary()?;
        loop {
            match self.peek() {
                Some(Token::Star) => {
                    self.consume();
                    let right = self.parse_unary()?;
                    left = int_or_float(left, right, i64::checked_mul, |a, b| a * b);
                }
                Some(Token::Slash) => {
                    self.consume();
                    let right = self.parse_unary()?;
                    if right.as_f64() == 0.0 {
                        return Err("division by zero".into());
                    }
                    left = Value::Float(left.as_f64() / right.as_f64());
                }
                Some(Token::DoubleSlash) => {
                    self.consume();
                    let right = self.parse_unary()?;
                    if right.as_f64() == 0.0 {
                        return Err("integer division or modulo by zero".into());
                    }
                    left = match (left.as_int(), right.as_int()) {
                        (Some(a), Some(b)) => match (a.checked_div(b), a.checked_rem(b)) {
                            (Some(q), Some(r)) if r != 0 && (r < 0) != (b < 0) => Value::Int(q - 1),
                            (Some(q), Some(_)) => Value::Int(q),
                            _ => Value::Float((a as f64 / b as f64).floor()),
                        },
                        _ => Value::Float((left.as_f64() / right.as_f64()).floor()),
                    };
                }
                Some(Token::Percent) => {
                    self.consume();
                    let right = self.parse_unary()?;
                    if right.as_f64() == 0.0 {
                        return Err("integer division or modulo by zero".into());
                    }
                    left = match (left.as_int(), right.as_int()) {
                        (Some(a), Some(b)) => match a.checked_rem(b) {
                            Some(r) if r != 0 && (r < 0) != (b < 0) => Value::Int(r + b),
                            Some(r) => Value::Int(r),
                            None => Value::Int(0),
                        },
                        _ => {
                            let (a, b) = (left.as_f64(), right.as_f64());
                            Value::Float(a - b * (a / b).floor())
                        }
                    };
                }
                _ => break,
            }
        }
        Ok(left)
    }

    // unary = ('-' | '+') unary | power
    fn parse_unary(&mut self) -> Result<Value, CalcError> {
        match self.peek() {
            Some(Token::Minus) => {
                self.consume();
                let val = self.parse_unary()?;
                Ok(match val.as_int() {
                    Some(i) => i.checked_neg().map_or(Value::Float(-(i as f64)), Value::Int),
                    None => Value::Float(-val.as_f64()),
                })
            }
            Some(Token::Plus) => {
                self.consume();
                let val = self.parse_unary()?;
                Ok(val.as_int().map_or(val, Value::Int))
            }
            _ => self.parse_power(),
        }
    }

    // power = primary ('**' unary)?   (right-associative, binds tighter than unary minus on the left)
    fn parse_power(&mut self) -> Result<Value, CalcError> {
        let base = self.parse_primary()?;
        if let Some(Token::DoubleStar) = self.peek() {
            self.consume();
            let exp = self.parse_unary()?;
            return power(base, exp);
        }
        Ok(base)
    }

    // primary = INT | FLOAT | True | False | '(' or ')' | math '.' NAME ['(' args ')']
    fn parse_primary(&mut self) -> Result<Value, CalcError> {
        match self.consume().cloned() {
            Some(Token::Int(n)) => Ok(Value::Int(n)),
            Some(Token::Float(n)) => Ok(Value::Float(n)),
            Some(Token::Name(name)) => match name.as_str() {
                "True" => Ok(Value::Bool(true)),
                "False" => Ok(Value::Bool(false)),
                "math" => self.parse_math(),
                _ => Err(CalcError::Unsafe),
            },
            Some(Token::LParen) => {
                let val = self.parse_or()?;
                match self.consume() {
                    Some(Token::RParen) => Ok(val),
                    _ => Err("Expected closing parenthesis".into()),
                }
            }
            Some(tok) => Err(format!("Unexpected token: {tok:?}").into()),
            None => Err("Unexpected end of expression".into()),
        }
    }

    fn parse_math(&mut self) -> Result<Value, CalcError> {
        self.expect(Token::Dot)?;
        let name = match self.consume() {
            Some(Token::Name(n)) => n.clone(),
            _ => return Err(CalcError::Unsafe),
        };

        if let Some(Token::LParen) = self.peek() {
            self.consume();
            let mut args = Vec::new();
            if let Some(Token::RParen) = self.peek() {
                self.consume();
            } else {
                loop {
                    args.push(self.parse_or()?);
                    match self.consume() {
                        Some(Token::Comma) => continue,
                        Some(Token::RParen) => break,
                        _ => return Err("Expected ',' or ')' in argument list".into()),
                    }
                }
            }
            return call_math(&name, &args);
        }

        match name.as_str() {
            "pi" => Ok(Value::Float(std::f64::consts::PI)),
            "e" => Ok(Value::Float(std::f64::consts::E)),
            "tau" => Ok(Value::Float(std::f64::consts::TAU)),
            "inf" => Ok(Value::Float(f64::INFINITY)),
            "nan" => Ok(Value::Float(f64::NAN)),
            _ => Err(format!("module 'math' has no attribute '{name}'").into()),
        }
    }
}

fn int_or_float(
    a: Value,
    b: Value,
    int_op: fn(i64, i64) -> Option<i64>,
    float_op: fn(f64, f64) -> f64,
) -> Value {
    match (a.as_int(), b.as_int()) {
        (Some(x), Some(y)) => int_op(x, y)
            .map(Value::Int)
            .unwrap_or_else(|| Value::Float(float_op(x as f64, y as f64))),
        _ => Value::Float(float_op(a.as_f64(), b.as_f64())),
    }
}

fn power(base: Value, exp: Value) -> Result<Value, CalcError> {
    if let (Some(b), Some(e)) = (base.as_int(), exp.as_int()) {
        if e >= 0 {
            if let Some(v) = u32::try_from(e).ok().and_then(|e| b.checked_pow(e)) {
                return Ok(Value::Int(v));
            }
        } else if b == 0 {
            return Err("0.0 cannot be raised to a negative power".into());
        }
    }
    let result = base.as_f64().powf(exp.as_f64());
    if result.is_nan() && !base.as_f64().is_nan() && !exp.as_f64().is_nan() {
        return Err("math domain error".into());
    }
    Ok(Value::Float(result))
}

fn call_math(name: &str, args: &[Value]) -> Result<Value, CalcError> {
    let arity = |n: usize| -> Result<(), CalcError> {
        if args.len() == n {
            Ok(())
        } else {
            Err(format!("math.{name}() takes exactly {n} argument(s) ({} given)", args.len()).into())
        }
    };
    let domain = |ok: bool, v: f64| -> Result<Value, CalcError> {
        if ok {
            Ok(Value::Float(v))
        } else {
            Err("math domain error".into())
        }
    };
    let to_int = |v: f64| -> Result<Value, CalcError> {
        if v.is_finite() && v.abs() < 9.2e18 {
            Ok(Value::Int(v as i64))
        } else {
            Err("cannot convert float infinity or NaN to integer".into())
        }
    };
    let x = || args[0].as_f64();

    match name {
        "sqrt" => {
            arity(1)?;
            domain(x() >= 0.0, x().sqrt())
        }
        "exp" => {
            arity(1)?;
            Ok(Value::Float(x().exp()))
        }
        "log" => match args.len() {
            1 => domain(x() > 0.0, x().ln()),
            2 => {
                let base = args[1].as_f64();
                domain(x() > 0.0 && base > 0.0 && base != 1.0, x().ln() / base.ln())
            }
            n => Err(format!("math.log() takes 1 or 2 arguments ({n} given)").into()),
        },
        "log10" => {
            arity(1)?;
            domain(x() > 0.0, x().log10())
        }
        "log2" => {
            arity(1)?;
            domain(x() > 0.0, x().log2())
        }
        "sin" => {
            arity(1)?;
            Ok(Value::Float(x().sin()))
        }
        "cos" => {
            arity(1)?;
            Ok(Value::Float(x().cos()))
        }
        "tan" => {
            arity(1)?;
            Ok(Value::Float(x().tan()))
        }
        "asin" => {
            arity(1)?;
            domain((-1.0..=1.0).contains(&x()), x().asin())
        }
        "acos" => {
            arity(1)?;
            domain((-1.0..=1.0).contains(&x()), x().acos())
        }
        "atan" => {
            arity(1)?;
            Ok(Value::Float(x().atan()))
        }
        "atan2" => {
            arity(2)?;
            Ok(Value::Float(x().atan2(args[1].as_f64())))
        }
        "sinh" => {
            arity(1)?;
            Ok(Value::Float(x().sinh()))
        }
        "cosh" => {
            arity(1)?;
            Ok(Value::Float(x().cosh()))
        }
        "tanh" => {
            arity(1)?;
            Ok(Value::Float(x().tanh()))
        }
        "degrees" => {
            arity(1)?;
            Ok(Value::Float(x().to_degrees()))
        }
        "radians" => {
            arity(1)?;
            Ok(Value::Float(x().to_radians()))
        }
        "fabs" => {
            arity(1)?;
            Ok(Value::Float(x().abs()))
        }
        "pow" => {
            arity(2)?;
            Ok(Value::Float(x().powf(args[1].as_f64())))
        }
        "hypot" => {
            let sum: f64 = args.iter().map(|v| v.as_f64().powi(2)).sum();
            Ok(Value::Float(sum.sqrt()))
        }
        "floor" => {
            arity(1)?;
            args[0]
                .as_int()
                .map_or_else(|| to_int(x().floor()), |i| Ok(Value::Int(i)))
        }
        "ceil" => {
            arity(1)?;
            args[0]
                .as_int()
                .map_or_else(|| to_int(x().ceil()), |i| Ok(Value::Int(i)))
        }
        "trunc" => {
            arity(1)?;
            args[0]
                .as_int()
                .map_or_else(|| to_int(x().trunc()), |i| Ok(Value::Int(i)))
        }
        "factorial" => {
            arity(1)?;
            let n = args[0]
                .as_int()
                .ok_or("factorial() only accepts integral values")?;
            if n < 0 {
                return Err("factorial() not defined for negative values".into());
            }
            (1..=n)
                .try_fold(1i64, |acc, k| acc.checked_mul(k))
                .map(Value::Int)
                .ok_or_else(|| "factorial() result too large".into())
        }
        "gcd" => {
            let mut acc = 0u64;
            for v in args {
                let mut b = v
                    .as_int()
                    .ok_or("gcd() only accepts integers")?
                    .unsigned_abs();
                let mut a = acc;
                while b != 0 {
                    (a, b) = (b, a % b);
                }
                acc = a;
            }
            i64::try_from(acc)
                .map(Value::Int)
                .map_err(|_| "gcd() result too large".into())
        }
        "isclose" => {
            arity(2)?;
            let (a, b) = (x(), args[1].as_f64());
            Ok(Value::Bool((a - b).abs() <= 1e-9 * a.abs().max(b.abs())))
        }
        _ => Err(format!("module 'math' has no attribute '{name}'").into()),
    }
}
