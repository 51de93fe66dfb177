//! Calculator tool: evaluates arithmetic expressions.
//!
//! Supports `+`, `-`, `*`, `/`, floor division `//`, modulo `%`, power `**`,
//! parentheses, unary minus and decimal numbers. Uses a recursive-descent
//! parser; nothing outside this grammar is ever evaluated.

use async_trait::async_trait;
use toolloop_core::action::Arguments;
use toolloop_core::error::ToolError;
use toolloop_core::tool::{Parameter, ParameterKind, ParameterSchema, Tool, ToolOutput};

const MAX_INPUT_LEN: usize = 256;
const MAX_DEPTH: usize = 32;
const MAX_EXPONENT: f64 = 1024.0;

pub struct CalculatorTool;

#[async_trait]
impl Tool for CalculatorTool {
    fn name(&self) -> &str {
        "calculator"
    }

    fn description(&self) -> &str {
        "Evaluate a mathematical expression. Supports +, -, *, /, // (floor division), % (modulo), ** (power), parentheses, and decimal numbers."
    }

    fn parameters(&self) -> ParameterSchema {
        ParameterSchema::new(vec![Parameter::required(
            "expression",
            ParameterKind::String,
            "The mathematical expression to evaluate, e.g. '(2 + 3) * 4'",
        )])
    }

    async fn invoke(&self, arguments: &Arguments) -> Result<ToolOutput, ToolError> {
        let expr = arguments
            .get("expression")
            .and_then(|v| v.as_str())
            .ok_or_else(|| ToolError::InvalidArguments {
                tool_name: self.name().into(),
                reason: "missing 'expression' argument".into(),
            })?;

        let value = evaluate(expr).map_err(|reason| ToolError::ExecutionFailed {
            tool_name: self.name().into(),
            reason,
        })?;

        Ok(ToolOutput::Text(format_number(value)))
    }
}

/// Render integers without a trailing `.0`.
pub fn format_number(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        format!("{}", value)
    }
}

// ── Recursive-descent expression evaluator ────────────────────────────────

/// Evaluate a mathematical expression string.
pub fn evaluate(expr: &str) -> Result<f64, String> {
    if expr.len() > MAX_INPUT_LEN {
        return Err(format!(
            "Expression too long ({} characters, limit {MAX_INPUT_LEN})",
            expr.len()
        ));
    }
    let tokens = tokenize(expr)?;
    let mut parser = Parser::new(&tokens);
    let result = parser.parse_expr()?;
    if let Some(tok) = parser.peek() {
        return Err(format!(
            "Unexpected token at position {}: {:?}",
            parser.pos, tok
        ));
    }
    if !result.is_finite() {
        return Err("Result is not a finite number".into());
    }
    Ok(result)
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Number(f64),
    Plus,
    Minus,
    Star,
    StarStar,
    Slash,
    SlashSlash,
    Percent,
    LParen,
    RParen,
}

fn tokenize(input: &str) -> Result<Vec<Token>, String> {
    let mut tokens = Vec::new();
    let chars: Vec<char> = input.chars().collect();
    let mut i = 0;

    while i < chars.len() {
        let next = chars.get(i + 1).copied();
        match chars[i] {
            ' ' | '\t' | '\n' | '\r' => i += 1,
            '+' => { tokens.push(Token::Plus); i += 1; }
            '-' => { tokens.push(Token::Minus); i += 1; }
            '*' if next == Some('*') => { tokens.push(Token::StarStar); i += 2; }
            '*' => { tokens.push(Token::Star); i += 1; }
            '/' if next == Some('/') => { tokens.push(Token::SlashSlash); i += 2; }
            '/' => { tokens.push(Token::Slash); i += 1; }
            '%' => { tokens.push(Token::Percent); i += 1; }
            '(' => { tokens.push(Token::LParen); i += 1; }
            ')' => { tokens.push(Token::RParen); i += 1; }
            c if c.is_ascii_digit() || c == '.' => {
                let start = i;
                while i < chars.len() && (chars[i].is_ascii_digit() || chars[i] == '.') {
                    i += 1;
                }
                let num_str: String = chars[start..i].iter().collect();
                let num: f64 = num_str
                    .parse()
                    .map_err(|_| format!("Invalid number: {}", num_str))?;
                tokens.push(Token::Number(num));
            }
            c => return Err(format!("Unexpected character: '{}'", c)),
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

    fn consume(&mut self) -> Option<&Token> {
        let tok = self.tokens.get(self.pos);
        if tok.is_some() {
            self.pos += 1;
        }
        tok
    }

    fn descend(&mut self) -> Result<(), String> {
        self.depth += 1;
        if self.depth > MAX_DEPTH {
            return Err(format!("Expression nested too deeply (limit {MAX_DEPTH})"));
        }
        Ok(())
    }

    // expr = term (('+' | '-') term)*
    fn parse_expr(&mut self) -> Result<f64, String> {
        let mut left = self.parse_term()?;
        while let Some(op) = self.peek() {
            match op {
                Token::Plus => {
                    self.consume();
                    left += self.parse_term()?;
                }
                Token::Minus => {
                    self.consume();
                    left -= self.parse_term()?;
                }
                _ => break,
            }
        }
        Ok(left)
    }

    // term = unary (('*' | '/' | '//' | '%') unary)*
    fn parse_term(&mut self) -> Result<f64, String> {
        let mut left = self.parse_unary()?;
        while let Some(op) = self.peek().cloned() {
            match op {
                Token::Star => {
                    self.consume();
                    left *= self.parse_unary()?;
                }
                Token::Slash | Token::SlashSlash | Token::Percent => {
                    self.consume();
                    let right = self.parse_unary()?;
                    if right == 0.0 {
                        return Err("Division by zero".into());
                    }
                    left = match op {
                        Token::Slash => left / right,
                        Token::SlashSlash => (left / right).floor(),
                        // Sign follows the divisor
                        _ => left - right * (left / right).floor(),
                    };
                }
                _ => break,
            }
        }
        Ok(left)
    }

    // unary = '-' unary | '+' unary | power
    fn parse_unary(&mut self) -> Result<f64, String> {
        match self.peek() {
            Some(Token::Minus) => {
                self.consume();
                self.descend()?;
                let val = self.parse_unary()?;
                self.depth -= 1;
                Ok(-val)
            }
            Some(Token::Plus) => {
                self.consume();
                self.descend()?;
                let val = self.parse_unary()?;
                self.depth -= 1;
                Ok(val)
            }
            _ => self.parse_power(),
        }
    }

    // power = primary ('**' unary)?   (right-associative, binds tighter than unary on the left)
    fn parse_power(&mut self) -> Result<f64, String> {
        let base = self.parse_primary()?;
        if let Some(Token::StarStar) = self.peek() {
            self.consume();
            self.descend()?;
            let exponent = self.parse_unary()?;
            self.depth -= 1;
            if exponent.abs() > MAX_EXPONENT {
                return Err(format!("Exponent too large (limit {MAX_EXPONENT})"));
            }
            return Ok(base.powf(exponent));
        }
        Ok(base)
    }

    // primary = NUMBER | '(' expr ')'
    fn parse_primary(&mut self) -> Result<f64, String> {
        match self.consume() {
            Some(Token::Number(n)) => Ok(*n),
            Some(Token::LParen) => {
                self.descend()?;
                let val = self.parse_expr()?;
                self.depth -= 1;
                match self.consume() {
                    Some(Token::RParen) => Ok(val),
                    _ => Err("Expected closing parenthesis".into()),
                }
            }
            Some(tok) => Err(format!("Unexpected token: {:?}", tok)),
            None => Err("Unexpected end of expression".into()),
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────
