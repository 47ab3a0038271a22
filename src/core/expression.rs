//! Peak functions: arithmetic over `peak(<reference>)` terms.
//!
//! ```text
//! expression = term { ("+" | "-") term }
//! term       = unary { ("*" | "/") unary }
//! unary      = ("+" | "-") unary | primary
//! primary    = number
//!            | "(" expression ")"
//!            | "peak" "(" identifier ")"
//!            | function "(" arguments ")"
//! ```

use std::{collections::BTreeMap, str::FromStr};

use crate::prelude::*;

/// Deepest accepted nesting of parentheses, calls and unary signs.
const MAX_DEPTH: usize = 64;

/// Longest accepted formula, this also bounds the depth of operator chains.
const MAX_TOKENS: usize = 1024;

/// Peak values by component reference.
pub type PeakValues = BTreeMap<String, f64>;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Operator {
    Add,
    Subtract,
    Multiply,
    Divide,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Function {
    Max,
    Min,
    Abs,
    Round,
}

impl Function {
    fn from_name(name: &str) -> Option<Self> {
        match name {
            "max" => Some(Self::Max),
            "min" => Some(Self::Min),
            "abs" => Some(Self::Abs),
            "round" => Some(Self::Round),
            _ => None,
        }
    }

    const fn accepts(self, n_arguments: usize) -> bool {
        match self {
            Self::Max | Self::Min => n_arguments >= 2,
            Self::Abs => n_arguments == 1,
            Self::Round => n_arguments == 1 || n_arguments == 2,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum Expression {
    Number(f64),
    Peak(String),
    Negate(Box<Self>),
    Binary(Box<Self>, Operator, Box<Self>),
    Call(Function, Vec<Self>),
}

/// Parsed peak function, evaluated against any number of peak value mappings.
#[derive(Clone, Debug, PartialEq)]
pub struct PeakFunction {
    source: String,
    expression: Expression,
}

impl PeakFunction {
    pub fn parse(source: &str) -> Result<Self> {
        let tokens = tokenize(source)?;
        if tokens.len() > MAX_TOKENS {
            return Err(Error::malformed_expression(source, "expression is too long"));
        }
        let mut parser = Parser { source, tokens: &tokens, position: 0, depth: 0 };
        let expression = parser.expression()?;
        if let Some(token) = parser.peek() {
            let reason = format!("unexpected trailing `{token:?}`");
            return Err(Error::malformed_expression(source, reason));
        }
        Ok(Self { source: source.to_owned(), expression })
    }

    #[must_use]
    pub fn source(&self) -> &str {
        &self.source
    }

    #[must_use]
    pub const fn expression(&self) -> &Expression {
        &self.expression
    }

    pub fn evaluate(&self, values: &PeakValues) -> Result<f64> {
        let value = self.evaluate_node(&self.expression, values)?;
        if value.is_finite() {
            Ok(value)
        } else {
            Err(self.malformed("non-finite result"))
        }
    }

    fn malformed(&self, reason: impl Into<String>) -> Error {
        Error::malformed_expression(&self.source, reason)
    }

    fn evaluate_node(&self, expression: &Expression, values: &PeakValues) -> Result<f64> {
        match expression {
            Expression::Number(value) => Ok(*value),
            Expression::Peak(reference) => values
                .get(reference)
                .copied()
                .ok_or_else(|| Error::UnknownPeakReference(reference.clone())),
            Expression::Negate(operand) => Ok(-self.evaluate_node(operand, values)?),
            Expression::Binary(lhs, operator, rhs) => {
                let lhs = self.evaluate_node(lhs, values)?;
                let rhs = self.evaluate_node(rhs, values)?;
                match operator {
                    Operator::Add => Ok(lhs + rhs),
                    Operator::Subtract => Ok(lhs - rhs),
                    Operator::Multiply => Ok(lhs * rhs),
                    Operator::Divide if rhs == 0.0 => Err(self.malformed("division by zero")),
                    Operator::Divide => Ok(lhs / rhs),
                }
            }
            Expression::Call(function, arguments) => {
                let arguments = arguments
                    .iter()
                    .map(|argument| self.evaluate_node(argument, values))
                    .collect::<Result<Vec<f64>>>()?;
                match (function, arguments.as_slice()) {
                    (Function::Max, _) => {
                        Ok(arguments.iter().copied().fold(f64::NEG_INFINITY, f64::max))
                    }
                    (Function::Min, _) => {
                        Ok(arguments.iter().copied().fold(f64::INFINITY, f64::min))
                    }
                    (Function::Abs, [value]) => Ok(value.abs()),
                    (Function::Round, [value]) => Ok(value.round_ties_even()),
                    (Function::Round, [value, digits]) => self.round(*value, *digits),
                    _ => Err(self.malformed(format!("bad arity for {function:?}"))),
                }
            }
        }
    }

    #[expect(clippy::cast_possible_truncation)]
    fn round(&self, value: f64, digits: f64) -> Result<f64> {
        if digits.fract() != 0.0 || digits.abs() > 300.0 {
            return Err(self.malformed(format!("`{digits}` is not a digit count")));
        }
        let factor = 10_f64.powi(digits as i32);
        Ok((value * factor).round_ties_even() / factor)
    }
}

impl FromStr for PeakFunction {
    type Err = Error;

    fn from_str(source: &str) -> Result<Self> {
        Self::parse(source)
    }
}

/// Parses and evaluates in one go.
pub fn evaluate(source: &str, values: &PeakValues) -> Result<f64> {
    PeakFunction::parse(source)?.evaluate(values)
}

#[derive(Clone, Debug, PartialEq)]
enum Token {
    Number(f64),
    Identifier(String),
    Plus,
    Minus,
    Star,
    Slash,
    Comma,
    Open,
    Close,
}

fn tokenize(source: &str) -> Result<Vec<Token>> {
    let mut tokens = Vec::new();
    let mut chars = source.char_indices().peekable();
    while let Some((start, char)) = chars.next() {
        let token = match char {
            _ if char.is_whitespace() => continue,
            '+' => Token::Plus,
            '-' => Token::Minus,
            '*' => Token::Star,
            '/' => Token::Slash,
            ',' => Token::Comma,
            '(' => Token::Open,
            ')' => Token::Close,
            '0'..='9' | '.' => {
                let mut end = start + char.len_utf8();
                let mut previous = char;
                while let Some(&(index, next)) = chars.peek() {
                    let is_exponent_sign =
                        matches!(next, '+' | '-') && matches!(previous, 'e' | 'E');
                    let is_numeric = next.is_ascii_digit() || matches!(next, '.' | 'e' | 'E');
                    if !(is_numeric || is_exponent_sign) {
                        break;
                    }
                    end = index + next.len_utf8();
                    previous = next;
                    chars.next();
                }
                let literal = &source[start..end];
                let value = literal.parse::<f64>().map_err(|_| {
                    Error::malformed_expression(source, format!("bad number `{literal}`"))
                })?;
                Token::Number(value)
            }
            _ if char.is_ascii_alphabetic() || char == '_' => {
                let mut end = start + char.len_utf8();
                while let Some(&(index, next)) = chars.peek() {
                    if !(next.is_ascii_alphanumeric() || next == '_') {
                        break;
                    }
                    end = index + next.len_utf8();
                    chars.next();
                }
                Token::Identifier(source[start..end].to_owned())
            }
            _ => return Err(Error::malformed_expression(source, format!("unexpected `{char}`"))),
        };
        tokens.push(token);
    }
    Ok(tokens)
}

struct Parser<'a> {
    source: &'a str,
    tokens: &'a [Token],
    position: usize,
    depth: usize,
}

impl<'a> Parser<'a> {
    fn peek(&self) -> Option<&'a Token> {
        self.tokens.get(self.position)
    }

    fn next(&mut self) -> Option<&'a Token> {
        let token = self.tokens.get(self.position);
        self.position += 1;
        token
    }

    fn malformed(&self, reason: impl Into<String>) -> Error {
        Error::malformed_expression(self.source, reason)
    }

    fn descend(&mut self) -> Result {
        self.depth += 1;
        if self.depth > MAX_DEPTH {
            return Err(self.malformed("expression is nested too deeply"));
        }
        Ok(())
    }

    fn expect(&mut self, expected: &Token) -> Result {
        match self.next() {
            Some(token) if token == expected => Ok(()),
            Some(token) => {
                let reason = format!("expected `{expected:?}`, found `{token:?}`");
                Err(self.malformed(reason))
            }
            None => Err(self.malformed(format!("expected `{expected:?}`, found the end"))),
        }
    }

    fn expression(&mut self) -> Result<Expression> {
        let mut lhs = self.term()?;
        loop {
            let operator = match self.peek() {
                Some(Token::Plus) => Operator::Add,
                Some(Token::Minus) => Operator::Subtract,
                _ => return Ok(lhs),
            };
            self.position += 1;
            lhs = Expression::Binary(Box::new(lhs), operator, Box::new(self.term()?));
        }
    }

    fn term(&mut self) -> Result<Expression> {
        let mut lhs = self.unary()?;
        loop {
            let operator = match self.peek() {
                Some(Token::Star) => Operator::Multiply,
                Some(Token::Slash) => Operator::Divide,
                _ => return Ok(lhs),
            };
            self.position += 1;
            lhs = Expression::Binary(Box::new(lhs), operator, Box::new(self.unary()?));
        }
    }

    fn unary(&mut self) -> Result<Expression> {
        let negate = match self.peek() {
            Some(Token::Minus) => true,
            Some(Token::Plus) => false,
            _ => return self.primary(),
        };
        self.position += 1;
        self.descend()?;
        let operand = self.unary()?;
        self.depth -= 1;
        if negate {
            Ok(Expression::Negate(Box::new(operand)))
        } else {
            Ok(operand)
        }
    }

    fn primary(&mut self) -> Result<Expression> {
        match self.next().cloned() {
            Some(Token::Number(value)) => Ok(Expression::Number(value)),
            Some(Token::Open) => {
                self.descend()?;
                let inner = self.expression()?;
                self.expect(&Token::Close)?;
                self.depth -= 1;
                Ok(inner)
            }
            Some(Token::Identifier(name)) if name == "peak" => {
                self.expect(&Token::Open)?;
                let Some(Token::Identifier(reference)) = self.next().cloned() else {
                    return Err(self.malformed("`peak` expects a component reference"));
                };
                self.expect(&Token::Close)?;
                Ok(Expression::Peak(reference))
            }
            Some(Token::Identifier(name)) => {
                let function = Function::from_name(&name)
                    .ok_or_else(|| self.malformed(format!("unknown name `{name}`")))?;
                self.expect(&Token::Open)?;
                self.descend()?;
                let mut arguments = vec![self.expression()?];
                while self.peek() == Some(&Token::Comma) {
                    self.position += 1;
                    arguments.push(self.expression()?);
                }
                self.expect(&Token::Close)?;
                self.depth -= 1;
                if !function.accepts(arguments.len()) {
                    let n_arguments = arguments.len();
                    let reason = format!("{function:?} does not take {n_arguments} argument(s)");
                    return Err(self.malformed(reason));
                }
                Ok(Expression::Call(function, arguments))
            }
            Some(token) => Err(self.malformed(format!("unexpected `{token:?}`"))),
            None => Err(self.malformed("unexpected end")),
        }
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;

    use super::*;

    fn values() -> PeakValues {
        BTreeMap::from([
            ("base".to_owned(), 80.0),
            ("high".to_owned(), 30.0),
            ("main".to_owned(), 12.5),
        ])
    }

    #[test]
    fn test_formula() {
        let value = evaluate("max(0, peak(base) - peak(high)/2)", &values()).unwrap();
        assert_abs_diff_eq!(value, 65.0);
    }

    #[test]
    fn test_precedence_and_unary() {
        assert_abs_diff_eq!(evaluate("2 + 3 * 4", &values()).unwrap(), 14.0);
        assert_abs_diff_eq!(evaluate("(2 + 3) * 4", &values()).unwrap(), 20.0);
        assert_abs_diff_eq!(evaluate("-peak(main) + +2", &values()).unwrap(), -10.5);
        assert_abs_diff_eq!(evaluate("8 / 2 / 2", &values()).unwrap(), 2.0);
        assert_abs_diff_eq!(evaluate("1.5e1 - .5", &values()).unwrap(), 14.5);
    }

    #[test]
    fn test_functions() {
        assert_abs_diff_eq!(evaluate("min(peak(base), peak(high), 5)", &values()).unwrap(), 5.0);
        assert_abs_diff_eq!(evaluate("abs(-3)", &values()).unwrap(), 3.0);
        assert_abs_diff_eq!(evaluate("round(2.5)", &values()).unwrap(), 2.0);
        assert_abs_diff_eq!(evaluate("round(3.5)", &values()).unwrap(), 4.0);
        assert_abs_diff_eq!(evaluate("round(1.23456, 2)", &values()).unwrap(), 1.23);
    }

    #[test]
    fn test_unknown_reference() {
        assert!(matches!(
            evaluate("peak(reactive)", &values()),
            Err(Error::UnknownPeakReference(name)) if name == "reactive",
        ));
    }

    #[test]
    fn test_malformed() {
        for source in [
            "",
            "peak(",
            "1 +",
            "1 2",
            "pow(2, 3)",
            "max(1)",
            "abs(1, 2)",
            "round(1, 2, 3)",
            "round(1, 0.5)",
            "x",
            "peak(1)",
            "1 / 0",
            "1 % 2",
            "__import__('os')",
            "1e400",
        ] {
            assert!(
                matches!(evaluate(source, &values()), Err(Error::MalformedExpression { .. })),
                "{source:?} must be rejected",
            );
        }
    }

    #[test]
    fn test_nesting_limit() {
        let nested = |depth: usize| format!("{}1{}", "(".repeat(depth), ")".repeat(depth));
        assert_abs_diff_eq!(evaluate(&nested(MAX_DEPTH), &values()).unwrap(), 1.0);
        for source in [
            nested(MAX_DEPTH + 1),
            format!("{}1", "-".repeat(MAX_DEPTH + 1)),
            format!("{}1{}", "abs(".repeat(MAX_DEPTH + 1), ")".repeat(MAX_DEPTH + 1)),
        ] {
            let error = PeakFunction::parse(&source).unwrap_err();
            let is_nested = matches!(
                &error,
                Error::MalformedExpression { reason, .. } if reason.contains("nested"),
            );
            assert!(is_nested, "{error}");
        }
    }

    #[test]
    fn test_huge_formulas_are_rejected() {
        for source in [
            format!("{}1{}", "(".repeat(20_000), ")".repeat(20_000)),
            vec!["1"; 20_000].join(" + "),
        ] {
            assert!(matches!(
                PeakFunction::parse(&source),
                Err(Error::MalformedExpression { .. }),
            ));
        }
    }

    #[test]
    fn test_reuse() {
        let function = PeakFunction::parse("peak(main) * 2").unwrap();
        assert_abs_diff_eq!(function.evaluate(&values()).unwrap(), 25.0);
        let other = BTreeMap::from([("main".to_owned(), 1.0)]);
        assert_abs_diff_eq!(function.evaluate(&other).unwrap(), 2.0);
    }
}
