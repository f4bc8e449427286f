//! Atomic interaction units and the sequences built from them.

use serde::{Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Binary operator buttons.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operator {
    Add,
    Subtract,
    Multiply,
    Divide,
}

impl Operator {
    /// Glyph as printed on the calculator key.
    pub fn glyph(self) -> &'static str {
        match self {
            Operator::Add => "+",
            Operator::Subtract => "-",
            Operator::Multiply => "×",
            Operator::Divide => "÷",
        }
    }
}

/// One atomic action: a digit, an operator, equals, or a unary function.
///
/// Tokens carry no position information; they are resolved against the
/// interface map only at execution time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Token {
    Digit(u8),
    Op(Operator),
    Equals,
    Square,
    SquareRoot,
}

impl Token {
    /// Canonical text, used in reports and as the fallback search needle.
    pub fn as_str(&self) -> &'static str {
        const DIGITS: [&str; 10] = ["0", "1", "2", "3", "4", "5", "6", "7", "8", "9"];
        match self {
            Token::Digit(d) => DIGITS[(*d as usize).min(9)],
            Token::Op(op) => op.glyph(),
            Token::Equals => "=",
            Token::Square => "square",
            Token::SquareRoot => "√",
        }
    }

    /// Verbal equivalents searched for in element descriptions.
    pub fn verbal(&self) -> &'static [&'static str] {
        match self {
            Token::Digit(_) => &[],
            Token::Op(Operator::Add) => &["plus", "addition"],
            Token::Op(Operator::Subtract) => &["minus", "subtract"],
            Token::Op(Operator::Multiply) => &["multiply", "multiplication"],
            Token::Op(Operator::Divide) => &["divide", "division"],
            Token::Equals => &["equals"],
            Token::Square => &["square"],
            Token::SquareRoot => &["square root"],
        }
    }

    /// Token for a single ASCII digit character.
    pub fn digit(c: char) -> Option<Self> {
        c.to_digit(10).map(|d| Token::Digit(d as u8))
    }

    pub fn is_binary_op(&self) -> bool {
        matches!(self, Token::Op(_))
    }

    pub fn is_unary(&self) -> bool {
        matches!(self, Token::Square | Token::SquareRoot)
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for Token {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// Parse a button name as accepted by direct `click_button` control.
impl FromStr for Token {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim().to_lowercase();
        let mut chars = s.chars();
        if let (Some(c), None) = (chars.next(), chars.next()) {
            if let Some(t) = Token::digit(c) {
                return Ok(t);
            }
        }
        let token = match s.as_str() {
            "+" | "plus" | "add" => Token::Op(Operator::Add),
            "-" | "−" | "minus" | "subtract" => Token::Op(Operator::Subtract),
            "×" | "*" | "x" | "times" | "multiply" => Token::Op(Operator::Multiply),
            "÷" | "/" | "divide" => Token::Op(Operator::Divide),
            "=" | "equals" | "equal" => Token::Equals,
            "square" | "squared" | "x²" => Token::Square,
            "√" | "sqrt" | "square root" | "square-root" => Token::SquareRoot,
            _ => return Err(crate::Error::ElementNotFound(s)),
        };
        Ok(token)
    }
}

/// Ordered list of tokens produced once per instruction.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ButtonSequence(Vec<Token>);

impl ButtonSequence {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, token: Token) {
        self.0.push(token);
    }

    /// Push one token per digit, most-significant first.
    pub fn push_number(&mut self, digits: &str) {
        self.0.extend(digits.chars().filter_map(Token::digit));
    }

    pub fn extend(&mut self, other: ButtonSequence) {
        self.0.extend(other.0);
    }

    pub fn tokens(&self) -> &[Token] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn last(&self) -> Option<&Token> {
        self.0.last()
    }

    pub fn contains_binary_op(&self) -> bool {
        self.0.iter().any(Token::is_binary_op)
    }

    /// Append '=' when the sequence holds a binary operation not yet committed.
    pub fn commit(&mut self) {
        if self.contains_binary_op() && self.last() != Some(&Token::Equals) {
            self.0.push(Token::Equals);
        }
    }

    /// Token texts, e.g. `["2", "+", "3", "="]`.
    pub fn labels(&self) -> Vec<&'static str> {
        self.0.iter().map(Token::as_str).collect()
    }
}

impl fmt::Display for ButtonSequence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, t) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(" → ")?;
            }
            write!(f, "{}", t)?;
        }
        Ok(())
    }
}

impl<'a> IntoIterator for &'a ButtonSequence {
    type Item = &'a Token;
    type IntoIter = std::slice::Iter<'a, Token>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl FromIterator<Token> for ButtonSequence {
    fn from_iter<I: IntoIterator<Item = Token>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_aliases() {
        assert_eq!("7".parse::<Token>().unwrap(), Token::Digit(7));
        assert_eq!("*".parse::<Token>().unwrap(), Token::Op(Operator::Multiply));
        assert_eq!("/".parse::<Token>().unwrap(), Token::Op(Operator::Divide));
        assert_eq!("−".parse::<Token>().unwrap(), Token::Op(Operator::Subtract));
        assert_eq!("sqrt".parse::<Token>().unwrap(), Token::SquareRoot);
        assert_eq!(" Square ".parse::<Token>().unwrap(), Token::Square);
        assert_eq!("=".parse::<Token>().unwrap(), Token::Equals);
    }

    #[test]
    fn parse_unknown() {
        let err = "percent".parse::<Token>().unwrap_err();
        assert!(matches!(err, crate::Error::ElementNotFound(ref s) if s == "percent"));
        assert!("12".parse::<Token>().is_err());
    }

    #[test]
    fn push_number_splits_digits() {
        let mut seq = ButtonSequence::new();
        seq.push_number("305");
        assert_eq!(seq.labels(), vec!["3", "0", "5"]);
    }

    #[test]
    fn commit_only_after_binary_op() {
        let mut seq = ButtonSequence::new();
        seq.push_number("4");
        seq.commit();
        assert_eq!(seq.labels(), vec!["4"]);

        seq.push(Token::Op(Operator::Add));
        seq.push_number("1");
        seq.commit();
        seq.commit();
        assert_eq!(seq.labels(), vec!["4", "+", "1", "="]);
    }

    #[test]
    fn display_and_serialize() {
        let seq: ButtonSequence = [Token::Digit(2), Token::Op(Operator::Multiply), Token::Square]
            .into_iter()
            .collect();
        assert_eq!(seq.to_string(), "2 → × → square");
        assert_eq!(
            serde_json::to_string(&seq).unwrap(),
            r#"["2","×","square"]"#
        );
    }
}
