//! Free-text arithmetic instructions → button sequences.
//!
//! The grammar is deliberately small: one binary operation on two operands,
//! optionally followed by `then <unary op>` acting on the committed result.
//! Parsing never fails; text it cannot make sense of yields an empty sequence.

use regex::Regex;

use crate::token::{ButtonSequence, Operator, Token};

const NUMBER_WORDS: [(&str, &str); 10] = [
    ("zero", "0"),
    ("one", "1"),
    ("two", "2"),
    ("three", "3"),
    ("four", "4"),
    ("five", "5"),
    ("six", "6"),
    ("seven", "7"),
    ("eight", "8"),
    ("nine", "9"),
];

/// Operator keywords in priority order. The first operator with any keyword
/// present in the clause wins, even when later keywords also occur.
const OPERATOR_KEYWORDS: [(Operator, &[&str]); 4] = [
    (Operator::Add, &["add", "plus"]),
    (Operator::Subtract, &["subtract", "minus"]),
    (Operator::Multiply, &["multiply", "times", "by"]),
    (Operator::Divide, &["divide"]),
];

/// Parses natural-language calculator instructions.
#[derive(Debug, Clone)]
pub struct InstructionParser {
    number_word: Regex,
    operand: Regex,
    then: Regex,
    and: Regex,
}

impl Default for InstructionParser {
    fn default() -> Self {
        Self::new()
    }
}

impl InstructionParser {
    pub fn new() -> Self {
        Self {
            number_word: Regex::new(r"\b(zero|one|two|three|four|five|six|seven|eight|nine)\b")
                .expect("number word pattern"),
            operand: Regex::new(r"\d+").expect("operand pattern"),
            then: Regex::new(r"\bthen\b").expect("then pattern"),
            and: Regex::new(r"\band\b").expect("and pattern"),
        }
    }

    /// Parse an instruction into the buttons to click, in order.
    pub fn parse(&self, instruction: &str) -> ButtonSequence {
        let text = self.normalize(instruction);
        if text.is_empty() {
            return ButtonSequence::new();
        }

        let mut clauses = self.then.splitn(&text, 2);
        let first = clauses.next().unwrap_or_default().trim();
        let mut buttons = self.parse_clause(first);
        // The result must be on the display before a follow-up acts on it.
        buttons.commit();

        if let Some(rest) = clauses.next() {
            buttons.extend(self.parse_followup(rest.trim()));
        }
        buttons
    }

    /// Lower-case and replace spelled-out digits with digit characters.
    fn normalize(&self, instruction: &str) -> String {
        let lower = instruction.trim().to_lowercase();
        self.number_word
            .replace_all(&lower, |caps: &regex::Captures| {
                NUMBER_WORDS
                    .iter()
                    .find(|(word, _)| *word == &caps[1])
                    .map(|(_, digit)| *digit)
                    .unwrap_or_default()
                    .to_string()
            })
            .into_owned()
    }

    /// Clause after `then`: a unary function on the result, or another operation.
    fn parse_followup(&self, clause: &str) -> ButtonSequence {
        match unary_keyword(clause) {
            Some(unary) => std::iter::once(unary).collect(),
            None => self.parse_clause(clause),
        }
    }

    /// A single operation with no `then`.
    fn parse_clause(&self, clause: &str) -> ButtonSequence {
        let mut buttons = ButtonSequence::new();
        let operator = operator_keyword(clause);

        if let Some(op) = operator {
            if clause.contains("and") {
                if let Some(seq) = self.parse_conjunction(clause, op) {
                    return seq;
                }
            }
        }

        let operands: Vec<&str> = self
            .operand
            .find_iter(clause)
            .map(|m| m.as_str())
            .collect();

        match (operator, operands.as_slice()) {
            (Some(op), [head, tail @ ..]) if !tail.is_empty() => {
                buttons.push_number(head);
                for operand in tail {
                    buttons.push(Token::Op(op));
                    buttons.push_number(operand);
                }
                buttons.push(Token::Equals);
            }
            (_, [single]) => {
                buttons.push_number(single);
                if let Some(unary) = unary_keyword(clause) {
                    buttons.push(unary);
                }
            }
            (_, []) => {
                // Acts on whatever result is already displayed.
                if let Some(unary) = unary_keyword(clause) {
                    buttons.push(unary);
                }
            }
            _ => {}
        }
        buttons
    }

    /// `<op> A and B`: first number on each side of the first `and`.
    ///
    /// Extra numbers on either side are ignored.
    fn parse_conjunction(&self, clause: &str, op: Operator) -> Option<ButtonSequence> {
        let mut sides = self.and.split(clause);
        let left = sides.next()?;
        let right = sides.next()?;
        let a = self.operand.find(left)?.as_str();
        let b = self.operand.find(right)?.as_str();

        let mut buttons = ButtonSequence::new();
        buttons.push_number(a);
        buttons.push(Token::Op(op));
        buttons.push_number(b);
        buttons.push(Token::Equals);
        Some(buttons)
    }
}

fn operator_keyword(clause: &str) -> Option<Operator> {
    OPERATOR_KEYWORDS
        .iter()
        .find(|(_, words)| words.iter().any(|w| clause.contains(w)))
        .map(|(op, _)| *op)
}

fn unary_keyword(clause: &str) -> Option<Token> {
    if clause.contains("square") && !clause.contains("root") {
        Some(Token::Square)
    } else if clause.contains("square root") || clause.contains("sqrt") || clause.contains('√') {
        Some(Token::SquareRoot)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(s: &str) -> Vec<&'static str> {
        InstructionParser::new().parse(s).labels()
    }

    #[test]
    fn add_then_square() {
        assert_eq!(
            parse("Add 2 and 3 and then find the square of the result"),
            vec!["2", "+", "3", "=", "square"]
        );
    }

    #[test]
    fn conjunction_for_every_operator() {
        assert_eq!(parse("add 4 and 5"), vec!["4", "+", "5", "="]);
        assert_eq!(parse("subtract 9 and 4"), vec!["9", "-", "4", "="]);
        assert_eq!(parse("multiply 6 and 7"), vec!["6", "×", "7", "="]);
        assert_eq!(parse("divide 8 and 2"), vec!["8", "÷", "2", "="]);
    }

    #[test]
    fn conjunction_multi_digit() {
        assert_eq!(
            parse("add 120 and 45"),
            vec!["1", "2", "0", "+", "4", "5", "="]
        );
    }

    #[test]
    fn conjunction_truncates_extra_operands() {
        assert_eq!(parse("add 1 2 and 3 4"), vec!["1", "+", "3", "="]);
        assert_eq!(parse("subtract 9 and 4 and 5"), vec!["9", "-", "4", "="]);
    }

    #[test]
    fn multiply_by() {
        assert_eq!(parse("multiply 12 by 7"), vec!["1", "2", "×", "7", "="]);
    }

    #[test]
    fn operator_priority_is_fixed() {
        // "by" is a multiply keyword and outranks divide.
        assert_eq!(parse("divide 8 by 2"), vec!["8", "×", "2", "="]);
        // add outranks everything.
        assert_eq!(parse("add 2 times 3"), vec!["2", "+", "3", "="]);
    }

    #[test]
    fn number_words() {
        assert_eq!(parse("two plus three"), vec!["2", "+", "3", "="]);
        assert_eq!(parse("Seven minus one"), vec!["7", "-", "1", "="]);
        // Only whole words are replaced.
        assert_eq!(parse("someone"), Vec::<&str>::new());
    }

    #[test]
    fn chained_operands() {
        assert_eq!(parse("1 plus 2 plus 3"), vec!["1", "+", "2", "+", "3", "="]);
    }

    #[test]
    fn unary_only() {
        assert_eq!(parse("square the result"), vec!["square"]);
        assert_eq!(parse("take the square root"), vec!["√"]);
        assert_eq!(parse("sqrt"), vec!["√"]);
    }

    #[test]
    fn single_operand() {
        assert_eq!(parse("9"), vec!["9"]);
        assert_eq!(parse("square 12"), vec!["1", "2", "square"]);
        assert_eq!(parse("square root of 81"), vec!["8", "1", "√"]);
    }

    #[test]
    fn then_square_root() {
        assert_eq!(
            parse("multiply 4 and 4 then take the square root"),
            vec!["4", "×", "4", "=", "√"]
        );
    }

    #[test]
    fn then_falls_back_to_operation() {
        assert_eq!(
            parse("add 1 and 2 then multiply 3 and 4"),
            vec!["1", "+", "2", "=", "3", "×", "4", "="]
        );
    }

    #[test]
    fn equals_precedes_unary() {
        let seq = InstructionParser::new().parse("5 times 5 then square it");
        let tokens = seq.tokens();
        let unary = tokens.iter().position(|t| t.is_unary()).unwrap();
        assert_eq!(tokens[unary - 1], Token::Equals);
    }

    #[test]
    fn unsupported_text_is_empty() {
        assert!(InstructionParser::new().parse("").is_empty());
        assert!(InstructionParser::new().parse("   ").is_empty());
        assert!(InstructionParser::new().parse("open the pod bay doors").is_empty());
        // Two numbers but no operator.
        assert!(InstructionParser::new().parse("3 4").is_empty());
    }

    #[test]
    fn deterministic() {
        let p = InstructionParser::new();
        let s = "add 2 and 3 and then find the square of the result";
        assert_eq!(p.parse(s), p.parse(s));
    }

    #[test]
    fn then_must_be_a_whole_word() {
        assert_eq!(parse("multiply 3 by 4 thenceforth"), vec!["3", "×", "4", "="]);
        assert_eq!(parse("add 1 and 2 then square it"), vec!["1", "+", "2", "=", "square"]);
    }

    #[test]
    fn root_glyph_is_a_unary_keyword() {
        assert_eq!(parse("√ 81"), vec!["8", "1", "√"]);
        assert_eq!(parse("√"), vec!["√"]);
    }
}
