//! Token → interface element resolution under noisy labels.
//!
//! Labels come from a visual labeling pipeline and are ambiguous: "+" also
//! appears in "M+" (memory add) and "+/-" (sign toggle). Resolution runs three
//! ordered passes over the nodes of one state, and the first match wins:
//!
//! 1. alias rules with exclusions, one rule per non-digit token
//! 2. digits: the label is exactly `"<digit> button"`
//! 3. substring fallback with per-token validation

use tracing::debug;

use crate::interface_map::{NodeRecord, StateMap};
use crate::token::{Operator, Token};
use crate::{Error, Result};

/// Alias rule for one token. All fragments are lower-case.
#[derive(Debug, Clone, Copy)]
pub struct AliasRule {
    pub token: Token,
    /// The label starts with one of these.
    pub prefixes: &'static [&'static str],
    /// The label or description contains one of these.
    pub fragments: &'static [&'static str],
    /// Reject when the label or description contains any of these.
    pub excludes: &'static [&'static str],
}

impl AliasRule {
    pub fn matches(&self, label: &str, description: &str) -> bool {
        let hit = self.prefixes.iter().any(|p| label.starts_with(p))
            || self
                .fragments
                .iter()
                .any(|f| label.contains(f) || description.contains(f));
        hit && !self
            .excludes
            .iter()
            .any(|x| label.contains(x) || description.contains(x))
    }
}

const MEMORY_AND_SIGN: &[&str] = &["m+", "m-", "+/-", "memory"];

pub const ALIAS_RULES: &[AliasRule] = &[
    AliasRule {
        token: Token::Op(Operator::Add),
        prefixes: &["+"],
        fragments: &["addition"],
        excludes: MEMORY_AND_SIGN,
    },
    AliasRule {
        token: Token::Op(Operator::Subtract),
        prefixes: &["-", "−"],
        fragments: &["minus", "subtract"],
        excludes: &["m+", "m-", "+/-", "memory", "negat"],
    },
    AliasRule {
        token: Token::Op(Operator::Multiply),
        prefixes: &["×", "*"],
        fragments: &["multiplication", "multiply"],
        excludes: &["memory"],
    },
    AliasRule {
        token: Token::Op(Operator::Divide),
        prefixes: &["÷", "/"],
        fragments: &["division", "divide"],
        excludes: &["memory", "1/x", "reciprocal"],
    },
    AliasRule {
        token: Token::Equals,
        prefixes: &["="],
        fragments: &["equals"],
        excludes: &[],
    },
    AliasRule {
        token: Token::Square,
        prefixes: &["x²", "x^2"],
        fragments: &["square"],
        excludes: &["root", "√"],
    },
    AliasRule {
        token: Token::SquareRoot,
        prefixes: &["√", "²√"],
        fragments: &["square root"],
        excludes: &[],
    },
];

/// Compound buttons that contain an operator glyph but are not operators.
const COMPOUND_BUTTONS: &[&str] = &["+/-", "m+", "m-", "1/x"];

/// Resolves tokens to node ids. Never mutates the map.
#[derive(Debug, Clone, Copy)]
pub struct ElementResolver {
    rules: &'static [AliasRule],
}

impl Default for ElementResolver {
    fn default() -> Self {
        Self::new()
    }
}

impl ElementResolver {
    pub fn new() -> Self {
        Self {
            rules: ALIAS_RULES,
        }
    }

    /// Alias rule for a token, if it has one.
    pub fn rule_for(&self, token: Token) -> Option<&AliasRule> {
        self.rules.iter().find(|r| r.token == token)
    }

    /// Find the node id for a token, or `None`.
    pub fn find<'m>(&self, token: Token, state: &'m StateMap) -> Option<&'m str> {
        let found = self
            .alias_pass(token, state)
            .or_else(|| digit_pass(token, state))
            .or_else(|| fallback_pass(token, state));
        match found {
            Some(id) => debug!("resolved {} → {}", token, id),
            None => debug!("no element for {} among {} nodes", token, state.len()),
        }
        found
    }

    /// Like [`find`](Self::find), returning the record or `ElementNotFound`.
    pub fn resolve<'m>(&self, token: Token, state: &'m StateMap) -> Result<(&'m str, &'m NodeRecord)> {
        self.find(token, state)
            .and_then(|id| state.get(id).map(|node| (id, node)))
            .ok_or_else(|| Error::ElementNotFound(token.to_string()))
    }

    fn alias_pass<'m>(&self, token: Token, state: &'m StateMap) -> Option<&'m str> {
        let rule = self.rule_for(token)?;
        labelled(state)
            .find(|(_, label, desc)| rule.matches(label, desc))
            .map(|(id, _, _)| id)
    }
}

fn digit_pass(token: Token, state: &StateMap) -> Option<&str> {
    let Token::Digit(_) = token else {
        return None;
    };
    let want = format!("{} button", token);
    labelled(state)
        .find(|(_, label, _)| *label == want)
        .map(|(id, _, _)| id)
}

fn fallback_pass(token: Token, state: &StateMap) -> Option<&str> {
    let text = token.as_str();
    labelled(state)
        .find(|(_, label, desc)| {
            let mentioned = label.contains(text)
                || desc.contains(text)
                || token
                    .verbal()
                    .iter()
                    .any(|v| label.contains(v) || desc.contains(v));
            mentioned && validate(token, label, desc)
        })
        .map(|(id, _, _)| id)
}

/// Per-token check that a substring hit really is the wanted button.
fn validate(token: Token, label: &str, desc: &str) -> bool {
    match token {
        Token::Digit(_) => label.split_whitespace().next() == Some(token.as_str()),
        Token::Equals => label.contains('=') || desc.contains("equals"),
        Token::Square => label.contains("square") || label.contains("x²"),
        Token::SquareRoot => label.contains('√') || desc.contains("square root"),
        Token::Op(op) => {
            let named = label.contains(op.glyph())
                || token.verbal().iter().any(|v| desc.contains(v));
            named && !COMPOUND_BUTTONS.iter().any(|c| label.contains(c))
        }
    }
}

/// `(id, lower-case label, lower-case description)` in document order.
fn labelled(state: &StateMap) -> impl Iterator<Item = (&str, String, String)> {
    state.iter().map(|(id, node)| {
        (
            id,
            node.icon_name.trim().to_lowercase(),
            node.brief.trim().to_lowercase(),
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interface_map::InterfaceMap;

    /// Memory and sign buttons come first so naive substring matching would pick them.
    const CALC: &str = r#"{ "states": { "root": { "nodes": {
        "mplus":  { "bbox": [0, 0, 10, 10],   "g_icon_name": "M+ Button",  "g_brief": "memory add" },
        "negate": { "bbox": [10, 0, 20, 10],  "g_icon_name": "+/- Button", "g_brief": "toggle sign plus minus" },
        "mminus": { "bbox": [20, 0, 30, 10],  "g_icon_name": "M- Button",  "g_brief": "memory subtract" },
        "sqrt":   { "bbox": [30, 0, 40, 10],  "g_icon_name": "√x Button",  "g_brief": "square root" },
        "sq":     { "bbox": [40, 0, 50, 10],  "g_icon_name": "x² Button",  "g_brief": "square" },
        "recip":  { "bbox": [50, 0, 60, 10],  "g_icon_name": "1/x Button", "g_brief": "reciprocal, one divided by x" },
        "div":    { "bbox": [60, 0, 70, 10],  "g_icon_name": "÷ Button",   "g_brief": "division" },
        "mul":    { "bbox": [70, 0, 80, 10],  "g_icon_name": "× Button",   "g_brief": "multiplication" },
        "sub":    { "bbox": [80, 0, 90, 10],  "g_icon_name": "- Button",   "g_brief": "subtraction minus" },
        "add":    { "bbox": [90, 0, 100, 10], "g_icon_name": "+ Button",   "g_brief": "addition" },
        "eq":     { "bbox": [0, 10, 10, 20],  "g_icon_name": "= Button",   "g_brief": "equals" },
        "d17":    { "bbox": [0, 20, 10, 30],  "g_icon_name": "17 Button",  "g_brief": "" },
        "d1":     { "bbox": [10, 20, 20, 30], "g_icon_name": "1 Button",   "g_brief": "digit one" },
        "d7":     { "bbox": [20, 20, 30, 30], "g_icon_name": "7 Button",   "g_brief": "digit seven" }
    } } } }"#;

    fn root() -> StateMap {
        InterfaceMap::from_json(CALC)
            .unwrap()
            .state("root")
            .unwrap()
            .clone()
    }

    fn find(token: Token) -> Option<String> {
        ElementResolver::new().find(token, &root()).map(String::from)
    }

    #[test]
    fn plus_skips_memory_and_sign() {
        assert_eq!(find(Token::Op(Operator::Add)).as_deref(), Some("add"));
    }

    #[test]
    fn minus_skips_memory_and_sign() {
        assert_eq!(find(Token::Op(Operator::Subtract)).as_deref(), Some("sub"));
    }

    #[test]
    fn divide_skips_reciprocal() {
        assert_eq!(find(Token::Op(Operator::Divide)).as_deref(), Some("div"));
    }

    #[test]
    fn square_is_not_square_root() {
        assert_eq!(find(Token::Square).as_deref(), Some("sq"));
        assert_eq!(find(Token::SquareRoot).as_deref(), Some("sqrt"));
    }

    #[test]
    fn equals_and_multiply() {
        assert_eq!(find(Token::Equals).as_deref(), Some("eq"));
        assert_eq!(find(Token::Op(Operator::Multiply)).as_deref(), Some("mul"));
    }

    #[test]
    fn digits_match_exact_label() {
        assert_eq!(find(Token::Digit(1)).as_deref(), Some("d1"));
        assert_eq!(find(Token::Digit(7)).as_deref(), Some("d7"));
    }

    #[test]
    fn missing_token_is_none() {
        assert_eq!(find(Token::Digit(4)), None);
        let state = root();
        let err = ElementResolver::new()
            .resolve(Token::Digit(4), &state)
            .unwrap_err();
        assert!(matches!(err, Error::ElementNotFound(ref t) if t == "4"));
    }

    #[test]
    fn resolve_returns_record() {
        let state = root();
        let (id, node) = ElementResolver::new().resolve(Token::Equals, &state).unwrap();
        assert_eq!(id, "eq");
        assert_eq!(node.icon_name, "= Button");
    }

    #[test]
    fn plus_rule_in_isolation() {
        let resolver = ElementResolver::new();
        let rule = resolver.rule_for(Token::Op(Operator::Add)).unwrap();
        assert!(rule.matches("+ button", ""));
        assert!(rule.matches("plus key", "addition"));
        assert!(!rule.matches("m+ button", "memory add"));
        assert!(!rule.matches("+/- button", "toggle sign"));
        assert!(!rule.matches("m+ button", "addition to memory"));
    }

    #[test]
    fn digits_have_no_alias_rule() {
        assert!(ElementResolver::new().rule_for(Token::Digit(3)).is_none());
    }

    #[test]
    fn fallback_finds_loose_labels() {
        let json = r#"{ "states": { "root": { "nodes": {
            "a": { "bbox": [0, 0, 1, 1], "g_icon_name": "Equal sign =", "g_brief": "" },
            "b": { "bbox": [0, 0, 1, 1], "g_icon_name": "8", "g_brief": "key" }
        } } } }"#;
        let map = InterfaceMap::from_json(json).unwrap();
        let state = map.state("root").unwrap();
        let resolver = ElementResolver::new();
        assert_eq!(resolver.find(Token::Digit(8), state), Some("b"));
        // Alias pass misses ("equal sign" has no "=" prefix or "equals"), fallback validates "=".
        assert_eq!(resolver.find(Token::Equals, state), Some("a"));
    }

    #[test]
    fn fallback_rejects_compound_buttons() {
        let json = r#"{ "states": { "root": { "nodes": {
            "neg": { "bbox": [0, 0, 1, 1], "g_icon_name": "+/-", "g_brief": "memory plus" }
        } } } }"#;
        let map = InterfaceMap::from_json(json).unwrap();
        let state = map.state("root").unwrap();
        assert_eq!(ElementResolver::new().find(Token::Op(Operator::Add), state), None);
    }
}
