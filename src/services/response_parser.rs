//! Structured-response parser for generator output.
//!
//! Generators are asked for JSON but routinely wrap it in prose or code
//! fences, or emit a language-native literal with single quotes and
//! `True`/`False`/`None` tokens. `parse` tries, in order:
//!
//! 1. the whole text as JSON
//! 2. the inner content of each fenced code block as JSON
//! 3. the span from the first `{` to the last `}`, as-is and then with
//!    quotes and literal tokens normalized
//! 4. the same span through a permissive literal evaluator
//!
//! Only objects count as records. Failure is `None`, never an error.

use regex::Regex;
use serde_json::{Map, Number, Value};
use std::sync::LazyLock;
use tracing::debug;

/// A decoded structured payload.
pub type Record = Map<String, Value>;

/// Nesting limit for the literal evaluator.
const MAX_DEPTH: usize = 64;

static FENCE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)```[A-Za-z0-9_+-]*[ \t]*\r?\n?(.*?)```").expect("valid regex")
});
static NONE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\bNone\b").expect("valid regex"));
static TRUE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\bTrue\b").expect("valid regex"));
static FALSE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\bFalse\b").expect("valid regex"));

/// Which strategy recovered the record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseStage {
    /// The whole text was JSON.
    Direct,
    /// Inside a fenced code block.
    Fenced,
    /// The outermost brace span, raw or with `True`/`False`/`None` rewritten.
    NormalizedSpan,
    /// The brace span read as a literal with single quotes or tuples.
    LiteralSpan,
}

impl ParseStage {
    /// Label for debug logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Direct => "direct",
            Self::Fenced => "fenced",
            Self::NormalizedSpan => "normalized_span",
            Self::LiteralSpan => "literal_span",
        }
    }
}

/// Extract a structured record from free-form text.
pub fn parse(raw: &str) -> Option<Record> {
    parse_with_stage(raw).map(|(record, _)| record)
}

/// Like [`parse`], also reporting which stage succeeded.
pub fn parse_with_stage(raw: &str) -> Option<(Record, ParseStage)> {
    let result = try_stages(raw);
    match &result {
        Some((_, stage)) => debug!(stage = stage.as_str(), "Parsed structured response"),
        None => debug!(
            input_length = raw.len(),
            "No structured record found, treating output as plain text"
        ),
    }
    result
}

fn try_stages(raw: &str) -> Option<(Record, ParseStage)> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }

    if let Some(record) = decode_json(trimmed) {
        return Some((record, ParseStage::Direct));
    }

    for captures in FENCE_RE.captures_iter(trimmed) {
        if let Some(record) = captures.get(1).and_then(|m| decode_json(m.as_str().trim())) {
            return Some((record, ParseStage::Fenced));
        }
    }

    let span = brace_span(trimmed)?;
    if let Some(record) = decode_json(span) {
        return Some((record, ParseStage::NormalizedSpan));
    }
    if let Some(record) = decode_json(&normalize_literals(span)) {
        return Some((record, ParseStage::NormalizedSpan));
    }

    evaluate_literal(span).map(|record| (record, ParseStage::LiteralSpan))
}

fn decode_json(text: &str) -> Option<Record> {
    match serde_json::from_str::<Value>(text) {
        Ok(Value::Object(map)) => Some(map),
        _ => None,
    }
}

/// Text from the first `{` to the last `}` inclusive.
fn brace_span(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (end > start).then(|| &text[start..=end])
}

/// Naive token rewrite: single quotes become double quotes and native
/// `None`/`True`/`False` become JSON tokens.
fn normalize_literals(span: &str) -> String {
    let quoted = span.replace('\'', "\"");
    let nulls = NONE_RE.replace_all(&quoted, "null");
    let trues = TRUE_RE.replace_all(&nulls, "true");
    FALSE_RE.replace_all(&trues, "false").into_owned()
}

/// Decode a literal with single or double quoted strings, tuples, trailing
/// commas and `True`/`False`/`None`. The top level must be a mapping.
pub fn evaluate_literal(text: &str) -> Option<Record> {
    let mut evaluator = LiteralEvaluator::new(text);
    let value = evaluator.value(0)?;
    evaluator.skip_whitespace();
    if !evaluator.at_end() {
        return None;
    }
    match value {
        Value::Object(map) => Some(map),
        _ => None,
    }
}

struct LiteralEvaluator {
    chars: Vec<char>,
    pos: usize,
}

impl LiteralEvaluator {
    fn new(text: &str) -> Self {
        Self {
            chars: text.chars().collect(),
            pos: 0,
        }
    }

    fn at_end(&self) -> bool {
        self.pos >= self.chars.len()
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += 1;
        Some(c)
    }

    fn skip_whitespace(&mut self) {
        while let Some(c) = self.peek() {
            if c.is_whitespace() {
                self.pos += 1;
            } else if c == '#' {
                while let Some(c) = self.bump() {
                    if c == '\n' {
                        break;
                    }
                }
            } else {
                break;
            }
        }
    }

    fn eat(&mut self, expected: char) -> bool {
        self.skip_whitespace();
        if self.peek() == Some(expected) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn value(&mut self, depth: usize) -> Option<Value> {
        if depth > MAX_DEPTH {
            return None;
        }
        self.skip_whitespace();
        match self.peek()? {
            '{' => self.mapping(depth),
            '[' => self.sequence(depth, ']'),
            '(' => self.sequence(depth, ')'),
            '\'' | '"' => self.strings().map(Value::String),
            c if c == '-' || c == '+' || c == '.' || c.is_ascii_digit() => self.number(),
            c if c.is_alphabetic() || c == '_' => self.identifier(),
            _ => None,
        }
    }

    fn mapping(&mut self, depth: usize) -> Option<Value> {
        self.bump();
        let mut map = Map::new();
        loop {
            if self.eat('}') {
                return Some(Value::Object(map));
            }
            let key = match self.value(depth + 1)? {
                Value::String(s) => s,
                Value::Null => "null".to_string(),
                other => other.to_string(),
            };
            if !self.eat(':') {
                return None;
            }
            let value = self.value(depth + 1)?;
            map.insert(key, value);
            if !self.eat(',') {
                return self.eat('}').then_some(Value::Object(map));
            }
        }
    }

    fn sequence(&mut self, depth: usize, close: char) -> Option<Value> {
        self.bump();
        let mut items = Vec::new();
        loop {
            if self.eat(close) {
                return Some(Value::Array(items));
            }
            items.push(self.value(depth + 1)?);
            if !self.eat(',') {
                return self.eat(close).then_some(Value::Array(items));
            }
        }
    }

    /// One or more adjacent string literals, concatenated.
    fn strings(&mut self) -> Option<String> {
        let mut out = self.string()?;
        loop {
            let save = self.pos;
            self.skip_whitespace();
            if matches!(self.peek(), Some('\'' | '"')) {
                out.push_str(&self.string()?);
            } else {
                self.pos = save;
                return Some(out);
            }
        }
    }

    fn string(&mut self) -> Option<String> {
        let quote = self.bump()?;
        let mut out = String::new();
        loop {
            match self.bump()? {
                c if c == quote => return Some(out),
                '\\' => match self.bump()? {
                    'n' => out.push('\n'),
                    't' => out.push('\t'),
                    'r' => out.push('\r'),
                    '0' => out.push('\0'),
                    'u' => {
                        let hex: String = (0..4).filter_map(|_| self.bump()).collect();
                        let code = u32::from_str_radix(&hex, 16).ok()?;
                        out.push(char::from_u32(code).unwrap_or(char::REPLACEMENT_CHARACTER));
                    }
                    '\n' => {}
                    other => out.push(other),
                },
                c => out.push(c),
            }
        }
    }

    fn number(&mut self) -> Option<Value> {
        let start = self.pos;
        while let Some(c) = self.peek() {
            if c.is_ascii_digit() || matches!(c, '-' | '+' | '.' | 'e' | 'E' | '_') {
                self.pos += 1;
            } else {
                break;
            }
        }
        let literal: String = self.chars[start..self.pos]
            .iter()
            .filter(|c| **c != '_')
            .collect();
        let literal = literal.strip_prefix('+').unwrap_or(&literal);
        if let Ok(n) = literal.parse::<i64>() {
            return Some(Value::Number(n.into()));
        }
        let f = literal.parse::<f64>().ok()?;
        Number::from_f64(f).map(Value::Number)
    }

    fn identifier(&mut self) -> Option<Value> {
        let start = self.pos;
        while let Some(c) = self.peek() {
            if c.is_alphanumeric() || c == '_' {
                self.pos += 1;
            } else {
                break;
            }
        }
        let word: String = self.chars[start..self.pos].iter().collect();
        match word.as_str() {
            "True" | "true" => Some(Value::Bool(true)),
            "False" | "false" => Some(Value::Bool(false)),
            "None" | "null" => Some(Value::Null),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_direct_json() {
        let (record, stage) = parse_with_stage(r#"{"reply_to_user": "Hi", "n": 1}"#).unwrap();
        assert_eq!(stage, ParseStage::Direct);
        assert_eq!(record["reply_to_user"], "Hi");
    }

    #[test]
    fn test_fenced_json() {
        let raw = "Here you go:\n```json\n{\"status\": \"active\"}\n```\nThanks";
        let (record, stage) = parse_with_stage(raw).unwrap();
        assert_eq!(stage, ParseStage::Fenced);
        assert_eq!(record["status"], "active");
    }

    #[test]
    fn test_fenced_without_language_tag() {
        let raw = "```\n{\"a\": [1, 2]}\n```";
        assert_eq!(parse(raw).unwrap()["a"], json!([1, 2]));
    }

    #[test]
    fn test_embedded_span_in_prose() {
        let raw = "Sure! {\"analysis_data\": {\"status\": \"concluded\"}} Let me know.";
        let (record, stage) = parse_with_stage(raw).unwrap();
        assert_eq!(stage, ParseStage::NormalizedSpan);
        assert_eq!(record["analysis_data"]["status"], "concluded");
    }

    #[test]
    fn test_single_quotes_and_native_tokens() {
        let raw = "{'status': 'active', 'done': False, 'service': None, 'ok': True}";
        let (record, stage) = parse_with_stage(raw).unwrap();
        assert_eq!(stage, ParseStage::NormalizedSpan);
        assert_eq!(record["done"], json!(false));
        assert_eq!(record["service"], Value::Null);
        assert_eq!(record["ok"], json!(true));
    }

    #[test]
    fn test_literal_evaluator_handles_apostrophes_and_tuples() {
        let raw = r#"Result: {'reply_to_user': "It's fine", 'hypotheses': ('A', 'B',), 'confidence': 0.7,}"#;
        let (record, stage) = parse_with_stage(raw).unwrap();
        assert_eq!(stage, ParseStage::LiteralSpan);
        assert_eq!(record["reply_to_user"], "It's fine");
        assert_eq!(record["hypotheses"], json!(["A", "B"]));
        assert_eq!(record["confidence"], json!(0.7));
    }

    #[test]
    fn test_literal_evaluator_escapes_and_concatenation() {
        let record = evaluate_literal(r"{'a': 'line\nbreak', 'b': 'x' 'y', 'c': -3}").unwrap();
        assert_eq!(record["a"], "line\nbreak");
        assert_eq!(record["b"], "xy");
        assert_eq!(record["c"], json!(-3));
    }

    #[test]
    fn test_non_object_is_not_a_record() {
        assert!(parse("[1, 2, 3]").is_none());
        assert!(parse("42").is_none());
        assert!(parse("\"just a string\"").is_none());
    }

    #[test]
    fn test_garbage_returns_none() {
        assert!(parse("").is_none());
        assert!(parse("   ").is_none());
        assert!(parse("I think you should talk to HR about this.").is_none());
        assert!(parse("} backwards {").is_none());
        assert!(parse("{ this is not: a literal at all }").is_none());
    }

    #[test]
    fn test_deep_nesting_is_rejected_not_overflowed() {
        let deep = format!("{}{}", "{'a': ".repeat(200), "1");
        let text = format!("{deep}{}", "}".repeat(200));
        assert!(evaluate_literal(&text).is_none());
    }
}
