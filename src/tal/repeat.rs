//! The per-iteration loop variable exposed as `repeat/<name>`.

use async_trait::async_trait;

use crate::model::{GetValueResult, TalesValueSource, Value};

/// Information about one iteration of a `tal:repeat` loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RepetitionInfo {
    index: usize,
    length: usize,
}

impl RepetitionInfo {
    /// Describes iteration `index` (zero-based) of a loop over `length`
    /// items.
    pub fn new(index: usize, length: usize) -> Self {
        Self { index, length }
    }

    /// The zero-based iteration index.
    pub fn index(&self) -> usize {
        self.index
    }

    /// The one-based iteration number.
    pub fn number(&self) -> usize {
        self.index + 1
    }

    /// Whether this is an even iteration (by zero-based index).
    pub fn is_even(&self) -> bool {
        self.index % 2 == 0
    }

    /// Whether this is the first iteration.
    pub fn is_start(&self) -> bool {
        self.index == 0
    }

    /// Whether this is the last iteration.
    pub fn is_end(&self) -> bool {
        self.index + 1 == self.length
    }

    /// The total number of iterations.
    pub fn length(&self) -> usize {
        self.length
    }

    /// The index rendered in a lower-case alphabetic series:
    /// a, b, .. z, aa, ab, ..
    pub fn letter(&self) -> String {
        let mut remaining = self.index;
        let mut out = Vec::new();
        loop {
            out.push(b'a' + (remaining % 26) as u8);
            remaining /= 26;
            if remaining == 0 {
                break;
            }
            remaining -= 1;
        }
        out.reverse();
        String::from_utf8(out).unwrap_or_default()
    }

    /// The one-based number rendered as lower-case roman numerals.
    pub fn roman(&self) -> String {
        const NUMERALS: [(usize, &str); 13] = [
            (1000, "m"),
            (900, "cm"),
            (500, "d"),
            (400, "cd"),
            (100, "c"),
            (90, "xc"),
            (50, "l"),
            (40, "xl"),
            (10, "x"),
            (9, "ix"),
            (5, "v"),
            (4, "iv"),
            (1, "i"),
        ];
        let mut remaining = self.number();
        let mut out = String::new();
        for (value, numeral) in NUMERALS {
            while remaining >= value {
                out.push_str(numeral);
                remaining -= value;
            }
        }
        out
    }
}

#[async_trait]
impl TalesValueSource for RepetitionInfo {
    async fn try_get_value(&self, name: &str) -> GetValueResult {
        let value = match name {
            "index" => Value::Int(self.index() as i64),
            "number" => Value::Int(self.number() as i64),
            "even" => Value::Bool(self.is_even()),
            "odd" => Value::Bool(!self.is_even()),
            "start" => Value::Bool(self.is_start()),
            "end" => Value::Bool(self.is_end()),
            "length" => Value::Int(self.length() as i64),
            "letter" => Value::String(self.letter()),
            "Letter" => Value::String(self.letter().to_uppercase()),
            "roman" => Value::String(self.roman()),
            "Roman" => Value::String(self.roman().to_uppercase()),
            _ => return GetValueResult::NotFound,
        };
        GetValueResult::Found(value)
    }

    fn description(&self) -> String {
        format!("<repetition {} of {}>", self.number(), self.length())
    }
}
