//! Command arguments - Tokenized views over the text following a command name

use std::time::Duration;
use once_cell::sync::Lazy;
use regex_lite::Regex;

use crate::application::errors::ArgumentError;
use super::languages::CODEBLOCK_LANGUAGES;

/// A token is either a double-quoted span or a run of non-whitespace
static ARGUMENT_PATTERN: Lazy<Regex> = Lazy::new(|| Regex::new(r#"("[^"]+"|[^\s]+)"#).unwrap());

static USER_MENTION: Lazy<Regex> = Lazy::new(|| Regex::new(r"<@!?(\d+)>").unwrap());
static ROLE_MENTION: Lazy<Regex> = Lazy::new(|| Regex::new(r"<@&(\d+)>").unwrap());
static CHANNEL_MENTION: Lazy<Regex> = Lazy::new(|| Regex::new(r"<#(\d+)>").unwrap());

static BIG_CODEBLOCK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)\n*```(?:([\w.\-]*)\n)?(.*)```").unwrap());
static SMALL_CODEBLOCK: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)\n*`(.*)`").unwrap());

static DURATION_FORMAT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\+?(?:\d+(?:\.\d+)?[a-z]+)+$").unwrap());
static DURATION_COMPONENT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\d+(?:\.\d+)?)([a-z]+)").unwrap());

/// Arguments passed to a command: the raw text plus its positional tokens
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Arguments {
    raw: String,
    arguments: Vec<Argument>,
}

impl Arguments {
    /// Tokenize a raw argument string. Quoted spans become a single token
    /// with the quotes stripped; empty input yields no tokens.
    pub fn parse(raw: impl Into<String>) -> Self {
        let raw = raw.into();
        let arguments = ARGUMENT_PATTERN
            .find_iter(&raw)
            .map(|m| Argument::new(trim_quotes(m.as_str())))
            .collect();

        Self { raw, arguments }
    }

    /// Empty argument set
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn raw(&self) -> &str {
        &self.raw
    }

    pub fn tokens(&self) -> &[Argument] {
        &self.arguments
    }

    pub fn amount(&self) -> usize {
        self.arguments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.arguments.is_empty()
    }

    /// Whole raw string as a single argument
    pub fn as_single(&self) -> Argument {
        Argument::new(self.raw.clone())
    }

    /// Get the n'th argument, or an empty one if out of range
    pub fn get(&self, n: usize) -> Argument {
        self.arguments.get(n).cloned().unwrap_or_default()
    }

    /// Remove the n'th argument. The raw string is rebuilt from the remaining
    /// tokens joined by single spaces, so original quoting is lost.
    pub fn remove(&mut self, n: usize) {
        if n >= self.arguments.len() {
            return;
        }
        self.arguments.remove(n);
        self.raw = self.arguments
            .iter()
            .map(Argument::raw)
            .collect::<Vec<_>>()
            .join(" ");
    }

    /// Arguments following the first token, re-tokenized from the raw text
    /// after that token
    pub fn shift(&self) -> Self {
        match ARGUMENT_PATTERN.find(&self.raw) {
            Some(first) => Self::parse(self.raw[first.end()..].trim()),
            None => Self::empty(),
        }
    }

    /// Interpret the raw string as a fenced code block
    pub fn as_codeblock(&self) -> Option<Codeblock> {
        let raw = self.raw();

        let Some(captures) = BIG_CODEBLOCK.captures(raw) else {
            return SMALL_CODEBLOCK.captures(raw).map(|captures| Codeblock {
                language: String::new(),
                content: group(&captures, 1).to_string(),
            });
        };

        let first_line = group(&captures, 1);
        let rest = group(&captures, 2);

        // A first line that is a known language is kept as content
        if !first_line.is_empty() && !CODEBLOCK_LANGUAGES.contains(&first_line) {
            return Some(Codeblock {
                language: first_line.to_string(),
                content: rest.to_string(),
            });
        }

        Some(Codeblock {
            language: String::new(),
            content: format!("{}{}", first_line, rest),
        })
    }
}

fn group<'h>(captures: &regex_lite::Captures<'h>, index: usize) -> &'h str {
    captures.get(index).map(|m| m.as_str()).unwrap_or("")
}

fn trim_quotes(token: &str) -> &str {
    if token.starts_with('"') && token.ends_with('"') {
        let inner = &token[1..];
        inner.strip_suffix('"').unwrap_or(inner)
    } else {
        token
    }
}

/// Fenced code block extracted from arguments
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Codeblock {
    pub language: String,
    pub content: String,
}

/// A single positional argument
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Argument {
    raw: String,
}

impl Argument {
    pub fn new(raw: impl Into<String>) -> Self {
        Self { raw: raw.into() }
    }

    pub fn raw(&self) -> &str {
        &self.raw
    }

    pub fn as_bool(&self) -> Result<bool, ArgumentError> {
        match self.raw.as_str() {
            "1" | "t" | "T" | "TRUE" | "true" | "True" => Ok(true),
            "0" | "f" | "F" | "FALSE" | "false" | "False" => Ok(false),
            _ => Err(ArgumentError::InvalidBool(self.raw.clone())),
        }
    }

    pub fn as_int(&self) -> Result<i32, ArgumentError> {
        self.raw.parse().map_err(|source| ArgumentError::InvalidInt {
            value: self.raw.clone(),
            source,
        })
    }

    pub fn as_int64(&self) -> Result<i64, ArgumentError> {
        self.raw.parse().map_err(|source| ArgumentError::InvalidInt {
            value: self.raw.clone(),
            source,
        })
    }

    /// ID of the mentioned user (`<@id>` or `<@!id>`)
    pub fn as_user_mention_id(&self) -> Option<String> {
        capture_id(&USER_MENTION, &self.raw)
    }

    /// ID of the mentioned role (`<@&id>`)
    pub fn as_role_mention_id(&self) -> Option<String> {
        capture_id(&ROLE_MENTION, &self.raw)
    }

    /// ID of the mentioned channel (`<#id>`)
    pub fn as_channel_mention_id(&self) -> Option<String> {
        capture_id(&CHANNEL_MENTION, &self.raw)
    }

    /// Parse a compound duration such as `1h30m`, `2d` or `500ms`.
    /// Months count as 30 days and years as 365 days.
    pub fn as_duration(&self) -> Result<Duration, ArgumentError> {
        let invalid = || ArgumentError::InvalidDuration(self.raw.clone());

        if !DURATION_FORMAT.is_match(&self.raw) {
            return Err(invalid());
        }

        let mut nanos = 0f64;
        for captures in DURATION_COMPONENT.captures_iter(&self.raw) {
            let amount: f64 = group(&captures, 1).parse().map_err(|_| invalid())?;
            let unit = unit_nanos(group(&captures, 2)).ok_or_else(invalid)?;
            nanos += amount * unit;
        }

        if nanos > u64::MAX as f64 {
            return Err(invalid());
        }
        Ok(Duration::from_nanos(nanos.round() as u64))
    }
}

fn capture_id(pattern: &Regex, raw: &str) -> Option<String> {
    pattern
        .captures(raw)
        .and_then(|captures| captures.get(1))
        .map(|m| m.as_str().to_string())
}

fn unit_nanos(unit: &str) -> Option<f64> {
    const SECOND: f64 = 1e9;
    const MINUTE: f64 = 60.0 * SECOND;
    const HOUR: f64 = 60.0 * MINUTE;
    const DAY: f64 = 24.0 * HOUR;

    let nanos = match unit {
        "ns" => 1.0,
        "us" => 1e3,
        "ms" => 1e6,
        "s" | "sec" | "secs" | "second" | "seconds" => SECOND,
        "m" | "min" | "mins" | "minute" | "minutes" => MINUTE,
        "h" | "hr" | "hrs" | "hour" | "hours" => HOUR,
        "d" | "day" | "days" => DAY,
        "w" | "week" | "weeks" => 7.0 * DAY,
        "mo" | "month" | "months" => 30.0 * DAY,
        "y" | "yr" | "year" | "years" => 365.0 * DAY,
        _ => return None,
    };
    Some(nanos)
}
