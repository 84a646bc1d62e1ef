//! Sensitive data masking for logs.
//!
//! Masks auth tokens, session identifiers and other secrets in payloads
//! before they are written to a log line.

use regex::{Captures, Regex};
use std::borrow::Cow;
use std::sync::LazyLock;

/// Patterns for detecting sensitive data.
static PATTERNS: LazyLock<Vec<SensitivePattern>> = LazyLock::new(|| {
    [
        // JSON or key=value auth fields: "token": "...", access_token=...
        (
            r#"(?i)((?:access_|refresh_|auth_)?token|session_?id|session_?token)(["']?\s*[:=]\s*["']?)([^"'\s,}&]{4,})"#,
            3,
        ),
        // API keys
        (
            r#"(?i)(api[_-]?key|apikey)(["']?\s*[:=]\s*["']?)([a-zA-Z0-9_-]{8,})"#,
            3,
        ),
        // Passwords
        (
            r#"(?i)(password|passwd|pwd)(["']?\s*[:=]\s*["']?)([^\s"']{4,})"#,
            3,
        ),
        // Bearer tokens
        (r"(?i)(bearer)(\s+)([a-zA-Z0-9._~+/=-]{8,})", 3),
        // JWT tokens
        (r"eyJ[a-zA-Z0-9_-]*\.eyJ[a-zA-Z0-9_-]*\.[a-zA-Z0-9_-]*", 0),
    ]
    .into_iter()
    .filter_map(|(pattern, group)| {
        Regex::new(pattern)
            .ok()
            .map(|regex| SensitivePattern { regex, group })
    })
    .collect()
});

struct SensitivePattern {
    regex: Regex,
    group: usize,
}

/// Masks sensitive data in strings.
#[derive(Debug, Clone)]
pub struct SensitiveDataMasker {
    /// Minimum length of string to partially reveal
    min_length: usize,
    /// Characters to show at start of masked value
    show_start: usize,
    /// Characters to show at end of masked value
    show_end: usize,
    /// Mask character
    mask_char: char,
}

impl Default for SensitiveDataMasker {
    fn default() -> Self {
        Self::new()
    }
}

impl SensitiveDataMasker {
    /// Create a new masker with default settings.
    #[must_use]
    pub fn new() -> Self {
        Self {
            min_length: 8,
            show_start: 3,
            show_end: 3,
            mask_char: '*',
        }
    }

    /// Mask a known sensitive value.
    ///
    /// ```
    /// use echo_telemetry::masking::SensitiveDataMasker;
    ///
    /// let masker = SensitiveDataMasker::new();
    /// assert_eq!(masker.mask_value("abcdefghijklmnop"), "abc***nop");
    /// ```
    #[must_use]
    pub fn mask_value(&self, value: &str) -> String {
        let chars: Vec<char> = value.chars().collect();
        let mask = self.mask_char.to_string().repeat(3);
        if chars.len() < self.min_length || chars.len() <= self.show_start + self.show_end {
            return self.mask_char.to_string().repeat(chars.len().max(3));
        }

        let start: String = chars[..self.show_start].iter().collect();
        let end: String = chars[chars.len() - self.show_end..].iter().collect();
        format!("{start}{mask}{end}")
    }

    /// Mask sensitive data in a string using pattern detection.
    ///
    /// ```
    /// use echo_telemetry::masking::SensitiveDataMasker;
    ///
    /// let masker = SensitiveDataMasker::new();
    /// let masked = masker.mask_string(r#"{"type":"chat","token":"a1b2c3d4e5f6g7h8"}"#);
    /// assert!(!masked.contains("a1b2c3d4e5f6g7h8"));
    /// assert!(masked.contains(r#""type":"chat""#));
    /// ```
    #[must_use]
    pub fn mask_string<'a>(&self, input: &'a str) -> Cow<'a, str> {
        let mut result = Cow::Borrowed(input);

        for pattern in PATTERNS.iter() {
            if !pattern.regex.is_match(&result) {
                continue;
            }
            let replaced = pattern
                .regex
                .replace_all(&result, |caps: &Captures<'_>| self.mask_captures(caps, pattern.group))
                .into_owned();
            result = Cow::Owned(replaced);
        }

        result
    }

    fn mask_captures(&self, caps: &Captures<'_>, group: usize) -> String {
        if group == 0 {
            return self.mask_value(&caps[0]);
        }
        // Keep the key and separator, mask only the value
        let mut out = String::new();
        for i in 1..caps.len() {
            if let Some(m) = caps.get(i) {
                if i == group {
                    out.push_str(&self.mask_value(m.as_str()));
                } else {
                    out.push_str(m.as_str());
                }
            }
        }
        out
    }
}

/// A wrapper type for sensitive values that masks them in Display/Debug.
#[derive(Clone)]
pub struct Sensitive<T>(T);

impl<T> Sensitive<T> {
    /// Wrap a value as sensitive.
    #[must_use]
    pub fn new(value: T) -> Self {
        Self(value)
    }

    /// Get the inner value.
    pub fn expose(&self) -> &T {
        &self.0
    }
}

impl<T> std::fmt::Debug for Sensitive<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[REDACTED]")
    }
}

impl<T> std::fmt::Display for Sensitive<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[REDACTED]")
    }
}
