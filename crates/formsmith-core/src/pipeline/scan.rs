//! String-aware, escape-aware character scanner.
//!
//! A three-state machine (`Default`, `InString`, `Escaped`) shared by the
//! extractor, the truncation pass, and the balance checks. Structural
//! characters are only reported outside of strings, so brackets and quotes
//! inside string values are never counted.

/// Where the scanner currently is relative to JSON string literals.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanState {
    Default,
    InString,
    Escaped,
}

/// Classification of one character fed to the scanner.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// A character outside any string (brackets, commas, colons, scalars, whitespace).
    Structural(char),
    /// The quote that opens a string.
    QuoteOpen,
    /// The quote that closes a string.
    QuoteClose,
    /// Any character inside a string, including backslashes and escaped characters.
    InString(char),
}

#[derive(Debug, Clone)]
pub struct Scanner {
    state: ScanState,
}

impl Scanner {
    pub fn new() -> Self {
        Self {
            state: ScanState::Default,
        }
    }

    pub fn state(&self) -> ScanState {
        self.state
    }

    /// Whether the last character fed left the scanner inside a string.
    pub fn in_string(&self) -> bool {
        self.state != ScanState::Default
    }

    /// Advance the state machine by one character.
    pub fn feed(&mut self, ch: char) -> Step {
        match self.state {
            ScanState::Default => {
                if ch == '"' {
                    self.state = ScanState::InString;
                    Step::QuoteOpen
                } else {
                    Step::Structural(ch)
                }
            }
            ScanState::InString => match ch {
                '\\' => {
                    self.state = ScanState::Escaped;
                    Step::InString(ch)
                }
                '"' => {
                    self.state = ScanState::Default;
                    Step::QuoteClose
                }
                _ => Step::InString(ch),
            },
            ScanState::Escaped => {
                self.state = ScanState::InString;
                Step::InString(ch)
            }
        }
    }
}

impl Default for Scanner {
    fn default() -> Self {
        Self::new()
    }
}

/// Bracket counts outside of strings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Balance {
    pub open_braces: usize,
    pub close_braces: usize,
    pub open_brackets: usize,
    pub close_brackets: usize,
    /// The text ended while inside a string literal.
    pub ends_in_string: bool,
}

impl Balance {
    /// Count brackets in `text`, ignoring anything inside strings.
    pub fn of(text: &str) -> Self {
        let mut scanner = Scanner::new();
        let mut balance = Balance::default();
        for ch in text.chars() {
            if let Step::Structural(c) = scanner.feed(ch) {
                match c {
                    '{' => balance.open_braces += 1,
                    '}' => balance.close_braces += 1,
                    '[' => balance.open_brackets += 1,
                    ']' => balance.close_brackets += 1,
                    _ => {}
                }
            }
        }
        balance.ends_in_string = scanner.in_string();
        balance
    }

    pub fn is_balanced(&self) -> bool {
        self.open_braces == self.close_braces && self.open_brackets == self.close_brackets
    }

    /// More containers were opened than closed, or a string never closed.
    pub fn looks_truncated(&self) -> bool {
        self.open_braces > self.close_braces
            || self.open_brackets > self.close_brackets
            || self.ends_in_string
    }
}

/// Kind of an open JSON container.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Container {
    Object,
    Array,
}

impl Container {
    pub fn closer(self) -> char {
        match self {
            Container::Object => '}',
            Container::Array => ']',
        }
    }
}

/// Containers still open at the end of `text`, outermost first.
pub fn open_containers(text: &str) -> Vec<Container> {
    let mut scanner = Scanner::new();
    let mut stack = Vec::new();
    for ch in text.chars() {
        if let Step::Structural(c) = scanner.feed(ch) {
            match c {
                '{' => stack.push(Container::Object),
                '[' => stack.push(Container::Array),
                '}' | ']' => {
                    stack.pop();
                }
                _ => {}
            }
        }
    }
    stack
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escaped_quote_does_not_close_string() {
        let mut scanner = Scanner::new();
        let steps: Vec<Step> = r#""a\"b""#.chars().map(|c| scanner.feed(c)).collect();
        assert_eq!(steps[0], Step::QuoteOpen);
        assert_eq!(steps[3], Step::InString('"'));
        assert_eq!(steps[5], Step::QuoteClose);
        assert_eq!(scanner.state(), ScanState::Default);
    }

    #[test]
    fn test_double_backslash_before_quote_closes_string() {
        let mut scanner = Scanner::new();
        for ch in r#""a\\""#.chars() {
            scanner.feed(ch);
        }
        assert!(!scanner.in_string());
    }

    #[test]
    fn test_balance_ignores_brackets_in_strings() {
        let balance = Balance::of(r#"{"a":"{[}]","b":[1,2]}"#);
        assert!(balance.is_balanced());
        assert!(!balance.looks_truncated());
        assert_eq!(balance.open_braces, 1);
        assert_eq!(balance.open_brackets, 1);
    }

    #[test]
    fn test_balance_detects_truncation() {
        assert!(Balance::of(r#"{"a":[1,2"#).looks_truncated());
        assert!(Balance::of(r#"{"a":"unfinished"#).looks_truncated());
        assert!(Balance::of(r#"{"a":"x"}"#).is_balanced());
    }

    #[test]
    fn test_open_containers_order() {
        let stack = open_containers(r#"{"s":[{"q":["#);
        assert_eq!(
            stack,
            vec![
                Container::Object,
                Container::Array,
                Container::Object,
                Container::Array
            ]
        );
    }
}
