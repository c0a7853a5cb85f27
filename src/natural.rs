//! Natural (numeric-aware) filename ordering
//!
//! `walk_9.png` < `walk_10.png`. Filenames are split into maximal runs of
//! ASCII digits and non-digits; digit runs compare by numeric value, other
//! runs by code point. When the token streams tie (e.g. `a01` vs `a1`) the
//! full filenames decide, so the order is total.

use std::cmp::Ordering;

/// One run of a tokenized filename
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    Text(String),
    /// Digit run, stored as written (leading zeros kept)
    Digits(String),
}

impl Token {
    fn as_str(&self) -> &str {
        match self {
            Token::Text(s) | Token::Digits(s) => s,
        }
    }
}

/// Precomputed sort key for one filename
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortKey {
    tokens: Vec<Token>,
    raw: String,
}

impl SortKey {
    pub fn new(filename: &str) -> Self {
        Self {
            tokens: tokenize(filename),
            raw: filename.to_string(),
        }
    }

    pub fn tokens(&self) -> &[Token] {
        &self.tokens
    }

    pub fn raw(&self) -> &str {
        &self.raw
    }
}

impl Ord for SortKey {
    fn cmp(&self, other: &Self) -> Ordering {
        let mut a = self.tokens.iter();
        let mut b = other.tokens.iter();
        loop {
            match (a.next(), b.next()) {
                (Some(x), Some(y)) => match cmp_tokens(x, y) {
                    Ordering::Equal => continue,
                    ord => return ord,
                },
                (None, Some(_)) => return Ordering::Less,
                (Some(_), None) => return Ordering::Greater,
                (None, None) => break,
            }
        }
        self.raw.cmp(&other.raw)
    }
}

impl PartialOrd for SortKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Compare two filenames in natural order
pub fn natural_cmp(a: &str, b: &str) -> Ordering {
    SortKey::new(a).cmp(&SortKey::new(b))
}

/// Split a filename into alternating digit / non-digit runs
///
/// `"walk_010.png"` -> `["walk_", "010", ".png"]`
pub fn tokenize(s: &str) -> Vec<Token> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut in_digits = false;

    for ch in s.chars() {
        let is_digit = ch.is_ascii_digit();
        if !current.is_empty() && is_digit != in_digits {
            tokens.push(make_token(std::mem::take(&mut current), in_digits));
        }
        in_digits = is_digit;
        current.push(ch);
    }
    if !current.is_empty() {
        tokens.push(make_token(current, in_digits));
    }
    tokens
}

fn make_token(run: String, digits: bool) -> Token {
    if digits { Token::Digits(run) } else { Token::Text(run) }
}

fn cmp_tokens(a: &Token, b: &Token) -> Ordering {
    match (a, b) {
        (Token::Digits(x), Token::Digits(y)) => cmp_numeric(x, y),
        _ => a.as_str().cmp(b.as_str()),
    }
}

/// Compare two ASCII digit strings by value, any length
fn cmp_numeric(a: &str, b: &str) -> Ordering {
    let a = a.trim_start_matches('0');
    let b = b.trim_start_matches('0');
    a.len().cmp(&b.len()).then_with(|| a.cmp(b))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sorted(names: &[&str]) -> Vec<String> {
        let mut keys: Vec<SortKey> = names.iter().map(|n| SortKey::new(n)).collect();
        keys.sort();
        keys.into_iter().map(|k| k.raw().to_string()).collect()
    }

    #[test]
    fn test_tokenize() {
        assert_eq!(
            tokenize("walk_010.png"),
            vec![
                Token::Text("walk_".into()),
                Token::Digits("010".into()),
                Token::Text(".png".into()),
            ]
        );
        assert_eq!(tokenize("42"), vec![Token::Digits("42".into())]);
        assert!(tokenize("").is_empty());
    }

    #[test]
    fn test_frame10_after_frame9() {
        let mut names: Vec<String> = (1..=11).map(|i| format!("frame{}.png", i)).collect();
        names.reverse();
        let refs: Vec<&str> = names.iter().map(|s| s.as_str()).collect();

        let expected: Vec<String> = (1..=11).map(|i| format!("frame{}.png", i)).collect();
        assert_eq!(sorted(&refs), expected);
    }

    #[test]
    fn test_leading_zeros_tie_break() {
        assert_eq!(natural_cmp("a01", "a1"), Ordering::Less);
        assert_eq!(natural_cmp("a1", "a01"), Ordering::Greater);
        assert_eq!(natural_cmp("a001", "a2"), Ordering::Less);
        assert_eq!(natural_cmp("x.png", "x.png"), Ordering::Equal);
    }

    #[test]
    fn test_shorter_sorts_first() {
        assert_eq!(natural_cmp("walk", "walk_1"), Ordering::Less);
        assert_eq!(natural_cmp("walk_1", "walk_1a"), Ordering::Less);
    }

    #[test]
    fn test_digit_vs_text_by_code_point() {
        // '1' (0x31) < 'a' (0x61)
        assert_eq!(natural_cmp("1abc", "abc"), Ordering::Less);
        assert_eq!(natural_cmp("frame_b", "frame_10"), Ordering::Greater);
    }

    #[test]
    fn test_huge_numbers_do_not_overflow() {
        let a = "shot_99999999999999999999999999.exr";
        let b = "shot_100000000000000000000000000.exr";
        assert_eq!(natural_cmp(a, b), Ordering::Less);
    }

    #[test]
    fn test_mixed_names() {
        assert_eq!(
            sorted(&["img12b.png", "img12a.png", "img2.png", "img12.png", "IMG3.png"]),
            vec!["IMG3.png", "img2.png", "img12.png", "img12a.png", "img12b.png"]
        );
    }
}
