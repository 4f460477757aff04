use std::fmt;

/// A 3- or 6-digit hexadecimal color code, stored without the leading `#`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HexColor(String);

impl HexColor {
    /// Parse a color code, accepting a single optional leading `#`.
    pub fn parse(value: &str) -> Option<Self> {
        let digits = value.strip_prefix('#').unwrap_or(value);
        let valid = matches!(digits.len(), 3 | 6) && digits.chars().all(|c| c.is_ascii_hexdigit());
        valid.then(|| Self(digits.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for HexColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
