use serde::{Deserialize, Serialize};
use std::fmt;

/// GS1 Global Location Number identifying a charge owner
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GlobalLocationNumber(String);

impl GlobalLocationNumber {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into().trim().to_string())
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Thirteen digits with a valid GS1 mod-10 check digit
    pub fn is_valid(&self) -> bool {
        let digits: Vec<u32> = self.0.chars().filter_map(|c| c.to_digit(10)).collect();
        if self.0.len() != 13 || digits.len() != 13 {
            return false;
        }
        let (body, check) = digits.split_at(12);
        // Weights alternate 3,1,... starting from the digit next to the check digit
        let sum: u32 = body
            .iter()
            .rev()
            .enumerate()
            .map(|(i, d)| if i % 2 == 0 { d * 3 } else { *d })
            .sum();
        (10 - sum % 10) % 10 == check[0]
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for GlobalLocationNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for GlobalLocationNumber {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}
