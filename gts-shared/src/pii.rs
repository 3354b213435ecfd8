use serde::{Serialize, Deserialize, Serializer};
use std::fmt;

/// A wrapper for driver contact data (email, phone) that masks its value in Debug and Display output.
#[derive(Clone, Deserialize, PartialEq, Eq)]
pub struct Masked<T>(pub T);

impl<T: fmt::Display> fmt::Debug for Masked<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "********")
    }
}

impl<T: fmt::Display> fmt::Display for Masked<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "********")
    }
}

impl<T: Serialize> Serialize for Masked<T> {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        // API responses need the real value; masking only guards log macros.
        self.0.serialize(serializer)
    }
}

impl<T> Masked<T> {
    pub fn into_inner(self) -> T {
        self.0
    }

    pub fn expose(&self) -> &T {
        &self.0
    }
}

impl Masked<String> {
    /// Keeps the last `visible` characters, e.g. `***1234` for a phone number.
    pub fn hint(&self, visible: usize) -> String {
        let chars: Vec<char> = self.0.chars().collect();
        if chars.len() <= visible {
            return "*".repeat(chars.len());
        }
        let tail: String = chars[chars.len() - visible..].iter().collect();
        format!("***{}", tail)
    }
}
