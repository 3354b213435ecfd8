use rand::Rng;

/// Source of human-readable confirmation codes.
pub trait ConfirmationCodeGenerator: Send + Sync {
    fn generate(&self) -> String;
}

/// `{prefix}` followed by 3 random bytes rendered as uppercase hex, e.g. `GTS-4F0A9C`.
#[derive(Debug, Clone)]
pub struct RandomHexCodes {
    prefix: String,
}

impl RandomHexCodes {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self { prefix: prefix.into() }
    }
}

impl Default for RandomHexCodes {
    fn default() -> Self {
        Self::new("GTS-")
    }
}

impl ConfirmationCodeGenerator for RandomHexCodes {
    fn generate(&self) -> String {
        let bytes: [u8; 3] = rand::thread_rng().gen();
        let hex: String = bytes.iter().map(|b| format!("{:02X}", b)).collect();
        format!("{}{}", self.prefix, hex)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_code_format() {
        let codes = RandomHexCodes::default();
        for _ in 0..50 {
            let code = codes.generate();
            assert_eq!(code.len(), 10);
            assert!(code.starts_with("GTS-"));
            assert!(code[4..].chars().all(|c| c.is_ascii_digit() || ('A'..='F').contains(&c)));
        }
    }
}
