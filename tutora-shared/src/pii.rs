use serde::{Deserialize, Serialize, Serializer};
use std::fmt;

/// Wrapper for contact data (emails, phone numbers) that hides the value in
/// Debug/Display output. Serialization passes the real value through so API
/// responses and persisted documents are unaffected; the wrapper exists to
/// keep `tracing::info!("{:?}", payload)` from leaking PII into log storage.
#[derive(Clone, Deserialize)]
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
        self.0.serialize(serializer)
    }
}

impl<T> Masked<T> {
    pub fn into_inner(self) -> T {
        self.0
    }
}

/// Partial mask for log lines where the operator still needs to correlate a
/// record: keeps the first character of the local part and the full domain.
pub fn mask_email(email: &str) -> String {
    match email.split_once('@') {
        Some((local, domain)) => {
            let head = local.chars().next().map(String::from).unwrap_or_default();
            format!("{}***@{}", head, domain)
        }
        None => "***".to_string(),
    }
}

/// Keeps the last four digits of a phone number.
pub fn mask_phone(phone: &str) -> String {
    let digits: Vec<char> = phone.chars().filter(|c| c.is_ascii_digit()).collect();
    if digits.len() <= 4 {
        return "***".to_string();
    }
    let tail: String = digits[digits.len() - 4..].iter().collect();
    format!("***{}", tail)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_masked_debug_hides_value() {
        let m = Masked("parent@example.com".to_string());
        assert_eq!(format!("{:?}", m), "********");
        assert_eq!(format!("{}", m), "********");
    }

    #[test]
    fn test_masked_serializes_inner_value() {
        let m = Masked("parent@example.com".to_string());
        assert_eq!(
            serde_json::to_string(&m).unwrap(),
            "\"parent@example.com\""
        );
    }

    #[test]
    fn test_mask_email() {
        assert_eq!(mask_email("parent@example.com"), "p***@example.com");
        assert_eq!(mask_email("not-an-email"), "***");
    }

    #[test]
    fn test_mask_phone() {
        assert_eq!(mask_phone("+1 (555) 867-5309"), "***5309");
        assert_eq!(mask_phone("309"), "***");
    }
}
