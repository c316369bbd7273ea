//! Phone number normalization.
//!
//! Inbound webhook payloads and stored enrollments rarely agree on a
//! phone format (`whatsapp:+4479...`, `+44 79...`, `4479...`). Lookup
//! compares normalized forms on both sides.

/// Normalize a phone number to bare digits.
///
/// Strips a `whatsapp:` prefix, `+`, spaces and dashes. If the result is
/// a bare national number (10 digits) and a default country code is
/// configured, the country code is prepended.
pub fn normalize(raw: &str, default_country_code: Option<&str>) -> String {
    let mut digits: String = raw
        .trim()
        .trim_start_matches("whatsapp:")
        .chars()
        .filter(|c| c.is_ascii_digit())
        .collect();

    if digits.len() == 10 {
        if let Some(cc) = default_country_code {
            digits = format!("{cc}{digits}");
        }
    }
    digits
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_whatsapp_prefix_and_punctuation() {
        assert_eq!(normalize("whatsapp:+91 98765-43210", None), "919876543210");
        assert_eq!(normalize("+91 98765 43210", None), "919876543210");
        assert_eq!(normalize("919876543210", None), "919876543210");
    }

    #[test]
    fn prepends_country_code_to_national_numbers() {
        assert_eq!(normalize("9876543210", Some("91")), "919876543210");
        // Already has a country code — left alone.
        assert_eq!(normalize("919876543210", Some("91")), "919876543210");
    }

    #[test]
    fn no_country_code_leaves_national_number() {
        assert_eq!(normalize("9876543210", None), "9876543210");
    }

    #[test]
    fn empty_input_normalizes_to_empty() {
        assert_eq!(normalize("", Some("91")), "");
        assert_eq!(normalize("whatsapp:", None), "");
    }
}
