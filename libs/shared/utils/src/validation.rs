use regex::Regex;

pub fn validate_email(email: &str) -> bool {
    let email_regex = Regex::new(r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$")
        .expect("static email pattern");

    email_regex.is_match(email) && email.len() <= 254
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_normal_addresses() {
        assert!(validate_email("patient@example.com"));
        assert!(validate_email("first.last+tag@clinic.co.uk"));
    }

    #[test]
    fn rejects_malformed_addresses() {
        assert!(!validate_email("not-an-email"));
        assert!(!validate_email("missing@tld"));
        assert!(!validate_email("@example.com"));
    }
}
