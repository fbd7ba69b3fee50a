use std::sync::OnceLock;

use regex::Regex;

fn email_regex() -> &'static Regex {
    static EMAIL: OnceLock<Regex> = OnceLock::new();
    EMAIL.get_or_init(|| {
        Regex::new(r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$")
            .expect("email pattern is valid")
    })
}

fn phone_regex() -> &'static Regex {
    static PHONE: OnceLock<Regex> = OnceLock::new();
    PHONE.get_or_init(|| {
        Regex::new(r"^\+?[0-9][0-9\s\-().]{5,19}$").expect("phone pattern is valid")
    })
}

pub fn validate_email(email: &str) -> bool {
    email.len() <= 254 && email_regex().is_match(email)
}

pub fn validate_phone(phone: &str) -> bool {
    phone_regex().is_match(phone.trim())
}

/// Checks that `value` has between `min` and `max` characters after trimming.
pub fn validate_length(value: &str, min: usize, max: usize) -> bool {
    let len = value.trim().chars().count();
    len >= min && len <= max
}
