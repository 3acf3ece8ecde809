//! Reusable field validators

use chrono::NaiveDate;
use regex::Regex;
use std::sync::OnceLock;

/// Strip the `xxx.xxx.xxx-xx` mask from a cpf
pub fn unmask_cpf(cpf: &str) -> String {
    cpf.chars().filter(|c| *c != '.' && *c != '-').collect()
}

/// Render an unmasked cpf as `xxx.xxx.xxx-xx`
///
/// Returns `None` unless the input is exactly eleven digits.
pub fn mask_cpf(cpf: &str) -> Option<String> {
    if cpf.len() != 11 || !is_digits(cpf) {
        return None;
    }
    Some(format!(
        "{}.{}.{}-{}",
        &cpf[0..3],
        &cpf[3..6],
        &cpf[6..9],
        &cpf[9..11]
    ))
}

/// Check an unmasked cpf: eleven digits whose last two are valid check digits
pub fn is_valid_cpf(cpf: &str) -> bool {
    if cpf.len() != 11 || !is_digits(cpf) {
        return false;
    }

    let digits: Vec<u32> = cpf.chars().filter_map(|c| c.to_digit(10)).collect();
    let first = check_digit(&digits[..9]);
    let second = check_digit(&digits[..10]);
    digits[9] == first && digits[10] == second
}

fn check_digit(prefix: &[u32]) -> u32 {
    let sum: u32 = prefix
        .iter()
        .rev()
        .zip(2..)
        .map(|(digit, weight)| digit * weight)
        .sum();
    let digit = 11 - sum % 11;
    if digit > 9 { 0 } else { digit }
}

/// Non-empty and ASCII digits only
pub fn is_digits(value: &str) -> bool {
    !value.is_empty() && value.chars().all(|c| c.is_ascii_digit())
}

/// One `@`, something on both sides, no `$` in the domain
pub fn is_valid_email(email: &str) -> bool {
    static EMAIL_REGEX: OnceLock<Regex> = OnceLock::new();
    let regex =
        EMAIL_REGEX.get_or_init(|| Regex::new(r"^[^@]+@[^@$]+$").expect("email pattern is valid"));
    regex.is_match(email)
}

/// Parse a `YYYY-MM-DD` date
pub fn parse_iso_date(value: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d").ok()
}
