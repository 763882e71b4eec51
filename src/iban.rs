//! ISO 7064 MOD97-10 checksum for IBANs.
//!
//! The numeric expansion of an IBAN can run to 68 digits, well past any
//! native integer type, so the remainder is computed by chunked modular
//! reduction: a 9-digit head window, then repeated windows formed by
//! prefixing the carried remainder to the next 7 digits until the string is
//! exhausted. A trailing window shorter than 7 digits is reduced the same
//! way.

/// Check an IBAN's MOD97-10 checksum. The input is expected to have passed
/// the structural format check already; any character outside `[A-Za-z0-9]`
/// fails the check.
pub fn checksum_valid(iban: &str) -> bool {
    if iban.len() < 5 || !iban.is_ascii() {
        return false;
    }

    let upper = iban.to_ascii_uppercase();
    // Country code and check digits move to the back before expansion.
    let rotated = format!("{}{}", &upper[4..], &upper[..4]);

    let mut digits = String::with_capacity(rotated.len() * 2);
    for c in rotated.chars() {
        if c.is_ascii_digit() {
            digits.push(c);
        } else if c.is_ascii_uppercase() {
            let value = c as u32 - 'A' as u32 + 10;
            digits.push_str(&value.to_string());
        } else {
            return false;
        }
    }

    mod97(&digits) == 1
}

/// Reduce an all-digit string modulo 97 in windows. The remainder carried
/// between windows is at most two digits, so every window value stays below
/// ten digits and fits a `u64` exactly.
fn mod97(digits: &str) -> u64 {
    let head = digits.len().min(9);
    let mut remainder = reduce_window(0, &digits[..head]);

    let mut rest = &digits[head..];
    while !rest.is_empty() {
        let take = rest.len().min(7);
        remainder = reduce_window(remainder, &rest[..take]);
        rest = &rest[take..];
    }

    remainder
}

fn reduce_window(carry: u64, window: &str) -> u64 {
    let value = window
        .bytes()
        .fold(carry, |acc, b| acc * 10 + u64::from(b - b'0'));
    value % 97
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_published_test_ibans() {
        assert!(checksum_valid("NL91ABNA0417164300"));
        assert!(checksum_valid("GB82WEST12345698765432"));
        assert!(checksum_valid("DE89370400440532013000"));
        assert!(checksum_valid("BE71096123456769"));
    }

    #[test]
    fn test_lowercase_is_accepted() {
        assert!(checksum_valid("nl91abna0417164300"));
    }

    #[test]
    fn test_altered_digit_fails() {
        assert!(!checksum_valid("NL91ABNA0417164301"));
        assert!(!checksum_valid("DE89370400440532013001"));
    }

    #[test]
    fn test_transposed_check_digits_fail() {
        assert!(!checksum_valid("NL19ABNA0417164300"));
    }

    #[test]
    fn test_short_and_malformed_input() {
        assert!(!checksum_valid(""));
        assert!(!checksum_valid("NL91"));
        assert!(!checksum_valid("NL91 ABNA"));
    }
}
