//! Minor-unit amount codec.
//!
//! Every amount in this crate is carried as an integer number of minor units
//! (cents) and only turned into the wire representation, a decimal string
//! with exactly two fractional digits, at the serialization boundary. All
//! arithmetic is exact integer arithmetic; floating point never appears.

/// Convert a minor-unit digit string to a decimal string with two
/// fractional digits. A decimal point already present in the input is
/// stripped first, so passing a decimal through is a no-op.
///
/// `"3500"` becomes `"35.00"`, `"999"` becomes `"9.99"`, `"5"` becomes
/// `"0.05"`.
pub fn to_decimal(minor: &str) -> String {
    let digits: String = minor.chars().filter(|c| *c != '.').collect();
    let split = digits.len().saturating_sub(2);
    let (whole, fraction) = digits.split_at(split);
    let whole = if whole.is_empty() { "0" } else { whole };
    format!("{}.{:0>2}", whole, fraction)
}

/// Convert a decimal string back to its minor-unit digit string by dropping
/// the decimal point. `"35.00"` becomes `"3500"`.
pub fn to_minor_units(decimal: &str) -> String {
    decimal.chars().filter(|c| *c != '.').collect()
}

/// Sum decimal amount strings exactly, returning the total as a decimal
/// string. Each operand is reduced to minor units and summed as an integer;
/// operands that do not reduce to a digit string contribute nothing.
pub fn sum_decimals<'a, I>(decimals: I) -> String
where
    I: IntoIterator<Item = &'a str>,
{
    let total: u128 = decimals
        .into_iter()
        .filter_map(|d| to_minor_units(d).parse::<u128>().ok())
        .sum();
    to_decimal(&total.to_string())
}
