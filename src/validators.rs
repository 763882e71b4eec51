//! Structural validators for the fields of a pain.001 message.
//!
//! Every validator takes the raw field value and answers with `Ok(())` or a
//! human-readable reason. Malformed input is the expected non-valid case and
//! is always reported through the return value; validators never panic.
//!
//! Dispatch by field goes through [`PaymentField`], a closed enumeration, so
//! "one validator per named field" is resolved at compile time instead of
//! through a string-keyed lookup.

use std::sync::OnceLock;

use regex::Regex;

use crate::iban;
use crate::SequenceType;

/// Maximum number of digits accepted in a minor-unit amount. Twelve digits
/// keep any realistic control sum far inside `u64` and inside the 18-digit
/// CtrlSum wire field; larger amounts are rejected rather than saturated.
pub const MAX_AMOUNT_DIGITS: usize = 12;

/// The SEPA-permitted character class: letters, digits, space, and the fixed
/// punctuation set (including the en dash and typographic quote the scheme
/// allows), at most 140 characters.
const SEPA_TEXT: &str = r"^[A-Za-z0-9/–?:().,'‘+\s]{0,140}$";
const IBAN_FORMAT: &str = r"^[A-Z]{2}[0-9]{2}[A-Za-z0-9]{1,30}$";
const BIC_FORMAT: &str = r"^[A-Za-z]{4}[A-Za-z]{2}[A-Za-z0-9]{2}([A-Za-z0-9]{3})?$";

fn sepa_text_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(SEPA_TEXT).unwrap())
}

fn iban_format_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(IBAN_FORMAT).unwrap())
}

fn bic_format_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(BIC_FORMAT).unwrap())
}

/// The named fields a validator can be attached to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaymentField {
    Name,
    Iban,
    Bic,
    Amount,
    ExecutionDate,
    Description,
    EndToEndId,
    SequenceType,
}

impl PaymentField {
    /// Field name as it appears in error reports.
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentField::Name => "name",
            PaymentField::Iban => "IBAN",
            PaymentField::Bic => "BIC",
            PaymentField::Amount => "amount",
            PaymentField::ExecutionDate => "execution_date",
            PaymentField::Description => "description",
            PaymentField::EndToEndId => "end_to_end_id",
            PaymentField::SequenceType => "type",
        }
    }
}

/// Validator set for one message. Carries the single piece of configuration
/// the validators need: whether IBAN/BIC checks run at all.
#[derive(Debug, Clone, Copy)]
pub struct Validators {
    checksum_enabled: bool,
}

impl Validators {
    pub fn new(checksum_enabled: bool) -> Self {
        Self { checksum_enabled }
    }

    /// Apply the validator belonging to `field`.
    pub fn validate(&self, field: PaymentField, value: &str) -> Result<(), String> {
        match field {
            PaymentField::Name | PaymentField::Description => validate_text(value),
            PaymentField::Iban => validate_iban(value, self.checksum_enabled),
            PaymentField::Bic => validate_bic(value, self.checksum_enabled),
            PaymentField::Amount => validate_amount(value),
            PaymentField::ExecutionDate => validate_date(value),
            PaymentField::EndToEndId => validate_end_to_end_id(value),
            PaymentField::SequenceType => validate_sequence_type(value),
        }
    }
}

/// Check free text against the SEPA character class and the 140-character
/// limit. The class is anchored over the whole value; a single character
/// outside it fails the field.
pub fn validate_text(text: &str) -> Result<(), String> {
    if text.chars().count() > 140 {
        return Err("is longer than 140 characters".to_string());
    }
    if !sepa_text_re().is_match(text) {
        return Err("contains characters outside the SEPA character set".to_string());
    }
    Ok(())
}

/// Check an IBAN: structural format first, then the MOD97-10 checksum. Both
/// checks are skipped when checksum validation is disabled for the message.
pub fn validate_iban(iban: &str, checksum_enabled: bool) -> Result<(), String> {
    if !checksum_enabled {
        return Ok(());
    }
    if !iban_format_re().is_match(iban) {
        return Err("does not match the IBAN format".to_string());
    }
    if !iban::checksum_valid(iban) {
        return Err("fails the MOD97-10 checksum".to_string());
    }
    Ok(())
}

/// Check a BIC. Format only; no checksum exists for BICs.
pub fn validate_bic(bic: &str, checksum_enabled: bool) -> Result<(), String> {
    if !checksum_enabled {
        return Ok(());
    }
    if !bic_format_re().is_match(bic) {
        return Err("does not match the BIC format".to_string());
    }
    Ok(())
}

/// Check that an amount is already expressed as an integer minor-unit digit
/// string: decimal digits only, no sign, no decimal point.
pub fn validate_amount(amount: &str) -> Result<(), String> {
    if amount.is_empty() || !amount.bytes().all(|b| b.is_ascii_digit()) {
        return Err("is not a minor-unit digit string".to_string());
    }
    if amount.len() > MAX_AMOUNT_DIGITS {
        return Err(format!("exceeds {} digits", MAX_AMOUNT_DIGITS));
    }
    Ok(())
}

/// Check an ISO `YYYY-MM-DD` calendar date.
pub fn validate_date(date: &str) -> Result<(), String> {
    match chrono::NaiveDate::parse_from_str(date, "%Y-%m-%d") {
        Ok(_) => Ok(()),
        Err(_) => Err("is not a valid ISO date".to_string()),
    }
}

/// Check an end-to-end identifier: pure ASCII, strictly shorter than 36
/// characters. The reason names whichever condition failed.
pub fn validate_end_to_end_id(id: &str) -> Result<(), String> {
    if !id.is_ascii() {
        return Err("is not ASCII".to_string());
    }
    if id.len() >= 36 {
        return Err("is longer than 35 characters".to_string());
    }
    Ok(())
}

/// Check a credit transfer sequence type code (FRST, RCUR, FNAL, OOFF).
pub fn validate_sequence_type(code: &str) -> Result<(), String> {
    code.parse::<SequenceType>().map(|_| ())
}
