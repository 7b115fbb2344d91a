use std::borrow::Cow;
use std::sync::LazyLock;

use chrono::NaiveDate;
use regex::Regex;
use validator::{Validate, ValidationError, ValidationErrors};

use shared_models::error::AppError;

static PHONE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\+?[1-9]\d{7,14}$").expect("phone pattern is valid"));

fn digits(value: &str) -> Option<Vec<u32>> {
    value.chars().map(|c| c.to_digit(10)).collect()
}

fn error(code: &'static str, message: &'static str) -> ValidationError {
    let mut err = ValidationError::new(code);
    err.message = Some(Cow::Borrowed(message));
    err
}

/// Brazilian individual taxpayer id: 11 digits with two check digits.
pub fn validate_cpf(value: &str) -> Result<(), ValidationError> {
    let invalid = || error("cpf", "cpf must have 11 digits and valid check digits");
    let d = digits(value).filter(|d| d.len() == 11).ok_or_else(invalid)?;

    if d.iter().all(|&x| x == d[0]) {
        return Err(invalid());
    }

    let check = |len: usize| {
        let sum: u32 = d[..len]
            .iter()
            .enumerate()
            .map(|(i, &x)| x * (len as u32 + 1 - i as u32))
            .sum();
        let rest = (sum * 10) % 11;
        if rest == 10 { 0 } else { rest }
    };

    if check(9) != d[9] || check(10) != d[10] {
        return Err(invalid());
    }
    Ok(())
}

/// Company registry number: exactly 14 digits.
pub fn validate_cnpj(value: &str) -> Result<(), ValidationError> {
    match digits(value) {
        Some(d) if d.len() == 14 => Ok(()),
        _ => Err(error("cnpj", "cnpj must have exactly 14 digits")),
    }
}

pub fn validate_phone(value: &str) -> Result<(), ValidationError> {
    if PHONE_RE.is_match(value) {
        Ok(())
    } else {
        Err(error("phone", "phone must be a valid international number"))
    }
}

/// Flatten validator output into one readable message.
pub fn describe(errors: &ValidationErrors) -> String {
    let mut messages: Vec<String> = errors
        .field_errors()
        .into_iter()
        .flat_map(|(field, errs)| {
            errs.iter().map(move |e| match &e.message {
                Some(msg) => format!("{}: {}", field, msg),
                None => format!("{}: invalid value", field),
            })
        })
        .collect();

    for (field, kind) in errors.errors() {
        if let validator::ValidationErrorsKind::Struct(inner) = kind {
            messages.push(format!("{}: {}", field, describe(inner)));
        }
    }

    messages.sort();
    messages.join("; ")
}

/// Birth dates arrive as `YYYY-MM-DD` and cannot be later than `today`.
pub fn parse_birth_date(raw: &str, today: NaiveDate) -> Result<NaiveDate, AppError> {
    let date = NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|_| AppError::ValidationError(format!("Invalid birth date: {}", raw)))?;
    if date > today {
        return Err(AppError::ValidationError("Birth date cannot be in the future".to_string()));
    }
    Ok(date)
}

pub fn validate_request<T: Validate>(request: &T) -> Result<(), AppError> {
    request
        .validate()
        .map_err(|e| AppError::ValidationError(describe(&e)))
}
