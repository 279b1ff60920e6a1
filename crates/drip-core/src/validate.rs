//! Field validators for enrollment input.

use crate::ValidationError;

const MAX_EMAIL_LEN: usize = 254;
const NPI_LEN: usize = 10;

/// Upper bound on a revenue gap estimate, in whole dollars.
pub const MAX_ESTIMATED_GAP: u64 = 1_000_000_000_000;

/// A required, non-blank text field, trimmed.
pub fn required(
  field: &'static str,
  value: Option<&str>,
) -> Result<String, ValidationError> {
  match value.map(str::trim) {
    Some(v) if !v.is_empty() => Ok(v.to_owned()),
    _ => Err(ValidationError::new(field, "is required")),
  }
}

/// A syntactically valid email address, returned trimmed and lowercased.
///
/// This is a shape check only: one `@`, a non-empty local part, a dotted
/// domain without empty labels, and no whitespace.
pub fn email(value: Option<&str>) -> Result<String, ValidationError> {
  let address = required("email", value)?.to_lowercase();
  if address.len() > MAX_EMAIL_LEN {
    return Err(ValidationError::new("email", "is too long"));
  }
  if address.chars().any(char::is_whitespace) {
    return Err(ValidationError::new("email", "must not contain whitespace"));
  }

  let Some((local, domain)) = address.split_once('@') else {
    return Err(ValidationError::new("email", "must contain '@'"));
  };
  if local.is_empty() || domain.contains('@') {
    return Err(ValidationError::new("email", "is not a valid address"));
  }
  let labels: Vec<&str> = domain.split('.').collect();
  if labels.len() < 2 || labels.iter().any(|l| l.is_empty()) {
    return Err(ValidationError::new("email", "has an invalid domain"));
  }

  Ok(address)
}

/// Exactly ten ASCII digits.
pub fn npi(value: Option<&str>) -> Result<String, ValidationError> {
  let npi = required("npi", value)?;
  if npi.len() != NPI_LEN || !npi.bytes().all(|b| b.is_ascii_digit()) {
    return Err(ValidationError::new("npi", "must be exactly 10 digits"));
  }
  Ok(npi)
}

/// An optional dollar estimate, rounded to whole dollars. Absent means 0.
pub fn estimated_gap(value: Option<f64>) -> Result<u64, ValidationError> {
  let Some(v) = value else { return Ok(0) };
  if !v.is_finite() || v < 0.0 {
    return Err(ValidationError::new("estimated_gap", "must be a non-negative number"));
  }
  let dollars = v.round();
  if dollars > MAX_ESTIMATED_GAP as f64 {
    return Err(ValidationError::new(
      "estimated_gap",
      format!("must not exceed {MAX_ESTIMATED_GAP}"),
    ));
  }
  Ok(dollars as u64)
}

/// Normalise an address for lookups without validating it.
pub fn normalize_email(value: &str) -> String { value.trim().to_lowercase() }

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn accepts_ordinary_addresses() {
    assert_eq!(email(Some("a.b+tag@mail.example.org")).unwrap(), "a.b+tag@mail.example.org");
    assert_eq!(email(Some(" Office@Clinic.COM")).unwrap(), "office@clinic.com");
  }

  #[test]
  fn rejects_malformed_addresses() {
    for bad in [
      "", "   ", "no-at-sign", "@example.com", "a@b", "a@@b.com", "a@b..com",
      "a b@c.com", "a@.com", "a@com.",
    ] {
      let err = email(Some(bad)).unwrap_err();
      assert_eq!(err.field, "email", "accepted {bad:?}");
    }
    assert_eq!(email(None).unwrap_err().field, "email");
  }

  #[test]
  fn npi_requires_ten_digits() {
    assert_eq!(npi(Some(" 1234567890 ")).unwrap(), "1234567890");
    for bad in ["123456789", "12345678901", "12345abcde", "123456789O"] {
      assert_eq!(npi(Some(bad)).unwrap_err().field, "npi", "accepted {bad:?}");
    }
  }

  #[test]
  fn estimated_gap_rounds_to_whole_dollars() {
    assert_eq!(estimated_gap(None).unwrap(), 0);
    assert_eq!(estimated_gap(Some(312_456.78)).unwrap(), 312_457);
    assert_eq!(estimated_gap(Some(0.4)).unwrap(), 0);
    assert_eq!(
      estimated_gap(Some(MAX_ESTIMATED_GAP as f64)).unwrap(),
      MAX_ESTIMATED_GAP
    );
  }

  #[test]
  fn estimated_gap_rejects_negative_huge_and_non_finite() {
    for bad in [-1.0, f64::NAN, f64::INFINITY, 18_446_744_073_709_551_615.0] {
      let err = estimated_gap(Some(bad)).unwrap_err();
      assert_eq!(err.field, "estimated_gap", "accepted {bad}");
    }
  }

  #[test]
  fn required_trims_and_rejects_blank() {
    assert_eq!(required("name", Some("  Jane ")).unwrap(), "Jane");
    let err = required("name", Some("\t")).unwrap_err();
    assert_eq!(err.to_string(), "invalid name: is required");
  }
}
