//! Checked numeric conversions for case data.
//!
//! MATPOWER stores identifiers and codes as doubles. These helpers reject
//! values that are not finite, not integral or out of range instead of
//! letting an `as` cast silently wrap or truncate.

use anyhow::{anyhow, Result};

fn integral(value: f64) -> Result<f64> {
    if !value.is_finite() {
        return Err(anyhow!("expected an integer, got non-finite value {value}"));
    }
    if value.fract() != 0.0 {
        return Err(anyhow!("expected an integer, got {value}"));
    }
    Ok(value)
}

/// Convert a bus number or similar identifier.
///
/// ```
/// use gridcap_io::helpers::integral_f64_to_usize;
///
/// assert_eq!(integral_f64_to_usize(42.0).unwrap(), 42);
/// assert!(integral_f64_to_usize(-1.0).is_err());
/// assert!(integral_f64_to_usize(1.5).is_err());
/// ```
pub fn integral_f64_to_usize(value: f64) -> Result<usize> {
    let value = integral(value)?;
    if value < 0.0 {
        return Err(anyhow!("expected a non-negative integer, got {value}"));
    }
    // any f64 above usize::MAX also compares above `usize::MAX as f64`
    if value > usize::MAX as f64 {
        return Err(anyhow!("{value} exceeds maximum usize ({})", usize::MAX));
    }
    Ok(value as usize)
}

/// Convert a type or status code.
pub fn integral_f64_to_i32(value: f64) -> Result<i32> {
    let value = integral(value)?;
    if value < i32::MIN as f64 || value > i32::MAX as f64 {
        return Err(anyhow!("{value} is outside the i32 range"));
    }
    Ok(value as i32)
}
