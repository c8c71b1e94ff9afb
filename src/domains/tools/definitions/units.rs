//! Fixed-point conversion between base units (lamports, wei, satoshis, ...)
//! and human-readable decimal amounts.
//!
//! All arithmetic is done on integers and strings; amounts never pass through
//! floating point.

/// Largest number of decimals any supported chain uses (wei).
pub const MAX_DECIMALS: u32 = 18;

/// Render `raw` base units as a decimal string with `decimals` places,
/// trimming trailing zeros.
pub fn format_units(raw: u128, decimals: u32) -> String {
    if decimals == 0 {
        return raw.to_string();
    }

    let digits = raw.to_string();
    let width = decimals as usize;
    let padded = format!("{digits:0>w$}", w = width + 1);
    let (whole, fraction) = padded.split_at(padded.len() - width);
    let fraction = fraction.trim_end_matches('0');

    if fraction.is_empty() {
        whole.to_string()
    } else {
        format!("{whole}.{fraction}")
    }
}

/// Parse a decimal amount into base units.
pub fn parse_units(amount: &str, decimals: u32) -> Result<u128, String> {
    let amount = amount.trim();
    let (whole, fraction) = amount.split_once('.').unwrap_or((amount, ""));

    if whole.is_empty() && fraction.is_empty() {
        return Err("amount is empty".to_string());
    }
    if !whole.chars().chain(fraction.chars()).all(|c| c.is_ascii_digit()) {
        return Err(format!("not a non-negative decimal number: {amount}"));
    }
    if fraction.len() > decimals as usize {
        return Err(format!(
            "too many decimal places: {} (max {decimals})",
            fraction.len()
        ));
    }

    let scale = 10u128
        .checked_pow(decimals)
        .ok_or_else(|| format!("unsupported decimals: {decimals}"))?;
    let whole: u128 = if whole.is_empty() {
        0
    } else {
        whole.parse().map_err(|_| format!("amount too large: {amount}"))?
    };
    let fraction: u128 = if fraction.is_empty() {
        0
    } else {
        let padded = format!("{fraction:0<w$}", w = decimals as usize);
        padded.parse().map_err(|_| format!("invalid fraction: {amount}"))?
    };

    whole
        .checked_mul(scale)
        .and_then(|v| v.checked_add(fraction))
        .ok_or_else(|| format!("amount too large: {amount}"))
}

/// Parse a `0x`-prefixed hex quantity as returned by EVM nodes.
pub fn parse_hex_quantity(value: &str) -> Result<u128, String> {
    let digits = value
        .strip_prefix("0x")
        .or_else(|| value.strip_prefix("0X"))
        .ok_or_else(|| format!("missing 0x prefix: {value}"))?;
    if digits.is_empty() {
        return Ok(0);
    }
    u128::from_str_radix(digits, 16).map_err(|e| format!("invalid hex quantity {value}: {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_units() {
        assert_eq!(format_units(1_500_000_000, 9), "1.5");
        assert_eq!(format_units(1, 9), "0.000000001");
        assert_eq!(format_units(0, 8), "0");
        assert_eq!(format_units(2_000_000, 6), "2");
        assert_eq!(format_units(123, 0), "123");
        assert_eq!(format_units(1_000_000_000_000_000_000, 18), "1");
    }

    #[test]
    fn test_parse_units() {
        assert_eq!(parse_units("1.5", 9).unwrap(), 1_500_000_000);
        assert_eq!(parse_units("0.00000001", 8).unwrap(), 1);
        assert_eq!(parse_units("42", 0).unwrap(), 42);
        assert_eq!(parse_units(".5", 1).unwrap(), 5);
        assert_eq!(parse_units("3.", 2).unwrap(), 300);
    }

    #[test]
    fn test_parse_units_rejects_bad_input() {
        assert!(parse_units("", 9).is_err());
        assert!(parse_units("-1", 9).is_err());
        assert!(parse_units("1.2.3", 9).is_err());
        assert!(parse_units("0.123", 2).is_err());
        assert!(parse_units("1e5", 9).is_err());
    }

    #[test]
    fn test_parse_units_overflow() {
        assert!(parse_units("340282366920938463463374607431768211455", 18).is_err());
    }

    #[test]
    fn test_format_parse_agree() {
        let raw = parse_units("12.345", 6).unwrap();
        assert_eq!(format_units(raw, 6), "12.345");
    }

    #[test]
    fn test_parse_hex_quantity() {
        assert_eq!(parse_hex_quantity("0x0").unwrap(), 0);
        assert_eq!(parse_hex_quantity("0x1bc16d674ec80000").unwrap(), 2_000_000_000_000_000_000);
        assert_eq!(parse_hex_quantity("0x").unwrap(), 0);
        assert!(parse_hex_quantity("1bc1").is_err());
        assert!(parse_hex_quantity("0xzz").is_err());
    }
}
