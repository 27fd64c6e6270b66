/// Formats an amount the way the client shows pesos: no decimals,
/// `.` as thousands separator (`15000` -> `15.000`).
pub fn format_clp(amount: f64) -> String {
    let rounded = amount.round() as i64;
    let digits = rounded.unsigned_abs().to_string();

    let mut out = String::with_capacity(digits.len() + digits.len() / 3 + 1);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push('.');
        }
        out.push(ch);
    }

    if rounded < 0 {
        format!("-{}", out)
    } else {
        out
    }
}

/// Percentage `part / whole * 100` with two decimals, `"0.00"` when `whole` is zero.
pub fn percent_2dp(part: f64, whole: f64) -> String {
    if whole == 0.0 {
        return "0.00".to_string();
    }
    format!("{:.2}", part / whole * 100.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_clp() {
        assert_eq!(format_clp(0.0), "0");
        assert_eq!(format_clp(950.0), "950");
        assert_eq!(format_clp(15000.0), "15.000");
        assert_eq!(format_clp(1234567.0), "1.234.567");
        assert_eq!(format_clp(-5000.0), "-5.000");
    }

    #[test]
    fn test_percent_guards_zero() {
        assert_eq!(percent_2dp(10.0, 0.0), "0.00");
        assert_eq!(percent_2dp(1.0, 3.0), "33.33");
        assert_eq!(percent_2dp(280000.0, 280000.0), "100.00");
    }
}
