// SPDX-License-Identifier: Apache-2.0

use chrono::NaiveDate;

/// Parse a compact `YYYYMMDD` date
pub(crate) fn parse_date(s: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(s.trim(), "%Y%m%d")
        .map_err(|e| format!("invalid date `{}`, expected YYYYMMDD: {}", s, e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_date() {
        assert_eq!(
            parse_date("20240315").unwrap(),
            NaiveDate::from_ymd_opt(2024, 3, 15).unwrap()
        );
        assert!(parse_date("2024-03-15").is_err());
        assert!(parse_date("20241332").is_err());
    }
}
