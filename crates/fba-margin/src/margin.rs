//! Margin label validation and selection.
//!
//! The calculator renders several percentage labels; the first one that is
//! a plain number followed by `%` is the net profit margin.

use crate::types::Margin;

/// Check whether a label is a usable margin.
///
/// Valid when, after removing `%` and `.`, what remains is a non-empty run
/// of ASCII digits. A sign is not a digit, so `-5.00%` is skipped.
pub fn is_valid_margin(label: &str) -> bool {
    let stripped: String = label.chars().filter(|c| *c != '%' && *c != '.').collect();
    !stripped.is_empty() && stripped.bytes().all(|b| b.is_ascii_digit())
}

/// Turn a label into a [`Margin`], or `None` if it is not a valid margin.
///
/// The text is kept as rendered; `percent` is filled only when the label
/// also reads as a single number.
pub fn parse_margin(label: &str) -> Option<Margin> {
    let text = label.trim();
    if !is_valid_margin(text) {
        return None;
    }
    Some(Margin {
        percent: text.trim_end_matches('%').trim().parse::<f64>().ok(),
        text: text.to_string(),
    })
}

/// Pick the first valid margin from labels in document order.
pub fn first_valid_margin<S: AsRef<str>>(labels: &[S]) -> Option<Margin> {
    labels.iter().find_map(|l| parse_margin(l.as_ref()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_margins() {
        assert!(is_valid_margin("12.34%"));
        assert!(is_valid_margin("0%"));
        assert!(is_valid_margin("100%"));
    }

    #[test]
    fn test_invalid_margins() {
        assert!(!is_valid_margin("%"));
        assert!(!is_valid_margin(""));
        assert!(!is_valid_margin("N/A %"));
        assert!(!is_valid_margin("£1.20 (5%)"));
        assert!(!is_valid_margin("-4.5%"));
        assert!(!is_valid_margin("--5%"));
        assert!(!is_valid_margin("5 %"));
    }

    #[test]
    fn test_parse_margin_values() {
        let m = parse_margin(" 23.07% ").unwrap();
        assert_eq!(m.text, "23.07%");
        assert_eq!(m.percent, Some(23.07));
        assert!(parse_margin("-8%").is_none());
    }

    #[test]
    fn test_odd_but_valid_dots() {
        // Dots are ignored by the check, so the label wins even though it
        // is not a single number.
        let m = first_valid_margin(&["1.2.3%", "18.2%"]).unwrap();
        assert_eq!(m.text, "1.2.3%");
        assert_eq!(m.percent, None);
    }

    #[test]
    fn test_negative_label_skipped() {
        let m = first_valid_margin(&["-5.00%", "12.0%"]).unwrap();
        assert_eq!(m.text, "12.0%");
        assert_eq!(m.percent, Some(12.0));
    }

    #[test]
    fn test_first_valid_skips_noise() {
        let labels = vec!["Fees (15%)", "ROI: --", "18.2%", "31.0%"];
        let m = first_valid_margin(&labels).unwrap();
        assert_eq!(m.text, "18.2%");
    }

    #[test]
    fn test_first_valid_none() {
        let labels: Vec<String> = vec!["n/a%".into(), "%".into()];
        assert!(first_valid_margin(&labels).is_none());
        let empty: Vec<String> = Vec::new();
        assert!(first_valid_margin(&empty).is_none());
    }
}
