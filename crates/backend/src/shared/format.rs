/// Formats an integer with dot thousands separators
pub fn format_number(n: usize) -> String {
    let s = n.to_string();
    let mut result = String::new();
    for (i, ch) in s.chars().rev().enumerate() {
        if i > 0 && i % 3 == 0 {
            result.push('.');
        }
        result.push(ch);
    }
    result.chars().rev().collect()
}

/// Formats a 0..=1 share as a percentage with one decimal, e.g. `0.254` -> `25.4%`
pub fn format_pct(share: f64) -> String {
    format!("{:.1}%", share * 100.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_number() {
        assert_eq!(format_number(0), "0");
        assert_eq!(format_number(999), "999");
        assert_eq!(format_number(1000), "1.000");
        assert_eq!(format_number(1234567), "1.234.567");
    }

    #[test]
    fn test_format_pct() {
        assert_eq!(format_pct(0.0), "0.0%");
        assert_eq!(format_pct(0.2), "20.0%");
        assert_eq!(format_pct(0.5), "50.0%");
        assert_eq!(format_pct(1.0), "100.0%");
    }
}
