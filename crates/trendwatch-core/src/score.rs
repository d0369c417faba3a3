//! Popularity text normalization

/// Turn popularity text such as `"45.1K posts"` into a number.
///
/// Only the first whitespace-separated token counts. Thousands separators are
/// dropped, and a trailing `k`/`m` (any case) scales by 1e3/1e6. Anything that
/// does not parse, and any negative or non-finite result, yields `0.0`.
pub fn parse_score(text: &str) -> f64 {
    let Some(token) = text.split_whitespace().next() else {
        return 0.0;
    };

    let token = token.replace(',', "").to_lowercase();
    let (number, multiplier) = if let Some(n) = token.strip_suffix('k') {
        (n, 1_000.0)
    } else if let Some(n) = token.strip_suffix('m') {
        (n, 1_000_000.0)
    } else {
        (token.as_str(), 1.0)
    };

    match number.parse::<f64>() {
        Ok(value) => {
            let score = value * multiplier;
            if score.is_finite() && score > 0.0 { score } else { 0.0 }
        }
        Err(_) => 0.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_and_separated() {
        assert_eq!(parse_score("1,234 posts"), 1234.0);
        assert_eq!(parse_score("987"), 987.0);
    }

    #[test]
    fn test_suffixes() {
        assert_eq!(parse_score("45.1K posts"), 45100.0);
        assert_eq!(parse_score("2k"), 2000.0);
        assert_eq!(parse_score("1.5M posts"), 1_500_000.0);
        assert_eq!(parse_score("3m"), 3_000_000.0);
    }

    #[test]
    fn test_garbage_is_zero() {
        assert_eq!(parse_score(""), 0.0);
        assert_eq!(parse_score("   "), 0.0);
        assert_eq!(parse_score("garbage"), 0.0);
        assert_eq!(parse_score("K posts"), 0.0);
        assert_eq!(parse_score("Trending in Tech"), 0.0);
    }

    #[test]
    fn test_never_negative_or_infinite() {
        assert_eq!(parse_score("-5K posts"), 0.0);
        assert_eq!(parse_score("inf"), 0.0);
        assert_eq!(parse_score("NaN"), 0.0);
        assert_eq!(parse_score("1e308m"), 0.0);
        assert!(parse_score("-0K posts").is_sign_positive());
        assert!(parse_score("-0").is_sign_positive());
    }

    #[test]
    fn test_only_first_token() {
        assert_eq!(parse_score("12 K"), 12.0);
    }
}
