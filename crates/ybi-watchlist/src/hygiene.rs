//! Universe hygiene: exclude non-common-stock tickers by suffix pattern,
//! falling back to reference data for ambiguous suffixes.

/// Suffixes that are never a common stock, regardless of reference data:
/// warrants (`.WS`, `.W`), units (`.U`), rights (`.R`), and any ticker
/// containing a preferred-share caret.
pub fn is_unambiguous_excluded(ticker: &str) -> bool {
    ticker.contains('^')
        || ticker.ends_with(".WS")
        || ticker.ends_with(".W")
        || ticker.ends_with(".U")
        || ticker.ends_with(".R")
}

/// Trailing `W` or `P` on a longer ticker is ambiguous: it can mean warrant
/// or preferred, but also collides with legitimate common-stock tickers
/// (e.g. a cloud-database ticker ending in `P`). Only a heuristic pass --
/// callers should prefer reference data when it is available.
pub fn is_ambiguous_pattern(ticker: &str) -> bool {
    let bare = ticker.trim_end_matches(|c: char| c.is_ascii_digit());
    bare.len() > 4 && (bare.ends_with('W') || bare.ends_with('P'))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unambiguous_suffixes_are_excluded() {
        assert!(is_unambiguous_excluded("ABC.WS"));
        assert!(is_unambiguous_excluded("ABC.W"));
        assert!(is_unambiguous_excluded("ABC.U"));
        assert!(is_unambiguous_excluded("ABC.R"));
        assert!(is_unambiguous_excluded("AB^C"));
        assert!(!is_unambiguous_excluded("MDB"));
    }

    #[test]
    fn ambiguous_pattern_flags_long_trailing_w_or_p() {
        assert!(is_ambiguous_pattern("ACMEW"));
        assert!(is_ambiguous_pattern("ACMEP"));
        assert!(!is_ambiguous_pattern("MDB"));
        assert!(!is_ambiguous_pattern("AAP"));
    }
}
