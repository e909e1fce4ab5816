use anyhow::{Context, Result};

pub fn split_csv(s: &str) -> Vec<String> {
    s.split(',')
        .map(|x| x.trim().to_string())
        .filter(|x| !x.is_empty())
        .collect()
}

/// Parse seed tokens as decimal or `0x` hex.
pub fn parse_seeds(tokens: &[String]) -> Result<Vec<u64>> {
    tokens
        .iter()
        .map(|token| {
            let parsed = token.strip_prefix("0x").map_or_else(
                || token.parse::<u64>(),
                |hex| u64::from_str_radix(hex, 16),
            );
            parsed.with_context(|| format!("invalid seed '{token}'"))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_csv_trims_and_filters() {
        let parts = split_csv(" alpha, ,beta,  gamma ");
        assert_eq!(parts, vec!["alpha", "beta", "gamma"]);
    }

    #[test]
    fn seeds_accept_decimal_and_hex() {
        let seeds = parse_seeds(&split_csv("1337, 0x1841")).unwrap();
        assert_eq!(seeds, vec![1337, 0x1841]);
    }

    #[test]
    fn bad_seed_names_the_token() {
        let err = parse_seeds(&split_csv("12,abc")).unwrap_err();
        assert!(err.to_string().contains("abc"));
    }
}
