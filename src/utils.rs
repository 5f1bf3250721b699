//! Chemical formula normalization used as the group key function.

use indexmap::IndexMap;

use crate::types::GroupKey;

/// Normalize a chemical formula into its alphabetical form.
///
/// Accepts compact (`H2O`, `CH3OH`) and spaced (`O1 H2`) spellings, merges
/// repeated elements, and sorts element symbols alphabetically:
/// `CH3OH` becomes `C1 H4 O1`. Fractional amounts are kept with up to six
/// decimals. Returns `Err` with a reason for malformed input.
pub fn formula_alphabetical(raw: &str) -> Result<GroupKey, String> {
    let amounts = parse_formula(raw)?;
    let mut elements: Vec<(&String, &f64)> = amounts.iter().collect();
    elements.sort_by(|a, b| a.0.cmp(b.0));
    let parts: Vec<String> = elements
        .into_iter()
        .map(|(element, amount)| format!("{element}{}", format_amount(*amount)))
        .collect();
    Ok(parts.join(" "))
}

/// Parse a formula into per-element amounts in first-seen order.
pub fn parse_formula(raw: &str) -> Result<IndexMap<String, f64>, String> {
    let chars: Vec<char> = raw.chars().collect();
    let mut amounts: IndexMap<String, f64> = IndexMap::new();
    let mut idx = 0usize;
    while idx < chars.len() {
        let ch = chars[idx];
        if ch.is_whitespace() {
            idx += 1;
            continue;
        }
        if !ch.is_ascii_uppercase() {
            return Err(format!("unexpected character '{ch}' in formula '{raw}'"));
        }
        let mut symbol = ch.to_string();
        idx += 1;
        while idx < chars.len() && chars[idx].is_ascii_lowercase() {
            symbol.push(chars[idx]);
            idx += 1;
        }
        let start = idx;
        while idx < chars.len() && (chars[idx].is_ascii_digit() || chars[idx] == '.') {
            idx += 1;
        }
        let amount = if start == idx {
            1.0
        } else {
            let digits: String = chars[start..idx].iter().collect();
            digits
                .parse::<f64>()
                .map_err(|_| format!("invalid amount '{digits}' for {symbol} in '{raw}'"))?
        };
        if amount <= 0.0 {
            return Err(format!("non-positive amount for {symbol} in '{raw}'"));
        }
        *amounts.entry(symbol).or_insert(0.0) += amount;
    }
    if amounts.is_empty() {
        return Err("formula is empty".to_string());
    }
    Ok(amounts)
}

fn format_amount(amount: f64) -> String {
    if (amount - amount.round()).abs() < 1e-8 {
        format!("{}", amount.round() as u64)
    } else {
        let text = format!("{amount:.6}");
        text.trim_end_matches('0').trim_end_matches('.').to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compact_and_spaced_spellings_agree() {
        assert_eq!(formula_alphabetical("H2O").unwrap(), "H2 O1");
        assert_eq!(formula_alphabetical("O1 H2").unwrap(), "H2 O1");
        assert_eq!(formula_alphabetical("H2 O1").unwrap(), "H2 O1");
    }

    #[test]
    fn repeated_elements_merge_independent_of_order() {
        assert_eq!(formula_alphabetical("CH3OH").unwrap(), "C1 H4 O1");
        assert_eq!(formula_alphabetical("HOCH3").unwrap(), "C1 H4 O1");
        assert_eq!(formula_alphabetical("Li2CO3").unwrap(), "C1 Li2 O3");
    }

    #[test]
    fn fractional_amounts_are_trimmed() {
        assert_eq!(formula_alphabetical("Li0.5 Fe1").unwrap(), "Fe1 Li0.5");
    }

    #[test]
    fn malformed_formulas_are_rejected() {
        assert!(formula_alphabetical("").is_err());
        assert!(formula_alphabetical("   ").is_err());
        assert!(formula_alphabetical("h2o").is_err());
        assert!(formula_alphabetical("H2-O").is_err());
        assert!(formula_alphabetical("H0").is_err());
        assert!(formula_alphabetical("H1.2.3").is_err());
    }
}
