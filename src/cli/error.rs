// Error handling utilities for consistent error messages and exit codes

use std::collections::BTreeSet;
use std::process;

/// Exit with a user error (exit code 1)
/// User errors are for invalid input, missing resources, etc.
pub fn user_error(message: &str) -> ! {
    eprintln!("Error: {}", message);
    process::exit(1);
}

/// Exit with an internal error (exit code >1)
/// Internal errors are for unexpected system failures, database corruption, etc.
pub fn internal_error(message: &str) -> ! {
    eprintln!("Internal error: {}", message);
    process::exit(2);
}

/// Validate that a string is not empty
pub fn validate_non_empty(value: &str, field_name: &str) -> Result<(), String> {
    if value.trim().is_empty() {
        Err(format!("{} cannot be empty", field_name))
    } else {
        Ok(())
    }
}

/// Validate a record ID (positive integer)
pub fn validate_id(id_str: &str, what: &str) -> Result<i64, String> {
    id_str.parse::<i64>()
        .map_err(|_| format!("Invalid {} ID: '{}'. {} ID must be a number.", what, id_str, capitalize(what)))
        .and_then(|id| {
            if id > 0 {
                Ok(id)
            } else {
                Err(format!("Invalid {} ID: {}. {} ID must be positive.", what, id, capitalize(what)))
            }
        })
}

/// Parse a comma-separated ID list ("3,5,8"); empty input is an empty set
pub fn parse_id_list(list: &str, what: &str) -> Result<BTreeSet<i64>, String> {
    list.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| validate_id(s, what))
        .collect()
}

/// Parse an "id:qty" order line spec; qty defaults to 1
pub fn parse_line_spec(spec: &str) -> Result<(i64, f64), String> {
    let (product, qty) = match spec.split_once(':') {
        Some((product, qty)) => (product, Some(qty)),
        None => (spec, None),
    };
    let product_id = validate_id(product, "product")?;
    let quantity = match qty {
        Some(q) => q.parse::<f64>()
            .ok()
            .filter(|q| q.is_finite() && *q > 0.0)
            .ok_or_else(|| format!("Invalid quantity in '{}'. Use <product>:<qty>.", spec))?,
        None => 1.0,
    };
    Ok((product_id, quantity))
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_non_empty() {
        assert!(validate_non_empty("test", "field").is_ok());
        assert!(validate_non_empty("", "field").is_err());
        assert!(validate_non_empty("   ", "field").is_err());
    }

    #[test]
    fn test_validate_id() {
        assert_eq!(validate_id("1", "order"), Ok(1));
        assert_eq!(validate_id("42", "order"), Ok(42));
        assert!(validate_id("0", "order").is_err());
        assert!(validate_id("-1", "order").is_err());
        let err = validate_id("abc", "line").unwrap_err();
        assert_eq!(err, "Invalid line ID: 'abc'. Line ID must be a number.");
    }

    #[test]
    fn test_parse_id_list() {
        assert_eq!(parse_id_list("3, 5,3", "category"), Ok(BTreeSet::from([3, 5])));
        assert_eq!(parse_id_list("", "category"), Ok(BTreeSet::new()));
        assert!(parse_id_list("3,x", "category").is_err());
    }

    #[test]
    fn test_parse_line_spec() {
        assert_eq!(parse_line_spec("4"), Ok((4, 1.0)));
        assert_eq!(parse_line_spec("4:2.5"), Ok((4, 2.5)));
        assert!(parse_line_spec("4:0").is_err());
        assert!(parse_line_spec("soup:1").is_err());
    }
}
