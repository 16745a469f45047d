//! Config utils.

use std::collections::HashMap;

/// Parses config value string, which consists of two parts - name and options.
/// Example: SomeAlgorithm[threshold=0.8] parts are name SomeAlgorithm
/// and options string "threshold=0.8".
pub fn parse_config_value(config_str: &str) -> (String, Option<String>) {
    match config_str.split_once('[') {
        Some((l, r)) => (l.to_string(), Some(r.to_string().replace(']', ""))),
        None => (config_str.to_string(), None),
    }
}

/// Parses options string from config value, returns map with option names and values.
///
/// # Examples
///
/// ```rust
/// use vm_placement::config::parse_options;
///
/// let options = parse_options("option1=0.8,option2=something");
/// assert_eq!(options.get("option1").unwrap(), "0.8");
/// assert_eq!(options.get("option2").unwrap(), "something");
/// assert_eq!(options.get("option3"), None);
/// ```
pub fn parse_options(options_str: &str) -> HashMap<String, String> {
    let mut options = HashMap::new();
    for option_str in options_str.split(',') {
        if let Some((name, value)) = option_str.split_once('=') {
            options.insert(name.to_string(), value.to_string());
        }
    }
    options
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_value_splits_into_name_and_options() {
        assert_eq!(
            parse_config_value("SomeAlgorithm[threshold=0.8]"),
            ("SomeAlgorithm".to_string(), Some("threshold=0.8".to_string()))
        );
        assert_eq!(parse_config_value("FirstFit"), ("FirstFit".to_string(), None));
    }

    #[test]
    fn options_string_parses_into_map() {
        let options = parse_options("option1=0.8,option2=something");
        assert_eq!(options.get("option1").unwrap(), "0.8");
        assert_eq!(options.get("option2").unwrap(), "something");
        assert_eq!(options.get("option3"), None);
        assert!(parse_options("").is_empty());
    }
}
