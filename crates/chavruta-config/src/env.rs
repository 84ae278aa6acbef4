//! Small typed readers over `std::env`

use std::str::FromStr;

pub fn string(name: &str, default: &str) -> String {
    std::env::var(name).ok().filter(|v| !v.is_empty()).unwrap_or_else(|| default.to_owned())
}

pub fn opt_string(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}

pub fn flag(name: &str, default: bool) -> bool {
    match std::env::var(name) {
        Ok(v) => matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on"),
        Err(_) => default,
    }
}

/// Comma-separated list, entries trimmed and lowercased, empties dropped
pub fn list(name: &str) -> Vec<String> {
    std::env::var(name)
        .map(|v| {
            v.split(',')
                .map(|s| s.trim().to_ascii_lowercase())
                .filter(|s| !s.is_empty())
                .collect()
        })
        .unwrap_or_default()
}

/// Parse a numeric option, clamping into `[min, max]`
///
/// An unparseable value logs a warning and yields the default.
pub fn clamped<T>(name: &str, default: T, min: T, max: T) -> T
where
    T: FromStr + PartialOrd + Copy + std::fmt::Display,
{
    match std::env::var(name) {
        Ok(raw) => match raw.trim().parse::<T>() {
            Ok(v) if v < min => min,
            Ok(v) if v > max => max,
            Ok(v) => v,
            Err(_) => {
                tracing::warn!(option = name, value = %raw, "unparseable numeric option, using default");
                default
            }
        },
        Err(_) => default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clamps_into_range() {
        temp_env::with_var("CHAVRUTA_TEST_N", Some("99999"), || {
            assert_eq!(clamped("CHAVRUTA_TEST_N", 5_u32, 1, 25), 25);
        });
        temp_env::with_var("CHAVRUTA_TEST_N", Some("0"), || {
            assert_eq!(clamped("CHAVRUTA_TEST_N", 5_u32, 1, 25), 1);
        });
        temp_env::with_var("CHAVRUTA_TEST_N", Some("not-a-number"), || {
            assert_eq!(clamped("CHAVRUTA_TEST_N", 5_u32, 1, 25), 5);
        });
        temp_env::with_var_unset("CHAVRUTA_TEST_N", || {
            assert_eq!(clamped("CHAVRUTA_TEST_N", 5_u32, 1, 25), 5);
        });
    }

    #[test]
    fn parses_lists() {
        temp_env::with_var("CHAVRUTA_TEST_LIST", Some("Example.com, , docs.rs"), || {
            assert_eq!(list("CHAVRUTA_TEST_LIST"), vec!["example.com", "docs.rs"]);
        });
    }

    #[test]
    fn parses_flags() {
        temp_env::with_var("CHAVRUTA_TEST_FLAG", Some("TRUE"), || {
            assert!(flag("CHAVRUTA_TEST_FLAG", false));
        });
        temp_env::with_var("CHAVRUTA_TEST_FLAG", Some("0"), || {
            assert!(!flag("CHAVRUTA_TEST_FLAG", true));
        });
    }
}
