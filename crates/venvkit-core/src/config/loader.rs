//! Environment variable lookup with alias fallback chains.
//!
//! Keeps the `or_else` chains in one place so callers never touch
//! `std::env::var` directly.

use std::env;

/// Read `primary` or the first set alias; empty values fall back to `default`.
pub fn env_or<F>(primary: &str, aliases: &[&str], default: F) -> String
where
    F: FnOnce() -> String,
{
    env::var(primary)
        .ok()
        .or_else(|| aliases.iter().find_map(|a| env::var(a).ok()))
        .filter(|s| !s.is_empty())
        .unwrap_or_else(default)
}

/// Read `primary` or an alias as an `Option` (blank counts as unset).
pub fn env_optional(primary: &str, aliases: &[&str]) -> Option<String> {
    env::var(primary)
        .ok()
        .or_else(|| aliases.iter().find_map(|a| env::var(a).ok()))
        .and_then(|s| {
            let s = s.trim().to_string();
            if s.is_empty() {
                None
            } else {
                Some(s)
            }
        })
}

/// Parse a boolean variable: 0/false/no/off are false, anything else is true.
pub fn env_bool(primary: &str, aliases: &[&str], default: bool) -> bool {
    let v = env::var(primary)
        .ok()
        .or_else(|| aliases.iter().find_map(|a| env::var(a).ok()));
    match v.as_deref() {
        Some(s) => !matches!(
            s.trim().to_lowercase().as_str(),
            "0" | "false" | "no" | "off"
        ),
        None => default,
    }
}

/// Parse a numeric variable, falling back to `default` when unset or invalid.
pub fn env_u64(primary: &str, aliases: &[&str], default: u64) -> u64 {
    env_optional(primary, aliases)
        .and_then(|s| s.parse::<u64>().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    // Each test owns a distinct key so they can run in parallel.
    #[allow(unsafe_code)]
    fn set(key: &str, value: &str) {
        unsafe { env::set_var(key, value) };
    }

    #[test]
    fn test_env_or_uses_alias_then_default() {
        set("VENVKIT_TEST_ALIAS_B", "from-alias");
        assert_eq!(
            env_or("VENVKIT_TEST_ALIAS_A", &["VENVKIT_TEST_ALIAS_B"], || "d".into()),
            "from-alias"
        );
        assert_eq!(env_or("VENVKIT_TEST_UNSET_X", &[], || "d".into()), "d");
    }

    #[test]
    fn test_env_optional_blank_is_none() {
        set("VENVKIT_TEST_BLANK", "   ");
        assert_eq!(env_optional("VENVKIT_TEST_BLANK", &[]), None);
    }

    #[test]
    fn test_env_bool_parsing() {
        set("VENVKIT_TEST_BOOL_OFF", "off");
        set("VENVKIT_TEST_BOOL_ON", "yes");
        assert!(!env_bool("VENVKIT_TEST_BOOL_OFF", &[], true));
        assert!(env_bool("VENVKIT_TEST_BOOL_ON", &[], false));
        assert!(env_bool("VENVKIT_TEST_BOOL_UNSET", &[], true));
    }

    #[test]
    fn test_env_u64_invalid_falls_back() {
        set("VENVKIT_TEST_NUM", "abc");
        assert_eq!(env_u64("VENVKIT_TEST_NUM", &[], 7), 7);
        set("VENVKIT_TEST_NUM_OK", "42");
        assert_eq!(env_u64("VENVKIT_TEST_NUM_OK", &[], 7), 42);
    }
}
