//! Username and password validation rules
//!
//! Rules are compiled once at startup from [`UserRulesConfig`] into an
//! immutable [`ValidationRules`] value that handlers borrow; nothing here is
//! mutated after construction.

use regex_lite::Regex;

use super::{ConfigError, UserRulesConfig};

/// Built-in username pattern, matched against the full input
const DEFAULT_USERNAME_PATTERN: &str = "[a-z_][a-z0-9_-]*";

const DEFAULT_USERNAME_MIN_LEN: i32 = 1;
const DEFAULT_USERNAME_MAX_LEN: i32 = 24;
const DEFAULT_PASSWORD_MIN_LEN: i32 = 8;
const DEFAULT_PASSWORD_MAX_LEN: i32 = 64;

/// Validation rule for one input field
#[derive(Debug, Clone)]
struct FieldRule {
    pattern: Option<Regex>,
    min_len: i32,
    max_len: i32,
}

impl FieldRule {
    /// Check the input against the length bounds and the pattern.
    ///
    /// Empty input is always rejected. A negative bound disables that
    /// check. The pattern must match the entire input, not a substring.
    fn accepts(&self, input: &str) -> bool {
        if input.is_empty() {
            return false;
        }

        if self.min_len > 0 && (input.len() as i32) < self.min_len {
            return false;
        }

        if self.max_len > 0 && (input.len() as i32) > self.max_len {
            return false;
        }

        if let Some(pattern) = &self.pattern {
            let full_match = pattern
                .find(input)
                .is_some_and(|m| m.start() == 0 && m.end() == input.len());
            if !full_match {
                return false;
            }
        }

        true
    }
}

/// Immutable validation rules for user creation and password changes
#[derive(Debug, Clone)]
pub struct ValidationRules {
    username: FieldRule,
    password: FieldRule,
}

impl ValidationRules {
    /// Compile the rules from configuration.
    ///
    /// Zero-valued lengths and empty regexes fall back to the built-in
    /// defaults. Returns an error for an uncompilable pattern or inverted
    /// length bounds.
    pub fn from_config(cfg: &UserRulesConfig) -> Result<Self, ConfigError> {
        let username_pattern = if cfg.username_regex.is_empty() {
            DEFAULT_USERNAME_PATTERN
        } else {
            cfg.username_regex.as_str()
        };
        let username = FieldRule {
            pattern: Some(compile(username_pattern)?),
            min_len: pick(cfg.username_min_len, DEFAULT_USERNAME_MIN_LEN),
            max_len: pick(cfg.username_max_len, DEFAULT_USERNAME_MAX_LEN),
        };

        let password = FieldRule {
            pattern: if cfg.password_regex.is_empty() {
                None
            } else {
                Some(compile(&cfg.password_regex)?)
            },
            min_len: pick(cfg.password_min_len, DEFAULT_PASSWORD_MIN_LEN),
            max_len: pick(cfg.password_max_len, DEFAULT_PASSWORD_MAX_LEN),
        };

        for rule in [&username, &password] {
            if rule.min_len > 0 && rule.max_len > 0 && rule.min_len > rule.max_len {
                return Err(ConfigError::InvalidValue(
                    "minimum length exceeds maximum length".to_string(),
                ));
            }
        }

        Ok(Self { username, password })
    }

    /// Rules compiled entirely from defaults
    pub fn defaults() -> Self {
        Self::from_config(&UserRulesConfig::default()).expect("default rules compile")
    }

    pub fn valid_username(&self, input: &str) -> bool {
        self.username.accepts(input)
    }

    pub fn valid_password(&self, input: &str) -> bool {
        self.password.accepts(input)
    }
}

fn compile(pattern: &str) -> Result<Regex, ConfigError> {
    Regex::new(pattern).map_err(|e| ConfigError::InvalidValue(format!("bad pattern: {}", e)))
}

fn pick(configured: i32, default: i32) -> i32 {
    if configured == 0 {
        default
    } else {
        configured
    }
}
