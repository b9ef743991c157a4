//! Configuration decoding: `${VAR}` substitution and JSON decode, both
//! pluggable so a host application can source declarations from somewhere
//! other than environment variables and a flat namespace of names.

use std::sync::Arc;

use serde_json::{Map, Value};

use crate::error::ConfigError;
use crate::registry;

/// A JSON object, used throughout this crate as the opaque configuration
/// value tree handed to a [`Factory`](crate::Factory)'s `configure`.
pub type ComponentConfig = Map<String, Value>;

/// Resolves a name to its raw configuration text.
///
/// Containers are named entities: `load("demo")` fetches the container
/// declaration (a JSON object mapping component name to factory type name);
/// `load("log")` fetches that one component's own configuration. The loader
/// doesn't need to know which is which — it just hands back whatever text
/// is registered under that name, or `None` if there isn't any.
pub trait ConfigLoader: Send + Sync {
    fn load(&self, name: &str) -> Option<String>;
}

/// Expands `${VAR}`-style placeholders in configuration text before it is
/// parsed as JSON.
pub trait EnvSubstituter: Send + Sync {
    fn substitute(&self, text: &str) -> String;
}

/// The default [`EnvSubstituter`]: resolves placeholders against the
/// process environment, leaving unresolved ones untouched so a missing
/// variable shows up in the log rather than silently vanishing.
#[derive(Copy, Clone, Debug, Default)]
pub struct ProcessEnvSubstituter;

impl EnvSubstituter for ProcessEnvSubstituter {
    fn substitute(&self, text: &str) -> String {
        substitute_env(text)
    }
}

fn substitute_env(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.char_indices().peekable();

    while let Some((i, c)) = chars.next() {
        if c != '$' || chars.peek().map(|&(_, c)| c) != Some('{') {
            out.push(c);
            continue;
        }
        chars.next(); // consume '{'
        let start = i + 2;
        let mut end = None;
        while let Some(&(j, c2)) = chars.peek() {
            if c2 == '}' {
                end = Some(j);
                break;
            }
            chars.next();
        }
        match end {
            Some(end) => {
                chars.next(); // consume '}'
                let var = &text[start..end];
                match std::env::var(var) {
                    Ok(val) => out.push_str(&val),
                    Err(_) => out.push_str(&text[i..=end]),
                }
            }
            None => out.push(c),
        }
    }

    out
}

fn substituter() -> Arc<dyn EnvSubstituter> {
    registry::env_substituter().unwrap_or_else(|| Arc::new(ProcessEnvSubstituter))
}

/// Decode a container declaration: a flat JSON object of component name to
/// factory type name.
///
/// Returned in declaration order, i.e. the order the keys appear in the
/// source text (`serde_json`'s `preserve_order` feature backs `Map` with an
/// index map rather than a `HashMap` for exactly this). Declaration order is
/// the instantiation order `Container::init` drives, and in turn the start
/// order `Container::start` drives (§4.3/§5) — a `HashMap` here would make
/// that ordering nondeterministic.
pub fn decode_declaration(raw: &str) -> Result<Vec<(String, String)>, ConfigError> {
    let substituted = substituter().substitute(raw);
    let value: Value = serde_json::from_str(&substituted)?;
    let obj = value.as_object().ok_or(ConfigError::NotAnObject)?;

    let mut entries = Vec::with_capacity(obj.len());
    for (name, ctype) in obj {
        if let Some(ctype) = ctype.as_str() {
            entries.push((name.clone(), ctype.to_string()));
        }
    }
    Ok(entries)
}

/// Decode a single component's configuration into the opaque value tree
/// passed to [`Factory::configure`](crate::Factory::configure).
pub fn decode_component_config(raw: &str) -> Result<ComponentConfig, ConfigError> {
    let substituted = substituter().substitute(raw);
    let value: Value = serde_json::from_str(&substituted)?;
    value.as_object().cloned().ok_or(ConfigError::NotAnObject)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn substitutes_known_environment_variables() {
        std::env::set_var("NUCLEUS_TEST_CONFIG_VAR", "substituted");
        let out = substitute_env("prefix-${NUCLEUS_TEST_CONFIG_VAR}-suffix");
        assert_eq!(out, "prefix-substituted-suffix");
        std::env::remove_var("NUCLEUS_TEST_CONFIG_VAR");
    }

    #[test]
    fn leaves_unresolved_placeholders_untouched() {
        let out = substitute_env("${NUCLEUS_TEST_CONFIG_VAR_DOES_NOT_EXIST}");
        assert_eq!(out, "${NUCLEUS_TEST_CONFIG_VAR_DOES_NOT_EXIST}");
    }

    #[test]
    fn decode_declaration_rejects_non_object_json() {
        let err = decode_declaration("[1, 2, 3]").unwrap_err();
        assert!(matches!(err, ConfigError::NotAnObject));
    }

    #[test]
    fn decode_declaration_keeps_only_string_values() {
        let entries = decode_declaration(r#"{"log": "Logger", "count": 3}"#).unwrap();
        assert_eq!(entries.iter().find(|(n, _)| n == "log").map(|(_, t)| t.as_str()), Some("Logger"));
        assert!(entries.iter().all(|(n, _)| n != "count"));
    }

    #[test]
    fn decode_declaration_preserves_source_order() {
        let entries = decode_declaration(r#"{"sched": "Nucleus::Scheduler", "log": "Logger"}"#).unwrap();
        let names: Vec<&str> = entries.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, vec!["sched", "log"]);
    }
}
