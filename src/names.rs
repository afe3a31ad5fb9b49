//! Display-name resolution for localized name templates.
//!
//! Names in a save are either plain strings or `{ key, variables }` templates.
//! Empire and planet names share one algorithm and differ only in
//! [`NameDomain`] parameters.

use serde_json::Value;

/// Returned for absent or unrecognized names.
pub const UNKNOWN_NAME: &str = "Unknown";

/// Resolution parameters for one kind of name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NameDomain {
    Empire,
    Planet,
}

impl NameDomain {
    /// Template key whose variables are joined to form the name.
    fn template_marker(self) -> &'static str {
        match self {
            NameDomain::Empire => "%ADJECTIVE%",
            NameDomain::Planet => "PLANET_NAME_FORMAT",
        }
    }

    /// Localization prefixes, first match wins.
    fn prefixes(self) -> &'static [&'static str] {
        match self {
            NameDomain::Empire => &["EMPIRE_DESIGN_", "NAME_", "SPEC_"],
            NameDomain::Planet => &["MAM1_PLANET_", "MAM2_PLANET_", "NEW_COLONY_NAME_", "NAME_"],
        }
    }

    /// Planet variables without a `value` fall back to their own string key.
    fn variable_key_fallback(self) -> bool {
        matches!(self, NameDomain::Planet)
    }
}

/// Resolve an empire name.
pub fn empire_name(name: Option<&Value>) -> String {
    resolve_name(NameDomain::Empire, name)
}

/// Resolve a planet name.
pub fn planet_name(name: Option<&Value>) -> String {
    resolve_name(NameDomain::Planet, name)
}

pub fn resolve_name(domain: NameDomain, name: Option<&Value>) -> String {
    match name {
        Some(Value::String(text)) if !text.is_empty() => text.clone(),
        Some(Value::Object(fields)) => match fields.get("key") {
            Some(Value::String(key)) => resolve_template(domain, key, fields.get("variables")),
            _ => UNKNOWN_NAME.to_string(),
        },
        _ => UNKNOWN_NAME.to_string(),
    }
}

fn resolve_template(domain: NameDomain, key: &str, variables: Option<&Value>) -> String {
    let mut name = key.to_string();

    if key == domain.template_marker() {
        if let Some(variables) = variables {
            name = variable_list(variables)
                .filter_map(|variable| variable_text(domain, variable))
                .filter(|part| !part.is_empty())
                .collect::<Vec<_>>()
                .join(" ");
        }
    }

    let stripped = domain
        .prefixes()
        .iter()
        .find_map(|prefix| name.strip_prefix(prefix))
        .unwrap_or(name.as_str());
    stripped.replace('_', " ")
}

/// Variables are a list, but a lone variable may appear unwrapped.
fn variable_list(variables: &Value) -> Box<dyn Iterator<Item = &Value> + '_> {
    match variables {
        Value::Array(items) => Box::new(items.iter()),
        Value::Object(fields) if fields.is_empty() => Box::new(std::iter::empty()),
        Value::Object(_) => Box::new(std::iter::once(variables)),
        _ => Box::new(std::iter::empty()),
    }
}

fn variable_text(domain: NameDomain, variable: &Value) -> Option<String> {
    let nested = variable
        .get("value")
        .and_then(|value| value.get("key"))
        .and_then(Value::as_str);
    if let Some(key) = nested {
        return Some(key.to_string());
    }
    if domain.variable_key_fallback() {
        return variable.get("key").and_then(Value::as_str).map(str::to_string);
    }
    None
}
