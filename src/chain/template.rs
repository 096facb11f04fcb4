use std::sync::LazyLock;

use regex::{Captures, Regex};
use serde_json::Value;
use tracing::debug;

use crate::{SecretStore, chain::Placeholders, common::Vars, runtime::Context};

/// Secret token, format: `{{KEY}}`
static SECRET_TEMPLATE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\{\{(.+?)\}\}").expect("valid secret pattern"));
/// Placeholder token, format: `[[NAME]]`
static PLACEHOLDER_TEMPLATE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\[\[(.+?)\]\]").expect("valid placeholder pattern"));

/// Replaces every `{{KEY}}` with the secret stored under KEY.
/// Missing secrets resolve to the empty string.
pub fn resolve_secrets(
    secrets: &SecretStore,
    template: &str,
) -> String {
    SECRET_TEMPLATE.replace_all(template, |caps: &Captures| secrets.get(&caps[1])).into_owned()
}

/// Replaces every `[[NAME]]` whose NAME is declared in `placeholders` with the
/// value found by walking its path through `results`.
///
/// Tokens that are undeclared or whose path does not resolve are left as-is.
pub fn resolve_placeholders(
    results: &Vars,
    placeholders: &Placeholders,
    template: &str,
) -> String {
    PLACEHOLDER_TEMPLATE
        .replace_all(template, |caps: &Captures| {
            let token = &caps[0];
            let Some(placeholder) = placeholders.get(&caps[1]) else {
                debug!("placeholder {} is not declared", token);
                return token.to_string();
            };

            match results.value(&placeholder.name).and_then(|root| placeholder.lookup(root)) {
                Some(value) => stringify(value),
                None => {
                    debug!("placeholder {} did not resolve", token);
                    token.to_string()
                }
            }
        })
        .into_owned()
}

/// Secrets first, then placeholders against the activation results.
pub fn resolve_template(
    ctx: &Context,
    placeholders: &Placeholders,
    template: &str,
) -> String {
    let resolved = resolve_secrets(ctx.secrets(), template);
    resolve_placeholders(&ctx.read_results(), placeholders, &resolved)
}

fn stringify(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        v => v.to_string(),
    }
}
