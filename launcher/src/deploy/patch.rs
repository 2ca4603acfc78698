//! Session identifier patching of the bot's configuration files
//!
//! The config file is JavaScript, so it is patched with anchored patterns rather
//! than parsed. Both patches are idempotent: applying them twice with the same
//! value yields the same text.

use std::sync::LazyLock;

use regex::{Captures, Regex};

/// Name of the field holding the session identifier
pub const SESSION_FIELD: &str = "SESSION_ID";

static CONFIG_FIELD: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"(\bSESSION_ID\s*[:=]\s*(?:process\.env\.SESSION_ID\s*\|\|\s*)?)("(?:[^"\\\r\n]|\\.)*"|'(?:[^'\\\r\n]|\\.)*'|`(?:[^`\\]|\\.)*`)"#,
    )
    .expect("valid config pattern")
});

static MODULE_EXPORTS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"module\.exports\s*=\s*\{").expect("valid exports pattern"));

static ENV_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^[ \t]*(?:export[ \t]+)?SESSION_ID[ \t]*=[^\r\n]*").expect("valid env pattern")
});

/// Config file written when the fork has none
pub fn default_config(session_id: &str) -> String {
    format!(
        "module.exports = {{\n  {}: process.env.{} || \"{}\",\n}};\n",
        SESSION_FIELD,
        SESSION_FIELD,
        escape_js(session_id, '"')
    )
}

/// Env file written when the fork has none
pub fn default_env(session_id: &str) -> String {
    format!("{}\n", env_line(session_id))
}

/// Set the session identifier in a JavaScript config file
pub fn patch_config(existing: Option<&str>, session_id: &str) -> String {
    let Some(contents) = existing else {
        return default_config(session_id);
    };

    if CONFIG_FIELD.is_match(contents) {
        return CONFIG_FIELD
            .replace_all(contents, |caps: &Captures| {
                // A literal closes with the quote it opened with
                let quote = caps[2].chars().next().unwrap_or('"');
                format!(
                    "{}{}{}{}",
                    &caps[1],
                    quote,
                    escape_js(session_id, quote),
                    quote
                )
            })
            .into_owned();
    }

    let field = format!(
        "\n  {}: process.env.{} || \"{}\",",
        SESSION_FIELD,
        SESSION_FIELD,
        escape_js(session_id, '"')
    );
    if let Some(m) = MODULE_EXPORTS.find(contents) {
        let mut patched = String::with_capacity(contents.len() + field.len());
        patched.push_str(&contents[..m.end()]);
        patched.push_str(&field);
        patched.push_str(&contents[m.end()..]);
        return patched;
    }

    format!(
        "process.env.{} = process.env.{} || \"{}\";\n{}",
        SESSION_FIELD,
        SESSION_FIELD,
        escape_js(session_id, '"'),
        contents
    )
}

/// Set `SESSION_ID=` in a dotenv file, appending the line when missing
pub fn patch_env(existing: Option<&str>, session_id: &str) -> String {
    let Some(contents) = existing else {
        return default_env(session_id);
    };

    let line = env_line(session_id);
    if ENV_LINE.is_match(contents) {
        return ENV_LINE
            .replace_all(contents, |_: &Captures| line.clone())
            .into_owned();
    }

    let mut patched = contents.to_string();
    if !patched.is_empty() && !patched.ends_with('\n') {
        patched.push('\n');
    }
    patched.push_str(&line);
    patched.push('\n');
    patched
}

fn env_line(session_id: &str) -> String {
    let needs_quotes = session_id
        .chars()
        .any(|c| c.is_whitespace() || matches!(c, '#' | '"' | '\'' | '\\' | '$'));
    if needs_quotes {
        let escaped = session_id.replace('\\', "\\\\").replace('"', "\\\"");
        format!("{}=\"{}\"", SESSION_FIELD, escaped)
    } else {
        format!("{}={}", SESSION_FIELD, session_id)
    }
}

fn escape_js(value: &str, quote: char) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '\\' => escaped.push_str("\\\\"),
            '\n' => escaped.push_str("\\n"),
            '\r' => escaped.push_str("\\r"),
            '$' if quote == '`' => escaped.push_str("\\$"),
            c if c == quote => {
                escaped.push('\\');
                escaped.push(c);
            }
            c => escaped.push(c),
        }
    }
    escaped
}
