use std::sync::OnceLock;

use regex::Regex;

/// Expand `{{ env.VAR }}` placeholders in a raw TOML string
///
/// An optional fallback is supported via
/// `{{ env.VAR | default("fallback") }}`; when the variable is unset the
/// fallback is substituted instead of failing. Expansion runs before
/// deserialization, so config structs stay plain `String`/`SecretString`.
/// TOML comment lines pass through untouched.
pub fn expand_env(input: &str) -> Result<String, String> {
    fn placeholder() -> &'static Regex {
        static RE: OnceLock<Regex> = OnceLock::new();
        // Group 1: dotted key (`env.VAR_NAME`); group 2: optional fallback
        RE.get_or_init(|| {
            Regex::new(r#"\{\{\s*([a-zA-Z0-9_.]+)\s*(?:\|\s*default\("([^"]*)"\))?\s*\}\}"#)
                .expect("must be valid regex")
        })
    }

    let mut output = String::with_capacity(input.len());

    for (i, line) in input.lines().enumerate() {
        if i > 0 {
            output.push('\n');
        }

        if line.trim_start().starts_with('#') {
            output.push_str(line);
            continue;
        }

        let mut expanded = String::with_capacity(line.len());
        let mut cursor = 0;

        for captures in placeholder().captures_iter(line) {
            let whole = captures.get(0).expect("capture 0 always present");
            let key = captures.get(1).expect("key group always present").as_str();
            let fallback = captures.get(2).map(|m| m.as_str());

            expanded.push_str(&line[cursor..whole.start()]);

            let Some(("env", var_name)) = key.split_once('.') else {
                return Err(format!("only variables scoped with 'env.' are supported: `{key}`"));
            };
            if var_name.contains('.') {
                return Err(format!("only variables scoped with 'env.' are supported: `{key}`"));
            }

            match std::env::var(var_name) {
                Ok(value) => expanded.push_str(&value),
                Err(_) => match fallback {
                    Some(default) => expanded.push_str(default),
                    None => return Err(format!("environment variable not found: `{var_name}`")),
                },
            }

            cursor = whole.end();
        }

        expanded.push_str(&line[cursor..]);
        output.push_str(&expanded);
    }

    if input.ends_with('\n') {
        output.push('\n');
    }

    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_input_unchanged() {
        let input = "listen_address = \"0.0.0.0:5000\"";
        assert_eq!(expand_env(input).unwrap(), input);
    }

    #[test]
    fn expands_set_variable() {
        temp_env::with_var("RELAY_TEST_KEY", Some("sk-abc"), || {
            let result = expand_env("api_key = \"{{ env.RELAY_TEST_KEY }}\"").unwrap();
            assert_eq!(result, "api_key = \"sk-abc\"");
        });
    }

    #[test]
    fn missing_variable_errors() {
        temp_env::with_var_unset("RELAY_MISSING", || {
            let err = expand_env("api_key = \"{{ env.RELAY_MISSING }}\"").unwrap_err();
            assert!(err.contains("RELAY_MISSING"));
        });
    }

    #[test]
    fn fallback_used_when_unset() {
        temp_env::with_var_unset("RELAY_OPTIONAL", || {
            let result = expand_env("api_key = \"{{ env.RELAY_OPTIONAL | default(\"\") }}\"").unwrap();
            assert_eq!(result, "api_key = \"\"");
        });
    }

    #[test]
    fn fallback_ignored_when_set() {
        temp_env::with_var("RELAY_OPTIONAL", Some("real"), || {
            let result =
                expand_env("api_key = \"{{ env.RELAY_OPTIONAL | default(\"other\") }}\"").unwrap();
            assert_eq!(result, "api_key = \"real\"");
        });
    }

    #[test]
    fn comment_lines_skip_expansion() {
        temp_env::with_var_unset("RELAY_MISSING", || {
            let input = "  # api_key = \"{{ env.RELAY_MISSING }}\"";
            assert_eq!(expand_env(input).unwrap(), input);
        });
    }

    #[test]
    fn unscoped_key_rejected() {
        let err = expand_env("key = \"{{ secrets.FOO }}\"").unwrap_err();
        assert!(err.contains("env."));
    }
}
