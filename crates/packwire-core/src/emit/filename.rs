//! Output name templates.
//!
//! Supported placeholders, each optionally length-limited (`[chunkhash:8]`):
//!
//! | placeholder     | value                                   |
//! |-----------------|-----------------------------------------|
//! | `[name]`        | chunk name                              |
//! | `[id]`          | chunk id                                |
//! | `[hash]`        | compilation hash                        |
//! | `[chunkhash]`   | hash of the chunk's JS and CSS          |
//! | `[contenthash]` | hash of the emitted file's own content  |
//!
//! Unknown placeholders are left untouched.

/// Hash length when a placeholder has no explicit `:N`.
pub const DEFAULT_HASH_LENGTH: usize = 20;

/// Values substituted into a name template.
#[derive(Debug, Clone, Copy)]
pub struct NameContext<'a> {
    pub name: &'a str,
    pub id: u32,
    pub hash: &'a str,
    pub chunk_hash: &'a str,
    pub content_hash: &'a str,
}

fn truncated(value: &str, len: Option<usize>) -> &str {
    let len = len.unwrap_or(DEFAULT_HASH_LENGTH).min(value.len());
    &value[..len]
}

fn substitute(token: &str, ctx: &NameContext<'_>) -> Option<String> {
    let (key, len) = match token.split_once(':') {
        Some((key, len)) => (key, Some(len.parse::<usize>().ok()?)),
        None => (token, None),
    };

    match key {
        "name" => Some(ctx.name.to_string()),
        "id" => Some(ctx.id.to_string()),
        "hash" => Some(truncated(ctx.hash, len).to_string()),
        "chunkhash" => Some(truncated(ctx.chunk_hash, len).to_string()),
        "contenthash" => Some(truncated(ctx.content_hash, len).to_string()),
        _ => None,
    }
}

/// Render `template` with `ctx`.
#[must_use]
pub fn render_name(template: &str, ctx: &NameContext<'_>) -> String {
    let mut out = String::with_capacity(template.len() + 16);
    let mut rest = template;

    while let Some(open) = rest.find('[') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        let Some(close) = after.find(']') else {
            out.push_str(&rest[open..]);
            return out;
        };

        let token = &after[..close];
        match substitute(token, ctx) {
            Some(value) => out.push_str(&value),
            None => {
                out.push('[');
                out.push_str(token);
                out.push(']');
            }
        }
        rest = &after[close + 1..];
    }

    out.push_str(rest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    const HASH: &str = "0123456789abcdef0123456789abcdef";

    fn ctx() -> NameContext<'static> {
        NameContext {
            name: "app",
            id: 3,
            hash: "ffffffffffffffffffffffffffffffff",
            chunk_hash: HASH,
            content_hash: "cccccccccccccccccccccccccccccccc",
        }
    }

    #[test]
    fn test_plain_name() {
        assert_eq!(render_name("[name].js", &ctx()), "app.js");
        assert_eq!(render_name("static/js/[id].js", &ctx()), "static/js/3.js");
    }

    #[test]
    fn test_hash_defaults_to_twenty_chars() {
        assert_eq!(
            render_name("js/[name].[chunkhash].js", &ctx()),
            "js/app.0123456789abcdef0123.js"
        );
    }

    #[test]
    fn test_hash_length_limit() {
        assert_eq!(
            render_name("css/[name].[contenthash:8].css", &ctx()),
            "css/app.cccccccc.css"
        );
        assert_eq!(render_name("[hash:4]", &ctx()), "ffff");
        assert_eq!(render_name("[chunkhash:999]", &ctx()), HASH);
    }

    #[test]
    fn test_unknown_and_unterminated_placeholders_kept() {
        assert_eq!(render_name("[ext]/[name]", &ctx()), "[ext]/app");
        assert_eq!(render_name("[name:x]", &ctx()), "[name:x]");
        assert_eq!(render_name("app.[name", &ctx()), "app.[name");
    }
}
