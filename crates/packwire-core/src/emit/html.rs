//! HTML document generation: chunk selection, tag injection, minification.

use crate::engine::Chunk;
use crate::pipeline::{ChunksSortMode, HtmlMinify};
use std::collections::{BTreeMap, BTreeSet, HashMap};

/// Document used when the project has no template.
pub const DEFAULT_DOCUMENT: &str = r#"<!DOCTYPE html>
<html>
  <head>
    <meta charset="utf-8">
    <meta name="viewport" content="width=device-width,initial-scale=1.0">
    <title>app</title>
  </head>
  <body>
    <div id="app"></div>
  </body>
</html>
"#;

/// Chunks whose tags go into the document, in load order.
///
/// Entry chunks and everything they transitively depend on are injected.
/// Chunks nothing depends on and that are not entries load on demand and are
/// left out. `Auto` orders by chunk id; `Dependency` puts every chunk after
/// the chunks it depends on, breaking ties by id.
pub fn injected_chunks(chunks: &[Chunk], mode: ChunksSortMode) -> Vec<&Chunk> {
    let by_name: HashMap<&str, &Chunk> = chunks.iter().map(|c| (c.name.as_str(), c)).collect();

    let mut selected: BTreeMap<u32, &Chunk> = BTreeMap::new();
    let mut stack: Vec<&Chunk> = chunks.iter().filter(|c| c.entry).collect();
    while let Some(chunk) = stack.pop() {
        if selected.insert(chunk.id, chunk).is_some() {
            continue;
        }
        stack.extend(
            chunk
                .depends_on
                .iter()
                .filter_map(|name| by_name.get(name.as_str()).copied()),
        );
    }

    match mode {
        ChunksSortMode::Auto => selected.into_values().collect(),
        ChunksSortMode::Dependency => dependency_order(&selected),
    }
}

fn dependency_order<'a>(selected: &BTreeMap<u32, &'a Chunk>) -> Vec<&'a Chunk> {
    let id_of: HashMap<&str, u32> = selected
        .values()
        .map(|c| (c.name.as_str(), c.id))
        .collect();

    // dependents[dep] = chunks waiting on dep
    let mut pending: BTreeMap<u32, usize> = BTreeMap::new();
    let mut dependents: HashMap<u32, Vec<u32>> = HashMap::new();
    for chunk in selected.values() {
        let deps: BTreeSet<u32> = chunk
            .depends_on
            .iter()
            .filter_map(|name| id_of.get(name.as_str()).copied())
            .filter(|&dep| dep != chunk.id)
            .collect();
        pending.insert(chunk.id, deps.len());
        for dep in deps {
            dependents.entry(dep).or_default().push(chunk.id);
        }
    }

    let mut ready: BTreeSet<u32> = pending
        .iter()
        .filter(|(_, &n)| n == 0)
        .map(|(&id, _)| id)
        .collect();
    let mut order = Vec::with_capacity(selected.len());

    while let Some(id) = ready.pop_first() {
        pending.remove(&id);
        order.push(selected[&id]);
        for dependent in dependents.get(&id).into_iter().flatten() {
            if let Some(n) = pending.get_mut(dependent) {
                *n -= 1;
                if *n == 0 {
                    ready.insert(*dependent);
                }
            }
        }
    }

    // Cycles: whatever is left, by id.
    order.extend(pending.keys().map(|id| selected[id]));
    order
}

/// Insert stylesheet links before `</head>` and scripts before `</body>`.
pub fn inject(template: &str, styles: &[String], scripts: &[String]) -> String {
    let links: String = styles
        .iter()
        .map(|href| format!("<link href=\"{href}\" rel=\"stylesheet\">"))
        .collect();
    let tags: String = scripts
        .iter()
        .map(|src| format!("<script type=\"text/javascript\" src=\"{src}\"></script>"))
        .collect();

    let html = insert_before(template, "</head>", &links, Fallback::Prepend);
    insert_before(&html, "</body>", &tags, Fallback::Append)
}

enum Fallback {
    Prepend,
    Append,
}

fn insert_before(html: &str, marker: &str, content: &str, fallback: Fallback) -> String {
    if content.is_empty() {
        return html.to_string();
    }
    match html.to_ascii_lowercase().rfind(marker) {
        Some(at) => format!("{}{content}{}", &html[..at], &html[at..]),
        None => match fallback {
            Fallback::Prepend => format!("{content}{html}"),
            Fallback::Append => format!("{html}{content}"),
        },
    }
}

/// Elements whose content is copied verbatim.
const RAW_TEXT: [&str; 4] = ["script", "style", "pre", "textarea"];

/// Inline elements: whitespace between two of them renders as a space.
const INLINE: [&str; 38] = [
    "a", "abbr", "acronym", "b", "bdi", "bdo", "big", "button", "cite", "code", "del", "dfn",
    "em", "font", "i", "img", "input", "ins", "kbd", "label", "mark", "nobr", "q", "s", "samp",
    "select", "small", "span", "strike", "strong", "sub", "sup", "svg", "textarea", "time", "tt",
    "u", "var",
];

/// Minify a document according to `options`.
pub fn minify(html: &str, options: HtmlMinify) -> String {
    let mut out = String::with_capacity(html.len());
    let mut rest = html;
    let mut last_tag: Option<String> = None;

    while !rest.is_empty() {
        if rest.starts_with("<!--") {
            let end = rest.find("-->").map_or(rest.len(), |i| i + 3);
            if !options.remove_comments {
                out.push_str(&rest[..end]);
            }
            rest = &rest[end..];
        } else if rest.starts_with('<') {
            let end = tag_end(rest);
            let tag = &rest[..end];
            if options.remove_attribute_quotes {
                out.push_str(&unquote_attributes(tag));
            } else {
                out.push_str(tag);
            }
            rest = &rest[end..];
            last_tag = Some(tag_name(tag));

            if let Some(name) = raw_text_element(tag) {
                let close = format!("</{name}");
                let end = rest.to_ascii_lowercase().find(&close).unwrap_or(rest.len());
                out.push_str(&rest[..end]);
                rest = &rest[end..];
            }
        } else {
            let end = rest.find('<').unwrap_or(rest.len());
            let text = &rest[..end];
            rest = &rest[end..];
            if !options.collapse_whitespace {
                out.push_str(text);
            } else if !text.chars().all(char::is_whitespace) {
                push_collapsed(&mut out, text);
            } else if between_inline(last_tag.as_deref(), rest) {
                out.push(' ');
            }
        }
    }

    out
}

/// Whether whitespace-only text sits between two inline elements.
///
/// Next to anything else (block or head elements, comments, the document
/// edges) it has no rendered effect and is dropped.
fn between_inline(previous: Option<&str>, rest: &str) -> bool {
    let is_inline = |name: &str| INLINE.contains(&name);
    let next = rest
        .starts_with('<')
        .then(|| &rest[..tag_end(rest)])
        .filter(|tag| !tag.starts_with("<!"))
        .map(tag_name);
    previous.is_some_and(is_inline) && next.as_deref().is_some_and(is_inline)
}

/// Lowercase element name of a tag, without `<` or `/`.
fn tag_name(tag: &str) -> String {
    tag.trim_start_matches('<')
        .trim_start_matches('/')
        .chars()
        .take_while(|c| c.is_ascii_alphanumeric() || *c == '!' || *c == '-')
        .collect::<String>()
        .to_ascii_lowercase()
}

/// Index just past the `>` closing the tag at the start of `rest`.
fn tag_end(rest: &str) -> usize {
    let mut quote = None;
    for (i, c) in rest.char_indices().skip(1) {
        match (quote, c) {
            (None, '"' | '\'') => quote = Some(c),
            (Some(q), _) if q == c => quote = None,
            (None, '>') => return i + 1,
            _ => {}
        }
    }
    rest.len()
}

fn raw_text_element(tag: &str) -> Option<&'static str> {
    if tag.starts_with("</") || tag.ends_with("/>") {
        return None;
    }
    let name = tag_name(tag);
    RAW_TEXT.into_iter().find(|raw| *raw == name)
}

fn push_collapsed(out: &mut String, text: &str) {
    let mut in_space = false;
    for c in text.chars() {
        if c.is_whitespace() {
            if !in_space {
                out.push(' ');
            }
            in_space = true;
        } else {
            out.push(c);
            in_space = false;
        }
    }
}

fn safe_unquoted(value: &str) -> bool {
    !value.is_empty()
        && !value.ends_with('/')
        && !value
            .chars()
            .any(|c| c.is_whitespace() || matches!(c, '"' | '\'' | '=' | '<' | '>' | '`'))
}

fn unquote_attributes(tag: &str) -> String {
    let mut out = String::with_capacity(tag.len());
    let mut chars = tag.char_indices().peekable();

    while let Some((_, c)) = chars.next() {
        out.push(c);
        if c != '=' {
            continue;
        }
        let Some(&(at, quote)) = chars.peek() else {
            break;
        };
        if quote != '"' && quote != '\'' {
            continue;
        }
        let start = at + 1;
        let Some(len) = tag[start..].find(quote) else {
            continue;
        };

        let value = &tag[start..start + len];
        if safe_unquoted(value) {
            out.push_str(value);
        } else {
            out.push(quote);
            out.push_str(value);
            out.push(quote);
        }

        let resume = start + len + 1;
        while chars.peek().is_some_and(|&(i, _)| i < resume) {
            chars.next();
        }
    }

    out
}
