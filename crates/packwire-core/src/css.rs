//! Extracted-CSS optimization using lightningcss.
//!
//! Minifies stylesheets and merges duplicate rules.

use crate::error::{Error, Result};
use lightningcss::printer::PrinterOptions;
use lightningcss::stylesheet::{MinifyOptions, ParserOptions, StyleSheet};
use lightningcss::targets::{Browsers, Targets};

/// Minify `source`. `asset` names the stylesheet in error messages.
pub fn optimize_css(source: &str, asset: &str) -> Result<String> {
    let css_error = |message: String| Error::Css {
        asset: asset.to_string(),
        message,
    };

    let parser_options = ParserOptions {
        filename: asset.to_string(),
        ..ParserOptions::default()
    };

    let mut stylesheet =
        StyleSheet::parse(source, parser_options).map_err(|e| css_error(e.to_string()))?;

    let browsers = default_browser_targets();

    stylesheet
        .minify(MinifyOptions {
            targets: Targets::from(browsers),
            ..Default::default()
        })
        .map_err(|e| css_error(e.to_string()))?;

    let output = stylesheet
        .to_css(PrinterOptions {
            minify: true,
            targets: Targets::from(browsers),
            ..Default::default()
        })
        .map_err(|e| css_error(e.to_string()))?;

    Ok(output.code)
}

/// Browser targets for prefixing decisions.
///
/// Chrome 80+, Firefox 75+, Safari 13+, Edge 80+.
fn default_browser_targets() -> Browsers {
    Browsers {
        chrome: Some(80 << 16),
        firefox: Some(75 << 16),
        safari: Some(13 << 16),
        edge: Some(80 << 16),
        ..Default::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minifies_whitespace() {
        let out = optimize_css(".foo {\n  color: red;\n}\n", "app.css").unwrap();
        assert_eq!(out, ".foo{color:red}");
    }

    #[test]
    fn test_merges_duplicate_rules() {
        let css = ".btn { color: red; }\n.btn { color: red; }\n";
        let out = optimize_css(css, "app.css").unwrap();
        assert_eq!(out.matches(".btn").count(), 1, "{out}");
    }
}
