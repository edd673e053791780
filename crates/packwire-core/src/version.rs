use std::fmt::Write;

/// The current version, read from Cargo.toml at compile time.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Version line for `--version` and logs, with the git hash when the build
/// provides `PACKWIRE_BUILD_GIT_HASH`.
#[must_use]
pub fn version_string() -> String {
    let mut s = format!("packwire {VERSION}");

    if let Some(hash) = option_env!("PACKWIRE_BUILD_GIT_HASH") {
        let _ = write!(s, " ({hash})");
    }

    s
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_string_contains_version() {
        let vs = version_string();
        assert!(vs.contains(VERSION));
        assert!(vs.starts_with("packwire "));
    }
}
