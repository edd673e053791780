use crate::config::{ProjectConfig, CONFIG_FILE};
use crate::env::Mode;
use std::path::{Path, PathBuf};

/// Find the project root by walking up from `cwd`.
///
/// Returns the first directory containing `packwire.json`, `package.json` or
/// `.git`, or `None` if none is found.
#[must_use]
pub fn project_root(cwd: &Path) -> Option<PathBuf> {
    let mut current = cwd.to_path_buf();

    loop {
        if current.join(CONFIG_FILE).exists()
            || current.join("package.json").exists()
            || current.join(".git").exists()
        {
            return Some(current);
        }

        if !current.pop() {
            return None;
        }
    }
}

/// Join URL/asset path segments with `/`, collapsing duplicate separators.
///
/// A leading `/` on the first segment is kept; `.` segments are dropped.
#[must_use]
pub fn posix_join(parts: &[&str]) -> String {
    let absolute = parts.first().is_some_and(|p| p.starts_with('/'));
    let segments: Vec<&str> = parts
        .iter()
        .flat_map(|p| p.split('/'))
        .filter(|s| !s.is_empty() && *s != ".")
        .collect();

    let joined = segments.join("/");
    if absolute {
        format!("/{joined}")
    } else {
        joined
    }
}

/// Path of an emitted asset below the mode's assets sub-directory.
///
/// `assets_path(cfg, Mode::Production, "js/app.js")` → `static/js/app.js`
/// with the default `build.assetsSubDirectory`.
#[must_use]
pub fn assets_path(config: &ProjectConfig, mode: Mode, path: &str) -> String {
    let sub = match mode {
        Mode::Production => config.build.assets_sub_directory.as_str(),
        Mode::Development => config.dev.assets_sub_directory.as_str(),
    };
    posix_join(&[sub, path])
}

/// Public URL prefix for the mode, always ending in `/`.
#[must_use]
pub fn public_path(config: &ProjectConfig, mode: Mode) -> String {
    let raw = match mode {
        Mode::Production => config.build.assets_public_path.as_str(),
        Mode::Development => config.dev.assets_public_path.as_str(),
    };
    if raw.ends_with('/') {
        raw.to_string()
    } else {
        format!("{raw}/")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_project_root_with_config_file() {
        let dir = tempdir().unwrap();
        let nested = dir.path().join("src").join("components");
        fs::create_dir_all(&nested).unwrap();
        fs::write(dir.path().join(CONFIG_FILE), "{}").unwrap();

        assert_eq!(project_root(&nested), Some(dir.path().to_path_buf()));
    }

    #[test]
    fn test_project_root_with_package_json() {
        let dir = tempdir().unwrap();
        let nested = dir.path().join("a").join("b");
        fs::create_dir_all(&nested).unwrap();
        fs::write(dir.path().join("package.json"), "{}").unwrap();

        assert_eq!(project_root(&nested), Some(dir.path().to_path_buf()));
    }

    #[test]
    fn test_posix_join() {
        assert_eq!(posix_join(&["static", "js/app.js"]), "static/js/app.js");
        assert_eq!(posix_join(&["/", "static"]), "/static");
        assert_eq!(posix_join(&["/app/", "/static/"]), "/app/static");
        assert_eq!(posix_join(&["", "js/app.js"]), "js/app.js");
        assert_eq!(posix_join(&["./static", "./img"]), "static/img");
    }

    #[test]
    fn test_assets_path_per_mode() {
        let mut config = ProjectConfig::default();
        config.build.assets_sub_directory = "assets".to_string();
        config.dev.assets_sub_directory = "dev-static".to_string();

        assert_eq!(
            assets_path(&config, Mode::Production, "js/app.js"),
            "assets/js/app.js"
        );
        assert_eq!(
            assets_path(&config, Mode::Development, "js/app.js"),
            "dev-static/js/app.js"
        );
    }

    #[test]
    fn test_public_path_trailing_slash() {
        let mut config = ProjectConfig::default();
        config.build.assets_public_path = "/app".to_string();
        assert_eq!(public_path(&config, Mode::Production), "/app/");
        assert_eq!(public_path(&config, Mode::Development), "/");
    }
}
