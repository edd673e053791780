use crate::env::Environment;

/// Open the browser only when asked to and not under test.
#[must_use]
pub fn should_open(auto_open_browser: bool, env: &Environment) -> bool {
    auto_open_browser && !env.is_testing()
}

/// Open a URL in the default browser.
pub fn open_browser(url: &str) -> std::io::Result<()> {
    #[cfg(target_os = "macos")]
    {
        std::process::Command::new("open").arg(url).spawn()?;
    }
    #[cfg(target_os = "linux")]
    {
        std::process::Command::new("xdg-open").arg(url).spawn()?;
    }
    #[cfg(target_os = "windows")]
    {
        std::process::Command::new("cmd")
            .args(["/C", "start", url])
            .spawn()?;
    }
    Ok(())
}
