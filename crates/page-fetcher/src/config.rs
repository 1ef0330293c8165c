use std::env;
use std::path::PathBuf;
use std::time::Duration;

use which::which;

/// Browser launch settings shared by every session of one fetcher.
#[derive(Clone, Debug)]
pub struct FetcherConfig {
    /// Empty means "let chromiumoxide find one".
    pub executable: Option<PathBuf>,
    pub headless: bool,
    /// Each target gets its own persistent profile below this directory.
    pub profile_root: PathBuf,
    pub launch_timeout: Duration,
    pub request_timeout: Duration,
    pub disable_sandbox: bool,
    pub extra_args: Vec<String>,
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            executable: detect_chrome_executable(),
            headless: true,
            profile_root: PathBuf::from("./.dropwatch-profiles"),
            launch_timeout: Duration::from_secs(20),
            request_timeout: Duration::from_secs(30),
            disable_sandbox: env::var("DROPWATCH_DISABLE_SANDBOX")
                .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
                .unwrap_or(false),
            extra_args: Vec::new(),
        }
    }
}

/// `DROPWATCH_CHROME` if it points at a file, else the first browser on `PATH`.
pub fn detect_chrome_executable() -> Option<PathBuf> {
    if let Ok(raw) = env::var("DROPWATCH_CHROME") {
        let trimmed = raw.trim();
        if !trimmed.is_empty() {
            let candidate = PathBuf::from(trimmed);
            if candidate.exists() {
                return Some(candidate);
            }
        }
    }

    chrome_executable_names()
        .iter()
        .find_map(|name| which(name).ok())
}

fn chrome_executable_names() -> &'static [&'static str] {
    #[cfg(target_os = "windows")]
    {
        &["chrome.exe", "chromium.exe", "msedge.exe"]
    }

    #[cfg(not(target_os = "windows"))]
    {
        &[
            "chrome",
            "chromium",
            "chromium-browser",
            "google-chrome",
            "google-chrome-stable",
        ]
    }
}
