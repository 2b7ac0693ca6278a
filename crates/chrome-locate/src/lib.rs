//! # chrome-locate
//!
//! Find a Chrome or Chromium executable that can be driven over the DevTools
//! protocol, so that users of `webslides2pdf` do not have to pass a browser
//! path by hand.
//!
//! ## Resolution order
//!
//! On the first call to [`locate_chrome`] (first match wins):
//!
//! 1. `SLIDES2PDF_CHROME`, then `CHROME` — explicit path to an executable.
//! 2. Well-known executable names searched on `PATH`
//!    (`google-chrome`, `chromium`, `chromium-browser`, …).
//! 3. Platform install locations (`/Applications/...`, `Program Files`, …).
//! 4. The Playwright browser cache (`ms-playwright/chromium-*`), which is
//!    where `playwright install chromium` puts its headless build.
//!
//! The resolved path is cached for the lifetime of the process.
//!
//! This crate only looks; it never downloads a browser.
//!
//! ## Usage
//!
//! ```rust,no_run
//! let chrome = chrome_locate::locate_chrome().expect("no browser installed");
//! println!("using {}", chrome.display());
//! ```
//!
//! ## Environment variable overrides
//!
//! - `SLIDES2PDF_CHROME` — path to a Chrome/Chromium executable.
//! - `CHROME` — same, honoured for compatibility with other tooling.

use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use thiserror::Error;

// ── Public constants ─────────────────────────────────────────────────────────

/// Environment variables consulted before any search, in priority order.
pub const ENV_OVERRIDES: [&str; 2] = ["SLIDES2PDF_CHROME", "CHROME"];

// ── Error type ───────────────────────────────────────────────────────────────

/// Errors returned by chrome-locate operations.
#[derive(Error, Debug)]
pub enum ChromeLocateError {
    /// An override variable points at something that is not a file.
    #[error("{var} is set to '{path}', which is not an executable file")]
    BadOverride { var: String, path: PathBuf },

    /// Nothing usable was found anywhere.
    #[error(
        "No Chrome/Chromium executable found.\n\
Searched PATH for {names:?} and the standard install locations.\n\
Install Chrome or Chromium, or set SLIDES2PDF_CHROME=/path/to/chrome."
    )]
    NotFound { names: Vec<String> },
}

// ── Internal: platform metadata ──────────────────────────────────────────────

/// Executable names probed on `PATH` for the given OS.
fn executable_names(os: &str) -> &'static [&'static str] {
    match os {
        "windows" => &["chrome.exe", "chromium.exe", "msedge.exe"],
        "macos" => &["google-chrome", "chromium", "chrome"],
        _ => &[
            "google-chrome",
            "google-chrome-stable",
            "chromium",
            "chromium-browser",
            "chrome",
            "headless_shell",
        ],
    }
}

/// Absolute install locations checked after `PATH`.
fn install_locations(os: &str) -> Vec<PathBuf> {
    match os {
        "macos" => vec![
            PathBuf::from("/Applications/Google Chrome.app/Contents/MacOS/Google Chrome"),
            PathBuf::from("/Applications/Chromium.app/Contents/MacOS/Chromium"),
            PathBuf::from(
                "/Applications/Google Chrome Canary.app/Contents/MacOS/Google Chrome Canary",
            ),
        ],
        "windows" => {
            let mut v = Vec::new();
            for var in ["ProgramFiles", "ProgramFiles(x86)", "LOCALAPPDATA"] {
                if let Ok(base) = std::env::var(var) {
                    let base = PathBuf::from(base);
                    v.push(base.join("Google/Chrome/Application/chrome.exe"));
                    v.push(base.join("Chromium/Application/chrome.exe"));
                    v.push(base.join("Microsoft/Edge/Application/msedge.exe"));
                }
            }
            v
        }
        _ => vec![
            PathBuf::from("/usr/bin/google-chrome"),
            PathBuf::from("/usr/bin/chromium"),
            PathBuf::from("/usr/bin/chromium-browser"),
            PathBuf::from("/snap/bin/chromium"),
            PathBuf::from("/opt/google/chrome/chrome"),
        ],
    }
}

/// Relative path of the executable inside one `ms-playwright/chromium-*` dir.
fn playwright_relative_exe(os: &str) -> &'static [&'static str] {
    match os {
        "macos" => &[
            "chrome-mac/Chromium.app/Contents/MacOS/Chromium",
            "chrome-mac-arm64/Chromium.app/Contents/MacOS/Chromium",
        ],
        "windows" => &["chrome-win/chrome.exe", "chrome-win64/chrome.exe"],
        _ => &["chrome-linux/chrome", "chrome-linux64/chrome"],
    }
}

// ── Cache directory resolution ───────────────────────────────────────────────

/// Returns the Playwright browser cache directory, if one can be determined.
///
/// - **macOS**: `~/Library/Caches/ms-playwright/`
/// - **Linux**: `~/.cache/ms-playwright/`
/// - **Windows**: `%LOCALAPPDATA%\ms-playwright\`
///
/// `PLAYWRIGHT_BROWSERS_PATH` overrides the default, as it does for Playwright.
pub fn playwright_cache_dir() -> Option<PathBuf> {
    if let Ok(dir) = std::env::var("PLAYWRIGHT_BROWSERS_PATH") {
        if !dir.is_empty() && dir != "0" {
            return Some(PathBuf::from(dir));
        }
    }
    dirs::cache_dir()
        .or_else(|| dirs::home_dir().map(|h| h.join(".cache")))
        .map(|base| base.join("ms-playwright"))
}

// ── Thread-safe singleton path cache ─────────────────────────────────────────

static RESOLVED_PATH: OnceLock<PathBuf> = OnceLock::new();

// ── Public API ───────────────────────────────────────────────────────────────

/// Returns `true` if [`locate_chrome`] would succeed.
pub fn is_chrome_available() -> bool {
    locate_chrome().is_ok()
}

/// Locates a Chrome/Chromium executable, caching the answer.
///
/// # Thread safety
///
/// Safe to call from multiple threads; concurrent first calls may both
/// search, and the first to finish wins the cache.
pub fn locate_chrome() -> Result<PathBuf, ChromeLocateError> {
    if let Some(path) = RESOLVED_PATH.get() {
        return Ok(path.clone());
    }

    let path = search()?;
    let _ = RESOLVED_PATH.set(path.clone());
    Ok(path)
}

/// Validates an explicit executable path supplied by the caller.
pub fn check_explicit(path: &Path) -> Result<PathBuf, ChromeLocateError> {
    if is_executable_file(path) {
        Ok(path.to_path_buf())
    } else {
        Err(ChromeLocateError::BadOverride {
            var: "--chrome".to_string(),
            path: path.to_path_buf(),
        })
    }
}

// ── Internal helpers ─────────────────────────────────────────────────────────

fn search() -> Result<PathBuf, ChromeLocateError> {
    let os = std::env::consts::OS;

    // 1. Environment variable overrides. A set-but-wrong override is an
    //    error rather than a silent fallback to some other browser.
    for var in ENV_OVERRIDES {
        if let Ok(value) = std::env::var(var) {
            if value.is_empty() {
                continue;
            }
            let p = PathBuf::from(value);
            return if is_executable_file(&p) {
                Ok(p)
            } else {
                Err(ChromeLocateError::BadOverride {
                    var: var.to_string(),
                    path: p,
                })
            };
        }
    }

    let names = executable_names(os);

    // 2. PATH.
    if let Some(path_var) = std::env::var_os("PATH") {
        let dirs: Vec<PathBuf> = std::env::split_paths(&path_var).collect();
        if let Some(p) = find_in_dirs(names, &dirs) {
            return Ok(p);
        }
    }

    // 3. Well-known install locations.
    if let Some(p) = install_locations(os)
        .into_iter()
        .find(|p| is_executable_file(p))
    {
        return Ok(p);
    }

    // 4. Playwright cache.
    if let Some(p) = playwright_cache_dir().and_then(|d| find_in_playwright_cache(&d, os)) {
        return Ok(p);
    }

    Err(ChromeLocateError::NotFound {
        names: names.iter().map(|s| s.to_string()).collect(),
    })
}

/// Returns the first `dir/name` that is an executable file, trying every
/// name in each directory before moving on.
fn find_in_dirs(names: &[&str], dirs: &[PathBuf]) -> Option<PathBuf> {
    dirs.iter()
        .flat_map(|d| names.iter().map(move |n| d.join(n)))
        .find(|p| is_executable_file(p))
}

/// Picks the newest `chromium-<revision>` build in a Playwright cache.
fn find_in_playwright_cache(cache: &Path, os: &str) -> Option<PathBuf> {
    let mut builds: Vec<(u64, PathBuf)> = std::fs::read_dir(cache)
        .ok()?
        .filter_map(|e| e.ok())
        .filter_map(|e| {
            let name = e.file_name().to_string_lossy().to_string();
            let revision = name.strip_prefix("chromium-")?.parse::<u64>().ok()?;
            Some((revision, e.path()))
        })
        .collect();
    builds.sort_by(|a, b| b.0.cmp(&a.0));

    builds.into_iter().find_map(|(_, dir)| {
        playwright_relative_exe(os)
            .iter()
            .map(|rel| dir.join(rel))
            .find(|p| is_executable_file(p))
    })
}

#[cfg(unix)]
fn is_executable_file(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    std::fs::metadata(path)
        .map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable_file(path: &Path) -> bool {
    path.is_file()
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn touch_executable(path: &Path) {
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, b"#!/bin/sh\n").unwrap();
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o755)).unwrap();
        }
    }

    #[test]
    fn every_platform_has_candidates() {
        for os in ["linux", "macos", "windows"] {
            assert!(!executable_names(os).is_empty(), "{os}");
            assert!(!playwright_relative_exe(os).is_empty(), "{os}");
        }
        assert!(!install_locations("linux").is_empty());
        assert!(!install_locations("macos").is_empty());
    }

    #[test]
    fn find_in_dirs_respects_directory_order() {
        let a = tempfile::tempdir().unwrap();
        let b = tempfile::tempdir().unwrap();
        touch_executable(&b.path().join("chromium"));
        touch_executable(&a.path().join("google-chrome"));

        let dirs = vec![a.path().to_path_buf(), b.path().to_path_buf()];
        let found = find_in_dirs(&["chromium", "google-chrome"], &dirs).unwrap();
        assert_eq!(found, a.path().join("google-chrome"));
    }

    #[test]
    fn find_in_dirs_misses_cleanly() {
        let a = tempfile::tempdir().unwrap();
        assert!(find_in_dirs(&["chromium"], &[a.path().to_path_buf()]).is_none());
    }

    #[cfg(unix)]
    #[test]
    fn non_executable_file_is_ignored() {
        let a = tempfile::tempdir().unwrap();
        std::fs::write(a.path().join("chromium"), b"").unwrap();
        assert!(find_in_dirs(&["chromium"], &[a.path().to_path_buf()]).is_none());
    }

    #[test]
    fn playwright_cache_prefers_newest_revision() {
        let cache = tempfile::tempdir().unwrap();
        let rel = playwright_relative_exe("linux")[0];
        touch_executable(&cache.path().join("chromium-1097").join(rel));
        touch_executable(&cache.path().join("chromium-1140").join(rel));
        std::fs::create_dir_all(cache.path().join("firefox-1400")).unwrap();

        let found = find_in_playwright_cache(cache.path(), "linux").unwrap();
        assert!(found.starts_with(cache.path().join("chromium-1140")));
    }

    #[test]
    fn check_explicit_rejects_directory() {
        let dir = tempfile::tempdir().unwrap();
        let err = check_explicit(dir.path()).unwrap_err();
        assert!(err.to_string().contains("not an executable file"));
    }
}
