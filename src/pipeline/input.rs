//! Input resolution: normalise a user-supplied path or URL to something the
//! browser can load.
//!
//! Local files become absolute `file://` URLs so that relative assets
//! (images, fonts, the framework's own scripts) resolve next to the source.
//! Remote presentations are handed to the browser unchanged; downloading
//! them would break their relative asset references.

use crate::error::Slides2PdfError;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use tracing::debug;
use url::Url;

/// File extensions the presentation frameworks produce.
pub const RECOGNISED_EXTENSIONS: [&str; 3] = ["svg", "html", "htm"];

/// The resolved input, ready to be loaded by the browser.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolvedInput {
    /// A local file, with its `file://` URL.
    Local { path: PathBuf, url: Url },
    /// An HTTP/HTTPS URL loaded directly.
    Remote(Url),
}

impl ResolvedInput {
    /// The URL the browser loads, without fragment.
    pub fn url(&self) -> &Url {
        match self {
            ResolvedInput::Local { url, .. } => url,
            ResolvedInput::Remote(url) => url,
        }
    }

    /// The source file stem, used to name the CLI's output file.
    pub fn stem(&self) -> Option<String> {
        match self {
            ResolvedInput::Local { path, .. } => {
                path.file_stem().map(|s| s.to_string_lossy().to_string())
            }
            ResolvedInput::Remote(url) => url
                .path_segments()
                .and_then(|mut s| s.next_back().map(str::to_string))
                .filter(|s| !s.is_empty())
                .map(|s| match s.rsplit_once('.') {
                    Some((stem, _)) => stem.to_string(),
                    None => s,
                }),
        }
    }
}

/// Check if the input string looks like a URL.
pub fn is_url(input: &str) -> bool {
    input.starts_with("http://") || input.starts_with("https://")
}

/// Whether `path` carries one of [`RECOGNISED_EXTENSIONS`] (case-insensitive).
pub fn has_recognised_extension(path: &Path) -> bool {
    path.extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .is_some_and(|e| RECOGNISED_EXTENSIONS.contains(&e.as_str()))
}

/// Resolve the input string to a loadable URL.
pub fn resolve_input(input: &str) -> Result<ResolvedInput, Slides2PdfError> {
    if is_url(input) {
        let mut url = Url::parse(input).map_err(|e| Slides2PdfError::InvalidInput {
            input: input.to_string(),
            reason: e.to_string(),
        })?;
        url.set_fragment(None);
        debug!("Resolved remote presentation: {}", url);
        Ok(ResolvedInput::Remote(url))
    } else {
        resolve_local(Path::new(input))
    }
}

/// Resolve a local file path, validating existence, readability and extension.
fn resolve_local(path: &Path) -> Result<ResolvedInput, Slides2PdfError> {
    if !path.exists() {
        return Err(Slides2PdfError::FileNotFound {
            path: path.to_path_buf(),
        });
    }
    if !path.is_file() {
        return Err(Slides2PdfError::InvalidInput {
            input: path.display().to_string(),
            reason: "not a regular file".into(),
        });
    }
    if !has_recognised_extension(path) {
        return Err(Slides2PdfError::UnsupportedInput {
            path: path.to_path_buf(),
        });
    }

    match std::fs::File::open(path) {
        Ok(_) => {}
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
            return Err(Slides2PdfError::PermissionDenied {
                path: path.to_path_buf(),
            });
        }
        Err(_) => {
            return Err(Slides2PdfError::FileNotFound {
                path: path.to_path_buf(),
            });
        }
    }

    let absolute = std::fs::canonicalize(path).map_err(|_| Slides2PdfError::FileNotFound {
        path: path.to_path_buf(),
    })?;
    let url = Url::from_file_path(&absolute).map_err(|_| Slides2PdfError::InvalidInput {
        input: absolute.display().to_string(),
        reason: "cannot be expressed as a file:// URL".into(),
    })?;

    debug!("Resolved local presentation: {}", url);
    Ok(ResolvedInput::Local {
        path: absolute,
        url,
    })
}

/// Expand CLI paths into the list of presentations to convert.
///
/// Files with a recognised extension are kept as given; directories expand
/// to their directly contained recognised files (no recursion). Anything
/// else is ignored. The result is sorted and de-duplicated.
pub fn discover_inputs<P: AsRef<Path>>(paths: &[P]) -> Vec<PathBuf> {
    let mut found = BTreeSet::new();

    for p in paths {
        let path = p.as_ref();
        if path.is_file() {
            if has_recognised_extension(path) {
                found.insert(path.to_path_buf());
            }
        } else if path.is_dir() {
            let Ok(entries) = std::fs::read_dir(path) else {
                debug!("Skipping unreadable directory {}", path.display());
                continue;
            };
            for entry in entries.filter_map(|e| e.ok()) {
                let child = entry.path();
                if child.is_file() && has_recognised_extension(&child) {
                    found.insert(child);
                }
            }
        }
    }

    found.into_iter().collect()
}

/// `name.ext` → `name.pdf` in the same directory.
pub fn output_path_for(input: &Path) -> PathBuf {
    input.with_extension("pdf")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_url() {
        assert!(is_url("https://example.com/deck.svg"));
        assert!(is_url("http://example.com/deck.html"));
        assert!(!is_url("/tmp/deck.svg"));
        assert!(!is_url("deck.svg"));
        assert!(!is_url(""));
    }

    #[test]
    fn remote_fragment_is_stripped() {
        let r = resolve_input("https://example.com/talks/deck.svg#frame3").unwrap();
        assert_eq!(r.url().as_str(), "https://example.com/talks/deck.svg");
        assert_eq!(r.stem().as_deref(), Some("deck"));
    }

    #[test]
    fn missing_file_is_reported() {
        let err = resolve_input("/definitely/not/here.svg").unwrap_err();
        assert!(matches!(err, Slides2PdfError::FileNotFound { .. }));
    }

    #[test]
    fn wrong_extension_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let p = dir.path().join("notes.txt");
        std::fs::write(&p, "hello").unwrap();
        let err = resolve_input(p.to_str().unwrap()).unwrap_err();
        assert!(matches!(err, Slides2PdfError::UnsupportedInput { .. }));
    }

    #[test]
    fn local_file_becomes_file_url() {
        let dir = tempfile::tempdir().unwrap();
        let p = dir.path().join("My Talk.SVG");
        std::fs::write(&p, "<svg/>").unwrap();
        let r = resolve_input(p.to_str().unwrap()).unwrap();
        assert_eq!(r.url().scheme(), "file");
        assert!(r.url().as_str().ends_with("My%20Talk.SVG"));
        assert_eq!(r.stem().as_deref(), Some("My Talk"));
    }

    #[test]
    fn discover_expands_directories_one_level() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("b.html"), "").unwrap();
        std::fs::write(dir.path().join("a.svg"), "").unwrap();
        std::fs::write(dir.path().join("readme.md"), "").unwrap();
        std::fs::create_dir(dir.path().join("nested")).unwrap();
        std::fs::write(dir.path().join("nested/c.svg"), "").unwrap();

        let explicit = dir.path().join("a.svg");
        let found = discover_inputs(&[dir.path().to_path_buf(), explicit]);
        let names: Vec<_> = found
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().to_string())
            .collect();
        assert_eq!(names, vec!["a.svg", "b.html"]);
    }

    #[test]
    fn discover_nothing_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        assert!(discover_inputs(&[dir.path()]).is_empty());
        assert!(discover_inputs::<PathBuf>(&[]).is_empty());
    }

    #[test]
    fn output_sits_beside_input() {
        assert_eq!(
            output_path_for(Path::new("/talks/deck.svg")),
            PathBuf::from("/talks/deck.pdf")
        );
    }
}
