//! The rendering session: one headless browser, one page, owned by one job.
//!
//! ## Ownership
//!
//! A [`BrowserSession`] is acquired at job start and released on every exit
//! path. [`BrowserSession::close`] shuts the browser down gracefully; if the
//! job future is dropped instead (Ctrl-C, job timeout), `Drop` aborts the
//! DevTools handler task and chromiumoxide kills the child process. The
//! per-session profile directory is a [`TempDir`], so it goes away with the
//! session either way. Nothing here is shared between jobs.
//!
//! ## The `PresentationPage` seam
//!
//! The inspector and the capture loop only need a handful of page
//! operations. They are expressed as the [`PresentationPage`] trait so both
//! stages can be driven by a scripted fake in unit tests.

use crate::config::ConversionConfig;
use crate::error::{SessionError, Slides2PdfError};
use crate::presentation::{CaptureFormat, NavigationAddress};
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::emulation::SetDeviceMetricsOverrideParams;
use chromiumoxide::cdp::browser_protocol::page::{
    AddScriptToEvaluateOnNewDocumentParams, CaptureScreenshotFormat, ReloadParams,
};
use chromiumoxide::cdp::js_protocol::runtime::EvaluateParams;
use chromiumoxide::page::ScreenshotParams;
use chromiumoxide::Page;
use futures::StreamExt;
use serde::Deserialize;
use serde_json::Value;
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tempfile::TempDir;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use url::Url;

/// How often the network-idle wait samples the page.
const IDLE_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Page operations the inspector and orchestrator rely on.
#[allow(async_fn_in_trait)]
pub trait PresentationPage {
    /// Evaluate a JS expression and return its JSON value (`null` if none).
    async fn evaluate(&self, script: &str) -> Result<Value, SessionError>;

    /// Hide framework chrome with `css`, on this and every later load.
    async fn hide_chrome(&self, css: &str) -> Result<(), SessionError>;

    /// Set the viewport in CSS pixels and the device pixel ratio.
    async fn resize(&self, width: u32, height: u32, scale: f64) -> Result<(), SessionError>;

    /// Point the document URL at `address` without reloading.
    async fn navigate(&self, address: &NavigationAddress) -> Result<(), SessionError>;

    /// Cold-reload the current URL, bypassing the cache.
    async fn reload(&self) -> Result<(), SessionError>;

    /// Capture the current viewport.
    async fn screenshot(&self, format: CaptureFormat) -> Result<Vec<u8>, SessionError>;
}

/// One headless browser with a single page.
pub struct BrowserSession {
    browser: Browser,
    page: Page,
    handler: JoinHandle<()>,
    _profile_dir: TempDir,
}

#[derive(Deserialize)]
struct LoadState {
    ready: String,
    resources: u64,
}

impl BrowserSession {
    /// Start a headless browser and open a blank page.
    ///
    /// # Errors
    /// [`Slides2PdfError::Environment`] when no executable can be found or
    /// the process fails to start.
    pub async fn launch(config: &ConversionConfig) -> Result<Self, Slides2PdfError> {
        let executable = resolve_executable(config)?;
        let profile_dir = TempDir::new().map_err(|e| Slides2PdfError::Environment {
            detail: format!("cannot create browser profile directory: {e}"),
        })?;

        let (w, h) = config.default_viewport;
        let mut builder = BrowserConfig::builder()
            .no_sandbox()
            .user_data_dir(profile_dir.path())
            .window_size(w, h)
            .viewport(None)
            .arg("--hide-scrollbars")
            .arg("--allow-file-access-from-files")
            .arg("--mute-audio");
        if let Some(ref path) = executable {
            builder = builder.chrome_executable(path);
        }
        let browser_config = builder
            .build()
            .map_err(|detail| Slides2PdfError::Environment { detail })?;

        let launched = tokio::time::timeout(config.load_timeout(), Browser::launch(browser_config))
            .await
            .map_err(|_| Slides2PdfError::Environment {
                detail: format!("browser did not start within {}s", config.load_timeout_secs),
            })?;
        let (browser, mut handler) = launched.map_err(|e| Slides2PdfError::Environment {
            detail: e.to_string(),
        })?;

        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    debug!("DevTools handler: {}", e);
                }
            }
        });

        let page = match browser.new_page("about:blank").await {
            Ok(page) => page,
            Err(e) => {
                handler.abort();
                return Err(Slides2PdfError::Environment {
                    detail: format!("cannot open a page: {e}"),
                });
            }
        };

        info!(
            "Browser session started ({})",
            executable
                .as_deref()
                .map(|p| p.display().to_string())
                .unwrap_or_else(|| "auto-detected".into())
        );

        Ok(Self {
            browser,
            page,
            handler,
            _profile_dir: profile_dir,
        })
    }

    /// Load `url` and wait until the network has been quiet for
    /// `config.network_idle_ms`, bounded by `config.load_timeout_secs`.
    pub async fn load(&self, url: &Url, config: &ConversionConfig) -> Result<(), Slides2PdfError> {
        let work = async {
            self.page
                .goto(url.as_str())
                .await
                .map_err(|e| Slides2PdfError::LoadFailed {
                    url: url.to_string(),
                    detail: e.to_string(),
                })?;
            self.wait_for_network_idle(config.network_idle())
                .await
                .map_err(|e| Slides2PdfError::LoadFailed {
                    url: url.to_string(),
                    detail: e.to_string(),
                })
        };

        tokio::time::timeout(config.load_timeout(), work)
            .await
            .map_err(|_| Slides2PdfError::LoadTimeout {
                url: url.to_string(),
                secs: config.load_timeout_secs,
            })?
    }

    /// Wait until the document is complete and no new resource entries have
    /// appeared for `idle`.
    async fn wait_for_network_idle(&self, idle: Duration) -> Result<(), SessionError> {
        let script = "(() => ({ ready: document.readyState, \
                      resources: performance.getEntriesByType('resource').length }))()";
        let mut last_count = None;
        let mut quiet_since = Instant::now();

        loop {
            let state: LoadState = serde_json::from_value(self.evaluate(script).await?)?;
            if last_count != Some(state.resources) {
                last_count = Some(state.resources);
                quiet_since = Instant::now();
            }
            if state.ready == "complete" && quiet_since.elapsed() >= idle {
                debug!("Network idle after {} resources", state.resources);
                return Ok(());
            }
            tokio::time::sleep(IDLE_POLL_INTERVAL).await;
        }
    }

    /// Shut the browser down and wait for the process to exit.
    ///
    /// Failures are logged, not returned: by the time a session is closed the
    /// job already has its result.
    pub async fn close(mut self) {
        if let Err(e) = self.browser.close().await {
            warn!("Browser close failed: {}", e);
        }
        if let Err(e) = self.browser.wait().await {
            warn!("Browser did not exit cleanly: {}", e);
        }
        self.handler.abort();
        debug!("Browser session closed");
    }
}

impl Drop for BrowserSession {
    fn drop(&mut self) {
        self.handler.abort();
    }
}

impl PresentationPage for BrowserSession {
    async fn evaluate(&self, script: &str) -> Result<Value, SessionError> {
        let params = EvaluateParams::builder()
            .expression(script)
            .return_by_value(true)
            .await_promise(true)
            .build()
            .map_err(SessionError)?;
        let result = self.page.evaluate_expression(params).await?;
        Ok(result.value().cloned().unwrap_or(Value::Null))
    }

    async fn hide_chrome(&self, css: &str) -> Result<(), SessionError> {
        let script = style_injection_script(css)?;
        let on_new_document = AddScriptToEvaluateOnNewDocumentParams::builder()
            .source(script.clone())
            .build()
            .map_err(SessionError)?;
        self.page.execute(on_new_document).await?;
        self.evaluate(&script).await?;
        Ok(())
    }

    async fn resize(&self, width: u32, height: u32, scale: f64) -> Result<(), SessionError> {
        let params = SetDeviceMetricsOverrideParams::builder()
            .width(width as i64)
            .height(height as i64)
            .device_scale_factor(scale)
            .mobile(false)
            .build()
            .map_err(SessionError)?;
        self.page.execute(params).await?;
        Ok(())
    }

    async fn navigate(&self, address: &NavigationAddress) -> Result<(), SessionError> {
        let fragment = serde_json::to_string(&format!("#{}", address.fragment()))?;
        self.evaluate(&format!("history.replaceState(null, '', {fragment})"))
            .await?;
        Ok(())
    }

    async fn reload(&self) -> Result<(), SessionError> {
        let mut params = ReloadParams::default();
        params.ignore_cache = Some(true);
        self.page.execute(params).await?;
        self.page.wait_for_navigation().await?;
        Ok(())
    }

    async fn screenshot(&self, format: CaptureFormat) -> Result<Vec<u8>, SessionError> {
        let params = match format {
            CaptureFormat::Png => ScreenshotParams::builder()
                .format(CaptureScreenshotFormat::Png)
                .build(),
            CaptureFormat::Jpeg { quality } => ScreenshotParams::builder()
                .format(CaptureScreenshotFormat::Jpeg)
                .quality(quality as i64)
                .build(),
        };
        Ok(self.page.screenshot(params).await?)
    }
}

/// Explicit config path, else `chrome_locate`, else let chromiumoxide try.
fn resolve_executable(config: &ConversionConfig) -> Result<Option<PathBuf>, Slides2PdfError> {
    if let Some(ref path) = config.chrome_executable {
        return chrome_locate::check_explicit(path)
            .map(Some)
            .map_err(|e| Slides2PdfError::Environment {
                detail: e.to_string(),
            });
    }
    match chrome_locate::locate_chrome() {
        Ok(path) => Ok(Some(path)),
        Err(e @ chrome_locate::ChromeLocateError::BadOverride { .. }) => {
            Err(Slides2PdfError::Environment {
                detail: e.to_string(),
            })
        }
        Err(e) => {
            debug!("{}; falling back to chromiumoxide detection", e);
            Ok(None)
        }
    }
}

/// JS that appends a `<style>` element, in HTML or SVG documents alike.
fn style_injection_script(css: &str) -> Result<String, SessionError> {
    let css = serde_json::to_string(css)?;
    Ok(format!(
        r#"(() => {{
            const apply = () => {{
                const root = document.documentElement;
                if (!root) return;
                const style = document.createElementNS(root.namespaceURI || 'http://www.w3.org/1999/xhtml', 'style');
                style.textContent = {css};
                (document.head || root).appendChild(style);
            }};
            if (document.readyState === 'loading') {{
                document.addEventListener('DOMContentLoaded', apply, {{ once: true }});
            }} else {{
                apply();
            }}
        }})()"#
    ))
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn style_script_embeds_escaped_css() {
        let script = style_injection_script(".a { content: \"x\"; }").unwrap();
        assert!(script.contains(r#"".a { content: \"x\"; }""#));
        assert!(script.contains("createElementNS"));
    }

    #[test]
    fn explicit_missing_executable_is_environment_error() {
        let config = ConversionConfig::builder()
            .chrome_executable("/no/such/chrome")
            .build()
            .unwrap();
        let err = resolve_executable(&config).unwrap_err();
        assert!(matches!(err, Slides2PdfError::Environment { .. }));
    }
}
