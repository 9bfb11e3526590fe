// spider_chrome re-exports chromiumoxide API
use super::{BrowserSession, DeviceProfile, Point, Viewport};
use crate::config::BrowserKind;
use crate::error::{BrowserError, Result};
use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::emulation::{
    SetDeviceMetricsOverrideParams, SetTouchEmulationEnabledParams,
};
use chromiumoxide::cdp::browser_protocol::input::{
    DispatchMouseEventParams, DispatchMouseEventType, MouseButton,
};
use chromiumoxide::cdp::browser_protocol::network::{
    Headers, SetExtraHttpHeadersParams, SetUserAgentOverrideParams,
};
use futures::StreamExt;
use std::path::PathBuf;
use std::time::Duration;

/// How long navigation may take before it is reported as failed
const NAVIGATION_TIMEOUT: Duration = Duration::from_secs(30);

/// Desktop Chrome identity used by `--stealth` for sites that block headless browsers
pub const STEALTH_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; WOW64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/108.0.0.0 Safari/537.36";
const STEALTH_ACCEPT_LANGUAGE: &str = "en-US,en;q=0.9,en;q=0.8";

pub struct ChromeDriver {
    browser: Browser,
    temp_dir: Option<PathBuf>,
    owns_browser: bool,
    stealth: bool,
    closed: bool,
}

/// Connection mode for Chrome browser
pub enum ConnectionMode {
    /// Sandboxed mode - launches Chrome using system installation
    Sandboxed {
        chrome_path: Option<String>,
        no_sandbox: bool,
        headless: bool,
    },
    /// Advanced mode - connects to existing Chrome on debug port
    DebugPort(u16),
}

impl ConnectionMode {
    /// Whether closing the session should shut Chrome down
    pub fn owns_browser(&self) -> bool {
        matches!(self, ConnectionMode::Sandboxed { .. })
    }
}

/// Extra request headers sent in stealth mode
pub fn stealth_headers() -> serde_json::Value {
    serde_json::json!({
        "upgrade-insecure-requests": "1",
        "accept": "text/html,application/xhtml+xml,application/xml;q=0.9,image/avif,image/webp,image/apng,*/*;q=0.8",
        "accept-encoding": "gzip, deflate, br",
        "accept-language": STEALTH_ACCEPT_LANGUAGE,
    })
}

fn device_metrics(device: &DeviceProfile) -> Result<SetDeviceMetricsOverrideParams> {
    SetDeviceMetricsOverrideParams::builder()
        .width(device.width as i64)
        .height(device.height as i64)
        .device_scale_factor(device.device_scale_factor)
        .mobile(device.mobile)
        .build()
        .map_err(|e| BrowserError::Other(format!("Failed to build device metrics: {}", e)))
}

/// Options for opening a browser session from the CLI
#[derive(Debug, Clone)]
pub struct LaunchOptions {
    pub browser: BrowserKind,
    pub headless: bool,
    pub no_sandbox: bool,
    pub chrome_path: Option<String>,
    pub debug_port: Option<u16>,
    /// Send desktop browser headers and user agent
    pub stealth: bool,
}

impl Default for LaunchOptions {
    fn default() -> Self {
        let is_ci = is_ci_environment();
        Self {
            browser: BrowserKind::Chrome,
            headless: true,
            no_sandbox: is_ci, // CI environments typically need --no-sandbox
            chrome_path: None,
            debug_port: None,
            stealth: false,
        }
    }
}

fn is_ci_environment() -> bool {
    std::env::var("CI").is_ok()
        || std::env::var("GITHUB_ACTIONS").is_ok()
        || std::env::var("GITLAB_CI").is_ok()
        || std::env::var("JENKINS_HOME").is_ok()
        || std::env::var("CIRCLECI").is_ok()
}

/// Prefix bare hostnames with https://
pub fn normalize_url(url: &str) -> String {
    if !url.starts_with("http://")
        && !url.starts_with("https://")
        && !url.starts_with("file://")
        && !url.starts_with("about:")
        && !url.starts_with("data:")
    {
        log::debug!("Normalizing URL: {} -> https://{}", url, url);
        format!("https://{}", url)
    } else {
        url.to_string()
    }
}

impl ChromeDriver {
    /// Helper method to get the current active page, excluding Chrome's new-tab-page
    async fn get_active_page(&self) -> Result<chromiumoxide::page::Page> {
        let pages = self.browser.pages().await?;

        for page in pages.iter() {
            if let Ok(Some(url)) = page.url().await {
                if !url.starts_with("chrome://") {
                    return Ok(page.clone());
                }
            }
        }

        if let Some(page) = pages.last() {
            return Ok(page.clone());
        }

        self.browser
            .new_page("about:blank")
            .await
            .map_err(|e| BrowserError::Other(format!("Failed to create page: {}", e)))
    }

    /// Open a session according to CLI launch options
    pub async fn launch(options: &LaunchOptions) -> Result<Self> {
        if options.browser == BrowserKind::Firefox {
            return Err(BrowserError::LaunchFailed(
                "Firefox is not supported by the CDP driver, use --browser chrome".to_string(),
            ));
        }

        let mode = match options.debug_port {
            Some(port) => ConnectionMode::DebugPort(port),
            None => ConnectionMode::Sandboxed {
                chrome_path: options.chrome_path.clone(),
                no_sandbox: options.no_sandbox,
                headless: options.headless,
            },
        };

        Ok(Self::new(mode).await?.with_stealth(options.stealth))
    }

    pub fn with_stealth(mut self, stealth: bool) -> Self {
        self.stealth = stealth;
        self
    }

    async fn apply_stealth(&self, page: &chromiumoxide::page::Page) -> Result<()> {
        let user_agent = SetUserAgentOverrideParams::builder()
            .user_agent(STEALTH_USER_AGENT)
            .accept_language(STEALTH_ACCEPT_LANGUAGE)
            .build()
            .map_err(BrowserError::Other)?;
        page.execute(user_agent).await?;
        page.execute(SetExtraHttpHeadersParams::new(Headers::new(stealth_headers())))
            .await?;
        Ok(())
    }

    /// Create new ChromeDriver with specified connection mode
    pub async fn new(mode: ConnectionMode) -> Result<Self> {
        let owns_browser = mode.owns_browser();
        let (browser, temp_dir) = match mode {
            ConnectionMode::Sandboxed {
                chrome_path,
                no_sandbox,
                headless,
            } => {
                // Unique profile directory per run so parallel sessions never share state
                let unique_id = std::time::SystemTime::now()
                    .duration_since(std::time::UNIX_EPOCH)
                    .map(|d| d.as_nanos())
                    .unwrap_or_default();
                let temp_dir =
                    std::env::temp_dir().join(format!("goal-driven-test-{}", unique_id));
                std::fs::create_dir_all(&temp_dir).map_err(|e| {
                    BrowserError::LaunchFailed(format!("Failed to create temp directory: {}", e))
                })?;

                let mut config = if headless {
                    BrowserConfig::builder()
                } else {
                    BrowserConfig::builder().with_head()
                };

                config = config.user_data_dir(&temp_dir);

                if no_sandbox {
                    config = config.arg("--no-sandbox");
                }

                if let Some(path) = chrome_path {
                    config = config.chrome_executable(path);
                }

                let config = config.build().map_err(|e| {
                    BrowserError::LaunchFailed(format!(
                        "{}. \n\n\
                         Chrome not found. You can:\n\
                         - Install Chrome: https://www.google.com/chrome/\n\
                         - Ubuntu/Debian: sudo apt install chromium-browser\n\
                         - Or specify path: --chrome-path /path/to/chrome\n\
                         - Linux sandbox issue? Try: --no-sandbox",
                        e
                    ))
                })?;

                let (browser, mut handler) = Browser::launch(config)
                    .await
                    .map_err(|e| BrowserError::LaunchFailed(e.to_string()))?;

                tokio::spawn(async move {
                    while (handler.next().await).is_some() {
                        // Handle browser events
                    }
                });

                (browser, Some(temp_dir))
            }
            ConnectionMode::DebugPort(port) => {
                let url = format!("http://localhost:{}", port);
                let (browser, mut handler) = Browser::connect(&url).await.map_err(|e| {
                    BrowserError::ConnectionFailed(format!(
                        "Failed to connect to Chrome on port {}. \
                             Make sure Chrome is running with --remote-debugging-port={}: {}",
                        port, port, e
                    ))
                })?;

                tokio::spawn(async move {
                    while (handler.next().await).is_some() {
                        // Handle browser events
                    }
                });

                (browser, None)
            }
        };

        Ok(Self {
            browser,
            temp_dir,
            owns_browser,
            stealth: false,
            closed: false,
        })
    }

    async fn dispatch_mouse(&self, params: DispatchMouseEventParams) -> Result<()> {
        let page = self.get_active_page().await?;
        page.execute(params)
            .await
            .map_err(|e| BrowserError::InputFailed(e.to_string()))?;
        Ok(())
    }

    fn mouse_event(
        kind: DispatchMouseEventType,
        x: f64,
        y: f64,
    ) -> Result<DispatchMouseEventParams> {
        let builder = DispatchMouseEventParams::builder().r#type(kind.clone()).x(x).y(y);
        let builder = match kind {
            DispatchMouseEventType::MousePressed | DispatchMouseEventType::MouseReleased => {
                builder.button(MouseButton::Left).click_count(1)
            }
            _ => builder,
        };
        builder.build().map_err(BrowserError::InputFailed)
    }
}

#[async_trait]
impl BrowserSession for ChromeDriver {
    async fn navigate(&self, url: &str) -> Result<()> {
        let normalized_url = normalize_url(url);
        log::info!("🌐 Navigating to: {}", normalized_url);

        let page = self.get_active_page().await?;
        if self.stealth {
            self.apply_stealth(&page).await?;
        }

        let goto = async {
            page.goto(normalized_url.as_str()).await?;
            page.wait_for_navigation().await?;
            Ok::<_, chromiumoxide::error::CdpError>(())
        };

        match tokio::time::timeout(NAVIGATION_TIMEOUT, goto).await {
            Ok(Ok(())) => {
                log::debug!("✓ Navigation completed");
                Ok(())
            }
            Ok(Err(e)) => {
                let error_str = e.to_string();
                // "oneshot canceled" means the browser connection is dead
                if error_str.contains("oneshot canceled") {
                    Err(BrowserError::NavigationFailed(
                        "Browser connection lost. The browser may have been closed or crashed."
                            .to_string(),
                    ))
                } else {
                    Err(BrowserError::NavigationFailed(format!(
                        "Failed to navigate to {}: {}",
                        normalized_url, e
                    )))
                }
            }
            Err(_) => Err(BrowserError::NavigationFailed(format!(
                "Timed out after {}s loading {}",
                NAVIGATION_TIMEOUT.as_secs(),
                normalized_url
            ))),
        }
    }

    async fn set_viewport_size(&self, width: u32, height: u32) -> Result<()> {
        let page = self.get_active_page().await?;

        let params = SetDeviceMetricsOverrideParams::builder()
            .width(width as i64)
            .height(height as i64)
            .device_scale_factor(1.0)
            .mobile(false)
            .build()
            .map_err(|e| BrowserError::Other(format!("Failed to build viewport params: {}", e)))?;
        page.execute(params).await?;

        log::debug!("Viewport set to {}x{}", width, height);
        Ok(())
    }

    async fn emulate_device(&self, device: &DeviceProfile) -> Result<()> {
        let page = self.get_active_page().await?;

        page.execute(device_metrics(device)?).await?;
        page.execute(SetTouchEmulationEnabledParams::new(device.touch))
            .await?;
        page.execute(SetUserAgentOverrideParams::new(device.user_agent))
            .await?;

        log::debug!(
            "Emulating {} ({}x{} @{}x)",
            device.name,
            device.width,
            device.height,
            device.device_scale_factor
        );
        Ok(())
    }

    async fn execute_script(&self, source: &str) -> Result<String> {
        let page = self.get_active_page().await?;

        let result = page
            .evaluate(source)
            .await
            .map_err(|e| BrowserError::ScriptFailed(e.to_string()))?;

        Ok(match result.value() {
            Some(serde_json::Value::String(text)) => text.clone(),
            Some(value) => value.to_string(),
            None => String::new(),
        })
    }

    async fn screenshot(&self) -> Result<Vec<u8>> {
        let page = self.get_active_page().await?;

        page.screenshot(chromiumoxide::page::ScreenshotParams::default())
            .await
            .map_err(|e| BrowserError::ScreenshotFailed(e.to_string()))
    }

    async fn pointer_click(&self, x: f64, y: f64) -> Result<()> {
        log::debug!("Clicking at ({:.0}, {:.0})", x, y);
        self.dispatch_mouse(Self::mouse_event(DispatchMouseEventType::MouseMoved, x, y)?)
            .await?;
        self.dispatch_mouse(Self::mouse_event(DispatchMouseEventType::MousePressed, x, y)?)
            .await?;
        self.dispatch_mouse(Self::mouse_event(DispatchMouseEventType::MouseReleased, x, y)?)
            .await
    }

    async fn scroll_from_origin(&self, origin: Option<Point>, dx: f64, dy: f64) -> Result<()> {
        match origin {
            Some(origin) => {
                log::debug!(
                    "Wheel scroll ({}, {}) at ({:.0}, {:.0})",
                    dx,
                    dy,
                    origin.x,
                    origin.y
                );
                self.dispatch_mouse(Self::mouse_event(
                    DispatchMouseEventType::MouseMoved,
                    origin.x,
                    origin.y,
                )?)
                .await?;

                let wheel = DispatchMouseEventParams::builder()
                    .r#type(DispatchMouseEventType::MouseWheel)
                    .x(origin.x)
                    .y(origin.y)
                    .delta_x(dx)
                    .delta_y(dy)
                    .build()
                    .map_err(BrowserError::InputFailed)?;
                self.dispatch_mouse(wheel).await
            }
            None => {
                log::debug!("Page scroll ({}, {})", dx, dy);
                let script = format!(
                    "(function() {{ window.scrollBy({}, {}); return window.scrollY; }})()",
                    dx, dy
                );
                self.execute_script(&script)
                    .await
                    .map(|_| ())
                    .map_err(|e| BrowserError::InputFailed(e.to_string()))
            }
        }
    }

    async fn viewport_size(&self) -> Result<Viewport> {
        let output = self
            .execute_script(
                "JSON.stringify({ width: window.innerWidth, height: window.innerHeight })",
            )
            .await?;

        serde_json::from_str(&output)
            .map_err(|e| BrowserError::ScriptFailed(format!("Invalid viewport size: {}", e)))
    }

    async fn current_url(&self) -> Result<String> {
        let page = self.get_active_page().await?;

        page.url()
            .await
            .map_err(|e| BrowserError::Other(e.to_string()))?
            .ok_or(BrowserError::NoPage)
    }

    async fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;

        if !self.owns_browser {
            log::info!("Disconnecting from Chrome, leaving it running");
            return Ok(());
        }

        self.browser
            .close()
            .await
            .map_err(|e| BrowserError::Other(e.to_string()))?;
        Ok(())
    }
}

impl Drop for ChromeDriver {
    fn drop(&mut self) {
        if let Some(temp_dir) = &self.temp_dir {
            if temp_dir.exists() {
                let _ = std::fs::remove_dir_all(temp_dir);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_url() {
        assert_eq!(normalize_url("example.com"), "https://example.com");
        assert_eq!(normalize_url("http://localhost:8080"), "http://localhost:8080");
        assert_eq!(normalize_url("about:blank"), "about:blank");
        assert_eq!(normalize_url("file:///tmp/a.html"), "file:///tmp/a.html");
    }

    #[test]
    fn test_mouse_event_press_has_button() {
        let params =
            ChromeDriver::mouse_event(DispatchMouseEventType::MousePressed, 10.0, 20.0).unwrap();
        assert_eq!(params.button, Some(MouseButton::Left));
        assert_eq!(params.click_count, Some(1));

        let params =
            ChromeDriver::mouse_event(DispatchMouseEventType::MouseMoved, 10.0, 20.0).unwrap();
        assert!(params.button.is_none());
    }

    #[test]
    fn test_only_launched_browsers_are_shut_down() {
        let launched = ConnectionMode::Sandboxed {
            chrome_path: None,
            no_sandbox: true,
            headless: true,
        };
        assert!(launched.owns_browser());
        assert!(!ConnectionMode::DebugPort(9222).owns_browser());
    }

    #[test]
    fn test_device_metrics_follow_profile() {
        let device = crate::browser::find_device("iPad Mini landscape").unwrap();
        let params = device_metrics(device).unwrap();
        assert_eq!(params.width, 1024);
        assert_eq!(params.height, 768);
        assert_eq!(params.device_scale_factor, 2.0);
        assert!(params.mobile);
    }

    #[test]
    fn test_stealth_headers() {
        let headers = stealth_headers();
        assert_eq!(headers["upgrade-insecure-requests"], "1");
        assert!(headers["accept"].as_str().unwrap().starts_with("text/html"));
        assert!(STEALTH_USER_AGENT.contains("Chrome/"));
    }

    #[tokio::test]
    async fn test_firefox_is_rejected() {
        let options = LaunchOptions {
            browser: BrowserKind::Firefox,
            ..Default::default()
        };

        match ChromeDriver::launch(&options).await {
            Err(BrowserError::LaunchFailed(msg)) => assert!(msg.contains("Firefox")),
            _ => panic!("Firefox launch should fail"),
        }
    }
}
