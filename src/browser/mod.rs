pub mod chrome;
pub mod devices;
pub mod elements;
pub mod screenshot;

use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub use chrome::{ChromeDriver, ConnectionMode, LaunchOptions};
pub use devices::{find_device, DeviceProfile, DEFAULT_DEVICE, KNOWN_DEVICES};
pub use elements::{ElementRecord, ElementRegistry};

/// Viewport dimensions in CSS pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

impl Viewport {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Clamp a point into `[0, width] x [0, height]`
    pub fn clamp(&self, point: Point) -> Point {
        Point {
            x: point.x.clamp(0.0, self.width as f64),
            y: point.y.clamp(0.0, self.height as f64),
        }
    }

    pub fn contains(&self, point: Point) -> bool {
        (0.0..=self.width as f64).contains(&point.x) && (0.0..=self.height as f64).contains(&point.y)
    }
}

impl Default for Viewport {
    fn default() -> Self {
        Self::new(1024, 768)
    }
}

/// Absolute viewport-relative pixel coordinates
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// The browser primitives the agent needs from a driver.
///
/// Every call is a round trip to the browser; all of them fail with a
/// [`BrowserError`](crate::error::BrowserError).
#[async_trait]
pub trait BrowserSession: Send + Sync {
    /// Navigate the active page to `url` and wait for the load event
    async fn navigate(&self, url: &str) -> Result<()>;

    /// Force the layout viewport to the given size
    async fn set_viewport_size(&self, width: u32, height: u32) -> Result<()>;

    /// Emulate a device. Drivers without device metrics only get its viewport.
    async fn emulate_device(&self, device: &DeviceProfile) -> Result<()> {
        self.set_viewport_size(device.width, device.height).await
    }

    /// Evaluate `source` in the page and return the result as text.
    /// String results are returned as-is, anything else as JSON.
    async fn execute_script(&self, source: &str) -> Result<String>;

    /// Capture the visible viewport as PNG bytes
    async fn screenshot(&self) -> Result<Vec<u8>>;

    /// Move the pointer to `(x, y)` and click the primary button
    async fn pointer_click(&self, x: f64, y: f64) -> Result<()>;

    /// Scroll by `(dx, dy)` pixels. With an origin the wheel event is
    /// dispatched at that point; without one the page itself is scrolled.
    async fn scroll_from_origin(&self, origin: Option<Point>, dx: f64, dy: f64) -> Result<()>;

    async fn viewport_size(&self) -> Result<Viewport>;

    async fn current_url(&self) -> Result<String>;

    /// Release the browser. Safe to call once per session.
    async fn close(&mut self) -> Result<()>;
}
