//! Known devices for `--emulate`. Metrics and user agents follow the device
//! descriptors shipped with Puppeteer so runs are comparable across tools.

use super::Viewport;
use serde::Serialize;

pub const DEFAULT_DEVICE: &str = "iPad Mini landscape";

const IPAD_UA: &str = "Mozilla/5.0 (iPad; CPU OS 11_0 like Mac OS X) AppleWebKit/604.1.34 (KHTML, like Gecko) Version/11.0 Mobile/15A5341f Safari/604.1";
const IPHONE_UA: &str = "Mozilla/5.0 (iPhone; CPU iPhone OS 15_0 like Mac OS X) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/15.0 Mobile/15E148 Safari/604.1";
const PIXEL_UA: &str = "Mozilla/5.0 (Linux; Android 11; Pixel 5) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/90.0.4412.0 Mobile Safari/537.36";
const GALAXY_UA: &str = "Mozilla/5.0 (Linux; Android 8.0.0; SM-G965U Build/R16NW) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/90.0.4412.0 Mobile Safari/537.36";

/// Screen metrics and identity of an emulated device
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DeviceProfile {
    pub name: &'static str,
    pub width: u32,
    pub height: u32,
    pub device_scale_factor: f64,
    pub mobile: bool,
    pub touch: bool,
    pub user_agent: &'static str,
}

impl DeviceProfile {
    pub fn viewport(&self) -> Viewport {
        Viewport::new(self.width, self.height)
    }
}

const fn device(
    name: &'static str,
    width: u32,
    height: u32,
    device_scale_factor: f64,
    user_agent: &'static str,
) -> DeviceProfile {
    DeviceProfile {
        name,
        width,
        height,
        device_scale_factor,
        mobile: true,
        touch: true,
        user_agent,
    }
}

pub const KNOWN_DEVICES: &[DeviceProfile] = &[
    device("iPad Mini", 768, 1024, 2.0, IPAD_UA),
    device("iPad Mini landscape", 1024, 768, 2.0, IPAD_UA),
    device("iPad Pro", 1024, 1366, 2.0, IPAD_UA),
    device("iPad Pro landscape", 1366, 1024, 2.0, IPAD_UA),
    device("iPhone 13", 390, 844, 3.0, IPHONE_UA),
    device("iPhone 13 landscape", 844, 390, 3.0, IPHONE_UA),
    device("Pixel 5", 393, 851, 2.75, PIXEL_UA),
    device("Pixel 5 landscape", 851, 393, 2.75, PIXEL_UA),
    device("Galaxy S9+", 320, 658, 4.5, GALAXY_UA),
    device("Galaxy S9+ landscape", 658, 320, 4.5, GALAXY_UA),
];

/// Look a device up by name, ignoring case
pub fn find_device(name: &str) -> Option<&'static DeviceProfile> {
    KNOWN_DEVICES
        .iter()
        .find(|device| device.name.eq_ignore_ascii_case(name.trim()))
}
