use serde::{Deserialize, Serialize};

/// Device families whose front cameras differ in texture size and orientation.
///
/// The Apple family draws the overlay as-is; every other family needs the
/// overlay mirrored horizontally to line up with the front camera feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlatformFamily {
    Apple,
    Other,
}

impl PlatformFamily {
    pub fn current() -> Self {
        #[cfg(any(target_os = "macos", target_os = "ios"))]
        {
            PlatformFamily::Apple
        }
        #[cfg(not(any(target_os = "macos", target_os = "ios")))]
        {
            PlatformFamily::Other
        }
    }

    /// Camera capture resolution `(width, height)` requested from the driver.
    pub fn texture_dims(self) -> (u32, u32) {
        match self {
            PlatformFamily::Apple => (1080, 1920),
            PlatformFamily::Other => (1600, 1200),
        }
    }

    pub fn mirrors_overlay(self) -> bool {
        matches!(self, PlatformFamily::Other)
    }
}
