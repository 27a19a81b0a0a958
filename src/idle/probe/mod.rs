//! Platform probes reporting how long the user hasn't touched keyboard or mouse.
//! [detect_probe] picks whatever the build supports and reports `None` when nothing does.

#[cfg(feature = "win")]
pub mod win;
#[cfg(feature = "x11")]
pub mod x11;

#[cfg(feature = "win")]
extern crate windows;

#[cfg(feature = "x11")]
extern crate xcb;

use anyhow::Result;
#[cfg(test)]
use mockall::automock;

/// Contract each platform implements.
#[cfg_attr(test, automock)]
pub trait IdleProbe: Send {
    /// Retrieve amount of time user has been inactive in milliseconds
    fn idle_time(&mut self) -> Result<u32>;
}

/// Returns the probe for the current platform, or `None` when idle detection isn't available.
/// Callers treat `None` as the feature being switched off.
pub fn detect_probe() -> Option<Box<dyn IdleProbe>> {
    cfg_if::cfg_if! {
        if #[cfg(feature = "win")] {
            Some(Box::new(win::WindowsIdleProbe::new()))
        }
        else if #[cfg(feature = "x11")] {
            match x11::X11IdleProbe::new() {
                Ok(probe) => Some(Box::new(probe)),
                Err(e) => {
                    tracing::warn!("X11 idle probe unavailable {e:?}");
                    None
                }
            }
        }
        else {
            tracing::info!("Built without an idle probe");
            None
        }
    }
}
