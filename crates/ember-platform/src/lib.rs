//! Platform event source: one capability set, one concrete implementation
//! per target, picked at compile time.
//!
//! The contract is deliberately small: set up the local log sink, pump all
//! currently queued OS/runtime events without blocking, and load a named
//! resource fully into memory. Everything else (window handles, lifecycle
//! callbacks) flows through winit's handler types, which this crate
//! re-exports for the rest of the workspace.
#![deny(unsafe_op_in_unsafe_fn)]

use std::time::Duration;

use anyhow::Result;
use winit::application::ApplicationHandler;
use winit::event_loop::EventLoop;
use winit::platform::pump_events::EventLoopExtPumpEvents;

pub use winit;
pub use winit::platform::pump_events::PumpStatus;

#[cfg(not(target_os = "android"))]
mod desktop;
#[cfg(not(target_os = "android"))]
pub use desktop::DesktopPlatform;
#[cfg(not(target_os = "android"))]
pub type ActivePlatform = DesktopPlatform;

#[cfg(target_os = "android")]
mod android;
#[cfg(target_os = "android")]
pub use android::AndroidPlatform;
#[cfg(target_os = "android")]
pub type ActivePlatform = AndroidPlatform;

/// Capabilities every host platform provides to the frame driver.
pub trait Platform {
    /// One-time platform setup: installs the local log sink.
    fn init(&self) -> Result<()>;

    /// Load a named resource fully into memory.
    ///
    /// Desktop resolves relative to the configured resource root and fails
    /// when the file cannot be read. Android resolves through the app
    /// bundle's asset store and yields an empty buffer (with a logged
    /// diagnostic) when the asset is missing.
    fn read_resource(&self, name: &str) -> Result<Vec<u8>>;
}

/// Drain every currently queued platform event, dispatching the handler's
/// callbacks synchronously, and return once the queue is empty. Never
/// blocks waiting for new events.
pub fn pump_events<A: ApplicationHandler>(event_loop: &mut EventLoop<()>, app: &mut A) -> PumpStatus {
    event_loop.pump_app_events(Some(Duration::ZERO), app)
}
