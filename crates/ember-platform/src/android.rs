use std::ffi::CString;
use std::io::Read;

use android_activity::AndroidApp;
use anyhow::{Context, Result};
use tracing::warn;

use crate::Platform;

/// Android host: resources come out of the app bundle's asset store.
pub struct AndroidPlatform {
    app: AndroidApp,
}

impl AndroidPlatform {
    pub fn new(app: AndroidApp) -> Self {
        Self { app }
    }
}

impl Platform for AndroidPlatform {
    fn init(&self) -> Result<()> {
        android_logger::init_once(
            android_logger::Config::default()
                .with_max_level(log::LevelFilter::Info)
                .with_tag("ember"),
        );
        Ok(())
    }

    fn read_resource(&self, name: &str) -> Result<Vec<u8>> {
        let cname = CString::new(name).context("asset name contains NUL")?;
        let Some(mut asset) = self.app.asset_manager().open(&cname) else {
            // A missing asset is reported to the caller as an empty blob;
            // the consumer decides whether that is fatal.
            warn!("asset not found: {name}");
            return Ok(Vec::new());
        };
        let mut buf = Vec::new();
        asset
            .read_to_end(&mut buf)
            .with_context(|| format!("read asset {name}"))?;
        Ok(buf)
    }
}
