use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use tracing::debug;

use crate::Platform;

/// Desktop host: resources live under a fixed directory on disk.
pub struct DesktopPlatform {
    resource_root: PathBuf,
}

impl DesktopPlatform {
    pub fn new(resource_root: impl Into<PathBuf>) -> Self {
        Self {
            resource_root: resource_root.into(),
        }
    }
}

impl Platform for DesktopPlatform {
    fn init(&self) -> Result<()> {
        ember_core::init_tracing();
        debug!("desktop platform ready, resources at {}", self.resource_root.display());
        Ok(())
    }

    fn read_resource(&self, name: &str) -> Result<Vec<u8>> {
        let path = self.resource_root.join(name);
        fs::read(&path).with_context(|| format!("read resource {}", path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn reads_file_under_resource_root() {
        let root = std::env::temp_dir().join(format!("ember-res-{}", std::process::id()));
        fs::create_dir_all(root.join("shaders")).unwrap();
        let mut f = fs::File::create(root.join("shaders/vert.spv")).unwrap();
        f.write_all(&[1, 2, 3, 4]).unwrap();

        let platform = DesktopPlatform::new(&root);
        let bytes = platform.read_resource("shaders/vert.spv").unwrap();
        assert_eq!(bytes, vec![1, 2, 3, 4]);

        fs::remove_dir_all(&root).ok();
    }

    #[test]
    fn missing_file_is_an_error() {
        let platform = DesktopPlatform::new("/nonexistent-ember-root");
        assert!(platform.read_resource("shaders/vert.spv").is_err());
    }
}
