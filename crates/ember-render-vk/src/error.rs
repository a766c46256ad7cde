use ash::vk;
use thiserror::Error;

/// A bootstrap stage failure. Every variant is fatal to the run: the
/// sequencer stops at the first error and the caller tears the process
/// down. Nothing here is retried.
#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error("failed to load the Vulkan library: {0}")]
    Loader(#[from] ash::LoadingError),

    #[error("no compatible Vulkan driver found")]
    IncompatibleDriver,

    #[error("no Vulkan-capable device present")]
    NoAdapters,

    #[error("no queue family supports graphics")]
    NoGraphicsQueue,

    #[error("no queue family can present to the surface")]
    NoPresentQueue,

    #[error("surface reports no supported formats")]
    NoSurfaceFormats,

    #[error("surface reports no supported present modes")]
    NoPresentModes,

    #[error("shader binary {0} is missing or empty")]
    ShaderBlob(&'static str),

    #[error("{stage}: {result}")]
    Api {
        stage: &'static str,
        result: vk::Result,
    },
}

impl BootstrapError {
    pub(crate) fn api(stage: &'static str) -> impl FnOnce(vk::Result) -> Self {
        move |result| Self::Api { stage, result }
    }
}
