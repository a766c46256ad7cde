#[cfg(not(target_os = "android"))]
use anyhow::Result;
#[cfg(not(target_os = "android"))]
use clap::Parser;

#[cfg(not(target_os = "android"))]
use ember_app::{config, run};
#[cfg(not(target_os = "android"))]
use ember_platform::winit::event_loop::EventLoop;
#[cfg(not(target_os = "android"))]
use ember_platform::ActivePlatform;

#[cfg(not(target_os = "android"))]
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Override the resource directory from ember.toml
    #[arg(long)]
    resource_dir: Option<String>,

    /// Skip the validation layer even when ember.toml requests it
    #[arg(long)]
    no_validation: bool,
}

#[cfg(target_os = "android")]
fn main() {
    // Android enters through ember_app::android_main in the cdylib.
}

#[cfg(not(target_os = "android"))]
fn main() -> Result<()> {
    let args = Args::parse();
    let mut cfg = config::load();
    if let Some(dir) = args.resource_dir {
        cfg.resource_dir = dir;
    }
    if args.no_validation {
        cfg.validation = false;
    }

    let platform = ActivePlatform::new(cfg.resource_dir.clone());
    let event_loop = EventLoop::new()?;
    run(event_loop, platform, cfg)
}
