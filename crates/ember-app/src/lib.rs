//! Frame driver: owns the run-state machine and the pump/draw loop.
//!
//! One logical thread drives everything. Each tick pumps all queued
//! platform events (callbacks may raise the exit flag or, on Android,
//! trigger the one-time lazy bootstrap once a window exists), then draws
//! one frame unless exit was just raised. Teardown waits for the device
//! to idle and releases every handle in reverse creation order.
#![deny(unsafe_op_in_unsafe_fn)]

use anyhow::{Context, Result};
use tracing::{error, info};

use ember_platform::winit::{
    application::ApplicationHandler,
    dpi::LogicalSize,
    event::WindowEvent,
    event_loop::{ActiveEventLoop, EventLoop},
    window::{Window, WindowId},
};
use ember_platform::{pump_events, ActivePlatform, Platform, PumpStatus};
use ember_render_vk::{BootstrapConfig, PipelineConfig, RenderContext, SurfaceSize};

pub mod config;
mod lifecycle;

pub use config::AppConfig;
pub use lifecycle::{LifeCycle, Phase};

/// Winit-facing driver state. Field order matters for drop: the render
/// context must release its surface before the window goes away.
struct Shell {
    platform: ActivePlatform,
    cfg: AppConfig,
    lifecycle: LifeCycle,
    renderer: Option<RenderContext>,
    window: Option<Window>,
    bootstrap_error: Option<anyhow::Error>,
}

impl Shell {
    fn new(platform: ActivePlatform, cfg: AppConfig) -> Self {
        Shell {
            platform,
            cfg,
            lifecycle: LifeCycle::new(),
            renderer: None,
            window: None,
            bootstrap_error: None,
        }
    }

    fn try_bootstrap(&mut self, event_loop: &ActiveEventLoop) -> Result<()> {
        let attrs = Window::default_attributes()
            .with_title("ember")
            .with_inner_size(LogicalSize::new(self.cfg.width as f64, self.cfg.height as f64));
        let window = event_loop.create_window(attrs).context("create_window")?;

        let inner = window.inner_size();
        let size = SurfaceSize {
            width: inner.width.max(1),
            height: inner.height.max(1),
        };
        let bootstrap_cfg = BootstrapConfig {
            validation: self.cfg.validation,
            pipeline: PipelineConfig {
                depth_test: self.cfg.depth_test,
                blend: self.cfg.blend,
            },
        };
        let platform = &self.platform;
        let load = move |name: &str| platform.read_resource(name);
        let ctx = RenderContext::bootstrap(&window, &window, size, &bootstrap_cfg, &load)?;
        info!(
            "render context ready: {}x{}, {} images, queue families {:?}",
            ctx.extent().width,
            ctx.extent().height,
            ctx.image_count(),
            ctx.queue_families(),
        );

        self.renderer = Some(ctx);
        self.window = Some(window);
        Ok(())
    }
}

impl ApplicationHandler for Shell {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        // Desktop reaches this immediately; Android only once the native
        // window exists. Either way the bootstrap runs at most once.
        if !self.lifecycle.begin_bootstrap() {
            return;
        }
        info!("bootstrapping render context");
        match self.try_bootstrap(event_loop) {
            Ok(()) => self.lifecycle.bootstrap_succeeded(),
            Err(e) => {
                error!("bootstrap failed: {e:#}");
                self.bootstrap_error = Some(e);
                self.lifecycle.bootstrap_failed();
                event_loop.exit();
            }
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, window_id: WindowId, event: WindowEvent) {
        if let Some(window) = &self.window {
            if window_id != window.id() {
                return;
            }
        }
        match event {
            WindowEvent::CloseRequested | WindowEvent::Destroyed => {
                info!("window closing, requesting exit");
                self.lifecycle.request_exit();
                event_loop.exit();
            }
            _ => {}
        }
    }

    fn suspended(&mut self, event_loop: &ActiveEventLoop) {
        // The mobile lifecycle destroys the native window here; without a
        // swapchain recreation path this session cannot continue.
        if self.lifecycle.phase() == Phase::Running {
            info!("surface destroyed, requesting exit");
            self.lifecycle.request_exit();
            event_loop.exit();
        }
    }
}

/// Drive the session to completion: bootstrap (via the first `resumed`
/// callback), then pump-and-draw until the exit flag is raised, then
/// tear down in reverse creation order.
pub fn run(mut event_loop: EventLoop<()>, platform: ActivePlatform, cfg: AppConfig) -> Result<()> {
    platform.init()?;
    let mut shell = Shell::new(platform, cfg);

    loop {
        if let PumpStatus::Exit(code) = pump_events(&mut event_loop, &mut shell) {
            info!("event loop exited with code {code}");
            shell.lifecycle.request_exit();
        }
        if shell.lifecycle.exit_requested() {
            break;
        }
        if shell.lifecycle.should_draw() {
            if let Some(ctx) = shell.renderer.as_mut() {
                ctx.draw_frame()?;
            }
        }
    }

    shell.lifecycle.begin_shutdown();
    // Device-idle wait and reverse-order handle release happen in the
    // render context's Drop; the window must outlive it.
    shell.renderer = None;
    shell.window = None;
    shell.lifecycle.finish_shutdown();

    if let Some(e) = shell.bootstrap_error.take() {
        return Err(e);
    }
    info!("goodbye");
    Ok(())
}

#[cfg(target_os = "android")]
#[no_mangle]
pub fn android_main(app: ember_platform::winit::platform::android::activity::AndroidApp) {
    use ember_platform::winit::platform::android::EventLoopBuilderExtAndroid;

    let platform = ActivePlatform::new(app.clone());
    let result = EventLoop::builder()
        .with_android_app(app)
        .build()
        .map_err(anyhow::Error::from)
        .and_then(|event_loop| run(event_loop, platform, AppConfig::default()));
    if let Err(e) = result {
        error!("fatal: {e:#}");
    }
}
