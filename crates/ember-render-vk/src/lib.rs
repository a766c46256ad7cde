//! Vulkan device bootstrap and the steady-state frame protocol.
//!
//! [`RenderContext`] owns every Vulkan handle of one renderable session.
//! It is built by an ordered sequence of stages, each depending on state
//! produced by its predecessors; the first stage failure aborts the whole
//! bootstrap with a typed [`BootstrapError`]. Once built, the context is
//! driven one frame at a time by [`RenderContext::draw_frame`], with a
//! single in-flight frame gated by one fence. Teardown releases all
//! handles in strict reverse creation order after a device-idle wait.

use std::io::Cursor;
use std::os::raw::c_char;

use anyhow::{Context as _, Result};
use ash::khr::{surface, swapchain};
use ash::util::read_spv;
use ash::{vk, Entry, Instance};
use raw_window_handle::{HasDisplayHandle, HasWindowHandle, RawDisplayHandle, RawWindowHandle};
use tracing::{info, warn};

mod error;
mod policy;

pub use error::BootstrapError;
pub use policy::{
    choose_extent, choose_image_count, choose_present_mode, choose_surface_format, pick_adapter,
    pick_queue_families, QueueFamilies, QueueFamilyCaps,
};

const VERT_SHADER: &str = "shaders/vert.spv";
const FRAG_SHADER: &str = "shaders/frag.spv";

/// Bound on how long one image acquire may block (1 s). The per-frame
/// fence wait is unbounded by design.
const ACQUIRE_TIMEOUT_NS: u64 = 1_000_000_000;

/// Loads a named resource (a SPIR-V blob) fully into memory. Supplied by
/// the host platform.
pub type ResourceLoader<'a> = dyn Fn(&str) -> Result<Vec<u8>> + 'a;

#[derive(Clone, Copy, Debug)]
pub struct SurfaceSize {
    pub width: u32,
    pub height: u32,
}

/// Fixed-function toggles passed into pipeline creation.
#[derive(Clone, Copy, Debug, Default)]
pub struct PipelineConfig {
    pub depth_test: bool,
    pub blend: bool,
}

#[derive(Clone, Copy, Debug, Default)]
pub struct BootstrapConfig {
    pub validation: bool,
    pub pipeline: PipelineConfig,
}

/// Every Vulkan handle of one renderable session, in creation order.
pub struct RenderContext {
    _entry: Entry,
    instance: Instance,
    surface_loader: surface::Instance,
    surface: vk::SurfaceKHR,

    phys: vk::PhysicalDevice,
    device: ash::Device,
    families: QueueFamilies,
    present_queue: vk::Queue,

    swapchain_loader: swapchain::Device,
    swapchain: vk::SwapchainKHR,
    extent: vk::Extent2D,
    images: Vec<vk::Image>,
    image_views: Vec<vk::ImageView>,

    render_pass: vk::RenderPass,
    vert_module: vk::ShaderModule,
    frag_module: vk::ShaderModule,
    pipeline_layout: vk::PipelineLayout,
    pipeline: vk::Pipeline,
    framebuffers: Vec<vk::Framebuffer>,

    cmd_pool: vk::CommandPool,
    cmd_bufs: Vec<vk::CommandBuffer>,

    image_acquired: vk::Semaphore,
    render_finished: vk::Semaphore,
    in_flight: vk::Fence,
}

impl RenderContext {
    /// Run the full bootstrap sequence against the given window. Any
    /// stage failure aborts the sequence; the caller treats it as a
    /// fatal startup error.
    pub fn bootstrap(
        window: &dyn HasWindowHandle,
        display: &dyn HasDisplayHandle,
        size: SurfaceSize,
        cfg: &BootstrapConfig,
        load: &ResourceLoader<'_>,
    ) -> Result<Self, BootstrapError> {
        unsafe { build_context(window, display, size, cfg, load) }
    }

    pub fn adapter(&self) -> vk::PhysicalDevice {
        self.phys
    }

    pub fn extent(&self) -> vk::Extent2D {
        self.extent
    }

    /// Number of images the swapchain actually returned; every per-image
    /// collection has this length.
    pub fn image_count(&self) -> usize {
        self.images.len()
    }

    pub fn queue_families(&self) -> QueueFamilies {
        self.families
    }

    /// Submit and present one frame.
    ///
    /// Protocol: wait on the single in-flight fence (unbounded) and reset
    /// it, acquire the next swapchain image (bounded), re-record that
    /// image's command buffer from scratch, submit waiting on the
    /// image-acquired semaphore, then present waiting on render-finished.
    /// A non-success present result is logged and otherwise ignored.
    pub fn draw_frame(&mut self) -> Result<()> {
        unsafe {
            self.device
                .wait_for_fences(&[self.in_flight], true, u64::MAX)
                .context("wait_for_fences")?;
            self.device
                .reset_fences(&[self.in_flight])
                .context("reset_fences")?;

            let (image_index, suboptimal) = self
                .swapchain_loader
                .acquire_next_image(
                    self.swapchain,
                    ACQUIRE_TIMEOUT_NS,
                    self.image_acquired,
                    vk::Fence::null(),
                )
                .context("acquire_next_image")?;
            if suboptimal {
                warn!("acquired swapchain image is suboptimal");
            }

            let cmd = self.cmd_bufs[image_index as usize];
            self.record_triangle(cmd, self.framebuffers[image_index as usize])?;

            let wait_stage = vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT;
            let submit = vk::SubmitInfo {
                s_type: vk::StructureType::SUBMIT_INFO,
                wait_semaphore_count: 1,
                p_wait_semaphores: &self.image_acquired,
                p_wait_dst_stage_mask: &wait_stage,
                command_buffer_count: 1,
                p_command_buffers: &cmd,
                signal_semaphore_count: 1,
                p_signal_semaphores: &self.render_finished,
                ..Default::default()
            };
            self.device
                .queue_submit(self.present_queue, &[submit], self.in_flight)
                .context("queue_submit")?;

            let present = vk::PresentInfoKHR {
                s_type: vk::StructureType::PRESENT_INFO_KHR,
                wait_semaphore_count: 1,
                p_wait_semaphores: &self.render_finished,
                swapchain_count: 1,
                p_swapchains: &self.swapchain,
                p_image_indices: &image_index,
                ..Default::default()
            };
            match self.swapchain_loader.queue_present(self.present_queue, &present) {
                Ok(false) => {}
                Ok(true) => warn!("present reported suboptimal swapchain"),
                Err(e) => warn!("queue_present: {e}"),
            }
        }
        Ok(())
    }

    /// Record the fixed triangle pass into `cmd`. Beginning the buffer
    /// resets it (the pool was created with RESET_COMMAND_BUFFER).
    unsafe fn record_triangle(&self, cmd: vk::CommandBuffer, framebuffer: vk::Framebuffer) -> Result<()> {
        let begin = vk::CommandBufferBeginInfo {
            s_type: vk::StructureType::COMMAND_BUFFER_BEGIN_INFO,
            ..Default::default()
        };
        self.device
            .begin_command_buffer(cmd, &begin)
            .context("begin_command_buffer")?;

        let clear = vk::ClearValue {
            color: vk::ClearColorValue {
                float32: [0.0, 0.0, 0.0, 1.0],
            },
        };
        let rp_begin = vk::RenderPassBeginInfo {
            s_type: vk::StructureType::RENDER_PASS_BEGIN_INFO,
            render_pass: self.render_pass,
            framebuffer,
            render_area: vk::Rect2D {
                offset: vk::Offset2D { x: 0, y: 0 },
                extent: self.extent,
            },
            clear_value_count: 1,
            p_clear_values: &clear,
            ..Default::default()
        };
        self.device
            .cmd_begin_render_pass(cmd, &rp_begin, vk::SubpassContents::INLINE);
        self.device
            .cmd_bind_pipeline(cmd, vk::PipelineBindPoint::GRAPHICS, self.pipeline);

        // Viewport and line width are the only dynamic pipeline states.
        let viewport = vk::Viewport {
            x: 0.0,
            y: 0.0,
            width: self.extent.width as f32,
            height: self.extent.height as f32,
            min_depth: 0.0,
            max_depth: 1.0,
        };
        self.device.cmd_set_viewport(cmd, 0, std::slice::from_ref(&viewport));
        self.device.cmd_set_line_width(cmd, 1.0);

        // The vertex shader synthesizes the triangle; no vertex buffer.
        self.device.cmd_draw(cmd, 3, 1, 0, 0);

        self.device.cmd_end_render_pass(cmd);
        self.device
            .end_command_buffer(cmd)
            .context("end_command_buffer")?;
        Ok(())
    }
}

impl Drop for RenderContext {
    fn drop(&mut self) {
        unsafe {
            let d = &self.device;
            d.device_wait_idle().ok();

            d.destroy_pipeline(self.pipeline, None);
            d.destroy_pipeline_layout(self.pipeline_layout, None);
            d.destroy_fence(self.in_flight, None);
            d.destroy_semaphore(self.image_acquired, None);
            d.destroy_semaphore(self.render_finished, None);
            d.destroy_command_pool(self.cmd_pool, None);
            d.destroy_shader_module(self.vert_module, None);
            d.destroy_shader_module(self.frag_module, None);
            for &fb in &self.framebuffers {
                d.destroy_framebuffer(fb, None);
            }
            for &iv in &self.image_views {
                d.destroy_image_view(iv, None);
            }
            d.destroy_render_pass(self.render_pass, None);
            self.swapchain_loader.destroy_swapchain(self.swapchain, None);
            self.surface_loader.destroy_surface(self.surface, None);
            d.destroy_device(None);
            self.instance.destroy_instance(None);
            info!("render context destroyed");
        }
    }
}

/// Stage 1: always request the surface extensions for this display;
/// enable the validation layer only when it is actually installed.
unsafe fn resolve_layers_and_extensions(
    entry: &Entry,
    display_raw: RawDisplayHandle,
    validation: bool,
) -> Result<(Vec<*const c_char>, Vec<*const c_char>), BootstrapError> {
    let extensions = ash_window::enumerate_required_extensions(display_raw)
        .map_err(BootstrapError::api("enumerate_required_extensions"))?
        .to_vec();

    let mut layers = Vec::new();
    if validation {
        let available = entry
            .enumerate_instance_layer_properties()
            .map_err(BootstrapError::api("enumerate_instance_layer_properties"))?;
        if policy::has_validation_layer(&available) {
            info!("enabling layer {:?}", policy::VALIDATION_LAYER);
            layers.push(policy::VALIDATION_LAYER.as_ptr());
        } else {
            warn!("validation layer not installed, continuing without it");
        }
    }
    Ok((layers, extensions))
}

/// Stage 2.
unsafe fn create_instance(
    entry: &Entry,
    layers: &[*const c_char],
    extensions: &[*const c_char],
) -> Result<Instance, BootstrapError> {
    let app_info = vk::ApplicationInfo {
        s_type: vk::StructureType::APPLICATION_INFO,
        p_application_name: c"ember".as_ptr(),
        application_version: 1,
        p_engine_name: c"ember".as_ptr(),
        engine_version: 1,
        api_version: vk::API_VERSION_1_0,
        ..Default::default()
    };
    let create_info = vk::InstanceCreateInfo {
        s_type: vk::StructureType::INSTANCE_CREATE_INFO,
        p_application_info: &app_info,
        enabled_layer_count: layers.len() as u32,
        pp_enabled_layer_names: layers.as_ptr(),
        enabled_extension_count: extensions.len() as u32,
        pp_enabled_extension_names: extensions.as_ptr(),
        ..Default::default()
    };
    match entry.create_instance(&create_info, None) {
        Ok(instance) => {
            info!("vulkan instance created");
            Ok(instance)
        }
        Err(vk::Result::ERROR_INCOMPATIBLE_DRIVER) => Err(BootstrapError::IncompatibleDriver),
        Err(e) => Err(BootstrapError::Api {
            stage: "create_instance",
            result: e,
        }),
    }
}

/// Stage 4: lone device wins, else first discrete, else last candidate.
unsafe fn select_physical_device(instance: &Instance) -> Result<vk::PhysicalDevice, BootstrapError> {
    let devices = instance
        .enumerate_physical_devices()
        .map_err(BootstrapError::api("enumerate_physical_devices"))?;
    info!("device count: {}", devices.len());

    let props: Vec<_> = devices
        .iter()
        .map(|&d| instance.get_physical_device_properties(d))
        .collect();
    let picked = pick_adapter(&props)?;
    info!(
        "chose device [{}]",
        props[picked]
            .device_name_as_c_str()
            .unwrap_or(c"unknown")
            .to_string_lossy()
    );
    Ok(devices[picked])
}

/// Stage 5: resolve the graphics/present families, then create the
/// logical device with one queue per distinct family and the swapchain
/// extension enabled.
unsafe fn create_logical_device(
    instance: &Instance,
    surface_loader: &surface::Instance,
    phys: vk::PhysicalDevice,
    surf: vk::SurfaceKHR,
) -> Result<(ash::Device, QueueFamilies, vk::Queue), BootstrapError> {
    let family_props = instance.get_physical_device_queue_family_properties(phys);
    let mut caps = Vec::with_capacity(family_props.len());
    for (i, f) in family_props.iter().enumerate() {
        let present = surface_loader
            .get_physical_device_surface_support(phys, i as u32, surf)
            .map_err(BootstrapError::api("get_physical_device_surface_support"))?;
        caps.push(QueueFamilyCaps {
            graphics: f.queue_flags.contains(vk::QueueFlags::GRAPHICS),
            present,
        });
    }
    let families = pick_queue_families(&caps)?;

    let priority = 1.0_f32;
    let queue_infos: Vec<vk::DeviceQueueCreateInfo> = families
        .distinct()
        .into_iter()
        .map(|family| vk::DeviceQueueCreateInfo {
            s_type: vk::StructureType::DEVICE_QUEUE_CREATE_INFO,
            queue_family_index: family,
            queue_count: 1,
            p_queue_priorities: &priority,
            ..Default::default()
        })
        .collect();

    let device_exts = [swapchain::NAME.as_ptr()];
    let create_info = vk::DeviceCreateInfo {
        s_type: vk::StructureType::DEVICE_CREATE_INFO,
        queue_create_info_count: queue_infos.len() as u32,
        p_queue_create_infos: queue_infos.as_ptr(),
        enabled_extension_count: device_exts.len() as u32,
        pp_enabled_extension_names: device_exts.as_ptr(),
        ..Default::default()
    };
    let device = instance
        .create_device(phys, &create_info, None)
        .map_err(BootstrapError::api("create_device"))?;
    let present_queue = device.get_device_queue(families.present, 0);
    info!(
        "logical device ready (graphics family {}, present family {})",
        families.graphics, families.present
    );
    Ok((device, families, present_queue))
}

/// Stage 6: negotiate format, mode, extent and image count, then create
/// the swapchain and fetch the images it actually allocated.
unsafe fn create_swapchain(
    surface_loader: &surface::Instance,
    swapchain_loader: &swapchain::Device,
    phys: vk::PhysicalDevice,
    surf: vk::SurfaceKHR,
    families: QueueFamilies,
    size: SurfaceSize,
) -> Result<(vk::SwapchainKHR, vk::SurfaceFormatKHR, vk::Extent2D, Vec<vk::Image>), BootstrapError> {
    let formats = surface_loader
        .get_physical_device_surface_formats(phys, surf)
        .map_err(BootstrapError::api("get_physical_device_surface_formats"))?;
    let surface_format = choose_surface_format(&formats)?;

    let modes = surface_loader
        .get_physical_device_surface_present_modes(phys, surf)
        .map_err(BootstrapError::api("get_physical_device_surface_present_modes"))?;
    if modes.is_empty() {
        return Err(BootstrapError::NoPresentModes);
    }
    let present_mode = choose_present_mode(&modes);

    let caps = surface_loader
        .get_physical_device_surface_capabilities(phys, surf)
        .map_err(BootstrapError::api("get_physical_device_surface_capabilities"))?;
    let extent = choose_extent(&caps, size);
    let image_count = choose_image_count(&caps);
    info!(
        "swapchain {}x{}, requesting {} images",
        extent.width, extent.height, image_count
    );

    let family_indices = [families.graphics, families.present];
    let concurrent = families.graphics != families.present;
    let create_info = vk::SwapchainCreateInfoKHR {
        s_type: vk::StructureType::SWAPCHAIN_CREATE_INFO_KHR,
        surface: surf,
        min_image_count: image_count,
        image_format: surface_format.format,
        image_color_space: surface_format.color_space,
        image_extent: extent,
        image_array_layers: 1,
        image_usage: vk::ImageUsageFlags::COLOR_ATTACHMENT,
        image_sharing_mode: if concurrent {
            vk::SharingMode::CONCURRENT
        } else {
            vk::SharingMode::EXCLUSIVE
        },
        queue_family_index_count: if concurrent { 2 } else { 0 },
        p_queue_family_indices: if concurrent {
            family_indices.as_ptr()
        } else {
            std::ptr::null()
        },
        pre_transform: caps.current_transform,
        composite_alpha: vk::CompositeAlphaFlagsKHR::OPAQUE,
        present_mode,
        clipped: vk::TRUE,
        old_swapchain: vk::SwapchainKHR::null(),
        ..Default::default()
    };
    let sc = swapchain_loader
        .create_swapchain(&create_info, None)
        .map_err(BootstrapError::api("create_swapchain"))?;

    // The driver may allocate more images than requested; the returned
    // list is authoritative for every per-image collection that follows.
    let images = swapchain_loader
        .get_swapchain_images(sc)
        .map_err(BootstrapError::api("get_swapchain_images"))?;
    Ok((sc, surface_format, extent, images))
}

/// Stage 7.
unsafe fn create_image_views(
    device: &ash::Device,
    images: &[vk::Image],
    format: vk::Format,
) -> Result<Vec<vk::ImageView>, BootstrapError> {
    let mut views = Vec::with_capacity(images.len());
    for &image in images {
        let create_info = vk::ImageViewCreateInfo {
            s_type: vk::StructureType::IMAGE_VIEW_CREATE_INFO,
            image,
            view_type: vk::ImageViewType::TYPE_2D,
            format,
            components: vk::ComponentMapping::default(),
            subresource_range: vk::ImageSubresourceRange {
                aspect_mask: vk::ImageAspectFlags::COLOR,
                base_mip_level: 0,
                level_count: 1,
                base_array_layer: 0,
                layer_count: 1,
            },
            ..Default::default()
        };
        views.push(
            device
                .create_image_view(&create_info, None)
                .map_err(BootstrapError::api("create_image_view"))?,
        );
    }
    Ok(views)
}

/// Stage 8: one color attachment, cleared on load, handed to present.
unsafe fn create_render_pass(
    device: &ash::Device,
    format: vk::Format,
) -> Result<vk::RenderPass, BootstrapError> {
    let color_attachment = vk::AttachmentDescription {
        format,
        samples: vk::SampleCountFlags::TYPE_1,
        load_op: vk::AttachmentLoadOp::CLEAR,
        store_op: vk::AttachmentStoreOp::STORE,
        stencil_load_op: vk::AttachmentLoadOp::DONT_CARE,
        stencil_store_op: vk::AttachmentStoreOp::DONT_CARE,
        initial_layout: vk::ImageLayout::UNDEFINED,
        final_layout: vk::ImageLayout::PRESENT_SRC_KHR,
        ..Default::default()
    };
    let attachment_ref = vk::AttachmentReference {
        attachment: 0,
        layout: vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
    };
    let subpass = vk::SubpassDescription {
        pipeline_bind_point: vk::PipelineBindPoint::GRAPHICS,
        color_attachment_count: 1,
        p_color_attachments: &attachment_ref,
        ..Default::default()
    };
    let create_info = vk::RenderPassCreateInfo {
        s_type: vk::StructureType::RENDER_PASS_CREATE_INFO,
        attachment_count: 1,
        p_attachments: &color_attachment,
        subpass_count: 1,
        p_subpasses: &subpass,
        ..Default::default()
    };
    device
        .create_render_pass(&create_info, None)
        .map_err(BootstrapError::api("create_render_pass"))
}

unsafe fn create_shader_module(
    device: &ash::Device,
    name: &'static str,
    bytes: &[u8],
) -> Result<vk::ShaderModule, BootstrapError> {
    if bytes.is_empty() {
        return Err(BootstrapError::ShaderBlob(name));
    }
    let code = read_spv(&mut Cursor::new(bytes)).map_err(|_| BootstrapError::ShaderBlob(name))?;
    let create_info = vk::ShaderModuleCreateInfo {
        s_type: vk::StructureType::SHADER_MODULE_CREATE_INFO,
        code_size: code.len() * 4,
        p_code: code.as_ptr(),
        ..Default::default()
    };
    device
        .create_shader_module(&create_info, None)
        .map_err(BootstrapError::api("create_shader_module"))
}

/// Stage 9: load the precompiled shader blobs and assemble the single
/// graphics pipeline. A missing or invalid blob is unrecoverable for
/// this renderer.
unsafe fn create_graphics_pipeline(
    device: &ash::Device,
    render_pass: vk::RenderPass,
    extent: vk::Extent2D,
    cfg: PipelineConfig,
    load: &ResourceLoader<'_>,
) -> Result<(vk::ShaderModule, vk::ShaderModule, vk::PipelineLayout, vk::Pipeline), BootstrapError> {
    let vert_bytes = load(VERT_SHADER).map_err(|_| BootstrapError::ShaderBlob(VERT_SHADER))?;
    let frag_bytes = load(FRAG_SHADER).map_err(|_| BootstrapError::ShaderBlob(FRAG_SHADER))?;
    let vert_module = create_shader_module(device, VERT_SHADER, &vert_bytes)?;
    let frag_module = create_shader_module(device, FRAG_SHADER, &frag_bytes)?;

    let stages = [
        vk::PipelineShaderStageCreateInfo {
            s_type: vk::StructureType::PIPELINE_SHADER_STAGE_CREATE_INFO,
            stage: vk::ShaderStageFlags::VERTEX,
            module: vert_module,
            p_name: c"main".as_ptr(),
            ..Default::default()
        },
        vk::PipelineShaderStageCreateInfo {
            s_type: vk::StructureType::PIPELINE_SHADER_STAGE_CREATE_INFO,
            stage: vk::ShaderStageFlags::FRAGMENT,
            module: frag_module,
            p_name: c"main".as_ptr(),
            ..Default::default()
        },
    ];

    // No vertex buffers; the vertex shader synthesizes the geometry.
    let vertex_input = vk::PipelineVertexInputStateCreateInfo {
        s_type: vk::StructureType::PIPELINE_VERTEX_INPUT_STATE_CREATE_INFO,
        ..Default::default()
    };
    let input_assembly = vk::PipelineInputAssemblyStateCreateInfo {
        s_type: vk::StructureType::PIPELINE_INPUT_ASSEMBLY_STATE_CREATE_INFO,
        topology: vk::PrimitiveTopology::TRIANGLE_LIST,
        ..Default::default()
    };

    let viewport = vk::Viewport {
        x: 0.0,
        y: 0.0,
        width: extent.width as f32,
        height: extent.height as f32,
        min_depth: 0.0,
        max_depth: 1.0,
    };
    let scissor = vk::Rect2D {
        offset: vk::Offset2D { x: 0, y: 0 },
        extent,
    };
    let viewport_state = vk::PipelineViewportStateCreateInfo {
        s_type: vk::StructureType::PIPELINE_VIEWPORT_STATE_CREATE_INFO,
        viewport_count: 1,
        p_viewports: &viewport,
        scissor_count: 1,
        p_scissors: &scissor,
        ..Default::default()
    };

    let raster = vk::PipelineRasterizationStateCreateInfo {
        s_type: vk::StructureType::PIPELINE_RASTERIZATION_STATE_CREATE_INFO,
        polygon_mode: vk::PolygonMode::FILL,
        cull_mode: vk::CullModeFlags::BACK,
        front_face: vk::FrontFace::CLOCKWISE,
        line_width: 1.0,
        ..Default::default()
    };
    let multisample = vk::PipelineMultisampleStateCreateInfo {
        s_type: vk::StructureType::PIPELINE_MULTISAMPLE_STATE_CREATE_INFO,
        rasterization_samples: vk::SampleCountFlags::TYPE_1,
        min_sample_shading: 1.0,
        ..Default::default()
    };

    let depth_stencil = vk::PipelineDepthStencilStateCreateInfo {
        s_type: vk::StructureType::PIPELINE_DEPTH_STENCIL_STATE_CREATE_INFO,
        depth_test_enable: if cfg.depth_test { vk::TRUE } else { vk::FALSE },
        depth_write_enable: if cfg.depth_test { vk::TRUE } else { vk::FALSE },
        depth_compare_op: vk::CompareOp::LESS_OR_EQUAL,
        ..Default::default()
    };

    let blend_attachment = vk::PipelineColorBlendAttachmentState {
        color_write_mask: vk::ColorComponentFlags::RGBA,
        blend_enable: if cfg.blend { vk::TRUE } else { vk::FALSE },
        src_color_blend_factor: if cfg.blend {
            vk::BlendFactor::SRC_ALPHA
        } else {
            vk::BlendFactor::ONE
        },
        dst_color_blend_factor: if cfg.blend {
            vk::BlendFactor::ONE_MINUS_SRC_ALPHA
        } else {
            vk::BlendFactor::ZERO
        },
        color_blend_op: vk::BlendOp::ADD,
        src_alpha_blend_factor: vk::BlendFactor::ONE,
        dst_alpha_blend_factor: vk::BlendFactor::ZERO,
        alpha_blend_op: vk::BlendOp::ADD,
    };
    let blend_state = vk::PipelineColorBlendStateCreateInfo {
        s_type: vk::StructureType::PIPELINE_COLOR_BLEND_STATE_CREATE_INFO,
        attachment_count: 1,
        p_attachments: &blend_attachment,
        blend_constants: [1.0, 1.0, 1.0, 1.0],
        ..Default::default()
    };

    let dynamic_states = [vk::DynamicState::VIEWPORT, vk::DynamicState::LINE_WIDTH];
    let dynamic_state = vk::PipelineDynamicStateCreateInfo {
        s_type: vk::StructureType::PIPELINE_DYNAMIC_STATE_CREATE_INFO,
        dynamic_state_count: dynamic_states.len() as u32,
        p_dynamic_states: dynamic_states.as_ptr(),
        ..Default::default()
    };

    // No descriptor sets, no push constants.
    let layout_info = vk::PipelineLayoutCreateInfo {
        s_type: vk::StructureType::PIPELINE_LAYOUT_CREATE_INFO,
        ..Default::default()
    };
    let pipeline_layout = device
        .create_pipeline_layout(&layout_info, None)
        .map_err(BootstrapError::api("create_pipeline_layout"))?;

    let pipeline_info = vk::GraphicsPipelineCreateInfo {
        s_type: vk::StructureType::GRAPHICS_PIPELINE_CREATE_INFO,
        stage_count: stages.len() as u32,
        p_stages: stages.as_ptr(),
        p_vertex_input_state: &vertex_input,
        p_input_assembly_state: &input_assembly,
        p_viewport_state: &viewport_state,
        p_rasterization_state: &raster,
        p_multisample_state: &multisample,
        p_depth_stencil_state: &depth_stencil,
        p_color_blend_state: &blend_state,
        p_dynamic_state: &dynamic_state,
        layout: pipeline_layout,
        render_pass,
        subpass: 0,
        base_pipeline_index: -1,
        ..Default::default()
    };
    let pipelines = device
        .create_graphics_pipelines(vk::PipelineCache::null(), &[pipeline_info], None)
        .map_err(|(_, e)| BootstrapError::Api {
            stage: "create_graphics_pipelines",
            result: e,
        })?;
    info!("graphics pipeline created");
    Ok((vert_module, frag_module, pipeline_layout, pipelines[0]))
}

/// Stage 10.
unsafe fn create_framebuffers(
    device: &ash::Device,
    render_pass: vk::RenderPass,
    views: &[vk::ImageView],
    extent: vk::Extent2D,
) -> Result<Vec<vk::Framebuffer>, BootstrapError> {
    let mut framebuffers = Vec::with_capacity(views.len());
    for view in views {
        let create_info = vk::FramebufferCreateInfo {
            s_type: vk::StructureType::FRAMEBUFFER_CREATE_INFO,
            render_pass,
            attachment_count: 1,
            p_attachments: view,
            width: extent.width,
            height: extent.height,
            layers: 1,
            ..Default::default()
        };
        framebuffers.push(
            device
                .create_framebuffer(&create_info, None)
                .map_err(BootstrapError::api("create_framebuffer"))?,
        );
    }
    Ok(framebuffers)
}

/// Stages 11-12: command pool on the graphics family with per-buffer
/// reset, one primary buffer per swapchain image.
unsafe fn create_commands(
    device: &ash::Device,
    graphics_family: u32,
    image_count: u32,
) -> Result<(vk::CommandPool, Vec<vk::CommandBuffer>), BootstrapError> {
    let pool_info = vk::CommandPoolCreateInfo {
        s_type: vk::StructureType::COMMAND_POOL_CREATE_INFO,
        flags: vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER,
        queue_family_index: graphics_family,
        ..Default::default()
    };
    let pool = device
        .create_command_pool(&pool_info, None)
        .map_err(BootstrapError::api("create_command_pool"))?;

    let alloc_info = vk::CommandBufferAllocateInfo {
        s_type: vk::StructureType::COMMAND_BUFFER_ALLOCATE_INFO,
        command_pool: pool,
        level: vk::CommandBufferLevel::PRIMARY,
        command_buffer_count: image_count,
        ..Default::default()
    };
    let bufs = device
        .allocate_command_buffers(&alloc_info)
        .map_err(BootstrapError::api("allocate_command_buffers"))?;
    Ok((pool, bufs))
}

/// Stage 13: two binary semaphores and the single in-flight fence. The
/// fence starts signaled so the first frame's wait returns immediately.
unsafe fn create_sync_objects(
    device: &ash::Device,
) -> Result<(vk::Semaphore, vk::Semaphore, vk::Fence), BootstrapError> {
    let sem_info = vk::SemaphoreCreateInfo {
        s_type: vk::StructureType::SEMAPHORE_CREATE_INFO,
        ..Default::default()
    };
    let image_acquired = device
        .create_semaphore(&sem_info, None)
        .map_err(BootstrapError::api("create_semaphore"))?;
    let render_finished = device
        .create_semaphore(&sem_info, None)
        .map_err(BootstrapError::api("create_semaphore"))?;

    let fence_info = vk::FenceCreateInfo {
        s_type: vk::StructureType::FENCE_CREATE_INFO,
        flags: vk::FenceCreateFlags::SIGNALED,
        ..Default::default()
    };
    let in_flight = device
        .create_fence(&fence_info, None)
        .map_err(BootstrapError::api("create_fence"))?;
    Ok((image_acquired, render_finished, in_flight))
}

/// The ordered bootstrap. Stages run strictly in sequence because each
/// consumes handles produced by its predecessors; the first error
/// short-circuits everything via `?`.
unsafe fn build_context(
    window: &dyn HasWindowHandle,
    display: &dyn HasDisplayHandle,
    size: SurfaceSize,
    cfg: &BootstrapConfig,
    load: &ResourceLoader<'_>,
) -> Result<RenderContext, BootstrapError> {
    let entry = Entry::load()?;
    let display_raw: RawDisplayHandle = display
        .display_handle()
        .map_err(|_| BootstrapError::Api {
            stage: "display_handle",
            result: vk::Result::ERROR_INITIALIZATION_FAILED,
        })?
        .as_raw();
    let window_raw: RawWindowHandle = window
        .window_handle()
        .map_err(|_| BootstrapError::Api {
            stage: "window_handle",
            result: vk::Result::ERROR_INITIALIZATION_FAILED,
        })?
        .as_raw();

    let (layers, extensions) = resolve_layers_and_extensions(&entry, display_raw, cfg.validation)?;
    let instance = create_instance(&entry, &layers, &extensions)?;

    let surf = ash_window::create_surface(&entry, &instance, display_raw, window_raw, None)
        .map_err(BootstrapError::api("create_surface"))?;
    let surface_loader = surface::Instance::new(&entry, &instance);
    info!("surface created");

    let phys = select_physical_device(&instance)?;
    let (device, families, present_queue) =
        create_logical_device(&instance, &surface_loader, phys, surf)?;

    let swapchain_loader = swapchain::Device::new(&instance, &device);
    let (sc, surface_format, extent, images) =
        create_swapchain(&surface_loader, &swapchain_loader, phys, surf, families, size)?;
    info!("swapchain returned {} images", images.len());

    let image_views = create_image_views(&device, &images, surface_format.format)?;
    let render_pass = create_render_pass(&device, surface_format.format)?;
    let (vert_module, frag_module, pipeline_layout, pipeline) =
        create_graphics_pipeline(&device, render_pass, extent, cfg.pipeline, load)?;
    let framebuffers = create_framebuffers(&device, render_pass, &image_views, extent)?;
    let (cmd_pool, cmd_bufs) = create_commands(&device, families.graphics, images.len() as u32)?;
    let (image_acquired, render_finished, in_flight) = create_sync_objects(&device)?;

    // Per-image collections must all track the count the swapchain
    // actually returned.
    debug_assert_eq!(images.len(), image_views.len());
    debug_assert_eq!(images.len(), framebuffers.len());
    debug_assert_eq!(images.len(), cmd_bufs.len());

    Ok(RenderContext {
        _entry: entry,
        instance,
        surface_loader,
        surface: surf,
        phys,
        device,
        families,
        present_queue,
        swapchain_loader,
        swapchain: sc,
        extent,
        images,
        image_views,
        render_pass,
        vert_module,
        frag_module,
        pipeline_layout,
        pipeline,
        framebuffers,
        cmd_pool,
        cmd_bufs,
        image_acquired,
        render_finished,
        in_flight,
    })
}
