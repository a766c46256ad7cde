//! Pure selection policies for the bootstrap sequencer. Everything here is
//! a function of queried data only, so the choices are unit-testable
//! without a live device.

use std::ffi::CStr;

use ash::vk;

use crate::error::BootstrapError;
use crate::SurfaceSize;

pub const VALIDATION_LAYER: &CStr = c"VK_LAYER_KHRONOS_validation";

/// Swapchain image count we aim for before clamping to surface limits.
pub const TARGET_IMAGE_COUNT: u32 = 2;

/// Prefer 8-bit sRGB; otherwise take whatever the surface lists first. An
/// empty list means the surface is unusable.
pub fn choose_surface_format(
    formats: &[vk::SurfaceFormatKHR],
) -> Result<vk::SurfaceFormatKHR, BootstrapError> {
    let first = *formats.first().ok_or(BootstrapError::NoSurfaceFormats)?;
    Ok(formats
        .iter()
        .copied()
        .find(|f| {
            f.format == vk::Format::B8G8R8A8_SRGB
                && f.color_space == vk::ColorSpaceKHR::SRGB_NONLINEAR
        })
        .unwrap_or(first))
}

/// Prefer low-latency MAILBOX; FIFO is the guaranteed fallback even when
/// the queried list does not mention it.
pub fn choose_present_mode(modes: &[vk::PresentModeKHR]) -> vk::PresentModeKHR {
    if modes.iter().any(|&m| m == vk::PresentModeKHR::MAILBOX) {
        vk::PresentModeKHR::MAILBOX
    } else {
        vk::PresentModeKHR::FIFO
    }
}

/// The surface dictates the extent when it reports one; otherwise clamp
/// the client size componentwise into the supported range.
pub fn choose_extent(caps: &vk::SurfaceCapabilitiesKHR, want: SurfaceSize) -> vk::Extent2D {
    if caps.current_extent.width != u32::MAX {
        caps.current_extent
    } else {
        vk::Extent2D {
            width: want
                .width
                .clamp(caps.min_image_extent.width, caps.max_image_extent.width),
            height: want
                .height
                .clamp(caps.min_image_extent.height, caps.max_image_extent.height),
        }
    }
}

/// Clamp the target image count into the surface's limits. A maximum of
/// zero means the surface imposes no upper bound.
pub fn choose_image_count(caps: &vk::SurfaceCapabilitiesKHR) -> u32 {
    if caps.max_image_count == 0 {
        TARGET_IMAGE_COUNT.max(caps.min_image_count)
    } else {
        TARGET_IMAGE_COUNT.clamp(caps.min_image_count, caps.max_image_count)
    }
}

/// Pick the physical device: a lone device wins outright, otherwise the
/// first discrete GPU in enumeration order, otherwise the last candidate.
pub fn pick_adapter(props: &[vk::PhysicalDeviceProperties]) -> Result<usize, BootstrapError> {
    if props.is_empty() {
        return Err(BootstrapError::NoAdapters);
    }
    if props.len() == 1 {
        return Ok(0);
    }
    Ok(props
        .iter()
        .position(|p| p.device_type == vk::PhysicalDeviceType::DISCRETE_GPU)
        .unwrap_or(props.len() - 1))
}

/// What each queue family can do, as probed against the live surface.
#[derive(Clone, Copy, Debug)]
pub struct QueueFamilyCaps {
    pub graphics: bool,
    pub present: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct QueueFamilies {
    pub graphics: u32,
    pub present: u32,
}

impl QueueFamilies {
    /// Distinct family indices, one queue requested per entry.
    pub fn distinct(&self) -> Vec<u32> {
        if self.graphics == self.present {
            vec![self.graphics]
        } else {
            vec![self.graphics, self.present]
        }
    }
}

/// Graphics family is the first that advertises graphics; the present
/// family is the graphics family when it can present, else the first
/// family that can.
pub fn pick_queue_families(caps: &[QueueFamilyCaps]) -> Result<QueueFamilies, BootstrapError> {
    let graphics = caps
        .iter()
        .position(|c| c.graphics)
        .ok_or(BootstrapError::NoGraphicsQueue)? as u32;

    let present = if caps[graphics as usize].present {
        graphics
    } else {
        caps.iter()
            .position(|c| c.present)
            .ok_or(BootstrapError::NoPresentQueue)? as u32
    };

    Ok(QueueFamilies { graphics, present })
}

/// True when the validation layer is present by exact name. Absence is a
/// soft condition; the caller logs and proceeds without layers.
pub fn has_validation_layer(available: &[vk::LayerProperties]) -> bool {
    available
        .iter()
        .any(|l| l.layer_name_as_c_str().is_ok_and(|name| name == VALIDATION_LAYER))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::os::raw::c_char;

    fn fmt(format: vk::Format, color_space: vk::ColorSpaceKHR) -> vk::SurfaceFormatKHR {
        vk::SurfaceFormatKHR {
            format,
            color_space,
        }
    }

    fn adapter(device_type: vk::PhysicalDeviceType) -> vk::PhysicalDeviceProperties {
        vk::PhysicalDeviceProperties {
            device_type,
            ..Default::default()
        }
    }

    fn layer(name: &str) -> vk::LayerProperties {
        let mut props = vk::LayerProperties::default();
        for (dst, src) in props.layer_name.iter_mut().zip(name.bytes()) {
            *dst = src as c_char;
        }
        props
    }

    #[test]
    fn surface_format_prefers_bgra8_srgb() {
        let formats = [
            fmt(vk::Format::R8G8B8A8_UNORM, vk::ColorSpaceKHR::SRGB_NONLINEAR),
            fmt(vk::Format::B8G8R8A8_SRGB, vk::ColorSpaceKHR::SRGB_NONLINEAR),
        ];
        let chosen = choose_surface_format(&formats).unwrap();
        assert_eq!(chosen.format, vk::Format::B8G8R8A8_SRGB);
        assert_eq!(chosen.color_space, vk::ColorSpaceKHR::SRGB_NONLINEAR);
    }

    #[test]
    fn surface_format_falls_back_to_first_entry() {
        let formats = [
            fmt(vk::Format::R8G8B8A8_UNORM, vk::ColorSpaceKHR::SRGB_NONLINEAR),
            fmt(vk::Format::R16G16B16A16_SFLOAT, vk::ColorSpaceKHR::EXTENDED_SRGB_LINEAR_EXT),
        ];
        assert_eq!(
            choose_surface_format(&formats).unwrap().format,
            vk::Format::R8G8B8A8_UNORM
        );
    }

    #[test]
    fn surface_format_empty_list_fails() {
        assert!(matches!(
            choose_surface_format(&[]),
            Err(BootstrapError::NoSurfaceFormats)
        ));
    }

    #[test]
    fn present_mode_prefers_mailbox() {
        let modes = [vk::PresentModeKHR::FIFO, vk::PresentModeKHR::MAILBOX];
        assert_eq!(choose_present_mode(&modes), vk::PresentModeKHR::MAILBOX);
    }

    #[test]
    fn present_mode_fifo_even_when_unlisted() {
        let modes = [vk::PresentModeKHR::IMMEDIATE];
        assert_eq!(choose_present_mode(&modes), vk::PresentModeKHR::FIFO);
    }

    #[test]
    fn extent_uses_current_when_defined() {
        let caps = vk::SurfaceCapabilitiesKHR {
            current_extent: vk::Extent2D {
                width: 800,
                height: 600,
            },
            ..Default::default()
        };
        let e = choose_extent(
            &caps,
            SurfaceSize {
                width: 1024,
                height: 768,
            },
        );
        assert_eq!((e.width, e.height), (800, 600));
    }

    #[test]
    fn extent_clamps_client_size_when_undefined() {
        let caps = vk::SurfaceCapabilitiesKHR {
            current_extent: vk::Extent2D {
                width: u32::MAX,
                height: u32::MAX,
            },
            min_image_extent: vk::Extent2D {
                width: 320,
                height: 240,
            },
            max_image_extent: vk::Extent2D {
                width: 640,
                height: 480,
            },
            ..Default::default()
        };
        let e = choose_extent(
            &caps,
            SurfaceSize {
                width: 1024,
                height: 100,
            },
        );
        assert_eq!((e.width, e.height), (640, 240));
    }

    #[test]
    fn image_count_clamps_into_surface_limits() {
        let caps = vk::SurfaceCapabilitiesKHR {
            min_image_count: 3,
            max_image_count: 8,
            ..Default::default()
        };
        assert_eq!(choose_image_count(&caps), 3);

        let caps = vk::SurfaceCapabilitiesKHR {
            min_image_count: 1,
            max_image_count: 1,
            ..Default::default()
        };
        assert_eq!(choose_image_count(&caps), 1);
    }

    #[test]
    fn image_count_unbounded_when_max_is_zero() {
        let caps = vk::SurfaceCapabilitiesKHR {
            min_image_count: 1,
            max_image_count: 0,
            ..Default::default()
        };
        assert_eq!(choose_image_count(&caps), 2);
    }

    #[test]
    fn adapter_discrete_wins_in_either_order() {
        let discrete_first = [
            adapter(vk::PhysicalDeviceType::DISCRETE_GPU),
            adapter(vk::PhysicalDeviceType::INTEGRATED_GPU),
        ];
        assert_eq!(pick_adapter(&discrete_first).unwrap(), 0);

        let integrated_first = [
            adapter(vk::PhysicalDeviceType::INTEGRATED_GPU),
            adapter(vk::PhysicalDeviceType::DISCRETE_GPU),
        ];
        assert_eq!(pick_adapter(&integrated_first).unwrap(), 1);
    }

    #[test]
    fn adapter_single_device_shortcut() {
        let only = [adapter(vk::PhysicalDeviceType::INTEGRATED_GPU)];
        assert_eq!(pick_adapter(&only).unwrap(), 0);
    }

    #[test]
    fn adapter_last_candidate_when_no_discrete() {
        let list = [
            adapter(vk::PhysicalDeviceType::INTEGRATED_GPU),
            adapter(vk::PhysicalDeviceType::VIRTUAL_GPU),
            adapter(vk::PhysicalDeviceType::CPU),
        ];
        assert_eq!(pick_adapter(&list).unwrap(), 2);
    }

    #[test]
    fn adapter_empty_list_fails() {
        assert!(matches!(pick_adapter(&[]), Err(BootstrapError::NoAdapters)));
    }

    #[test]
    fn queue_families_shared_when_graphics_can_present() {
        let caps = [QueueFamilyCaps {
            graphics: true,
            present: true,
        }];
        let q = pick_queue_families(&caps).unwrap();
        assert_eq!(q.graphics, q.present);
        assert_eq!(q.distinct(), vec![0]);
    }

    #[test]
    fn queue_families_split_when_graphics_cannot_present() {
        let caps = [
            QueueFamilyCaps {
                graphics: true,
                present: false,
            },
            QueueFamilyCaps {
                graphics: false,
                present: true,
            },
        ];
        let q = pick_queue_families(&caps).unwrap();
        assert_eq!((q.graphics, q.present), (0, 1));
        assert_eq!(q.distinct(), vec![0, 1]);
    }

    #[test]
    fn queue_families_missing_capabilities_fail() {
        let no_graphics = [QueueFamilyCaps {
            graphics: false,
            present: true,
        }];
        assert!(matches!(
            pick_queue_families(&no_graphics),
            Err(BootstrapError::NoGraphicsQueue)
        ));

        let no_present = [QueueFamilyCaps {
            graphics: true,
            present: false,
        }];
        assert!(matches!(
            pick_queue_families(&no_present),
            Err(BootstrapError::NoPresentQueue)
        ));
    }

    #[test]
    fn validation_layer_matched_by_exact_name() {
        let layers = [layer("VK_LAYER_MESA_overlay"), layer("VK_LAYER_KHRONOS_validation")];
        assert!(has_validation_layer(&layers));
    }

    #[test]
    fn validation_layer_absent_is_soft() {
        let layers = [layer("VK_LAYER_MESA_overlay")];
        assert!(!has_validation_layer(&layers));
    }
}
