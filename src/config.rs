//! The configuration struct that drives visual selection and context
//! creation.

use bitflags::bitflags;

use crate::info::{GLProfile, GLVersion, ReleaseBehavior, ResetNotification};

bitflags! {
    /// Flags for context creation, matching the GLX_ARB_create_context bit
    /// values.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
    pub struct ContextFlags: u32 {
        /// Create a debug context.
        const DEBUG = 0x0001;
        /// Create a forward-compatible context.
        const FORWARD_COMPATIBLE = 0x0002;
        /// Create a context with robust buffer access.
        const ROBUST_ACCESS = 0x0004;
    }
}

/// Everything the caller gets to ask for, in one place.
///
/// One `GLConfig` feeds both the visual/FBConfig attribute encodings and the
/// context-creation attribute list, the way a video subsystem's GL attribute
/// block does.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GLConfig {
    /// Minimum red channel depth, in bits.
    pub red_size: u8,
    /// Minimum green channel depth, in bits.
    pub green_size: u8,
    /// Minimum blue channel depth, in bits.
    pub blue_size: u8,
    /// Minimum alpha channel depth, in bits. Zero omits the attribute.
    pub alpha_size: u8,
    /// Minimum depth buffer depth, in bits.
    pub depth_size: u8,
    /// Minimum stencil buffer depth, in bits. Zero omits the attribute.
    pub stencil_size: u8,
    /// Minimum accumulation buffer red depth, in bits.
    pub accum_red_size: u8,
    /// Minimum accumulation buffer green depth, in bits.
    pub accum_green_size: u8,
    /// Minimum accumulation buffer blue depth, in bits.
    pub accum_blue_size: u8,
    /// Minimum accumulation buffer alpha depth, in bits.
    pub accum_alpha_size: u8,
    /// Whether the visual must be double-buffered.
    pub double_buffer: bool,
    /// Whether the visual must support stereo rendering.
    pub stereo: bool,
    /// Number of multisample buffers. Zero omits the attribute.
    pub multisample_buffers: u8,
    /// Number of samples per pixel. Zero omits the attribute.
    pub multisample_samples: u8,
    /// Request a floating-point color buffer.
    pub float_buffers: bool,
    /// Request an sRGB-capable framebuffer.
    pub srgb_capable: bool,
    /// Acceleration preference: `None` is don't-care, `Some(true)` requires
    /// a conformant accelerated visual, `Some(false)` asks for a software
    /// one.
    pub accelerated: Option<bool>,
    /// The context version to request.
    pub version: GLVersion,
    /// The context profile to request, or `None` for an unversioned legacy
    /// context.
    pub profile: Option<GLProfile>,
    /// Context creation flags.
    pub flags: ContextFlags,
    /// Flush behavior on context release.
    pub release_behavior: ReleaseBehavior,
    /// Reset notification strategy for robust contexts.
    pub reset_notification: ResetNotification,
    /// Ask the driver to skip GL error generation.
    pub no_error: bool,
    /// Share objects with whatever context is current at creation time.
    pub share_with_current_context: bool,
}

impl Default for GLConfig {
    fn default() -> GLConfig {
        GLConfig {
            red_size: 8,
            green_size: 8,
            blue_size: 8,
            alpha_size: 0,
            depth_size: 16,
            stencil_size: 0,
            accum_red_size: 0,
            accum_green_size: 0,
            accum_blue_size: 0,
            accum_alpha_size: 0,
            double_buffer: true,
            stereo: false,
            multisample_buffers: 0,
            multisample_samples: 0,
            float_buffers: false,
            srgb_capable: false,
            accelerated: None,
            version: GLVersion::new(2, 1),
            profile: None,
            flags: ContextFlags::empty(),
            release_behavior: ReleaseBehavior::default(),
            reset_notification: ResetNotification::default(),
            no_error: false,
            share_with_current_context: false,
        }
    }
}

impl GLConfig {
    /// Whether this configuration can be satisfied by the legacy
    /// `glXCreateContext` path: no versioned API, no profile, no flags.
    pub(crate) fn wants_legacy_context(&self) -> bool {
        self.version.major < 3 && self.profile.is_none() && self.flags.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_a_plain_double_buffered_gl21_request() {
        let config = GLConfig::default();
        assert_eq!(
            (config.red_size, config.green_size, config.blue_size),
            (8, 8, 8)
        );
        assert!(config.double_buffer);
        assert_eq!(config.version, GLVersion::new(2, 1));
        assert_eq!(config.profile, None);
        assert!(config.flags.is_empty());
        assert!(config.wants_legacy_context());
    }

    #[test]
    fn versioned_or_profiled_requests_are_not_legacy() {
        let mut config = GLConfig {
            version: GLVersion::new(3, 2),
            ..GLConfig::default()
        };
        assert!(!config.wants_legacy_context());

        config.version = GLVersion::new(2, 1);
        config.profile = Some(GLProfile::Compatibility);
        assert!(!config.wants_legacy_context());

        config.profile = None;
        config.flags = ContextFlags::DEBUG;
        assert!(!config.wants_legacy_context());
    }

    #[test]
    fn context_flags_match_glx_bit_values() {
        assert_eq!(ContextFlags::DEBUG.bits(), 0x1);
        assert_eq!(ContextFlags::FORWARD_COMPATIBLE.bits(), 0x2);
        assert_eq!(ContextFlags::ROBUST_ACCESS.bits(), 0x4);
    }
}
