// glxkit/src/ffi.rs
//
//! Extra FFI declarations.
//!
//! GLX entry points are resolved at runtime out of whatever driver library
//! the loader finds, so everything here is a constant or a function-pointer
//! typedef; nothing links against libGL.

#![allow(dead_code)]

use std::os::raw::{c_char, c_int, c_uchar, c_uint, c_void};
use x11_dl::xlib::{Bool, Display, XVisualInfo, XID};

pub(crate) type GLXContext = *mut c_void;
pub(crate) type GLXFBConfig = *mut c_void;
pub(crate) type GLXDrawable = XID;

// Core GLX 1.x visual attributes.
pub(crate) const GLX_RGBA: c_int = 4;
pub(crate) const GLX_DOUBLEBUFFER: c_int = 5;
pub(crate) const GLX_STEREO: c_int = 6;
pub(crate) const GLX_RED_SIZE: c_int = 8;
pub(crate) const GLX_GREEN_SIZE: c_int = 9;
pub(crate) const GLX_BLUE_SIZE: c_int = 10;
pub(crate) const GLX_ALPHA_SIZE: c_int = 11;
pub(crate) const GLX_DEPTH_SIZE: c_int = 12;
pub(crate) const GLX_STENCIL_SIZE: c_int = 13;
pub(crate) const GLX_ACCUM_RED_SIZE: c_int = 14;
pub(crate) const GLX_ACCUM_GREEN_SIZE: c_int = 15;
pub(crate) const GLX_ACCUM_BLUE_SIZE: c_int = 16;
pub(crate) const GLX_ACCUM_ALPHA_SIZE: c_int = 17;

// GLX 1.3 FBConfig attributes.
pub(crate) const GLX_RENDER_TYPE: c_int = 0x8011;
pub(crate) const GLX_RGBA_BIT: c_int = 0x0000_0001;

// GLX errors.
pub(crate) const GLX_BAD_CONTEXT: c_int = 5;

// GLX_ARB_multisample
pub(crate) const GLX_SAMPLE_BUFFERS_ARB: c_int = 100000;
pub(crate) const GLX_SAMPLES_ARB: c_int = 100001;

// GLX_EXT_visual_rating
pub(crate) const GLX_VISUAL_CAVEAT_EXT: c_int = 0x20;
pub(crate) const GLX_NONE_EXT: c_int = 0x8000;
pub(crate) const GLX_SLOW_VISUAL_EXT: c_int = 0x8001;

// GLX_EXT_visual_info
pub(crate) const GLX_X_VISUAL_TYPE_EXT: c_int = 0x22;
pub(crate) const GLX_DIRECT_COLOR_EXT: c_int = 0x8003;

// GLX_ARB_create_context
pub(crate) const GLX_CONTEXT_MAJOR_VERSION_ARB: c_int = 0x2091;
pub(crate) const GLX_CONTEXT_MINOR_VERSION_ARB: c_int = 0x2092;
pub(crate) const GLX_CONTEXT_FLAGS_ARB: c_int = 0x2094;

// GLX_ARB_create_context_profile
pub(crate) const GLX_CONTEXT_PROFILE_MASK_ARB: c_int = 0x9126;
pub(crate) const GLX_CONTEXT_CORE_PROFILE_BIT_ARB: c_int = 0x0000_0001;
pub(crate) const GLX_CONTEXT_COMPATIBILITY_PROFILE_BIT_ARB: c_int = 0x0000_0002;

// GLX_EXT_create_context_es2_profile
pub(crate) const GLX_CONTEXT_ES2_PROFILE_BIT_EXT: c_int = 0x0000_0004;

// GLX_ARB_create_context_robustness
pub(crate) const GLX_CONTEXT_RESET_NOTIFICATION_STRATEGY_ARB: c_int = 0x8256;
pub(crate) const GLX_NO_RESET_NOTIFICATION_ARB: c_int = 0x8261;
pub(crate) const GLX_LOSE_CONTEXT_ON_RESET_ARB: c_int = 0x8252;

// GLX_ARB_context_flush_control
pub(crate) const GLX_CONTEXT_RELEASE_BEHAVIOR_ARB: c_int = 0x2097;
pub(crate) const GLX_CONTEXT_RELEASE_BEHAVIOR_NONE_ARB: c_int = 0x0000;
pub(crate) const GLX_CONTEXT_RELEASE_BEHAVIOR_FLUSH_ARB: c_int = 0x2098;

// GLX_ARB_create_context_no_error
pub(crate) const GLX_CONTEXT_OPENGL_NO_ERROR_ARB: c_int = 0x31B3;

// GLX_ARB_fbconfig_float
pub(crate) const GLX_RGBA_FLOAT_TYPE_ARB: c_int = 0x20B9;
pub(crate) const GLX_RGBA_FLOAT_BIT_ARB: c_int = 0x0000_0004;

// GLX_ARB_framebuffer_sRGB
pub(crate) const GLX_FRAMEBUFFER_SRGB_CAPABLE_ARB: c_int = 0x20B2;

// GLX_EXT_swap_control(_tear)
pub(crate) const GLX_SWAP_INTERVAL_EXT: c_int = 0x20F1;
pub(crate) const GLX_MAX_SWAP_INTERVAL_EXT: c_int = 0x20F2;
pub(crate) const GLX_LATE_SWAPS_TEAR_EXT: c_int = 0x20F3;

// The one GL query the probe needs.
pub(crate) const GL_EXTENSIONS: c_uint = 0x1F03;

pub(crate) type GlxQueryExtension =
    unsafe extern "C" fn(*mut Display, *mut c_int, *mut c_int) -> Bool;
pub(crate) type GlxQueryExtensionsString =
    unsafe extern "C" fn(*mut Display, c_int) -> *const c_char;
pub(crate) type GlxGetProcAddress = unsafe extern "C" fn(*const c_uchar) -> *mut c_void;
pub(crate) type GlxChooseVisual =
    unsafe extern "C" fn(*mut Display, c_int, *mut c_int) -> *mut XVisualInfo;
pub(crate) type GlxCreateContext =
    unsafe extern "C" fn(*mut Display, *mut XVisualInfo, GLXContext, Bool) -> GLXContext;
pub(crate) type GlxDestroyContext = unsafe extern "C" fn(*mut Display, GLXContext);
pub(crate) type GlxMakeCurrent =
    unsafe extern "C" fn(*mut Display, GLXDrawable, GLXContext) -> Bool;
pub(crate) type GlxSwapBuffers = unsafe extern "C" fn(*mut Display, GLXDrawable);
pub(crate) type GlxQueryDrawable =
    unsafe extern "C" fn(*mut Display, GLXDrawable, c_int, *mut c_uint);
pub(crate) type GlxGetCurrentContext = unsafe extern "C" fn() -> GLXContext;
pub(crate) type GlxGetCurrentDrawable = unsafe extern "C" fn() -> GLXDrawable;

pub(crate) type GlxSwapIntervalExt = unsafe extern "C" fn(*mut Display, GLXDrawable, c_int);
pub(crate) type GlxSwapIntervalMesa = unsafe extern "C" fn(c_int) -> c_int;
pub(crate) type GlxGetSwapIntervalMesa = unsafe extern "C" fn() -> c_int;
pub(crate) type GlxSwapIntervalSgi = unsafe extern "C" fn(c_int) -> c_int;

pub(crate) type GlxCreateContextAttribsArb = unsafe extern "C" fn(
    *mut Display,
    GLXFBConfig,
    GLXContext,
    Bool,
    *const c_int,
) -> GLXContext;
pub(crate) type GlxChooseFbConfig =
    unsafe extern "C" fn(*mut Display, c_int, *const c_int, *mut c_int) -> *mut GLXFBConfig;
pub(crate) type GlxGetVisualFromFbConfig =
    unsafe extern "C" fn(*mut Display, GLXFBConfig) -> *mut XVisualInfo;

pub(crate) type GlGetString = unsafe extern "C" fn(c_uint) -> *const c_uchar;
