// glxkit/src/lib.rs
//
//! GLX capability negotiation and OpenGL context creation for X11.
//!
//! `glxkit` loads an OpenGL driver library at runtime, discovers what the
//! display server's GLX implementation can actually do, and builds on that
//! to pick visuals, create (possibly versioned and profiled) contexts, and
//! control the swap interval, including adaptive vsync across the two
//! incompatible driver readings of `GLX_EXT_swap_control_tear`.
//!
//! The usual flow:
//!
//! 1. Open a [`Connection`] to the X server.
//! 2. [`Device::load`] a driver for a [`GLConfig`]. This probes the GLX
//!    extension surface and may answer [`Backend::Egl`], meaning the request
//!    (typically an OpenGL ES profile beyond what GLX can reach) should go
//!    to an EGL backend instead.
//! 3. [`Device::get_visual`] to pick the visual your window must be created
//!    with, then [`Device::create_context`] against that window.
//! 4. [`Device::swap_window`] to present, [`Device::set_swap_interval`] for
//!    vsync control.
//!
//! Driver loading honors a few environment hints: `GLXKIT_OPENGL_LIBRARY`
//! overrides the library path, `GLXKIT_FORCE_EGL` forces the EGL handoff,
//! `GLXKIT_OPENGL_ES_DRIVER` marks the library as ES-only, and setting
//! `GLXKIT_NO_DIRECT_COLOR` drops the direct-color visual preference.
//!
//! Nothing here links against libGL or libX11; both are loaded dynamically,
//! so the crate itself is usable on systems without either installed.

mod config;
mod connection;
mod context;
mod device;
mod error;
mod ffi;
mod info;
mod swap;
mod visual;
mod xerror;

pub use crate::config::{ContextFlags, GLConfig};
pub use crate::connection::Connection;
pub use crate::context::{Context, NativeWidget};
pub use crate::device::{Backend, Device};
pub use crate::error::Error;
pub use crate::info::{GLProfile, GLVersion, ReleaseBehavior, ResetNotification};
pub use crate::swap::SwapIntervalTearBehavior;
pub use crate::visual::VisualInfo;

#[cfg(test)]
mod tests;
