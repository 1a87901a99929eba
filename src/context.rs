// glxkit/src/context.rs
//
//! OpenGL context lifecycle.
//!
//! Two creation paths exist. Plain unversioned, unprofiled, unflagged
//! requests against opaque windows go through legacy `glXCreateContext`.
//! Everything else needs `glXCreateContextAttribsARB` against an FBConfig,
//! and since bad version/profile combinations surface as asynchronous X
//! protocol errors rather than return values, the whole creation runs under
//! an [`XErrorTrap`].

use std::mem;
use std::os::raw::{c_int, c_void};
use std::ptr;
use std::slice;

use x11_dl::xlib::{
    True, VisualIDMask, VisualScreenMask, Window, XVisualInfo, XWindowAttributes,
};

use crate::config::GLConfig;
use crate::device::{Device, GlxExtensions};
use crate::error::Error;
use crate::ffi;
use crate::info::{GLProfile, ReleaseBehavior, ResetNotification};
use crate::visual::{vinfo_has_alpha, AttribList};
use crate::xerror::XErrorTrap;

/// The window a context is created for and presented to.
#[derive(Clone, Copy, Debug)]
pub struct NativeWidget {
    /// The X window.
    pub window: Window,
    /// Whether the window was created against an alpha-bearing visual and
    /// the context should match.
    pub transparent: bool,
}

/// A GLX rendering context.
///
/// Contexts do not destroy themselves; hand them back to
/// [`Device::destroy_context`].
pub struct Context {
    pub(crate) glx_context: ffi::GLXContext,
}

impl Context {
    /// The raw `GLXContext` handle.
    #[inline]
    pub fn raw(&self) -> *mut c_void {
        self.glx_context
    }
}

impl Device {
    /// Creates a context for `widget` per this session's configuration and
    /// makes it current.
    ///
    /// Protocol errors raised by the driver during creation win over local
    /// diagnoses, since they carry the server's own reason.
    pub fn create_context(&self, widget: &NativeWidget) -> Result<Context, Error> {
        let xlib = &self.connection.xlib;
        let display = self.connection.display();
        let transparent = widget.transparent;

        unsafe {
            let share_context = if self.config.share_with_current_context {
                self.glx
                    .get_current_context
                    .map_or(ptr::null_mut(), |get_current_context| get_current_context())
            } else {
                ptr::null_mut()
            };

            let trap = XErrorTrap::install(&self.connection, "create GL context", self.error_base);

            let mut context: ffi::GLXContext = ptr::null_mut();
            let mut local_error = None;

            // The context has to match the window's actual visual, not
            // whatever the selector would pick today.
            let mut xattr: XWindowAttributes = mem::zeroed();
            (xlib.XGetWindowAttributes)(display, widget.window, &mut xattr);
            let screen = (xlib.XScreenNumberOfScreen)(xattr.screen);
            let mut template: XVisualInfo = mem::zeroed();
            template.screen = screen;
            template.visualid = (xlib.XVisualIDFromVisual)(xattr.visual);
            let mut count = 0;
            let vinfo = (xlib.XGetVisualInfo)(
                display,
                VisualScreenMask | VisualIDMask,
                &mut template,
                &mut count,
            );

            if !vinfo.is_null() {
                if self.config.wants_legacy_context() && !transparent {
                    context = (self.glx.create_context)(display, vinfo, share_context, True);
                } else {
                    match self.ext_fns.create_context_attribs_arb {
                        None => local_error = Some(Error::ModernContextUnsupported),
                        Some(create_context_attribs) => {
                            let context_attribs =
                                build_context_attributes(&self.config, self.extensions);
                            context = self.create_versioned_context(
                                create_context_attribs,
                                share_context,
                                &context_attribs,
                                transparent,
                            );
                        }
                    }
                }
                (xlib.XFree)(vinfo as *mut c_void);
            }

            let trap_result = trap.finish();

            if context.is_null() {
                return Err(match trap_result {
                    Err(error) => error,
                    Ok(()) => local_error.unwrap_or(Error::ContextCreationFailed),
                });
            }

            let context = Context {
                glx_context: context,
            };
            if let Err(error) = self.make_context_current(widget, &context) {
                self.destroy_context(context);
                return Err(error);
            }
            Ok(context)
        }
    }

    /// Creates a context through `glXCreateContextAttribsARB` against a
    /// matching FBConfig. When the widget is transparent, alpha-bearing
    /// FBConfigs are preferred over the query's own ranking.
    unsafe fn create_versioned_context(
        &self,
        create_context_attribs: ffi::GlxCreateContextAttribsArb,
        share_context: ffi::GLXContext,
        context_attribs: &AttribList,
        transparent: bool,
    ) -> ffi::GLXContext {
        let Some(choose_fb_config) = self.ext_fns.choose_fb_config else {
            return ptr::null_mut();
        };
        let xlib = &self.connection.xlib;
        let display = self.connection.display();
        let screen = self.connection.screen();

        let mut attribs = self.config_attributes(true, transparent);
        let mut fbcount = 0;
        let mut configs = choose_fb_config(display, screen, attribs.as_ptr(), &mut fbcount);
        if configs.is_null() && attribs.relax_visual_type() {
            configs = choose_fb_config(display, screen, attribs.as_ptr(), &mut fbcount);
        }
        if configs.is_null() {
            return ptr::null_mut();
        }

        let candidates = slice::from_raw_parts(configs, fbcount.max(0) as usize);
        let mut context: ffi::GLXContext = ptr::null_mut();

        if transparent {
            if let Some(get_visual_from_fb_config) = self.ext_fns.get_visual_from_fb_config {
                for &candidate in candidates {
                    let vinfo = get_visual_from_fb_config(display, candidate);
                    if vinfo.is_null() {
                        continue;
                    }
                    let alpha = vinfo_has_alpha(&*vinfo);
                    (xlib.XFree)(vinfo as *mut c_void);
                    if alpha {
                        context = create_context_attribs(
                            display,
                            candidate,
                            share_context,
                            True,
                            context_attribs.as_ptr(),
                        );
                        break;
                    }
                }
            }
        }

        if context.is_null() && !candidates.is_empty() {
            context = create_context_attribs(
                display,
                candidates[0],
                share_context,
                True,
                context_attribs.as_ptr(),
            );
        }

        (xlib.XFree)(configs as *mut c_void);
        context
    }

    /// Makes `context` current against `widget`, bridging protocol errors.
    pub fn make_context_current(
        &self,
        widget: &NativeWidget,
        context: &Context,
    ) -> Result<(), Error> {
        self.make_current_inner(widget.window, context.glx_context)
    }

    /// Detaches whatever context is current on this thread.
    pub fn make_no_context_current(&self) -> Result<(), Error> {
        self.make_current_inner(0, ptr::null_mut())
    }

    fn make_current_inner(
        &self,
        drawable: ffi::GLXDrawable,
        context: ffi::GLXContext,
    ) -> Result<(), Error> {
        let trap =
            XErrorTrap::install(&self.connection, "make GL context current", self.error_base);
        let ok =
            unsafe { (self.glx.make_current)(self.connection.display(), drawable, context) } != 0;
        trap.finish()?;
        if ok {
            Ok(())
        } else {
            Err(Error::MakeCurrentFailed)
        }
    }

    /// Destroys a context.
    ///
    /// The destroy is flushed all the way to the server before returning, so
    /// the caller can immediately tear down the window it rendered to.
    pub fn destroy_context(&self, context: Context) {
        unsafe {
            (self.glx.destroy_context)(self.connection.display(), context.glx_context);
        }
        self.connection.sync();
    }

    /// Presents the back buffer of `widget`.
    pub fn swap_window(&self, widget: &NativeWidget) {
        unsafe {
            (self.glx.swap_buffers)(self.connection.display(), widget.window);
        }
    }
}

/// Builds the `glXCreateContextAttribsARB` attribute list. The version pair
/// is always present; everything else appears only when requested, and the
/// robustness, flush-control, and no-error attributes additionally require
/// the server to have advertised their extensions.
pub(crate) fn build_context_attributes(
    config: &GLConfig,
    extensions: GlxExtensions,
) -> AttribList {
    let mut attribs = AttribList::new();
    attribs.push_pair(
        ffi::GLX_CONTEXT_MAJOR_VERSION_ARB,
        config.version.major as c_int,
    );
    attribs.push_pair(
        ffi::GLX_CONTEXT_MINOR_VERSION_ARB,
        config.version.minor as c_int,
    );

    if let Some(profile) = config.profile {
        attribs.push_pair(ffi::GLX_CONTEXT_PROFILE_MASK_ARB, profile_mask_bits(profile));
    }
    if !config.flags.is_empty() {
        attribs.push_pair(ffi::GLX_CONTEXT_FLAGS_ARB, config.flags.bits() as c_int);
    }
    if extensions.contains(GlxExtensions::CONTEXT_FLUSH_CONTROL)
        && config.release_behavior == ReleaseBehavior::None
    {
        attribs.push_pair(
            ffi::GLX_CONTEXT_RELEASE_BEHAVIOR_ARB,
            ffi::GLX_CONTEXT_RELEASE_BEHAVIOR_NONE_ARB,
        );
    }
    if extensions.contains(GlxExtensions::CREATE_CONTEXT_ROBUSTNESS)
        && config.reset_notification != ResetNotification::NoNotification
    {
        attribs.push_pair(
            ffi::GLX_CONTEXT_RESET_NOTIFICATION_STRATEGY_ARB,
            ffi::GLX_LOSE_CONTEXT_ON_RESET_ARB,
        );
    }
    if extensions.contains(GlxExtensions::CREATE_CONTEXT_NO_ERROR) && config.no_error {
        attribs.push_pair(ffi::GLX_CONTEXT_OPENGL_NO_ERROR_ARB, True);
    }

    attribs.terminate();
    attribs
}

fn profile_mask_bits(profile: GLProfile) -> c_int {
    match profile {
        GLProfile::Core => ffi::GLX_CONTEXT_CORE_PROFILE_BIT_ARB,
        GLProfile::Compatibility => ffi::GLX_CONTEXT_COMPATIBILITY_PROFILE_BIT_ARB,
        GLProfile::ES => ffi::GLX_CONTEXT_ES2_PROFILE_BIT_EXT,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ContextFlags;
    use crate::info::GLVersion;

    #[test]
    fn version_pair_always_leads_the_context_attributes() {
        let config = GLConfig {
            version: GLVersion::new(3, 2),
            profile: Some(GLProfile::Core),
            ..GLConfig::default()
        };
        let attribs = build_context_attributes(&config, GlxExtensions::empty());
        assert_eq!(
            attribs.entries(),
            &[
                ffi::GLX_CONTEXT_MAJOR_VERSION_ARB,
                3,
                ffi::GLX_CONTEXT_MINOR_VERSION_ARB,
                2,
                ffi::GLX_CONTEXT_PROFILE_MASK_ARB,
                ffi::GLX_CONTEXT_CORE_PROFILE_BIT_ARB,
                0,
            ]
        );
    }

    #[test]
    fn flags_are_omitted_when_empty() {
        let attribs = build_context_attributes(&GLConfig::default(), GlxExtensions::all());
        assert!(!attribs.entries().contains(&ffi::GLX_CONTEXT_FLAGS_ARB));

        let config = GLConfig {
            flags: ContextFlags::DEBUG | ContextFlags::FORWARD_COMPATIBLE,
            ..GLConfig::default()
        };
        let attribs = build_context_attributes(&config, GlxExtensions::empty());
        let entries = attribs.entries();
        let index = entries
            .iter()
            .position(|&attrib| attrib == ffi::GLX_CONTEXT_FLAGS_ARB)
            .expect("flags attribute missing");
        assert_eq!(entries[index + 1], 0x3);
    }

    #[test]
    fn extension_gated_attributes_require_their_extensions() {
        let config = GLConfig {
            release_behavior: ReleaseBehavior::None,
            reset_notification: ResetNotification::LoseContext,
            no_error: true,
            ..GLConfig::default()
        };

        let without = build_context_attributes(&config, GlxExtensions::empty());
        assert!(!without
            .entries()
            .contains(&ffi::GLX_CONTEXT_RELEASE_BEHAVIOR_ARB));
        assert!(!without
            .entries()
            .contains(&ffi::GLX_CONTEXT_RESET_NOTIFICATION_STRATEGY_ARB));
        assert!(!without
            .entries()
            .contains(&ffi::GLX_CONTEXT_OPENGL_NO_ERROR_ARB));

        let with = build_context_attributes(&config, GlxExtensions::all());
        assert!(with
            .entries()
            .contains(&ffi::GLX_CONTEXT_RELEASE_BEHAVIOR_ARB));
        assert!(with
            .entries()
            .contains(&ffi::GLX_CONTEXT_RESET_NOTIFICATION_STRATEGY_ARB));
        assert!(with.entries().contains(&ffi::GLX_CONTEXT_OPENGL_NO_ERROR_ARB));
    }

    #[test]
    fn default_release_and_reset_emit_nothing_even_with_extensions() {
        let attribs = build_context_attributes(&GLConfig::default(), GlxExtensions::all());
        let entries = attribs.entries();
        assert!(!entries.contains(&ffi::GLX_CONTEXT_RELEASE_BEHAVIOR_ARB));
        assert!(!entries.contains(&ffi::GLX_CONTEXT_RESET_NOTIFICATION_STRATEGY_ARB));
        assert!(!entries.contains(&ffi::GLX_CONTEXT_OPENGL_NO_ERROR_ARB));
    }

    #[test]
    fn es_profile_uses_the_es2_bit() {
        let config = GLConfig {
            version: GLVersion::new(2, 0),
            profile: Some(GLProfile::ES),
            ..GLConfig::default()
        };
        let attribs = build_context_attributes(&config, GlxExtensions::empty());
        let entries = attribs.entries();
        let index = entries
            .iter()
            .position(|&attrib| attrib == ffi::GLX_CONTEXT_PROFILE_MASK_ARB)
            .unwrap();
        assert_eq!(entries[index + 1], ffi::GLX_CONTEXT_ES2_PROFILE_BIT_EXT);
    }
}
