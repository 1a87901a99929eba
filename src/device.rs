// glxkit/src/device.rs
//
//! The driver session: library loading, entry-point resolution, and GLX
//! capability discovery.
//!
//! A [`Device`] is one loaded OpenGL driver bound to one [`Connection`].
//! Loading resolves the core GLX 1.x entry points out of the shared library,
//! confirms the server speaks GLX, and then probes the extension surface,
//! which requires briefly making a throwaway context current against an
//! invisible window. Only one session may exist per connection at a time.

use std::cell::Cell;
use std::env;
use std::ffi::{CStr, CString};
use std::mem;
use std::os::raw::{c_int, c_uchar, c_uint, c_void};
use std::ptr;
use std::sync::atomic::Ordering;

use bitflags::bitflags;
use log::{debug, info, warn};
use x11_dl::xlib::{
    AllocNone, CWBackPixel, CWBorderPixel, CWColormap, Colormap, False, InputOutput, True, Window,
    XSetWindowAttributes,
};

use crate::config::GLConfig;
use crate::connection::Connection;
use crate::error::Error;
use crate::ffi;
use crate::info::{GLProfile, GLVersion};
use crate::swap::SwapIntervalTearBehavior;

/// Overrides the driver library path.
pub(crate) const OPENGL_LIBRARY_ENV: &str = "GLXKIT_OPENGL_LIBRARY";
/// Forces the EGL handoff even for desktop GL requests.
pub(crate) const FORCE_EGL_ENV: &str = "GLXKIT_FORCE_EGL";
/// Declares that the loaded library is an ES driver with no desktop GL.
pub(crate) const ES_DRIVER_ENV: &str = "GLXKIT_OPENGL_ES_DRIVER";
/// Suppresses the direct-color visual preference.
pub(crate) const NO_DIRECT_COLOR_ENV: &str = "GLXKIT_NO_DIRECT_COLOR";

#[cfg(any(target_os = "netbsd", target_os = "openbsd"))]
static DEFAULT_OPENGL: &str = "libGL.so";
#[cfg(target_os = "macos")]
static DEFAULT_OPENGL: &str = "/opt/X11/lib/libGL.1.dylib";
#[cfg(not(any(target_os = "netbsd", target_os = "openbsd", target_os = "macos")))]
static DEFAULT_OPENGL: &str = "libGL.so.1";

/// The core GLX 1.x entry points. All of these must resolve for a session to
/// come up.
pub(crate) struct GlxFns {
    pub(crate) choose_visual: ffi::GlxChooseVisual,
    pub(crate) create_context: ffi::GlxCreateContext,
    pub(crate) destroy_context: ffi::GlxDestroyContext,
    pub(crate) make_current: ffi::GlxMakeCurrent,
    pub(crate) swap_buffers: ffi::GlxSwapBuffers,
    // Technically GLX 1.3 and later, but resolved unconditionally; absence
    // just disables the features built on them.
    pub(crate) query_drawable: Option<ffi::GlxQueryDrawable>,
    pub(crate) get_current_context: Option<ffi::GlxGetCurrentContext>,
    pub(crate) get_current_drawable: Option<ffi::GlxGetCurrentDrawable>,
    pub(crate) get_proc_address: Option<ffi::GlxGetProcAddress>,
}

/// Extension entry points, each present only if the server advertised the
/// owning extension and the driver resolved the symbol.
#[derive(Default)]
pub(crate) struct GlxExtFns {
    pub(crate) swap_interval_ext: Option<ffi::GlxSwapIntervalExt>,
    pub(crate) swap_interval_mesa: Option<ffi::GlxSwapIntervalMesa>,
    pub(crate) get_swap_interval_mesa: Option<ffi::GlxGetSwapIntervalMesa>,
    pub(crate) swap_interval_sgi: Option<ffi::GlxSwapIntervalSgi>,
    pub(crate) create_context_attribs_arb: Option<ffi::GlxCreateContextAttribsArb>,
    pub(crate) choose_fb_config: Option<ffi::GlxChooseFbConfig>,
    pub(crate) get_visual_from_fb_config: Option<ffi::GlxGetVisualFromFbConfig>,
}

bitflags! {
    /// GLX extensions that carry no entry points of their own; they gate
    /// attribute encodings elsewhere.
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub(crate) struct GlxExtensions: u32 {
        const SWAP_CONTROL_TEAR = 1 << 0;
        const VISUAL_RATING = 1 << 1;
        const VISUAL_INFO = 1 << 2;
        const CONTEXT_FLUSH_CONTROL = 1 << 3;
        const CREATE_CONTEXT_ROBUSTNESS = 1 << 4;
        const CREATE_CONTEXT_NO_ERROR = 1 << 5;
    }
}

/// The outcome of [`Device::load`].
pub enum Backend {
    /// GLX can satisfy the request; the live session is attached.
    Glx(Device),
    /// The request needs an OpenGL ES context this GLX stack cannot provide,
    /// or EGL was forced. The caller should hand off to its EGL backend; no
    /// GLX session remains loaded.
    Egl,
}

/// A loaded OpenGL driver session.
pub struct Device {
    pub(crate) connection: Connection,
    // Deliberately never dlclosed; see `Drop`.
    library: *mut c_void,
    pub(crate) glx: GlxFns,
    pub(crate) ext_fns: GlxExtFns,
    pub(crate) extensions: GlxExtensions,
    pub(crate) error_base: c_int,
    pub(crate) event_base: c_int,
    es_profile_max: Option<GLVersion>,
    pub(crate) tear_behavior: Cell<SwapIntervalTearBehavior>,
    // Fallback for drivers whose swap-control family has no getter.
    pub(crate) last_swap_interval: Cell<c_int>,
    pub(crate) config: GLConfig,
    latched: bool,
}

impl Device {
    /// Loads an OpenGL driver library and brings up a GLX session for
    /// `config`.
    ///
    /// The library path is taken from `path` if given, else from the
    /// `GLXKIT_OPENGL_LIBRARY` environment variable, else the platform
    /// default. Returns [`Backend::Egl`] when the probed capabilities show
    /// the request can only be satisfied by EGL; in that case nothing stays
    /// loaded and a subsequent `load` on the same connection is allowed.
    pub fn load(
        connection: &Connection,
        config: &GLConfig,
        path: Option<&str>,
    ) -> Result<Backend, Error> {
        if connection.driver_loaded.load(Ordering::SeqCst) {
            return Err(Error::AlreadyLoaded);
        }

        let path = match path {
            Some(path) => path.to_owned(),
            None => env::var(OPENGL_LIBRARY_ENV)
                .ok()
                .filter(|value| !value.is_empty())
                .unwrap_or_else(|| DEFAULT_OPENGL.to_owned()),
        };

        unsafe {
            let cpath = CString::new(path.as_str()).map_err(|_| Error::LibraryLoadFailed {
                path: path.clone(),
                detail: "path contains a NUL byte".to_owned(),
            })?;
            let handle = libc::dlopen(cpath.as_ptr(), libc::RTLD_NOW | libc::RTLD_GLOBAL);
            if handle.is_null() {
                return Err(Error::LibraryLoadFailed {
                    path,
                    detail: dlerror_string(),
                });
            }
            info!("loaded OpenGL library {}", path);

            // glXGetProcAddress itself has to come from the dynamic linker;
            // afterwards it takes precedence, since the driver's resolver
            // knows entry points the linker cannot see.
            let query_extension: ffi::GlxQueryExtension = required(dlsym(handle, "glXQueryExtension"))?;
            let get_proc_address: Option<ffi::GlxGetProcAddress> =
                optional(dlsym(handle, "glXGetProcAddressARB"));
            let lookup = |name: &str| -> *mut c_void {
                match get_proc_address {
                    Some(get_proc_address) => {
                        let name = CString::new(name).unwrap();
                        get_proc_address(name.as_ptr() as *const c_uchar)
                    }
                    None => dlsym(handle, name),
                }
            };

            let glx = GlxFns {
                choose_visual: required(lookup("glXChooseVisual"))?,
                create_context: required(lookup("glXCreateContext"))?,
                destroy_context: required(lookup("glXDestroyContext"))?,
                make_current: required(lookup("glXMakeCurrent"))?,
                swap_buffers: required(lookup("glXSwapBuffers"))?,
                query_drawable: optional(lookup("glXQueryDrawable")),
                get_current_context: optional(lookup("glXGetCurrentContext")),
                get_current_drawable: optional(lookup("glXGetCurrentDrawable")),
                get_proc_address,
            };

            let (mut error_base, mut event_base) = (0, 0);
            if query_extension(connection.display(), &mut error_base, &mut event_base) == False {
                return Err(Error::GlxUnsupported);
            }

            let mut device = Device {
                connection: connection.clone(),
                library: handle,
                glx,
                ext_fns: GlxExtFns::default(),
                extensions: GlxExtensions::empty(),
                error_base,
                event_base,
                es_profile_max: None,
                tear_behavior: Cell::new(SwapIntervalTearBehavior::Untested),
                last_swap_interval: Cell::new(0),
                config: config.clone(),
                latched: false,
            };

            device.init_extensions();

            if device.use_egl() {
                debug!("handing the GL request off to EGL");
                return Ok(Backend::Egl);
            }

            connection.driver_loaded.store(true, Ordering::SeqCst);
            device.latched = true;
            Ok(Backend::Glx(device))
        }
    }

    /// Whether this session's configuration can only be satisfied through
    /// EGL.
    ///
    /// ES 1.x has no GLX profile at all, and higher ES versions are only
    /// reachable through GLX up to the ceiling the driver advertised during
    /// the probe.
    pub fn use_egl(&self) -> bool {
        if env_flag(FORCE_EGL_ENV) {
            return true;
        }
        if self.config.profile != Some(GLProfile::ES) {
            return false;
        }
        if env_flag(ES_DRIVER_ENV) || self.config.version.major == 1 {
            return true;
        }
        match self.es_profile_max {
            Some(ceiling) => self.config.version > ceiling,
            None => true,
        }
    }

    /// The base value for GLX protocol error codes on this server.
    #[inline]
    pub fn error_base(&self) -> c_int {
        self.error_base
    }

    /// The base value for GLX protocol event codes on this server.
    #[inline]
    pub fn event_base(&self) -> c_int {
        self.event_base
    }

    /// The configuration this session was loaded with.
    #[inline]
    pub fn config(&self) -> &GLConfig {
        &self.config
    }

    /// Resolves a GL or GLX entry point by name, preferring the driver's own
    /// resolver over the dynamic linker.
    pub fn get_proc_address(&self, name: &str) -> *const c_void {
        self.get_proc_address_raw(name) as *const c_void
    }

    pub(crate) fn get_proc_address_raw(&self, name: &str) -> *mut c_void {
        unsafe {
            match self.glx.get_proc_address {
                Some(get_proc_address) => {
                    let name = CString::new(name).unwrap();
                    get_proc_address(name.as_ptr() as *const c_uchar)
                }
                None => dlsym(self.library, name),
            }
        }
    }

    /// Discovers the server's GLX extension surface and resolves the entry
    /// points behind it.
    ///
    /// The ES-profile ceiling can only be read off a current GL context, so
    /// the probe makes a throwaway legacy context current against a tiny
    /// unmapped window, restores whatever was current before, and tears
    /// everything down again.
    fn init_extensions(&mut self) {
        let xlib = self.connection.xlib.clone();
        let display = self.connection.display();
        let screen = self.connection.screen();

        unsafe {
            let mut probe_window: Window = 0;
            let mut probe_colormap: Colormap = 0;
            let mut probe_context: ffi::GLXContext = ptr::null_mut();
            let mut prev_context: ffi::GLXContext = ptr::null_mut();
            let mut prev_drawable: ffi::GLXDrawable = 0;

            if let Ok(vinfo) = self.get_visual(screen, false) {
                if let (Some(get_current_context), Some(get_current_drawable)) =
                    (self.glx.get_current_context, self.glx.get_current_drawable)
                {
                    prev_context = get_current_context();
                    prev_drawable = get_current_drawable();

                    let root = (xlib.XRootWindow)(display, screen);
                    let mut xattr: XSetWindowAttributes = mem::zeroed();
                    xattr.background_pixel = 0;
                    xattr.border_pixel = 0;
                    probe_colormap =
                        (xlib.XCreateColormap)(display, root, vinfo.visual(), AllocNone);
                    xattr.colormap = probe_colormap;
                    probe_window = (xlib.XCreateWindow)(
                        display,
                        root,
                        0,
                        0,
                        32,
                        32,
                        0,
                        vinfo.depth(),
                        InputOutput as c_uint,
                        vinfo.visual(),
                        CWBackPixel | CWBorderPixel | CWColormap,
                        &mut xattr,
                    );

                    probe_context =
                        (self.glx.create_context)(display, vinfo.as_ptr(), ptr::null_mut(), True);
                    if !probe_context.is_null() {
                        (self.glx.make_current)(display, probe_window, probe_context);
                    }
                }
            }

            let extensions_string = match optional::<ffi::GlxQueryExtensionsString>(
                self.get_proc_address_raw("glXQueryExtensionsString"),
            ) {
                Some(query_extensions_string) => {
                    let raw = query_extensions_string(display, screen);
                    if raw.is_null() {
                        String::new()
                    } else {
                        CStr::from_ptr(raw).to_string_lossy().into_owned()
                    }
                }
                // Fail closed; every check below misses.
                None => String::new(),
            };
            debug!("GLX extensions: {}", extensions_string);

            if has_extension("GLX_EXT_swap_control", &extensions_string) {
                self.ext_fns.swap_interval_ext =
                    optional(self.get_proc_address_raw("glXSwapIntervalEXT"));
                if self.ext_fns.swap_interval_ext.is_none() {
                    warn!("GLX_EXT_swap_control advertised but glXSwapIntervalEXT did not resolve");
                }
                if has_extension("GLX_EXT_swap_control_tear", &extensions_string) {
                    self.extensions |= GlxExtensions::SWAP_CONTROL_TEAR;
                }
            }
            if has_extension("GLX_MESA_swap_control", &extensions_string) {
                self.ext_fns.swap_interval_mesa =
                    optional(self.get_proc_address_raw("glXSwapIntervalMESA"));
                self.ext_fns.get_swap_interval_mesa =
                    optional(self.get_proc_address_raw("glXGetSwapIntervalMESA"));
            }
            if has_extension("GLX_SGI_swap_control", &extensions_string) {
                self.ext_fns.swap_interval_sgi =
                    optional(self.get_proc_address_raw("glXSwapIntervalSGI"));
            }
            if has_extension("GLX_ARB_create_context", &extensions_string) {
                self.ext_fns.create_context_attribs_arb =
                    optional(self.get_proc_address_raw("glXCreateContextAttribsARB"));
                if self.ext_fns.create_context_attribs_arb.is_none() {
                    warn!(
                        "GLX_ARB_create_context advertised but glXCreateContextAttribsARB \
                         did not resolve"
                    );
                }
                self.ext_fns.choose_fb_config =
                    optional(self.get_proc_address_raw("glXChooseFBConfig"));
                self.ext_fns.get_visual_from_fb_config =
                    optional(self.get_proc_address_raw("glXGetVisualFromFBConfig"));
            }
            if has_extension("GLX_EXT_visual_rating", &extensions_string) {
                self.extensions |= GlxExtensions::VISUAL_RATING;
            }
            if has_extension("GLX_EXT_visual_info", &extensions_string) {
                self.extensions |= GlxExtensions::VISUAL_INFO;
            }
            if has_extension("GLX_EXT_create_context_es2_profile", &extensions_string)
                && !probe_context.is_null()
            {
                self.es_profile_max = Some(self.deduce_max_supported_es_profile());
            }
            if has_extension("GLX_ARB_context_flush_control", &extensions_string) {
                self.extensions |= GlxExtensions::CONTEXT_FLUSH_CONTROL;
            }
            if has_extension("GLX_ARB_create_context_robustness", &extensions_string) {
                self.extensions |= GlxExtensions::CREATE_CONTEXT_ROBUSTNESS;
            }
            if has_extension("GLX_ARB_create_context_no_error", &extensions_string) {
                self.extensions |= GlxExtensions::CREATE_CONTEXT_NO_ERROR;
            }

            debug!(
                "GLX capabilities: {:?}, ES ceiling {:?}",
                self.extensions, self.es_profile_max
            );

            if !probe_context.is_null() {
                (self.glx.make_current)(display, 0, ptr::null_mut());
                (self.glx.destroy_context)(display, probe_context);
                if !prev_context.is_null() && prev_drawable != 0 {
                    (self.glx.make_current)(display, prev_drawable, prev_context);
                }
            }
            if probe_window != 0 {
                (xlib.XDestroyWindow)(display, probe_window);
            }
            if probe_colormap != 0 {
                (xlib.XFreeColormap)(display, probe_colormap);
            }
            self.connection.pump_events();
        }
    }

    /// Reads the highest ES version reachable through
    /// `GLX_EXT_create_context_es2_profile` off the current context's
    /// compatibility extensions. A driver that advertises the GLX extension
    /// but none of the GL ones supports ES 2.0 only.
    unsafe fn deduce_max_supported_es_profile(&self) -> GLVersion {
        let extensions = match optional::<ffi::GlGetString>(self.get_proc_address_raw("glGetString"))
        {
            Some(gl_get_string) => {
                let raw = gl_get_string(ffi::GL_EXTENSIONS);
                if raw.is_null() {
                    String::new()
                } else {
                    CStr::from_ptr(raw as *const _).to_string_lossy().into_owned()
                }
            }
            None => String::new(),
        };

        if has_extension("GL_ARB_ES3_2_compatibility", &extensions) {
            GLVersion::new(3, 2)
        } else if has_extension("GL_ARB_ES3_1_compatibility", &extensions) {
            GLVersion::new(3, 1)
        } else if has_extension("GL_ARB_ES3_compatibility", &extensions) {
            GLVersion::new(3, 0)
        } else {
            GLVersion::new(2, 0)
        }
    }
}

impl Drop for Device {
    fn drop(&mut self) {
        // The library handle is leaked on purpose. DRI drivers register
        // shutdown hooks with the X connection, and unloading the library
        // out from under them crashes on the next XCloseDisplay.
        if self.latched {
            self.connection.driver_loaded.store(false, Ordering::SeqCst);
        }
    }
}

/// Exact-token membership test against a space-delimited extension string.
/// Substring hits do not count, so `GLX_EXT_swap_control` never matches an
/// advertisement of only `GLX_EXT_swap_control_tear`.
pub(crate) fn has_extension(extension: &str, extensions: &str) -> bool {
    // Extension names never contain spaces; a spaced or empty needle is
    // malformed and matches nothing.
    if extension.is_empty() || extension.contains(' ') {
        return false;
    }
    extensions.split(' ').any(|token| token == extension)
}

/// Boolean environment hint: set and not "0"/"false" means true.
pub(crate) fn env_flag(name: &str) -> bool {
    match env::var(name) {
        Ok(value) => {
            let value = value.trim();
            !(value.is_empty() || value == "0" || value.eq_ignore_ascii_case("false"))
        }
        Err(_) => false,
    }
}

/// Presence-based environment hint.
pub(crate) fn prefer_direct_color_visuals() -> bool {
    env::var_os(NO_DIRECT_COLOR_ENV).is_none()
}

unsafe fn dlsym(handle: *mut c_void, name: &str) -> *mut c_void {
    let name = CString::new(name).unwrap();
    libc::dlsym(handle, name.as_ptr())
}

unsafe fn dlerror_string() -> String {
    let message = libc::dlerror();
    if message.is_null() {
        "unknown dlopen failure".to_owned()
    } else {
        CStr::from_ptr(message).to_string_lossy().into_owned()
    }
}

unsafe fn optional<F>(pointer: *mut c_void) -> Option<F> {
    if pointer.is_null() {
        None
    } else {
        Some(mem::transmute_copy(&pointer))
    }
}

unsafe fn required<F>(pointer: *mut c_void) -> Result<F, Error> {
    optional(pointer).ok_or(Error::FunctionsMissing)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    fn extension_matching_is_exact_per_token() {
        let advertised = "GLX_EXT_swap_control_tear GLX_ARB_create_context GLX_EXT_visual_info";
        assert!(has_extension("GLX_ARB_create_context", advertised));
        assert!(has_extension("GLX_EXT_swap_control_tear", advertised));
        assert!(has_extension("GLX_EXT_visual_info", advertised));

        // Prefix of an advertised token is not a match.
        assert!(!has_extension("GLX_EXT_swap_control", advertised));
        assert!(!has_extension("GLX_ARB_create", advertised));
        // Nor is a longer name that merely starts with one.
        assert!(!has_extension("GLX_EXT_visual_info_extended", advertised));
    }

    #[test]
    fn extension_matching_rejects_malformed_needles() {
        let advertised = "GLX_EXT_visual_info";
        assert!(!has_extension("", advertised));
        assert!(!has_extension("GLX_EXT visual_info", advertised));
        assert!(!has_extension("GLX_EXT_visual_info", ""));
    }

    #[test]
    fn extension_matching_tolerates_extra_spaces() {
        assert!(has_extension(
            "GLX_SGI_swap_control",
            "GLX_MESA_swap_control  GLX_SGI_swap_control "
        ));
    }

    #[test]
    #[serial]
    fn env_flag_semantics() {
        const NAME: &str = "GLXKIT_TEST_FLAG";
        env::remove_var(NAME);
        assert!(!env_flag(NAME));

        env::set_var(NAME, "1");
        assert!(env_flag(NAME));
        env::set_var(NAME, "true");
        assert!(env_flag(NAME));
        env::set_var(NAME, "0");
        assert!(!env_flag(NAME));
        env::set_var(NAME, "false");
        assert!(!env_flag(NAME));
        env::set_var(NAME, "");
        assert!(!env_flag(NAME));
        env::remove_var(NAME);
    }

    #[test]
    #[serial]
    fn direct_color_preference_is_presence_based() {
        env::remove_var(NO_DIRECT_COLOR_ENV);
        assert!(prefer_direct_color_visuals());
        env::set_var(NO_DIRECT_COLOR_ENV, "");
        assert!(!prefer_direct_color_visuals());
        env::remove_var(NO_DIRECT_COLOR_ENV);
    }
}
