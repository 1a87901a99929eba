// glxkit/src/visual.rs
//
//! Visual and FBConfig selection.
//!
//! One [`GLConfig`](crate::GLConfig) has to be expressed in two different
//! attribute encodings: the legacy `glXChooseVisual` list, where boolean
//! attributes are bare tokens, and the GLX 1.3 `glXChooseFBConfig` list,
//! where they carry a value. Both are built here, along with the retry
//! policy for servers that reject the optional visual-type attribute.

use std::mem;
use std::os::raw::{c_int, c_void};
use std::ptr;
use std::slice;
use std::sync::Arc;

use x11_dl::xlib::{
    DirectColor, TrueColor, VisualID, VisualIDMask, VisualScreenMask, Visual, XVisualInfo, Xlib,
    True,
};

use crate::config::GLConfig;
use crate::device::{prefer_direct_color_visuals, Device, GlxExtensions};
use crate::error::Error;
use crate::ffi;

/// Hard capacity bound of a GLX attribute list; the protocol expects a flat
/// sentinel-terminated array.
pub(crate) const MAX_ATTRIBUTES: usize = 64;

/// A fixed-capacity, sentinel-terminated GLX attribute list.
///
/// Overflow is a programming error and asserts. The visual-type attribute is
/// the one the selector may relax after a rejected query, so its position is
/// recorded when it is appended.
pub(crate) struct AttribList {
    attribs: [c_int; MAX_ATTRIBUTES],
    len: usize,
    visual_type_attrib: Option<usize>,
}

impl AttribList {
    pub(crate) fn new() -> AttribList {
        AttribList {
            attribs: [0; MAX_ATTRIBUTES],
            len: 0,
            visual_type_attrib: None,
        }
    }

    pub(crate) fn push(&mut self, value: c_int) {
        assert!(self.len < MAX_ATTRIBUTES, "GLX attribute list overflow");
        self.attribs[self.len] = value;
        self.len += 1;
    }

    pub(crate) fn push_pair(&mut self, attrib: c_int, value: c_int) {
        self.push(attrib);
        self.push(value);
    }

    /// Appends a pair that [`relax_visual_type`](Self::relax_visual_type)
    /// may later drop.
    pub(crate) fn push_relaxable_pair(&mut self, attrib: c_int, value: c_int) {
        self.visual_type_attrib = Some(self.len);
        self.push_pair(attrib, value);
    }

    pub(crate) fn terminate(&mut self) {
        self.push(0);
    }

    /// Drops the relaxable visual-type pair by overwriting its key with the
    /// list terminator. One-shot: returns false if there is nothing (left)
    /// to relax.
    pub(crate) fn relax_visual_type(&mut self) -> bool {
        match self.visual_type_attrib.take() {
            Some(index) => {
                self.attribs[index] = 0;
                true
            }
            None => false,
        }
    }

    pub(crate) fn as_ptr(&self) -> *const c_int {
        self.attribs.as_ptr()
    }

    pub(crate) fn as_mut_ptr(&mut self) -> *mut c_int {
        self.attribs.as_mut_ptr()
    }

    #[cfg(test)]
    pub(crate) fn entries(&self) -> &[c_int] {
        &self.attribs[..self.len]
    }
}

/// Builds the attribute list for one pixel-format request.
///
/// The legacy and FBConfig encodings differ in how booleans are spelled:
/// `GLX_DOUBLEBUFFER` and `GLX_STEREO` are bare in the former and carry a
/// `True` in the latter.
pub(crate) fn build_config_attributes(
    config: &GLConfig,
    extensions: GlxExtensions,
    for_fbconfig: bool,
    transparent: bool,
    prefer_direct_color: bool,
) -> AttribList {
    let mut attribs = AttribList::new();

    if for_fbconfig {
        attribs.push(ffi::GLX_RENDER_TYPE);
        attribs.push(if config.float_buffers {
            ffi::GLX_RGBA_FLOAT_BIT_ARB
        } else {
            ffi::GLX_RGBA_BIT
        });
    } else {
        attribs.push(ffi::GLX_RGBA);
    }

    attribs.push_pair(ffi::GLX_RED_SIZE, config.red_size as c_int);
    attribs.push_pair(ffi::GLX_GREEN_SIZE, config.green_size as c_int);
    attribs.push_pair(ffi::GLX_BLUE_SIZE, config.blue_size as c_int);

    if config.alpha_size != 0 {
        attribs.push_pair(ffi::GLX_ALPHA_SIZE, config.alpha_size as c_int);
    }

    if config.double_buffer {
        attribs.push(ffi::GLX_DOUBLEBUFFER);
        if for_fbconfig {
            attribs.push(True);
        }
    }

    attribs.push_pair(ffi::GLX_DEPTH_SIZE, config.depth_size as c_int);

    if config.stencil_size != 0 {
        attribs.push_pair(ffi::GLX_STENCIL_SIZE, config.stencil_size as c_int);
    }
    if config.accum_red_size != 0 {
        attribs.push_pair(ffi::GLX_ACCUM_RED_SIZE, config.accum_red_size as c_int);
    }
    if config.accum_green_size != 0 {
        attribs.push_pair(ffi::GLX_ACCUM_GREEN_SIZE, config.accum_green_size as c_int);
    }
    if config.accum_blue_size != 0 {
        attribs.push_pair(ffi::GLX_ACCUM_BLUE_SIZE, config.accum_blue_size as c_int);
    }
    if config.accum_alpha_size != 0 {
        attribs.push_pair(ffi::GLX_ACCUM_ALPHA_SIZE, config.accum_alpha_size as c_int);
    }

    if config.stereo {
        attribs.push(ffi::GLX_STEREO);
        if for_fbconfig {
            attribs.push(True);
        }
    }

    if config.multisample_buffers != 0 {
        attribs.push_pair(
            ffi::GLX_SAMPLE_BUFFERS_ARB,
            config.multisample_buffers as c_int,
        );
    }
    if config.multisample_samples != 0 {
        attribs.push_pair(ffi::GLX_SAMPLES_ARB, config.multisample_samples as c_int);
    }

    if config.float_buffers {
        attribs.push_pair(ffi::GLX_RENDER_TYPE, ffi::GLX_RGBA_FLOAT_TYPE_ARB);
    }

    if config.srgb_capable {
        // Always carries a value, for_fbconfig or not.
        attribs.push_pair(ffi::GLX_FRAMEBUFFER_SRGB_CAPABLE_ARB, True);
    }

    if let Some(accelerated) = config.accelerated {
        if extensions.contains(GlxExtensions::VISUAL_RATING) {
            attribs.push_pair(
                ffi::GLX_VISUAL_CAVEAT_EXT,
                if accelerated {
                    ffi::GLX_NONE_EXT
                } else {
                    ffi::GLX_SLOW_VISUAL_EXT
                },
            );
        }
    }

    // Direct-color visuals never carry an alpha channel, so skip the
    // preference when a transparent buffer was requested. Some servers fail
    // the query outright on this attribute, which is why it goes last and is
    // the one the selector may relax.
    if !transparent && prefer_direct_color && extensions.contains(GlxExtensions::VISUAL_INFO) {
        attribs.push_relaxable_pair(ffi::GLX_X_VISUAL_TYPE_EXT, ffi::GLX_DIRECT_COLOR_EXT);
    }

    attribs.terminate();
    attribs
}

/// Whether a visual's derived pixel format carries an alpha channel: the
/// color channel masks leave unused bits below the visual's depth.
pub(crate) fn vinfo_has_alpha(vinfo: &XVisualInfo) -> bool {
    if vinfo.class != TrueColor && vinfo.class != DirectColor {
        return false;
    }
    let color_bits = (vinfo.red_mask | vinfo.green_mask | vinfo.blue_mask).count_ones();
    vinfo.depth as u32 > color_bits
}

/// An owned `XVisualInfo`, freed with `XFree` when dropped.
pub struct VisualInfo {
    vinfo: *mut XVisualInfo,
    xlib: Arc<Xlib>,
}

impl VisualInfo {
    pub(crate) unsafe fn from_raw(vinfo: *mut XVisualInfo, xlib: Arc<Xlib>) -> VisualInfo {
        debug_assert!(!vinfo.is_null());
        VisualInfo { vinfo, xlib }
    }

    /// The server-side visual ID.
    #[inline]
    pub fn visual_id(&self) -> VisualID {
        unsafe { (*self.vinfo).visualid }
    }

    /// The visual's depth in bits.
    #[inline]
    pub fn depth(&self) -> c_int {
        unsafe { (*self.vinfo).depth }
    }

    /// Whether the visual's derived pixel format has an alpha channel.
    #[inline]
    pub fn has_alpha(&self) -> bool {
        unsafe { vinfo_has_alpha(&*self.vinfo) }
    }

    /// The raw `Visual` pointer, e.g. for colormap or window creation.
    #[inline]
    pub fn visual(&self) -> *mut Visual {
        unsafe { (*self.vinfo).visual }
    }

    /// The raw `XVisualInfo` pointer. Valid as long as `self` is alive.
    #[inline]
    pub fn as_ptr(&self) -> *mut XVisualInfo {
        self.vinfo
    }
}

impl Drop for VisualInfo {
    fn drop(&mut self) {
        unsafe {
            (self.xlib.XFree)(self.vinfo as *mut c_void);
        }
    }
}

impl Device {
    /// Finds a visual matching this session's pixel-format request.
    ///
    /// Tries the FBConfig path first when the GLX 1.3 entry points resolved,
    /// relaxing the visual-type attribute once if the server rejects the
    /// query, then falls back to the legacy encoding with the same retry.
    /// When `transparent` is set, alpha-capable candidates win, down to a
    /// last-resort scan of every visual on the screen.
    ///
    /// Ownership of the visual transfers to the caller.
    pub fn get_visual(&self, screen: c_int, transparent: bool) -> Result<VisualInfo, Error> {
        let xlib = &self.connection.xlib;
        let display = self.connection.display();

        unsafe {
            let mut vinfo: *mut XVisualInfo = ptr::null_mut();

            if let (Some(choose_fb_config), Some(get_visual_from_fb_config)) = (
                self.ext_fns.choose_fb_config,
                self.ext_fns.get_visual_from_fb_config,
            ) {
                let mut attribs = self.config_attributes(true, transparent);
                let mut fbcount = 0;
                let mut configs = choose_fb_config(display, screen, attribs.as_ptr(), &mut fbcount);
                if configs.is_null() && attribs.relax_visual_type() {
                    configs = choose_fb_config(display, screen, attribs.as_ptr(), &mut fbcount);
                }

                if !configs.is_null() {
                    let candidates = slice::from_raw_parts(configs, fbcount.max(0) as usize);

                    if transparent {
                        for &candidate in candidates {
                            let candidate_vinfo = get_visual_from_fb_config(display, candidate);
                            if candidate_vinfo.is_null() {
                                continue;
                            }
                            if vinfo_has_alpha(&*candidate_vinfo) {
                                vinfo = candidate_vinfo;
                                break;
                            }
                            (xlib.XFree)(candidate_vinfo as *mut c_void);
                        }
                    }

                    if vinfo.is_null() && !candidates.is_empty() {
                        vinfo = get_visual_from_fb_config(display, candidates[0]);
                    }
                    (xlib.XFree)(configs as *mut c_void);
                }
            }

            if vinfo.is_null() {
                let mut attribs = self.config_attributes(false, transparent);
                vinfo = (self.glx.choose_visual)(display, screen, attribs.as_mut_ptr());
                if vinfo.is_null() && attribs.relax_visual_type() {
                    vinfo = (self.glx.choose_visual)(display, screen, attribs.as_mut_ptr());
                }
            }

            if transparent && !vinfo.is_null() && !vinfo_has_alpha(&*vinfo) {
                // The chosen visual is opaque; take any alpha-bearing visual
                // on the screen over it.
                if let Some(alpha_vinfo) = self.first_transparent_visual(screen) {
                    (xlib.XFree)(vinfo as *mut c_void);
                    vinfo = alpha_vinfo;
                }
            }

            if vinfo.is_null() {
                return Err(Error::NoMatchingVisual);
            }
            Ok(VisualInfo::from_raw(vinfo, self.connection.xlib.clone()))
        }
    }

    pub(crate) fn config_attributes(&self, for_fbconfig: bool, transparent: bool) -> AttribList {
        build_config_attributes(
            &self.config,
            self.extensions,
            for_fbconfig,
            transparent,
            prefer_direct_color_visuals(),
        )
    }

    /// Scans every visual on `screen` for the first one whose format has an
    /// alpha channel.
    unsafe fn first_transparent_visual(&self, screen: c_int) -> Option<*mut XVisualInfo> {
        let xlib = &self.connection.xlib;
        let display = self.connection.display();

        let mut template: XVisualInfo = mem::zeroed();
        template.screen = screen;
        let mut count = 0;
        let list = (xlib.XGetVisualInfo)(display, VisualScreenMask, &mut template, &mut count);
        if list.is_null() {
            return None;
        }

        let mut found: Option<VisualID> = None;
        for index in 0..count.max(0) as usize {
            let candidate = &*list.add(index);
            if vinfo_has_alpha(candidate) {
                found = Some(candidate.visualid);
                break;
            }
        }
        (xlib.XFree)(list as *mut c_void);

        let visualid = found?;
        let mut template: XVisualInfo = mem::zeroed();
        template.screen = screen;
        template.visualid = visualid;
        let mut count = 0;
        let single = (xlib.XGetVisualInfo)(
            display,
            VisualScreenMask | VisualIDMask,
            &mut template,
            &mut count,
        );
        if single.is_null() {
            None
        } else {
            Some(single)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GLConfig;
    use crate::info::GLVersion;

    fn build(
        config: &GLConfig,
        extensions: GlxExtensions,
        for_fbconfig: bool,
        transparent: bool,
    ) -> AttribList {
        build_config_attributes(config, extensions, for_fbconfig, transparent, true)
    }

    #[test]
    fn legacy_encoding_of_the_default_config() {
        let attribs = build(&GLConfig::default(), GlxExtensions::empty(), false, false);
        assert_eq!(
            attribs.entries(),
            &[
                ffi::GLX_RGBA,
                ffi::GLX_RED_SIZE,
                8,
                ffi::GLX_GREEN_SIZE,
                8,
                ffi::GLX_BLUE_SIZE,
                8,
                ffi::GLX_DOUBLEBUFFER,
                ffi::GLX_DEPTH_SIZE,
                16,
                0,
            ]
        );
    }

    #[test]
    fn fbconfig_encoding_gives_booleans_values() {
        let attribs = build(&GLConfig::default(), GlxExtensions::empty(), true, false);
        assert_eq!(
            attribs.entries(),
            &[
                ffi::GLX_RENDER_TYPE,
                ffi::GLX_RGBA_BIT,
                ffi::GLX_RED_SIZE,
                8,
                ffi::GLX_GREEN_SIZE,
                8,
                ffi::GLX_BLUE_SIZE,
                8,
                ffi::GLX_DOUBLEBUFFER,
                True,
                ffi::GLX_DEPTH_SIZE,
                16,
                0,
            ]
        );
    }

    #[test]
    fn construction_is_deterministic() {
        let config = GLConfig {
            alpha_size: 8,
            stencil_size: 8,
            multisample_buffers: 1,
            multisample_samples: 4,
            srgb_capable: true,
            version: GLVersion::new(3, 2),
            ..GLConfig::default()
        };
        let first = build(&config, GlxExtensions::all(), true, false);
        let second = build(&config, GlxExtensions::all(), true, false);
        assert_eq!(first.entries(), second.entries());
    }

    #[test]
    fn optional_sizes_are_omitted_when_zero() {
        let attribs = build(&GLConfig::default(), GlxExtensions::empty(), true, false);
        assert!(!attribs.entries().contains(&ffi::GLX_ALPHA_SIZE));
        assert!(!attribs.entries().contains(&ffi::GLX_STENCIL_SIZE));
        assert!(!attribs.entries().contains(&ffi::GLX_SAMPLES_ARB));

        let config = GLConfig {
            alpha_size: 8,
            stencil_size: 8,
            multisample_buffers: 1,
            multisample_samples: 4,
            ..GLConfig::default()
        };
        let attribs = build(&config, GlxExtensions::empty(), true, false);
        assert!(attribs.entries().contains(&ffi::GLX_ALPHA_SIZE));
        assert!(attribs.entries().contains(&ffi::GLX_STENCIL_SIZE));
        assert!(attribs.entries().contains(&ffi::GLX_SAMPLES_ARB));
    }

    #[test]
    fn visual_caveat_requires_the_rating_extension() {
        let config = GLConfig {
            accelerated: Some(true),
            ..GLConfig::default()
        };
        let without = build(&config, GlxExtensions::empty(), true, false);
        assert!(!without.entries().contains(&ffi::GLX_VISUAL_CAVEAT_EXT));

        let with = build(&config, GlxExtensions::VISUAL_RATING, true, false);
        let entries = with.entries();
        let index = entries
            .iter()
            .position(|&attrib| attrib == ffi::GLX_VISUAL_CAVEAT_EXT)
            .expect("caveat attribute missing");
        assert_eq!(entries[index + 1], ffi::GLX_NONE_EXT);

        let config = GLConfig {
            accelerated: Some(false),
            ..config
        };
        let slow = build(&config, GlxExtensions::VISUAL_RATING, true, false);
        let entries = slow.entries();
        let index = entries
            .iter()
            .position(|&attrib| attrib == ffi::GLX_VISUAL_CAVEAT_EXT)
            .unwrap();
        assert_eq!(entries[index + 1], ffi::GLX_SLOW_VISUAL_EXT);
    }

    #[test]
    fn visual_type_is_relaxable_exactly_once() {
        let mut attribs = build(&GLConfig::default(), GlxExtensions::VISUAL_INFO, true, false);
        let entries = attribs.entries();
        let index = entries
            .iter()
            .position(|&attrib| attrib == ffi::GLX_X_VISUAL_TYPE_EXT)
            .expect("visual type attribute missing");
        assert_eq!(entries[index + 1], ffi::GLX_DIRECT_COLOR_EXT);

        assert!(attribs.relax_visual_type());
        // The key slot becomes the terminator, truncating the pair.
        assert_eq!(attribs.entries()[index], 0);
        assert!(!attribs.relax_visual_type());
    }

    #[test]
    fn transparent_requests_skip_the_direct_color_preference() {
        let attribs = build(&GLConfig::default(), GlxExtensions::VISUAL_INFO, true, true);
        assert!(!attribs.entries().contains(&ffi::GLX_X_VISUAL_TYPE_EXT));
    }

    #[test]
    fn everything_on_fits_the_fixed_capacity_and_ends_with_the_sentinel() {
        let config = GLConfig {
            alpha_size: 8,
            stencil_size: 8,
            accum_red_size: 16,
            accum_green_size: 16,
            accum_blue_size: 16,
            accum_alpha_size: 16,
            stereo: true,
            multisample_buffers: 1,
            multisample_samples: 16,
            float_buffers: true,
            srgb_capable: true,
            accelerated: Some(true),
            ..GLConfig::default()
        };
        let attribs = build(&config, GlxExtensions::all(), true, false);
        let entries = attribs.entries();
        assert!(entries.len() <= MAX_ATTRIBUTES);
        assert_eq!(*entries.last().unwrap(), 0);
    }

    #[test]
    fn alpha_derivation_from_masks() {
        let mut vinfo: XVisualInfo = unsafe { mem::zeroed() };
        vinfo.class = TrueColor;
        vinfo.depth = 32;
        vinfo.red_mask = 0x00ff_0000;
        vinfo.green_mask = 0x0000_ff00;
        vinfo.blue_mask = 0x0000_00ff;
        assert!(vinfo_has_alpha(&vinfo));

        vinfo.depth = 24;
        assert!(!vinfo_has_alpha(&vinfo));

        vinfo.depth = 32;
        vinfo.class = 3; // PseudoColor
        assert!(!vinfo_has_alpha(&vinfo));
    }
}
