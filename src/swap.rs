// glxkit/src/swap.rs
//
//! Swap-interval control and the `GLX_EXT_swap_control_tear` ambiguity.
//!
//! Three extension families can set the interval, tried in order of
//! usefulness: EXT (per-drawable, supports adaptive vsync), MESA
//! (per-context, has a getter), SGI (per-context, no getter, positive
//! intervals only). On top of that, NVIDIA and Mesa shipped incompatible
//! readings of what `GLX_LATE_SWAPS_TEAR_EXT` reports, so the first interval
//! query runs a one-time probe to find out which driver this is and caches
//! the verdict for the life of the session.

use std::os::raw::{c_int, c_uint};

use log::debug;

use crate::context::NativeWidget;
use crate::device::{Device, GlxExtensions};
use crate::error::Error;
use crate::ffi;

/// Which reading of `GLX_LATE_SWAPS_TEAR_EXT` the active driver implements.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SwapIntervalTearBehavior {
    /// The probe has not run yet.
    Untested,
    /// The extension is absent or the probe was inconclusive.
    Unknown,
    /// The attribute reports whether late swapping is in use right now.
    Nvidia,
    /// The attribute reports whether the drawable is capable of late
    /// swapping at all.
    Mesa,
}

/// Maps the probed attribute value, read while the interval is pinned to
/// zero, to a driver behavior. Zero can only mean the NVIDIA reading (not in
/// use), one can only mean the Mesa reading (capable); anything else is a
/// driver this classification does not know.
pub(crate) fn classify_tear_probe(value: c_uint) -> SwapIntervalTearBehavior {
    match value {
        0 => SwapIntervalTearBehavior::Nvidia,
        1 => SwapIntervalTearBehavior::Mesa,
        _ => SwapIntervalTearBehavior::Unknown,
    }
}

/// Recovers the signed interval from the unsigned attribute pair. Mesa
/// drivers store the sign in the value itself; NVIDIA-style drivers report
/// the magnitude and flag lateness separately.
pub(crate) fn signed_swap_interval(
    behavior: SwapIntervalTearBehavior,
    value: c_uint,
    allow_late: c_uint,
) -> c_int {
    match behavior {
        SwapIntervalTearBehavior::Mesa => value as c_int,
        _ => {
            if allow_late != 0 && value > 0 {
                // Wrapping: a hostile driver can report a value whose
                // negation has no c_int representation.
                (value as c_int).wrapping_neg()
            } else {
                value as c_int
            }
        }
    }
}

impl Device {
    /// Sets the swap interval for `widget`.
    ///
    /// Negative intervals request adaptive vsync and need
    /// `GLX_EXT_swap_control_tear`. The MESA and SGI families apply to the
    /// current context rather than the drawable.
    pub fn set_swap_interval(&self, widget: &NativeWidget, interval: c_int) -> Result<(), Error> {
        if interval < 0 && !self.extensions.contains(GlxExtensions::SWAP_CONTROL_TEAR) {
            return Err(Error::NegativeSwapIntervalUnsupported);
        }

        let display = self.connection.display();
        let drawable = widget.window;

        unsafe {
            if let Some(swap_interval_ext) = self.ext_fns.swap_interval_ext {
                // Some NVIDIA drivers cache the interval and ignore a change
                // unless the current value gets re-applied first, so set it
                // twice.
                let current = self.get_swap_interval(widget).unwrap_or(0);
                swap_interval_ext(display, drawable, current);
                swap_interval_ext(display, drawable, interval);
                self.last_swap_interval.set(interval);
                Ok(())
            } else if let Some(swap_interval_mesa) = self.ext_fns.swap_interval_mesa {
                if swap_interval_mesa(interval) == 0 {
                    self.last_swap_interval.set(interval);
                    Ok(())
                } else {
                    Err(Error::SwapIntervalFailed("glXSwapIntervalMESA"))
                }
            } else if let Some(swap_interval_sgi) = self.ext_fns.swap_interval_sgi {
                if swap_interval_sgi(interval) == 0 {
                    self.last_swap_interval.set(interval);
                    Ok(())
                } else {
                    Err(Error::SwapIntervalFailed("glXSwapIntervalSGI"))
                }
            } else {
                Err(Error::SwapControlUnsupported)
            }
        }
    }

    /// Reads back the swap interval for `widget`, negative when adaptive
    /// vsync is engaged.
    ///
    /// Drivers whose swap-control family has no getter fall back to the last
    /// interval set through this session.
    pub fn get_swap_interval(&self, widget: &NativeWidget) -> Result<c_int, Error> {
        let display = self.connection.display();
        let drawable = widget.window;

        unsafe {
            if let (Some(_), Some(query_drawable)) =
                (self.ext_fns.swap_interval_ext, self.glx.query_drawable)
            {
                let mut allow_late: c_uint = 0;
                if self.extensions.contains(GlxExtensions::SWAP_CONTROL_TEAR) {
                    query_drawable(
                        display,
                        drawable,
                        ffi::GLX_LATE_SWAPS_TEAR_EXT,
                        &mut allow_late,
                    );
                }
                let mut value: c_uint = 0;
                query_drawable(display, drawable, ffi::GLX_SWAP_INTERVAL_EXT, &mut value);

                let behavior = self.check_swap_interval_tear_behavior(drawable, value, allow_late);
                Ok(signed_swap_interval(behavior, value, allow_late))
            } else if let Some(get_swap_interval_mesa) = self.ext_fns.get_swap_interval_mesa {
                let value = get_swap_interval_mesa();
                if value == ffi::GLX_BAD_CONTEXT {
                    return Err(Error::BadContext);
                }
                Ok(value)
            } else {
                Ok(self.last_swap_interval.get())
            }
        }
    }

    /// The cached verdict of the tear-behavior probe.
    pub fn swap_interval_tear_behavior(&self) -> SwapIntervalTearBehavior {
        self.tear_behavior.get()
    }

    /// One-time probe: pin the interval to zero, read
    /// `GLX_LATE_SWAPS_TEAR_EXT`, classify the answer, then restore the
    /// caller's interval with its sign reconstructed under the verdict.
    fn check_swap_interval_tear_behavior(
        &self,
        drawable: ffi::GLXDrawable,
        current_value: c_uint,
        current_allow_late: c_uint,
    ) -> SwapIntervalTearBehavior {
        let cached = self.tear_behavior.get();
        if cached != SwapIntervalTearBehavior::Untested {
            return cached;
        }

        if !self.extensions.contains(GlxExtensions::SWAP_CONTROL_TEAR) {
            self.tear_behavior.set(SwapIntervalTearBehavior::Unknown);
            return SwapIntervalTearBehavior::Unknown;
        }
        let (Some(swap_interval_ext), Some(query_drawable)) =
            (self.ext_fns.swap_interval_ext, self.glx.query_drawable)
        else {
            self.tear_behavior.set(SwapIntervalTearBehavior::Unknown);
            return SwapIntervalTearBehavior::Unknown;
        };

        let display = self.connection.display();
        unsafe {
            // Same re-apply workaround as set_swap_interval.
            swap_interval_ext(display, drawable, current_value as c_int);
            swap_interval_ext(display, drawable, 0);

            let mut probed: c_uint = !0;
            query_drawable(display, drawable, ffi::GLX_LATE_SWAPS_TEAR_EXT, &mut probed);
            let behavior = classify_tear_probe(probed);
            debug!("swap_control_tear probe read {}, verdict {:?}", probed, behavior);
            self.tear_behavior.set(behavior);

            let mut original = current_value as c_int;
            if behavior == SwapIntervalTearBehavior::Nvidia && current_allow_late != 0 {
                original = original.wrapping_neg();
            }
            swap_interval_ext(display, drawable, original);
            behavior
        }
    }
}
