//! A wrapper for X11 server connections (`DISPLAY` variables).

use std::mem;
use std::os::raw::c_int;
use std::ptr;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use x11_dl::xlib::{Display, False, XEvent, Xlib};

use crate::error::Error;

/// A connection to the X display server.
///
/// Cloning a `Connection` retains the same underlying display; the display
/// is closed when the last owning clone goes away. Borrowed displays (from
/// [`Connection::from_raw_display`]) are never closed.
pub struct Connection {
    pub(crate) xlib: Arc<Xlib>,
    pub(crate) native_display: Box<dyn NativeDisplay>,
    pub(crate) screen: c_int,
    // At most one GLX driver session may exist per connection; `Device::load`
    // latches this and `Drop for Device` releases it.
    pub(crate) driver_loaded: Arc<AtomicBool>,
}

unsafe impl Send for Connection {}

pub(crate) trait NativeDisplay {
    fn display(&self) -> *mut Display;
    fn retain(&self) -> Box<dyn NativeDisplay>;
}

impl Clone for Connection {
    fn clone(&self) -> Connection {
        Connection {
            xlib: self.xlib.clone(),
            native_display: self.native_display.retain(),
            screen: self.screen,
            driver_loaded: self.driver_loaded.clone(),
        }
    }
}

impl Connection {
    /// Connects to the default display.
    pub fn new() -> Result<Connection, Error> {
        unsafe {
            let xlib = Xlib::open().map_err(|err| Error::XlibUnavailable(err.to_string()))?;
            let display = (xlib.XOpenDisplay)(ptr::null());
            if display.is_null() {
                return Err(Error::ConnectionFailed);
            }
            let xlib = Arc::new(xlib);
            let screen = ((*xlib).XDefaultScreen)(display);
            let display = Arc::new(OwnedDisplay {
                display,
                xlib: xlib.clone(),
            });
            Ok(Connection {
                xlib,
                native_display: Box::new(SharedDisplay { display }),
                screen,
                driver_loaded: Arc::new(AtomicBool::new(false)),
            })
        }
    }

    /// Wraps an existing Xlib display pointer, without taking ownership of
    /// it.
    ///
    /// # Safety
    ///
    /// The display must remain open for the lifetime of the connection and
    /// every object created from it.
    pub unsafe fn from_raw_display(display: *mut Display) -> Result<Connection, Error> {
        if display.is_null() {
            return Err(Error::ConnectionFailed);
        }
        let xlib = Xlib::open().map_err(|err| Error::XlibUnavailable(err.to_string()))?;
        let screen = (xlib.XDefaultScreen)(display);
        Ok(Connection {
            xlib: Arc::new(xlib),
            native_display: Box::new(UnsafeDisplayRef { display }),
            screen,
            driver_loaded: Arc::new(AtomicBool::new(false)),
        })
    }

    /// Returns the raw display pointer.
    #[inline]
    pub fn display(&self) -> *mut Display {
        self.native_display.display()
    }

    /// Returns the default screen index of this display.
    #[inline]
    pub fn screen(&self) -> c_int {
        self.screen
    }

    /// Forces a round trip to the server, without discarding events.
    pub(crate) fn sync(&self) {
        unsafe {
            (self.xlib.XSync)(self.display(), False);
        }
    }

    /// Drains any protocol events the server queued up, e.g. after probe
    /// windows come and go.
    pub(crate) fn pump_events(&self) {
        unsafe {
            let display = self.display();
            while (self.xlib.XPending)(display) > 0 {
                let mut event: XEvent = mem::zeroed();
                (self.xlib.XNextEvent)(display, &mut event);
            }
        }
    }
}

struct OwnedDisplay {
    display: *mut Display,
    xlib: Arc<Xlib>,
}

impl Drop for OwnedDisplay {
    fn drop(&mut self) {
        unsafe {
            (self.xlib.XCloseDisplay)(self.display);
        }
    }
}

struct SharedDisplay {
    display: Arc<OwnedDisplay>,
}

impl NativeDisplay for SharedDisplay {
    #[inline]
    fn display(&self) -> *mut Display {
        self.display.display
    }

    #[inline]
    fn retain(&self) -> Box<dyn NativeDisplay> {
        Box::new(SharedDisplay {
            display: self.display.clone(),
        })
    }
}

struct UnsafeDisplayRef {
    display: *mut Display,
}

impl NativeDisplay for UnsafeDisplayRef {
    #[inline]
    fn display(&self) -> *mut Display {
        self.display
    }

    #[inline]
    fn retain(&self) -> Box<dyn NativeDisplay> {
        Box::new(UnsafeDisplayRef {
            display: self.display,
        })
    }
}
