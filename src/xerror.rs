// glxkit/src/xerror.rs
//
//! Scoped interception of asynchronous X protocol errors.
//!
//! Xlib reports request errors out of band through a process-global handler,
//! which is useless for callers that need a synchronous success/failure
//! answer. An [`XErrorTrap`] brackets one GLX operation: it syncs the
//! connection, swaps in a capturing handler, and on `finish` syncs again,
//! restores the previous handler, and turns whatever was captured into an
//! [`Error`]. The two syncs pin the error window to exactly the bracketed
//! requests.
//!
//! Only one trap may be in flight per display connection at a time; callers
//! on multiple threads must serialize externally.

use std::cell::Cell;
use std::ffi::CStr;
use std::os::raw::{c_char, c_int};

use x11_dl::xlib::{Display, XErrorEvent};

type XErrorHandler = Option<unsafe extern "C" fn(*mut Display, *mut XErrorEvent) -> c_int>;

use crate::connection::Connection;
use crate::error::Error;

thread_local! {
    static TRAPPED_ERROR_CODE: Cell<u8> = const { Cell::new(0) };
}

pub(crate) struct XErrorTrap<'a> {
    connection: &'a Connection,
    operation: &'static str,
    error_base: c_int,
    prev_handler: XErrorHandler,
    finished: bool,
}

impl<'a> XErrorTrap<'a> {
    /// Starts trapping errors for `operation`. Syncs first so that earlier
    /// requests cannot leak their errors into this trap.
    pub(crate) fn install(
        connection: &'a Connection,
        operation: &'static str,
        error_base: c_int,
    ) -> XErrorTrap<'a> {
        connection.sync();
        TRAPPED_ERROR_CODE.with(|code| code.set(0));
        let prev_handler = unsafe { (connection.xlib.XSetErrorHandler)(Some(trap_handler)) };
        XErrorTrap {
            connection,
            operation,
            error_base,
            prev_handler,
            finished: false,
        }
    }

    /// Ends the trap: syncs so any pending error for the bracketed requests
    /// arrives, restores the previous handler, and reports the captured
    /// error, if any.
    ///
    /// Translation via `XGetErrorText` happens here, after the handler is
    /// gone; making requests from inside an error handler is forbidden.
    pub(crate) fn finish(mut self) -> Result<(), Error> {
        self.connection.sync();
        unsafe {
            (self.connection.xlib.XSetErrorHandler)(self.prev_handler);
        }
        self.finished = true;

        let code = TRAPPED_ERROR_CODE.with(|code| code.take());
        if code == 0 {
            return Ok(());
        }

        let mut buffer = [0 as c_char; 256];
        let detail = unsafe {
            (self.connection.xlib.XGetErrorText)(
                self.connection.display(),
                code as c_int,
                buffer.as_mut_ptr(),
                buffer.len() as c_int - 1,
            );
            CStr::from_ptr(buffer.as_ptr()).to_string_lossy().into_owned()
        };
        let detail = if detail.is_empty() {
            format!("{} (Base {})", code, self.error_base)
        } else {
            detail
        };
        Err(Error::XError {
            operation: self.operation,
            detail,
        })
    }
}

impl Drop for XErrorTrap<'_> {
    fn drop(&mut self) {
        // A trap abandoned without `finish` must still restore the handler.
        if !self.finished {
            unsafe {
                (self.connection.xlib.XSetErrorHandler)(self.prev_handler);
            }
        }
    }
}

unsafe extern "C" fn trap_handler(_display: *mut Display, event: *mut XErrorEvent) -> c_int {
    TRAPPED_ERROR_CODE.with(|code| code.set((*event).error_code));
    // Tell Xlib the error was handled.
    0
}
