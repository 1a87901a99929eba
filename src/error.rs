// glxkit/src/error.rs
//
//! Various errors that methods can produce.

use std::error;
use std::fmt;

/// Various errors that methods can produce.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Error {
    /// The Xlib shared library could not be loaded.
    XlibUnavailable(String),
    /// A connection to the display server could not be opened.
    ConnectionFailed,
    /// An OpenGL driver session already exists for this connection.
    AlreadyLoaded,
    /// The OpenGL shared library could not be opened. Carries the path that
    /// was tried and the loader's own diagnostic text.
    LibraryLoadFailed {
        /// The library path that was passed to the loader.
        path: String,
        /// The `dlerror` diagnostic, if any.
        detail: String,
    },
    /// One of the required GLX entry points could not be resolved.
    FunctionsMissing,
    /// The display server does not support the GLX extension.
    GlxUnsupported,
    /// No visual matching the requested pixel format could be found.
    NoMatchingVisual,
    /// A versioned, profiled, flagged, or transparent context was requested
    /// but the driver lacks `glXCreateContextAttribsARB`.
    ModernContextUnsupported,
    /// The driver returned no context and raised no protocol error.
    ContextCreationFailed,
    /// `glXMakeCurrent` returned false without raising a protocol error.
    MakeCurrentFailed,
    /// A negative swap interval was requested without
    /// `GLX_EXT_swap_control_tear`.
    NegativeSwapIntervalUnsupported,
    /// None of the swap-control extension families is available.
    SwapControlUnsupported,
    /// A swap-control entry point reported failure. Carries the entry point
    /// name.
    SwapIntervalFailed(&'static str),
    /// The MESA swap-interval getter reported `GLX_BAD_CONTEXT`.
    BadContext,
    /// The display server raised a protocol error during a bridged call.
    XError {
        /// The operation that was in flight when the error arrived.
        operation: &'static str,
        /// The server's error text, or a numeric fallback.
        detail: String,
    },
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            Error::XlibUnavailable(ref detail) => {
                write!(f, "Could not load Xlib: {}", detail)
            }
            Error::ConnectionFailed => write!(f, "Couldn't open a connection to the X server"),
            Error::AlreadyLoaded => write!(f, "OpenGL context already created"),
            Error::LibraryLoadFailed {
                ref path,
                ref detail,
            } => write!(f, "Failed loading {}: {}", path, detail),
            Error::FunctionsMissing => write!(f, "Could not retrieve OpenGL functions"),
            Error::GlxUnsupported => write!(f, "GLX is not supported"),
            Error::NoMatchingVisual => write!(f, "Couldn't find matching GLX visual"),
            Error::ModernContextUnsupported => {
                write!(f, "OpenGL 3.0 and later are not supported by this system")
            }
            Error::ContextCreationFailed => write!(f, "Could not create GL context"),
            Error::MakeCurrentFailed => write!(f, "Unable to make GL context current"),
            Error::NegativeSwapIntervalUnsupported => {
                write!(f, "Negative swap interval unsupported in this GL")
            }
            Error::SwapControlUnsupported => write!(f, "Swap control is unsupported"),
            Error::SwapIntervalFailed(which) => write!(f, "{} failed", which),
            Error::BadContext => write!(f, "GLX_BAD_CONTEXT"),
            Error::XError {
                operation,
                ref detail,
            } => write!(f, "Could not {}: {}", operation, detail),
        }
    }
}

impl error::Error for Error {}
