//! OpenGL version and profile descriptors.

/// Describes the OpenGL version that is requested when a context is created.
///
/// Versions are ordered, so `GLVersion::new(3, 1) > GLVersion::new(3, 0)`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct GLVersion {
    /// The major version.
    pub major: u8,
    /// The minor version.
    pub minor: u8,
}

impl GLVersion {
    /// Creates a version descriptor.
    #[inline]
    pub fn new(major: u8, minor: u8) -> GLVersion {
        GLVersion { major, minor }
    }
}

/// The OpenGL profile a context should be created with.
///
/// `None` in a [`crate::GLConfig`] means no particular profile, which allows
/// the legacy context creation path.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GLProfile {
    /// The OpenGL core profile.
    Core,
    /// The OpenGL compatibility profile.
    Compatibility,
    /// An OpenGL ES profile.
    ES,
}

/// What `glFlush` behavior a context exhibits when it is released.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ReleaseBehavior {
    /// Pending commands are not flushed on release.
    None,
    /// Pending commands are flushed on release. This is every driver's
    /// default, so requesting it never emits a context attribute.
    #[default]
    Flush,
}

/// The reset notification strategy for robust contexts.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ResetNotification {
    /// Resets are never reported. The driver default; requesting it never
    /// emits a context attribute.
    #[default]
    NoNotification,
    /// The context is lost on reset and this is reported.
    LoseContext,
}
