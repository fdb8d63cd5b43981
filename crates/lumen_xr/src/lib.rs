//! # lumen_xr - Render Modes and Hardware Identity
//!
//! Describes *what* a view is currently rendering to:
//! - Render modes (windowed preview, stereo VR, AR passthrough)
//! - Surface kinds backing each mode
//! - The (platform, headset, controller) hardware descriptor
//! - Platform profiles selected when a render session is created
//!
//! ## Example
//!
//! ```
//! use lumen_xr::prelude::*;
//!
//! let registry = ProfileRegistry::with_builtin();
//! let descriptor = ModeDescriptor::new("android", "cardboard", "cardboard");
//!
//! let profile = registry.profile(registry.resolve(&descriptor));
//! assert_eq!(profile.mode_for(true), RenderMode::Vr);
//! assert_eq!(profile.mode_for(false), RenderMode::Windowed);
//! ```

pub mod profile;

pub use profile::{PlatformProfile, ProfileId, ProfileRegistry};

use std::fmt;

/// Rendering configuration of a view
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RenderMode {
    /// Single flat viewport (preview / magic window)
    Windowed,
    /// Stereo rendering to a head-mounted display
    Vr,
    /// Camera passthrough with rendered overlay
    Ar,
}

impl Default for RenderMode {
    fn default() -> Self {
        Self::Windowed
    }
}

impl RenderMode {
    /// Surface type this mode renders into
    pub fn surface_kind(&self) -> SurfaceKind {
        match self {
            Self::Windowed => SurfaceKind::Mono,
            Self::Vr => SurfaceKind::Stereo,
            Self::Ar => SurfaceKind::Passthrough,
        }
    }

    /// Short lowercase name, used in logs and saved state
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Windowed => "windowed",
            Self::Vr => "vr",
            Self::Ar => "ar",
        }
    }

    /// Parse the name produced by [`RenderMode::as_str`]
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "windowed" => Some(Self::Windowed),
            "vr" => Some(Self::Vr),
            "ar" => Some(Self::Ar),
            _ => None,
        }
    }
}

impl fmt::Display for RenderMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// GPU surface layout required by a render mode.
///
/// Switching between modes with the same surface kind can keep the GPU
/// context alive; a different kind forces the session to be rebuilt.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SurfaceKind {
    /// One full-screen viewport
    Mono,
    /// Side-by-side eye buffers with lens distortion
    Stereo,
    /// Mono viewport composited over the camera feed
    Passthrough,
}

impl SurfaceKind {
    /// Number of eye buffers the surface carries
    pub fn view_count(&self) -> u32 {
        match self {
            Self::Stereo => 2,
            Self::Mono | Self::Passthrough => 1,
        }
    }
}

/// Identity of the active hardware configuration.
///
/// Immutable once built: a reconfiguration replaces the whole descriptor.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ModeDescriptor {
    platform: String,
    headset: String,
    controller: String,
}

impl ModeDescriptor {
    /// Create a descriptor
    pub fn new(
        platform: impl Into<String>,
        headset: impl Into<String>,
        controller: impl Into<String>,
    ) -> Self {
        Self {
            platform: platform.into(),
            headset: headset.into(),
            controller: controller.into(),
        }
    }

    /// Platform identifier (e.g. "android", "gvr", "ovr-mobile", "arcore")
    pub fn platform(&self) -> &str {
        &self.platform
    }

    /// Headset identifier (e.g. "cardboard", "daydream", "gearvr", "mobile")
    pub fn headset(&self) -> &str {
        &self.headset
    }

    /// Controller identifier
    pub fn controller(&self) -> &str {
        &self.controller
    }

    /// Copy of this descriptor with another controller
    pub fn with_controller(&self, controller: impl Into<String>) -> Self {
        Self {
            controller: controller.into(),
            ..self.clone()
        }
    }

    /// Copy of this descriptor with another headset
    pub fn with_headset(&self, headset: impl Into<String>) -> Self {
        Self {
            headset: headset.into(),
            ..self.clone()
        }
    }
}

impl Default for ModeDescriptor {
    fn default() -> Self {
        Self::new("android", "cardboard", "cardboard")
    }
}

impl fmt::Display for ModeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.platform, self.headset, self.controller)
    }
}

/// Prelude - commonly used types
pub mod prelude {
    pub use crate::{
        ModeDescriptor, PlatformProfile, ProfileId, ProfileRegistry,
        RenderMode, SurfaceKind,
    };
}
