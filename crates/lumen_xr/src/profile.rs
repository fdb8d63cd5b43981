//! Platform profiles
//!
//! A profile is the strategy object picked for a hardware descriptor when a
//! render session is created. Profiles live in an arena and are referenced
//! by [`ProfileId`] so sessions can carry them around by value.

use crate::{ModeDescriptor, RenderMode};

/// Index of a profile inside a [`ProfileRegistry`]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ProfileId(usize);

/// Capabilities of one platform/headset family
#[derive(Clone, Debug)]
pub struct PlatformProfile {
    /// Profile name, for logs
    pub name: String,
    /// Platform identifiers this profile answers to (empty = any)
    pub platforms: Vec<String>,
    /// Headset identifiers this profile answers to (empty = any)
    pub headsets: Vec<String>,
    /// Modes the hardware can render in
    pub modes: Vec<RenderMode>,
    /// Mode used when VR is disabled
    pub base_mode: RenderMode,
    /// Modes with head tracking (recenter is meaningful)
    pub tracking_modes: Vec<RenderMode>,
}

impl PlatformProfile {
    /// Create a profile that only supports `base_mode`
    pub fn new(name: impl Into<String>, base_mode: RenderMode) -> Self {
        Self {
            name: name.into(),
            platforms: Vec::new(),
            headsets: Vec::new(),
            modes: vec![base_mode],
            base_mode,
            tracking_modes: Vec::new(),
        }
    }

    /// Restrict to the given platform identifiers
    pub fn with_platforms(mut self, platforms: &[&str]) -> Self {
        self.platforms = platforms.iter().map(|p| p.to_string()).collect();
        self
    }

    /// Restrict to the given headset identifiers
    pub fn with_headsets(mut self, headsets: &[&str]) -> Self {
        self.headsets = headsets.iter().map(|h| h.to_string()).collect();
        self
    }

    /// Add a supported mode
    pub fn with_mode(mut self, mode: RenderMode) -> Self {
        if !self.modes.contains(&mode) {
            self.modes.push(mode);
        }
        self
    }

    /// Mark a mode as head-tracked
    pub fn with_tracking(mut self, mode: RenderMode) -> Self {
        if !self.tracking_modes.contains(&mode) {
            self.tracking_modes.push(mode);
        }
        self
    }

    /// Check whether this profile handles a descriptor
    pub fn matches(&self, descriptor: &ModeDescriptor) -> bool {
        let platform_ok = self.platforms.is_empty()
            || self.platforms.iter().any(|p| p == descriptor.platform());
        let headset_ok = self.headsets.is_empty()
            || self.headsets.iter().any(|h| h == descriptor.headset());
        platform_ok && headset_ok
    }

    /// Check if a mode is supported
    pub fn supports(&self, mode: RenderMode) -> bool {
        self.modes.contains(&mode)
    }

    /// Resolve the VR toggle to a concrete mode.
    ///
    /// Hardware without a VR mode stays in its base mode, so toggling is a
    /// no-op there.
    pub fn mode_for(&self, vr_enabled: bool) -> RenderMode {
        if vr_enabled && self.supports(RenderMode::Vr) {
            RenderMode::Vr
        } else {
            self.base_mode
        }
    }

    /// Check if recentering applies in a mode
    pub fn is_tracked(&self, mode: RenderMode) -> bool {
        self.tracking_modes.contains(&mode)
    }
}

/// Arena of platform profiles
#[derive(Clone, Debug)]
pub struct ProfileRegistry {
    profiles: Vec<PlatformProfile>,
    fallback: ProfileId,
}

impl ProfileRegistry {
    /// Registry holding only a windowed preview profile
    pub fn new() -> Self {
        Self {
            profiles: vec![PlatformProfile::new("preview", RenderMode::Windowed)],
            fallback: ProfileId(0),
        }
    }

    /// Registry with the mobile headset families
    pub fn with_builtin() -> Self {
        let mut registry = Self::new();

        registry.register(
            PlatformProfile::new("gvr", RenderMode::Windowed)
                .with_platforms(&["android", "gvr"])
                .with_headsets(&["cardboard", "daydream"])
                .with_mode(RenderMode::Vr)
                .with_tracking(RenderMode::Vr),
        );
        registry.register(
            PlatformProfile::new("ovr-mobile", RenderMode::Vr)
                .with_platforms(&["android", "ovr-mobile"])
                .with_headsets(&["gearvr"])
                .with_tracking(RenderMode::Vr),
        );
        registry.register(
            PlatformProfile::new("arcore", RenderMode::Ar)
                .with_platforms(&["android", "arcore"])
                .with_headsets(&["mobile"])
                .with_tracking(RenderMode::Ar),
        );

        registry
    }

    /// Register a profile; later registrations are consulted first
    pub fn register(&mut self, profile: PlatformProfile) -> ProfileId {
        log::debug!("Registered platform profile '{}'", profile.name);
        self.profiles.push(profile);
        ProfileId(self.profiles.len() - 1)
    }

    /// Pick the profile for a descriptor, falling back to windowed preview
    pub fn resolve(&self, descriptor: &ModeDescriptor) -> ProfileId {
        self.profiles
            .iter()
            .enumerate()
            .rev()
            .filter(|(idx, _)| *idx != self.fallback.0)
            .find(|(_, profile)| profile.matches(descriptor))
            .map(|(idx, _)| ProfileId(idx))
            .unwrap_or(self.fallback)
    }

    /// Get a profile by id.
    ///
    /// Ids only come from this registry, so out-of-range ids map to the
    /// fallback profile.
    pub fn profile(&self, id: ProfileId) -> &PlatformProfile {
        self.profiles
            .get(id.0)
            .unwrap_or(&self.profiles[self.fallback.0])
    }

    /// Number of registered profiles
    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    /// Always false: the fallback profile is permanent
    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }
}

impl Default for ProfileRegistry {
    fn default() -> Self {
        Self::with_builtin()
    }
}
