//! View state that survives process death

use lumen_presenter::{DebugFlags, Rehydratable, RehydrationError, RehydrationState};
use lumen_xr::ModeDescriptor;

/// Saved state format version
const SAVED_STATE_VERSION: i64 = 1;

/// User-visible configuration captured on SaveInstanceState
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SavedViewState {
    pub vr_mode: bool,
    pub debug: DebugFlags,
    pub descriptor: ModeDescriptor,
}

impl SavedViewState {
    pub fn new(vr_mode: bool, debug: DebugFlags, descriptor: ModeDescriptor) -> Self {
        Self {
            vr_mode,
            debug,
            descriptor,
        }
    }

    /// Serialize for the host's saved-instance bundle
    pub fn to_json(&self) -> Result<String, RehydrationError> {
        Ok(self.dehydrate().to_json()?)
    }

    /// Restore from a saved-instance bundle
    pub fn from_json(json: &str) -> Result<Self, RehydrationError> {
        let state = RehydrationState::from_json(json)?;
        let mut saved = Self::default();
        saved.rehydrate(&state)?;
        Ok(saved)
    }
}

impl Rehydratable for SavedViewState {
    fn dehydrate(&self) -> RehydrationState {
        let mut state = RehydrationState::new()
            .with_value("version", SAVED_STATE_VERSION)
            .with_value("vr_mode", self.vr_mode);

        state.set_nested(
            "debug",
            RehydrationState::new()
                .with_value("debug", self.debug.debug_enabled)
                .with_value("hud", self.debug.hud_enabled),
        );
        state.set_nested(
            "descriptor",
            RehydrationState::new()
                .with_value("platform", self.descriptor.platform().to_string())
                .with_value("headset", self.descriptor.headset().to_string())
                .with_value("controller", self.descriptor.controller().to_string()),
        );
        state
    }

    fn rehydrate(&mut self, state: &RehydrationState) -> Result<(), RehydrationError> {
        let version = state
            .get_value::<i64>("version")
            .ok_or_else(|| RehydrationError::MissingField("version".into()))?;
        if version != SAVED_STATE_VERSION {
            return Err(RehydrationError::VersionMismatch {
                expected: SAVED_STATE_VERSION,
                actual: version,
            });
        }

        let vr_mode = state
            .get_value::<bool>("vr_mode")
            .ok_or_else(|| RehydrationError::MissingField("vr_mode".into()))?;

        let debug = state
            .get_nested("debug")
            .map(|d| {
                DebugFlags::new(
                    d.get_value("debug").unwrap_or(false),
                    d.get_value("hud").unwrap_or(false),
                )
            })
            .unwrap_or_default();

        let descriptor = state
            .get_nested("descriptor")
            .ok_or_else(|| RehydrationError::MissingField("descriptor".into()))?;
        let field = |name: &str| {
            descriptor
                .get_value::<String>(name)
                .filter(|v| !v.is_empty())
                .ok_or_else(|| RehydrationError::InvalidData(format!("descriptor.{}", name)))
        };

        self.descriptor = ModeDescriptor::new(field("platform")?, field("headset")?, field("controller")?);
        self.vr_mode = vr_mode;
        self.debug = debug;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_survives_json() {
        let saved = SavedViewState::new(
            true,
            DebugFlags::new(false, true),
            ModeDescriptor::new("gvr", "daydream", "daydream-controller"),
        );

        let json = saved.to_json().unwrap();
        assert_eq!(SavedViewState::from_json(&json).unwrap(), saved);
    }

    #[test]
    fn test_version_mismatch() {
        let mut state = SavedViewState::default().dehydrate();
        state.set_value("version", 7i64);

        let mut saved = SavedViewState::default();
        let result = saved.rehydrate(&state);
        assert!(matches!(
            result,
            Err(RehydrationError::VersionMismatch { expected: 1, actual: 7 })
        ));
    }

    #[test]
    fn test_missing_descriptor() {
        let state = RehydrationState::new()
            .with_value("version", 1i64)
            .with_value("vr_mode", false);

        let mut saved = SavedViewState::default();
        assert!(matches!(saved.rehydrate(&state), Err(RehydrationError::MissingField(_))));
    }

    #[test]
    fn test_garbage_json() {
        assert!(matches!(
            SavedViewState::from_json("not json"),
            Err(RehydrationError::Serialization(_))
        ));
    }
}
