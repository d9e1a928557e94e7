use serde::{Deserialize, Serialize};
use tracing::warn;

use super::types::{PixelFormat, StreamProfile, StreamType};
use crate::error::{HarnessError, HarnessResult};

/// Which stream profile a scenario wants to stream with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProfileQuery {
    pub stream: StreamType,

    /// Required pixel format, any format when `None`
    pub format: Option<PixelFormat>,

    pub fps: u32,

    /// Use the first offered profile when nothing matches exactly
    pub allow_fallback: bool,
}

impl Default for ProfileQuery {
    fn default() -> Self {
        Self {
            stream: StreamType::Depth,
            format: Some(PixelFormat::Z16),
            fps: 30,
            allow_fallback: true,
        }
    }
}

/// Result of profile selection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProfileSelection {
    pub profile: StreamProfile,

    /// False when the fallback profile was used
    pub exact: bool,
}

impl ProfileQuery {
    /// Same query with fallback disabled
    pub fn exact(&self) -> Self {
        Self {
            allow_fallback: false,
            ..*self
        }
    }

    pub fn matches(&self, profile: &StreamProfile) -> bool {
        profile.stream == self.stream
            && profile.fps == self.fps
            && self.format.map_or(true, |format| profile.format == format)
    }

    /// Pick the first matching profile, falling back to the first offered one if allowed
    pub fn select(&self, profiles: &[StreamProfile]) -> HarnessResult<ProfileSelection> {
        if let Some(profile) = profiles.iter().find(|p| self.matches(p)) {
            return Ok(ProfileSelection {
                profile: *profile,
                exact: true,
            });
        }

        match profiles.first() {
            Some(profile) if self.allow_fallback => {
                warn!(
                    wanted = ?self.stream,
                    fps = self.fps,
                    fallback = %profile,
                    "no exact stream profile match, falling back to first profile"
                );
                Ok(ProfileSelection {
                    profile: *profile,
                    exact: false,
                })
            }
            _ => Err(HarnessError::ConfigurationUnavailable(format!(
                "no {:?} profile at {} fps{}",
                self.stream,
                self.fps,
                self.format
                    .map(|format| format!(" with format {:?}", format))
                    .unwrap_or_default()
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile(format: PixelFormat, fps: u32) -> StreamProfile {
        StreamProfile {
            stream: StreamType::Depth,
            format,
            width: 848,
            height: 480,
            fps,
        }
    }

    #[test]
    fn test_select_first_exact_match() {
        let profiles = vec![
            profile(PixelFormat::Z16, 15),
            profile(PixelFormat::Z16, 30),
            profile(PixelFormat::Z16, 30),
        ];

        let selection = ProfileQuery::default().select(&profiles).unwrap();
        assert!(selection.exact);
        assert_eq!(selection.profile.fps, 30);
    }

    #[test]
    fn test_fallback_to_first_profile() {
        let profiles = vec![profile(PixelFormat::Z16, 6), profile(PixelFormat::Z16, 15)];

        let selection = ProfileQuery::default().select(&profiles).unwrap();
        assert!(!selection.exact);
        assert_eq!(selection.profile.fps, 6);
    }

    #[test]
    fn test_exact_query_without_match_is_unavailable() {
        let profiles = vec![profile(PixelFormat::Y8, 30)];

        let err = ProfileQuery::default().exact().select(&profiles).unwrap_err();
        assert!(err.is_skip());
    }

    #[test]
    fn test_no_profiles_is_unavailable_even_with_fallback() {
        let err = ProfileQuery::default().select(&[]).unwrap_err();
        assert!(err.is_skip());
    }
}
