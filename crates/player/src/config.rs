use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tractscope_camera::DEFAULT_DISTANCE_FACTOR;

use crate::error::PlayerError;

/// Playback configuration. Missing JSON fields take their defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlayerConfig {
    /// Maximum number of streamlines visible at once.
    pub window_size: usize,
    /// Streamlines admitted per step.
    pub batch_size: usize,
    /// Render resolution as `[width, height]`.
    pub plot_size: [u32; 2],
    /// Smoothing weight while the window is filling.
    pub initial_weight: f32,
    /// Smoothing weight once the window is full.
    pub steady_weight: f32,
    pub update_camera: bool,
    /// Fit all actors into view after every step.
    pub reset_camera: bool,
    pub distance_factor: f32,
    /// Delay before each displayed frame.
    pub pacing_ms: u64,
    /// Frame rate of captured animations.
    pub fps: u32,
    pub region_opacity: f32,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            window_size: 100,
            batch_size: 20,
            plot_size: [600, 600],
            initial_weight: 0.5,
            steady_weight: 0.02,
            update_camera: true,
            reset_camera: false,
            distance_factor: DEFAULT_DISTANCE_FACTOR,
            pacing_ms: 100,
            fps: 10,
            region_opacity: 1.0,
        }
    }
}

impl PlayerConfig {
    /// Load from a JSON file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, PlayerError> {
        let config: Self = serde_json::from_reader(std::fs::File::open(path)?)?;
        Ok(config)
    }

    pub fn pacing(&self) -> Duration {
        Duration::from_millis(self.pacing_ms)
    }

    /// Number of batches the window holds.
    pub fn capacity(&self) -> usize {
        self.window_size.checked_div(self.batch_size).unwrap_or(0)
    }

    /// Reject configurations that cannot produce a frame.
    pub fn validate(&self) -> Result<(), PlayerError> {
        let invalid = |msg: String| Err(PlayerError::InvalidConfig(msg));

        if self.batch_size == 0 {
            return invalid("batch_size must be positive".into());
        }
        if self.capacity() == 0 {
            return invalid(format!(
                "window_size {} holds no batch of {}",
                self.window_size, self.batch_size
            ));
        }
        for (name, w) in [
            ("initial_weight", self.initial_weight),
            ("steady_weight", self.steady_weight),
            ("region_opacity", self.region_opacity),
        ] {
            if !(0.0..=1.0).contains(&w) {
                return invalid(format!("{name} {w} is outside [0, 1]"));
            }
        }
        if self.plot_size.contains(&0) {
            return invalid(format!("plot size {:?} is empty", self.plot_size));
        }
        if self.fps == 0 {
            return invalid("fps must be positive".into());
        }
        if !self.distance_factor.is_finite() || self.distance_factor <= 0.0 {
            return invalid(format!("distance_factor {} must be positive", self.distance_factor));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_are_valid() {
        let config = PlayerConfig::default();
        config.validate().unwrap();
        assert_eq!(config.capacity(), 5);
        assert_eq!(config.pacing(), Duration::from_millis(100));
        assert_eq!(config.distance_factor, 80.0);
    }

    #[test]
    fn window_smaller_than_batch_rejected() {
        let config = PlayerConfig {
            window_size: 10,
            ..PlayerConfig::default()
        };
        assert!(matches!(config.validate(), Err(PlayerError::InvalidConfig(_))));
    }

    #[test]
    fn zero_batch_rejected() {
        let config = PlayerConfig {
            batch_size: 0,
            ..PlayerConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn weight_out_of_range_rejected() {
        let config = PlayerConfig {
            steady_weight: 1.5,
            ..PlayerConfig::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("steady_weight"));
    }

    #[test]
    fn nan_weight_rejected() {
        let config = PlayerConfig {
            initial_weight: f32::NAN,
            ..PlayerConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn partial_json_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("player.json");
        let mut f = std::fs::File::create(&path).unwrap();
        write!(f, r#"{{ "window_size": 40, "reset_camera": true }}"#).unwrap();

        let config = PlayerConfig::from_json_file(&path).unwrap();
        assert_eq!(config.window_size, 40);
        assert!(config.reset_camera);
        assert_eq!(config.batch_size, 20);
        assert_eq!(config.capacity(), 2);
    }

    #[test]
    fn malformed_json_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("player.json");
        std::fs::write(&path, "{ window_size: ").unwrap();
        assert!(matches!(
            PlayerConfig::from_json_file(&path),
            Err(PlayerError::Json(_))
        ));
    }
}
