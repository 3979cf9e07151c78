use std::time::Duration;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RunnerConfig {
    /// Frames per second for the frame loop (default: 60)
    pub frame_rate: u32,

    /// Width and height of the room created when no room script is loaded
    pub room_size: (f64, f64),
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            frame_rate: 60,
            room_size: (640.0, 480.0),
        }
    }
}

impl RunnerConfig {
    /// Time between frames. A zero frame rate is treated as one frame per
    /// second.
    pub fn frame_interval(&self) -> Duration {
        Duration::from_secs_f64(1.0 / f64::from(self.frame_rate.max(1)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_interval() {
        let config = RunnerConfig {
            frame_rate: 50,
            ..Default::default()
        };
        assert_eq!(config.frame_interval(), Duration::from_millis(20));

        let stalled = RunnerConfig {
            frame_rate: 0,
            ..Default::default()
        };
        assert_eq!(stalled.frame_interval(), Duration::from_secs(1));
    }
}
