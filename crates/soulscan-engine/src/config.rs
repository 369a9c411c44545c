use std::path::PathBuf;

/// Engine configuration, loaded from environment variables.
pub struct Config {
    /// V4L2 device path (default: /dev/video0).
    pub camera_device: String,
    /// Directory containing ONNX model files.
    pub model_dir: PathBuf,
    /// Fallback score ceiling for the neutral label.
    pub neutral_ceiling: f32,
    /// Fallback score ceiling for every other label.
    pub fallback_ceiling: f32,
}

impl Config {
    /// Load configuration from `SOULSCAN_*` environment variables with defaults.
    pub fn from_env() -> Self {
        let model_dir = std::env::var("SOULSCAN_MODEL_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| default_model_dir());

        Self {
            camera_device: std::env::var("SOULSCAN_CAMERA_DEVICE")
                .unwrap_or_else(|_| "/dev/video0".to_string()),
            model_dir,
            neutral_ceiling: env_f32(
                "SOULSCAN_NEUTRAL_CEILING",
                soulscan_core::fallback::DEFAULT_NEUTRAL_CEILING,
            ),
            fallback_ceiling: env_f32(
                "SOULSCAN_FALLBACK_CEILING",
                soulscan_core::fallback::DEFAULT_FALLBACK_CEILING,
            ),
        }
    }

    /// Path to the UltraFace detection model.
    pub fn detector_model_path(&self) -> String {
        self.model_dir
            .join("version-RFB-320.onnx")
            .to_string_lossy()
            .into_owned()
    }

    /// Path to the emotion classification model.
    pub fn classifier_model_path(&self) -> String {
        self.model_dir
            .join("emotion_cnn.onnx")
            .to_string_lossy()
            .into_owned()
    }
}

fn default_model_dir() -> PathBuf {
    std::env::var("XDG_DATA_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
            PathBuf::from(home).join(".local/share")
        })
        .join("soulscan/models")
}

fn env_f32(key: &str, default: f32) -> f32 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
