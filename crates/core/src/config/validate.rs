use super::{types::Config, ConfigError};

/// Validate configuration
/// Currently validates:
/// - Server port is not 0
/// - Engine paths and load timeout are set
/// - Target frame rate is positive
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.server.port == 0 {
        return Err(ConfigError::ValidationError(
            "server.port cannot be 0".to_string(),
        ));
    }

    if config.engine.load_timeout_secs == 0 {
        return Err(ConfigError::ValidationError(
            "engine.load_timeout_secs cannot be 0".to_string(),
        ));
    }

    if config.engine.ffmpeg_path.as_os_str().is_empty() {
        return Err(ConfigError::ValidationError(
            "engine.ffmpeg_path cannot be empty".to_string(),
        ));
    }

    if config.engine.ffprobe_path.as_os_str().is_empty() {
        return Err(ConfigError::ValidationError(
            "engine.ffprobe_path cannot be empty".to_string(),
        ));
    }

    if config.conversion.target_fps <= 0.0 {
        return Err(ConfigError::ValidationError(
            "conversion.target_fps must be positive".to_string(),
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    #[test]
    fn test_validate_default_config() {
        assert!(validate_config(&Config::default()).is_ok());
    }

    #[test]
    fn test_validate_port_zero_fails() {
        let mut config = Config::default();
        config.server.port = 0;
        let err = validate_config(&config).unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError(_)));
    }

    #[test]
    fn test_validate_zero_timeout_fails() {
        let mut config = Config::default();
        config.engine.load_timeout_secs = 0;
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_validate_empty_ffmpeg_path_fails() {
        let mut config = Config::default();
        config.engine.ffmpeg_path = std::path::PathBuf::new();
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_validate_non_positive_fps_fails() {
        let mut config = Config::default();
        config.conversion.target_fps = 0.0;
        assert!(validate_config(&config).is_err());

        config.conversion.target_fps = -24.0;
        assert!(validate_config(&config).is_err());
    }
}
