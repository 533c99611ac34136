use thiserror::Error;

#[derive(Debug, Error)]
/// Errors returned while loading or validating configuration.
pub enum ConfigError {
    /// A port value could not be parsed.
    #[error("invalid port '{value}': {source}")]
    PortParseError {
        /// Raw value from the environment.
        value: String,
        /// Parse error.
        source: std::num::ParseIntError,
    },

    /// Port 0 is not a usable listen port.
    #[error("invalid port: {value}")]
    InvalidPort {
        /// Raw value from the environment.
        value: String,
    },

    /// A bind address could not be parsed.
    #[error("invalid bind address '{value}': {source}")]
    InvalidBindAddr {
        /// Raw value from the environment.
        value: String,
        /// Parse error.
        source: std::net::AddrParseError,
    },

    /// A numeric option is outside its allowed range.
    #[error("option {option} out of range: {reason}")]
    OutOfRange {
        /// Option name.
        option: &'static str,
        /// Why the value is rejected.
        reason: String,
    },

    /// An enumerated option carries an unknown value.
    #[error("unknown value '{value}' for {option}")]
    UnknownValue {
        /// Option name.
        option: &'static str,
        /// Raw value from the environment.
        value: String,
    },
}
