//! Package-level constants.

/// Current version of the assistant (sourced from Cargo.toml).
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Producer protocol version announced in `hello`.
pub const API_VERSION: &str = "0.1";

/// Default listen port for the relay.
pub const DEFAULT_PORT: u16 = 2345;

/// Boundary token used by the MJPEG preview stream.
pub const PREVIEW_BOUNDARY: &str = "image-boundary";

/// Content type of each preview part.
pub const PREVIEW_PART_CONTENT_TYPE: &str = "image/jpeg";

/// Number of random bytes behind each challenge and salt.
pub const NONCE_BYTES: usize = 64;
