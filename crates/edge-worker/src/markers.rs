//! Routing markers.
//!
//! These strings are a contract with the pages being served and must match
//! exactly.

/// Liveness check path.
pub const HEARTBEAT_PATH: &str = "/api/service-worker-heartbeat";

/// Body of the liveness response.
pub const HEARTBEAT_BODY: &str = "ok";

/// Path marker for file-system requests handled by the page.
pub const DRIVE_MARKER: &str = "/api/drive";

/// Path marker for terminal input requests handled by the page.
pub const STDIN_MARKER: &str = "/api/stdin";

/// Markers whose same-origin requests are forwarded to the page.
pub const BROADCAST_MARKERS: &[&str] = &[DRIVE_MARKER, STDIN_MARKER];

/// Generic API marker. Matching requests are never intercepted.
pub const API_MARKER: &str = "/api/";
