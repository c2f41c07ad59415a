//! Default values shared across the crate.

/// HTTP defaults
pub mod http {
    use std::time::Duration;

    /// Timeout applied when a request does not specify one.
    pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(5 * 60);
    /// Connect timeout used by the reqwest transport.
    pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
    /// User agent used by the reqwest transport.
    pub const USER_AGENT: &str = concat!("api-service/", env!("CARGO_PKG_VERSION"));
}

/// URL resolution defaults
pub mod url {
    /// API version inserted when an endpoint carries no `/vN/` segment.
    pub const API_VERSION: &str = "v2";
}

/// Job polling defaults
pub mod jobs {
    use std::time::Duration;

    /// Header that asks the API to run the request as a background job.
    pub const SUBMIT_AS_JOB_HEADER: &str = "Submit-As-Job";
    /// Endpoint prefix used to check job status.
    pub const STATUS_ENDPOINT: &str = "/api_jobs";
    pub const RECHECK_INTERVAL: Duration = Duration::from_secs(5);
    pub const TIMEOUT: Duration = Duration::from_secs(30 * 60);
}

/// Header chunking defaults
pub mod chunks {
    /// Apache rejects header values above 8192 bytes.
    pub const HEADER_MAX_LENGTH: usize = 8000;
}
