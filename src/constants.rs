//! # Constants
//!
//! Default values shared by configuration, runtime and reconciler.

/// Field manager used for status patches and server-side apply
pub const FIELD_MANAGER: &str = "minio-resource-controller";

/// Default MinIO endpoint when `MINIO_ENDPOINT` is not set
pub const DEFAULT_MINIO_ENDPOINT: &str = "localhost:9000";

/// Region used for SigV4 signing; MinIO accepts any region unless configured otherwise
pub const DEFAULT_MINIO_REGION: &str = "us-east-1";

/// Per-call timeout for remote administration calls (seconds)
pub const DEFAULT_MINIO_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Bounded worker pool size per resource kind
pub const DEFAULT_MAX_CONCURRENT_RECONCILES: u16 = 4;

/// Status history cap; 0 keeps every condition
pub const DEFAULT_STATUS_HISTORY_LIMIT: usize = 0;

/// Lower bound of the requeue backoff (seconds)
pub const DEFAULT_REQUEUE_MIN_BACKOFF_SECS: u64 = 5;

/// Upper bound of the requeue backoff (seconds)
pub const DEFAULT_REQUEUE_MAX_BACKOFF_SECS: u64 = 300;

/// Requeue delay used when the backoff state cannot be locked (seconds)
pub const DEFAULT_RECONCILIATION_ERROR_REQUEUE_SECS: u64 = 30;

/// HTTP server port for metrics and health probes
pub const DEFAULT_METRICS_PORT: u16 = 5000;

/// Server startup timeout (seconds)
pub const DEFAULT_SERVER_STARTUP_TIMEOUT_SECS: u64 = 10;

/// Server readiness poll interval (milliseconds)
pub const DEFAULT_SERVER_POLL_INTERVAL_MS: u64 = 50;

/// Length of generated user secret keys
pub const GENERATED_SECRET_LENGTH: usize = 20;

/// Suffix of the Secret that receives a user's generated credentials
pub const CREDENTIALS_SECRET_SUFFIX: &str = "-credentials";

/// Annotation stamped by `mrcctl reconcile` to force a reconciliation
pub const RECONCILE_ANNOTATION: &str = "pannoi.io/reconcile";
