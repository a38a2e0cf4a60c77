use std::time::Duration;

/// User agent sent with every upload request.
pub const USER_AGENT: &str = "printpush OctoPrint uploader";

/// Header carrying the endpoint's API key.
pub const API_KEY_HEADER: &str = "X-Api-Key";

/// Path of the OctoPrint local-storage upload resource, relative to the base URL.
pub const UPLOAD_PATH: &str = "/api/files/local";

/// Extension every uploaded job file carries.
pub const GCODE_EXTENSION: &str = "gcode";

/// Multipart field carrying the job file.
pub const FILE_FIELD: &str = "file";

/// Plain form fields sent alongside the file. The server must neither
/// select nor start the uploaded job.
pub const FORM_FIELDS: [(&str, &str); 2] = [("select", "false"), ("print", "false")];

/// Default per-request timeout for uploads.
///
/// Large jobs over slow links take minutes, so this is generous.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(300);

/// Interval between serializer progress callbacks.
pub const SERIALIZE_PROGRESS_INTERVAL: Duration = Duration::from_millis(50);
