//! Convenience re-exports, trimmed from the teacher's grab-bag prelude
//! down to the modules and constants this port actually has: the CGI,
//! upload and session pieces the teacher glob-exported here have no
//! counterpart in this server and were dropped along with their
//! modules.

pub use crate::auth::user_verify;
pub use crate::config::{AppConfig, RouteConfig, ServerConfig};
pub use crate::error::{Result, ServerError};
pub use crate::http::{HttpConnection, HttpRequest, HttpResponse, Method, ParseOutcome};
pub use crate::reactor::{ReadyFlags, Reactor};
pub use crate::router::RoutingError;
pub use crate::server::Server;

pub use proxy_log::{debug, error, info, warn};

pub use std::collections::HashMap;
pub use std::io::{self, ErrorKind, Read, Write};
pub use std::path::{Path, PathBuf};
pub use std::sync::Arc;
pub use std::time::{Duration, Instant};

// 2xx/3xx
pub const HTTP_OK: u16 = 200;

// 4xx Client Errors
pub const HTTP_BAD_REQUEST: u16 = 400;
pub const HTTP_FORBIDDEN: u16 = 403;
pub const HTTP_NOT_FOUND: u16 = 404;

pub const READ_BUF_SIZE: usize = 4096;
