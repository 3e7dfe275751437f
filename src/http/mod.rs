pub mod http_connection;
pub mod request;
pub mod response;

pub use http_connection::{HttpConnection, ReadOutcome, WriteOutcome};
pub use request::{HttpRequest, Method, ParseError, ParseOutcome, ParsingState};
pub use response::HttpResponse;
