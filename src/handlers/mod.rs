pub mod get_handler;

pub use get_handler::handle_get;
