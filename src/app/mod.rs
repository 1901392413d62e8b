pub mod handler;
pub mod report;

pub use handler::{handle_request, HttpRequest, HttpResponse};
