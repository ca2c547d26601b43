mod message;
mod request;
mod response;

pub use message::{ErrorCode, Message};
pub use request::ForwardRequest;
pub use response::ForwardResponse;
