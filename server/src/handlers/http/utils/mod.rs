pub mod body;
pub mod headers;
pub mod json_response;

pub use body::{BodyError, read_json};
pub use headers::get_query_param;
pub use json_response::{
    deliver_error_json, deliver_redirect, deliver_serialized_json, deliver_success_json, full,
    internal_error,
};
