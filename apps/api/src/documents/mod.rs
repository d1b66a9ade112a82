// Document upload: PDF text extraction for the coaching inputs.

pub mod extract;
pub mod handlers;
