pub mod target;
pub mod url;
