/// Directory listing and path helpers.
pub mod fs;
