pub mod cache;
pub mod hardlink;
pub mod process;
