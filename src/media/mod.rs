pub mod hash;
pub mod scan;
pub mod subtitles;
