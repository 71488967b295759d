pub mod path;
pub mod time;
