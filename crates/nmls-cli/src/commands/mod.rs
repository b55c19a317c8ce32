pub mod ls;
pub mod version;
