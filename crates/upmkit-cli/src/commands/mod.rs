pub mod add;
pub mod version;
