pub mod acquisition;
pub mod image;
