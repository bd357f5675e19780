
pub mod acquisition;
