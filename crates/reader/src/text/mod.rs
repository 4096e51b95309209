pub mod segment;
pub mod word;
