pub mod change;
pub mod visibility;
