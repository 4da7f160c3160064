pub mod demo;
pub mod sprites;
pub mod types;
