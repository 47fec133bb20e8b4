pub mod core;
pub mod picker;
pub mod roster;
pub mod rows;
pub mod submit;
