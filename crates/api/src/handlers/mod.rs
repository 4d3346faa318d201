pub mod assets;
pub mod rigging;
