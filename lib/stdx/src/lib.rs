mod macros;
pub mod pretty;
