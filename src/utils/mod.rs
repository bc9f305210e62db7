pub mod assembler;
pub mod pdf;
pub mod text;
