pub mod bytecode;
pub mod diagnostic;
pub mod library;
pub mod loader;
pub mod stack;
pub mod table;
pub mod value;
pub mod vm;
