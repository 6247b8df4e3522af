pub mod effects;
pub mod eval;
pub mod executor;
pub mod lexer;
pub mod loader;
pub mod parser;
pub mod presenter;
pub mod printer;
pub mod registry;
pub mod session;
pub mod template;
