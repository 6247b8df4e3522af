pub mod command;
pub mod expr;
pub mod statement;
pub mod token;
pub mod value;
