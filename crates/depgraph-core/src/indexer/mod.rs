pub mod extract;
pub mod filesystem;
pub mod parser;
pub mod pipeline;
