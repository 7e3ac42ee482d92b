pub mod ast;
pub mod span;
pub mod tokenizer;
pub mod tree_builder;
pub mod tree_walk_interpreter;
