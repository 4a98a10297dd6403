pub mod bytecode;
pub mod compiler;
pub mod constants;
pub mod parser;
pub mod runtime;
pub mod signature;
pub mod word;

pub use self::{
    bytecode::Bytecode,
    compiler::{assemble, compile, disassemble},
    parser::parse,
    runtime::Machine,
};
