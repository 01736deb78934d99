//! Bytecode compilation of CSG trees
//!
//! Recursive tree evaluation is cheap to build but pays pointer-chasing
//! costs on every query. This module flattens a tree into a linear word
//! stream that a small stack machine replays:
//!
//! - [`OpCode`]: the instruction set
//! - [`ProgramBuffer`]: the 32-bit word stream, opcodes and parameters
//!   bitcast into one `Vec<u32>`
//! - [`compile`]: tree to word stream, plus a shader-source expression
//! - [`SdfInterpreter`]: the CPU stack machine
//!
//! The same compile pass serves the GPU: with opcode emission turned off
//! the buffer degenerates to a parameter array whose indices match the
//! `PARAMS[..]` references in the returned shader expression, so a shader
//! built from the text and a CPU interpreter built from the opcodes agree
//! on every parameter.
//!
//! Author: Moroya Sakamoto

pub mod compiler;
pub mod interpreter;
pub mod program;

pub use compiler::{compile, compile_shader};
pub use interpreter::SdfInterpreter;
pub use program::{OpCode, ProgramBuffer};
