//! Compiles a WebAssembly-shaped contract module into the flat bytecode
//! `vm::Module::parse` executes: resolves `env` imports against the host ABI
//! table, lowers each function body's structured control flow into absolute
//! jumps, validates the `Ctor`/`Dtor`/`Method_<k>` export convention, and
//! assembles the final `[header][data][code]` byte string.

mod abi_link;
mod code_builder;
mod lower;
mod module;
mod opcode;

pub use module::compile;
