//! The BVM2 stack machine: module loader, linear memory, far-call frame bookkeeping,
//! the `Metering`/`HostInterface` seams, and the interpreter core that drives them.

pub mod frame;
pub mod host_interface;
pub mod instr;
pub mod metering;
pub mod module;
pub mod vm;

pub use frame::{FarCallFrame, FarCallStack, LocalCallFrame};
pub use host_interface::HostInterface;
pub use instr::Instr;
pub use metering::{MeterResult, Metering, NoopMeter};
pub use module::Module;
pub use vm::{Outcome, Vm};
