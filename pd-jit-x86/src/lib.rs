//! 32-bit x86 instruction emitter for the pd JIT.
//!
//! [`Assembler`] appends encoded instructions to a [`CodeBuffer`]. Branch
//! targets, program-counter captures and absolute address slots that are
//! only known later are handed back as handles ([`NearJump`],
//! [`InstructionDisplacement`], [`FuturePosition`]) and resolved by
//! rewriting the already-emitted bytes.

pub mod buffer;
pub mod config;
#[cfg(feature = "disasm")]
pub mod disasm;
pub mod encoder;
pub mod error;
pub mod frame;
pub mod patch;
pub mod register;

pub use buffer::{CodeBuffer, PatchSite};
pub use config::AssemblerConfig;
pub use encoder::{Assembler, IMM_OP_IMM_OFFSET, ImmOp, MOV_IMM_OFFSET, ModMode, modrm};
pub use error::{AsmError, AsmResult};
pub use frame::{CALLEE_SAVED, EPILOGUE_SIZE, arg_address, call_padding, frame_size};
pub use patch::{Condition, FuturePosition, InstructionDisplacement, NearJump};
pub use register::{Address, EAX, EBP, EBX, ECX, EDI, EDX, ESI, ESP, Register};
