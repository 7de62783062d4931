use tracing::debug;

use crate::buffer::CodeBuffer;
use crate::encoder::Assembler;
use crate::register::{Address, EBP, EBX, EDI, ESI, ESP, Register};

/// Bytes emitted by [`Assembler::epilogue`]: three pops, `add esp, imm32`,
/// `leave`, `ret`.
pub const EPILOGUE_SIZE: usize = 11;

const STACK_ALIGNMENT: u32 = 16;
const WORD_SIZE: u32 = 4;

/// Callee-saved registers in push order; the epilogue pops them reversed.
pub const CALLEE_SAVED: [Register; 3] = [EDI, ESI, EBX];

/// Frame allocation `prologue` makes for `requested` bytes of locals.
///
/// At least 8 bytes are always reserved for the return address and saved
/// frame pointer; larger requests grow by those 8 bytes and round up to the
/// stack alignment. The extra word offsets the three callee-saved pushes.
pub fn frame_size(requested: u32) -> u32 {
    let size = if requested <= 8 {
        8
    } else {
        (requested + 8).next_multiple_of(STACK_ALIGNMENT)
    };
    size + WORD_SIZE
}

/// Padding needed before pushing `args` words so the call site lands on
/// the stack alignment.
pub fn call_padding(args: u32) -> u32 {
    let rem = (args * WORD_SIZE) % STACK_ALIGNMENT;
    (STACK_ALIGNMENT - rem) % STACK_ALIGNMENT
}

/// Location of the `index`-th argument pushed by the caller.
pub fn arg_address(index: u32) -> Address {
    EBP.at((8 + index * WORD_SIZE) as i32)
}

impl<B: CodeBuffer> Assembler<B> {
    /// Sets up an ebp frame with room for `stack` bytes and saves the
    /// callee-saved registers. Returns the size to hand to `epilogue`.
    pub fn prologue(&mut self, stack: u32) -> u32 {
        self.push(EBP);
        self.mov_rr(EBP, ESP);
        let size = frame_size(stack);
        self.sub_ri(ESP, size as i32);
        for reg in CALLEE_SAVED {
            self.push(reg);
        }
        debug!(requested = stack, allocated = size, "emitted prologue");
        size
    }

    pub fn epilogue(&mut self, stack: u32) {
        for reg in CALLEE_SAVED.iter().rev() {
            self.pop(*reg);
        }
        self.add_ri(ESP, stack as i32);
        self.leave();
        self.ret();
    }

    pub fn start_call(&mut self, args: u32) {
        let padding = call_padding(args);
        if padding != 0 {
            self.sub_ri(ESP, padding as i32);
        }
    }

    /// Drops the pushed arguments and the padding `start_call` added.
    pub fn end_call(&mut self, args: u32) {
        let bytes = args * WORD_SIZE + call_padding(args);
        if bytes != 0 {
            self.add_ri(ESP, bytes as i32);
        }
    }

    pub fn load_arg(&mut self, dst: Register, index: u32) {
        self.mov_rm(dst, arg_address(index));
    }

    pub fn push_arg(&mut self, index: u32) {
        self.push_mem(arg_address(index));
    }
}
