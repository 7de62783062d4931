#![allow(dead_code, unused_imports)]

use std::collections::HashMap;

use iced_x86::{
    Decoder, DecoderOptions, Instruction, Mnemonic, OpKind, Register as IcedRegister,
};
pub use jit_x86::{Address, Assembler, AssemblerConfig, NearJump, Register};

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub fn iced(reg: Register) -> IcedRegister {
    match reg {
        Register::Eax => IcedRegister::EAX,
        Register::Ecx => IcedRegister::ECX,
        Register::Edx => IcedRegister::EDX,
        Register::Ebx => IcedRegister::EBX,
        Register::Esp => IcedRegister::ESP,
        Register::Ebp => IcedRegister::EBP,
        Register::Esi => IcedRegister::ESI,
        Register::Edi => IcedRegister::EDI,
    }
}

fn slot(reg: IcedRegister) -> usize {
    match reg {
        IcedRegister::EAX => 0,
        IcedRegister::ECX => 1,
        IcedRegister::EDX => 2,
        IcedRegister::EBX => 3,
        IcedRegister::ESP => 4,
        IcedRegister::EBP => 5,
        IcedRegister::ESI => 6,
        IcedRegister::EDI => 7,
        other => panic!("unexpected register {other:?}"),
    }
}

pub fn decode_all(code: &[u8], origin: u32) -> Vec<Instruction> {
    let mut decoder = Decoder::with_ip(32, code, u64::from(origin), DecoderOptions::NONE);
    let mut out = Vec::new();
    while decoder.can_decode() {
        let instr = decoder.decode();
        assert_ne!(
            instr.mnemonic(),
            Mnemonic::INVALID,
            "invalid instruction at 0x{:08X} in {:02X?}",
            instr.ip32(),
            code
        );
        out.push(instr);
    }
    out
}

/// Emits through `build` and decodes the result as exactly one instruction.
pub fn emit_one(build: impl FnOnce(&mut Assembler)) -> (Instruction, Vec<u8>) {
    let mut asm = Assembler::new();
    build(&mut asm);
    let code = asm.into_code();
    let decoded = decode_all(&code, 0);
    assert_eq!(
        decoded.len(),
        1,
        "expected one instruction, got {decoded:?} from {code:02X?}"
    );
    assert_eq!(decoded[0].len(), code.len());
    (decoded[0], code)
}

pub fn assert_memory(instr: &Instruction, operand: u32, addr: Address) {
    assert_eq!(instr.op_kind(operand), OpKind::Memory, "{instr}");
    assert_eq!(instr.memory_base(), iced(addr.base), "{instr}");
    assert_eq!(instr.memory_index(), IcedRegister::None, "{instr}");
    assert_eq!(instr.memory_displacement32() as i32, addr.offset, "{instr}");
}

#[derive(Debug, PartialEq, Eq)]
pub enum Step {
    Continue,
    Returned(u32),
}

/// Executes the handful of instructions the frame and capture sequences
/// use, against a sparse word-addressed stack.
pub struct Machine {
    pub regs: [u32; 8],
    pub eip: u32,
    pub stack: HashMap<u32, u32>,
    origin: u32,
}

impl Machine {
    pub fn new(origin: u32, esp: u32) -> Self {
        let mut regs = [0u32; 8];
        regs[4] = esp;
        Self {
            regs,
            eip: origin,
            stack: HashMap::new(),
            origin,
        }
    }

    pub fn reg(&self, reg: Register) -> u32 {
        self.regs[usize::from(reg.code())]
    }

    pub fn esp(&self) -> u32 {
        self.regs[4]
    }

    pub fn push(&mut self, value: u32) {
        self.regs[4] = self.regs[4].wrapping_sub(4);
        self.stack.insert(self.regs[4], value);
    }

    pub fn pop(&mut self) -> u32 {
        let value = *self
            .stack
            .get(&self.regs[4])
            .unwrap_or_else(|| panic!("pop from unwritten slot 0x{:08X}", self.regs[4]));
        self.regs[4] = self.regs[4].wrapping_add(4);
        value
    }

    pub fn step(&mut self, code: &[u8]) -> Step {
        let offset = self.eip.wrapping_sub(self.origin) as usize;
        let mut decoder = Decoder::with_ip(
            32,
            &code[offset..],
            u64::from(self.eip),
            DecoderOptions::NONE,
        );
        let instr = decoder.decode();
        self.eip = instr.next_ip32();
        match instr.mnemonic() {
            Mnemonic::Call => {
                assert_eq!(instr.op0_kind(), OpKind::NearBranch32, "{instr}");
                let next = instr.next_ip32();
                self.push(next);
                self.eip = instr.near_branch32();
            }
            Mnemonic::Push => match instr.op0_kind() {
                OpKind::Register => {
                    let value = self.regs[slot(instr.op0_register())];
                    self.push(value);
                }
                OpKind::Immediate32 | OpKind::Immediate8to32 => {
                    self.push(instr.immediate32());
                }
                other => panic!("unsupported push operand {other:?} in {instr}"),
            },
            Mnemonic::Pop => {
                let value = self.pop();
                self.regs[slot(instr.op0_register())] = value;
            }
            Mnemonic::Mov if instr.op1_kind() == OpKind::Register => {
                self.regs[slot(instr.op0_register())] = self.regs[slot(instr.op1_register())];
            }
            Mnemonic::Mov if instr.op1_kind() == OpKind::Immediate32 => {
                self.regs[slot(instr.op0_register())] = instr.immediate32();
            }
            Mnemonic::Add | Mnemonic::Sub => {
                assert_eq!(instr.op0_kind(), OpKind::Register, "{instr}");
                let dst = slot(instr.op0_register());
                let value = instr.immediate32();
                self.regs[dst] = if instr.mnemonic() == Mnemonic::Add {
                    self.regs[dst].wrapping_add(value)
                } else {
                    self.regs[dst].wrapping_sub(value)
                };
            }
            Mnemonic::Leave => {
                self.regs[4] = self.regs[5];
                self.regs[5] = self.pop();
            }
            Mnemonic::Ret => {
                let target = self.pop();
                self.eip = target;
                return Step::Returned(target);
            }
            Mnemonic::Nop => {}
            other => panic!("machine does not model {other:?} ({instr})"),
        }
        Step::Continue
    }

    pub fn run_steps(&mut self, code: &[u8], count: usize) {
        for _ in 0..count {
            assert_eq!(self.step(code), Step::Continue);
        }
    }

    pub fn run_to_return(&mut self, code: &[u8]) -> u32 {
        loop {
            if let Step::Returned(target) = self.step(code) {
                return target;
            }
        }
    }
}
