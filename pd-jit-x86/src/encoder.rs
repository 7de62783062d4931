use crate::buffer::{CodeBuffer, PatchSite};
use crate::config::AssemblerConfig;
use crate::error::AsmResult;
use crate::register::{Address, ESP, Register};

/// The two-bit mode field of a ModRM byte.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum ModMode {
    Indirect = 0,
    Disp8 = 1,
    Disp32 = 2,
    Direct = 3,
}

/// Opcode-extension subcodes of the `0x81` immediate group, carried in the
/// reg field of the ModRM byte.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum ImmOp {
    Add = 0,
    Or = 1,
    And = 4,
    Sub = 5,
    Cmp = 7,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
enum ShiftOp {
    Shl = 4,
    Sar = 7,
}

pub const fn modrm(mode: ModMode, reg: u8, rm: u8) -> u8 {
    ((mode as u8) << 6) | ((reg & 0x7) << 3) | (rm & 0x7)
}

// rm=4 in a memory form selects a SIB byte; this one means [esp] with no index.
const ESP_SIB: u8 = 0x24;

/// Byte offset of the immediate inside `mov r32, imm32`.
pub const MOV_IMM_OFFSET: usize = 1;

/// Byte offset of the immediate inside `0x81 /op r32, imm32`.
pub const IMM_OP_IMM_OFFSET: usize = 2;

/// Emits 32-bit x86 machine code into a [`CodeBuffer`].
///
/// Instruction methods append bytes and never fail. Methods that write into
/// already-emitted bytes return [`AsmResult`].
pub struct Assembler<B: CodeBuffer = Vec<u8>> {
    buffer: B,
    config: AssemblerConfig,
}

impl Default for Assembler {
    fn default() -> Self {
        Self::new()
    }
}

impl Assembler {
    pub fn new() -> Self {
        Self::with_config(AssemblerConfig::default())
    }

    pub fn with_config(config: AssemblerConfig) -> Self {
        let buffer = Vec::with_capacity(config.initial_capacity);
        Self { buffer, config }
    }

    pub fn into_code(self) -> Vec<u8> {
        self.buffer
    }
}

impl<B: CodeBuffer> Assembler<B> {
    pub fn with_buffer(buffer: B, config: AssemblerConfig) -> Self {
        Self { buffer, config }
    }

    pub fn config(&self) -> &AssemblerConfig {
        &self.config
    }

    pub fn buffer(&self) -> &B {
        &self.buffer
    }

    pub fn into_buffer(self) -> B {
        self.buffer
    }

    pub fn code(&self) -> &[u8] {
        self.buffer.bytes()
    }

    pub fn position(&self) -> usize {
        self.buffer.current_position()
    }

    /// Runtime address of `position` once the code is loaded at the
    /// configured origin. Addresses wrap like `eip` does.
    pub fn address_of(&self, position: usize) -> u32 {
        self.config.origin.wrapping_add(position as u32)
    }

    pub fn emit(&mut self, byte: u8) {
        self.buffer.append_byte(byte);
    }

    pub fn emit_word32(&mut self, word: u32) {
        self.buffer.append_word32(word);
    }

    fn emit_imm32(&mut self, value: i32) {
        self.buffer.append_word32(value as u32);
    }

    /// Emits a placeholder word and returns where it lives.
    pub(crate) fn emit_patch_site(&mut self, placeholder: u32) -> PatchSite {
        let site = PatchSite::new(self.position());
        self.emit_word32(placeholder);
        site
    }

    pub fn patch_word32(&mut self, site: PatchSite, word: u32) -> AsmResult<()> {
        site.write(&mut self.buffer, word)
    }

    fn emit_modrm(&mut self, mode: ModMode, reg: u8, rm: u8) {
        self.emit(modrm(mode, reg, rm));
    }

    /// ModRM (+ SIB when the base is esp) and disp32 for a memory operand.
    fn emit_mem(&mut self, reg: u8, addr: Address) {
        if addr.base == ESP {
            self.emit_modrm(ModMode::Disp32, reg, ESP.code());
            self.emit(ESP_SIB);
        } else {
            self.emit_modrm(ModMode::Disp32, reg, addr.base.code());
        }
        self.emit_imm32(addr.offset);
    }

    fn emit_imm_op(&mut self, op: ImmOp, reg: Register, value: i32) {
        self.emit(0x81);
        self.emit_modrm(ModMode::Direct, op as u8, reg.code());
        self.emit_imm32(value);
    }

    fn emit_imm_op_mem(&mut self, op: ImmOp, addr: Address, value: i32) {
        self.emit(0x81);
        self.emit_mem(op as u8, addr);
        self.emit_imm32(value);
    }

    fn emit_reg_reg(&mut self, opcode: u8, dst: Register, src: Register) {
        self.emit(opcode);
        self.emit_modrm(ModMode::Direct, dst.code(), src.code());
    }

    fn emit_shift(&mut self, op: ShiftOp, reg: Register, count: u8) {
        self.emit(0xC1);
        self.emit_modrm(ModMode::Direct, op as u8, reg.code());
        self.emit(count);
    }

    // Data movement

    pub fn mov_ri(&mut self, dst: Register, value: u32) {
        self.emit(0xB8 | dst.code());
        self.emit_word32(value);
    }

    pub fn mov_mi(&mut self, addr: Address, value: i32) {
        self.emit(0xC7);
        self.emit_mem(0, addr);
        self.emit_imm32(value);
    }

    pub fn mov_rr(&mut self, dst: Register, src: Register) {
        self.emit_reg_reg(0x8B, dst, src);
    }

    pub fn mov_rm(&mut self, dst: Register, addr: Address) {
        self.emit(0x8B);
        self.emit_mem(dst.code(), addr);
    }

    pub fn mov_mr(&mut self, addr: Address, src: Register) {
        self.emit(0x89);
        self.emit_mem(src.code(), addr);
    }

    /// `mov dst, 0` whose immediate is rewritten later via the returned site.
    pub fn mov_delayed(&mut self, dst: Register) -> PatchSite {
        self.emit(0xB8 | dst.code());
        self.emit_patch_site(0)
    }

    pub fn lea(&mut self, dst: Register, addr: Address) {
        self.emit(0x8D);
        self.emit_mem(dst.code(), addr);
    }

    // Stack

    pub fn push(&mut self, reg: Register) {
        self.emit(0x50 | reg.code());
    }

    pub fn push_imm(&mut self, value: u32) {
        self.emit(0x68);
        self.emit_word32(value);
    }

    pub fn push_address(&mut self, address: u32) {
        self.push_imm(address);
    }

    pub fn push_mem(&mut self, addr: Address) {
        self.emit(0xFF);
        self.emit_mem(6, addr);
    }

    pub fn pop(&mut self, reg: Register) {
        self.emit(0x58 | reg.code());
    }

    // Arithmetic

    pub fn add_ri(&mut self, reg: Register, value: i32) {
        self.emit_imm_op(ImmOp::Add, reg, value);
    }

    pub fn sub_ri(&mut self, reg: Register, value: i32) {
        self.emit_imm_op(ImmOp::Sub, reg, value);
    }

    pub fn cmp_ri(&mut self, reg: Register, value: i32) {
        self.emit_imm_op(ImmOp::Cmp, reg, value);
    }

    pub fn add_mi(&mut self, addr: Address, value: i32) {
        self.emit_imm_op_mem(ImmOp::Add, addr, value);
    }

    pub fn sub_mi(&mut self, addr: Address, value: i32) {
        self.emit_imm_op_mem(ImmOp::Sub, addr, value);
    }

    pub fn cmp_mi(&mut self, addr: Address, value: i32) {
        self.emit_imm_op_mem(ImmOp::Cmp, addr, value);
    }

    pub fn add_rr(&mut self, dst: Register, src: Register) {
        self.emit_reg_reg(0x03, dst, src);
    }

    pub fn sub_rr(&mut self, dst: Register, src: Register) {
        self.emit_reg_reg(0x2B, dst, src);
    }

    pub fn cmp_rr(&mut self, lhs: Register, rhs: Register) {
        self.emit_reg_reg(0x3B, lhs, rhs);
    }

    pub fn inc(&mut self, reg: Register) {
        self.emit(0x40 | reg.code());
    }

    pub fn dec(&mut self, reg: Register) {
        self.emit(0x48 | reg.code());
    }

    // Bit operations

    pub fn shift_left(&mut self, reg: Register, count: u8) {
        self.emit_shift(ShiftOp::Shl, reg, count);
    }

    /// Arithmetic shift: the sign bit is replicated into the vacated bits.
    pub fn shift_right(&mut self, reg: Register, count: u8) {
        self.emit_shift(ShiftOp::Sar, reg, count);
    }

    pub fn or_ri(&mut self, reg: Register, value: i32) {
        self.emit_imm_op(ImmOp::Or, reg, value);
    }

    pub fn and_ri(&mut self, reg: Register, value: i32) {
        self.emit_imm_op(ImmOp::And, reg, value);
    }

    pub fn or_rm(&mut self, dst: Register, addr: Address) {
        self.emit(0x0B);
        self.emit_mem(dst.code(), addr);
    }

    pub fn and_rm(&mut self, dst: Register, addr: Address) {
        self.emit(0x23);
        self.emit_mem(dst.code(), addr);
    }

    // Testing

    pub fn test_rr(&mut self, lhs: Register, rhs: Register) {
        // 0x85 is `test r/m32, r32`, so lhs goes in rm.
        self.emit_reg_reg(0x85, rhs, lhs);
    }

    pub fn test_ri(&mut self, reg: Register, value: i32) {
        self.emit(0xF7);
        self.emit_modrm(ModMode::Direct, 0, reg.code());
        self.emit_imm32(value);
    }

    // Control transfer

    pub fn call_reg(&mut self, reg: Register) {
        self.emit(0xFF);
        self.emit_modrm(ModMode::Direct, 2, reg.code());
    }

    /// `call rel32` to an absolute runtime address, measured from the end of
    /// this instruction at the configured origin.
    pub fn call_address(&mut self, target: u32) {
        self.emit(0xE8);
        let next = self.address_of(self.position() + 4);
        self.emit_word32(target.wrapping_sub(next));
    }

    pub fn jump_reg(&mut self, reg: Register) {
        self.emit(0xFF);
        self.emit_modrm(ModMode::Direct, 4, reg.code());
    }

    // Frame exit

    pub fn leave(&mut self) {
        self.emit(0xC9);
    }

    pub fn ret(&mut self) {
        self.emit(0xC3);
    }

    #[cfg(feature = "disasm")]
    pub fn listing(&self) -> String {
        crate::disasm::listing(self.code(), self.config.origin)
    }
}
