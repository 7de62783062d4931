use tracing::trace;

use crate::buffer::{CodeBuffer, PatchSite, rel32};
use crate::encoder::{Assembler, IMM_OP_IMM_OFFSET};
use crate::error::{AsmError, AsmResult};
use crate::register::Register;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Condition {
    Overflow,
    Equal,
    NotEqual,
}

impl Condition {
    /// Second byte of the `0x0F 0x8x` near conditional jump.
    pub const fn opcode(self) -> u8 {
        match self {
            Condition::Overflow => 0x80,
            Condition::Equal => 0x84,
            Condition::NotEqual => 0x85,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
enum LabelState {
    Unplaced { pending: Vec<PatchSite> },
    Placed { destination: usize },
}

/// Target of near (rel32) jumps.
///
/// Jumps emitted before the label is placed are written with a zero
/// displacement and remembered; placing the label rewrites every one of
/// them. Jumps emitted after placement get their final displacement
/// immediately.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NearJump {
    state: LabelState,
}

impl Default for NearJump {
    fn default() -> Self {
        Self::new()
    }
}

impl NearJump {
    pub fn new() -> Self {
        Self {
            state: LabelState::Unplaced {
                pending: Vec::new(),
            },
        }
    }

    pub fn is_placed(&self) -> bool {
        matches!(self.state, LabelState::Placed { .. })
    }

    pub fn destination(&self) -> Option<usize> {
        match self.state {
            LabelState::Placed { destination } => Some(destination),
            LabelState::Unplaced { .. } => None,
        }
    }

    pub fn pending_sites(&self) -> &[PatchSite] {
        match &self.state {
            LabelState::Unplaced { pending } => pending,
            LabelState::Placed { .. } => &[],
        }
    }
}

/// Byte span measured from just after a `read_eip` call to a later
/// position, written back into the `add` that follows the capture.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct InstructionDisplacement {
    start: usize,
    replace_at: PatchSite,
    end: Option<usize>,
}

impl InstructionDisplacement {
    pub fn start(&self) -> usize {
        self.start
    }

    pub fn replace_at(&self) -> PatchSite {
        self.replace_at
    }

    pub fn end(&self) -> Option<usize> {
        self.end
    }

    pub fn difference(&self) -> Option<i64> {
        self.end.map(|end| end as i64 - self.start as i64)
    }
}

/// A 32-bit absolute address slot, filled in once the address is known.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FuturePosition {
    site: PatchSite,
    address: Option<u32>,
}

impl From<PatchSite> for FuturePosition {
    fn from(site: PatchSite) -> Self {
        Self {
            site,
            address: None,
        }
    }
}

impl FuturePosition {
    pub fn site(&self) -> PatchSite {
        self.site
    }

    pub fn address(&self) -> Option<u32> {
        self.address
    }

    pub fn is_resolved(&self) -> bool {
        self.address.is_some()
    }
}

impl<B: CodeBuffer> Assembler<B> {
    pub fn jump(&mut self, target: &mut NearJump) -> AsmResult<()> {
        self.emit(0xE9);
        self.emit_near_operand(target)
    }

    pub fn jump_if(&mut self, condition: Condition, target: &mut NearJump) -> AsmResult<()> {
        self.emit(0x0F);
        self.emit(condition.opcode());
        self.emit_near_operand(target)
    }

    pub fn jump_if_equal(&mut self, target: &mut NearJump) -> AsmResult<()> {
        self.jump_if(Condition::Equal, target)
    }

    pub fn jump_if_not_equal(&mut self, target: &mut NearJump) -> AsmResult<()> {
        self.jump_if(Condition::NotEqual, target)
    }

    pub fn jump_if_overflow(&mut self, target: &mut NearJump) -> AsmResult<()> {
        self.jump_if(Condition::Overflow, target)
    }

    fn emit_near_operand(&mut self, target: &mut NearJump) -> AsmResult<()> {
        match &mut target.state {
            LabelState::Placed { destination } => {
                let rel = rel32(self.position() + 4, *destination)?;
                self.emit_word32(rel as u32);
            }
            LabelState::Unplaced { pending } => {
                pending.push(self.emit_patch_site(0));
            }
        }
        Ok(())
    }

    pub fn set_label(&mut self, target: &mut NearJump) -> AsmResult<()> {
        let destination = self.position();
        let pending = match &target.state {
            LabelState::Placed { destination } => {
                return Err(AsmError::LabelAlreadyPlaced {
                    destination: *destination,
                });
            }
            LabelState::Unplaced { pending } => pending,
        };
        for site in pending {
            let rel = rel32(site.end(), destination)?;
            self.patch_word32(*site, rel as u32)?;
        }
        trace!(destination, patched = pending.len(), "placed near label");
        target.state = LabelState::Placed { destination };
        Ok(())
    }

    /// Loads the runtime address of the code into `reg`: `call` to the next
    /// instruction, `pop` the pushed return address, then `add` the span
    /// recorded by the returned handle.
    pub fn read_eip(&mut self, reg: Register) -> InstructionDisplacement {
        self.emit(0xE8);
        self.emit_word32(0);
        let start = self.position();
        self.pop(reg);
        let replace_at = PatchSite::new(self.position() + IMM_OP_IMM_OFFSET);
        self.add_ri(reg, 0);
        InstructionDisplacement {
            start,
            replace_at,
            end: None,
        }
    }

    pub fn fix_end(
        &mut self,
        displacement: &mut InstructionDisplacement,
        position: usize,
    ) -> AsmResult<()> {
        if let Some(end) = displacement.end {
            return Err(AsmError::DisplacementAlreadyFixed {
                start: displacement.start,
                end,
            });
        }
        let delta = rel32(displacement.start, position)?;
        self.patch_word32(displacement.replace_at, delta as u32)?;
        trace!(
            start = displacement.start,
            end = position,
            delta,
            "fixed instruction displacement"
        );
        displacement.end = Some(position);
        Ok(())
    }

    pub fn set_end(&mut self, displacement: &mut InstructionDisplacement) -> AsmResult<()> {
        let position = self.position();
        self.fix_end(displacement, position)
    }

    /// `mov dst, imm32` whose immediate is an absolute address supplied later.
    pub fn mov_future(&mut self, dst: Register) -> FuturePosition {
        FuturePosition::from(self.mov_delayed(dst))
    }

    pub fn update(&mut self, future: &mut FuturePosition, address: u32) -> AsmResult<()> {
        if let Some(resolved) = future.address {
            return Err(AsmError::FutureAlreadyResolved {
                position: future.site.position(),
                address: resolved,
            });
        }
        self.patch_word32(future.site, address)?;
        trace!(
            site = future.site.position(),
            address,
            "updated future position"
        );
        future.address = Some(address);
        Ok(())
    }

    /// Resolves `future` to the runtime address of a code position.
    pub fn update_to_position(
        &mut self,
        future: &mut FuturePosition,
        position: usize,
    ) -> AsmResult<()> {
        let address = self.address_of(position);
        self.update(future, address)
    }
}
