use crate::error::{AsmError, AsmResult};

/// Append-only byte sink the assembler emits into. Bytes are never removed,
/// only overwritten in place through `overwrite_word32`.
pub trait CodeBuffer {
    fn append_byte(&mut self, byte: u8);

    fn append_word32(&mut self, word: u32) {
        for byte in word.to_le_bytes() {
            self.append_byte(byte);
        }
    }

    /// Offset the next append will land at.
    fn current_position(&self) -> usize;

    fn overwrite_word32(&mut self, position: usize, word: u32) -> AsmResult<()>;

    fn bytes(&self) -> &[u8];
}

impl CodeBuffer for Vec<u8> {
    fn append_byte(&mut self, byte: u8) {
        self.push(byte);
    }

    fn append_word32(&mut self, word: u32) {
        self.extend_from_slice(&word.to_le_bytes());
    }

    fn current_position(&self) -> usize {
        self.len()
    }

    fn overwrite_word32(&mut self, position: usize, word: u32) -> AsmResult<()> {
        let len = self.len();
        match position.checked_add(4) {
            Some(end) if end <= len => {
                self[position..end].copy_from_slice(&word.to_le_bytes());
                Ok(())
            }
            _ => Err(AsmError::PatchOutOfBounds { position, len }),
        }
    }

    fn bytes(&self) -> &[u8] {
        self.as_slice()
    }
}

/// Position of a 4-byte field that will be rewritten once its value is
/// known.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct PatchSite {
    position: usize,
}

impl PatchSite {
    pub(crate) const fn new(position: usize) -> Self {
        Self { position }
    }

    pub const fn position(self) -> usize {
        self.position
    }

    /// Position right after the field, which is what x86 measures relative
    /// displacements from when the field ends the instruction.
    pub const fn end(self) -> usize {
        self.position + 4
    }

    pub fn write<B: CodeBuffer + ?Sized>(self, buffer: &mut B, word: u32) -> AsmResult<()> {
        buffer.overwrite_word32(self.position, word)
    }

    pub fn read<B: CodeBuffer + ?Sized>(self, buffer: &B) -> Option<u32> {
        let field = buffer.bytes().get(self.position..self.end())?;
        Some(u32::from_le_bytes([field[0], field[1], field[2], field[3]]))
    }
}

pub(crate) fn rel32(from: usize, to: usize) -> AsmResult<i32> {
    let rel = (to as i64) - (from as i64);
    i32::try_from(rel).map_err(|_| AsmError::DisplacementOverflow { from, to })
}
