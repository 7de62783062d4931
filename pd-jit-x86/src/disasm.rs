//! Human-readable listings of emitted code, for diagnostics only.

use std::fmt::Write;

use iced_x86::{Decoder, DecoderOptions, Formatter, Instruction, NasmFormatter};

/// One line per instruction: runtime address, raw bytes, NASM syntax.
pub fn listing(code: &[u8], origin: u32) -> String {
    let mut decoder = Decoder::with_ip(32, code, u64::from(origin), DecoderOptions::NONE);
    let mut formatter = NasmFormatter::new();
    let mut instruction = Instruction::default();
    let mut text = String::new();
    let mut out = String::new();
    let mut position = 0usize;
    while decoder.can_decode() {
        decoder.decode_out(&mut instruction);
        let len = instruction.len();
        text.clear();
        formatter.format(&instruction, &mut text);
        let hex: String = code[position..position + len]
            .iter()
            .map(|byte| format!("{byte:02X}"))
            .collect();
        let address = origin.wrapping_add(position as u32);
        let _ = writeln!(out, "{address:08X}  {hex:<16}  {text}");
        position += len;
    }
    out
}
