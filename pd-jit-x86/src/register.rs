/// One of the eight 32-bit general purpose registers, numbered the way the
/// processor encodes them in opcodes and ModRM fields.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Register {
    Eax = 0,
    Ecx = 1,
    Edx = 2,
    Ebx = 3,
    Esp = 4,
    Ebp = 5,
    Esi = 6,
    Edi = 7,
}

pub const EAX: Register = Register::Eax;
pub const ECX: Register = Register::Ecx;
pub const EDX: Register = Register::Edx;
pub const EBX: Register = Register::Ebx;
pub const ESP: Register = Register::Esp;
pub const EBP: Register = Register::Ebp;
pub const ESI: Register = Register::Esi;
pub const EDI: Register = Register::Edi;

impl Register {
    pub const ALL: [Register; 8] = [EAX, ECX, EDX, EBX, ESP, EBP, ESI, EDI];

    pub const fn code(self) -> u8 {
        self as u8
    }

    pub fn from_code(code: u8) -> Option<Register> {
        Self::ALL.get(usize::from(code)).copied()
    }

    pub const fn name(self) -> &'static str {
        match self {
            Register::Eax => "eax",
            Register::Ecx => "ecx",
            Register::Edx => "edx",
            Register::Ebx => "ebx",
            Register::Esp => "esp",
            Register::Ebp => "ebp",
            Register::Esi => "esi",
            Register::Edi => "edi",
        }
    }

    pub const fn at(self, offset: i32) -> Address {
        Address::new(self, offset)
    }
}

impl std::fmt::Display for Register {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Base register plus signed 32-bit displacement. Index/scale addressing is
/// not representable.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Address {
    pub base: Register,
    pub offset: i32,
}

impl Address {
    pub const fn new(base: Register, offset: i32) -> Self {
        Self { base, offset }
    }
}

impl From<Register> for Address {
    fn from(base: Register) -> Self {
        Self::new(base, 0)
    }
}

impl std::fmt::Display for Address {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.offset < 0 {
            write!(f, "[{}-0x{:X}]", self.base, self.offset.unsigned_abs())
        } else {
            write!(f, "[{}+0x{:X}]", self.base, self.offset)
        }
    }
}
