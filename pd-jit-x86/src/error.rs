#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AsmError {
    PatchOutOfBounds {
        position: usize,
        len: usize,
    },
    DisplacementOverflow {
        from: usize,
        to: usize,
    },
    LabelAlreadyPlaced {
        destination: usize,
    },
    DisplacementAlreadyFixed {
        start: usize,
        end: usize,
    },
    FutureAlreadyResolved {
        position: usize,
        address: u32,
    },
}

impl std::fmt::Display for AsmError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AsmError::PatchOutOfBounds { position, len } => write!(
                f,
                "patch site {position}..{} is outside the emitted code (len {len})",
                position.saturating_add(4),
            ),
            AsmError::DisplacementOverflow { from, to } => write!(
                f,
                "displacement from {from} to {to} does not fit in 32 bits"
            ),
            AsmError::LabelAlreadyPlaced { destination } => {
                write!(f, "label already placed at {destination}")
            }
            AsmError::DisplacementAlreadyFixed { start, end } => {
                write!(f, "displacement {start}..{end} already fixed")
            }
            AsmError::FutureAlreadyResolved { position, address } => write!(
                f,
                "future position at {position} already resolved to 0x{address:08X}"
            ),
        }
    }
}

impl std::error::Error for AsmError {}

pub type AsmResult<T> = Result<T, AsmError>;
