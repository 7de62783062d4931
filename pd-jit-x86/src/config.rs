#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AssemblerConfig {
    /// Absolute address code position 0 is loaded at. Calls to absolute
    /// addresses are encoded relative to `origin + position`.
    pub origin: u32,
    pub initial_capacity: usize,
}

impl Default for AssemblerConfig {
    fn default() -> Self {
        Self {
            origin: 0,
            initial_capacity: 512,
        }
    }
}

impl AssemblerConfig {
    pub fn at_origin(origin: u32) -> Self {
        Self {
            origin,
            ..Self::default()
        }
    }
}
