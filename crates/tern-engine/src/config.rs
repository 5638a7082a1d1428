//! Engine configuration.

/// Default operand stack limit, in slots.
pub const DEFAULT_MAX_STACK: usize = 1 << 20;

/// Default length a store may grow a list to.
pub const DEFAULT_MAX_LIST_LEN: usize = 1 << 24;

/// Limits and diagnostics for compiling and running programs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// Maximum number of instructions one run may execute
    pub fuel: Option<u64>,
    /// Maximum operand stack depth
    pub max_stack: usize,
    /// Longest list an element store may produce
    pub max_list_len: usize,
    /// Log a disassembly of every compiled program at `debug`
    pub trace: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            fuel: None,
            max_stack: DEFAULT_MAX_STACK,
            max_list_len: DEFAULT_MAX_LIST_LEN,
            trace: false,
        }
    }
}

impl EngineConfig {
    /// Limits each run to `fuel` instructions.
    pub fn with_fuel(mut self, fuel: u64) -> Self {
        self.fuel = Some(fuel);
        self
    }

    /// Sets the operand stack limit.
    pub fn with_max_stack(mut self, max_stack: usize) -> Self {
        self.max_stack = max_stack;
        self
    }

    /// Sets how far a store past the end may grow a list.
    pub fn with_max_list_len(mut self, max_list_len: usize) -> Self {
        self.max_list_len = max_list_len;
        self
    }

    /// Enables logging of compiled programs.
    pub fn with_trace(mut self, trace: bool) -> Self {
        self.trace = trace;
        self
    }
}
