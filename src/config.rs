/// Tuning knobs of a [`Registry`](crate::Registry).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TransferConfig {
    /// Maximum nesting of containers and objects, on both encode and decode.
    pub max_depth: usize,
    /// Number of generic encode/decode calls on a registered type after which a
    /// compiled codec replaces the generic one. `None` disables the compiled tier.
    pub compile_threshold: Option<u32>,
    /// Whether types declaring `#[transfer(id = N)]` are bound on first use.
    pub auto_register: bool,
}

impl TransferConfig {
    pub const DEFAULT_MAX_DEPTH: usize = 512;
    pub const DEFAULT_COMPILE_THRESHOLD: u32 = 64;

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub fn with_compile_threshold(mut self, threshold: Option<u32>) -> Self {
        self.compile_threshold = threshold;
        self
    }

    pub fn with_auto_register(mut self, enabled: bool) -> Self {
        self.auto_register = enabled;
        self
    }
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            max_depth: Self::DEFAULT_MAX_DEPTH,
            compile_threshold: Some(Self::DEFAULT_COMPILE_THRESHOLD),
            auto_register: true,
        }
    }
}
