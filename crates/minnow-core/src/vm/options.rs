/// Embedder-facing knobs for a VM instance. The machine itself never
/// yields or blocks; the one limit it owns is how deep the return stack
/// may grow before it reports a fault instead of recursing forever.
#[derive(Clone, Debug)]
pub struct VmOptions {
    pub call_depth_limit: usize,
}

impl Default for VmOptions {
    fn default() -> Self {
        Self {
            call_depth_limit: 4096,
        }
    }
}
