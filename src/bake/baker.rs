use anyhow::Result;

use super::maps::BakeTargets;
use super::state::RetainedState;

/// Bake operation invoked once per tick.
///
/// Folds the current retained state into the output targets. Implementations
/// see a fully updated state: no channel is mid-load while `bake` runs.
pub trait Baker: Send {
    /// Baker identifier.
    fn name(&self) -> &'static str;

    /// Write `state` into `targets`.
    fn bake(&mut self, state: &RetainedState, targets: &mut BakeTargets) -> Result<()>;
}
