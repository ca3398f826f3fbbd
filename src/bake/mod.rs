mod baker;
mod cycle;
mod maps;
mod state;

pub use baker::Baker;
pub use cycle::{BakeCycle, ChannelUpdate, ShutdownReport, TickReport};
pub use maps::{AttributeMap, BakeStats, BakeTargets, CpuBaker};
pub use state::{ColorImage, PointCloud, RetainedState};
