pub mod edges;
pub mod expansion;
pub mod layered;
pub mod layout;
pub mod merge;
pub mod prune;
pub mod registry;
pub mod session;
pub mod state;
pub mod traversal;

pub use edges::EdgeStore;
pub use expansion::{DirectionState, ExpandOutcome, ExpansionController, ExpansionPhase};
pub use layered::LayeredLayout;
pub use layout::{LayoutRequestCoordinator, PositionedSnapshot};
pub use merge::{MergeEngine, MergeOutcome};
pub use prune::{prune_unreachable, PruneOutcome};
pub use registry::{EntityRecord, EntityRegistry, UpsertResult};
pub use session::LineageSession;
pub use state::{Classification, GraphSnapshot, GraphState};
