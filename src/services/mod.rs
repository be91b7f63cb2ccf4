pub mod backfill;
pub mod guard;
pub mod hierarchy;
pub mod portfolio;
pub mod reconcile;
pub mod session;
pub mod starter;

pub use backfill::{BackfillStats, initialize_structure_from_entries};
pub use guard::{SyncGuard, SyncTicket};
pub use hierarchy::{StructureNode, build_hierarchy};
pub use portfolio::PortfolioService;
pub use reconcile::{ReconcilePlan, ReconcileService, ReconcileStats, plan_reconciliation};
pub use session::{PortfolioSession, SessionDeps, SessionManager};
pub use starter::StarterContentPolicy;
