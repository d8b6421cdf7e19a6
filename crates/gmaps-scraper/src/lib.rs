pub mod aggregate;
pub mod consent;
pub mod diagnostics;
pub mod driver;
pub mod error;
pub mod extract;
pub mod feed;
pub mod orchestrator;
pub mod rate_limit;
pub mod session_pool;
pub mod types;

pub use aggregate::{Aggregate, AggregateCounts, ResultAggregator};
pub use consent::ConsentHandler;
pub use diagnostics::DiagnosticSink;
pub use driver::{
    BrowserDriver, BrowserSession, ChromiumDriver, ClientIdentity, Selector, Snapshot,
};
pub use error::{DriverError, ScraperError};
pub use extract::{ExtractionOutcome, ExtractionPipeline};
pub use feed::{Discovery, FeedPaginator, StopReason};
pub use orchestrator::{run_search, Orchestrator};
pub use session_pool::{PooledSession, SessionPool};
pub use types::PlaceRef;
