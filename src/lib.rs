// Thing Discovery Core
// Discovery results, the inbox they feed, and the registry that runs scans

pub mod discovery;
pub mod inbox;
pub mod models;

pub use discovery::{
    DiscoveryService, DiscoveryServiceRegistry, RegistryConfig, ScanStats, DEFAULT_SCAN_TIMEOUT,
};
pub use inbox::{
    Inbox, InboxEntry, InboxEvent, InboxEventKind, InboxListener, InboxOutcome, InboxStats,
    InboxStore,
};
pub use models::{
    DiscoveryError, DiscoveryResult, DiscoveryResultBuilder, DiscoveryResultFlag, ThingTypeUid,
    ThingUid,
};
