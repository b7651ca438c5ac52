//! Harvester engine: quota accounting, the provider client, collection runs
//! and the job queue that executes them.
mod collect;
mod dedup;
mod directory;
mod harvest;
mod persist;
mod provider;
mod queue;
mod quota;
mod store;
mod types;

pub use collect::{CollectionOrchestrator, CollectionSettings};
pub use dedup::{DedupGate, DedupPolicy, DedupScope};
pub use directory::{ChannelDirectory, ChannelGroup, StaticChannelDirectory};
pub use harvest::{ChannelHarvest, ChannelHarvester, HarvestSettings, MAX_PAGE_SIZE};
pub use persist::{ensure_data_dir, AtomicFileWriter, PersistError};
pub use provider::{
    parse_video_item, ProviderSettings, SearchHit, SearchQuery, VideoProvider, YouTubeProvider,
    DEFAULT_BASE_URL,
};
pub use queue::{JobQueue, QueueSettings};
pub use quota::{
    next_midnight, spawn_daily_reset, QuotaLedger, QuotaSettings, QuotaState,
    DEFAULT_DAILY_LIMIT, DEFAULT_SAFETY_MARGIN,
};
pub use store::{FileVideoStore, MemoryVideoStore, StoredVideo, VideoStore, VIDEO_STORE_FILE};
pub use types::{
    ChannelProgress, HarvestError, NullProgressSink, ProgressSink, ProviderError, StoreError,
};
