//! Harvester core: pure job-table state machine and the harvest domain types.
mod candidate;
mod channel;
mod effect;
mod event;
mod filter;
mod msg;
mod options;
mod result;
mod state;
mod update;
mod view_model;
mod window;

pub use candidate::{
    parse_iso8601_duration, DurationClass, VideoCandidate, MID_LIMIT_SECS, SHORT_LIMIT_SECS,
};
pub use channel::{normalize_channel_id, normalize_channel_ids};
pub use effect::Effect;
pub use event::JobEvent;
pub use filter::CandidateFilter;
pub use msg::Msg;
pub use options::{DurationFlags, HarvestOptions, Priority, DEFAULT_MIN_VIEWS};
pub use result::{ChannelError, CollectionResult, CollectionStats, ErrorKind};
pub use state::{Job, JobError, JobId, JobProgress, JobStatus, JobTarget, QueueState, Stage};
pub use update::update;
pub use view_model::{JobRowView, QueueView};
pub use window::{HarvestWindow, WindowError, WindowSpec};
