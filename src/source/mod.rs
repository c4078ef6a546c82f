pub mod filter;
pub mod follow;
pub mod tailer;

pub use filter::{should_exclude, LineFilter};
pub use follow::{FollowConfig, FollowError, Follower, TailCursor};
pub use tailer::{FileTailer, RotationGuard, TailError, TailOutcome, TailReport, TailState, TailerSettings};
