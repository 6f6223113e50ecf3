//! Task scheduling and ordered emission.
//!
//! - [`TaskGroup`] admits at most `max_concurrent` tasks and runs them on a
//!   fixed worker pool.
//! - [`FrameSequencer`] parks finished tasks and releases them in sequence
//!   order.
//!
//! Together they give the session pipeline bounded memory use and strict
//! output ordering:
//!
//! ```text
//! producer ──submit──► TaskGroup ──work──► FrameSequencer ──drain──► sink
//!   (blocks when full)      (any order)          (in order)
//! ```

mod sequencer;
mod task_group;

pub use sequencer::{FrameSequencer, Sequenced};
pub use task_group::TaskGroup;
