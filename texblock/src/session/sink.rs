//! Where encoded frames go.

use parking_lot::Mutex;

use crate::error::CodecError;

/// Host-side receiver of encoder output.
///
/// Calls arrive in strict sequence order, from whichever thread finished
/// the frame that unblocked emission.
pub trait FrameSink: Send + Sync {
    /// `data` is one complete frame, valid only for the duration of the call.
    fn frame_encoded(&self, sequence: u64, data: &[u8]);

    /// The frame with `sequence` failed to encode.
    fn frame_dropped(&self, sequence: u64, error: &CodecError);
}

/// What a [`CollectingSink`] saw.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SinkEvent {
    Encoded { sequence: u64, data: Vec<u8> },
    Dropped { sequence: u64, error: CodecError },
}

impl SinkEvent {
    pub fn sequence(&self) -> u64 {
        match self {
            SinkEvent::Encoded { sequence, .. } | SinkEvent::Dropped { sequence, .. } => *sequence,
        }
    }
}

/// Sink that keeps a copy of everything it receives.
#[derive(Debug, Default)]
pub struct CollectingSink {
    events: Mutex<Vec<SinkEvent>>,
}

impl CollectingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Takes the events received so far.
    pub fn take(&self) -> Vec<SinkEvent> {
        std::mem::take(&mut *self.events.lock())
    }

    pub fn len(&self) -> usize {
        self.events.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.lock().is_empty()
    }
}

impl FrameSink for CollectingSink {
    fn frame_encoded(&self, sequence: u64, data: &[u8]) {
        self.events.lock().push(SinkEvent::Encoded {
            sequence,
            data: data.to_vec(),
        });
    }

    fn frame_dropped(&self, sequence: u64, error: &CodecError) {
        self.events.lock().push(SinkEvent::Dropped {
            sequence,
            error: error.clone(),
        });
    }
}
