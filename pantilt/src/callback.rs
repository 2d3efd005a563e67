//! Tracker event callbacks.

use crate::detection::Detection;

/// Event emitted by the tracker during a cycle.
#[derive(Debug, Clone, PartialEq)]
pub enum TrackerEvent {
    /// A lock was taken on a detection
    LockAcquired { id: u32, detection: Detection },
    /// Commands were sent for the locked detection
    TrackingUpdate {
        id: u32,
        pan_error: i32,
        tilt_error: i32,
        pan_command: i32,
        tilt_command: i32,
    },
    /// The locked detection left the frame
    LockLost { id: u32 },
}

/// Handle returned by [`CallbackRegistry::register`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CallbackId(usize);

type Callback = Box<dyn Fn(&TrackerEvent) + Send + Sync>;

/// Ordered set of event listeners.
#[derive(Default)]
pub struct CallbackRegistry {
    callbacks: Vec<(CallbackId, Callback)>,
    next_id: usize,
}

impl CallbackRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<F>(&mut self, callback: F) -> CallbackId
    where
        F: Fn(&TrackerEvent) + Send + Sync + 'static,
    {
        let id = CallbackId(self.next_id);
        self.next_id += 1;
        self.callbacks.push((id, Box::new(callback)));
        id
    }

    /// Remove a listener. Returns false if the id was not registered.
    pub fn deregister(&mut self, id: CallbackId) -> bool {
        let before = self.callbacks.len();
        self.callbacks.retain(|(cb_id, _)| *cb_id != id);
        self.callbacks.len() != before
    }

    pub fn emit(&self, event: &TrackerEvent) {
        for (_, callback) in &self.callbacks {
            callback(event);
        }
    }

    pub fn len(&self) -> usize {
        self.callbacks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.callbacks.is_empty()
    }
}

impl std::fmt::Debug for CallbackRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CallbackRegistry")
            .field("callbacks", &self.callbacks.len())
            .finish()
    }
}
