//! Target acquisition and lock state machine.
//!
//! Each cycle the [`LockManager`] looks at the detections reported by the
//! sensor and decides which one (if any) to track. While unlocked it only
//! considers the first detection in the list, and only locks onto it once it
//! has been seen for more than `min_age_to_lock` consecutive frames. Once
//! locked it follows that detection id wherever it appears in the list until
//! the id disappears.
//!
//! ```text
//!                 age > min_age
//!   Unlocked ─────────────────────▶ Locked { id }
//!      ▲                               │
//!      │   id missing / no detections  │ id present
//!      └───────────────────────────────┤
//!                                      ▼
//!                                   (Held)
//! ```
//!
//! When the locked id disappears the same cycle falls through to
//! acquisition against the current list, so a replacement target can be
//! picked up without an idle cycle in between.

use log::{debug, info};

use crate::detection::Detection;

/// Default number of frames a detection must persist before it can be locked.
pub const MINIMUM_BLOCK_AGE_TO_LOCK: u32 = 30;

/// Lock state carried between cycles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TrackState {
    #[default]
    Unlocked,
    Locked {
        id: u32,
    },
}

impl TrackState {
    pub fn is_locked(&self) -> bool {
        matches!(self, TrackState::Locked { .. })
    }

    /// Locked detection id, if any.
    pub fn locked_id(&self) -> Option<u32> {
        match self {
            TrackState::Locked { id } => Some(*id),
            TrackState::Unlocked => None,
        }
    }
}

/// What happened to the lock during one call to [`LockManager::select_target`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockTransition {
    /// The sensor reported nothing; lock cleared.
    NoDetections,
    /// Unlocked, and the first detection is not old enough to lock onto.
    Searching,
    /// Newly locked onto `id` from the unlocked state.
    Acquired { id: u32 },
    /// Still locked onto `id`.
    Held { id: u32 },
    /// Locked id vanished and no replacement could be acquired.
    Lost { id: u32 },
    /// Locked id vanished and a replacement was acquired in the same cycle.
    Reacquired { lost: u32, acquired: u32 },
}

impl LockTransition {
    /// Whether the tracker spent any part of this cycle unlocked.
    ///
    /// Everything except [`LockTransition::Held`] counts, including a
    /// same-cycle reacquisition. Controller history must not carry across
    /// such a transition.
    pub fn passed_through_unlocked(&self) -> bool {
        !matches!(self, LockTransition::Held { .. })
    }

    /// Id of a lock that was dropped this cycle.
    pub fn lost_id(&self) -> Option<u32> {
        match self {
            LockTransition::Lost { id } => Some(*id),
            LockTransition::Reacquired { lost, .. } => Some(*lost),
            _ => None,
        }
    }

    /// Id of a lock that was taken this cycle.
    pub fn acquired_id(&self) -> Option<u32> {
        match self {
            LockTransition::Acquired { id } => Some(*id),
            LockTransition::Reacquired { acquired, .. } => Some(*acquired),
            _ => None,
        }
    }
}

/// Result of one target selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Selection {
    /// Index into the detection slice of the selected target.
    pub index: Option<usize>,
    pub transition: LockTransition,
}

/// Chooses the detection to track each cycle and owns the [`TrackState`].
#[derive(Debug, Clone)]
pub struct LockManager {
    state: TrackState,
    min_age_to_lock: u32,
}

impl LockManager {
    pub fn new(min_age_to_lock: u32) -> Self {
        Self {
            state: TrackState::Unlocked,
            min_age_to_lock,
        }
    }

    pub fn state(&self) -> TrackState {
        self.state
    }

    /// Drop any lock.
    pub fn reset(&mut self) {
        self.state = TrackState::Unlocked;
    }

    /// Pick the detection to track this cycle and update the lock state.
    ///
    /// Never fails; the absence of a trackable target is reported through
    /// `Selection::index == None` and the accompanying transition.
    pub fn select_target(&mut self, detections: &[Detection]) -> Selection {
        let selection = self.select(detections);

        match selection.transition {
            LockTransition::Acquired { id } => {
                info!("Locked onto detection {id} (age {})", detections[0].age);
            }
            LockTransition::Lost { id } => info!("Lost lock on detection {id}"),
            LockTransition::Reacquired { lost, acquired } => {
                info!("Lost lock on detection {lost}, reacquired detection {acquired}");
            }
            LockTransition::NoDetections | LockTransition::Searching => {
                debug!("No lock: {:?}", selection.transition);
            }
            LockTransition::Held { .. } => {}
        }

        selection
    }

    fn select(&mut self, detections: &[Detection]) -> Selection {
        if detections.is_empty() {
            let transition = match self.state {
                TrackState::Locked { id } => LockTransition::Lost { id },
                TrackState::Unlocked => LockTransition::NoDetections,
            };
            self.state = TrackState::Unlocked;
            return Selection {
                index: None,
                transition,
            };
        }

        let lost = match self.state {
            TrackState::Locked { id } => {
                if let Some(index) = detections.iter().position(|d| d.id == id) {
                    return Selection {
                        index: Some(index),
                        transition: LockTransition::Held { id },
                    };
                }
                self.state = TrackState::Unlocked;
                Some(id)
            }
            TrackState::Unlocked => None,
        };

        let candidate = &detections[0];
        if candidate.age > self.min_age_to_lock {
            self.state = TrackState::Locked { id: candidate.id };
            let transition = match lost {
                Some(lost) => LockTransition::Reacquired {
                    lost,
                    acquired: candidate.id,
                },
                None => LockTransition::Acquired { id: candidate.id },
            };
            Selection {
                index: Some(0),
                transition,
            }
        } else {
            let transition = match lost {
                Some(id) => LockTransition::Lost { id },
                None => LockTransition::Searching,
            };
            Selection {
                index: None,
                transition,
            }
        }
    }
}

impl Default for LockManager {
    fn default() -> Self {
        Self::new(MINIMUM_BLOCK_AGE_TO_LOCK)
    }
}
