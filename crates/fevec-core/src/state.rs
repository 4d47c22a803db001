//! Host/device coherence states and their transition table.
//!
//! A vector tracks which memory space holds current data with a
//! [`CoherenceState`]. Every access a backend makes is first run through
//! [`CoherenceState::transition`], which says whether a whole-vector copy is
//! needed and what the state becomes afterwards. The table is pure: it never
//! touches memory, so every (state, access) pair can be tested on its own.
//!
//! ```text
//!                 read host (copy)           read device (copy)
//!  DeviceSynced ───────────────▶ BothSynced ◀─────────────── HostSynced
//!       ▲                           │    │                        ▲
//!       └──────── write device ─────┘    └────── write host ──────┘
//! ```

use std::fmt;

use crate::error::VectorError;
use crate::types::MemType;

/// Which memory space(s) hold current data.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum CoherenceState {
    /// Nothing has been written yet.
    #[default]
    NoAuthority,
    /// Host memory is current; device memory, if any, is stale.
    HostSynced,
    /// Device memory is current; host memory, if any, is stale.
    DeviceSynced,
    /// Both spaces hold identical data.
    BothSynced,
}

/// The kind of access a backend is about to make to one memory space.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Access {
    /// New data is attached to the space, replacing whatever was current.
    Provide,
    /// The space is read; the other space stays valid.
    Read,
    /// The space is written; the other space becomes stale.
    Write,
    /// The space's array is handed out of the vector.
    Take,
}

/// A whole-vector copy between the two spaces.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SyncCopy {
    /// Copy host memory into device memory.
    HostToDevice,
    /// Copy device memory into host memory.
    DeviceToHost,
}

impl SyncCopy {
    /// The copy that brings `target` up to date from the other space.
    pub fn into_space(target: MemType) -> Self {
        match target {
            MemType::Host => Self::DeviceToHost,
            MemType::Device => Self::HostToDevice,
        }
    }

    /// Destination space of the copy.
    pub fn target(self) -> MemType {
        match self {
            Self::HostToDevice => MemType::Device,
            Self::DeviceToHost => MemType::Host,
        }
    }
}

/// Outcome of [`CoherenceState::transition`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Transition {
    /// Copy to perform before the access, if the target space is stale.
    pub copy: Option<SyncCopy>,
    /// State after the access completes.
    pub next: CoherenceState,
}

impl CoherenceState {
    /// The state in which only `mem` is current.
    pub fn synced(mem: MemType) -> Self {
        match mem {
            MemType::Host => Self::HostSynced,
            MemType::Device => Self::DeviceSynced,
        }
    }

    /// Whether `mem` holds current data in this state.
    pub fn is_current(self, mem: MemType) -> bool {
        match self {
            Self::NoAuthority => false,
            Self::HostSynced => mem == MemType::Host,
            Self::DeviceSynced => mem == MemType::Device,
            Self::BothSynced => true,
        }
    }

    /// Whether any space holds data.
    pub fn has_data(self) -> bool {
        self != Self::NoAuthority
    }

    /// Look up the copy and next state for an `access` to `mem`.
    ///
    /// Reads and writes on [`NoAuthority`](Self::NoAuthority) materialize the
    /// requested space without copying. Taking an array that was never
    /// populated fails with [`VectorError::InvalidState`].
    pub fn transition(self, mem: MemType, access: Access) -> Result<Transition, VectorError> {
        let stale = self == Self::synced(mem.other());
        let copy = stale.then(|| SyncCopy::into_space(mem));

        let next = match access {
            Access::Provide => {
                return Ok(Transition {
                    copy: None,
                    next: Self::synced(mem),
                })
            }
            Access::Read => match self {
                Self::NoAuthority => Self::synced(mem),
                _ if stale => Self::BothSynced,
                current => current,
            },
            Access::Write => Self::synced(mem),
            Access::Take => {
                if self == Self::NoAuthority {
                    return Err(VectorError::invalid_state(format!(
                        "cannot take {mem} array: vector has no data"
                    )));
                }
                Self::synced(mem)
            }
        };
        Ok(Transition { copy, next })
    }
}

impl fmt::Display for CoherenceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoAuthority => write!(f, "none"),
            Self::HostSynced => write!(f, "host"),
            Self::DeviceSynced => write!(f, "device"),
            Self::BothSynced => write!(f, "both"),
        }
    }
}
