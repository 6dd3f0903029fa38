//! State shape and transitions.

use std::collections::{BTreeMap, BTreeSet};

use crate::api::types::Room;
use crate::blockchain::types::{Address, ObjectId};
use crate::session::LoginMethod;

/// Who is signed in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub method: LoginMethod,
    pub address: Address,
    pub email: Option<String>,
}

/// Everything the UI renders from.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AppState {
    pub identity: Option<Identity>,
    pub rooms: BTreeMap<ObjectId, Room>,
    /// Room id → the user's position in it.
    pub positions: BTreeMap<ObjectId, ObjectId>,
    /// Displayed live yield per room.
    pub live_yield: BTreeMap<ObjectId, f64>,
    /// Rooms with a transaction being submitted.
    pub pending: BTreeSet<ObjectId>,
    /// Last error message, shown once.
    pub error: Option<String>,
    /// Last partial-success warning, shown once.
    pub notice: Option<String>,
}

/// A state transition.
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    SignedIn(Identity),
    SignedOut,
    RoomsLoaded(Vec<Room>),
    RoomUpdated(Room),
    PositionKnown { room_id: ObjectId, position_id: ObjectId },
    LiveYieldUpdated { room_id: ObjectId, displayed: f64 },
    ActionStarted(ObjectId),
    ActionSucceeded { room_id: ObjectId, warning: Option<String> },
    ActionFailed {
        room_id: ObjectId,
        message: String,
        /// The failure invalidated the session.
        clears_session: bool,
    },
    DismissMessages,
}

/// Apply `action` to `state`, returning the next state.
pub fn reduce(state: &AppState, action: Action) -> AppState {
    let mut next = state.clone();
    match action {
        Action::SignedIn(identity) => {
            if next.identity.as_ref().map(|i| i.address) != Some(identity.address) {
                next.positions.clear();
            }
            next.identity = Some(identity);
            next.error = None;
        }
        Action::SignedOut => {
            next.identity = None;
            next.positions.clear();
            next.pending.clear();
        }
        Action::RoomsLoaded(rooms) => {
            next.rooms = rooms.into_iter().map(|r| (r.id, r)).collect();
            next.live_yield.retain(|id, _| next.rooms.contains_key(id));
        }
        Action::RoomUpdated(room) => {
            next.rooms.insert(room.id, room);
        }
        Action::PositionKnown { room_id, position_id } => {
            next.positions.insert(room_id, position_id);
        }
        Action::LiveYieldUpdated { room_id, displayed } => {
            let entry = next.live_yield.entry(room_id).or_insert(displayed);
            if displayed > *entry {
                *entry = displayed;
            }
        }
        Action::ActionStarted(room_id) => {
            next.pending.insert(room_id);
            next.error = None;
            next.notice = None;
        }
        Action::ActionSucceeded { room_id, warning } => {
            next.pending.remove(&room_id);
            next.notice = warning;
        }
        Action::ActionFailed {
            room_id,
            message,
            clears_session,
        } => {
            next.pending.remove(&room_id);
            next.error = Some(message);
            if clears_session {
                next.identity = None;
                next.positions.clear();
            }
        }
        Action::DismissMessages => {
            next.error = None;
            next.notice = None;
        }
    }
    next
}
