//! Input dispatcher: routes input edges to prioritized, action-tagged
//! handler lists.
//!
//! The pin-level debounce/polarity/edge-kind logic lives in
//! `driver-digital-input`; this module owns what happens once an edge is
//! logical: priority-ordered dispatch with first-handled-wins semantics.

use heapless::Vec;

pub const MAX_HANDLERS_PER_TAG: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActionTag {
    None,
    Stop,
    FastStop,
    Halt,
    CycleStart,
    Alarm,
    Shutdown,
    Panic,
    Reset,
    Limit,
    Interlock,
    Internal,
}

pub const ACTION_TAG_COUNT: usize = 12;

fn tag_index(tag: ActionTag) -> usize {
    match tag {
        ActionTag::None => 0,
        ActionTag::Stop => 1,
        ActionTag::FastStop => 2,
        ActionTag::Halt => 3,
        ActionTag::CycleStart => 4,
        ActionTag::Alarm => 5,
        ActionTag::Shutdown => 6,
        ActionTag::Panic => 7,
        ActionTag::Reset => 8,
        ActionTag::Limit => 9,
        ActionTag::Interlock => 10,
        ActionTag::Internal => 11,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EdgeKind {
    /// Transition to active (logical, after polarity conversion).
    Leading,
    /// Transition to inactive.
    Trailing,
}

/// A registered handler: stateless function pointer plus a priority used to
/// order invocation (lower value runs first). Handlers that mutate shared
/// state close over it through the `context` token, which the caller
/// resolves (an index into a fixed table of owned handler objects) rather
/// than through a trait object, keeping dispatch allocation-free.
#[derive(Clone, Copy)]
pub struct Handler {
    pub priority: u8,
    pub context: u16,
    pub callback: fn(context: u16, external_number: u8, edge: EdgeKind) -> bool,
}

/// Priority-ordered list of handlers for one action tag. Insertion is O(N)
/// and preserves lower-priority-first-after-same-priority ordering;
/// deregistration is O(N).
#[derive(Default)]
pub struct HandlerList {
    handlers: Vec<Handler, MAX_HANDLERS_PER_TAG>,
}

impl HandlerList {
    pub fn new() -> Self {
        Self { handlers: Vec::new() }
    }

    /// Inserts `handler` keeping the list sorted by non-decreasing priority;
    /// among equal priorities, the new handler is placed after existing ones.
    pub fn register(&mut self, handler: Handler) -> Result<(), Handler> {
        let mut insert_at = self.handlers.len();
        for (i, existing) in self.handlers.iter().enumerate() {
            if handler.priority < existing.priority {
                insert_at = i;
                break;
            }
        }
        self.handlers.insert(insert_at, handler).map_err(|_| handler)
    }

    /// Removes the first handler matching `context`; returns whether one was found.
    pub fn deregister(&mut self, context: u16) -> bool {
        if let Some(pos) = self.handlers.iter().position(|h| h.context == context) {
            self.handlers.remove(pos);
            true
        } else {
            false
        }
    }

    /// Invokes handlers in priority order; stops at the first one that
    /// returns `true` ("handled"). Returns whether any handler handled it.
    pub fn dispatch(&self, external_number: u8, edge: EdgeKind) -> bool {
        for handler in self.handlers.iter() {
            if (handler.callback)(handler.context, external_number, edge) {
                return true;
            }
        }
        false
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

/// Owns one `HandlerList` per action tag and dispatches an edge first to the
/// `internal` list (homing/probing), then to the list matching the pin's
/// bound action. Always signals that a status report is due, regardless of
/// whether a handler consumed the edge.
pub struct InputDispatcher {
    lists: [HandlerList; ACTION_TAG_COUNT],
    pub status_report_due: bool,
}

impl Default for InputDispatcher {
    fn default() -> Self {
        Self {
            lists: Default::default(),
            status_report_due: false,
        }
    }
}

impl InputDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, tag: ActionTag, handler: Handler) -> Result<(), Handler> {
        self.lists[tag_index(tag)].register(handler)
    }

    pub fn deregister(&mut self, tag: ActionTag, context: u16) -> bool {
        self.lists[tag_index(tag)].deregister(context)
    }

    /// Dispatches one electrical edge that has already passed lockout and
    /// polarity conversion, for a pin bound to `action`.
    pub fn dispatch_edge(&mut self, action: ActionTag, external_number: u8, edge: EdgeKind) {
        let _ = self.lists[tag_index(ActionTag::Internal)].dispatch(external_number, edge)
            || self.lists[tag_index(action)].dispatch(external_number, edge);
        self.status_report_due = true;
    }
}
