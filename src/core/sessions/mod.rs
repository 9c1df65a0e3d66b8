pub mod conversation_log;
pub mod selection;
pub mod session_registry;

pub use conversation_log::{ConversationEntry, ConversationLog, CONVERSATION_CAPACITY};
pub use selection::{
    DinnerPlan, MeetingPlan, PendingAction, PendingSelection, SelectionError, SelectionKind,
    SelectionOption,
};
pub use session_registry::{SessionBusy, SessionRegistry, SessionState, ANONYMOUS_USER};
