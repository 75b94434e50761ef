// marksync state managers
// Managers own per-session state: the visible list, delete confirmation, and the session task itself.

pub mod bookmark_list;
pub mod bookmark_session;
pub mod delete_confirmation;
