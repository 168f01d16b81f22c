// SPDX-License-Identifier: GPL-3.0-only
pub mod coordinator;
pub mod events;
pub mod state;

pub use coordinator::{Collaborators, NavigationSession, SessionSettings};
pub use events::{Completion, SessionEvent, SessionHandle};
pub use state::{GuidanceMode, SessionState, UiSnapshot, UiVisibility, derive_ui_visibility};
