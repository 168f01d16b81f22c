// SPDX-License-Identifier: GPL-3.0-only
pub mod audio;
pub mod camera;
pub mod cli;
pub mod config;
pub mod error;
pub mod location;
pub mod permission;
pub mod render;
pub mod route;
pub mod session;
pub mod voice;

// Re-export the main run function
pub use app_main::run;
pub use error::NavError;
pub use session::{Collaborators, NavigationSession, SessionHandle, SessionSettings};

mod app_main;

#[cfg(test)]
mod test_support;
