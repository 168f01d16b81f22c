// SPDX-License-Identifier: GPL-3.0-only
pub mod events;
pub mod geo;
pub mod progress;
pub mod route;
