// SPDX-License-Identifier: GPL-3.0-only

pub mod decode;
pub mod output;
pub mod player;

pub use player::AudioPlayer;
