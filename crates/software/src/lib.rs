//! This crate contains architecture-agnostic logic for a MIDI-synchronized pattern generator: a step sequencer which
//! walks a stored "motion" through an 8×8 "pattern" grid, maps each visited cell through a musical scale, and expresses
//! the result as two analog output channels (either [CV/gate](https://en.wikipedia.org/wiki/CV/gate) or X/Y levels) and
//! as [MIDI](https://midi.org/midi-1-0) messages.
//!
//! The three engines are layered leaves-first:
//! - [`protocol`]: the byte-oriented MIDI receive parser and transmit queue; it knows nothing of music.
//! - [`clock`]: arbitrates between the internal timer, an external pulse input, and inbound MIDI clock, and owns the
//!   song transport.
//! - [`sequencer`]: the pattern/motion playback engine which owns all musical state.
//!
//! [`Engine`](engine::Engine) ties them together with the [storage](storage) and [panel](panel) collaborators. Nothing
//! in this crate touches hardware; the firmware crate binds the collaborator traits to peripherals.

#![deny(missing_docs)]
#![cfg_attr(not(test), no_std)]

#[macro_use]
mod fmt;

pub mod clock;
pub mod configuration;
pub mod engine;
pub mod panel;
pub mod protocol;
pub mod sequencer;
pub mod storage;
pub mod sysex;

#[cfg(test)]
mod mock;
