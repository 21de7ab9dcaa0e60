// Pick identity: base slate, compensation awards, forward references, and
// the assembled dimension.

pub mod assembler;
pub mod awards;
pub mod base;
pub mod pick;
pub mod sequencer;
pub mod tbd;
