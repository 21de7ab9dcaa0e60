// Structural failures that abort a rebuild.
//
// Data-quality problems (unparseable text, short rounds, reconciliation drift)
// never surface here; they are flagged on the outputs instead.

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum EngineError {
    #[error("duplicate pick_id `{pick_id}` after assembly")]
    DuplicateIdentity { pick_id: String },

    #[error("overall numbering broken in season {season}: {detail}")]
    NumberingViolation { season: i32, detail: String },

    #[error("season {season} round {round} has {found} base picks, expected {expected}")]
    BaseSlateViolation {
        season: i32,
        round: u32,
        found: usize,
        expected: u32,
    },

    #[error("lifecycle event references unknown pick `{pick_id}`")]
    UnknownLifecyclePick { pick_id: String },
}
