//! Scores: per-user credit for submitted positions.

use serde::Serialize;

/// Only `Location` is used by this pipeline: a nickname's submitted
/// batch credits the user that submitted it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScoreKey {
    Location,
}

impl ScoreKey {
    pub fn as_i32(self) -> i32 {
        match self {
            ScoreKey::Location => 0,
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ScoreEntry {
    pub key: i32,
    pub userid: i64,
    pub value: i64,
}

impl ScoreEntry {
    pub fn location(userid: i64, value: i64) -> Self {
        Self {
            key: ScoreKey::Location.as_i32(),
            userid,
            value,
        }
    }
}
