//! Live tag-board agent.
//!
//! Serves signal rows declaring the `board` source by reading the
//! current value straight off the live [`TagBoard`]. The timepoint is
//! irrelevant here: board values are whatever external clients last
//! wrote. A tag missing from the board keeps its previous value.

use std::sync::Arc;

use chrono::NaiveDateTime;
use log::warn;

use crate::publish::TagBoard;
use crate::tables::{SignalRow, SignalValue};

use super::RetrievalAgent;

/// Source kind served by this agent.
pub const SOURCE_KIND: &str = "board";

pub struct TagBoardAgent {
    board: Arc<TagBoard>,
}

impl TagBoardAgent {
    pub fn new(board: Arc<TagBoard>) -> Self {
        Self { board }
    }
}

impl RetrievalAgent for TagBoardAgent {
    fn kind(&self) -> &str {
        SOURCE_KIND
    }

    fn refresh(&mut self, signals: &mut [SignalRow], timepoint: NaiveDateTime) {
        for row in signals.iter_mut().filter(|r| r.source == SOURCE_KIND) {
            match self.board.read(&row.tag) {
                Some(v) => row.value = SignalValue::Number(v),
                None => warn!(
                    "tag \"{}\" not present on the live board at {timepoint}; keeping last value",
                    row.tag
                ),
            }
        }
    }
}
