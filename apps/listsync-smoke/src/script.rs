//! Deterministic sequence of domain states driving the smoke screen.

use std::sync::Arc;

use crate::screen::{Appearance, CallOutcome, CallRecord, ScreenState};

const PEERS: [&str; 5] = ["alice", "bob", "carol", "dave", "erin"];

/// Produces the next [`ScreenState`] from the previous one.
pub struct CallScript {
    state: ScreenState,
    next_id: u64,
    clock: u64,
    step: usize,
}

impl Default for CallScript {
    fn default() -> Self {
        Self::new()
    }
}

impl CallScript {
    /// Start from the loading placeholder.
    pub fn new() -> Self {
        Self {
            state: ScreenState::loading(Arc::new(Appearance::day())),
            next_id: 1,
            clock: 8 * 3600,
            step: 0,
        }
    }

    pub fn state(&self) -> &ScreenState {
        &self.state
    }

    /// Replace the loading placeholder with `calls` historical records.
    pub fn populate(&mut self, calls: usize) -> ScreenState {
        self.state.loading = false;
        for _ in 0..calls {
            let record = self.record();
            self.state.records.push(record);
        }
        self.state.clone()
    }

    /// Apply one scripted mutation.
    pub fn advance(&mut self) -> ScreenState {
        self.step += 1;
        match self.step % 6 {
            0 => {
                let night = self.state.appearance.name == "day";
                self.state.appearance = Arc::new(if night {
                    Appearance::night()
                } else {
                    Appearance::day()
                });
            }
            1 | 4 => {
                let record = self.record();
                self.state.records.push(record);
            }
            2 => {
                if let Some(oldest) = self
                    .state
                    .records
                    .iter()
                    .enumerate()
                    .min_by_key(|(_, record)| (record.timestamp, record.id))
                    .map(|(index, _)| index)
                {
                    self.state.records.remove(oldest);
                }
            }
            3 => self.state.editing = !self.state.editing,
            _ => {
                if let Some(newest) = self.state.records.iter_mut().max_by_key(|r| r.timestamp) {
                    newest.outcome = match newest.outcome {
                        CallOutcome::Answered => CallOutcome::Missed,
                        _ => CallOutcome::Answered,
                    };
                }
            }
        }
        self.state.clone()
    }

    fn record(&mut self) -> CallRecord {
        let id = self.next_id;
        self.next_id += 1;
        self.clock += 97 + (id % 7) * 53;
        let outcome = match id % 5 {
            0 => CallOutcome::Missed,
            3 => CallOutcome::Busy,
            4 => CallOutcome::Declined,
            _ => CallOutcome::Answered,
        };
        CallRecord {
            id,
            peer: PEERS[(id as usize * 3) % PEERS.len()].to_owned(),
            timestamp: self.clock,
            outgoing: id % 2 == 0,
            outcome,
            duration_secs: matches!(outcome, CallOutcome::Answered).then_some((id as u32 * 37) % 900),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::screen::{RecentCallId, build_snapshot};

    #[test]
    fn starts_with_loading_placeholder() {
        let script = CallScript::new();
        let snapshot = build_snapshot(script.state());
        assert_eq!(snapshot.ids(), vec![RecentCallId::Empty]);
    }

    #[test]
    fn populate_adds_unique_records() {
        let mut script = CallScript::new();
        let state = script.populate(20);
        assert!(!state.loading);
        assert_eq!(state.records.len(), 20);

        let mut ids: Vec<u64> = state.records.iter().map(|r| r.id).collect();
        ids.dedup();
        assert_eq!(ids.len(), 20);
    }

    #[test]
    fn advance_cycles_through_mutations() {
        let mut script = CallScript::new();
        let populated = script.populate(4);

        let added = script.advance();
        assert_eq!(added.records.len(), 5);
        let trimmed = script.advance();
        assert_eq!(trimmed.records.len(), 4);
        let editing = script.advance();
        assert!(editing.editing);
        script.advance();
        script.advance();
        let themed = script.advance();
        assert_eq!(themed.appearance.name, "night");
        assert_eq!(populated.appearance.name, "day");
    }
}
