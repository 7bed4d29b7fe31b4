//! Recent-calls screen: domain state, entries, and tagged row variants.

use std::{cmp::Reverse, sync::Arc};

use listsync_core::{Entry, EqRows, Snapshot, Styled};
use serde::{Deserialize, Serialize};

/// How a call ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CallOutcome {
    Answered,
    Missed,
    Busy,
    Declined,
}

/// One call as recorded by the domain layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallRecord {
    pub id: u64,
    pub peer: String,
    /// Seconds since the start of the log.
    pub timestamp: u64,
    pub outgoing: bool,
    pub outcome: CallOutcome,
    pub duration_secs: Option<u32>,
}

impl CallRecord {
    /// Incoming calls nobody picked up.
    pub fn failed(&self) -> bool {
        !self.outgoing && matches!(self.outcome, CallOutcome::Missed | CallOutcome::Busy)
    }
}

/// Immutable colors the rows are rendered with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Appearance {
    pub name: &'static str,
    pub text: &'static str,
    pub missed: &'static str,
}

impl Appearance {
    pub fn day() -> Self {
        Self {
            name: "day",
            text: "#000000",
            missed: "#d93b3b",
        }
    }

    pub fn night() -> Self {
        Self {
            name: "night",
            text: "#ffffff",
            missed: "#ff5c5c",
        }
    }
}

/// Everything the screen is derived from.
#[derive(Debug, Clone, PartialEq)]
pub struct ScreenState {
    pub records: Vec<CallRecord>,
    pub loading: bool,
    pub editing: bool,
    pub appearance: Arc<Appearance>,
}

impl ScreenState {
    pub fn loading(appearance: Arc<Appearance>) -> Self {
        Self {
            records: Vec::new(),
            loading: true,
            editing: false,
            appearance,
        }
    }
}

/// Consecutive calls with the same peer and outcome, shown as one row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallGroup {
    /// Id of the newest call in the group.
    pub head: u64,
    pub peer: String,
    pub timestamp: u64,
    pub outgoing: bool,
    pub count: usize,
    pub duration_secs: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecentCallEntry {
    Calls {
        group: CallGroup,
        editing: bool,
        failed: bool,
    },
    Empty {
        loading: bool,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RecentCallId {
    Calls(u64),
    Empty,
}

impl Entry for RecentCallEntry {
    type Id = RecentCallId;
    type Key = (u8, Reverse<u64>, Reverse<u64>);

    fn stable_id(&self) -> RecentCallId {
        match self {
            Self::Calls { group, .. } => RecentCallId::Calls(group.head),
            Self::Empty { .. } => RecentCallId::Empty,
        }
    }

    fn sort_key(&self) -> Self::Key {
        match self {
            Self::Calls { group, .. } => (0, Reverse(group.timestamp), Reverse(group.head)),
            Self::Empty { .. } => (1, Reverse(0), Reverse(0)),
        }
    }
}

pub type ScreenEntry = Styled<RecentCallEntry, Appearance>;

/// Derive the ordered entry list for one screen state.
///
/// Records are grouped newest first. An empty log yields a single placeholder.
pub fn build_snapshot(state: &ScreenState) -> Snapshot<ScreenEntry> {
    let mut records: Vec<&CallRecord> = state.records.iter().collect();
    records.sort_by_key(|record| (Reverse(record.timestamp), Reverse(record.id)));

    let mut entries = Vec::new();
    let mut current: Option<(CallGroup, bool)> = None;
    for record in records {
        let failed = record.failed();
        if let Some((group, group_failed)) = current.as_mut()
            && group.peer == record.peer
            && *group_failed == failed
        {
            group.count += 1;
            continue;
        }
        if let Some((group, failed)) = current.take() {
            entries.push(RecentCallEntry::Calls {
                group,
                editing: state.editing,
                failed,
            });
        }
        current = Some((
            CallGroup {
                head: record.id,
                peer: record.peer.clone(),
                timestamp: record.timestamp,
                outgoing: record.outgoing,
                count: 1,
                duration_secs: record.duration_secs,
            },
            failed,
        ));
    }
    if let Some((group, failed)) = current {
        entries.push(RecentCallEntry::Calls {
            group,
            editing: state.editing,
            failed,
        });
    }
    if entries.is_empty() {
        entries.push(RecentCallEntry::Empty {
            loading: state.loading,
        });
    }

    Snapshot::from_unordered(Styled::wrap_all(entries, &state.appearance))
}

/// Rendered row, tagged by variant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CallRow {
    Call {
        title: String,
        title_color: String,
        count: Option<String>,
        status: String,
        outgoing_icon: bool,
        deletable: bool,
        date: String,
    },
    Empty {
        text: String,
        loading: bool,
    },
}

pub fn make_row(entry: &ScreenEntry) -> CallRow {
    let appearance = &entry.appearance;
    match &entry.entry {
        RecentCallEntry::Calls {
            group,
            editing,
            failed,
        } => CallRow::Call {
            title: group.peer.clone(),
            title_color: if *failed {
                appearance.missed
            } else {
                appearance.text
            }
            .to_owned(),
            count: (group.count > 1).then(|| format!("({})", group.count)),
            status: status_text(group, *failed),
            outgoing_icon: group.outgoing,
            deletable: *editing,
            date: clock_label(group.timestamp),
        },
        RecentCallEntry::Empty { loading } => CallRow::Empty {
            text: "No recent calls".to_owned(),
            loading: *loading,
        },
    }
}

pub type CallRows = EqRows<fn(&ScreenEntry) -> CallRow>;

pub fn row_factory() -> CallRows {
    EqRows::new(make_row as fn(&ScreenEntry) -> CallRow)
}

fn status_text(group: &CallGroup, failed: bool) -> String {
    if failed {
        return "Missed".to_owned();
    }
    let direction = if group.outgoing { "Outgoing" } else { "Incoming" };
    match group.duration_secs {
        Some(secs) if secs > 0 && group.count == 1 => {
            format!("{direction} ({})", short_duration(secs))
        }
        _ => direction.to_owned(),
    }
}

fn short_duration(secs: u32) -> String {
    let (hours, minutes, seconds) = (secs / 3600, (secs / 60) % 60, secs % 60);
    if hours > 0 {
        format!("{hours}:{minutes:02}:{seconds:02}")
    } else {
        format!("{minutes}:{seconds:02}")
    }
}

fn clock_label(timestamp: u64) -> String {
    format!("{:02}:{:02}", (timestamp / 3600) % 24, (timestamp / 60) % 60)
}
