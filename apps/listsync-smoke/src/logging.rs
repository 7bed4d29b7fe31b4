//! Tracing/logging bootstrap for the smoke screen.

use std::env;

use tracing_subscriber::EnvFilter;

/// Pipeline and commit traffic at debug, everything else at info.
const DEFAULT_FILTER: &str = "info,listsync_runtime=debug,listsync_smoke=debug";

/// Install the fmt subscriber used by the smoke run.
///
/// Thread names are shown so producer output (`listsync-smoke` workers) can be
/// told apart from commit output (`listsync-ui`). `RUST_LOG` wins over
/// `LISTSYNC_LOG`; an unparsable directive falls through to the next source.
pub fn init() {
    let directive = filter_directive(|key| env::var(key).ok());
    let _ = tracing_subscriber::fmt()
        .with_target(true)
        .with_thread_ids(true)
        .with_thread_names(true)
        .with_env_filter(EnvFilter::new(directive))
        .try_init();
}

fn filter_directive<F>(mut lookup: F) -> String
where
    F: FnMut(&str) -> Option<String>,
{
    for key in ["RUST_LOG", "LISTSYNC_LOG"] {
        if let Some(value) = lookup(key)
            .map(|v| v.trim().to_owned())
            .filter(|v| !v.is_empty())
            && EnvFilter::try_new(&value).is_ok()
        {
            return value;
        }
    }
    DEFAULT_FILTER.to_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn directive_from_pairs(pairs: &[(&str, &str)]) -> String {
        let map = pairs
            .iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect::<HashMap<_, _>>();
        filter_directive(|key| map.get(key).cloned())
    }

    #[test]
    fn falls_back_to_default_filter() {
        assert_eq!(directive_from_pairs(&[]), DEFAULT_FILTER);
        assert_eq!(directive_from_pairs(&[("LISTSYNC_LOG", "  ")]), DEFAULT_FILTER);
    }

    #[test]
    fn rust_log_overrides_listsync_log() {
        let directive = directive_from_pairs(&[
            ("RUST_LOG", "warn"),
            ("LISTSYNC_LOG", "listsync_runtime=trace"),
        ]);
        assert_eq!(directive, "warn");
    }

    #[test]
    fn invalid_directive_falls_through() {
        let directive = directive_from_pairs(&[
            ("RUST_LOG", "listsync_runtime=loud"),
            ("LISTSYNC_LOG", "listsync_runtime=trace"),
        ]);
        assert_eq!(directive, "listsync_runtime=trace");
    }
}
