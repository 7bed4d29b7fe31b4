mod config;
mod logging;
mod screen;
mod script;

use std::{
    error::Error,
    thread,
    time::{Duration, Instant},
};

use config::SmokeConfig;
use listsync_core::RowFactory;
use listsync_runtime::{CommitStage, ListPipeline, PipelineStatus, VecListView, WatchSource};
use screen::{CallRow, build_snapshot, row_factory};
use script::CallScript;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

const DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

fn main() -> Result<(), Box<dyn Error>> {
    logging::init();

    let config = SmokeConfig::from_env().inspect_err(|err| error!(error = %err, "invalid config"))?;
    info!(
        calls = config.calls,
        updates = config.updates,
        interval_ms = config.interval_ms,
        first_batch_rows = config.first_batch_rows,
        animate = config.animate,
        "smoke config loaded"
    );

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .thread_name("listsync-smoke")
        .build()?;

    let mut script = CallScript::new();
    let (state_tx, state_rx) = watch::channel(script.state().clone());

    let (pipeline, receiver) = ListPipeline::spawn(
        config.pipeline_config(),
        WatchSource::new(state_rx),
        build_snapshot,
        row_factory(),
        runtime.handle(),
    );

    let ui = thread::Builder::new()
        .name("listsync-ui".to_owned())
        .spawn(move || {
            let mut stage = CommitStage::new(VecListView::<CallRow>::new());
            stage.add_listener(|summary| {
                debug!(
                    id = %summary.id,
                    removed = summary.removed,
                    inserted = summary.inserted,
                    updated = summary.updated,
                    animated = summary.animated,
                    "ui applied transition"
                );
            });
            stage.run_blocking(&receiver).map(|()| stage.into_view())
        })?;

    let final_state = runtime.block_on(async {
        tokio::time::sleep(config.interval()).await;
        state_tx.send_replace(script.populate(config.calls));
        for _ in 0..config.updates {
            tokio::time::sleep(config.interval()).await;
            state_tx.send_replace(script.advance());
        }
        let final_state = script.state().clone();
        drop(state_tx);

        let mut status = pipeline.status_receiver();
        if let Err(err) = status
            .wait_for(|status| !matches!(status, PipelineStatus::Starting | PipelineStatus::Running { .. }))
            .await
        {
            warn!(error = %err, "pipeline status channel closed early");
        }

        let started = Instant::now();
        while pipeline.has_pending() && started.elapsed() < DRAIN_TIMEOUT {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        final_state
    });

    let stats = pipeline.slot_stats();
    info!(
        status = ?pipeline.status(),
        delivered = stats.delivered,
        superseded = stats.superseded,
        "pipeline drained"
    );
    pipeline.shutdown();

    let view = ui
        .join()
        .map_err(|_| "ui thread panicked")?
        .inspect_err(|err| error!(error = %err, "commit stage refused a transition"))?;
    drop(pipeline);
    drop(runtime);

    let rows = row_factory();
    let expected: Vec<CallRow> = build_snapshot(&final_state)
        .iter()
        .map(|entry| rows.make_row(entry))
        .collect();
    if view.rows() != expected.as_slice() {
        error!(
            shown = view.rows().len(),
            expected = expected.len(),
            "list view diverged from the final domain state"
        );
        return Err("list view diverged from the final domain state".into());
    }

    info!(
        rows = view.rows().len(),
        batches = view.update_batches(),
        "list view matches final domain state"
    );
    println!("{}", serde_json::to_string_pretty(view.rows())?);
    Ok(())
}
