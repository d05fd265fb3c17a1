//! Runs a [`PlaybackCommand`] against a ready widget.
//!
//! Shared by direct actions and the pending-action drain so both paths
//! resolve queue navigation the same way.

use crate::error::{PlaybackError, Result};
use crate::store::PlaybackStore;
use crate::types::{ActionOutcome, PlaybackCommand};
use bridge_traits::{BridgeError, PlaybackWidget};
use core_runtime::config::NavigationPolicy;
use tracing::debug;

pub(crate) async fn execute(
    store: &PlaybackStore,
    widget: &dyn PlaybackWidget,
    command: PlaybackCommand,
) -> Result<ActionOutcome> {
    match command {
        PlaybackCommand::Play => {
            widget.play().await.map_err(widget_error)?;
            store.mark_started();
        }
        PlaybackCommand::Pause => {
            widget.pause().await.map_err(widget_error)?;
        }
        PlaybackCommand::Toggle => {
            let was_playing = store.snapshot().is_playing;
            widget.toggle().await.map_err(widget_error)?;
            if !was_playing {
                store.mark_started();
            }
        }
        PlaybackCommand::Next | PlaybackCommand::Previous => {
            let snapshot = store.snapshot();
            let forward = command == PlaybackCommand::Next;
            let Some(target) = neighbour_index(
                snapshot.current_index,
                snapshot.queue.len(),
                forward,
                store.navigation(),
            ) else {
                debug!(action = command.name(), "No track in that direction");
                return Ok(ActionOutcome::Ignored);
            };
            return jump_to(store, widget, target).await;
        }
        PlaybackCommand::Select { index } => {
            if index >= store.snapshot().queue.len() {
                debug!(index, "Selected index outside the queue");
                return Ok(ActionOutcome::Ignored);
            }
            return jump_to(store, widget, index).await;
        }
        PlaybackCommand::Seek { position_ms } => {
            widget.seek_to(position_ms).await.map_err(widget_error)?;
            store.reset_progress();
            store.set_progress(position_ms, None);
        }
    }
    Ok(ActionOutcome::Executed)
}

/// Skips the widget to `index` and updates the store right away instead of
/// waiting for the widget's next `play` event.
async fn jump_to(
    store: &PlaybackStore,
    widget: &dyn PlaybackWidget,
    index: usize,
) -> Result<ActionOutcome> {
    widget.skip(index).await.map_err(widget_error)?;

    let track = store.snapshot().queue.get(index).cloned();
    store.reset_progress();
    store.set_track(track);
    store.align_current_index(index);
    store.mark_started();
    Ok(ActionOutcome::Executed)
}

/// Target index for next/previous, or `None` when there is nowhere to go.
pub(crate) fn neighbour_index(
    current: Option<usize>,
    len: usize,
    forward: bool,
    policy: NavigationPolicy,
) -> Option<usize> {
    if len == 0 {
        return None;
    }
    let Some(current) = current else {
        return Some(0);
    };

    if forward {
        if current + 1 < len {
            Some(current + 1)
        } else {
            match policy {
                NavigationPolicy::Wrap => Some(0),
                NavigationPolicy::Clamp => None,
            }
        }
    } else if current > 0 {
        Some(current - 1)
    } else {
        match policy {
            NavigationPolicy::Wrap => Some(len - 1),
            NavigationPolicy::Clamp => None,
        }
    }
}

pub(crate) fn widget_error(error: BridgeError) -> PlaybackError {
    match error {
        BridgeError::ScriptUnavailable(reason) => PlaybackError::ScriptLoad(reason),
        other => PlaybackError::WidgetRuntime(other.to_string()),
    }
}
