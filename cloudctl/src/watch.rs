//! # Watch Mode
//!
//! `--watch` repeats an invocation every [`WATCH_INTERVAL`] until Ctrl-C. The first answer shows
//! the most recent [`INITIAL_ITEMS`] items; every later answer only prints the items that were
//! not seen before. Failed refreshes are logged and skipped.
use crate::render::render;
use cloudctl_core::{FetchError, client::FetchOutcome};
use serde_json::{Value, json};
use std::collections::HashSet;
use std::io::Write;
use std::time::Duration;
use tokio::time::MissedTickBehavior;

pub const WATCH_INTERVAL: Duration = Duration::from_secs(2);
pub const INITIAL_ITEMS: usize = 20;

/// Remembers which items have already been printed.
#[derive(Debug, Default)]
pub struct ItemTracker {
    seen: HashSet<String>,
}

impl ItemTracker {
    /// The value of the first `*_id` string field of `item`, or the item itself as compact JSON.
    pub fn identify(item: &Value) -> String {
        item.as_object()
            .and_then(|fields| {
                fields
                    .iter()
                    .find(|(key, value)| key.ends_with("_id") && value.is_string())
                    .and_then(|(_, value)| value.as_str())
            })
            .map(str::to_string)
            .unwrap_or_else(|| item.to_string())
    }

    /// Records `items` and returns those not seen before, in order.
    pub fn observe(&mut self, items: &[Value]) -> Vec<Value> {
        items
            .iter()
            .filter(|item| self.seen.insert(Self::identify(item)))
            .cloned()
            .collect()
    }
}

/// The items of a result: the `results` list, or the value itself.
fn items_of(result: Value) -> Vec<Value> {
    match result {
        Value::Object(mut fields) => match fields.remove("results") {
            Some(Value::Array(items)) => items,
            Some(other) => {
                fields.insert("results".to_string(), other);
                vec![Value::Object(fields)]
            }
            None => vec![Value::Object(fields)],
        },
        other => vec![other],
    }
}

fn print_items(
    out: &mut impl Write,
    items: Vec<Value>,
    outcome: &FetchOutcome,
) -> anyhow::Result<()> {
    render(
        out,
        &json!({ "results": items }),
        &outcome.options,
        outcome.minimal_columns.as_deref(),
    )?;
    out.flush()?;
    Ok(())
}

/// Runs `fetch` now and then every [`WATCH_INTERVAL`], printing new items to `out`.
///
/// Only the first call can fail the watch.
pub async fn watch<F, Fut>(out: &mut impl Write, mut fetch: F) -> anyhow::Result<()>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<FetchOutcome, FetchError>>,
{
    let mut tracker = ItemTracker::default();

    let mut outcome = fetch().await?;
    let items = items_of(std::mem::take(&mut outcome.result));
    tracker.observe(&items);
    let recent = items[items.len().saturating_sub(INITIAL_ITEMS)..].to_vec();
    print_items(out, recent, &outcome)?;

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    let mut interval = tokio::time::interval(WATCH_INTERVAL);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    interval.tick().await;

    loop {
        tokio::select! {
            _ = &mut ctrl_c => {
                tracing::debug!("watch interrupted");
                return Ok(());
            }
            _ = interval.tick() => {}
        }

        let mut outcome = match fetch().await {
            Ok(outcome) => outcome,
            Err(err) => {
                tracing::debug!(error = %err, "watch refresh failed");
                continue;
            }
        };

        let new_items = tracker.observe(&items_of(std::mem::take(&mut outcome.result)));
        if new_items.is_empty() {
            continue;
        }

        writeln!(
            out,
            "\nFound {} new items at {}",
            new_items.len(),
            chrono::Local::now().format("%H:%M:%S")
        )?;
        print_items(out, new_items, &outcome)?;
    }
}
