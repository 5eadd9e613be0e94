//! Drive a script through a live runtime and collect what comes out

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tracing::{debug, info, warn};

use meshchat_core::{AppEvent, Command, Effect, MeshSnapshot};
use meshchat_runtime::{AppEventReceiver, EffectReceiver, RuntimeBuilder};

use crate::config::CliAppConfig;
use crate::error::{CliError, Result};
use crate::script::ScriptStep;

/// Everything a replay produced, in arrival order
#[derive(Debug, Clone, Serialize)]
pub struct ReplayReport {
    pub steps_processed: u64,
    pub effects: Vec<Effect>,
    pub app_events: Vec<AppEvent>,
    pub snapshot: Arc<MeshSnapshot>,
}

/// Replay `steps` one at a time, waiting for the router after each so that
/// events and commands are applied in script order
pub async fn replay(config: &CliAppConfig, steps: Vec<ScriptStep>) -> Result<ReplayReport> {
    let peer_id = config.peer_id()?;
    let step_timeout = Duration::from_millis(config.cli.step_timeout_ms);

    let mut runtime = RuntimeBuilder::new(peer_id)
        .with_config(config.core.clone())
        .build_and_start()
        .await?;
    let mut effect_receiver = runtime.subscribe_effects();
    let mut app_event_receiver = runtime
        .take_app_event_receiver()
        .ok_or_else(|| CliError::Config("app event receiver already taken".to_string()))?;

    info!(%peer_id, steps = steps.len(), "Replaying script");

    let mut report = ReplayReport {
        steps_processed: 0,
        effects: Vec::new(),
        app_events: Vec::new(),
        snapshot: runtime.snapshot(),
    };

    for step in steps {
        match step {
            ScriptStep::Command(Command::Shutdown) => {
                info!("Script requested shutdown");
                break;
            }
            ScriptStep::Command(command) => {
                debug!(?command, "command step");
                runtime.send_command(command).await?;
            }
            ScriptStep::Event(event) => {
                debug!(kind = ?event.kind(), "event step");
                runtime.send_event(event).await?;
            }
        }

        report.steps_processed += 1;
        report.snapshot = runtime
            .wait_for_processed(report.steps_processed, step_timeout)
            .await?;
        drain(&mut effect_receiver, &mut app_event_receiver, &mut report);
    }

    runtime.shutdown().await?;
    drain(&mut effect_receiver, &mut app_event_receiver, &mut report);

    info!(
        steps = report.steps_processed,
        effects = report.effects.len(),
        app_events = report.app_events.len(),
        "Replay complete"
    );
    Ok(report)
}

fn drain(
    effect_receiver: &mut EffectReceiver,
    app_event_receiver: &mut AppEventReceiver,
    report: &mut ReplayReport,
) {
    use tokio::sync::broadcast::error::TryRecvError;

    loop {
        match effect_receiver.try_recv() {
            Ok(effect) => report.effects.push(effect),
            Err(TryRecvError::Lagged(skipped)) => {
                warn!(skipped, "Effect stream lagged");
            }
            Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => break,
        }
    }

    while let Ok(app_event) = app_event_receiver.try_recv() {
        report.app_events.push(app_event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::script::parse_script;

    fn config() -> CliAppConfig {
        let mut config = CliAppConfig::default();
        config.core = meshchat_core::MeshConfig::testing();
        config.identity.peer_id = Some("eeeeeeeeeeeeeeee".to_string());
        config
    }

    #[tokio::test]
    async fn test_replay_applies_steps_in_order() {
        let steps = parse_script(
            r##"
            {"command": {"join_channel": {"channel": "#general", "key": null}}}
            {"event": {"peer_list_updated": {"peers": ["0101010101010101", "0202020202020202"]}}}
            {"event": {"peer_list_updated": {"peers": ["0101010101010101", "0202020202020202"]}}}
            {"command": "shutdown"}
            {"event": {"peer_list_updated": {"peers": []}}}
            "##,
        )
        .unwrap();

        let report = replay(&config(), steps).await.unwrap();

        assert_eq!(report.steps_processed, 3);
        assert_eq!(report.snapshot.connected.len(), 2);
        assert!(report.snapshot.channels.contains_key(&meshchat_core::ChannelName::new("general")));
        assert!(report
            .app_events
            .iter()
            .any(|event| matches!(event, AppEvent::PeersChanged { .. })));
    }
}
