//! Hook dispatch: hook → domain events → lifecycle transitions.
//!
//! Relation hooks first update the stored relation snapshot, then the
//! relation contracts turn them into domain events. Each event is routed to
//! one transition and the unit state is threaded through in order.
//!
//! Imports only from `crate::domain` and `crate::application::ports`.

use chrono::Utc;
use parca_relations::{Relation, S3Event, S3Requirer, StoreEndpointRequirer, StoreEvent};
use tracing::{debug, info, warn};

use crate::application::ports::Host;
use crate::application::services::lifecycle;
use crate::domain::{
    ContractViolation, Endpoint, Event, Hook, Inputs, OperatorConfig, RelationHookKind, UnitState,
};

/// Handle one hook invocation end to end and publish the resulting status.
///
/// # Errors
///
/// Returns a [`ContractViolation`] if a relation hook arrives without a
/// relation snapshot, or if a transition rejects the settings.
pub async fn handle_hook(
    host: &impl Host,
    settings: &OperatorConfig,
    state: UnitState,
    hook: Hook,
    relation: Option<Relation>,
) -> Result<UnitState, ContractViolation> {
    let mut state = state;
    let events = translate(hook, relation, &mut state.inputs)?;
    info!(%hook, events = events.len(), phase = %state.phase, "handling hook");

    for event in events {
        state = dispatch(host, settings, state, event).await?;
    }
    state.last_event_at = Some(Utc::now());

    if let Err(e) = host.set_status(&state.status).await {
        warn!(status = %state.status, error = %format!("{e:#}"), "cannot publish status");
    }
    Ok(state)
}

/// Merge a relation snapshot into `inputs` and derive the domain events.
///
/// # Errors
///
/// Returns [`ContractViolation::MissingRelation`] for a relation hook
/// without a snapshot.
pub fn translate(
    hook: Hook,
    relation: Option<Relation>,
    inputs: &mut Inputs,
) -> Result<Vec<Event>, ContractViolation> {
    let (endpoint, kind) = match hook {
        Hook::Install => return Ok(vec![Event::Install]),
        Hook::Start => return Ok(vec![Event::Start]),
        Hook::Stop => return Ok(vec![Event::Stop]),
        Hook::Remove => return Ok(vec![Event::Remove]),
        Hook::ConfigChanged => return Ok(vec![Event::ConfigChanged]),
        Hook::UpgradeCharm => {
            return Ok(vec![
                Event::Upgrade,
                Event::PublishProviderData { relation_id: None },
            ]);
        }
        Hook::UpdateStatus => return Ok(vec![Event::UpdateStatus]),
        Hook::Relation { endpoint, kind } => (endpoint, kind),
    };

    let relation = relation.ok_or_else(|| ContractViolation::MissingRelation(hook.to_string()))?;
    let relation_id = relation.id;
    if kind == RelationHookKind::Broken {
        inputs.remove_relation(relation_id);
    } else {
        inputs.upsert_relation(relation.clone());
    }

    let events = match (endpoint, kind) {
        (Endpoint::ExternalStore, RelationHookKind::Changed) => {
            vec![store_event(
                StoreEndpointRequirer::new(endpoint.name()).on_relation_changed(&relation),
            )]
        }
        (Endpoint::ExternalStore, RelationHookKind::Departed | RelationHookKind::Broken) => {
            vec![store_event(
                StoreEndpointRequirer::new(endpoint.name()).on_relation_departed(&relation),
            )]
        }
        (
            Endpoint::StoreProvider
            | Endpoint::SelfProfiling
            | Endpoint::Metrics
            | Endpoint::GrafanaDashboard,
            RelationHookKind::Joined | RelationHookKind::Changed,
        ) => vec![Event::PublishProviderData {
            relation_id: Some(relation_id),
        }],
        (Endpoint::Profiling, RelationHookKind::Joined) => Vec::new(),
        (Endpoint::Profiling, _) => vec![Event::ProfilingTargetsChanged],
        (Endpoint::S3, RelationHookKind::Changed) => {
            vec![s3_event(S3Requirer::default().on_relation_changed(&relation))]
        }
        (Endpoint::S3, RelationHookKind::Broken) => {
            vec![s3_event(S3Requirer::default().on_relation_broken())]
        }
        _ => Vec::new(),
    };
    if events.is_empty() {
        debug!(%hook, relation_id, "relation snapshot recorded, nothing to do");
    }
    Ok(events)
}

fn store_event(event: StoreEvent) -> Event {
    match event {
        StoreEvent::EndpointsChanged {
            relation_id,
            store_config,
        } => Event::StoreEndpointsChanged {
            relation_id,
            store_config,
        },
        StoreEvent::RemoveStore { relation_id } => Event::RemoveStore { relation_id },
    }
}

fn s3_event(event: S3Event) -> Event {
    match event {
        S3Event::CredentialsChanged(creds) => Event::S3CredentialsChanged(creds),
        S3Event::CredentialsGone => Event::S3CredentialsGone,
    }
}

/// Route one domain event to its transition.
///
/// # Errors
///
/// Propagates contract violations raised by the transition.
pub async fn dispatch(
    host: &impl Host,
    settings: &OperatorConfig,
    state: UnitState,
    event: Event,
) -> Result<UnitState, ContractViolation> {
    debug!(event = event.name(), phase = %state.phase, "dispatching event");
    let mut state = state;
    match event {
        Event::Install => lifecycle::install(host, settings, state).await,
        Event::Start => lifecycle::start(host, settings, state).await,
        Event::Stop => lifecycle::stop(host, settings, state).await,
        Event::Remove => lifecycle::remove(host, settings, state).await,
        Event::Upgrade => lifecycle::upgrade(host, settings, state).await,
        Event::UpdateStatus => lifecycle::update_status(host, settings, state).await,
        Event::ConfigChanged | Event::ProfilingTargetsChanged => {
            lifecycle::configure(host, settings, state).await
        }
        Event::StoreEndpointsChanged { store_config, .. } => {
            state.inputs.store = Some(store_config);
            lifecycle::configure(host, settings, state).await
        }
        Event::RemoveStore { .. } => {
            state.inputs.store = None;
            lifecycle::configure(host, settings, state).await
        }
        Event::S3CredentialsChanged(creds) => {
            state.inputs.s3 = Some(creds);
            lifecycle::configure(host, settings, state).await
        }
        Event::S3CredentialsGone => {
            state.inputs.s3 = None;
            lifecycle::configure(host, settings, state).await
        }
        Event::PublishProviderData { relation_id } => {
            lifecycle::publish_provider_data(host, settings, state, relation_id).await
        }
    }
}
