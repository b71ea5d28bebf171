//! Wires every stage handler onto its topic subscription.

use std::num::NonZeroU32;
use std::sync::Arc;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use bucket_store::BucketStore;
use controller::Controller;
use kv_store::{KeyValueStore, ShardedKv};
use map_phase::{combine::Combiner, map::Mapper, split::Splitter};
use message_bus::{dispatch, topics, BusError, MessageBus, MessageHandler};
use reduce_phase::{reduce::Reducer, shuffle::Shuffler};
use sharder::ReducerSharder;

/// Everything the stage workers are constructed over.
#[derive(Debug, Clone)]
pub struct PipelineDeps {
    /// The bus all stages are triggered by and publish to.
    pub bus: Arc<dyn MessageBus>,
    /// Object storage for input books and output files.
    pub store: Arc<dyn BucketStore>,
    /// Per-shard key/value instances.
    pub shards: ShardedKv,
    /// The controller's set store.
    pub control: Arc<dyn KeyValueStore>,
    /// Reducer shard count; must match `shards`.
    pub reducers: NonZeroU32,
}

/// Subscribe one worker per stage topic and run each behind its own
/// dispatch loop until `shutdown` fires.
///
/// Exactly one consumer is attached to the controller topic: control
/// events for the in-flight set must be applied serially for the barrier
/// to be sound. The other stages are stateless and could be replicated by
/// calling this with the same dependencies in more processes.
pub async fn spawn_stages(
    deps: &PipelineDeps,
    shutdown: &CancellationToken,
) -> Result<Vec<JoinHandle<()>>, BusError> {
    let sharder = ReducerSharder::new(deps.reducers);

    let mut handles = Vec::with_capacity(6);
    handles.push(
        spawn_stage(
            &deps.bus,
            topics::SPLITTER,
            Splitter::new(Arc::clone(&deps.store), Arc::clone(&deps.bus)),
            shutdown,
        )
        .await?,
    );
    handles.push(
        spawn_stage(
            &deps.bus,
            topics::MAPPER,
            Mapper::new(Arc::clone(&deps.bus)),
            shutdown,
        )
        .await?,
    );
    handles.push(
        spawn_stage(
            &deps.bus,
            topics::COMBINER,
            Combiner::new(Arc::clone(&deps.bus)),
            shutdown,
        )
        .await?,
    );
    handles.push(
        spawn_stage(
            &deps.bus,
            topics::SHUFFLER,
            Shuffler::new(deps.shards.clone(), sharder, Arc::clone(&deps.bus)),
            shutdown,
        )
        .await?,
    );
    handles.push(
        spawn_stage(
            &deps.bus,
            topics::CONTROLLER,
            Controller::new(
                Arc::clone(&deps.control),
                Arc::clone(&deps.bus),
                deps.reducers,
            ),
            shutdown,
        )
        .await?,
    );
    handles.push(
        spawn_stage(
            &deps.bus,
            topics::REDUCER,
            Reducer::new(deps.shards.clone(), Arc::clone(&deps.store)),
            shutdown,
        )
        .await?,
    );
    Ok(handles)
}

async fn spawn_stage<H>(
    bus: &Arc<dyn MessageBus>,
    topic: &str,
    handler: H,
    shutdown: &CancellationToken,
) -> Result<JoinHandle<()>, BusError>
where
    H: MessageHandler + 'static,
{
    let subscription = bus.subscribe(topic).await?;
    Ok(tokio::spawn(dispatch(
        subscription,
        Arc::new(handler),
        shutdown.clone(),
    )))
}
