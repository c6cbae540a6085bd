//! Background map streaming.
//!
//! `MapLoader::request` starts preparing a map on the I/O pool and parks the
//! task in [`PendingMapLoads`]. [`finish_pending_loads`] polls those tasks once
//! per frame, materializes the finished ones and records every outcome in
//! [`MapLoadResults`].

use bevy::{
    prelude::*,
    tasks::{Task, block_on, futures_lite::future::poll_once},
};
use tilestream_assets::prelude::{AssetReader, TextureProvider};

use crate::cancel::CancellationToken;
use crate::components::map::MapId;
use crate::error::{LoadError, LoadOutcome};
use crate::loader::{MapLoader, PreparedMap, ProgressCallback};
use crate::spawn::MaterializedMap;

/// A load whose preparation is still running.
pub struct PendingLoad {
    pub(crate) map_id: MapId,
    pub(crate) token: CancellationToken,
    pub(crate) progress: Option<ProgressCallback>,
    pub(crate) task: Task<Result<LoadOutcome<PreparedMap>, LoadError>>,
}

/// Loads started with `MapLoader::request` that have not been materialized yet.
#[derive(Resource, Default)]
pub struct PendingMapLoads {
    loads: Vec<PendingLoad>,
}

impl PendingMapLoads {
    pub(crate) fn push(&mut self, load: PendingLoad) {
        self.loads.push(load);
    }

    pub fn len(&self) -> usize {
        self.loads.len()
    }

    pub fn is_empty(&self) -> bool {
        self.loads.is_empty()
    }

    pub fn contains(&self, map_id: &MapId) -> bool {
        self.loads.iter().any(|load| load.map_id == *map_id)
    }

    /// Cancel every pending load of `map_id`. Returns whether one was found.
    pub fn cancel(&self, map_id: &MapId) -> bool {
        let mut found = false;
        for load in self.loads.iter().filter(|load| load.map_id == *map_id) {
            load.token.cancel();
            found = true;
        }
        found
    }

    pub fn cancel_all(&self) {
        for load in &self.loads {
            load.token.cancel();
        }
    }
}

/// Outcome of one streamed load.
#[derive(Debug)]
pub struct MapLoadResult {
    pub map_id: MapId,
    pub outcome: Result<LoadOutcome<MaterializedMap>, LoadError>,
}

/// Outcomes of finished streamed loads, oldest first.
#[derive(Resource, Default, Debug)]
pub struct MapLoadResults {
    results: Vec<MapLoadResult>,
}

impl MapLoadResults {
    /// Take every recorded outcome.
    pub fn drain(&mut self) -> impl Iterator<Item = MapLoadResult> + '_ {
        self.results.drain(..)
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }
}

/// Exclusive system that materializes finished background loads.
pub fn finish_pending_loads<R: AssetReader, T: TextureProvider>(world: &mut World) {
    let Some(loader) = world.get_resource::<MapLoader<R, T>>().cloned() else {
        return;
    };
    let finished = {
        let Some(mut pending) = world.get_resource_mut::<PendingMapLoads>() else {
            return;
        };
        let mut finished = Vec::new();
        let mut running = Vec::with_capacity(pending.loads.len());
        for mut load in std::mem::take(&mut pending.loads) {
            match block_on(poll_once(&mut load.task)) {
                Some(result) => finished.push((load, result)),
                None => running.push(load),
            }
        }
        pending.loads = running;
        finished
    };
    if finished.is_empty() {
        return;
    }

    let mut results = Vec::with_capacity(finished.len());
    for (load, result) in finished {
        let outcome = match result {
            Ok(LoadOutcome::Loaded(prepared)) => Ok(loader.materialize(
                world,
                prepared,
                &load.token,
                load.progress.as_ref(),
            )),
            Ok(LoadOutcome::Cancelled) => {
                debug!("Streamed load of {} was cancelled", load.map_id);
                Ok(LoadOutcome::Cancelled)
            }
            Err(err) => {
                warn!("Failed to load map {}: {}", load.map_id, err);
                Err(err)
            }
        };
        results.push(MapLoadResult {
            map_id: load.map_id,
            outcome,
        });
    }
    world
        .get_resource_or_init::<MapLoadResults>()
        .results
        .extend(results);
}
