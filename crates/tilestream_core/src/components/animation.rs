//! Tile animation component, the per-load animation index and the update system.

use std::sync::Arc;

use bevy::{platform::collections::HashMap, prelude::*};
use tilestream_assets::prelude::{AnimationFrame, Tileset};

/// Component attached to animated tiles.
///
/// Frame tile ids are global ids of the map the tile belongs to. All tiles of
/// the same animated gid share one frame list.
#[derive(Component, Debug, Clone)]
pub struct TileAnimation {
    /// Sequence of animation frames.
    pub frames: Arc<[AnimationFrame]>,
    /// Current frame index (`0..frames.len()`).
    pub current_frame: usize,
    /// Time elapsed in current frame (milliseconds).
    pub elapsed_ms: f32,
}

impl TileAnimation {
    /// Create a new tile animation from frame data.
    pub fn new(frames: Arc<[AnimationFrame]>) -> Self {
        Self {
            frames,
            current_frame: 0,
            elapsed_ms: 0.0,
        }
    }

    /// Get the current frame's tile ID.
    pub fn current_tile_id(&self) -> Option<u32> {
        self.frames.get(self.current_frame).map(|f| f.tile_id)
    }

    /// Frame tile ids in playback order.
    pub fn frame_ids(&self) -> impl Iterator<Item = u32> + '_ {
        self.frames.iter().map(|f| f.tile_id)
    }

    /// Advance playback by `delta_ms`, wrapping around.
    ///
    /// Returns `true` when the displayed frame changed.
    pub fn advance(&mut self, delta_ms: f32) -> bool {
        if self.frames.is_empty() {
            return false;
        }
        let start = self.current_frame;
        self.elapsed_ms += delta_ms;
        loop {
            let duration = self.frames[self.current_frame].duration_ms as f32;
            // Zero-length frames would spin forever
            if duration <= 0.0 || self.elapsed_ms < duration {
                break;
            }
            self.elapsed_ms -= duration;
            self.current_frame = (self.current_frame + 1) % self.frames.len();
        }
        self.current_frame != start
    }
}

/// Global id → animation frames for one load.
///
/// Built once before materialization so that binding animations is a single
/// lookup per tile instead of a scan over every tileset's animations.
#[derive(Debug, Default)]
pub struct AnimationIndex {
    by_gid: HashMap<u32, Arc<[AnimationFrame]>>,
}

impl AnimationIndex {
    /// Build the index from `(first_gid, tileset)` pairs.
    ///
    /// Frame ids are converted from tileset-local to global ids.
    pub fn build<'a>(tilesets: impl IntoIterator<Item = (u32, &'a Tileset)>) -> Self {
        let mut by_gid = HashMap::new();
        for (first_gid, tileset) in tilesets {
            for (local_id, def) in &tileset.animations {
                // Ids past u32::MAX cannot appear in a layer
                let Some(gid) = first_gid.checked_add(*local_id) else {
                    continue;
                };
                let frames: Option<Arc<[AnimationFrame]>> = def
                    .frames
                    .iter()
                    .map(|frame| {
                        Some(AnimationFrame {
                            tile_id: first_gid.checked_add(frame.tile_id)?,
                            duration_ms: frame.duration_ms,
                        })
                    })
                    .collect();
                if let Some(frames) = frames {
                    by_gid.insert(gid, frames);
                }
            }
        }
        Self { by_gid }
    }

    pub fn get(&self, gid: u32) -> Option<&Arc<[AnimationFrame]>> {
        self.by_gid.get(&gid)
    }

    pub fn len(&self) -> usize {
        self.by_gid.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_gid.is_empty()
    }
}

/// System that advances all tile animations.
pub fn advance_tile_animations(time: Option<Res<Time>>, mut animated: Query<&mut TileAnimation>) {
    let Some(time) = time else {
        return;
    };
    let delta_ms = time.delta_secs() * 1000.0;
    if delta_ms <= 0.0 {
        return;
    }
    for mut animation in &mut animated {
        animation.advance(delta_ms);
    }
}
