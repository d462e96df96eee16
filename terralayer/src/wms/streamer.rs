//! Event loop owning the raster layers, the scene and the fetch completions.
//!
//! # Architecture
//!
//! ```text
//! ViewEvent ──► RasterStreamer::handle_view ──► LayerManager::update
//!                                                   │
//!                                                   ▼ FetchRequest
//!                                             ImageDispatcher (tokio task per fetch)
//!                                                   │
//! FetchCompletion ◄─────────── mpsc ◄───────────────┘
//!       │
//!       ▼
//! RasterStreamer::apply ──► RasterLayer::complete ──► SceneGraph
//! ```
//!
//! Viewport events and completions are applied one at a time through
//! `&mut self`, so each read-decide-write on layer state is atomic.

use std::time::Instant;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::camera::Camera;
use super::dispatch::{FetchCompletion, ImageDispatcher};
use super::layer::{CompletionOutcome, RasterLayer, UpdateOutcome};
use crate::scene::{LayerManager, NodeId, SceneGraph};

/// Input events of [`RasterStreamer::run`].
#[derive(Debug, Clone)]
pub enum ViewEvent {
    /// The camera moved.
    Camera(Camera),
    /// Tear down a layer.
    Remove(String),
}

/// Owns every raster layer and applies viewport changes and completions.
pub struct RasterStreamer<S, D> {
    manager: LayerManager,
    scene: S,
    dispatcher: D,
    completions: mpsc::Receiver<FetchCompletion>,
}

impl<S, D> RasterStreamer<S, D>
where
    S: SceneGraph,
    D: ImageDispatcher,
{
    /// Creates a streamer.
    ///
    /// `completions` must be the receiving end of the channel `dispatcher`
    /// reports on.
    pub fn new(scene: S, dispatcher: D, completions: mpsc::Receiver<FetchCompletion>) -> Self {
        Self {
            manager: LayerManager::new(),
            scene,
            dispatcher,
            completions,
        }
    }

    pub fn manager(&self) -> &LayerManager {
        &self.manager
    }

    pub fn scene(&self) -> &S {
        &self.scene
    }

    pub fn scene_mut(&mut self) -> &mut S {
        &mut self.scene
    }

    /// Imports a layer, replacing any layer of the same name.
    pub fn import(&mut self, layer: RasterLayer) -> NodeId {
        self.manager.import_raster(layer, &mut self.scene)
    }

    pub fn remove(&mut self, name: &str) -> bool {
        self.manager.remove(name, &mut self.scene)
    }

    /// Runs every layer's update hook for a camera change.
    pub fn handle_view(&mut self, camera: &Camera, now: Instant) -> Vec<(String, UpdateOutcome)> {
        let outcomes = self
            .manager
            .update(camera, now, &mut self.scene, &self.dispatcher);
        debug!(layers = outcomes.len(), in_flight = self.in_flight(), "View change handled");
        outcomes
    }

    pub fn apply(&mut self, completion: FetchCompletion) -> CompletionOutcome {
        self.manager.complete(completion, &mut self.scene)
    }

    /// Applies every completion already received, without waiting.
    pub fn drain(&mut self) -> usize {
        let mut applied = 0;
        while let Ok(completion) = self.completions.try_recv() {
            self.apply(completion);
            applied += 1;
        }
        applied
    }

    /// Waits for the next completion and applies it.
    ///
    /// Returns `None` once the dispatcher side of the channel is closed.
    pub async fn next_completion(&mut self) -> Option<CompletionOutcome> {
        let completion = self.completions.recv().await?;
        Some(self.apply(completion))
    }

    /// Waits until no fetch is in flight.
    pub async fn settle(&mut self) -> Vec<CompletionOutcome> {
        let mut outcomes = Vec::new();
        while self.in_flight() > 0 {
            match self.next_completion().await {
                Some(outcome) => outcomes.push(outcome),
                None => break,
            }
        }
        outcomes
    }

    pub fn in_flight(&self) -> usize {
        self.manager.in_flight()
    }

    /// Processes events until shutdown or until the event channel closes,
    /// then tears every layer down and returns the scene.
    pub async fn run(self, mut events: mpsc::Receiver<ViewEvent>, shutdown: CancellationToken) -> S {
        let Self {
            mut manager,
            mut scene,
            dispatcher,
            mut completions,
        } = self;
        info!(layers = manager.len(), "Raster streamer starting");

        loop {
            tokio::select! {
                biased;

                _ = shutdown.cancelled() => {
                    info!("Raster streamer shutting down");
                    break;
                }

                Some(completion) = completions.recv() => {
                    manager.complete(completion, &mut scene);
                }

                event = events.recv() => match event {
                    Some(ViewEvent::Camera(camera)) => {
                        manager.update(&camera, Instant::now(), &mut scene, &dispatcher);
                    }
                    Some(ViewEvent::Remove(name)) => {
                        manager.remove(&name, &mut scene);
                    }
                    None => break,
                },
            }
        }

        manager.clear(&mut scene);
        info!("Raster streamer stopped");
        scene
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use glam::DVec3;

    use crate::coord::LocalOrigin;
    use crate::crs::CrsRegistry;
    use crate::http::MockAsyncHttpClient;
    use crate::scene::MemoryScene;
    use crate::wms::dispatch::tests::png_bytes;
    use crate::wms::{RasterConfig, StreamMode, TokioDispatcher, WmsSource};

    const URL: &str = "http://host/wms?VERSION=1.3.0&LAYERS=orto5m&FORMAT=image/png\
        &CRS=EPSG:25831&BBOX=420000,4581000,422000,4583000";

    fn layer(mode: StreamMode) -> RasterLayer {
        RasterLayer::new(
            "orto",
            WmsSource::parse(URL).unwrap(),
            RasterConfig {
                mode,
                view_radius: 1,
                ..RasterConfig::default()
            },
            LocalOrigin::new(421000.0, 4582000.0, 0.0),
            &CrsRegistry::with_defaults(),
        )
        .unwrap()
    }

    fn camera() -> Camera {
        Camera::look_at(DVec3::new(0.0, 80.0, 0.0), DVec3::ZERO, 60.0, 1.5)
    }

    #[tokio::test]
    async fn test_single_image_round_trip() {
        let client = Arc::new(MockAsyncHttpClient::ok(png_bytes(4, 4)));
        let (dispatcher, rx) = TokioDispatcher::new(Arc::clone(&client));
        let mut streamer = RasterStreamer::new(MemoryScene::new(), dispatcher, rx);

        streamer.import(layer(StreamMode::Single));
        let outcomes = streamer.handle_view(&camera(), Instant::now());
        assert_eq!(outcomes, vec![("orto".to_string(), UpdateOutcome::Requested(1))]);

        let settled = streamer.settle().await;
        assert!(matches!(settled.as_slice(), [CompletionOutcome::Attached(_)]));
        assert_eq!(streamer.scene().mesh_count(), 1);
        assert_eq!(streamer.in_flight(), 0);
        assert_eq!(client.urls().len(), 1);
    }

    #[tokio::test]
    async fn test_grid_tiles_complete_independently() {
        let client = Arc::new(MockAsyncHttpClient::ok(png_bytes(2, 2)));
        let (dispatcher, rx) = TokioDispatcher::new(client);
        let mut streamer = RasterStreamer::new(MemoryScene::new(), dispatcher, rx);

        streamer.import(layer(StreamMode::Grid));
        streamer.handle_view(&camera(), Instant::now());
        assert_eq!(streamer.in_flight(), 9);

        streamer.settle().await;
        assert_eq!(streamer.scene().mesh_count(), 9);
    }

    #[tokio::test]
    async fn test_run_until_events_close() {
        let client = Arc::new(MockAsyncHttpClient::ok(png_bytes(2, 2)));
        let (dispatcher, rx) = TokioDispatcher::new(client);
        let mut streamer = RasterStreamer::new(MemoryScene::new(), dispatcher, rx);
        streamer.import(layer(StreamMode::Single));

        let (tx, events) = mpsc::channel(8);
        tx.send(ViewEvent::Camera(camera())).await.unwrap();
        tx.send(ViewEvent::Remove("orto".to_string())).await.unwrap();
        drop(tx);

        let scene = streamer.run(events, CancellationToken::new()).await;
        assert!(scene.is_empty());
        assert_eq!(scene.resources().textures, 0);
    }
}
