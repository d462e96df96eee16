//! Integration tests for WMS raster streaming.
//!
//! These drive a `RasterStreamer` with a recording HTTP client and check
//! the GetMap requests it produces, the change thresholds, the in-flight
//! guard and layer re-import.
//!
//! Run with: `cargo test --test wms_integration`

use std::io::Cursor;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use bytes::Bytes;
use image::{ImageBuffer, ImageFormat, Rgba};
use tokio::sync::mpsc;

use terralayer::coord::{map_to_scene, BoundingBox, LocalOrigin};
use terralayer::crs::CrsRegistry;
use terralayer::http::{AsyncHttpClient, Credentials, HttpError};
use terralayer::scene::MemoryScene;
use terralayer::wms::{
    Camera, CompletionOutcome, RasterConfig, RasterLayer, RasterStreamer,
    StreamMode, TokioDispatcher, UpdateOutcome, WmsSource,
};

// ============================================================================
// Helper Functions
// ============================================================================

const TOPOGRIS_URL: &str = "https://your_server.com/wms?SERVICE=WMS&VERSION=1.3.0\
    &REQUEST=GetMap&LAYERS=topogris&FORMAT=image/png\
    &BBOX=420000,4581000,422000,4583000&WIDTH=1024&HEIGHT=1024&CRS=EPSG:25831";

const ORIGIN: LocalOrigin = LocalOrigin::new(421000.0, 4582000.0, 0.0);

/// HTTP client that answers every request with the same body and records
/// the URLs.
struct RecordingClient {
    body: Bytes,
    urls: Mutex<Vec<String>>,
}

impl RecordingClient {
    fn png() -> Self {
        let img = ImageBuffer::from_pixel(4, 4, Rgba([120u8, 120, 120, 255]));
        let mut out = Cursor::new(Vec::new());
        img.write_to(&mut out, ImageFormat::Png).unwrap();
        Self {
            body: Bytes::from(out.into_inner()),
            urls: Mutex::new(Vec::new()),
        }
    }

    fn urls(&self) -> Vec<String> {
        self.urls.lock().unwrap().clone()
    }
}

impl AsyncHttpClient for RecordingClient {
    async fn get(&self, url: &str, _credentials: Option<&Credentials>) -> Result<Bytes, HttpError> {
        self.urls.lock().unwrap().push(url.to_string());
        Ok(self.body.clone())
    }
}

type Streamer = RasterStreamer<MemoryScene, TokioDispatcher<RecordingClient>>;

fn streamer(client: &Arc<RecordingClient>) -> Streamer {
    let (dispatcher, completions) = TokioDispatcher::new(Arc::clone(client));
    RasterStreamer::new(MemoryScene::new(), dispatcher, completions)
}

fn layer(name: &str, mode: StreamMode) -> RasterLayer {
    RasterLayer::new(
        name,
        WmsSource::parse(TOPOGRIS_URL).unwrap(),
        RasterConfig::new().with_mode(mode),
        ORIGIN,
        &CrsRegistry::with_defaults(),
    )
    .unwrap()
}

/// Camera straight above a map point.
fn camera_above(x: f64, y: f64, altitude: f64) -> Camera {
    Camera::look_at(
        map_to_scene(x, y, altitude, &ORIGIN),
        map_to_scene(x, y, 0.0, &ORIGIN),
        60.0,
        1.5,
    )
}

// ============================================================================
// Request construction
// ============================================================================

/// A WMS 1.3.0 URL keeps LAYERS and FORMAT, uses CRS, and gets its BBOX,
/// WIDTH and HEIGHT replaced by the visible footprint.
#[tokio::test]
async fn test_topogris_request_parameters() {
    let client = Arc::new(RecordingClient::png());
    let mut streamer = streamer(&client);
    streamer.import(layer("topogris", StreamMode::Single));

    let outcomes = streamer.handle_view(&camera_above(421000.0, 4582000.0, 80.0), Instant::now());
    assert_eq!(outcomes, vec![("topogris".to_string(), UpdateOutcome::Requested(1))]);
    streamer.settle().await;

    let urls = client.urls();
    assert_eq!(urls.len(), 1);
    let sent = WmsSource::parse(&urls[0]).unwrap();

    assert_eq!(sent.get("LAYERS"), Some("topogris"));
    assert_eq!(sent.get("FORMAT"), Some("image/png"));
    assert_eq!(sent.get("VERSION"), Some("1.3.0"));
    assert_eq!(sent.get("REQUEST"), Some("GetMap"));
    assert_eq!(sent.get("CRS"), Some("EPSG:25831"));
    assert_eq!(sent.get("SRS"), None);
    assert_eq!(sent.get("TRANSPARENT"), Some("true"));

    let bbox: BoundingBox = sent.get("BBOX").unwrap().parse().unwrap();
    assert!(bbox.width() < 200.0, "footprint, not the layer extent: {}", bbox);
    let (cx, cy) = bbox.center();
    assert!((cx - 421000.0).abs() < 1e-6 && (cy - 4582000.0).abs() < 1e-6);

    let width: u32 = sent.get("WIDTH").unwrap().parse().unwrap();
    let height: u32 = sent.get("HEIGHT").unwrap().parse().unwrap();
    assert_ne!((width, height), (1024, 1024));
    assert!(width > height, "aspect follows the viewport");
}

// ============================================================================
// Change detection
// ============================================================================

/// Small pans and zooms issue no request; a large pan does.
#[tokio::test]
async fn test_threshold_law() {
    let client = Arc::new(RecordingClient::png());
    let mut streamer = streamer(&client);
    streamer.import(layer("topogris", StreamMode::Single));
    let start = Instant::now();

    streamer.handle_view(&camera_above(421000.0, 4582000.0, 80.0), start);
    streamer.settle().await;

    let small_pan = streamer.handle_view(&camera_above(421010.0, 4582000.0, 80.0), start);
    assert_eq!(small_pan[0].1, UpdateOutcome::Unchanged);

    let small_zoom = streamer.handle_view(&camera_above(421000.0, 4582000.0, 90.0), start);
    assert_eq!(small_zoom[0].1, UpdateOutcome::Unchanged);
    assert_eq!(client.urls().len(), 1);

    let large_pan = streamer.handle_view(&camera_above(421400.0, 4582000.0, 80.0), start);
    assert_eq!(large_pan[0].1, UpdateOutcome::Requested(1));
    streamer.settle().await;
    assert_eq!(client.urls().len(), 2);
    assert_eq!(streamer.scene().mesh_count(), 1, "replaced, not accumulated");
}

/// A view entirely outside the layer BBOX issues nothing.
#[tokio::test]
async fn test_out_of_bounds_view() {
    let client = Arc::new(RecordingClient::png());
    let mut streamer = streamer(&client);
    streamer.import(layer("topogris", StreamMode::Single));

    let outcomes = streamer.handle_view(&camera_above(430000.0, 4590000.0, 80.0), Instant::now());
    assert_eq!(outcomes[0].1, UpdateOutcome::OutOfBounds);
    assert!(client.urls().is_empty());
}

// ============================================================================
// In-flight guard
// ============================================================================

#[tokio::test]
async fn test_single_image_in_flight_guard() {
    let client = Arc::new(RecordingClient::png());
    let mut streamer = streamer(&client);
    streamer.import(layer("topogris", StreamMode::Single));
    let start = Instant::now();

    streamer.handle_view(&camera_above(421000.0, 4582000.0, 80.0), start);
    let second = streamer.handle_view(&camera_above(421500.0, 4582000.0, 80.0), start);
    assert_eq!(second[0].1, UpdateOutcome::Busy);
    assert_eq!(streamer.in_flight(), 1);

    streamer.settle().await;
    assert_eq!(client.urls().len(), 1);
}

#[tokio::test]
async fn test_grid_requests_each_tile_once() {
    let client = Arc::new(RecordingClient::png());
    let mut streamer = streamer(&client);
    let mut config = RasterConfig::new().with_mode(StreamMode::Grid);
    config.view_radius = 1;
    streamer.import(
        RasterLayer::new(
            "grid",
            WmsSource::parse(TOPOGRIS_URL).unwrap(),
            config,
            ORIGIN,
            &CrsRegistry::with_defaults(),
        )
        .unwrap(),
    );
    let start = Instant::now();
    let camera = camera_above(421100.0, 4582100.0, 300.0);

    assert_eq!(streamer.handle_view(&camera, start)[0].1, UpdateOutcome::Requested(9));
    assert_eq!(
        streamer.handle_view(&camera, start + Duration::from_secs(1))[0].1,
        UpdateOutcome::Unchanged
    );
    streamer.settle().await;
    assert_eq!(
        streamer.handle_view(&camera, start + Duration::from_secs(2))[0].1,
        UpdateOutcome::Unchanged
    );

    let urls = client.urls();
    assert_eq!(urls.len(), 9);
    let mut unique = urls.clone();
    unique.sort();
    unique.dedup();
    assert_eq!(unique.len(), 9);
    assert_eq!(streamer.scene().mesh_count(), 9);

    for url in &urls {
        let sent = WmsSource::parse(url).unwrap();
        assert_eq!(sent.get("WIDTH"), Some("256"));
        let bbox: BoundingBox = sent.get("BBOX").unwrap().parse().unwrap();
        assert_eq!(bbox.width(), 500.0);
    }
}

// ============================================================================
// Re-import
// ============================================================================

/// Importing the same layer twice leaves one update hook and no stale mesh,
/// even when the first instance still has a fetch in flight.
#[tokio::test]
async fn test_reimport_twice() {
    let client = Arc::new(RecordingClient::png());
    let mut streamer = streamer(&client);
    let camera = camera_above(421000.0, 4582000.0, 80.0);

    streamer.import(layer("topogris", StreamMode::Single));
    streamer.handle_view(&camera, Instant::now());
    streamer.settle().await;
    assert_eq!(streamer.scene().mesh_count(), 1);

    streamer.handle_view(&camera_above(421500.0, 4582000.0, 80.0), Instant::now());
    streamer.import(layer("topogris", StreamMode::Single));
    streamer.import(layer("topogris", StreamMode::Single));

    let hooks = streamer.manager().active_hooks();
    assert_eq!(hooks.len(), 1);
    assert_eq!(streamer.scene().roots().len(), 1);
    assert_eq!(streamer.scene().mesh_count(), 0);
    assert_eq!(streamer.scene().resources().textures, 0);

    // The fetch issued by the first instance is discarded when it lands.
    let mut stale = Vec::new();
    while let Some(outcome) = tokio::time::timeout(Duration::from_millis(200), streamer.next_completion())
        .await
        .ok()
        .flatten()
    {
        stale.push(outcome);
    }
    assert!(stale.iter().all(|o| *o == CompletionOutcome::Discarded));
    assert_eq!(streamer.scene().mesh_count(), 0);

    streamer.handle_view(&camera, Instant::now());
    streamer.settle().await;
    assert_eq!(streamer.scene().mesh_count(), 1);
    assert_eq!(streamer.scene().roots().len(), 1);
}

// ============================================================================
// Event loop
// ============================================================================

#[tokio::test]
async fn test_run_loop_tears_down_on_shutdown() {
    use terralayer::wms::ViewEvent;
    use tokio_util::sync::CancellationToken;

    let client = Arc::new(RecordingClient::png());
    let mut streamer = streamer(&client);
    streamer.import(layer("topogris", StreamMode::Grid));

    let (events, rx) = mpsc::channel(4);
    let shutdown = CancellationToken::new();
    let task = tokio::spawn(streamer.run(rx, shutdown.clone()));

    events
        .send(ViewEvent::Camera(camera_above(421000.0, 4582000.0, 300.0)))
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;
    shutdown.cancel();

    let scene = task.await.unwrap();
    assert!(scene.is_empty());
    assert_eq!(scene.resources().textures, 0);
    assert_eq!(scene.resources().geometries, 0);
}
