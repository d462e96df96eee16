//! `wms` command: import a WMS layer and drive it with camera poses.

use std::sync::Arc;
use std::time::{Duration, Instant};

use clap::Args;
use serde_json::json;
use terralayer::config::ConfigFile;
use terralayer::coord::{map_to_scene, LocalOrigin};
use terralayer::crs::CrsRegistry;
use terralayer::scene::{attach_tree, MemoryScene};
use terralayer::wms::{
    import_static_image, Camera, CompletionOutcome, GetMapRequest, RasterLayer, RasterStreamer,
    StreamMode, TokioDispatcher, UpdateOutcome, WmsSource,
};
use tracing::info;

use super::common::{self, field, heading};
use crate::error::CliError;

/// Arguments of the `wms` command.
#[derive(Debug, Args)]
pub struct WmsArgs {
    /// GetMap URL; LAYERS, FORMAT, VERSION and optionally BBOX are taken from it
    pub url: String,

    /// Request strategy (defaults to the configured mode)
    #[arg(long)]
    pub mode: Option<StreamMode>,

    /// Fetch the URL's BBOX once instead of streaming
    #[arg(long = "static", conflicts_with = "mode")]
    pub static_image: bool,

    /// Layer name
    #[arg(long, default_value = "wms")]
    pub name: String,

    /// Scene origin as x,y[,z]; defaults to the layer boundary center
    #[arg(long, value_parser = common::parse_point)]
    pub origin: Option<LocalOrigin>,

    /// Camera position as x,y,z in the target CRS; repeat for several poses
    #[arg(long, value_parser = common::parse_point)]
    pub camera: Vec<LocalOrigin>,

    /// Look-at point for the camera of the same index; straight down if missing
    #[arg(long, value_parser = common::parse_point)]
    pub target: Vec<LocalOrigin>,

    /// Height of the default camera above the origin
    #[arg(long, default_value_t = 1000.0)]
    pub altitude: f64,

    /// Vertical field of view in degrees
    #[arg(long, default_value_t = 60.0)]
    pub fov: f64,

    /// Viewport width / height
    #[arg(long, default_value_t = 1.5)]
    pub aspect: f64,

    /// Target CRS of the scene
    #[arg(long)]
    pub target_crs: Option<String>,

    /// CRS of GetMap requests (defaults to the URL's CRS/SRS)
    #[arg(long)]
    pub request_crs: Option<String>,

    /// Basic-auth user
    #[arg(long)]
    pub user: Option<String>,

    #[arg(long, requires = "user")]
    pub password: Option<String>,

    /// Print the results as JSON
    #[arg(long)]
    pub json: bool,
}

/// Run the `wms` command.
pub async fn run(args: WmsArgs, config: &ConfigFile) -> Result<(), CliError> {
    let mut source = WmsSource::parse(&args.url)?;
    if let Some(credentials) = common::credentials(args.user.clone(), args.password.clone())? {
        source = source.with_credentials(credentials);
    }
    let registry = common::registry(config)?;
    let client = Arc::new(common::http_client(config)?);

    let mut raster = config.raster_config();
    if let Some(mode) = args.mode {
        raster = raster.with_mode(mode);
    }
    if let Some(crs) = &args.target_crs {
        raster = raster.with_target_crs(crs.clone());
    }
    if let Some(crs) = &args.request_crs {
        raster = raster.with_request_crs(crs.clone());
    }

    let origin = match args.origin.or_else(|| config.scene.origin()) {
        Some(origin) => origin,
        None => default_origin(&source, &registry, &raster.target_crs)?,
    };

    if args.static_image {
        return run_static(&args, client.as_ref(), &source, &raster.target_crs, origin).await;
    }

    let layer = RasterLayer::new(args.name.clone(), source, raster, origin, &registry)?;
    let step = layer.config().min_update_interval + Duration::from_secs(1);
    let poses = camera_poses(&args, &origin);

    let (dispatcher, completions) = TokioDispatcher::new(client);
    let mut streamer = RasterStreamer::new(MemoryScene::new(), dispatcher, completions);
    streamer.import(layer);

    let start = Instant::now();
    let mut results = Vec::with_capacity(poses.len());
    for (index, camera) in poses.iter().enumerate() {
        let now = start + step * index as u32;
        let outcomes = streamer.handle_view(camera, now);
        let completions = streamer.settle().await;
        let attached = completions
            .iter()
            .filter(|c| matches!(c, CompletionOutcome::Attached(_)))
            .count();
        let failed = completions
            .iter()
            .filter(|c| matches!(c, CompletionOutcome::Failed))
            .count();
        let (x, y) = camera.map_position(&origin);
        results.push(json!({
            "pose": index,
            "camera": [x, y],
            "outcome": outcomes.first().map(|(_, o)| describe(o)),
            "attached": attached,
            "failed": failed,
            "meshes": streamer.scene().mesh_count(),
        }));
    }

    let tiles = streamer
        .manager()
        .raster(&args.name)
        .map(|layer| layer.tiles().count())
        .unwrap_or_default();
    let meshes = streamer.scene().mesh_count();
    streamer.remove(&args.name);
    let leaked = streamer.scene().resources();
    info!(layer = %args.name, poses = poses.len(), "WMS session finished");

    if args.json {
        return common::print_json(&json!({
            "layer": args.name,
            "origin": origin,
            "poses": results,
            "tiles": tiles,
            "meshes": meshes,
            "resources_after_removal": leaked,
        }));
    }

    heading(&format!("WMS layer '{}'", args.name));
    field("Origin", format!("{:.3}, {:.3}, {:.3}", origin.x, origin.y, origin.z));
    for result in &results {
        println!(
            "  pose {}: {} ({} attached, {} failed, {} meshes)",
            result["pose"],
            result["outcome"].as_str().unwrap_or("-"),
            result["attached"],
            result["failed"],
            result["meshes"]
        );
    }
    field("Tiles", tiles);
    field("Meshes", meshes);
    Ok(())
}

async fn run_static(
    args: &WmsArgs,
    client: &terralayer::http::AsyncReqwestClient,
    source: &WmsSource,
    target_crs: &str,
    origin: LocalOrigin,
) -> Result<(), CliError> {
    let request = GetMapRequest::from_source(source, target_crs)?;
    let tree = import_static_image(client, source, &request, &origin).await?;

    let mut scene = MemoryScene::new();
    attach_tree(&mut scene, None, tree);

    if args.json {
        return common::print_json(&json!({
            "bbox": request.bbox,
            "crs": request.crs,
            "width": request.width,
            "height": request.height,
            "origin": origin,
            "meshes": scene.mesh_count(),
            "resources": scene.resources(),
        }));
    }

    heading("WMS image");
    field("BBOX", request.bbox);
    field("CRS", &request.crs);
    field("Size", format!("{}x{}", request.width, request.height));
    field("Meshes", scene.mesh_count());
    Ok(())
}

/// Center of the URL's BBOX, reprojected to the target CRS.
fn default_origin(
    source: &WmsSource,
    registry: &CrsRegistry,
    target_crs: &str,
) -> Result<LocalOrigin, CliError> {
    let boundary = source.boundary()?.ok_or_else(|| {
        CliError::InvalidArgument("--origin is required when the URL has no BBOX".to_string())
    })?;
    let declared = source
        .declared_crs()
        .unwrap_or_else(|| target_crs.to_string());
    let boundary = registry.transform(&declared, target_crs)?.apply_bbox(&boundary);
    Ok(LocalOrigin::from_bbox_center(&boundary))
}

/// Scene-space cameras for the requested poses.
fn camera_poses(args: &WmsArgs, origin: &LocalOrigin) -> Vec<Camera> {
    let camera = |position: LocalOrigin, target: Option<&LocalOrigin>| {
        let target = target
            .copied()
            .unwrap_or(LocalOrigin::new(position.x, position.y, origin.z));
        Camera::look_at(
            map_to_scene(position.x, position.y, position.z, origin),
            map_to_scene(target.x, target.y, target.z, origin),
            args.fov,
            args.aspect,
        )
    };

    if args.camera.is_empty() {
        let above = LocalOrigin::new(origin.x, origin.y, origin.z + args.altitude);
        return vec![camera(above, None)];
    }
    args.camera
        .iter()
        .enumerate()
        .map(|(i, position)| camera(*position, args.target.get(i)))
        .collect()
}

fn describe(outcome: &UpdateOutcome) -> String {
    match outcome {
        UpdateOutcome::Requested(n) => format!("requested {}", n),
        UpdateOutcome::Unchanged => "unchanged".to_string(),
        UpdateOutcome::Busy => "busy".to_string(),
        UpdateOutcome::Throttled => "throttled".to_string(),
        UpdateOutcome::NoFootprint => "no footprint".to_string(),
        UpdateOutcome::OutOfBounds => "out of bounds".to_string(),
        UpdateOutcome::Inactive => "inactive".to_string(),
    }
}
