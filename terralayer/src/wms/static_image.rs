//! One-shot import of a single GetMap image at a fixed extent.

use tracing::info;

use super::dispatch::fetch_image;
use super::error::WmsError;
use super::params::WmsSource;
use super::request::GetMapRequest;
use crate::coord::{map_to_scene, LocalOrigin};
use crate::http::AsyncHttpClient;
use crate::scene::{Geometry, Group, Material, Mesh, SceneNode, SceneTree};

/// Name given to the imported group.
pub const WMS_LAYER_NAME: &str = "wms_layer";

/// Image size used when the URL carries no WIDTH/HEIGHT.
pub const DEFAULT_IMAGE_PX: u32 = 1024;

impl GetMapRequest {
    /// Request described entirely by the source URL's `BBOX`, `WIDTH`,
    /// `HEIGHT` and `CRS`/`SRS`.
    ///
    /// # Errors
    ///
    /// `WmsError::InvalidBbox` if the URL has no usable BBOX.
    pub fn from_source(source: &WmsSource, default_crs: &str) -> Result<Self, WmsError> {
        let bbox = source
            .boundary()?
            .ok_or_else(|| WmsError::InvalidBbox(String::new()))?;
        let dimension = |key: &str| {
            source
                .get(key)
                .and_then(|v| v.trim().parse::<u32>().ok())
                .filter(|v| *v > 0)
                .unwrap_or(DEFAULT_IMAGE_PX)
        };
        Ok(Self {
            bbox,
            crs: source
                .declared_crs()
                .unwrap_or_else(|| default_crs.to_string()),
            width: dimension("WIDTH"),
            height: dimension("HEIGHT"),
        })
    }
}

/// Fetches one image and returns a group holding a single ground plane.
///
/// The request CRS is taken as the scene CRS; the plane is centered on the
/// bbox center minus `origin`.
pub async fn import_static_image<C>(
    client: &C,
    source: &WmsSource,
    request: &GetMapRequest,
    origin: &LocalOrigin,
) -> Result<SceneTree, WmsError>
where
    C: AsyncHttpClient + ?Sized,
{
    let url = request.to_url(source);
    let texture = fetch_image(client, url.as_str(), source.credentials()).await?;

    let bbox = request.bbox;
    let (cx, cy) = bbox.center();
    let mesh = Mesh::new(
        "image_plane",
        Geometry::Plane {
            width: bbox.width(),
            depth: bbox.height(),
        },
        Material::textured(texture, source.is_transparent_format()),
        map_to_scene(cx, cy, origin.z, origin),
    );

    let group = Group::new(WMS_LAYER_NAME)
        .with_metadata("type", "WMS_Image")
        .with_metadata("layers", source.layers().unwrap_or_default())
        .with_metadata("bbox", bbox.to_string())
        .with_metadata("crs", request.crs.clone())
        .with_metadata("url", url.as_str());

    info!(
        layers = source.layers().unwrap_or_default(),
        bbox = %bbox,
        width = request.width,
        height = request.height,
        "WMS image imported"
    );
    Ok(SceneTree::with_children(
        SceneNode::Group(group),
        vec![SceneTree::leaf(SceneNode::Mesh(mesh))],
    ))
}
