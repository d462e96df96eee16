//! GML loading front-end.

use std::path::Path;
use std::sync::Arc;

use glam::DVec3;
use roxmltree::{Document, ParsingOptions};
use serde::Serialize;
use tracing::{debug, info, warn};

use super::dialect::{FeatureReader, GmlDialect, ReadOptions};
use super::error::GmlError;
use super::feature::{FeatureGeometry, PolygonCoords, VectorFeature};
use super::schema::{detect_schema, detect_srs, detect_version, feature_elements};
use crate::coord::{map_to_scene, LocalOrigin};
use crate::crs::{is_authority_axis_order, normalize_srs, CrsRegistry};
use crate::geometry::{build_polygon, to_ring, ExtrusionBuilder, SolidBuilder};
use crate::http::{AsyncHttpClient, Credentials};
use crate::scene::{Entity, Geometry, Group, Material, Mesh, SceneNode, SceneTree};

/// Default scene CRS.
pub const DEFAULT_TARGET_CRS: &str = "EPSG:25831";

/// Default extrusion height for polygons, in target CRS units.
pub const DEFAULT_EXTRUSION_HEIGHT: f64 = 3.0;

/// Default name of the produced group.
pub const DEFAULT_LAYER_NAME: &str = "layer";

const MARKER_COLOR: [f32; 4] = [0.9, 0.2, 0.2, 1.0];
const LINE_COLOR: [f32; 4] = [0.1, 0.3, 0.9, 1.0];

/// Stages of a parse call, for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseStage {
    ParseXml,
    DetectDialectAndVersion,
    DetectFeatureSchema,
    DetectSrs,
    NormalizeSrs,
    ExtractFeatures,
    Done,
}

/// GML loader options.
#[derive(Debug, Clone, PartialEq)]
pub struct GmlOptions {
    /// CRS that output coordinates are reprojected to.
    pub target_crs: String,
    pub extrusion_height: f64,
    /// SRS assumed when the document declares none.
    pub default_srs: Option<String>,
    /// Name of the produced group.
    pub layer_name: String,
    /// Scene origin; derived from the first geometry when unset.
    pub origin: Option<LocalOrigin>,
}

impl Default for GmlOptions {
    fn default() -> Self {
        Self {
            target_crs: DEFAULT_TARGET_CRS.to_string(),
            extrusion_height: DEFAULT_EXTRUSION_HEIGHT,
            default_srs: None,
            layer_name: DEFAULT_LAYER_NAME.to_string(),
            origin: None,
        }
    }
}

impl GmlOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_target_crs(mut self, crs: impl Into<String>) -> Self {
        self.target_crs = crs.into();
        self
    }

    pub fn with_extrusion_height(mut self, height: f64) -> Self {
        self.extrusion_height = height;
        self
    }

    pub fn with_default_srs(mut self, srs: impl Into<String>) -> Self {
        self.default_srs = Some(srs.into());
        self
    }

    pub fn with_layer_name(mut self, name: impl Into<String>) -> Self {
        self.layer_name = name.into();
        self
    }

    pub fn with_origin(mut self, origin: LocalOrigin) -> Self {
        self.origin = Some(origin);
        self
    }
}

/// Counters for one load.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct LoadReport {
    /// Features read from the document.
    pub features: usize,
    pub solids: usize,
    pub lines: usize,
    pub points: usize,
    /// Features without geometry, emitted as `<id>_nv` entities.
    pub non_visual: usize,
    /// Features dropped for undecodable or degenerate geometry.
    pub skipped: usize,
}

/// Result of a successful load, not yet attached to a scene.
#[derive(Debug, Clone)]
pub struct FeatureLayer {
    pub name: String,
    /// Group holding one child per feature.
    pub tree: SceneTree,
    /// Parsed features, reprojected to the target CRS.
    pub features: Vec<VectorFeature>,
    pub report: LoadReport,
    /// Normalised source SRS.
    pub source_srs: String,
    pub version: String,
    pub dialect: GmlDialect,
    pub origin: LocalOrigin,
}

/// Loads GML documents into scene trees.
pub struct GmlLoader {
    registry: Arc<CrsRegistry>,
    options: GmlOptions,
    builder: Arc<dyn SolidBuilder>,
}

impl GmlLoader {
    pub fn new(registry: Arc<CrsRegistry>, options: GmlOptions) -> Self {
        Self {
            registry,
            options,
            builder: Arc::new(ExtrusionBuilder::default()),
        }
    }

    /// Replaces the solid builder used for polygons.
    pub fn with_builder(mut self, builder: Arc<dyn SolidBuilder>) -> Self {
        self.builder = builder;
        self
    }

    pub fn options(&self) -> &GmlOptions {
        &self.options
    }

    /// Reads a GML file.
    pub async fn load_path(&self, path: impl AsRef<Path>) -> Result<FeatureLayer, GmlError> {
        let path = path.as_ref();
        let xml = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| GmlError::Io {
                path: path.to_path_buf(),
                message: e.to_string(),
            })?;
        debug!(path = %path.display(), bytes = xml.len(), "Read GML file");
        self.load_str(&xml)
    }

    /// Fetches and parses a GML document.
    pub async fn load_url<C: AsyncHttpClient>(
        &self,
        client: &C,
        url: &str,
        credentials: Option<&Credentials>,
    ) -> Result<FeatureLayer, GmlError> {
        let body = client.get(url, credentials).await?;
        let xml = String::from_utf8(body.to_vec())
            .map_err(|e| GmlError::MalformedDocument(format!("response is not UTF-8: {}", e)))?;
        debug!(url = %url, bytes = xml.len(), "Fetched GML document");
        self.load_str(&xml)
    }

    /// Parses a GML document.
    pub fn load_str(&self, xml: &str) -> Result<FeatureLayer, GmlError> {
        let mut stage = ParseStage::ParseXml;
        let result = self.parse(xml, &mut stage);
        if let Err(e) = &result {
            warn!(stage = ?stage, error = %e, "GML load failed");
        }
        result
    }

    fn parse(&self, xml: &str, stage: &mut ParseStage) -> Result<FeatureLayer, GmlError> {
        if xml.trim().is_empty() {
            return Err(GmlError::MalformedDocument("empty document".to_string()));
        }
        let parsing = ParsingOptions {
            allow_dtd: true,
            ..ParsingOptions::default()
        };
        let doc = Document::parse_with_options(xml, parsing)
            .map_err(|e| GmlError::MalformedDocument(e.to_string()))?;

        *stage = ParseStage::DetectDialectAndVersion;
        let version = detect_version(&doc);
        let dialect = GmlDialect::from_version(&version);

        *stage = ParseStage::DetectFeatureSchema;
        let schema = detect_schema(&doc)?;
        debug!(
            feature_type = %schema.feature_type,
            geometry = %schema.geometry_name,
            member = %schema.member_tag,
            "Detected feature schema"
        );

        *stage = ParseStage::DetectSrs;
        let declared = detect_srs(&doc)
            .map(str::to_string)
            .or_else(|| self.options.default_srs.clone())
            .ok_or(GmlError::MissingSrs)?;

        *stage = ParseStage::NormalizeSrs;
        let source_srs = normalize_srs(&declared);
        let transform = self
            .registry
            .transform(&source_srs, &self.options.target_crs)?;
        let swap_axes = is_authority_axis_order(&declared) && transform.source().is_geographic();

        *stage = ParseStage::ExtractFeatures;
        let total = feature_elements(&doc, &schema).count();
        let mut features = dialect.read_features(&doc, &ReadOptions { schema });
        let mut report = LoadReport {
            features: features.len(),
            skipped: total - features.len(),
            ..LoadReport::default()
        };

        for feature in &mut features {
            if let Some(geometry) = feature.geometry.as_mut() {
                geometry.map_positions(|p| {
                    let (x, y) = if swap_axes { (p.y, p.x) } else { (p.x, p.y) };
                    let (tx, ty) = transform.apply(x, y);
                    DVec3::new(tx, ty, p.z)
                });
            }
        }

        let origin = self
            .options
            .origin
            .or_else(|| {
                features
                    .iter()
                    .find_map(|f| f.geometry.as_ref().and_then(FeatureGeometry::bounds))
                    .map(|bbox| LocalOrigin::from_bbox_center(&bbox))
            })
            .unwrap_or_default();

        let children: Vec<SceneTree> = features
            .iter()
            .filter_map(|f| self.build_feature(f, &origin, &mut report))
            .collect();
        if children.is_empty() {
            warn!(layer = %self.options.layer_name, "GML load completed but produced no objects");
        }

        let group = Group::new(self.options.layer_name.clone())
            .with_metadata("units", "m")
            .with_metadata("crs", self.options.target_crs.clone())
            .with_metadata("source_crs", source_srs.clone());

        *stage = ParseStage::Done;
        info!(
            layer = %self.options.layer_name,
            version = %version,
            srs = %source_srs,
            features = report.features,
            solids = report.solids,
            lines = report.lines,
            points = report.points,
            non_visual = report.non_visual,
            skipped = report.skipped,
            "GML layer loaded"
        );

        Ok(FeatureLayer {
            name: self.options.layer_name.clone(),
            tree: SceneTree::with_children(SceneNode::Group(group), children),
            features,
            report,
            source_srs,
            version,
            dialect,
            origin,
        })
    }

    fn build_feature(
        &self,
        feature: &VectorFeature,
        origin: &LocalOrigin,
        report: &mut LoadReport,
    ) -> Option<SceneTree> {
        let Some(geometry) = &feature.geometry else {
            report.non_visual += 1;
            return Some(SceneTree::leaf(SceneNode::Entity(Entity::new(
                format!("{}_nv", feature.id),
                feature.properties.clone(),
            ))));
        };

        let id = feature.id.as_str();
        let scene_points =
            |points: &[DVec3]| -> Vec<DVec3> { points.iter().map(|p| map_to_scene(p.x, p.y, p.z, origin)).collect() };

        let meshes: Vec<SceneTree> = match geometry {
            FeatureGeometry::Point(p) => vec![self.marker(id, scene_points(&[*p]))],
            FeatureGeometry::MultiPoint(points) => vec![self.marker(id, scene_points(points))],
            FeatureGeometry::LineString(line) => self.polyline(id, &scene_points(line)).into_iter().collect(),
            FeatureGeometry::MultiLineString(lines) => lines
                .iter()
                .filter_map(|line| self.polyline(id, &scene_points(line)))
                .collect(),
            FeatureGeometry::Polygon(polygon) => {
                self.solid(id, polygon, origin).into_iter().collect()
            }
            FeatureGeometry::MultiPolygon(polygons) => polygons
                .iter()
                .filter_map(|polygon| self.solid(id, polygon, origin))
                .collect(),
        };

        if meshes.is_empty() {
            debug!(feature = %id, geometry = geometry.type_name(), "Skipping feature, no usable geometry");
            report.skipped += 1;
            return None;
        }
        for mesh in &meshes {
            match mesh.node.as_mesh().map(|m| &m.geometry) {
                Some(Geometry::Points(_)) => report.points += 1,
                Some(Geometry::Polyline(_)) => report.lines += 1,
                _ => report.solids += 1,
            }
        }

        let mut group = Group::new(id);
        group.metadata = feature.properties.clone();
        group.metadata.insert("geometry".to_string(), geometry.type_name().to_string());
        Some(SceneTree::with_children(SceneNode::Group(group), meshes))
    }

    fn marker(&self, id: &str, points: Vec<DVec3>) -> SceneTree {
        SceneTree::leaf(SceneNode::Mesh(Mesh::new(
            id,
            Geometry::Points(points),
            Material::solid(MARKER_COLOR),
            DVec3::ZERO,
        )))
    }

    fn polyline(&self, id: &str, points: &[DVec3]) -> Option<SceneTree> {
        if points.len() < 2 {
            debug!(feature = %id, points = points.len(), "Dropping line with fewer than 2 points");
            return None;
        }
        Some(SceneTree::leaf(SceneNode::Mesh(Mesh::new(
            id,
            Geometry::Polyline(points.to_vec()),
            Material::solid(LINE_COLOR),
            DVec3::ZERO,
        ))))
    }

    fn solid(&self, id: &str, polygon: &PolygonCoords, origin: &LocalOrigin) -> Option<SceneTree> {
        let xy = |ring: &[DVec3]| ring.iter().map(|p| (p.x, p.y)).collect::<Vec<_>>();
        let outer = to_ring(xy(&polygon.exterior), origin);
        let holes = polygon
            .interiors
            .iter()
            .map(|ring| to_ring(xy(ring), origin))
            .collect();
        let base = polygon.exterior.first().map(|p| p.z - origin.z).unwrap_or(0.0);

        let descriptor = match build_polygon(outer, holes, self.options.extrusion_height) {
            Ok(d) => d.with_base_elevation(base),
            Err(e) => {
                debug!(feature = %id, error = %e, "Skipping polygon");
                return None;
            }
        };
        match self.builder.build(id, descriptor) {
            Ok(node) => Some(SceneTree::leaf(node)),
            Err(e) => {
                warn!(feature = %id, error = %e, "Solid builder failed");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crs::CrsError;
    use crate::geometry::Winding;
    use crate::http::{HttpError, MockAsyncHttpClient};

    fn loader(options: GmlOptions) -> GmlLoader {
        GmlLoader::new(Arc::new(CrsRegistry::with_defaults()), options)
    }

    const BUILDINGS: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<wfs:FeatureCollection xmlns:wfs="http://www.opengis.net/wfs"
    xmlns:gml="http://www.opengis.net/gml" xmlns:bcn="urn:bcn">
  <gml:featureMember>
    <bcn:building gml:id="b1">
      <bcn:use>school</bcn:use>
      <bcn:geom>
        <gml:Polygon srsName="urn:ogc:def:crs:EPSG::25831">
          <gml:exterior><gml:LinearRing><gml:posList>
            430000 4581000 430100 4581000 430100 4581100 430000 4581100 430000 4581000
          </gml:posList></gml:LinearRing></gml:exterior>
          <gml:interior><gml:LinearRing><gml:posList>
            430040 4581040 430060 4581040 430060 4581060 430040 4581060 430040 4581040
          </gml:posList></gml:LinearRing></gml:interior>
        </gml:Polygon>
      </bcn:geom>
    </bcn:building>
  </gml:featureMember>
  <gml:featureMember>
    <bcn:building gml:id="b2">
      <bcn:use>kiosk</bcn:use>
      <bcn:geom>
        <gml:Polygon><gml:exterior><gml:LinearRing><gml:posList>
          430000 4581000 430001 4581001 430000 4581000
        </gml:posList></gml:LinearRing></gml:exterior></gml:Polygon>
      </bcn:geom>
    </bcn:building>
  </gml:featureMember>
  <gml:featureMember>
    <bcn:building gml:id="b3"><bcn:use>plot</bcn:use></bcn:building>
  </gml:featureMember>
</wfs:FeatureCollection>"#;

    #[test]
    fn test_load_buildings() {
        let origin = LocalOrigin::new(430_000.0, 4_581_000.0, 0.0);
        let layer = loader(GmlOptions::new().with_layer_name("buildings").with_origin(origin))
            .load_str(BUILDINGS)
            .unwrap();

        assert_eq!(layer.source_srs, "EPSG:25831");
        assert_eq!(layer.dialect, GmlDialect::Gml3);
        assert_eq!(
            layer.report,
            LoadReport {
                features: 3,
                solids: 1,
                lines: 0,
                points: 0,
                non_visual: 1,
                skipped: 1,
            }
        );

        match &layer.tree.node {
            SceneNode::Group(g) => {
                assert_eq!(g.name, "buildings");
                assert_eq!(g.metadata.get("units").map(String::as_str), Some("m"));
            }
            other => panic!("unexpected root {:?}", other),
        }
        let names: Vec<&str> = layer.tree.children.iter().map(|c| c.node.name()).collect();
        assert_eq!(names, vec!["b1", "b3_nv"]);
    }

    #[test]
    fn test_polygon_hole_profile_is_local() {
        let origin = LocalOrigin::new(430_000.0, 4_581_000.0, 0.0);
        let layer = loader(GmlOptions::new().with_origin(origin))
            .load_str(BUILDINGS)
            .unwrap();

        let meshes = layer.tree.meshes();
        let Geometry::Extrusion(solid) = &meshes[0].geometry else {
            panic!("expected extrusion");
        };
        assert_eq!(solid.extrusion_height, DEFAULT_EXTRUSION_HEIGHT);
        assert_eq!(solid.profile.outer.len(), 4);
        assert_eq!(solid.profile.holes.len(), 1);
        assert_eq!(solid.profile.holes[0].winding(), Winding::Clockwise);
        let bounds = solid.profile.outer.bounds().unwrap();
        assert!((bounds.min_x - 0.0).abs() < 1e-9 && (bounds.max_x - 100.0).abs() < 1e-9);
    }

    #[test]
    fn test_origin_derived_from_first_geometry() {
        let layer = loader(GmlOptions::new()).load_str(BUILDINGS).unwrap();
        assert_eq!(layer.origin, LocalOrigin::new(430_050.0, 4_581_050.0, 0.0));
    }

    #[test]
    fn test_reprojects_geographic_urn_with_axis_swap() {
        // lat/lon order because of the URN form
        let xml = r#"<c xmlns:gml="http://www.opengis.net/gml"><gml:featureMember><f gml:id="p">
            <g><gml:Point srsName="urn:ogc:def:crs:EPSG::4326"><gml:pos>41.3851 2.1734</gml:pos></gml:Point></g>
        </f></gml:featureMember></c>"#;
        let layer = loader(GmlOptions::new()).load_str(xml).unwrap();

        let Some(FeatureGeometry::Point(p)) = &layer.features[0].geometry else {
            panic!("expected point");
        };
        assert!((p.x - 430_887.56).abs() < 0.05, "x = {}", p.x);
        assert!((p.y - 4_581_837.85).abs() < 0.05, "y = {}", p.y);
        assert_eq!(layer.report.points, 1);
    }

    #[test]
    fn test_plain_epsg_keeps_xy_order() {
        let xml = r#"<c xmlns:gml="http://www.opengis.net/gml"><gml:featureMember><f>
            <g><gml:Point srsName="EPSG:4326"><gml:pos>2.1734 41.3851</gml:pos></gml:Point></g>
        </f></gml:featureMember></c>"#;
        let layer = loader(GmlOptions::new()).load_str(xml).unwrap();

        let Some(FeatureGeometry::Point(p)) = &layer.features[0].geometry else {
            panic!("expected point");
        };
        assert!((p.x - 430_887.56).abs() < 0.05);
        assert_eq!(layer.features[0].id, "feature");
    }

    #[test]
    fn test_line_feature() {
        let xml = r#"<c xmlns:gml="http://www.opengis.net/gml"><gml:featureMember><road gml:id="r1">
            <axis><gml:LineString srsName="EPSG:25831"><gml:posList>0 0 10 0 10 10</gml:posList></gml:LineString></axis>
        </road></gml:featureMember></c>"#;
        let layer = loader(GmlOptions::new().with_origin(LocalOrigin::default()))
            .load_str(xml)
            .unwrap();

        assert_eq!(layer.report.lines, 1);
        let Geometry::Polyline(points) = &layer.tree.meshes()[0].geometry else {
            panic!("expected polyline");
        };
        assert_eq!(points[2], DVec3::new(10.0, 0.0, -10.0));
    }

    #[test]
    fn test_empty_and_malformed() {
        let l = loader(GmlOptions::new());
        assert!(matches!(l.load_str("   "), Err(GmlError::MalformedDocument(_))));
        assert!(matches!(l.load_str("<a><b></a>"), Err(GmlError::MalformedDocument(_))));
    }

    #[test]
    fn test_missing_srs_uses_default() {
        let xml = r#"<c xmlns:gml="http://www.opengis.net/gml"><gml:featureMember><f>
            <g><gml:Point><gml:pos>1 2</gml:pos></gml:Point></g></f></gml:featureMember></c>"#;

        assert!(matches!(
            loader(GmlOptions::new()).load_str(xml),
            Err(GmlError::MissingSrs)
        ));
        let layer = loader(GmlOptions::new().with_default_srs("EPSG:25831"))
            .load_str(xml)
            .unwrap();
        assert_eq!(layer.source_srs, "EPSG:25831");
    }

    #[test]
    fn test_unknown_srs() {
        let xml = r#"<c xmlns:gml="http://www.opengis.net/gml"><gml:featureMember><f>
            <g><gml:Point srsName="EPSG:2154"><gml:pos>1 2</gml:pos></gml:Point></g></f></gml:featureMember></c>"#;
        assert!(matches!(
            loader(GmlOptions::new()).load_str(xml),
            Err(GmlError::Crs(CrsError::UnknownCrs(id))) if id == "EPSG:2154"
        ));
    }

    #[tokio::test]
    async fn test_load_url() {
        let client = MockAsyncHttpClient::ok(BUILDINGS.as_bytes().to_vec());
        let layer = loader(GmlOptions::new())
            .load_url(&client, "http://example.com/wfs?typeName=building", None)
            .await
            .unwrap();
        assert_eq!(layer.report.solids, 1);
        assert_eq!(client.urls().len(), 1);
    }

    #[tokio::test]
    async fn test_load_url_network_failure() {
        let client = MockAsyncHttpClient::err(HttpError::Timeout("http://example.com".to_string()));
        let result = loader(GmlOptions::new())
            .load_url(&client, "http://example.com", None)
            .await;
        assert!(matches!(result, Err(GmlError::Http(HttpError::Timeout(_)))));
    }

    #[tokio::test]
    async fn test_load_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("buildings.gml");
        std::fs::write(&path, BUILDINGS).unwrap();

        let layer = loader(GmlOptions::new()).load_path(&path).await.unwrap();
        assert_eq!(layer.report.features, 3);

        let missing = loader(GmlOptions::new())
            .load_path(dir.path().join("missing.gml"))
            .await;
        assert!(matches!(missing, Err(GmlError::Io { .. })));
    }
}
