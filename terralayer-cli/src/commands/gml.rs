//! `gml` command: load a GML document into an in-memory scene and summarize it.

use clap::Args;
use serde_json::json;
use terralayer::config::ConfigFile;
use terralayer::coord::LocalOrigin;
use terralayer::gml::{FeatureLayer, GmlLoader};
use terralayer::scene::{LayerManager, MemoryScene};
use tracing::info;

use super::common::{self, field, heading};
use crate::error::CliError;

/// Arguments of the `gml` command.
#[derive(Debug, Args)]
pub struct GmlArgs {
    /// Path or http(s) URL of the GML document
    pub source: String,

    /// SRS to assume when the document declares none
    #[arg(long)]
    pub srs: Option<String>,

    /// Extrusion height of polygon solids
    #[arg(long)]
    pub height: Option<f64>,

    /// Scene origin as x,y[,z] in the target CRS
    #[arg(long, value_parser = common::parse_point)]
    pub origin: Option<LocalOrigin>,

    /// Target CRS of the scene
    #[arg(long)]
    pub target_crs: Option<String>,

    /// Name of the created layer
    #[arg(long)]
    pub name: Option<String>,

    /// Basic-auth user for remote documents
    #[arg(long)]
    pub user: Option<String>,

    #[arg(long, requires = "user")]
    pub password: Option<String>,

    /// Print the summary and feature properties as JSON
    #[arg(long)]
    pub json: bool,
}

/// Run the `gml` command.
pub async fn run(args: GmlArgs, config: &ConfigFile) -> Result<(), CliError> {
    let mut options = config.gml_options();
    if let Some(srs) = &args.srs {
        options = options.with_default_srs(srs.clone());
    }
    if let Some(height) = args.height {
        options = options.with_extrusion_height(height);
    }
    if let Some(origin) = args.origin {
        options = options.with_origin(origin);
    }
    if let Some(crs) = &args.target_crs {
        options = options.with_target_crs(crs.clone());
    }
    if let Some(name) = &args.name {
        options = options.with_layer_name(name.clone());
    }

    let loader = GmlLoader::new(common::registry(config)?, options);
    let layer = if common::is_url(&args.source) {
        let client = common::http_client(config)?;
        let credentials = common::credentials(args.user.clone(), args.password.clone())?;
        loader
            .load_url(&client, &args.source, credentials.as_ref())
            .await?
    } else {
        loader.load_path(&args.source).await?
    };

    let summary = summary_json(&layer, &loader.options().target_crs);
    let features: Vec<_> = layer
        .features
        .iter()
        .map(|f| {
            json!({
                "id": f.id,
                "type": f.feature_type,
                "geometry": f.geometry.as_ref().map(|g| g.type_name()),
                "properties": f.properties,
            })
        })
        .collect();

    let mut scene = MemoryScene::new();
    let mut layers = LayerManager::new();
    let name = layer.name.clone();
    let report = layer.report;
    let source_srs = layer.source_srs.clone();
    let version = layer.version.clone();
    let origin = layer.origin;
    layers.attach_features(layer, &mut scene);
    info!(layer = %name, nodes = scene.len(), "Scene built");

    if args.json {
        let mut output = summary;
        output["scene"] = json!({
            "nodes": scene.len(),
            "meshes": scene.mesh_count(),
            "resources": scene.resources(),
        });
        output["features"] = json!(features);
        return common::print_json(&output);
    }

    heading(&format!("GML layer '{}'", name));
    field("Source", &args.source);
    field("Version", &version);
    field("Source SRS", &source_srs);
    field("Target CRS", &loader.options().target_crs);
    field("Origin", format!("{:.3}, {:.3}, {:.3}", origin.x, origin.y, origin.z));
    field("Features", report.features);
    field("Solids", report.solids);
    field("Lines", report.lines);
    field("Points", report.points);
    field("Non-visual", report.non_visual);
    field("Skipped", report.skipped);
    field("Scene nodes", scene.len());
    Ok(())
}

fn summary_json(layer: &FeatureLayer, target_crs: &str) -> serde_json::Value {
    json!({
        "name": layer.name,
        "version": layer.version,
        "dialect": format!("{:?}", layer.dialect),
        "source_srs": layer.source_srs,
        "target_crs": target_crs,
        "origin": layer.origin,
        "report": layer.report,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use terralayer::crs::CrsRegistry;
    use terralayer::gml::GmlOptions;

    const DOC: &str = r#"<wfs:FeatureCollection xmlns:wfs="http://www.opengis.net/wfs"
        xmlns:gml="http://www.opengis.net/gml" xmlns:app="http://example.com/app">
      <gml:featureMember>
        <app:parcel gml:id="p1">
          <app:code>A-1</app:code>
          <app:geom>
            <gml:Polygon srsName="EPSG:25831">
              <gml:exterior><gml:LinearRing>
                <gml:posList>0 0 10 0 10 10 0 10 0 0</gml:posList>
              </gml:LinearRing></gml:exterior>
            </gml:Polygon>
          </app:geom>
        </app:parcel>
      </gml:featureMember>
    </wfs:FeatureCollection>"#;

    #[test]
    fn test_summary_json() {
        let loader = GmlLoader::new(
            Arc::new(CrsRegistry::with_defaults()),
            GmlOptions::new().with_layer_name("parcels"),
        );
        let layer = loader.load_str(DOC).unwrap();
        let summary = summary_json(&layer, "EPSG:25831");

        assert_eq!(summary["name"], "parcels");
        assert_eq!(summary["source_srs"], "EPSG:25831");
        assert_eq!(summary["report"]["features"], 1);
        assert_eq!(summary["report"]["solids"], 1);
    }

    #[tokio::test]
    async fn test_run_from_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("parcels.gml");
        std::fs::write(&path, DOC).unwrap();

        let args = GmlArgs {
            source: path.display().to_string(),
            srs: None,
            height: Some(5.0),
            origin: None,
            target_crs: None,
            name: None,
            user: None,
            password: None,
            json: true,
        };
        run(args, &ConfigFile::default()).await.unwrap();
    }
}
