//! GML dialects and feature reading.

use std::collections::BTreeMap;
use std::fmt;

use roxmltree::{Document, Node};
use tracing::{debug, warn};

use super::decode::decode_geometry;
use super::feature::VectorFeature;
use super::schema::{feature_elements, is_geometry_element, FeatureSchema};

const GML_NAMESPACE_PREFIX: &str = "http://www.opengis.net/gml";

/// Feature id used when a feature carries none.
pub const DEFAULT_FEATURE_ID: &str = "feature";

/// Supported GML dialects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GmlDialect {
    /// GML 3.1, also accepting GML 2 encodings.
    Gml3,
    /// GML 3.2.
    Gml32,
}

impl GmlDialect {
    /// Dialect for a declared version; `3.2*` selects GML 3.2.
    pub fn from_version(version: &str) -> Self {
        if version.trim().starts_with("3.2") {
            GmlDialect::Gml32
        } else {
            GmlDialect::Gml3
        }
    }

    /// Whether GML 2 encodings (`coordinates`, `outerBoundaryIs`, `fid`)
    /// are understood.
    pub fn accepts_legacy(&self) -> bool {
        matches!(self, GmlDialect::Gml3)
    }
}

impl fmt::Display for GmlDialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GmlDialect::Gml3 => write!(f, "GML 3"),
            GmlDialect::Gml32 => write!(f, "GML 3.2"),
        }
    }
}

/// Inputs of a feature read.
#[derive(Debug, Clone)]
pub struct ReadOptions {
    pub schema: FeatureSchema,
}

/// Reads features out of a parsed document.
pub trait FeatureReader {
    /// Features in document order, with geometries in source coordinates.
    ///
    /// A feature whose geometry cannot be decoded is dropped with a warning;
    /// the rest of the document is still read.
    fn read_features(&self, document: &Document, options: &ReadOptions) -> Vec<VectorFeature>;
}

impl FeatureReader for GmlDialect {
    fn read_features(&self, document: &Document, options: &ReadOptions) -> Vec<VectorFeature> {
        let schema = &options.schema;
        let mut features = Vec::new();

        for element in feature_elements(document, schema) {
            let id = self.feature_id(element);

            let geometry_node = element
                .children()
                .filter(|n| n.is_element())
                .find(|n| n.tag_name().name() == schema.geometry_name)
                .and_then(|property| geometry_of(property));

            let geometry = match geometry_node {
                Some(node) => match decode_geometry(node, self.accepts_legacy()) {
                    Ok(g) => Some(g),
                    Err(e) => {
                        warn!(feature = %id, error = %e, "Skipping feature with undecodable geometry");
                        continue;
                    }
                },
                None => None,
            };

            let mut properties = BTreeMap::new();
            for child in element.children().filter(|n| n.is_element()) {
                let name = child.tag_name().name();
                if name == schema.geometry_name || name == "boundedBy" {
                    continue;
                }
                collect_properties(child, name.to_string(), &mut properties);
            }

            debug!(
                feature = %id,
                geometry = geometry.as_ref().map(|g| g.type_name()).unwrap_or("none"),
                properties = properties.len(),
                "Read feature"
            );
            features.push(VectorFeature {
                id,
                feature_type: schema.feature_type.clone(),
                geometry,
                properties,
            });
        }

        features
    }
}

impl GmlDialect {
    fn feature_id(&self, element: Node) -> String {
        let gml_id = element
            .attributes()
            .find(|a| {
                a.name() == "id"
                    && a.namespace()
                        .is_some_and(|ns| ns.starts_with(GML_NAMESPACE_PREFIX))
            })
            .map(|a| a.value());
        let fid = if self.accepts_legacy() {
            element.attribute("fid")
        } else {
            None
        };
        gml_id
            .or(fid)
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .unwrap_or(DEFAULT_FEATURE_ID)
            .to_string()
    }
}

/// The geometry element inside a geometry property.
fn geometry_of<'a, 'input>(property: Node<'a, 'input>) -> Option<Node<'a, 'input>> {
    if is_geometry_element(property) {
        return Some(property);
    }
    property.children().find(|n| n.is_element())
}

/// Adds `node` as a text property, or flattens its children as
/// `prefix.child`. Subtrees holding a geometry are skipped.
fn collect_properties(node: Node, prefix: String, out: &mut BTreeMap<String, String>) {
    let mut children = node.children().filter(|n| n.is_element()).peekable();
    if children.peek().is_none() {
        let text: String = node
            .descendants()
            .filter(|n| n.is_text())
            .filter_map(|n| n.text())
            .collect();
        out.insert(prefix, text.trim().to_string());
        return;
    }
    if node.descendants().any(is_geometry_element) {
        return;
    }
    for child in children {
        let key = format!("{}.{}", prefix, child.tag_name().name());
        collect_properties(child, key, out);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gml::feature::FeatureGeometry;
    use crate::gml::schema::detect_schema;

    fn read(xml: &str, dialect: GmlDialect) -> Vec<VectorFeature> {
        let doc = Document::parse(xml).unwrap();
        let schema = detect_schema(&doc).unwrap();
        dialect.read_features(&doc, &ReadOptions { schema })
    }

    const GML31: &str = r#"<wfs:FeatureCollection xmlns:wfs="http://www.opengis.net/wfs"
        xmlns:gml="http://www.opengis.net/gml" xmlns:app="urn:app">
      <gml:featureMember>
        <app:parcel gml:id="p1">
          <gml:boundedBy><gml:Envelope><gml:lowerCorner>0 0</gml:lowerCorner></gml:Envelope></gml:boundedBy>
          <app:ref>A-12</app:ref>
          <app:owner><app:name>Ajuntament</app:name><app:kind>public</app:kind></app:owner>
          <app:geom><gml:Point><gml:pos>1 2</gml:pos></gml:Point></app:geom>
        </app:parcel>
      </gml:featureMember>
      <gml:featureMember>
        <app:parcel fid="p2"><app:ref>B-7</app:ref></app:parcel>
      </gml:featureMember>
      <gml:featureMember>
        <app:parcel><app:geom><gml:Point><gml:pos>x y</gml:pos></gml:Point></app:geom></app:parcel>
      </gml:featureMember>
      <gml:featureMember>
        <app:road gml:id="r1"><app:geom><gml:Point><gml:pos>1 2</gml:pos></gml:Point></app:geom></app:road>
      </gml:featureMember>
    </wfs:FeatureCollection>"#;

    #[test]
    fn test_reads_properties_and_geometry() {
        let features = read(GML31, GmlDialect::Gml3);
        assert_eq!(features.len(), 2, "bad geometry dropped, other type ignored");

        let first = &features[0];
        assert_eq!(first.id, "p1");
        assert!(matches!(first.geometry, Some(FeatureGeometry::Point(_))));
        assert_eq!(first.properties.get("ref").map(String::as_str), Some("A-12"));
        assert_eq!(
            first.properties.get("owner.name").map(String::as_str),
            Some("Ajuntament")
        );
        assert!(!first.properties.contains_key("geom"));
        assert!(!first.properties.contains_key("boundedBy"));
    }

    #[test]
    fn test_feature_without_geometry() {
        let features = read(GML31, GmlDialect::Gml3);
        assert_eq!(features[1].id, "p2");
        assert!(features[1].geometry.is_none());
    }

    #[test]
    fn test_fid_is_legacy_only() {
        let features = read(GML31, GmlDialect::Gml32);
        assert_eq!(features[1].id, DEFAULT_FEATURE_ID);
    }

    #[test]
    fn test_gml32_id_and_members() {
        let xml = r#"<wfs:FeatureCollection xmlns:wfs="http://www.opengis.net/wfs/2.0"
            xmlns:gml="http://www.opengis.net/gml/3.2" xmlns:app="urn:app">
          <wfs:member><app:tree gml:id="t1"><app:shape><gml:Point><gml:pos>5 6</gml:pos></gml:Point></app:shape></app:tree></wfs:member>
          <wfs:member><app:tree gml:id="t2"><app:shape><gml:Point><gml:pos>7 8</gml:pos></gml:Point></app:shape></app:tree></wfs:member>
        </wfs:FeatureCollection>"#;
        let features = read(xml, GmlDialect::Gml32);
        let ids: Vec<&str> = features.iter().map(|f| f.id.as_str()).collect();
        assert_eq!(ids, vec!["t1", "t2"]);
    }

    #[test]
    fn test_feature_members_wrapper() {
        let xml = r#"<c xmlns:gml="http://www.opengis.net/gml"><gml:featureMembers>
            <f gml:id="a"><g><gml:Point><gml:pos>0 0</gml:pos></gml:Point></g></f>
            <f gml:id="b"><g><gml:Point><gml:pos>1 1</gml:pos></gml:Point></g></f>
        </gml:featureMembers></c>"#;
        assert_eq!(read(xml, GmlDialect::Gml3).len(), 2);
    }

    #[test]
    fn test_dialect_from_version() {
        assert_eq!(GmlDialect::from_version("3.2.1"), GmlDialect::Gml32);
        assert_eq!(GmlDialect::from_version("3.1.1"), GmlDialect::Gml3);
        assert_eq!(GmlDialect::from_version("2.1.2"), GmlDialect::Gml3);
    }
}
