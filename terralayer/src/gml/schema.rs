//! Document-level detection: version, feature schema and SRS.

use roxmltree::{Document, Node};

use super::error::GmlError;

/// Version assumed when neither the root nor the feature collection
/// declares one.
pub const DEFAULT_VERSION: &str = "3.1.1";

/// Element names that start a geometry.
pub const GEOMETRY_ELEMENTS: &[&str] = &[
    "Point",
    "Polygon",
    "LineString",
    "MultiPoint",
    "MultiPolygon",
    "MultiLineString",
    "MultiSurface",
    "MultiCurve",
    "Surface",
    "Curve",
];

/// Conventional names of geometry properties.
const GEOMETRY_PROPERTY_NAMES: &[&str] = &["geom", "geometry"];

const MEMBER_ELEMENTS: &[&str] = &["member", "featureMember", "featureMembers"];

/// Feature type and geometry field of a document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeatureSchema {
    /// Local name of the member wrapper (`featureMember`, ...).
    pub member_tag: String,
    /// Local name of the feature element.
    pub feature_type: String,
    pub feature_ns: Option<String>,
    /// Local name of the property element holding the geometry.
    pub geometry_name: String,
}

impl FeatureSchema {
    /// Whether `node` is a feature of this schema.
    pub fn matches(&self, node: Node) -> bool {
        node.is_element()
            && node.tag_name().name() == self.feature_type
            && node.tag_name().namespace() == self.feature_ns.as_deref()
    }
}

pub fn is_geometry_element(node: Node) -> bool {
    node.is_element() && GEOMETRY_ELEMENTS.contains(&node.tag_name().name())
}

fn is_member(node: Node) -> bool {
    node.is_element() && MEMBER_ELEMENTS.contains(&node.tag_name().name())
}

/// Declared GML version: the root's `version` attribute, else the first
/// `FeatureCollection`'s, else [`DEFAULT_VERSION`].
pub fn detect_version(doc: &Document) -> String {
    if let Some(version) = doc.root_element().attribute("version") {
        return version.to_string();
    }
    doc.descendants()
        .filter(|n| n.is_element() && n.tag_name().name() == "FeatureCollection")
        .find_map(|n| n.attribute("version"))
        .unwrap_or(DEFAULT_VERSION)
        .to_string()
}

/// Detects the feature schema from the first feature member.
///
/// The geometry field is the parent of the first geometry element found
/// under the member's features. A `geom` or `geometry` element is itself
/// the property, so its own name is the field.
pub fn detect_schema(doc: &Document) -> Result<FeatureSchema, GmlError> {
    let member = doc
        .descendants()
        .find(|n| is_member(*n))
        .ok_or_else(|| GmlError::SchemaDetection("no feature member element".to_string()))?;

    let feature = member
        .children()
        .find(|n| n.is_element())
        .ok_or_else(|| GmlError::SchemaDetection("feature member is empty".to_string()))?;

    let geometry_name = member
        .children()
        .filter(|n| n.is_element())
        .find_map(|feature| {
            feature.descendants().skip(1).find_map(|n| {
                if !n.is_element() {
                    return None;
                }
                let name = n.tag_name().name();
                if GEOMETRY_PROPERTY_NAMES.contains(&name) {
                    Some(name.to_string())
                } else if GEOMETRY_ELEMENTS.contains(&name) {
                    n.parent_element().map(|p| p.tag_name().name().to_string())
                } else {
                    None
                }
            })
        })
        .ok_or_else(|| {
            GmlError::SchemaDetection(format!(
                "no geometry field in feature type '{}'",
                feature.tag_name().name()
            ))
        })?;

    Ok(FeatureSchema {
        member_tag: member.tag_name().name().to_string(),
        feature_type: feature.tag_name().name().to_string(),
        feature_ns: feature.tag_name().namespace().map(str::to_string),
        geometry_name,
    })
}

/// The first `srsName` attribute in document order, verbatim.
pub fn detect_srs<'a>(doc: &'a Document) -> Option<&'a str> {
    doc.descendants()
        .filter(|n| n.is_element())
        .find_map(|n| n.attribute("srsName"))
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

/// Feature elements of `schema`, in document order.
///
/// `featureMember`/`member` wrap one feature each; `featureMembers` wraps
/// many.
pub fn feature_elements<'a, 'input>(
    doc: &'a Document<'input>,
    schema: &'a FeatureSchema,
) -> impl Iterator<Item = Node<'a, 'input>> + 'a {
    doc.descendants()
        .filter(|n| is_member(*n))
        .flat_map(|member| member.children().filter(|n| n.is_element()))
        .filter(move |n| schema.matches(*n))
}

#[cfg(test)]
mod tests {
    use super::*;

    const WFS: &str = r#"<?xml version="1.0"?>
<wfs:FeatureCollection xmlns:wfs="http://www.opengis.net/wfs"
    xmlns:gml="http://www.opengis.net/gml" xmlns:app="http://example.com/app">
  <gml:featureMember>
    <app:building gml:id="b1">
      <app:name>Town hall</app:name>
      <app:the_geom>
        <gml:Polygon srsName="urn:ogc:def:crs:EPSG::25831">
          <gml:exterior><gml:LinearRing>
            <gml:posList>0 0 10 0 10 10 0 0</gml:posList>
          </gml:LinearRing></gml:exterior>
        </gml:Polygon>
      </app:the_geom>
    </app:building>
  </gml:featureMember>
</wfs:FeatureCollection>"#;

    #[test]
    fn test_detect_schema() {
        let doc = Document::parse(WFS).unwrap();
        let schema = detect_schema(&doc).unwrap();

        assert_eq!(schema.member_tag, "featureMember");
        assert_eq!(schema.feature_type, "building");
        assert_eq!(schema.feature_ns.as_deref(), Some("http://example.com/app"));
        assert_eq!(schema.geometry_name, "the_geom");
        assert_eq!(feature_elements(&doc, &schema).count(), 1);
    }

    #[test]
    fn test_detect_schema_geom_property() {
        let xml = r#"<c xmlns:gml="http://www.opengis.net/gml"><gml:member><f>
            <geom><gml:Point><gml:pos>1 2</gml:pos></gml:Point></geom></f></gml:member></c>"#;
        let doc = Document::parse(xml).unwrap();
        assert_eq!(detect_schema(&doc).unwrap().geometry_name, "geom");
    }

    #[test]
    fn test_detect_schema_failures() {
        let doc = Document::parse("<root><a/></root>").unwrap();
        assert!(matches!(detect_schema(&doc), Err(GmlError::SchemaDetection(_))));

        let doc = Document::parse("<root><featureMember><f><name>x</name></f></featureMember></root>")
            .unwrap();
        assert!(matches!(detect_schema(&doc), Err(GmlError::SchemaDetection(_))));
    }

    #[test]
    fn test_detect_version() {
        let doc = Document::parse(WFS).unwrap();
        assert_eq!(detect_version(&doc), DEFAULT_VERSION);

        let doc = Document::parse(r#"<root version="3.2.1"/>"#).unwrap();
        assert_eq!(detect_version(&doc), "3.2.1");

        let doc = Document::parse(
            r#"<root><x:FeatureCollection xmlns:x="urn:x" version="3.2"/></root>"#,
        )
        .unwrap();
        assert_eq!(detect_version(&doc), "3.2");
    }

    #[test]
    fn test_detect_srs_first_in_document_order() {
        let doc = Document::parse(WFS).unwrap();
        assert_eq!(detect_srs(&doc), Some("urn:ogc:def:crs:EPSG::25831"));

        let doc = Document::parse("<root/>").unwrap();
        assert_eq!(detect_srs(&doc), None);
    }
}
