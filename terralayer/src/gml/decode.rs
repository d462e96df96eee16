//! Geometry decoding.
//!
//! Handles `pos`, `posList` (with `srsDimension`), `Curve` segments,
//! `Surface` patches and the multi-geometry member forms. GML 2 encodings
//! (`coordinates`, `coord`, `outerBoundaryIs`/`innerBoundaryIs`) are only
//! accepted when `legacy` is set.

use glam::DVec3;
use roxmltree::Node;
use thiserror::Error;

use super::feature::{FeatureGeometry, PolygonCoords};

/// Why one geometry could not be decoded.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DecodeError {
    #[error("unsupported geometry element '{0}'")]
    Unsupported(String),

    #[error("no coordinates in '{0}'")]
    MissingCoordinates(String),

    #[error("invalid number '{0}'")]
    InvalidNumber(String),

    #[error("coordinate count {count} is not a multiple of dimension {dimension}")]
    Dimension { count: usize, dimension: usize },
}

type Result<T> = std::result::Result<T, DecodeError>;

fn local<'a, 'input: 'a>(node: Node<'a, 'input>) -> &'a str {
    node.tag_name().name()
}

fn child_elements<'a, 'input>(node: Node<'a, 'input>) -> impl Iterator<Item = Node<'a, 'input>> {
    node.children().filter(|n| n.is_element())
}

fn children_named<'a, 'input>(
    node: Node<'a, 'input>,
    names: &'static [&'static str],
) -> impl Iterator<Item = Node<'a, 'input>> {
    child_elements(node).filter(move |n| names.contains(&local(*n)))
}

/// Decodes the geometry rooted at `node`.
pub fn decode_geometry(node: Node, legacy: bool) -> Result<FeatureGeometry> {
    let decoder = Decoder { legacy };
    match local(node) {
        "Point" => decoder.point(node).map(FeatureGeometry::Point),
        "LineString" => decoder.positions(node).map(FeatureGeometry::LineString),
        "Curve" => decoder.curve(node).map(FeatureGeometry::LineString),
        "Polygon" => decoder.polygon(node).map(FeatureGeometry::Polygon),
        "Surface" => {
            let mut polygons = decoder.surface(node)?;
            if polygons.len() == 1 {
                Ok(FeatureGeometry::Polygon(polygons.remove(0)))
            } else {
                Ok(FeatureGeometry::MultiPolygon(polygons))
            }
        }
        "MultiPoint" => {
            let points = members(node, &["pointMember", "pointMembers"])
                .map(|p| decoder.point(p))
                .collect::<Result<Vec<_>>>()?;
            Ok(FeatureGeometry::MultiPoint(points))
        }
        "MultiLineString" | "MultiCurve" => {
            let lines = members(
                node,
                &["lineStringMember", "curveMember", "curveMembers"],
            )
            .map(|l| decoder.line(l))
            .collect::<Result<Vec<_>>>()?;
            Ok(FeatureGeometry::MultiLineString(lines))
        }
        "MultiPolygon" | "MultiSurface" => {
            let mut polygons = Vec::new();
            for member in members(
                node,
                &["polygonMember", "surfaceMember", "surfaceMembers"],
            ) {
                polygons.extend(decoder.surface_or_polygon(member)?);
            }
            Ok(FeatureGeometry::MultiPolygon(polygons))
        }
        other => Err(DecodeError::Unsupported(other.to_string())),
    }
}

/// Geometries wrapped by member elements of `node`.
fn members<'a, 'input>(
    node: Node<'a, 'input>,
    names: &'static [&'static str],
) -> impl Iterator<Item = Node<'a, 'input>> {
    children_named(node, names).flat_map(child_elements)
}

struct Decoder {
    legacy: bool,
}

impl Decoder {
    fn point(&self, node: Node) -> Result<DVec3> {
        if local(node) != "Point" {
            return Err(DecodeError::Unsupported(local(node).to_string()));
        }
        self.positions(node)?
            .into_iter()
            .next()
            .ok_or_else(|| DecodeError::MissingCoordinates("Point".to_string()))
    }

    fn line(&self, node: Node) -> Result<Vec<DVec3>> {
        match local(node) {
            "LineString" => self.positions(node),
            "Curve" => self.curve(node),
            other => Err(DecodeError::Unsupported(other.to_string())),
        }
    }

    /// Concatenated segments, dropping the shared point between segments.
    fn curve(&self, node: Node) -> Result<Vec<DVec3>> {
        let mut out: Vec<DVec3> = Vec::new();
        for segments in children_named(node, &["segments"]) {
            for segment in child_elements(segments) {
                let points = self.positions(segment)?;
                let skip = usize::from(!out.is_empty() && out.last() == points.first());
                out.extend(points.into_iter().skip(skip));
            }
        }
        if out.is_empty() {
            return Err(DecodeError::MissingCoordinates("Curve".to_string()));
        }
        Ok(out)
    }

    fn polygon(&self, node: Node) -> Result<PolygonCoords> {
        let exterior_names: &'static [&'static str] = if self.legacy {
            &["exterior", "outerBoundaryIs"]
        } else {
            &["exterior"]
        };
        let interior_names: &'static [&'static str] = if self.legacy {
            &["interior", "innerBoundaryIs"]
        } else {
            &["interior"]
        };

        let exterior = members(node, exterior_names)
            .next()
            .ok_or_else(|| DecodeError::MissingCoordinates(format!("{} exterior", local(node))))?;
        let exterior = self.ring(exterior)?;

        let interiors = members(node, interior_names)
            .map(|r| self.ring(r))
            .collect::<Result<Vec<_>>>()?;

        Ok(PolygonCoords {
            exterior,
            interiors,
        })
    }

    fn ring(&self, node: Node) -> Result<Vec<DVec3>> {
        match local(node) {
            "LinearRing" => self.positions(node),
            "Ring" => {
                let mut out: Vec<DVec3> = Vec::new();
                for curve in members(node, &["curveMember"]) {
                    let points = self.line(curve)?;
                    let skip = usize::from(!out.is_empty() && out.last() == points.first());
                    out.extend(points.into_iter().skip(skip));
                }
                Ok(out)
            }
            other => Err(DecodeError::Unsupported(other.to_string())),
        }
    }

    fn surface(&self, node: Node) -> Result<Vec<PolygonCoords>> {
        let polygons = children_named(node, &["patches"])
            .flat_map(child_elements)
            .filter(|p| matches!(local(*p), "PolygonPatch" | "Polygon"))
            .map(|p| self.polygon(p))
            .collect::<Result<Vec<_>>>()?;
        if polygons.is_empty() {
            return Err(DecodeError::MissingCoordinates("Surface".to_string()));
        }
        Ok(polygons)
    }

    fn surface_or_polygon(&self, node: Node) -> Result<Vec<PolygonCoords>> {
        match local(node) {
            "Polygon" => Ok(vec![self.polygon(node)?]),
            "Surface" => self.surface(node),
            other => Err(DecodeError::Unsupported(other.to_string())),
        }
    }

    /// Positions directly under a point-list element.
    fn positions(&self, node: Node) -> Result<Vec<DVec3>> {
        if let Some(list) = children_named(node, &["posList"]).next() {
            return parse_pos_list(text(list), dimension(list));
        }
        if self.legacy {
            if let Some(coords) = children_named(node, &["coordinates"]).next() {
                return parse_coordinates(coords);
            }
        }

        let mut out = Vec::new();
        for child in child_elements(node) {
            match local(child) {
                "pos" => out.push(parse_pos(text(child))?),
                "pointProperty" | "pointRep" => {
                    for point in children_named(child, &["Point"]) {
                        out.extend(self.positions(point)?);
                    }
                }
                "coord" if self.legacy => out.push(parse_coord(child)?),
                _ => {}
            }
        }
        if out.is_empty() {
            return Err(DecodeError::MissingCoordinates(local(node).to_string()));
        }
        Ok(out)
    }
}

fn text<'a>(node: Node<'a, '_>) -> &'a str {
    node.text().unwrap_or("")
}

/// `srsDimension` (or GML 3.0 `dimension`) on the element or an ancestor.
fn dimension(node: Node) -> usize {
    node.ancestors()
        .filter(|n| n.is_element())
        .find_map(|n| n.attribute("srsDimension").or_else(|| n.attribute("dimension")))
        .and_then(|d| d.trim().parse::<usize>().ok())
        .filter(|d| *d >= 2)
        .unwrap_or(2)
}

fn number(raw: &str) -> Result<f64> {
    raw.trim()
        .parse::<f64>()
        .map_err(|_| DecodeError::InvalidNumber(raw.to_string()))
}

fn tuple(values: &[f64]) -> DVec3 {
    DVec3::new(values[0], values[1], values.get(2).copied().unwrap_or(0.0))
}

fn parse_pos(raw: &str) -> Result<DVec3> {
    let values = raw
        .split_whitespace()
        .map(number)
        .collect::<Result<Vec<_>>>()?;
    if values.len() < 2 {
        return Err(DecodeError::Dimension {
            count: values.len(),
            dimension: 2,
        });
    }
    Ok(tuple(&values))
}

fn parse_pos_list(raw: &str, dimension: usize) -> Result<Vec<DVec3>> {
    let values = raw
        .split_whitespace()
        .map(number)
        .collect::<Result<Vec<_>>>()?;
    if values.len() % dimension != 0 {
        return Err(DecodeError::Dimension {
            count: values.len(),
            dimension,
        });
    }
    Ok(values.chunks_exact(dimension).map(tuple).collect())
}

/// GML 2 `coordinates` with `cs`, `ts` and `decimal` separators.
fn parse_coordinates(node: Node) -> Result<Vec<DVec3>> {
    let cs = node.attribute("cs").unwrap_or(",");
    let ts = node.attribute("ts").unwrap_or(" ");
    let decimal = node.attribute("decimal").unwrap_or(".");

    let raw = text(node).trim();
    let tuples: Vec<&str> = if ts.trim().is_empty() {
        raw.split_whitespace().collect()
    } else {
        raw.split(ts).map(str::trim).filter(|t| !t.is_empty()).collect()
    };

    let mut out = Vec::with_capacity(tuples.len());
    for t in tuples {
        let values = t
            .split(cs)
            .map(|v| {
                if decimal == "." {
                    number(v)
                } else {
                    number(&v.replace(decimal, "."))
                }
            })
            .collect::<Result<Vec<_>>>()?;
        if values.len() < 2 {
            return Err(DecodeError::Dimension {
                count: values.len(),
                dimension: 2,
            });
        }
        out.push(tuple(&values));
    }
    if out.is_empty() {
        return Err(DecodeError::MissingCoordinates("coordinates".to_string()));
    }
    Ok(out)
}

/// GML 2 `<coord><X/><Y/>[<Z/>]</coord>`.
fn parse_coord(node: Node) -> Result<DVec3> {
    let axis = |name: &'static [&'static str]| -> Result<Option<f64>> {
        children_named(node, name)
            .next()
            .map(|n| number(text(n)))
            .transpose()
    };
    let x = axis(&["X"])?.ok_or_else(|| DecodeError::MissingCoordinates("coord X".to_string()))?;
    let y = axis(&["Y"])?.ok_or_else(|| DecodeError::MissingCoordinates("coord Y".to_string()))?;
    let z = axis(&["Z"])?.unwrap_or(0.0);
    Ok(DVec3::new(x, y, z))
}

#[cfg(test)]
mod tests {
    use super::*;
    use roxmltree::Document;

    fn decode(xml: &str, legacy: bool) -> Result<FeatureGeometry> {
        let wrapped = format!(
            r#"<w xmlns:gml="http://www.opengis.net/gml">{}</w>"#,
            xml
        );
        let doc = Document::parse(&wrapped).unwrap();
        let node = doc.root_element().first_element_child().unwrap();
        decode_geometry(node, legacy)
    }

    #[test]
    fn test_point_pos() {
        let g = decode("<gml:Point><gml:pos>1.5 2.5</gml:pos></gml:Point>", false).unwrap();
        assert_eq!(g, FeatureGeometry::Point(DVec3::new(1.5, 2.5, 0.0)));
    }

    #[test]
    fn test_pos_list_3d() {
        let g = decode(
            r#"<gml:LineString srsDimension="3"><gml:posList>0 0 1 10 0 2</gml:posList></gml:LineString>"#,
            false,
        )
        .unwrap();
        assert_eq!(
            g,
            FeatureGeometry::LineString(vec![DVec3::new(0.0, 0.0, 1.0), DVec3::new(10.0, 0.0, 2.0)])
        );
    }

    #[test]
    fn test_pos_list_dimension_mismatch() {
        let err = decode(
            "<gml:LineString><gml:posList>0 0 1</gml:posList></gml:LineString>",
            false,
        )
        .unwrap_err();
        assert_eq!(err, DecodeError::Dimension { count: 3, dimension: 2 });
    }

    #[test]
    fn test_polygon_with_hole() {
        let g = decode(
            r#"<gml:Polygon>
                <gml:exterior><gml:LinearRing><gml:posList>0 0 10 0 10 10 0 10 0 0</gml:posList></gml:LinearRing></gml:exterior>
                <gml:interior><gml:LinearRing><gml:posList>2 2 4 2 4 4 2 2</gml:posList></gml:LinearRing></gml:interior>
            </gml:Polygon>"#,
            false,
        )
        .unwrap();
        match g {
            FeatureGeometry::Polygon(p) => {
                assert_eq!(p.exterior.len(), 5);
                assert_eq!(p.interiors.len(), 1);
                assert_eq!(p.interiors[0].len(), 4);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_legacy_gml2_polygon() {
        let xml = r#"<gml:Polygon>
            <gml:outerBoundaryIs><gml:LinearRing>
              <gml:coordinates decimal="," cs=";" ts=" ">0,5;0 10;0 10;10 0;0</gml:coordinates>
            </gml:LinearRing></gml:outerBoundaryIs>
        </gml:Polygon>"#;

        match decode(xml, true).unwrap() {
            FeatureGeometry::Polygon(p) => {
                assert_eq!(p.exterior[0], DVec3::new(0.5, 0.0, 0.0));
                assert_eq!(p.exterior.len(), 4);
            }
            other => panic!("unexpected {:?}", other),
        }
        assert!(decode(xml, false).is_err(), "GML 3.2 has no outerBoundaryIs");
    }

    #[test]
    fn test_legacy_coord() {
        let g = decode(
            "<gml:Point><gml:coord><gml:X>1</gml:X><gml:Y>2</gml:Y></gml:coord></gml:Point>",
            true,
        )
        .unwrap();
        assert_eq!(g, FeatureGeometry::Point(DVec3::new(1.0, 2.0, 0.0)));
    }

    #[test]
    fn test_multi_surface_members() {
        let ring = "<gml:exterior><gml:LinearRing><gml:posList>0 0 1 0 1 1 0 0</gml:posList></gml:LinearRing></gml:exterior>";
        let xml = format!(
            "<gml:MultiSurface>\
               <gml:surfaceMember><gml:Polygon>{r}</gml:Polygon></gml:surfaceMember>\
               <gml:surfaceMembers><gml:Polygon>{r}</gml:Polygon><gml:Polygon>{r}</gml:Polygon></gml:surfaceMembers>\
             </gml:MultiSurface>",
            r = ring
        );
        match decode(&xml, false).unwrap() {
            FeatureGeometry::MultiPolygon(polys) => assert_eq!(polys.len(), 3),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_curve_segments_joined() {
        let g = decode(
            "<gml:Curve><gml:segments>\
               <gml:LineStringSegment><gml:posList>0 0 1 0</gml:posList></gml:LineStringSegment>\
               <gml:LineStringSegment><gml:posList>1 0 2 0</gml:posList></gml:LineStringSegment>\
             </gml:segments></gml:Curve>",
            false,
        )
        .unwrap();
        match g {
            FeatureGeometry::LineString(points) => assert_eq!(points.len(), 3),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_multi_point() {
        let g = decode(
            "<gml:MultiPoint>\
               <gml:pointMember><gml:Point><gml:pos>1 1</gml:pos></gml:Point></gml:pointMember>\
               <gml:pointMember><gml:Point><gml:pos>2 2</gml:pos></gml:Point></gml:pointMember>\
             </gml:MultiPoint>",
            false,
        )
        .unwrap();
        assert_eq!(
            g,
            FeatureGeometry::MultiPoint(vec![DVec3::new(1.0, 1.0, 0.0), DVec3::new(2.0, 2.0, 0.0)])
        );
    }

    #[test]
    fn test_unsupported_and_invalid() {
        assert!(matches!(
            decode("<gml:Envelope/>", false),
            Err(DecodeError::Unsupported(_))
        ));
        assert!(matches!(
            decode("<gml:Point><gml:pos>a b</gml:pos></gml:Point>", false),
            Err(DecodeError::InvalidNumber(_))
        ));
        assert!(matches!(
            decode("<gml:Point/>", false),
            Err(DecodeError::MissingCoordinates(_))
        ));
    }
}
