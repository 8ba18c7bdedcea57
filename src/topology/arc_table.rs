use crate::error::{MergeError, Result};
use geo_types::{Coord, Geometry, Line, LineString, Polygon};
use smallvec::SmallVec;
use std::collections::HashMap;

/// Index into the arc arena.
pub type ArcId = usize;

/// Signed reference to an arc. A non-negative value traverses the arc
/// forward; a negative value `r` traverses arc `-r - 1` in reverse, which
/// keeps arc zero unambiguous.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ArcRef(i64);

impl ArcRef {
    pub fn forward(id: ArcId) -> Self {
        ArcRef(id as i64)
    }

    pub fn reverse(id: ArcId) -> Self {
        ArcRef(-(id as i64) - 1)
    }

    /// Absolute arc index, direction ignored.
    pub fn arc(self) -> ArcId {
        if self.0 < 0 {
            (-self.0 - 1) as usize
        } else {
            self.0 as usize
        }
    }

    pub fn is_reversed(self) -> bool {
        self.0 < 0
    }
}

// Wrapper for Coord to be Hashable (since f64 is not Hash).
// Exact mode keys on the bit pattern; quantized mode buckets coordinates by
// the configured precision so near-equal inputs land on the same node.
#[derive(PartialEq, Eq, Hash, PartialOrd, Ord, Clone, Copy, Debug)]
pub struct PointKey(i64, i64);

impl PointKey {
    pub fn of(c: Coord<f64>, precision: Option<f64>) -> Self {
        match precision {
            Some(p) => PointKey((c.x / p).round() as i64, (c.y / p).round() as i64),
            None => PointKey(c.x.to_bits() as i64, c.y.to_bits() as i64),
        }
    }
}

/// Direction-independent arc identity: the endpoint keys in sorted order.
#[derive(PartialEq, Eq, Hash, Clone, Copy, Debug)]
struct ArcKey(PointKey, PointKey);

impl ArcKey {
    fn new(a: PointKey, b: PointKey) -> Self {
        if a <= b {
            ArcKey(a, b)
        } else {
            ArcKey(b, a)
        }
    }
}

/// One ring re-expressed as signed arc references.
#[derive(Clone, Debug, Default)]
pub struct ArcRing(pub SmallVec<[ArcRef; 8]>);

#[derive(Clone, Debug)]
pub struct ArcPolygon {
    pub exterior: ArcRing,
    pub interiors: Vec<ArcRing>,
}

impl ArcPolygon {
    fn for_each_arc<F: FnMut(ArcRef)>(&self, f: &mut F) {
        for r in &self.exterior.0 {
            f(*r);
        }
        for ring in &self.interiors {
            for r in &ring.0 {
                f(*r);
            }
        }
    }
}

/// An input geometry re-expressed over the arc arena, ring and part
/// structure preserved.
#[derive(Clone, Debug)]
pub enum ArcGeometry {
    Polygon(ArcPolygon),
    MultiPolygon(Vec<ArcPolygon>),
}

impl ArcGeometry {
    /// Visits every signed arc reference, ring by ring, part by part.
    pub fn for_each_arc<F: FnMut(ArcRef)>(&self, mut f: F) {
        match self {
            ArcGeometry::Polygon(p) => p.for_each_arc(&mut f),
            ArcGeometry::MultiPolygon(parts) => {
                for p in parts {
                    p.for_each_arc(&mut f);
                }
            }
        }
    }
}

/// Shared-edge topology over a set of input geometries.
///
/// Arcs live in a flat, append-only arena and are referenced everywhere else
/// by stable integer index. Each arc is one deduplicated edge, stored in the
/// direction it was first seen; geometry index `i` here corresponds to input
/// geometry `i`, so the caller can map back for property carry-through.
#[derive(Debug)]
pub struct Topology {
    pub arcs: Vec<Line<f64>>,
    /// Input geometries re-expressed as arc references, in input order.
    pub geometries: Vec<ArcGeometry>,
    precision: Option<f64>,
    arc_index: HashMap<ArcKey, ArcId>,
}

impl Topology {
    /// Builds the shared-edge representation for a batch of Polygon /
    /// MultiPolygon geometries.
    ///
    /// Malformed input (unsupported type, open ring, ring with fewer than 4
    /// points, non-finite coordinate) fails the whole build with no partial
    /// arc table. An empty batch yields an empty topology.
    pub fn build(inputs: &[Geometry<f64>], precision: Option<f64>) -> Result<Self> {
        let mut topology = Topology {
            arcs: Vec::new(),
            geometries: Vec::with_capacity(inputs.len()),
            precision,
            arc_index: HashMap::new(),
        };

        for (i, geom) in inputs.iter().enumerate() {
            let encoded = match geom {
                Geometry::Polygon(p) => ArcGeometry::Polygon(topology.encode_polygon(i, p)?),
                Geometry::MultiPolygon(mp) => ArcGeometry::MultiPolygon(
                    mp.0
                        .iter()
                        .map(|p| topology.encode_polygon(i, p))
                        .collect::<Result<Vec<_>>>()?,
                ),
                other => {
                    return Err(MergeError::InvalidGeometry(format!(
                        "geometry {} has unsupported type {}",
                        i,
                        geometry_kind(other)
                    )))
                }
            };
            topology.geometries.push(encoded);
        }

        Ok(topology)
    }

    /// Arc id -> distinct geometry indices referencing the arc in either
    /// direction. Repeat references from one geometry collapse to a single
    /// entry, so a self-touching ring cannot union a geometry with itself.
    pub fn arc_adjacency(&self) -> Vec<Vec<usize>> {
        let mut adjacency = vec![Vec::new(); self.arcs.len()];
        for (i, geom) in self.geometries.iter().enumerate() {
            geom.for_each_arc(|r| {
                let list: &mut Vec<usize> = &mut adjacency[r.arc()];
                // A geometry's references are visited consecutively.
                if list.last() != Some(&i) {
                    list.push(i);
                }
            });
        }
        adjacency
    }

    /// Endpoint coordinates of a reference, oriented by its sign.
    pub fn arc_line(&self, r: ArcRef) -> Line<f64> {
        let line = self.arcs[r.arc()];
        if r.is_reversed() {
            Line::new(line.end, line.start)
        } else {
            line
        }
    }

    /// Canonical node key of a coordinate under this topology's precision.
    pub fn point_key(&self, c: Coord<f64>) -> PointKey {
        PointKey::of(c, self.precision)
    }

    fn encode_polygon(&mut self, index: usize, poly: &Polygon<f64>) -> Result<ArcPolygon> {
        let exterior = self.encode_ring(index, poly.exterior())?;
        let mut interiors = Vec::with_capacity(poly.interiors().len());
        for ring in poly.interiors() {
            interiors.push(self.encode_ring(index, ring)?);
        }
        Ok(ArcPolygon {
            exterior,
            interiors,
        })
    }

    fn encode_ring(&mut self, index: usize, ring: &LineString<f64>) -> Result<ArcRing> {
        validate_ring(index, ring)?;

        let mut refs: SmallVec<[ArcRef; 8]> = SmallVec::new();
        for pair in ring.0.windows(2) {
            let (a, b) = (pair[0], pair[1]);
            let ka = PointKey::of(a, self.precision);
            let kb = PointKey::of(b, self.precision);
            if ka == kb {
                continue; // Zero-length under the active key mode
            }

            let key = ArcKey::new(ka, kb);
            let id = match self.arc_index.get(&key) {
                Some(&id) => id,
                None => {
                    let id = self.arcs.len();
                    self.arcs.push(Line::new(a, b));
                    self.arc_index.insert(key, id);
                    refs.push(ArcRef::forward(id));
                    continue;
                }
            };

            // Existing arc: sign is relative to its stored direction.
            if PointKey::of(self.arcs[id].start, self.precision) == ka {
                refs.push(ArcRef::forward(id));
            } else {
                refs.push(ArcRef::reverse(id));
            }
        }

        Ok(ArcRing(refs))
    }
}

fn validate_ring(index: usize, ring: &LineString<f64>) -> Result<()> {
    let coords = &ring.0;
    if coords.len() < 4 {
        return Err(MergeError::InvalidGeometry(format!(
            "geometry {}: ring has {} points, a closed ring needs at least 4",
            index,
            coords.len()
        )));
    }
    if coords.first() != coords.last() {
        return Err(MergeError::InvalidGeometry(format!(
            "geometry {}: ring is not closed",
            index
        )));
    }
    if coords.iter().any(|c| !c.x.is_finite() || !c.y.is_finite()) {
        return Err(MergeError::InvalidGeometry(format!(
            "geometry {}: ring contains a non-finite coordinate",
            index
        )));
    }
    Ok(())
}

fn geometry_kind(geom: &Geometry<f64>) -> &'static str {
    match geom {
        Geometry::Point(_) => "Point",
        Geometry::Line(_) => "Line",
        Geometry::LineString(_) => "LineString",
        Geometry::Polygon(_) => "Polygon",
        Geometry::MultiPoint(_) => "MultiPoint",
        Geometry::MultiLineString(_) => "MultiLineString",
        Geometry::MultiPolygon(_) => "MultiPolygon",
        Geometry::GeometryCollection(_) => "GeometryCollection",
        Geometry::Rect(_) => "Rect",
        Geometry::Triangle(_) => "Triangle",
    }
}
