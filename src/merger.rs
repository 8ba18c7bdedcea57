use crate::error::{MergeError, Result};
use crate::topology::{ArcRef, PointKey, Topology};
use crate::union_find::UnionFind;
use geo::algorithm::contains::Contains;
use geo::algorithm::orient::{Direction, Orient};
use geo::bounding_rect::BoundingRect;
use geo::Area;
use geo_types::{Geometry, Line, LineString, MultiPolygon, Polygon};
use log::{debug, warn};
use rstar::{RTree, RTreeObject, AABB};
use std::collections::{BTreeMap, HashMap};

#[cfg(all(feature = "parallel", not(target_arch = "wasm32")))]
use rayon::prelude::*;

/// Properties carried by an output feature, in GeoJSON object form.
pub type Properties = geojson::JsonObject;

/// Derives the merged feature's properties from its member input indices.
pub type PropertyPolicy = Box<dyn Fn(&[usize]) -> Properties + Send + Sync>;

/// One dissolved feature: the merged geometry plus the inputs it covers.
#[derive(Clone, Debug)]
pub struct MergedFeature {
    /// Polygon, or MultiPolygon when the group dissolves into several
    /// disjoint pieces.
    pub geometry: Geometry<f64>,
    pub properties: Properties,
    /// Input geometry indices of this component, ascending.
    pub members: Vec<usize>,
    /// Set when some arc in the component was referenced by three or more
    /// rings (e.g. a wall shared by three footprints).
    pub non_manifold: bool,
}

/// A component whose boundary could not be reassembled. The rest of the
/// result is still produced.
#[derive(Debug)]
pub struct GroupFailure {
    pub members: Vec<usize>,
    pub reason: MergeError,
}

#[derive(Debug)]
pub struct MergeOutput {
    pub features: Vec<MergedFeature>,
    pub failures: Vec<GroupFailure>,
}

impl MergeOutput {
    /// Renders the result as a GeoJSON feature collection.
    pub fn to_feature_collection(&self) -> geojson::FeatureCollection {
        let features = self
            .features
            .iter()
            .map(|f| geojson::Feature {
                bbox: None,
                geometry: Some(geojson::Geometry::new(geojson::Value::from(&f.geometry))),
                id: None,
                properties: Some(f.properties.clone()),
                foreign_members: None,
            })
            .collect();
        geojson::FeatureCollection {
            bbox: None,
            features,
            foreign_members: None,
        }
    }
}

/// Dissolves touching polygons into one feature per connected component.
///
/// Two inputs belong to the same component when they share at least one
/// boundary edge (exactly, or within `coordinate_precision` when set);
/// shared edges become interior seams and are removed.
pub struct Merger {
    /// Tolerance for treating near-equal coordinates as the same topology
    /// node. `None` requires exact coordinate equality.
    pub coordinate_precision: Option<f64>,

    inputs: Vec<Geometry<f64>>,
    property_policy: Option<PropertyPolicy>,
}

impl Merger {
    pub fn new() -> Self {
        Self {
            coordinate_precision: None,
            inputs: Vec::new(),
            property_policy: None,
        }
    }

    /// Adds one Polygon or MultiPolygon. Validation happens in [`merge`],
    /// which rejects the whole batch on malformed input.
    ///
    /// [`merge`]: Self::merge
    pub fn add_geometry(&mut self, geom: Geometry<f64>) {
        self.inputs.push(geom);
    }

    pub fn add_geometries<I: IntoIterator<Item = Geometry<f64>>>(&mut self, geoms: I) {
        self.inputs.extend(geoms);
    }

    /// Installs the policy that produces output properties from each
    /// component's member indices. Default is empty properties.
    pub fn set_property_policy(&mut self, policy: PropertyPolicy) {
        self.property_policy = Some(policy);
    }

    /// Runs the pipeline: topology construction, shared-arc adjacency,
    /// connected components, per-component boundary dissolve.
    ///
    /// Structural input errors fail the whole call; per-component dissolve
    /// errors are isolated into [`MergeOutput::failures`].
    pub fn merge(&self) -> Result<MergeOutput> {
        let n = self.inputs.len();
        if n == 0 {
            return Ok(MergeOutput {
                features: Vec::new(),
                failures: Vec::new(),
            });
        }

        // Normalize winding up front (CCW exteriors, CW holes) so rings
        // surviving the dissolve classify by signed area.
        let oriented: Vec<Geometry<f64>> = self.inputs.iter().map(orient_geometry).collect();

        let topology = Topology::build(&oriented, self.coordinate_precision)?;
        debug!(
            "topology: {} arcs over {} geometries",
            topology.arcs.len(),
            n
        );

        let adjacency = topology.arc_adjacency();

        let mut forest = UnionFind::new(n);
        for members in &adjacency {
            if let Some((&first, rest)) = members.split_first() {
                for &other in rest {
                    forest.union(first, other);
                }
            }
        }

        // Partition indices by root, groups ordered by first-seen root.
        let mut slot_of_root: HashMap<usize, usize> = HashMap::new();
        let mut groups: Vec<Vec<usize>> = Vec::new();
        for i in 0..n {
            let root = forest.find(i);
            match slot_of_root.get(&root) {
                Some(&slot) => groups[slot].push(i),
                None => {
                    slot_of_root.insert(root, groups.len());
                    groups.push(vec![i]);
                }
            }
        }
        debug!("{} components from {} inputs", groups.len(), n);

        // Components are disjoint and read only the shared arc table, so
        // the dissolve can fan out; the ordered collect gives every group
        // its own output slot.
        #[cfg(all(feature = "parallel", not(target_arch = "wasm32")))]
        let dissolved: Vec<Result<DissolvedGroup>> = groups
            .par_iter()
            .map(|members| dissolve_group(&topology, members, &oriented))
            .collect();

        #[cfg(any(not(feature = "parallel"), target_arch = "wasm32"))]
        let dissolved: Vec<Result<DissolvedGroup>> = groups
            .iter()
            .map(|members| dissolve_group(&topology, members, &oriented))
            .collect();

        let mut features = Vec::with_capacity(groups.len());
        let mut failures = Vec::new();
        for (members, outcome) in groups.into_iter().zip(dissolved) {
            match outcome {
                Ok(group) => {
                    let properties = match &self.property_policy {
                        Some(policy) => policy(&members),
                        None => Properties::new(),
                    };
                    features.push(MergedFeature {
                        geometry: group.geometry,
                        properties,
                        members,
                        non_manifold: group.non_manifold,
                    });
                }
                Err(reason) => {
                    warn!("component {:?} failed to dissolve: {}", members, reason);
                    failures.push(GroupFailure { members, reason });
                }
            }
        }

        Ok(MergeOutput { features, failures })
    }
}

impl Default for Merger {
    fn default() -> Self {
        Self::new()
    }
}

fn orient_geometry(geom: &Geometry<f64>) -> Geometry<f64> {
    match geom {
        Geometry::Polygon(p) => Geometry::Polygon(p.orient(Direction::Default)),
        Geometry::MultiPolygon(mp) => Geometry::MultiPolygon(mp.orient(Direction::Default)),
        // Unsupported types are rejected by the topology builder.
        other => other.clone(),
    }
}

struct DissolvedGroup {
    geometry: Geometry<f64>,
    non_manifold: bool,
}

/// Dissolves one component into its net boundary.
fn dissolve_group(
    topology: &Topology,
    members: &[usize],
    inputs: &[Geometry<f64>],
) -> Result<DissolvedGroup> {
    // A lone geometry has no seams to remove.
    if let [only] = members {
        return Ok(DissolvedGroup {
            geometry: inputs[*only].clone(),
            non_manifold: false,
        });
    }

    // Occurrence count per absolute arc over the whole component. The first
    // reference fixes the direction a surviving arc is traversed in.
    let mut uses: BTreeMap<usize, (usize, ArcRef)> = BTreeMap::new();
    for &i in members {
        topology.geometries[i].for_each_arc(|r| {
            let entry = uses.entry(r.arc()).or_insert((0, r));
            entry.0 += 1;
        });
    }

    let non_manifold = uses.values().any(|&(count, _)| count > 2);
    if non_manifold {
        warn!("component {:?} has non-manifold shared edges", members);
    }

    // Odd occurrence count: boundary, kept. Even: interior seam, dropped.
    let boundary: Vec<Line<f64>> = uses
        .values()
        .filter(|&&(count, _)| count % 2 == 1)
        .map(|&(_, r)| topology.arc_line(r))
        .collect();

    let rings = chain_rings(topology, members, boundary)?;
    let mut polygons = assemble_polygons(rings);

    if polygons.is_empty() {
        return Err(MergeError::UnresolvableTopology(
            "boundary dissolved to no outer ring".to_string(),
        ));
    }

    let geometry = if polygons.len() == 1 {
        Geometry::Polygon(polygons.remove(0))
    } else {
        Geometry::MultiPolygon(MultiPolygon::new(polygons))
    };

    Ok(DissolvedGroup {
        geometry,
        non_manifold,
    })
}

/// Chains boundary edges head-to-tail on shared endpoints into closed rings.
fn chain_rings(
    topology: &Topology,
    members: &[usize],
    edges: Vec<Line<f64>>,
) -> Result<Vec<LineString<f64>>> {
    let mut by_start: HashMap<PointKey, Vec<usize>> = HashMap::new();
    for (i, edge) in edges.iter().enumerate() {
        by_start
            .entry(topology.point_key(edge.start))
            .or_default()
            .push(i);
    }

    let mut used = vec![false; edges.len()];
    let mut rings = Vec::new();

    for first in 0..edges.len() {
        if used[first] {
            continue;
        }

        let start_key = topology.point_key(edges[first].start);
        let mut coords = vec![edges[first].start];
        let mut cursor = first;

        loop {
            used[cursor] = true;
            coords.push(edges[cursor].end);

            let end_key = topology.point_key(edges[cursor].end);
            if end_key == start_key {
                break; // Ring closed
            }

            let next = by_start.get_mut(&end_key).and_then(|bucket| {
                while let Some(candidate) = bucket.pop() {
                    if !used[candidate] {
                        return Some(candidate);
                    }
                }
                None
            });

            match next {
                Some(next) => cursor = next,
                None => {
                    return Err(MergeError::UnresolvableTopology(format!(
                        "dangling boundary chain in component {:?}",
                        members
                    )))
                }
            }
        }

        rings.push(LineString::new(coords));
    }

    Ok(rings)
}

// Wrapper so shells can be indexed by rstar when assigning holes.
struct IndexedShell(Polygon<f64>, usize);

impl RTreeObject for IndexedShell {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        let bbox = self.0.bounding_rect().unwrap();
        AABB::from_corners([bbox.min().x, bbox.min().y], [bbox.max().x, bbox.max().y])
    }
}

/// Classifies rings by winding and attaches each hole to the smallest shell
/// containing it. Inputs were orientation-normalized, so CCW is a shell and
/// CW a hole.
fn assemble_polygons(rings: Vec<LineString<f64>>) -> Vec<Polygon<f64>> {
    let mut shells = Vec::new();
    let mut holes = Vec::new();

    for ring in rings {
        let poly = Polygon::new(ring, vec![]);
        let area = poly.signed_area();

        if area.abs() < 1e-9 {
            continue; // Degenerate
        }

        if area > 0.0 {
            shells.push(poly);
        } else {
            holes.push(poly);
        }
    }

    if shells.is_empty() || holes.is_empty() {
        return shells;
    }

    let indexed: Vec<IndexedShell> = shells
        .iter()
        .enumerate()
        .map(|(i, shell)| IndexedShell(shell.clone(), i))
        .collect();
    let tree = RTree::bulk_load(indexed);

    let mut shell_holes: Vec<Vec<LineString<f64>>> = vec![vec![]; shells.len()];
    for hole in &holes {
        let bbox = hole.bounding_rect().unwrap();
        let envelope = AABB::from_corners([bbox.min().x, bbox.min().y], [bbox.max().x, bbox.max().y]);

        let mut best: Option<usize> = None;
        let mut best_area = f64::MAX;
        for candidate in tree.locate_in_envelope_intersecting(&envelope) {
            let shell = &candidate.0;
            if shell.contains(hole) {
                let area = shell.unsigned_area();
                if area > hole.unsigned_area() && area < best_area {
                    best_area = area;
                    best = Some(candidate.1);
                }
            }
        }

        match best {
            Some(idx) => shell_holes[idx].push(hole.exterior().clone()),
            None => debug!("hole ring not contained by any shell, dropped"),
        }
    }

    shells
        .into_iter()
        .enumerate()
        .map(|(i, shell)| {
            let (exterior, _) = shell.into_inner();
            Polygon::new(exterior, std::mem::take(&mut shell_holes[i]))
        })
        .collect()
}
