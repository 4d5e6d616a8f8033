use std::collections::{HashMap, HashSet, VecDeque};

use tracing::{debug, warn};

use crate::brep::{
    AttrValue, Attributes, Closure, EdgeRef, EdgeTopology, FaceRef, NodeRef, RealBody, RealRef, Sense,
};
use crate::error::{RangeError, Result, TopologyError};
use crate::math::polygon_2d::signed_area;
use crate::math::Point3;
use crate::tessellation::{Adjacent, FaceTess, Tessellation, VertexKind};

use super::entity::{ELoopData, EdgeUv, Segment};
use super::tangency::{is_smooth, winding_deviation};
use super::uvmap::UvMap;
use super::{EBody, EEdgeId, EFaceId, ELoopId, EShellId, EntityRef};

/// Per real edge use, the merged vertex at each edge sample.
type SampleIndex = HashMap<(EdgeRef, Sense), Vec<Option<usize>>>;

/// Merges a connected set of real faces into one composite EFace.
///
/// Shared edges that are tangent-continuous within the body's angle and not
/// marked `.Keep` disappear; the surviving loop pieces are re-threaded into
/// new loops and the merged triangulation gets one global parametrization.
///
/// The merged mesh must admit a parametrization. A closed tube, such as every
/// side of a cylinder with no `.Keep` seam, leaves two boundary loops that
/// neither the planar projection nor the disk embedding can flatten, so the
/// call fails with a [`MappingError`](crate::error::MappingError).
pub struct MakeComposite {
    faces: Vec<FaceRef>,
}

impl MakeComposite {
    /// Creates a new `MakeComposite` operation.
    #[must_use]
    pub fn new(faces: &[FaceRef]) -> Self {
        Self {
            faces: faces.to_vec(),
        }
    }

    /// Executes the operation, returning the retained EFace.
    ///
    /// # Errors
    ///
    /// Returns a [`TopologyError`] if the faces are disconnected, already
    /// claimed, span several shells, share no removable edge, or cannot be
    /// re-threaded into closed loops, and a
    /// [`MappingError`](crate::error::MappingError) if the merged mesh cannot
    /// be parametrized. The body is unchanged on error.
    pub fn execute(&self, ebody: &mut EBody) -> Result<EFaceId> {
        ebody.check_mutable()?;
        let snapshot = ebody.graph.clone();
        match self.merge(ebody) {
            Ok(id) => Ok(id),
            Err(e) => {
                ebody.graph = snapshot;
                Err(e)
            }
        }
    }

    fn merge(&self, ebody: &mut EBody) -> Result<EFaceId> {
        let candidates = self.candidates(ebody)?;
        let shell = shell_of(ebody, &candidates)?;
        let mut touched = Vec::new();
        for (id, _) in &candidates {
            touched.extend(ebody.graph.face(*id)?.loops.iter().map(|(l, _)| *l));
        }
        let removed = removable_edges(ebody, &touched)?;
        if removed.is_empty() {
            return Err(TopologyError::NothingRemoved.into());
        }
        let removed_set: HashSet<EEdgeId> = removed.iter().copied().collect();

        let mesh = MergedMesh::build(ebody, &candidates, &removed)?;
        let uvmap = UvMap::build(ebody.parametrizer(), &mesh.xyz, mesh.tris, mesh.tri_patch)?;
        let cycles = rethread(ebody, &touched, &removed_set)?;
        let mut new_loops = Vec::with_capacity(cycles.len());
        for cycle in cycles {
            new_loops.push(new_loop(ebody, cycle, &mesh.samples, &uvmap)?);
        }
        let areas: Vec<f64> = new_loops.iter().map(|l| l.area).collect();
        let senses = loop_senses(&areas, ebody.params().area_tolerance);

        let retained = candidates[0].0;
        let mut patches = Vec::with_capacity(candidates.len());
        for ((id, _), start) in candidates.iter().zip(&mesh.starts) {
            let mut patch = ebody.graph.face(*id)?.patches[0].clone();
            patch.start = *start;
            patches.push(patch);
        }

        let graph = &mut ebody.graph;
        let mut face_loops = Vec::with_capacity(new_loops.len());
        for (k, (data, sense)) in new_loops.into_iter().zip(senses).enumerate() {
            let id = match touched.get(k) {
                Some(&id) => {
                    *graph.eloop_mut(id)? = data;
                    id
                }
                None => graph.add_loop(data),
            };
            face_loops.push((id, sense));
        }
        for id in touched.iter().skip(face_loops.len()) {
            graph.remove_loop(*id)?;
        }
        let loop_count = face_loops.len();
        {
            let face = graph.face_mut(retained)?;
            face.patches = patches;
            face.uvmap = Some(uvmap);
            face.loops = face_loops;
        }
        let absorbed: Vec<EFaceId> = candidates[1..].iter().map(|(id, _)| *id).collect();
        for id in &absorbed {
            graph.remove_face(*id)?;
        }
        graph.shell_mut(shell)?.faces.retain(|f| !absorbed.contains(f));
        for id in &removed {
            graph.remove_edge(*id)?;
        }
        debug!(
            patches = candidates.len(),
            loops = loop_count,
            removed_edges = removed.len(),
            "composite face built"
        );

        ebody.reduce_nodes()?;
        Ok(retained)
    }

    /// Resolves the faces to their EFaces and checks they may be merged.
    fn candidates(&self, ebody: &EBody) -> Result<Vec<(EFaceId, FaceRef)>> {
        if self.faces.is_empty() {
            return Err(RangeError::InvalidArgument("no faces to merge".into()).into());
        }
        let mut seen = HashSet::new();
        let mut candidates = Vec::with_capacity(self.faces.len());
        for &face in &self.faces {
            let id = ebody.eface_of(face)?;
            if !seen.insert(face) {
                return Err(RangeError::InvalidArgument(format!("face {} listed twice", face.0)).into());
            }
            if ebody.graph.face(id)?.patches.len() != 1 {
                return Err(TopologyError::AlreadyClaimed(face.0).into());
            }
            candidates.push((id, face));
        }

        let body = ebody.body();
        let mut users: HashMap<EdgeRef, Vec<usize>> = HashMap::new();
        for (i, (_, face)) in candidates.iter().enumerate() {
            for (lp, _) in body.face(*face)?.loops {
                for (edge, _) in body.loop_edges(lp)? {
                    if !body.is_kept(RealRef::Edge(edge)) {
                        users.entry(edge).or_default().push(i);
                    }
                }
            }
        }
        let mut neighbours = vec![HashSet::new(); candidates.len()];
        for list in users.values() {
            for &a in list {
                neighbours[a].extend(list.iter().copied().filter(|&b| b != a));
            }
        }
        let mut reached = vec![false; candidates.len()];
        reached[0] = true;
        let mut queue = VecDeque::from([0]);
        while let Some(i) = queue.pop_front() {
            for &j in &neighbours[i] {
                if !reached[j] {
                    reached[j] = true;
                    queue.push_back(j);
                }
            }
        }
        if let Some(i) = reached.iter().position(|r| !r) {
            return Err(TopologyError::NotConnected(candidates[i].1 .0).into());
        }
        Ok(candidates)
    }
}

fn shell_of(ebody: &EBody, candidates: &[(EFaceId, FaceRef)]) -> Result<EShellId> {
    let mut shell = None;
    for (id, _) in candidates {
        let s = ebody.eshell_of(*id)?;
        if shell.is_some_and(|prev| prev != s) {
            return Err(TopologyError::MultipleShells.into());
        }
        shell = Some(s);
    }
    shell.ok_or_else(|| TopologyError::MultipleShells.into())
}

/// EEdges shared by the touched loops that become interior, in first-use
/// order.
fn removable_edges(ebody: &EBody, touched: &[ELoopId]) -> Result<Vec<EEdgeId>> {
    let mut order = Vec::new();
    let mut counts: HashMap<EEdgeId, usize> = HashMap::new();
    let mut repeated = HashSet::new();
    for lp in touched {
        let mut in_loop = HashSet::new();
        for (e, _) in &ebody.graph.eloop(*lp)?.edges {
            let count = counts.entry(*e).or_insert(0);
            if *count == 0 {
                order.push(*e);
            }
            *count += 1;
            if !in_loop.insert(*e) {
                repeated.insert(*e);
            }
        }
    }
    let global = ebody.edge_use_counts();
    let body = ebody.body();

    let mut removed = Vec::new();
    for e in order {
        let count = counts[&e];
        if count < 2 || repeated.contains(&e) || global.get(&e) != Some(&count) {
            continue;
        }
        let edge = ebody.graph.edge(e)?;
        if edge.segments.iter().any(|s| body.is_kept(RealRef::Edge(s.edge))) {
            continue;
        }
        let deviation = crease_deviation(&edge.segments, |edge, t| body.winding_angle(edge, t));
        if is_smooth(deviation, ebody.angle()) {
            removed.push(e);
        } else {
            debug!(deviation, angle = ebody.angle(), "shared edge kept as crease");
        }
    }
    Ok(removed)
}

/// Largest winding deviation over every sample of `segments`.
///
/// Samples whose winding cannot be measured are skipped.
fn crease_deviation(segments: &[Segment], winding: impl Fn(EdgeRef, f64) -> Result<f64>) -> f64 {
    let mut deviation: f64 = 0.0;
    for seg in segments {
        for &t in &seg.ts {
            match winding(seg.edge, t) {
                Ok(angle) => deviation = deviation.max(winding_deviation(angle)),
                Err(err) => warn!(edge = seg.edge.0, t, %err, "winding angle unavailable; sample skipped"),
            }
        }
    }
    deviation
}

/// The candidates' triangulations joined into one mesh.
struct MergedMesh {
    xyz: Vec<Point3>,
    tris: Vec<[usize; 3]>,
    tri_patch: Vec<usize>,
    /// First triangle of each patch.
    starts: Vec<usize>,
    samples: SampleIndex,
}

impl MergedMesh {
    fn build(ebody: &EBody, candidates: &[(EFaceId, FaceRef)], removed: &[EEdgeId]) -> Result<Self> {
        let tess = ebody.tess()?;
        let body = ebody.body().as_ref();
        let mut raw_xyz = Vec::new();
        let mut raw_tris = Vec::new();
        let mut tri_patch = Vec::new();
        let mut starts = Vec::with_capacity(candidates.len());
        let mut samples = SampleIndex::new();

        for (p, (id, face)) in candidates.iter().enumerate() {
            let ft = tess.face(*face)?;
            let offset = raw_xyz.len();
            collect_samples(body, tess, ft, offset, &mut samples)?;
            starts.push(raw_tris.len());
            for tri in &ebody.graph.face(*id)?.patches[0].tris {
                raw_tris.push(tri.map(|v| v + offset));
                tri_patch.push(p);
            }
            raw_xyz.extend_from_slice(&ft.xyz);
        }

        let mut parent: Vec<usize> = (0..raw_xyz.len()).collect();
        for id in removed {
            for seg in &ebody.graph.edge(*id)?.segments {
                let (Some(fwd), Some(rev)) = (
                    samples.get(&(seg.edge, Sense::Forward)),
                    samples.get(&(seg.edge, Sense::Reverse)),
                ) else {
                    return Err(TopologyError::InvalidTopology(format!(
                        "edge {} is not bounded on both sides",
                        seg.edge.0
                    ))
                    .into());
                };
                for (a, b) in fwd.iter().zip(rev) {
                    if let (Some(a), Some(b)) = (a, b) {
                        union(&mut parent, *a, *b);
                    }
                }
            }
        }

        let mut renumber = vec![0usize; parent.len()];
        let mut xyz = Vec::new();
        for v in 0..parent.len() {
            let root = find(&mut parent, v);
            if root == v {
                renumber[v] = xyz.len();
                xyz.push(raw_xyz[v]);
            } else {
                renumber[v] = renumber[root];
            }
        }
        let tris = raw_tris.iter().map(|t| t.map(|v| renumber[v])).collect();
        for indices in samples.values_mut() {
            for slot in indices.iter_mut() {
                *slot = slot.map(|v| renumber[v]);
            }
        }
        Ok(Self {
            xyz,
            tris,
            tri_patch,
            starts,
            samples,
        })
    }
}

fn find(parent: &mut [usize], mut v: usize) -> usize {
    while parent[v] != v {
        parent[v] = parent[parent[v]];
        v = parent[v];
    }
    v
}

fn union(parent: &mut [usize], a: usize, b: usize) {
    let (ra, rb) = (find(parent, a), find(parent, b));
    parent[ra.max(rb)] = ra.min(rb);
}

/// Records the merged index of every edge sample found on the boundary
/// sides of a face triangulation.
fn collect_samples(
    body: &dyn RealBody,
    tess: &Tessellation,
    ft: &FaceTess,
    offset: usize,
    out: &mut SampleIndex,
) -> Result<()> {
    for (tri, adjacent) in ft.tris.iter().zip(&ft.adjacency) {
        for (k, side) in adjacent.iter().enumerate() {
            let Adjacent::Edge(edge) = *side else { continue };
            let (a, b) = (tri[(k + 1) % 3], tri[(k + 2) % 3]);
            let topo = body.edge(edge)?;
            let count = tess.edge(edge)?.t.len();
            let last = count.saturating_sub(1);
            let (ma, mb) = match (
                sample_of(&ft.kinds, &topo, edge, a, last)?,
                sample_of(&ft.kinds, &topo, edge, b, last)?,
            ) {
                (Some(ma), Some(mb)) => (ma, mb),
                (None, Some(mb)) => (if mb == 1 { 0 } else { last }, mb),
                (Some(ma), None) => (ma, if ma == 1 { 0 } else { last }),
                (None, None) => (0, last),
            };
            // triangles run counter-clockwise, so the side follows the loop
            let sense = if ma < mb { Sense::Forward } else { Sense::Reverse };
            let slots = out.entry((edge, sense)).or_insert_with(|| vec![None; count]);
            for (m, v) in [(ma, a), (mb, b)] {
                if let Some(slot) = slots.get_mut(m) {
                    *slot = Some(offset + v);
                }
            }
        }
    }
    Ok(())
}

/// Sample index of a face vertex on `edge`; `None` when the vertex is the
/// node of a closed edge and could sit at either end.
fn sample_of(
    kinds: &[VertexKind],
    topo: &EdgeTopology,
    edge: EdgeRef,
    vertex: usize,
    last: usize,
) -> Result<Option<usize>> {
    match kinds.get(vertex) {
        Some(VertexKind::Edge { edge: e, sample }) if *e == edge => Ok(Some(*sample)),
        Some(VertexKind::Node(n)) if topo.nodes[0] == topo.nodes[1] && *n == topo.nodes[0] => Ok(None),
        Some(VertexKind::Node(n)) if *n == topo.nodes[0] => Ok(Some(0)),
        Some(VertexKind::Node(n)) if *n == topo.nodes[1] => Ok(Some(last)),
        _ => Err(TopologyError::InvalidTopology(format!(
            "boundary vertex {vertex} does not lie on edge {}",
            edge.0
        ))
        .into()),
    }
}

/// A surviving loop entry with its links.
struct Fragment {
    edge: EEdgeId,
    sense: Sense,
    begin: NodeRef,
    end: NodeRef,
    next: Option<usize>,
    has_prev: bool,
}

/// Chains the surviving entries of the touched loops into closed cycles.
fn rethread(
    ebody: &EBody,
    touched: &[ELoopId],
    removed: &HashSet<EEdgeId>,
) -> Result<Vec<Vec<(EEdgeId, Sense)>>> {
    let mut frags: Vec<Fragment> = Vec::new();
    for lp in touched {
        let uses = &ebody.graph.eloop(*lp)?.edges;
        let mut slots = vec![None; uses.len()];
        for (i, (e, s)) in uses.iter().enumerate() {
            if removed.contains(e) {
                continue;
            }
            let (begin, end) = ebody.graph.edge(*e)?.ends(*s);
            slots[i] = Some(frags.len());
            frags.push(Fragment {
                edge: *e,
                sense: *s,
                begin,
                end,
                next: None,
                has_prev: false,
            });
        }
        for i in 0..uses.len() {
            if let (Some(a), Some(b)) = (slots[i], slots[(i + 1) % uses.len()]) {
                frags[a].next = Some(b);
                frags[b].has_prev = true;
            }
        }
    }

    let mut open: HashMap<NodeRef, (Vec<usize>, Vec<usize>)> = HashMap::new();
    for (i, f) in frags.iter().enumerate() {
        if f.next.is_none() {
            open.entry(f.end).or_default().0.push(i);
        }
        if !f.has_prev {
            open.entry(f.begin).or_default().1.push(i);
        }
    }
    for (node, (ends, begins)) in open {
        let count = ends.len() + begins.len();
        if count != 2 {
            return Err(TopologyError::NodeCount { node: node.0, count }.into());
        }
        let (&[end], &[begin]) = (ends.as_slice(), begins.as_slice()) else {
            return Err(TopologyError::LoopNotClosed.into());
        };
        frags[end].next = Some(begin);
    }

    let mut visited = vec![false; frags.len()];
    let mut cycles = Vec::new();
    for start in 0..frags.len() {
        if visited[start] {
            continue;
        }
        let mut cycle = Vec::new();
        let mut at = start;
        loop {
            if visited[at] {
                return Err(TopologyError::LoopNotClosed.into());
            }
            visited[at] = true;
            cycle.push((frags[at].edge, frags[at].sense));
            at = frags[at].next.ok_or(TopologyError::LoopNotClosed)?;
            if at == start {
                break;
            }
        }
        cycles.push(cycle);
    }
    Ok(cycles)
}

/// Builds a re-threaded loop with its sample indices and merged-uv area.
fn new_loop(
    ebody: &EBody,
    edges: Vec<(EEdgeId, Sense)>,
    samples: &SampleIndex,
    uvmap: &UvMap,
) -> Result<ELoopData> {
    let mut edge_uvs = Vec::new();
    let mut polygon = Vec::new();
    for (e, s) in &edges {
        for seg in ebody.graph.edge(*e)?.oriented_segments(*s) {
            let indices = samples.get(&(seg.edge, seg.sense)).cloned().ok_or_else(|| {
                TopologyError::InvalidTopology(format!("edge {} has no face samples", seg.edge.0))
            })?;
            let mut ordered = indices.clone();
            if seg.sense == Sense::Reverse {
                ordered.reverse();
            }
            for v in ordered.iter().take(ordered.len().saturating_sub(1)) {
                let v = v.ok_or_else(|| {
                    TopologyError::InvalidTopology(format!("edge {} has unmatched samples", seg.edge.0))
                })?;
                polygon.push(uvmap.vertex_uv(v)?);
            }
            edge_uvs.push(EdgeUv {
                edge: seg.edge,
                sense: seg.sense,
                indices,
            });
        }
    }
    Ok(ELoopData {
        closure: Closure::Closed,
        edges,
        edge_uvs,
        area: signed_area(&polygon),
        attributes: Attributes::new(),
    })
}

/// Forward for the loop of greatest |area|, reverse for the rest.
fn loop_senses(areas: &[f64], tolerance: f64) -> Vec<Sense> {
    if let [area] = areas {
        if *area <= 0.0 {
            warn!(area, "single composite loop has non-positive area");
        }
        return vec![Sense::Forward];
    }
    let largest = |key: fn(f64) -> f64| {
        areas
            .iter()
            .enumerate()
            .fold(None, |best: Option<(usize, f64)>, (i, a)| match best {
                Some((_, b)) if key(*a) <= b => best,
                _ => Some((i, key(*a))),
            })
            .map(|(i, _)| i)
    };
    let outer = largest(f64::abs);
    if outer != largest(|a| a) {
        warn!(?areas, "outer loop by |area| is not the largest signed area");
    }
    if let Some(o) = outer {
        let close = areas
            .iter()
            .enumerate()
            .any(|(i, a)| i != o && areas[o].abs() - a.abs() <= tolerance);
        if close {
            warn!(?areas, "outer loop is ambiguous");
        }
    }
    (0..areas.len())
        .map(|i| if Some(i) == outer { Sense::Forward } else { Sense::Reverse })
        .collect()
}

/// Builds one composite per group of single-patch EFaces whose real faces
/// carry equal values of an attribute.
pub struct MakeAttributeComposites {
    name: String,
}

impl MakeAttributeComposites {
    /// Creates a new `MakeAttributeComposites` operation.
    #[must_use]
    pub fn new(name: &str) -> Self {
        Self { name: name.to_owned() }
    }

    /// Executes the operation, returning the composites built.
    ///
    /// Groups that fail to merge are logged and skipped.
    ///
    /// # Errors
    ///
    /// Returns a [`StateError`](crate::error::StateError) if the body cannot
    /// be mutated.
    pub fn execute(&self, ebody: &mut EBody) -> Result<Vec<EFaceId>> {
        ebody.check_mutable()?;
        let mut groups: Vec<(AttrValue, Vec<FaceRef>)> = Vec::new();
        for id in ebody.efaces() {
            let [patch] = ebody.graph.face(*id)?.patches.as_slice() else {
                continue;
            };
            let Some(value) = ebody.body().attribute(RealRef::Face(patch.face), &self.name) else {
                continue;
            };
            match groups.iter_mut().find(|g| g.0 == *value) {
                Some(group) => group.1.push(patch.face),
                None => groups.push((value.clone(), vec![patch.face])),
            }
        }

        let mut built = Vec::new();
        for (value, faces) in groups {
            if faces.len() < 2 {
                continue;
            }
            match MakeComposite::new(&faces).execute(ebody) {
                Ok(id) => {
                    ebody.set_attribute(EntityRef::EFace(id), &self.name, value)?;
                    built.push(id);
                }
                Err(err) => warn!(attribute = %self.name, faces = faces.len(), %err, "composite group skipped"),
            }
        }
        Ok(built)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;
    use crate::brep::primitives::{MakeBox, MakeCylinder, MakeGridSheet};
    use crate::effect::tests::{grid, seamed_cylinder, tessellate, unit_box};
    use crate::effect::Virtualize;
    use crate::error::{EffectError, MappingError, StateError};
    use crate::math::Vector3;

    fn triangle_count(ebody: &EBody, ids: &[EFaceId]) -> usize {
        ids.iter()
            .map(|id| ebody.eface(*id).unwrap().patches.iter().map(|p| p.tris.len()).sum::<usize>())
            .sum()
    }

    #[test]
    fn cylinder_sides_merge_into_one_face() {
        let mut ebody = seamed_cylinder();
        let sides: Vec<FaceRef> = (0..4).map(FaceRef).collect();
        let before: Vec<EFaceId> = sides.iter().map(|f| ebody.eface_of(*f).unwrap()).collect();
        let tris = triangle_count(&ebody, &before);
        assert_eq!(ebody.efaces().len(), 6);

        let id = MakeComposite::new(&sides).execute(&mut ebody).unwrap();
        assert_eq!(ebody.efaces().len(), 3);
        let face = ebody.eface(id).unwrap();
        assert_eq!(face.patches.len(), 4);
        assert!(face.is_composite());
        assert_eq!(triangle_count(&ebody, &[id]), tris);
        assert_eq!(face.uvmap.as_ref().unwrap().tris().len(), tris);
        for seam in 1..4 {
            assert!(ebody.eedge_of(EdgeRef(seam)).is_err());
        }
        assert!(ebody.eedge_of(EdgeRef(0)).is_ok());
        // the arcs close up once their seams are gone
        assert_eq!(ebody.eedges().len(), 3);
        assert_eq!(face.loops.len(), 1);
        let shell = ebody.eshell(ebody.eshells()[0]).unwrap();
        assert_eq!(shell.faces.len(), 3);
    }

    #[test]
    fn unmeasurable_windings_are_skipped() {
        let segment = |edge: usize| Segment {
            edge: EdgeRef(edge),
            sense: Sense::Forward,
            interior_node: None,
            t_start: 0.0,
            t_end: 1.0,
            ts: vec![0.0, 0.5, 1.0],
            d_start: Vector3::zeros(),
            d_end: Vector3::zeros(),
        };
        let segments = [segment(0), segment(1)];
        let deviation = crease_deviation(&segments, |edge, t| {
            if edge == EdgeRef(0) && t > 0.25 {
                Err(TopologyError::EntityNotFound("winding".into()).into())
            } else {
                Ok(if edge == EdgeRef(1) { 183.0 } else { 180.0 })
            }
        });
        assert_relative_eq!(deviation, 3.0, epsilon = 1e-12);
        assert_relative_eq!(
            crease_deviation(&segments, |_, _| Err(TopologyError::EntityNotFound("winding".into()).into())),
            0.0
        );
    }

    #[test]
    fn closed_tubes_cannot_be_flattened() {
        let model = MakeCylinder::new(Point3::origin(), 1.0, 2.0, 4).execute().unwrap();
        let mut ebody = Virtualize::new(tessellate(model), 5.0).execute().unwrap();
        let sides: Vec<FaceRef> = (0..4).map(FaceRef).collect();
        let edges = ebody.eedges().to_vec();
        assert!(matches!(
            MakeComposite::new(&sides).execute(&mut ebody),
            Err(EffectError::Mapping(MappingError::Failed(_)))
        ));
        assert_eq!(ebody.efaces().len(), 6);
        assert_eq!(ebody.eedges(), edges.as_slice());
    }

    #[test]
    fn ring_gets_one_outer_and_one_inner_loop() {
        let mut ebody = grid(3, 3);
        let ring: Vec<FaceRef> = (0..9).filter(|f| *f != 4).map(FaceRef).collect();
        let id = MakeComposite::new(&ring).execute(&mut ebody).unwrap();
        assert_eq!(ebody.efaces().len(), 2);

        let face = ebody.eface(id).unwrap();
        assert_eq!(face.loops.len(), 2);
        let loops: Vec<(&ELoopData, Sense)> = face
            .loops
            .iter()
            .map(|(l, s)| (ebody.eloop(*l).unwrap(), *s))
            .collect();
        assert_eq!(loops.iter().filter(|(_, s)| *s == Sense::Forward).count(), 1);
        let (outer, _) = loops.iter().find(|(_, s)| *s == Sense::Forward).unwrap();
        let (inner, _) = loops.iter().find(|(_, s)| *s == Sense::Reverse).unwrap();
        assert!(outer.area.abs() > inner.area.abs());
        assert_relative_eq!(outer.area.abs() / inner.area.abs(), 9.0, epsilon = 1e-6);
        assert_eq!(outer.edges.len(), 4);
        assert_eq!(inner.edges.len(), 1);
        assert_eq!(ebody.eedges().len(), 5);
    }

    #[test]
    fn composite_evaluation_follows_the_patches() {
        let mut ebody = grid(2, 1);
        let id = MakeComposite::new(&[FaceRef(0), FaceRef(1)])
            .execute(&mut ebody)
            .unwrap();
        let target = Point3::new(1.5, 0.25, 0.0);
        let (uv, point) = ebody.inverse_face(id, &target).unwrap();
        assert!((point - target).norm() < 1e-9);
        let eval = ebody.evaluate_face(id, &uv).unwrap();
        assert!((eval.point - target).norm() < 1e-9);
        assert!(eval.normal().z.abs() > 0.99);
        assert_eq!(ebody.effective_face_map(id, &uv).unwrap().face, FaceRef(1));
        assert!(ebody.in_face(id, &uv).unwrap());
        assert_relative_eq!(ebody.area(id).unwrap(), 2.0, epsilon = 1e-12);

        let node_uv = ebody.node_uv(id, NodeRef(1)).unwrap();
        let node = ebody.evaluate_face(id, &node_uv).unwrap().point;
        assert!((node - Point3::new(1.0, 0.0, 0.0)).norm() < 1e-9);
    }

    #[test]
    fn composite_edge_uvs_land_on_the_edge() {
        let mut ebody = grid(2, 1);
        let id = MakeComposite::new(&[FaceRef(0), FaceRef(1)])
            .execute(&mut ebody)
            .unwrap();
        let lp = ebody.eloop(ebody.eface(id).unwrap().loops[0].0).unwrap();
        assert_eq!(lp.edges.len(), 4);
        for &(edge, sense) in &lp.edges {
            let ([t0, t1], _) = ebody.edge_range(edge).unwrap();
            for f in [0.1, 0.5, 0.8] {
                let t = t0 + f * (t1 - t0);
                let uv = ebody.edge_uv(id, edge, sense, t).unwrap();
                let on_face = ebody.evaluate_face(id, &uv).unwrap().point;
                let on_edge = ebody.evaluate_edge(edge, t).unwrap().point;
                assert!((on_face - on_edge).norm() < 1e-9);
            }
        }
    }

    #[test]
    fn disconnected_faces_are_rejected() {
        let mut ebody = grid(3, 1);
        assert!(matches!(
            MakeComposite::new(&[FaceRef(0), FaceRef(2)]).execute(&mut ebody),
            Err(EffectError::Topology(TopologyError::NotConnected(2)))
        ));
        assert_eq!(ebody.efaces().len(), 3);
    }

    #[test]
    fn claimed_faces_are_rejected() {
        let mut ebody = grid(3, 1);
        MakeComposite::new(&[FaceRef(0), FaceRef(1)])
            .execute(&mut ebody)
            .unwrap();
        assert!(matches!(
            MakeComposite::new(&[FaceRef(1), FaceRef(2)]).execute(&mut ebody),
            Err(EffectError::Topology(TopologyError::AlreadyClaimed(1)))
        ));
    }

    #[test]
    fn creases_are_never_removed() {
        let mut ebody = unit_box();
        let (edges, loops) = (ebody.eedges().len(), ebody.eloops().len());
        assert!(matches!(
            MakeComposite::new(&[FaceRef(0), FaceRef(2)]).execute(&mut ebody),
            Err(EffectError::Topology(TopologyError::NothingRemoved))
        ));
        assert_eq!(ebody.efaces().len(), 6);
        assert_eq!(ebody.eedges().len(), edges);
        assert_eq!(ebody.eloops().len(), loops);
        assert!(matches!(
            MakeComposite::new(&[FaceRef(0), FaceRef(42)]).execute(&mut ebody),
            Err(EffectError::Range(RangeError::Index { .. }))
        ));
        assert!(matches!(
            MakeComposite::new(&[FaceRef(0), FaceRef(0)]).execute(&mut ebody),
            Err(EffectError::Range(RangeError::InvalidArgument(_)))
        ));
    }

    #[test]
    fn finalized_bodies_reject_composites() {
        let mut ebody = grid(2, 1);
        ebody.finalize().unwrap();
        assert!(matches!(
            MakeComposite::new(&[FaceRef(0), FaceRef(1)]).execute(&mut ebody),
            Err(EffectError::State(StateError::Finalized))
        ));
    }

    #[test]
    fn attribute_groups_become_composites() {
        let mut model = MakeGridSheet::new(Point3::origin(), 1.0, 3, 1).execute().unwrap();
        for (f, group) in [(0, 1), (1, 1), (2, 2)] {
            model
                .set_attribute(RealRef::Face(FaceRef(f)), "group", AttrValue::Int(vec![group]))
                .unwrap();
        }
        let mut ebody = Virtualize::new(tessellate(model), 5.0).execute().unwrap();
        let built = MakeAttributeComposites::new("group").execute(&mut ebody).unwrap();
        assert_eq!(built.len(), 1);
        assert_eq!(ebody.efaces().len(), 2);
        assert_eq!(
            ebody.attribute(EntityRef::EFace(built[0]), "group"),
            Some(&AttrValue::Int(vec![1]))
        );
        assert_eq!(ebody.eface(built[0]).unwrap().patches.len(), 2);
    }

    #[test]
    fn failing_groups_are_skipped() {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::new("warn"))
            .with_test_writer()
            .try_init();
        let mut model = MakeBox::new(Point3::origin(), Point3::new(1.0, 1.0, 1.0))
            .execute()
            .unwrap();
        for f in [0, 2] {
            model
                .set_attribute(RealRef::Face(FaceRef(f)), "part", AttrValue::String("a".into()))
                .unwrap();
        }
        let mut ebody = Virtualize::new(tessellate(model), 0.0).execute().unwrap();
        let built = MakeAttributeComposites::new("part").execute(&mut ebody).unwrap();
        assert!(built.is_empty());
        assert_eq!(ebody.efaces().len(), 6);
    }

    #[test]
    fn loop_senses_pick_the_largest_area() {
        assert_eq!(loop_senses(&[2.0], 1e-10), vec![Sense::Forward]);
        assert_eq!(
            loop_senses(&[-1.0, 9.0, -2.0], 1e-10),
            vec![Sense::Reverse, Sense::Forward, Sense::Reverse]
        );
        assert_eq!(loop_senses(&[1.0, -9.0], 1e-10), vec![Sense::Reverse, Sense::Forward]);
        assert!(loop_senses(&[], 1e-10).is_empty());
    }
}
