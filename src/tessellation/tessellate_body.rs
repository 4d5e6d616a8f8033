use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;

use spade::handles::FixedFaceHandle;
use spade::{ConstrainedDelaunayTriangulation, InsertionError, Point2 as SpadePoint2, Triangulation};

use crate::brep::{EdgeKind, EdgeRef, FaceRef, RealBody, Sense};
use crate::error::{Result, TessellationError};
use crate::math::polygon_2d::contains_point;
use crate::math::Point2;

use super::{Adjacent, EdgeTess, FaceTess, Tessellation, TessellationParams, VertexKind};

type Cdt = ConstrainedDelaunayTriangulation<SpadePoint2<f64>>;

/// Tessellates every edge and face of a real body.
///
/// Edges are sampled uniformly in parameter. Each face is triangulated with a
/// constrained Delaunay triangulation of its uv boundary plus a small interior
/// grid, so boundary samples are shared exactly with the edge tessellations.
pub struct TessellateBody {
    body: Arc<dyn RealBody>,
    params: TessellationParams,
}

impl TessellateBody {
    /// Creates a new `TessellateBody` operation.
    #[must_use]
    pub fn new(body: Arc<dyn RealBody>, params: TessellationParams) -> Self {
        Self { body, params }
    }

    /// Executes the tessellation.
    ///
    /// # Errors
    ///
    /// Returns an error if the parameters are invalid, evaluation fails, or a
    /// face cannot be triangulated.
    pub fn execute(&self) -> Result<Tessellation> {
        self.params.validate()?;
        let edges = (0..self.body.edge_count())
            .map(|e| self.tessellate_edge(EdgeRef(e)))
            .collect::<Result<Vec<_>>>()?;
        let faces = (0..self.body.face_count())
            .map(|f| self.tessellate_face(FaceRef(f), &edges))
            .collect::<Result<Vec<_>>>()?;
        Tessellation::new(Arc::clone(&self.body), edges, faces)
    }

    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_precision_loss,
        clippy::cast_sign_loss
    )]
    fn tessellate_edge(&self, edge: EdgeRef) -> Result<EdgeTess> {
        let topo = self.body.edge(edge)?;
        if topo.kind == EdgeKind::Degenerate {
            return Ok(EdgeTess::default());
        }
        let [t0, t1] = topo.range;
        let length = self.body.arc_length(edge, t0, t1)?;
        let n = ((length / self.params.max_segment_length).ceil() as usize)
            .clamp(self.params.min_segments, self.params.max_segments);

        let mut tess = EdgeTess::default();
        for i in 0..=n {
            let t = t0 + (t1 - t0) * i as f64 / n as f64;
            tess.t.push(t);
            tess.xyz.push(self.body.evaluate_edge(edge, t)?.point);
        }
        Ok(tess)
    }

    fn tessellate_face(&self, face: FaceRef, edges: &[EdgeTess]) -> Result<FaceTess> {
        let topo = self.body.face(face)?;
        let mut out = FaceTess::default();
        let mut loops_2d = Vec::with_capacity(topo.loops.len());
        let mut boundary_sides: HashMap<(usize, usize), EdgeRef> = HashMap::new();

        for (lp, _) in &topo.loops {
            let first = out.uv.len();
            for (edge, sense) in self.body.loop_edges(*lp)? {
                let etopo = self.body.edge(edge)?;
                let samples = &edges[edge.0];
                let last = samples.t.len().saturating_sub(1);
                let order: Vec<usize> = match sense {
                    Sense::Forward => (0..last).collect(),
                    Sense::Reverse => (1..=last).rev().collect(),
                };
                for idx in order {
                    let kind = if idx == 0 {
                        VertexKind::Node(etopo.nodes[0])
                    } else if idx == last {
                        VertexKind::Node(etopo.nodes[1])
                    } else {
                        VertexKind::Edge { edge, sample: idx }
                    };
                    let vertex = out.uv.len();
                    out.uv.push(self.body.edge_uv(face, edge, sense, samples.t[idx])?);
                    out.xyz.push(samples.xyz[idx]);
                    out.kinds.push(kind);
                    boundary_sides.insert((vertex, vertex + 1), edge);
                }
            }
            // close the loop back onto its first vertex
            let end = out.uv.len();
            if end > first {
                if let Some(edge) = boundary_sides.remove(&(end - 1, end)) {
                    boundary_sides.insert((end - 1, first), edge);
                }
            }
            loops_2d.push(out.uv[first..end].to_vec());
        }
        out.frame_count = out.uv.len();

        for uv in interior_grid(&loops_2d, self.params.interior_grid) {
            out.xyz.push(self.body.evaluate_face(face, &uv)?.point);
            out.uv.push(uv);
            out.kinds.push(VertexKind::Interior);
        }

        let mut cdt = Cdt::new();
        let mut spade_to_vertex: HashMap<usize, usize> = HashMap::new();
        let mut offset = 0;
        for poly in &loops_2d {
            let handles = insert_constraint_loop(&mut cdt, poly)?;
            for (i, h) in handles.iter().enumerate() {
                spade_to_vertex.entry(h.index()).or_insert(offset + i);
            }
            offset += poly.len();
        }
        for v in out.frame_count..out.uv.len() {
            let h = cdt
                .insert(to_spade(&out.uv[v]))
                .map_err(|e: InsertionError| TessellationError::Failed(format!("CDT insert: {e}")))?;
            spade_to_vertex.entry(h.index()).or_insert(v);
        }

        let interior = classify_interior_faces(&cdt);
        for face_handle in cdt.inner_faces() {
            if !interior.contains(&face_handle.fix().index()) {
                continue;
            }
            let mut tri = [0usize; 3];
            for (k, vh) in face_handle.vertices().iter().enumerate() {
                tri[k] = *spade_to_vertex.get(&vh.fix().index()).ok_or_else(|| {
                    TessellationError::Failed("triangle vertex missing from input".into())
                })?;
            }
            let [a, b, c] = tri.map(|i| out.uv[i]);
            if (b - a).perp(&(c - a)) < 0.0 {
                tri.swap(1, 2);
            }
            out.tris.push(tri);
        }
        if out.tris.is_empty() {
            return Err(TessellationError::Failed(format!("face {} has no triangles", face.0)).into());
        }
        out.adjacency = adjacency(&out.tris, &boundary_sides);
        Ok(out)
    }
}

fn to_spade(p: &Point2) -> SpadePoint2<f64> {
    SpadePoint2::new(p.x, p.y)
}

/// Interior grid points strictly inside the boundary loops.
#[allow(clippy::cast_precision_loss)]
fn interior_grid(loops: &[Vec<Point2>], n: usize) -> Vec<Point2> {
    let Some(outer) = loops.first() else {
        return Vec::new();
    };
    let (mut lo, mut hi) = (Point2::new(f64::MAX, f64::MAX), Point2::new(f64::MIN, f64::MIN));
    for p in outer {
        lo = lo.inf(p);
        hi = hi.sup(p);
    }
    let mut points = Vec::new();
    for j in 1..=n {
        for i in 1..=n {
            let fu = i as f64 / (n + 1) as f64;
            let fv = j as f64 / (n + 1) as f64;
            let p = Point2::new(lo.x + fu * (hi.x - lo.x), lo.y + fv * (hi.y - lo.y));
            if contains_point(loops, &p) {
                points.push(p);
            }
        }
    }
    points
}

/// Neighbor of each triangle side, falling back to the boundary edge map.
fn adjacency(tris: &[[usize; 3]], boundary: &HashMap<(usize, usize), EdgeRef>) -> Vec<[Adjacent; 3]> {
    let mut sides: HashMap<(usize, usize), Vec<usize>> = HashMap::new();
    for (t, tri) in tris.iter().enumerate() {
        for k in 0..3 {
            let (a, b) = (tri[(k + 1) % 3], tri[(k + 2) % 3]);
            sides.entry((a.min(b), a.max(b))).or_default().push(t);
        }
    }
    tris.iter()
        .enumerate()
        .map(|(t, tri)| {
            let mut adj = [Adjacent::None; 3];
            for (k, slot) in adj.iter_mut().enumerate() {
                let (a, b) = (tri[(k + 1) % 3], tri[(k + 2) % 3]);
                let key = (a.min(b), a.max(b));
                let other = sides.get(&key).and_then(|ts| ts.iter().find(|&&o| o != t));
                if let Some(&other) = other {
                    *slot = Adjacent::Triangle(other);
                } else if let Some(&edge) =
                    boundary.get(&(a, b)).or_else(|| boundary.get(&(b, a)))
                {
                    *slot = Adjacent::Edge(edge);
                }
            }
            adj
        })
        .collect()
}

/// Inserts a closed polygon as constraint edges, returning the vertex handles.
fn insert_constraint_loop(
    cdt: &mut Cdt,
    points: &[Point2],
) -> Result<Vec<spade::handles::FixedVertexHandle>> {
    if points.len() < 3 {
        return Err(
            TessellationError::Failed("constraint loop needs at least 3 points".into()).into(),
        );
    }

    let mut handles = Vec::with_capacity(points.len());
    for pt in points {
        let h = cdt
            .insert(to_spade(pt))
            .map_err(|e: InsertionError| TessellationError::Failed(format!("CDT insert: {e}")))?;
        handles.push(h);
    }

    for i in 0..handles.len() {
        let from = handles[i];
        let to = handles[(i + 1) % handles.len()];
        if from != to {
            cdt.add_constraint(from, to);
        }
    }

    Ok(handles)
}

/// Classifies which inner faces of the CDT are inside the boundary using flood-fill.
///
/// Starts from faces adjacent to the outer (infinite) face at depth 0. Each time
/// a constraint edge is crossed, depth increments. Odd depth = interior.
fn classify_interior_faces(cdt: &Cdt) -> HashSet<usize> {
    let mut interior = HashSet::new();
    let mut depth_map: HashMap<usize, u32> = HashMap::new();
    let mut queue: VecDeque<(FixedFaceHandle<spade::handles::InnerTag>, u32)> = VecDeque::new();

    let outer_fix = cdt.outer_face().fix();

    for edge in cdt.directed_edges() {
        if edge.face().fix() == outer_fix {
            if let Some(inner) = edge.rev().face().as_inner() {
                let idx = inner.fix().index();
                if depth_map.contains_key(&idx) {
                    continue;
                }
                let depth = u32::from(cdt.is_constraint_edge(edge.as_undirected().fix()));
                depth_map.insert(idx, depth);
                if depth % 2 == 1 {
                    interior.insert(idx);
                }
                queue.push_back((inner.fix(), depth));
            }
        }
    }

    while let Some((face_fix, depth)) = queue.pop_front() {
        let face = cdt.face(face_fix);
        for edge in face.adjacent_edges() {
            if let Some(neighbor) = edge.rev().face().as_inner() {
                let n_idx = neighbor.fix().index();
                if depth_map.contains_key(&n_idx) {
                    continue;
                }
                let new_depth = depth + u32::from(cdt.is_constraint_edge(edge.as_undirected().fix()));
                depth_map.insert(n_idx, new_depth);
                if new_depth % 2 == 1 {
                    interior.insert(n_idx);
                }
                queue.push_back((neighbor.fix(), new_depth));
            }
        }
    }

    interior
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::math::Point3;
    use crate::brep::primitives::{MakeBox, MakeCylinder, MakeGridSheet};

    fn centroid(tess: &FaceTess) -> Point3 {
        let mut acc = nalgebra::Vector3::zeros();
        let mut total = 0.0;
        for tri in &tess.tris {
            let [a, b, c] = tri.map(|i| tess.xyz[i]);
            let area = (b - a).cross(&(c - a)).norm() * 0.5;
            acc += (a.coords + b.coords + c.coords) / 3.0 * area;
            total += area;
        }
        Point3::from(acc / total)
    }

    fn tessellate(body: impl RealBody + 'static) -> Tessellation {
        TessellateBody::new(Arc::new(body), TessellationParams::default())
            .execute()
            .unwrap()
    }

    #[test]
    fn box_faces_are_closed_meshes() {
        let tess = tessellate(
            MakeBox::new(Point3::origin(), Point3::new(1.0, 1.0, 1.0))
                .execute()
                .unwrap(),
        );
        tess.check_complete().unwrap();
        for f in 0..6 {
            let face = tess.face(FaceRef(f)).unwrap();
            // 4 edges of 4 segments each
            assert_eq!(face.frame_count, 16);
            assert!(face.uv.len() > face.frame_count);
            let area: f64 = face
                .tris
                .iter()
                .map(|t| {
                    let [a, b, c] = t.map(|i| face.uv[i]);
                    0.5 * (b - a).perp(&(c - a))
                })
                .sum();
            assert!((area - 1.0).abs() < 1e-9, "face {f} uv area {area}");
        }
    }

    #[test]
    fn boundary_sides_reference_edges() {
        let tess = tessellate(
            MakeBox::new(Point3::origin(), Point3::new(1.0, 1.0, 1.0))
                .execute()
                .unwrap(),
        );
        let face = tess.face(FaceRef(0)).unwrap();
        let edge_sides = face
            .adjacency
            .iter()
            .flatten()
            .filter(|a| matches!(a, Adjacent::Edge(_)))
            .count();
        assert_eq!(edge_sides, 16);
        assert!(face.adjacency.iter().flatten().all(|a| *a != Adjacent::None));
    }

    #[test]
    fn frame_vertices_carry_kinds() {
        let tess = tessellate(MakeGridSheet::new(Point3::origin(), 1.0, 1, 1).execute().unwrap());
        let face = tess.face(FaceRef(0)).unwrap();
        let nodes = face.kinds[..face.frame_count]
            .iter()
            .filter(|k| matches!(k, VertexKind::Node(_)))
            .count();
        assert_eq!(nodes, 4);
        assert!(face.kinds[face.frame_count..]
            .iter()
            .all(|k| *k == VertexKind::Interior));
    }

    #[test]
    fn cylinder_side_mesh_lies_on_surface() {
        let tess = tessellate(MakeCylinder::new(Point3::origin(), 1.0, 2.0, 4).execute().unwrap());
        let face = tess.face(FaceRef(0)).unwrap();
        for p in &face.xyz {
            let r = (p.x * p.x + p.y * p.y).sqrt();
            assert!((r - 1.0).abs() < 1e-9);
        }
        let c = centroid(face);
        assert!(c.x > 0.0 && c.y > 0.0);
    }
}
