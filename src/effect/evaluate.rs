//! Evaluation, inversion and parameter queries on effective entities.
//!
//! Effective edges evaluate the real edge under the covering segment and blend
//! in the tessellation deflection near segment ends. Effective faces do the
//! same per patch; composites first map the global uv into the owning patch.
//! Wherever a blend or a global parametrization is involved, derivatives are
//! taken by central finite differences with [`EffectParams::micro_step`].
//!
//! [`EffectParams::micro_step`]: super::EffectParams::micro_step

use crate::brep::{EdgeKind, EdgeRef, FaceRef, MassProperties, NodeRef, RealRef, Sense};
use crate::error::{GeometryError, MappingError, RangeError, Result, TopologyError};
use crate::geometry::{CurveEvaluation, SurfaceEvaluation};
use crate::math::triangle_2d::locate;
use crate::math::{BoundingBox, Point2, Point3, Vector2, TOLERANCE};

use super::entity::{EEdgeData, EFaceData, Patch};
use super::{EBody, EEdgeId, EFaceId, EntityRef};

/// Real location of an effective edge parameter.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EdgeMapping {
    pub edge: EdgeRef,
    pub t: f64,
}

/// Real location of an effective face parameter.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FaceMapping {
    pub face: FaceRef,
    pub uv: Point2,
}

/// One entry of [`EBody::edge_list`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SegmentInfo {
    pub edge: EdgeRef,
    pub sense: Sense,
    /// Effective parameter where the segment starts.
    pub t_start: f64,
}

impl EBody {
    /// Evaluates an effective edge and its first two derivatives.
    ///
    /// # Errors
    ///
    /// Returns [`GeometryError::Degenerate`] for degenerate edges, or an
    /// error if the edge does not exist or the real evaluation fails.
    pub fn evaluate_edge(&self, id: EEdgeId, t: f64) -> Result<CurveEvaluation> {
        let edge = self.graph.edge(id)?;
        if edge.kind == EdgeKind::Degenerate {
            return Err(GeometryError::Degenerate("degenerate effective edge".into()).into());
        }
        let (mut eval, blended) = self.edge_point(edge, t)?;
        if blended {
            let h = self.params().micro_step;
            let plus = self.edge_point(edge, t + h)?.0.point;
            let minus = self.edge_point(edge, t - h)?.0.point;
            eval.d1 = (plus - minus) / (2.0 * h);
            eval.d2 = (plus.coords - 2.0 * eval.point.coords + minus.coords) / (h * h);
        }
        Ok(eval)
    }

    /// Point on the covering segment with its deflection blended in; the
    /// flag reports whether a non-zero deflection contributed.
    fn edge_point(&self, edge: &EEdgeData, t: f64) -> Result<(CurveEvaluation, bool)> {
        let (_, seg) = edge
            .segment_at(t)
            .ok_or_else(|| TopologyError::InvalidTopology("effective edge has no segments".into()))?;
        let tx = seg.to_local(t);
        let mut eval = self.body().evaluate_edge(seg.edge, tx)?;
        if seg.sense == Sense::Reverse {
            eval.d1 = -eval.d1;
        }
        let (w_start, w_end) = seg.blend_weights(tx);
        let mut blended = false;
        for (w, d) in [(w_start, seg.d_start), (w_end, seg.d_end)] {
            if w > 0.0 && d.norm() > 0.0 {
                eval.point += d * w;
                blended = true;
            }
        }
        Ok((eval, blended))
    }

    /// Evaluates an effective face and its partial derivatives.
    ///
    /// # Errors
    ///
    /// Returns an error if the face does not exist, the uv cannot be located,
    /// or the real evaluation fails.
    pub fn evaluate_face(&self, id: EFaceId, uv: &Point2) -> Result<SurfaceEvaluation> {
        let face = self.graph.face(id)?;
        let (eval, approximate) = self.face_point(face, uv)?;
        if !approximate {
            return Ok(eval);
        }
        let h = self.params().micro_step;
        let p = |du: f64, dv: f64| -> Result<Point3> {
            Ok(self.face_point(face, &Point2::new(uv.x + du, uv.y + dv))?.0.point)
        };
        let (up, um, vp, vm) = (p(h, 0.0)?, p(-h, 0.0)?, p(0.0, h)?, p(0.0, -h)?);
        let (pp, pm, mp, mm) = (p(h, h)?, p(h, -h)?, p(-h, h)?, p(-h, -h)?);
        let center = eval.point.coords;
        Ok(SurfaceEvaluation {
            point: eval.point,
            du: (up - um) / (2.0 * h),
            dv: (vp - vm) / (2.0 * h),
            duu: (up.coords - 2.0 * center + um.coords) / (h * h),
            duv: (pp.coords - pm.coords - mp.coords + mm.coords) / (4.0 * h * h),
            dvv: (vp.coords - 2.0 * center + vm.coords) / (h * h),
        })
    }

    /// Point on the face at `uv`; the flag is set when the derivatives of the
    /// real evaluation do not describe the effective surface.
    fn face_point(&self, face: &EFaceData, uv: &Point2) -> Result<(SurfaceEvaluation, bool)> {
        match &face.uvmap {
            None => {
                let patch = first_patch(face)?;
                let hit = locate(&patch.uvs, &patch.tris, uv, patch.last_hit.get())
                    .ok_or(MappingError::NotLocated { u: uv.x, v: uv.y })?;
                patch.last_hit.set(hit.tri);
                self.patch_point(patch, hit.tri, &hit.weights, uv)
            }
            Some(map) => {
                let loc = map.locate(uv)?;
                let (patch, tri) = patch_triangle(face, loc.patch, loc.tri)?;
                let local = local_uv(patch, tri, &loc.weights)?;
                let (eval, _) = self.patch_point(patch, tri, &loc.weights, &local)?;
                Ok((eval, true))
            }
        }
    }

    fn patch_point(
        &self,
        patch: &Patch,
        tri: usize,
        weights: &[f64; 3],
        uv: &Point2,
    ) -> Result<(SurfaceEvaluation, bool)> {
        let mut eval = self.body().evaluate_face(patch.face, uv)?;
        let mut blended = false;
        if let Some(corners) = patch.deflect_tris.get(tri) {
            for (corner, w) in corners.iter().zip(weights) {
                if let Some(d) = corner.and_then(|i| patch.deflect.get(i)) {
                    if d.norm() > 0.0 {
                        eval.point += d * *w;
                        blended = true;
                    }
                }
            }
        }
        Ok((eval, blended))
    }

    /// Closest effective parameter and point on an edge.
    ///
    /// # Errors
    ///
    /// Returns an error if the edge does not exist or has no segments.
    pub fn inverse_edge(&self, id: EEdgeId, point: &Point3) -> Result<(f64, Point3)> {
        let edge = self.graph.edge(id)?;
        let mut best: Option<(f64, f64)> = None;
        for seg in &edge.segments {
            let (tx, p) = self.body().inverse_edge(seg.edge, point)?;
            let dist = (p - point).norm();
            if best.is_none_or(|(d, _)| dist < d) {
                best = Some((dist, seg.to_effective(tx)));
            }
        }
        let (_, t) =
            best.ok_or_else(|| TopologyError::InvalidTopology("effective edge has no segments".into()))?;
        Ok((t, self.evaluate_edge(id, t)?.point))
    }

    /// Closest effective parameters and point on a face.
    ///
    /// # Errors
    ///
    /// Returns an error if the face does not exist or a composite uv cannot
    /// be mapped back.
    pub fn inverse_face(&self, id: EFaceId, point: &Point3) -> Result<(Point2, Point3)> {
        let face = self.graph.face(id)?;
        // on equal distance a patch containing the foot point wins
        let mut best: Option<(f64, bool, usize, Point2)> = None;
        for (i, patch) in face.patches.iter().enumerate() {
            let (uv, p) = self.body().inverse_face(patch.face, point)?;
            let dist = (p - point).norm();
            let inside = self.body().in_face(patch.face, &uv)?;
            let better = best.is_none_or(|(d, was_inside, _, _)| {
                dist < d - TOLERANCE || (dist <= d + TOLERANCE && inside && !was_inside)
            });
            if better {
                best = Some((dist, inside, i, uv));
            }
        }
        let (_, _, index, local) =
            best.ok_or_else(|| TopologyError::InvalidTopology("effective face has no patches".into()))?;
        let uv = match &face.uvmap {
            None => local,
            Some(map) => {
                let patch = &face.patches[index];
                let hit = locate(&patch.uvs, &patch.tris, &local, patch.last_hit.get())
                    .ok_or(MappingError::NotLocated { u: local.x, v: local.y })?;
                map.to_global(patch.start + hit.tri, &hit.weights)?
            }
        };
        Ok((uv, self.evaluate_face(id, &uv)?.point))
    }

    /// The real edge and parameter under an effective edge parameter.
    ///
    /// # Errors
    ///
    /// Returns an error if the edge does not exist or has no segments.
    pub fn effective_edge_map(&self, id: EEdgeId, t: f64) -> Result<EdgeMapping> {
        let (_, seg) = self
            .graph
            .edge(id)?
            .segment_at(t)
            .ok_or_else(|| TopologyError::InvalidTopology("effective edge has no segments".into()))?;
        Ok(EdgeMapping {
            edge: seg.edge,
            t: seg.to_local(t),
        })
    }

    /// The real face and parameters under an effective face parameter.
    ///
    /// # Errors
    ///
    /// Returns an error if the face does not exist or the uv cannot be
    /// located in a composite.
    pub fn effective_face_map(&self, id: EFaceId, uv: &Point2) -> Result<FaceMapping> {
        let face = self.graph.face(id)?;
        match &face.uvmap {
            None => Ok(FaceMapping {
                face: first_patch(face)?.face,
                uv: *uv,
            }),
            Some(map) => {
                let loc = map.locate(uv)?;
                let (patch, tri) = patch_triangle(face, loc.patch, loc.tri)?;
                Ok(FaceMapping {
                    face: patch.face,
                    uv: local_uv(patch, tri, &loc.weights)?,
                })
            }
        }
    }

    /// Real edges making up an effective edge, in order.
    ///
    /// # Errors
    ///
    /// Returns an error if the edge does not exist.
    pub fn edge_list(&self, id: EEdgeId) -> Result<Vec<SegmentInfo>> {
        Ok(self
            .graph
            .edge(id)?
            .segments
            .iter()
            .map(|s| SegmentInfo {
                edge: s.edge,
                sense: s.sense,
                t_start: s.t_start,
            })
            .collect())
    }

    /// Parameters on `face` of the point at `t` along `edge` used with `sense`.
    ///
    /// # Errors
    ///
    /// Returns an error if the face does not use the edge with that sense or
    /// a composite has no samples for it.
    #[allow(clippy::cast_precision_loss)]
    pub fn edge_uv(&self, face_id: EFaceId, edge_id: EEdgeId, sense: Sense, t: f64) -> Result<Point2> {
        let face = self.graph.face(face_id)?;
        let mut owner = None;
        for (lp, _) in &face.loops {
            let data = self.graph.eloop(*lp)?;
            if data.edges.contains(&(edge_id, sense)) {
                owner = Some(data);
                break;
            }
        }
        let owner = owner.ok_or_else(|| {
            TopologyError::InvalidTopology("edge is not used by the face with that sense".into())
        })?;
        let (_, seg) = self
            .graph
            .edge(edge_id)?
            .segment_at(t)
            .ok_or_else(|| TopologyError::InvalidTopology("effective edge has no segments".into()))?;
        let tx = seg.to_local(t);
        let real_sense = sense * seg.sense;

        let Some(map) = &face.uvmap else {
            return self.body().edge_uv(first_patch(face)?.face, seg.edge, real_sense, tx);
        };
        let samples = owner
            .edge_uv(seg.edge, real_sense)
            .ok_or_else(|| TopologyError::InvalidTopology("missing edge samples".into()))?;
        let n = seg.ts.len();
        if n < 2 || samples.indices.len() != n {
            return Err(TopologyError::InvalidTopology("edge samples do not match".into()).into());
        }
        let i = seg.ts[..n - 1].iter().rposition(|s| *s <= tx).unwrap_or(0);
        let span = seg.ts[i + 1] - seg.ts[i];
        let f = if span > 0.0 { (tx - seg.ts[i]) / span } else { 0.0 };
        let uv_at = |k: usize| -> Result<Point2> {
            let v = samples.indices[k]
                .ok_or_else(|| TopologyError::InvalidTopology("unfilled edge sample".into()))?;
            map.vertex_uv(v)
        };
        let (a, b) = (uv_at(i)?, uv_at(i + 1)?);
        Ok(a + (b - a) * f)
    }

    /// Parameters of a real node on a face bounded by it.
    ///
    /// # Errors
    ///
    /// Returns an error if no edge of the face passes through the node.
    pub fn node_uv(&self, face_id: EFaceId, node: NodeRef) -> Result<Point2> {
        let face = self.graph.face(face_id)?;
        for (lp, _) in &face.loops {
            for &(edge_id, sense) in &self.graph.eloop(*lp)?.edges {
                let edge = self.graph.edge(edge_id)?;
                let t = if edge.nodes[0] == node {
                    Some(edge.t_range[0])
                } else if edge.nodes[1] == node {
                    Some(edge.t_range[1])
                } else {
                    edge.segments
                        .iter()
                        .find(|s| s.interior_node == Some(node))
                        .map(|s| s.t_start)
                };
                if let Some(t) = t {
                    return self.edge_uv(face_id, edge_id, sense, t);
                }
            }
        }
        Err(TopologyError::InvalidTopology(format!("node {} is not on the face", node.0)).into())
    }

    /// Parameter range of an edge and whether it is periodic.
    ///
    /// # Errors
    ///
    /// Returns an error if the edge does not exist.
    pub fn edge_range(&self, id: EEdgeId) -> Result<([f64; 2], bool)> {
        let edge = self.graph.edge(id)?;
        Ok((edge.t_range, edge.kind == EdgeKind::OneNode))
    }

    /// `[u_min, u_max, v_min, v_max]` of a face.
    ///
    /// # Errors
    ///
    /// Returns an error if the face does not exist.
    pub fn face_range(&self, id: EFaceId) -> Result<[f64; 4]> {
        let face = self.graph.face(id)?;
        match &face.uvmap {
            Some(map) => Ok(map.range()),
            None => Ok(self.body().face(first_patch(face)?.face)?.range),
        }
    }

    /// Length of an edge between two effective parameters.
    ///
    /// # Errors
    ///
    /// Returns an error if the edge does not exist.
    pub fn arc_length(&self, id: EEdgeId, t1: f64, t2: f64) -> Result<f64> {
        let (lo, hi) = (t1.min(t2), t1.max(t2));
        let mut length = 0.0;
        for seg in &self.graph.edge(id)?.segments {
            let (a, b) = (lo.max(seg.t_start), hi.min(seg.t_end));
            if a < b {
                let (la, lb) = (seg.to_local(a), seg.to_local(b));
                length += self.body().arc_length(seg.edge, la.min(lb), la.max(lb))?;
            }
        }
        Ok(length)
    }

    /// Total area of a face's patches.
    ///
    /// # Errors
    ///
    /// Returns an error if the face does not exist.
    pub fn area(&self, id: EFaceId) -> Result<f64> {
        self.graph
            .face(id)?
            .patches
            .iter()
            .map(|p| self.body().face_area(p.face))
            .sum()
    }

    /// Whether `uv` lies on the face.
    ///
    /// # Errors
    ///
    /// Returns an error if the face does not exist.
    pub fn in_face(&self, id: EFaceId, uv: &Point2) -> Result<bool> {
        let face = self.graph.face(id)?;
        match &face.uvmap {
            None => self.body().in_face(first_patch(face)?.face, uv),
            Some(map) => Ok(map.locate(uv)?.inside),
        }
    }

    /// Bounding box of any entity, from the real boxes it covers.
    ///
    /// # Errors
    ///
    /// Returns an error if the entity does not exist.
    pub fn bounding_box(&self, entity: EntityRef) -> Result<BoundingBox> {
        let mut bbox: Option<BoundingBox> = None;
        for r in self.real_entities(entity)? {
            let b = self.body().bounding_box(r)?;
            bbox = Some(bbox.map_or(b, |acc| acc.union(&b)));
        }
        bbox.ok_or_else(|| GeometryError::Degenerate("entity has no geometry".into()).into())
    }

    /// Mass properties of the real edges or faces under `entity`, or of the
    /// whole real body.
    ///
    /// # Errors
    ///
    /// Returns an error if the entity does not exist or has no measure.
    pub fn mass_properties(&self, entity: EntityRef) -> Result<MassProperties> {
        self.body().mass_properties(&self.real_entities(entity)?)
    }

    /// Real entities covered by `entity`, segment by segment and patch by patch.
    fn real_entities(&self, entity: EntityRef) -> Result<Vec<RealRef>> {
        Ok(match entity {
            EntityRef::Body => vec![RealRef::Body],
            EntityRef::Node(n) => vec![RealRef::Node(n)],
            EntityRef::Edge(e) => vec![RealRef::Edge(e)],
            EntityRef::Face(f) => vec![RealRef::Face(f)],
            EntityRef::EEdge(id) => self.segment_edges(id)?,
            EntityRef::ELoop(id) => {
                let mut reals = Vec::new();
                for (e, _) in &self.graph.eloop(id)?.edges {
                    reals.extend(self.segment_edges(*e)?);
                }
                reals
            }
            EntityRef::EFace(id) => self.patch_faces(id)?,
            EntityRef::EShell(id) => {
                let mut reals = Vec::new();
                for f in &self.graph.shell(id)?.faces {
                    reals.extend(self.patch_faces(*f)?);
                }
                reals
            }
        })
    }

    fn segment_edges(&self, id: EEdgeId) -> Result<Vec<RealRef>> {
        Ok(self
            .graph
            .edge(id)?
            .segments
            .iter()
            .map(|s| RealRef::Edge(s.edge))
            .collect())
    }

    fn patch_faces(&self, id: EFaceId) -> Result<Vec<RealRef>> {
        Ok(self
            .graph
            .face(id)?
            .patches
            .iter()
            .map(|p| RealRef::Face(p.face))
            .collect())
    }
}

fn first_patch(face: &EFaceData) -> Result<&Patch> {
    face.patches
        .first()
        .ok_or_else(|| TopologyError::InvalidTopology("effective face has no patches".into()).into())
}

/// The patch owning a composite triangle, with the triangle's local index.
fn patch_triangle(face: &EFaceData, patch: usize, tri: usize) -> Result<(&Patch, usize)> {
    let p = face.patches.get(patch).ok_or(RangeError::Index {
        kind: "patch",
        index: patch,
        count: face.patches.len(),
    })?;
    let local = tri
        .checked_sub(p.start)
        .filter(|l| *l < p.tris.len())
        .ok_or(RangeError::Index {
            kind: "patch triangle",
            index: tri,
            count: p.tris.len(),
        })?;
    Ok((p, local))
}

/// Patch uv at barycentric `weights` of local triangle `tri`.
fn local_uv(patch: &Patch, tri: usize, weights: &[f64; 3]) -> Result<Point2> {
    let corners = patch.tris.get(tri).ok_or(RangeError::Index {
        kind: "patch triangle",
        index: tri,
        count: patch.tris.len(),
    })?;
    let mut uv = Vector2::zeros();
    for (v, w) in corners.iter().zip(weights) {
        let p = patch.uvs.get(*v).ok_or(RangeError::Index {
            kind: "patch vertex",
            index: *v,
            count: patch.uvs.len(),
        })?;
        uv += p.coords * *w;
    }
    Ok(Point2::from(uv))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;
    use crate::effect::tests::{grid, unit_box};
    use crate::effect::MakeComposite;
    use crate::math::Vector3;

    #[test]
    fn single_patch_face_matches_real_surface() {
        let ebody = unit_box();
        let id = ebody.efaces()[1];
        let uv = Point2::new(0.3, 0.6);
        let eval = ebody.evaluate_face(id, &uv).unwrap();
        let real = ebody.body().evaluate_face(FaceRef(1), &uv).unwrap();
        assert_eq!(eval, real);
        assert_relative_eq!(eval.point.z, 1.0, epsilon = 1e-12);
    }

    #[test]
    fn edge_evaluation_and_inverse_roundtrip() {
        let ebody = unit_box();
        let id = ebody.eedges()[0];
        let ([t0, t1], periodic) = ebody.edge_range(id).unwrap();
        assert!(!periodic);
        let t = t0 + 0.37 * (t1 - t0);
        let eval = ebody.evaluate_edge(id, t).unwrap();
        let (back, point) = ebody.inverse_edge(id, &eval.point).unwrap();
        assert_relative_eq!(back, t, epsilon = 1e-9);
        assert!((point - eval.point).norm() < 1e-9);
        assert_relative_eq!(eval.d1.norm(), 1.0, epsilon = 1e-12);
    }

    #[test]
    fn face_inverse_roundtrip() {
        let ebody = unit_box();
        let id = ebody.efaces()[3];
        let target = Point3::new(0.25, 1.0, 0.75);
        let (uv, point) = ebody.inverse_face(id, &(target + Vector3::new(0.0, 0.1, 0.0))).unwrap();
        assert!((point - target).norm() < 1e-9);
        let again = ebody.evaluate_face(id, &uv).unwrap();
        assert!((again.point - target).norm() < 1e-9);
    }

    #[test]
    fn lengths_areas_and_ranges() {
        let ebody = unit_box();
        let edge = ebody.eedges()[5];
        let ([t0, t1], _) = ebody.edge_range(edge).unwrap();
        assert_relative_eq!(ebody.arc_length(edge, t0, t1).unwrap(), 1.0, epsilon = 1e-12);
        assert_relative_eq!(ebody.arc_length(edge, t1, t0).unwrap(), 1.0, epsilon = 1e-12);
        let face = ebody.efaces()[0];
        assert_relative_eq!(ebody.area(face).unwrap(), 1.0, epsilon = 1e-12);
        let r = ebody.face_range(face).unwrap();
        assert_relative_eq!(r[1] - r[0], 1.0, epsilon = 1e-12);
        assert!(ebody.in_face(face, &Point2::new(0.5, 0.5)).unwrap());
        assert!(!ebody.in_face(face, &Point2::new(1.5, 0.5)).unwrap());
    }

    #[test]
    fn mappings_and_segment_lists() {
        let ebody = unit_box();
        let edge = ebody.eedges()[2];
        let list = ebody.edge_list(edge).unwrap();
        assert_eq!(list.len(), 1);
        assert_eq!(list[0].edge, EdgeRef(2));
        let map = ebody.effective_edge_map(edge, 0.5).unwrap();
        assert_eq!(map.edge, EdgeRef(2));
        assert_relative_eq!(map.t, 0.5, epsilon = 1e-12);
        let face = ebody.efaces()[4];
        let fm = ebody.effective_face_map(face, &Point2::new(0.2, 0.3)).unwrap();
        assert_eq!(fm.face, FaceRef(4));
    }

    #[test]
    fn node_and_edge_uvs_on_single_patch() {
        let ebody = unit_box();
        let face = ebody.efaces()[0];
        let lp = ebody.eloop(ebody.eface(face).unwrap().loops[0].0).unwrap();
        let (edge, sense) = lp.edges[0];
        let data = ebody.eedge(edge).unwrap();
        let start = match sense {
            Sense::Forward => data.t_range[0],
            Sense::Reverse => data.t_range[1],
        };
        let uv = ebody.edge_uv(face, edge, sense, start).unwrap();
        let node = data.ends(sense).0;
        let node_uv = ebody.node_uv(face, node).unwrap();
        assert!((uv - node_uv).norm() < 1e-12);
        assert!(ebody.edge_uv(face, edge, sense.flip(), start).is_err());
    }

    #[test]
    fn boxes_cover_real_geometry() {
        let ebody = unit_box();
        let bbox = ebody.bounding_box(EntityRef::EShell(ebody.eshells()[0])).unwrap();
        assert!((bbox.max - Point3::new(1.0, 1.0, 1.0)).norm() < 1e-12);
        let face = ebody.bounding_box(EntityRef::EFace(ebody.efaces()[0])).unwrap();
        assert!(face.max.z.abs() < 1e-12);
    }

    #[test]
    fn mass_properties_follow_the_real_entities() {
        let ebody = unit_box();
        let solid = ebody.mass_properties(EntityRef::Body).unwrap();
        assert_relative_eq!(solid.volume, 1.0, epsilon = 1e-9);
        assert!((solid.center - Point3::new(0.5, 0.5, 0.5)).norm() < 1e-9);
        assert_relative_eq!(solid.inertia[(2, 2)], 1.0 / 6.0, epsilon = 1e-9);

        let shell = ebody.mass_properties(EntityRef::EShell(ebody.eshells()[0])).unwrap();
        assert_relative_eq!(shell.area, 6.0, epsilon = 1e-9);
        let edge = ebody.mass_properties(EntityRef::EEdge(ebody.eedges()[0])).unwrap();
        assert_relative_eq!(edge.length, 1.0, epsilon = 1e-9);
        let face = ebody.mass_properties(EntityRef::EFace(ebody.efaces()[0])).unwrap();
        assert_relative_eq!(face.area, 1.0, epsilon = 1e-9);
        assert!(ebody.mass_properties(EntityRef::Node(NodeRef(0))).is_err());

        let mut sheet = grid(2, 1);
        let id = MakeComposite::new(&[FaceRef(0), FaceRef(1)])
            .execute(&mut sheet)
            .unwrap();
        let plate = sheet.mass_properties(EntityRef::EFace(id)).unwrap();
        assert_relative_eq!(plate.area, 2.0, epsilon = 1e-9);
        assert!((plate.center - Point3::new(1.0, 0.5, 0.0)).norm() < 1e-9);
        // m (a^2 + b^2) / 12 for a 2 x 1 plate of mass 2
        assert_relative_eq!(plate.inertia[(2, 2)], 5.0 / 6.0, epsilon = 1e-9);
        assert_relative_eq!(plate.inertia[(0, 0)], 1.0 / 6.0, epsilon = 1e-9);
    }
}
