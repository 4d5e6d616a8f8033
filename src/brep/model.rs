use std::collections::HashMap;
use std::f64::consts::TAU;

use crate::error::{RangeError, Result};
use crate::geometry::{Circle, Curve, CurveEvaluation, Cylinder, Line, Plane, Surface, SurfaceEvaluation};
use crate::math::polygon_2d::{contains_point, signed_area};
use crate::math::{BoundingBox, Point2, Point3, Vector3, TOLERANCE};

use super::mass::{triangle_points, Moments, GAUSS_3};
use super::{
    AttrValue, Attributes, BodyKind, Closure, EdgeKind, EdgeRef, EdgeTopology, FaceRef,
    FaceTopology, LoopRef, MassProperties, NodeRef, RealBody, RealRef, Sense, ShellRef, ShellTopology,
};

/// Samples per curved edge when building boundary polygons.
const ARC_SAMPLES: usize = 24;

/// The geometric curve carried by a model edge.
#[derive(Debug, Clone)]
pub(super) enum EdgeCurve {
    Line(Line),
    Circle(Circle),
}

impl EdgeCurve {
    pub(super) fn curve(&self) -> &dyn Curve {
        match self {
            Self::Line(l) => l,
            Self::Circle(c) => c,
        }
    }
}

/// The geometric surface carried by a model face.
#[derive(Debug, Clone)]
pub(super) enum FaceSurface {
    Plane(Plane),
    Cylinder(Cylinder),
}

impl FaceSurface {
    pub(super) fn surface(&self) -> &dyn Surface {
        match self {
            Self::Plane(p) => p,
            Self::Cylinder(c) => c,
        }
    }
}

#[derive(Debug, Clone)]
pub(super) struct EdgeData {
    pub curve: EdgeCurve,
    pub nodes: [NodeRef; 2],
    pub range: [f64; 2],
}

#[derive(Debug, Clone)]
pub(super) struct FaceData {
    pub surface: FaceSurface,
    pub sense: Sense,
    pub loops: Vec<(LoopRef, Sense)>,
    pub range: [f64; 4],
}

#[derive(Debug, Clone)]
pub(super) struct ShellData {
    pub closure: Closure,
    pub faces: Vec<FaceRef>,
}

/// In-memory boundary representation over analytic lines, arcs, planes and
/// cylinders.
///
/// Built through [`ModelBuilder`](super::ModelBuilder) or the
/// [`primitives`](super::primitives). Entities are addressed by dense 0-based
/// indices in creation order.
#[derive(Debug, Clone)]
pub struct Model {
    pub(super) kind: BodyKind,
    pub(super) nodes: Vec<Point3>,
    pub(super) edges: Vec<EdgeData>,
    pub(super) loops: Vec<Vec<(EdgeRef, Sense)>>,
    pub(super) faces: Vec<FaceData>,
    pub(super) shells: Vec<ShellData>,
    pub(super) attributes: HashMap<RealRef, Attributes>,
}

fn out_of_range(kind: &'static str, index: usize, count: usize) -> RangeError {
    RangeError::Index { kind, index, count }
}

/// Shifts a periodic `u` by whole turns so it lands closest to `[lo, hi]`.
pub(super) fn unwrap_into(u: f64, lo: f64, hi: f64) -> f64 {
    let mid = 0.5 * (lo + hi);
    u + TAU * ((mid - u) / TAU).round()
}

impl Model {
    /// Attaches an attribute to a real entity.
    ///
    /// # Errors
    ///
    /// Returns an error if the entity does not exist or the name is invalid.
    pub fn set_attribute(&mut self, entity: RealRef, name: &str, value: AttrValue) -> Result<()> {
        self.check_entity(entity)?;
        self.attributes.entry(entity).or_default().set(name, value)
    }

    /// All attributes attached to a real entity.
    #[must_use]
    pub fn attributes(&self, entity: RealRef) -> Option<&Attributes> {
        self.attributes.get(&entity)
    }

    pub(super) fn check_entity(&self, entity: RealRef) -> Result<()> {
        let (kind, index, count) = match entity {
            RealRef::Body => return Ok(()),
            RealRef::Node(n) => ("node", n.0, self.nodes.len()),
            RealRef::Edge(e) => ("edge", e.0, self.edges.len()),
            RealRef::Loop(l) => ("loop", l.0, self.loops.len()),
            RealRef::Face(f) => ("face", f.0, self.faces.len()),
            RealRef::Shell(s) => ("shell", s.0, self.shells.len()),
        };
        if index < count {
            Ok(())
        } else {
            Err(out_of_range(kind, index, count).into())
        }
    }

    fn edge_data(&self, edge: EdgeRef) -> Result<&EdgeData> {
        self.edges
            .get(edge.0)
            .ok_or_else(|| out_of_range("edge", edge.0, self.edges.len()).into())
    }

    fn face_data(&self, face: FaceRef) -> Result<&FaceData> {
        self.faces
            .get(face.0)
            .ok_or_else(|| out_of_range("face", face.0, self.faces.len()).into())
    }

    fn loop_data(&self, lp: LoopRef) -> Result<&[(EdgeRef, Sense)]> {
        self.loops
            .get(lp.0)
            .map(Vec::as_slice)
            .ok_or_else(|| out_of_range("loop", lp.0, self.loops.len()).into())
    }

    /// Faces using `edge`, with the sense of each use.
    fn edge_uses(&self, edge: EdgeRef) -> Vec<(FaceRef, Sense)> {
        let mut uses = Vec::new();
        for (fi, face) in self.faces.iter().enumerate() {
            for (lp, _) in &face.loops {
                for &(e, s) in &self.loops[lp.0] {
                    if e == edge {
                        uses.push((FaceRef(fi), s));
                    }
                }
            }
        }
        uses
    }

    fn face_uv(&self, face: &FaceData, point: &Point3) -> Point2 {
        let surface = face.surface.surface();
        let mut uv = surface.inverse(point);
        if surface.is_u_periodic() {
            uv.x = unwrap_into(uv.x, face.range[0], face.range[1]);
        }
        uv
    }

    /// Unit normal of a face at the point closest to `point`, oriented by the
    /// face sense.
    fn oriented_normal(&self, face: FaceRef, point: &Point3) -> Result<Vector3> {
        let data = self.face_data(face)?;
        let uv = self.face_uv(data, point);
        let eval = data.surface.surface().evaluate(&uv)?;
        let n = eval
            .normal()
            .try_normalize(TOLERANCE)
            .ok_or(crate::error::GeometryError::ZeroVector)?;
        Ok(n * f64::from(data.sense.sign()))
    }

    /// Sampled parameters along an edge in the direction of `sense`,
    /// excluding the final end point.
    fn polygon_params(&self, edge: &EdgeData, sense: Sense) -> Vec<f64> {
        let n = if matches!(edge.curve, EdgeCurve::Line(_)) { 1 } else { ARC_SAMPLES };
        #[allow(clippy::cast_precision_loss)]
        (0..n)
            .map(|i| {
                let f = i as f64 / n as f64;
                let f = if sense.is_forward() { f } else { 1.0 - f };
                edge.range[0] + f * (edge.range[1] - edge.range[0])
            })
            .collect()
    }

    /// Boundary polygons of a face in its own parameter space.
    fn loop_polygons(&self, face: FaceRef) -> Result<Vec<Vec<Point2>>> {
        let data = self.face_data(face)?;
        let mut polygons = Vec::with_capacity(data.loops.len());
        for (lp, _) in &data.loops {
            let mut poly = Vec::new();
            for &(edge, sense) in self.loop_data(*lp)? {
                let edata = self.edge_data(edge)?;
                for t in self.polygon_params(edata, sense) {
                    let p = edata.curve.curve().evaluate(t)?.point;
                    poly.push(self.face_uv(data, &p));
                }
            }
            polygons.push(poly);
        }
        Ok(polygons)
    }

    fn edge_box(&self, edge: EdgeRef) -> Result<BoundingBox> {
        let data = self.edge_data(edge)?;
        let curve = data.curve.curve();
        let mut bbox = BoundingBox::from_point(curve.evaluate(data.range[0])?.point);
        for i in 1..=ARC_SAMPLES {
            #[allow(clippy::cast_precision_loss)]
            let f = i as f64 / ARC_SAMPLES as f64;
            let t = data.range[0] + f * (data.range[1] - data.range[0]);
            bbox.include(&curve.evaluate(t)?.point);
        }
        Ok(bbox)
    }

    fn union_edges(&self, edges: impl IntoIterator<Item = EdgeRef>) -> Result<Option<BoundingBox>> {
        let mut bbox: Option<BoundingBox> = None;
        for e in edges {
            let b = self.edge_box(e)?;
            bbox = Some(bbox.map_or(b, |acc| acc.union(&b)));
        }
        Ok(bbox)
    }

    fn face_edges(&self, face: FaceRef) -> Result<Vec<EdgeRef>> {
        let data = self.face_data(face)?;
        let mut edges = Vec::new();
        for (lp, _) in &data.loops {
            edges.extend(self.loop_data(*lp)?.iter().map(|(e, _)| *e));
        }
        Ok(edges)
    }

    /// Adds the curve of `edge` to `moments`; returns its length.
    #[allow(clippy::cast_precision_loss)]
    fn edge_moments(&self, edge: EdgeRef, moments: &mut Moments) -> Result<f64> {
        let data = self.edge_data(edge)?;
        let curve = data.curve.curve();
        let [t0, t1] = data.range;
        let step = (t1 - t0) / ARC_SAMPLES as f64;
        let mut length = 0.0;
        for k in 0..ARC_SAMPLES {
            let start = t0 + step * k as f64;
            for &(s, w) in &GAUSS_3 {
                let eval = curve.evaluate(start + s * step)?;
                let dl = w * step.abs() * eval.d1.norm();
                moments.add(dl, &eval.point);
                length += dl;
            }
        }
        Ok(length)
    }

    /// Adds the surface of `face` to `surface` and, when given, the volume
    /// behind it to `enclosed`; returns its area.
    ///
    /// The uv region is integrated as a fan of signed triangles over the
    /// boundary polygons.
    fn face_moments(
        &self,
        face: FaceRef,
        surface: &mut Moments,
        mut enclosed: Option<&mut Moments>,
    ) -> Result<f64> {
        let data = self.face_data(face)?;
        let geometry = data.surface.surface();
        let polygons = self.loop_polygons(face)?;
        let orientation = if polygons.iter().map(|p| signed_area(p)).sum::<f64>() < 0.0 {
            -1.0
        } else {
            1.0
        };
        let Some(origin) = polygons.first().and_then(|p| p.first()).copied() else {
            return Ok(0.0);
        };
        let mut area = 0.0;
        for poly in &polygons {
            for (k, a) in poly.iter().enumerate() {
                let b = &poly[(k + 1) % poly.len()];
                for (uv, w) in triangle_points(&origin, a, b) {
                    let eval = geometry.evaluate(&uv)?;
                    let normal = eval.normal();
                    let da = orientation * w * normal.norm();
                    surface.add(da, &eval.point);
                    area += da;
                    if let (Some(m), Some(n)) = (enclosed.as_deref_mut(), normal.try_normalize(TOLERANCE)) {
                        m.add_enclosed(da, &eval.point, &(n * f64::from(data.sense.sign())));
                    }
                }
            }
        }
        Ok(area)
    }
}

impl RealBody for Model {
    fn kind(&self) -> BodyKind {
        self.kind
    }

    fn node_count(&self) -> usize {
        self.nodes.len()
    }

    fn edge_count(&self) -> usize {
        self.edges.len()
    }

    fn loop_count(&self) -> usize {
        self.loops.len()
    }

    fn face_count(&self) -> usize {
        self.faces.len()
    }

    fn shell_count(&self) -> usize {
        self.shells.len()
    }

    fn node_point(&self, node: NodeRef) -> Result<Point3> {
        self.nodes
            .get(node.0)
            .copied()
            .ok_or_else(|| out_of_range("node", node.0, self.nodes.len()).into())
    }

    fn edge(&self, edge: EdgeRef) -> Result<EdgeTopology> {
        let data = self.edge_data(edge)?;
        let kind = if data.nodes[0] == data.nodes[1] {
            EdgeKind::OneNode
        } else {
            EdgeKind::TwoNode
        };
        Ok(EdgeTopology {
            kind,
            nodes: data.nodes,
            range: data.range,
        })
    }

    fn loop_edges(&self, lp: LoopRef) -> Result<Vec<(EdgeRef, Sense)>> {
        Ok(self.loop_data(lp)?.to_vec())
    }

    fn face(&self, face: FaceRef) -> Result<FaceTopology> {
        let data = self.face_data(face)?;
        Ok(FaceTopology {
            sense: data.sense,
            loops: data.loops.clone(),
            range: data.range,
        })
    }

    fn shell(&self, shell: ShellRef) -> Result<ShellTopology> {
        let data = self
            .shells
            .get(shell.0)
            .ok_or_else(|| out_of_range("shell", shell.0, self.shells.len()))?;
        Ok(ShellTopology {
            closure: data.closure,
            faces: data.faces.clone(),
        })
    }

    fn shell_senses(&self) -> Vec<Sense> {
        match self.kind {
            BodyKind::Solid => vec![Sense::Forward; self.shells.len()],
            _ => Vec::new(),
        }
    }

    fn evaluate_edge(&self, edge: EdgeRef, t: f64) -> Result<CurveEvaluation> {
        self.edge_data(edge)?.curve.curve().evaluate(t)
    }

    fn evaluate_face(&self, face: FaceRef, uv: &Point2) -> Result<SurfaceEvaluation> {
        self.face_data(face)?.surface.surface().evaluate(uv)
    }

    fn inverse_edge(&self, edge: EdgeRef, point: &Point3) -> Result<(f64, Point3)> {
        let data = self.edge_data(edge)?;
        let curve = data.curve.curve();
        let [t0, t1] = data.range;
        let mut t = curve.inverse(point);
        if curve.is_periodic() {
            t = unwrap_into(t, t0, t1);
        }
        let t = t.clamp(t0.min(t1), t0.max(t1));
        Ok((t, curve.evaluate(t)?.point))
    }

    fn inverse_face(&self, face: FaceRef, point: &Point3) -> Result<(Point2, Point3)> {
        let data = self.face_data(face)?;
        let uv = self.face_uv(data, point);
        let [u0, u1, v0, v1] = data.range;
        let uv = Point2::new(uv.x.clamp(u0, u1), uv.y.clamp(v0, v1));
        Ok((uv, data.surface.surface().evaluate(&uv)?.point))
    }

    fn arc_length(&self, edge: EdgeRef, t1: f64, t2: f64) -> Result<f64> {
        Ok(self.edge_data(edge)?.curve.curve().arc_length(t1, t2))
    }

    fn winding_angle(&self, edge: EdgeRef, t: f64) -> Result<f64> {
        let uses = self.edge_uses(edge);
        let (Some(&(f1, s1)), Some(&(f2, _))) = (uses.first(), uses.get(1)) else {
            return Ok(180.0);
        };
        let eval = self.evaluate_edge(edge, t)?;
        let n1 = self.oriented_normal(f1, &eval.point)?;
        let n2 = self.oriented_normal(f2, &eval.point)?;
        let along1 = eval.d1 * f64::from(s1.sign());
        let phi = n1.dot(&n2).clamp(-1.0, 1.0).acos().to_degrees();
        // material of the second face leaves the edge along n2 x (-along1)
        if n2.cross(&(-along1)).dot(&n1) <= 0.0 {
            Ok(180.0 - phi)
        } else {
            Ok(180.0 + phi)
        }
    }

    fn face_area(&self, face: FaceRef) -> Result<f64> {
        let scale = self.face_data(face)?.surface.surface().area_scale();
        let area: f64 = self.loop_polygons(face)?.iter().map(|p| signed_area(p)).sum();
        Ok(area.abs() * scale)
    }

    fn in_face(&self, face: FaceRef, uv: &Point2) -> Result<bool> {
        Ok(contains_point(&self.loop_polygons(face)?, uv))
    }

    fn edge_uv(&self, face: FaceRef, edge: EdgeRef, _sense: Sense, t: f64) -> Result<Point2> {
        let data = self.face_data(face)?;
        let p = self.evaluate_edge(edge, t)?.point;
        Ok(self.face_uv(data, &p))
    }

    fn bounding_box(&self, entity: RealRef) -> Result<BoundingBox> {
        self.check_entity(entity)?;
        let bbox = match entity {
            RealRef::Node(n) => Some(BoundingBox::from_point(self.nodes[n.0])),
            RealRef::Edge(e) => Some(self.edge_box(e)?),
            RealRef::Loop(l) => self.union_edges(self.loop_data(l)?.iter().map(|(e, _)| *e))?,
            RealRef::Face(f) => self.union_edges(self.face_edges(f)?)?,
            RealRef::Shell(s) => {
                let mut edges = Vec::new();
                for f in &self.shells[s.0].faces {
                    edges.extend(self.face_edges(*f)?);
                }
                self.union_edges(edges)?
            }
            RealRef::Body => self.union_edges((0..self.edges.len()).map(EdgeRef))?,
        };
        bbox.ok_or_else(|| {
            crate::error::GeometryError::Degenerate("entity has no geometry".into()).into()
        })
    }

    fn mass_properties(&self, entities: &[RealRef]) -> Result<MassProperties> {
        for entity in entities {
            self.check_entity(*entity)?;
        }
        let mut moments = Moments::default();
        let (mut volume, mut area, mut length) = (0.0, 0.0, 0.0);
        let all = |pred: fn(&RealRef) -> bool| !entities.is_empty() && entities.iter().all(pred);
        match entities {
            [RealRef::Body] => match self.kind {
                BodyKind::Wire => {
                    for e in 0..self.edges.len() {
                        length += self.edge_moments(EdgeRef(e), &mut moments)?;
                    }
                }
                BodyKind::Sheet => {
                    for f in 0..self.faces.len() {
                        area += self.face_moments(FaceRef(f), &mut moments, None)?;
                    }
                }
                BodyKind::Solid => {
                    let mut surface = Moments::default();
                    for f in 0..self.faces.len() {
                        area += self.face_moments(FaceRef(f), &mut surface, Some(&mut moments))?;
                    }
                    volume = moments.mass();
                }
            },
            _ if all(|e| matches!(e, RealRef::Edge(_))) => {
                for entity in entities {
                    if let RealRef::Edge(e) = entity {
                        length += self.edge_moments(*e, &mut moments)?;
                    }
                }
            }
            _ if all(|e| matches!(e, RealRef::Face(_))) => {
                for entity in entities {
                    if let RealRef::Face(f) = entity {
                        area += self.face_moments(*f, &mut moments, None)?;
                    }
                }
            }
            _ => {
                return Err(RangeError::InvalidArgument(
                    "mass properties need edges, faces or the whole body".into(),
                )
                .into())
            }
        }
        let (center, inertia) = moments.center_and_inertia()?;
        Ok(MassProperties {
            volume,
            area,
            length,
            center,
            inertia,
        })
    }

    fn attribute(&self, entity: RealRef, name: &str) -> Option<&AttrValue> {
        self.attributes.get(&entity)?.get(name)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::brep::primitives::{MakeBox, MakeCylinder, MakeGridSheet};
    use crate::brep::KEEP;

    #[test]
    fn unwrap_into_picks_nearest_turn() {
        let u = unwrap_into(0.0, 1.5 * std::f64::consts::PI, TAU);
        assert!((u - TAU).abs() < 1e-12);
        let u = unwrap_into(-0.5, -1.0, 0.0);
        assert!((u + 0.5).abs() < 1e-12);
    }

    #[test]
    fn box_face_areas() {
        let m = MakeBox::new(Point3::origin(), Point3::new(1.0, 2.0, 3.0))
            .execute()
            .unwrap();
        let total: f64 = (0..6).map(|f| m.face_area(FaceRef(f)).unwrap()).sum();
        assert!((total - 2.0 * (2.0 + 3.0 + 6.0)).abs() < 1e-9);
    }

    #[test]
    fn box_mass_properties() {
        let m = MakeBox::new(Point3::origin(), Point3::new(1.0, 2.0, 3.0))
            .execute()
            .unwrap();
        let props = m.mass_properties(&[RealRef::Body]).unwrap();
        assert!((props.volume - 6.0).abs() < 1e-9);
        assert!((props.area - 22.0).abs() < 1e-9);
        assert!((props.center - Point3::new(0.5, 1.0, 1.5)).norm() < 1e-9);
        // m (b^2 + c^2) / 12 about each axis
        assert!((props.inertia[(0, 0)] - 6.5).abs() < 1e-9);
        assert!((props.inertia[(1, 1)] - 5.0).abs() < 1e-9);
        assert!((props.inertia[(2, 2)] - 2.5).abs() < 1e-9);
        assert!(props.inertia[(0, 1)].abs() < 1e-9);

        let bottom = m.mass_properties(&[RealRef::Face(FaceRef(0))]).unwrap();
        assert!((bottom.area - 2.0).abs() < 1e-9);
        assert!(bottom.volume.abs() < 1e-12);
        assert!(bottom.center.z.abs() < 1e-9);

        assert!(m
            .mass_properties(&[RealRef::Face(FaceRef(0)), RealRef::Edge(EdgeRef(0))])
            .is_err());
        assert!(m.mass_properties(&[]).is_err());
        assert!(m.mass_properties(&[RealRef::Face(FaceRef(9))]).is_err());
    }

    #[test]
    fn arc_mass_properties() {
        let m = MakeCylinder::new(Point3::origin(), 1.0, 2.0, 4).execute().unwrap();
        let props = m.mass_properties(&[RealRef::Edge(EdgeRef(4))]).unwrap();
        assert!((props.length - std::f64::consts::FRAC_PI_2).abs() < 1e-9);
        // a quarter arc's centroid sits 2 sqrt(2) / pi from the axis
        let radial = (props.center.x.powi(2) + props.center.y.powi(2)).sqrt();
        assert!((radial - 2.0 * 2.0_f64.sqrt() / std::f64::consts::PI).abs() < 1e-9);
    }

    #[test]
    fn box_edges_are_convex() {
        let m = MakeBox::new(Point3::origin(), Point3::new(1.0, 1.0, 1.0))
            .execute()
            .unwrap();
        for e in 0..12 {
            let range = m.edge(EdgeRef(e)).unwrap().range;
            let w = m.winding_angle(EdgeRef(e), 0.5 * (range[0] + range[1])).unwrap();
            assert!((w - 90.0).abs() < 1e-9, "edge {e} winding {w}");
        }
    }

    #[test]
    fn cylinder_side_seams_are_flat() {
        let m = MakeCylinder::new(Point3::origin(), 1.0, 2.0, 4).execute().unwrap();
        let seams: Vec<_> = (0..m.edge_count())
            .map(EdgeRef)
            .filter(|&e| {
                let topo = m.edge(e).unwrap();
                let a = m.node_point(topo.nodes[0]).unwrap();
                let b = m.node_point(topo.nodes[1]).unwrap();
                (a.z - b.z).abs() > 1e-9
            })
            .collect();
        assert_eq!(seams.len(), 4);
        for e in seams {
            let w = m.winding_angle(e, 1.0).unwrap();
            assert!((w - 180.0).abs() < 1e-4, "seam winding {w}");
        }
    }

    #[test]
    fn cylinder_side_area() {
        let m = MakeCylinder::new(Point3::origin(), 1.0, 2.0, 4).execute().unwrap();
        let side: f64 = (0..4).map(|f| m.face_area(FaceRef(f)).unwrap()).sum();
        assert!((side - TAU * 2.0).abs() < 1e-9);
    }

    #[test]
    fn in_face_and_inverse_on_sheet() {
        let m = MakeGridSheet::new(Point3::origin(), 1.0, 2, 1).execute().unwrap();
        assert!(m.in_face(FaceRef(0), &Point2::new(0.5, 0.5)).unwrap());
        assert!(!m.in_face(FaceRef(0), &Point2::new(1.5, 0.5)).unwrap());
        let (uv, p) = m.inverse_face(FaceRef(1), &Point3::new(1.25, 0.5, 3.0)).unwrap();
        assert!((p - Point3::new(1.25, 0.5, 0.0)).norm() < 1e-12);
        assert!((uv - Point2::new(1.25, 0.5)).norm() < 1e-12);
    }

    #[test]
    fn attributes_and_bbox() {
        let mut m = MakeBox::new(Point3::origin(), Point3::new(1.0, 1.0, 1.0))
            .execute()
            .unwrap();
        m.set_attribute(RealRef::Edge(EdgeRef(3)), KEEP, AttrValue::Int(vec![1]))
            .unwrap();
        assert!(m.is_kept(RealRef::Edge(EdgeRef(3))));
        assert!(!m.is_kept(RealRef::Edge(EdgeRef(2))));
        assert!(m
            .set_attribute(RealRef::Edge(EdgeRef(99)), KEEP, AttrValue::Int(vec![1]))
            .is_err());
        let b = m.bounding_box(RealRef::Body).unwrap();
        assert!((b.max - Point3::new(1.0, 1.0, 1.0)).norm() < 1e-12);
    }
}
