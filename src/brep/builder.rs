use std::collections::HashMap;
use std::f64::consts::PI;

use crate::error::{RangeError, Result, TopologyError};
use crate::geometry::{Circle, Curve, Cylinder, Line, Plane};
use crate::math::{Point3, TOLERANCE};

use super::model::{EdgeCurve, EdgeData, FaceData, FaceSurface, ShellData};
use super::{
    AttrValue, Attributes, BodyKind, Closure, EdgeRef, FaceRef, LoopRef, Model, NodeRef,
    RealRef, Sense, ShellRef,
};

/// Tolerance when checking that curve ends meet their nodes.
const NODE_TOLERANCE: f64 = 1e-7;

/// Incremental constructor for a [`Model`].
///
/// Entities are validated as they are added: edge curves must meet their
/// nodes, loops must close, and faces get their parameter range from the
/// boundary of their outer loop.
#[derive(Debug)]
pub struct ModelBuilder {
    kind: BodyKind,
    nodes: Vec<Point3>,
    edges: Vec<EdgeData>,
    loops: Vec<Vec<(EdgeRef, Sense)>>,
    faces: Vec<FaceData>,
    shells: Vec<ShellData>,
    attributes: HashMap<RealRef, Attributes>,
}

impl ModelBuilder {
    /// Creates an empty builder for a body of the given kind.
    #[must_use]
    pub fn new(kind: BodyKind) -> Self {
        Self {
            kind,
            nodes: Vec::new(),
            edges: Vec::new(),
            loops: Vec::new(),
            faces: Vec::new(),
            shells: Vec::new(),
            attributes: HashMap::new(),
        }
    }

    pub fn add_node(&mut self, point: Point3) -> NodeRef {
        self.nodes.push(point);
        NodeRef(self.nodes.len() - 1)
    }

    fn node(&self, node: NodeRef) -> Result<Point3> {
        self.nodes.get(node.0).copied().ok_or_else(|| {
            RangeError::Index {
                kind: "node",
                index: node.0,
                count: self.nodes.len(),
            }
            .into()
        })
    }

    /// Adds a straight edge from `start` to `end`, parametrized by arc length.
    ///
    /// # Errors
    ///
    /// Returns an error if a node is unknown or the nodes coincide.
    pub fn add_line(&mut self, start: NodeRef, end: NodeRef) -> Result<EdgeRef> {
        let (a, b) = (self.node(start)?, self.node(end)?);
        let line = Line::through(a, b)?;
        self.push_edge(EdgeCurve::Line(line), [start, end], [0.0, (b - a).norm()])
    }

    /// Adds a circular arc over `[t_start, t_end]` (radians, increasing).
    ///
    /// # Errors
    ///
    /// Returns an error if a node is unknown, the range is empty, or the arc
    /// ends do not meet the nodes.
    pub fn add_arc(
        &mut self,
        circle: Circle,
        t_start: f64,
        t_end: f64,
        start: NodeRef,
        end: NodeRef,
    ) -> Result<EdgeRef> {
        if t_end <= t_start {
            return Err(RangeError::InvalidArgument("arc range must increase".into()).into());
        }
        self.push_edge(EdgeCurve::Circle(circle), [start, end], [t_start, t_end])
    }

    fn push_edge(&mut self, curve: EdgeCurve, nodes: [NodeRef; 2], range: [f64; 2]) -> Result<EdgeRef> {
        for (node, t) in nodes.iter().zip(range) {
            let expected = self.node(*node)?;
            let actual = curve.curve().evaluate(t)?.point;
            if (expected - actual).norm() > NODE_TOLERANCE {
                return Err(TopologyError::InvalidTopology(format!(
                    "edge end at {actual} does not meet node {}",
                    node.0
                ))
                .into());
            }
        }
        self.edges.push(EdgeData { curve, nodes, range });
        Ok(EdgeRef(self.edges.len() - 1))
    }

    fn edge_ends(&self, edge: EdgeRef, sense: Sense) -> Result<(NodeRef, NodeRef)> {
        let data = self.edges.get(edge.0).ok_or(RangeError::Index {
            kind: "edge",
            index: edge.0,
            count: self.edges.len(),
        })?;
        Ok(match sense {
            Sense::Forward => (data.nodes[0], data.nodes[1]),
            Sense::Reverse => (data.nodes[1], data.nodes[0]),
        })
    }

    /// Adds a closed loop of edge uses.
    ///
    /// # Errors
    ///
    /// Returns an error if an edge is unknown or consecutive uses do not share
    /// a node.
    pub fn add_loop(&mut self, edges: Vec<(EdgeRef, Sense)>) -> Result<LoopRef> {
        if edges.is_empty() {
            return Err(TopologyError::InvalidTopology("empty loop".into()).into());
        }
        for (i, &(edge, sense)) in edges.iter().enumerate() {
            let (next, next_sense) = edges[(i + 1) % edges.len()];
            let (_, end) = self.edge_ends(edge, sense)?;
            let (begin, _) = self.edge_ends(next, next_sense)?;
            if end != begin {
                return Err(TopologyError::InvalidTopology(format!(
                    "loop breaks between edges {} and {}",
                    edge.0, next.0
                ))
                .into());
            }
        }
        self.loops.push(edges);
        Ok(LoopRef(self.loops.len() - 1))
    }

    /// Adds a planar face; the first loop is the outer boundary.
    ///
    /// # Errors
    ///
    /// Returns an error if a loop is unknown.
    pub fn add_plane_face(&mut self, plane: Plane, sense: Sense, loops: &[LoopRef]) -> Result<FaceRef> {
        self.push_face(FaceSurface::Plane(plane), sense, loops)
    }

    /// Adds a cylindrical face; the first loop is the outer boundary.
    ///
    /// # Errors
    ///
    /// Returns an error if a loop is unknown.
    pub fn add_cylinder_face(
        &mut self,
        cylinder: Cylinder,
        sense: Sense,
        loops: &[LoopRef],
    ) -> Result<FaceRef> {
        self.push_face(FaceSurface::Cylinder(cylinder), sense, loops)
    }

    fn push_face(&mut self, surface: FaceSurface, sense: Sense, loops: &[LoopRef]) -> Result<FaceRef> {
        let outer = loops
            .first()
            .ok_or_else(|| TopologyError::InvalidTopology("face without loops".into()))?;
        let boundary = self
            .loops
            .get(outer.0)
            .ok_or(RangeError::Index {
                kind: "loop",
                index: outer.0,
                count: self.loops.len(),
            })?
            .clone();

        let mut points = Vec::new();
        for (edge, edge_sense) in boundary {
            let data = &self.edges[edge.0];
            let curve = data.curve.curve();
            let [t0, t1] = data.range;
            for i in 0..=8 {
                let f = f64::from(i) / 8.0;
                let f = if edge_sense.is_forward() { f } else { 1.0 - f };
                points.push(curve.evaluate(t0 + f * (t1 - t0))?.point);
            }
        }
        let range = parameter_range(surface.surface(), &points);

        let mut face_loops = Vec::with_capacity(loops.len());
        for (i, lp) in loops.iter().enumerate() {
            if lp.0 >= self.loops.len() {
                return Err(RangeError::Index {
                    kind: "loop",
                    index: lp.0,
                    count: self.loops.len(),
                }
                .into());
            }
            face_loops.push((*lp, if i == 0 { Sense::Forward } else { Sense::Reverse }));
        }
        self.faces.push(FaceData {
            surface,
            sense,
            loops: face_loops,
            range,
        });
        Ok(FaceRef(self.faces.len() - 1))
    }

    pub fn add_shell(&mut self, faces: Vec<FaceRef>, closure: Closure) -> ShellRef {
        self.shells.push(ShellData { closure, faces });
        ShellRef(self.shells.len() - 1)
    }

    /// Attaches an attribute to an entity added so far.
    ///
    /// # Errors
    ///
    /// Returns an error if the name is invalid.
    pub fn set_attribute(&mut self, entity: RealRef, name: &str, value: AttrValue) -> Result<()> {
        self.attributes.entry(entity).or_default().set(name, value)
    }

    /// Finishes the model.
    ///
    /// # Errors
    ///
    /// Returns an error if an edge is unused by every loop, a face is in no
    /// shell, or an attribute targets an unknown entity.
    pub fn build(self) -> Result<Model> {
        let mut used = vec![false; self.edges.len()];
        for lp in &self.loops {
            for (e, _) in lp {
                used[e.0] = true;
            }
        }
        if let Some(unused) = used.iter().position(|u| !u) {
            if self.kind != BodyKind::Wire {
                return Err(TopologyError::InvalidTopology(format!(
                    "edge {unused} is not used by any loop"
                ))
                .into());
            }
        }
        for f in 0..self.faces.len() {
            if !self.shells.iter().any(|s| s.faces.contains(&FaceRef(f))) {
                return Err(TopologyError::InvalidTopology(format!(
                    "face {f} is not in any shell"
                ))
                .into());
            }
        }

        let model = Model {
            kind: self.kind,
            nodes: self.nodes,
            edges: self.edges,
            loops: self.loops,
            faces: self.faces,
            shells: self.shells,
            attributes: HashMap::new(),
        };
        for entity in self.attributes.keys() {
            model.check_entity(*entity)?;
        }
        Ok(Model {
            attributes: self.attributes,
            ..model
        })
    }
}

/// Parameter box of boundary points, unwrapping periodic `u` along the walk.
fn parameter_range(surface: &dyn crate::geometry::Surface, points: &[Point3]) -> [f64; 4] {
    let mut range = [f64::INFINITY, f64::NEG_INFINITY, f64::INFINITY, f64::NEG_INFINITY];
    let mut prev: Option<(f64, f64)> = None;
    for p in points {
        let uv = surface.inverse(p);
        let u = match prev {
            Some((raw, running)) if surface.is_u_periodic() => {
                let mut delta = uv.x - raw;
                if delta > PI {
                    delta -= 2.0 * PI;
                } else if delta < -PI {
                    delta += 2.0 * PI;
                }
                running + delta
            }
            _ => uv.x,
        };
        prev = Some((uv.x, u));
        range[0] = range[0].min(u);
        range[1] = range[1].max(u);
        range[2] = range[2].min(uv.y);
        range[3] = range[3].max(uv.y);
    }
    if range[1] - range[0] < TOLERANCE {
        range[1] = range[0];
    }
    range
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::math::Vector3;

    #[test]
    fn open_loop_rejected() {
        let mut b = ModelBuilder::new(BodyKind::Sheet);
        let n0 = b.add_node(Point3::new(0.0, 0.0, 0.0));
        let n1 = b.add_node(Point3::new(1.0, 0.0, 0.0));
        let n2 = b.add_node(Point3::new(1.0, 1.0, 0.0));
        let e0 = b.add_line(n0, n1).unwrap();
        let e1 = b.add_line(n1, n2).unwrap();
        assert!(b.add_loop(vec![(e0, Sense::Forward), (e1, Sense::Forward)]).is_err());
    }

    #[test]
    fn arc_must_meet_nodes() {
        let mut b = ModelBuilder::new(BodyKind::Sheet);
        let n0 = b.add_node(Point3::new(1.0, 0.0, 0.0));
        let n1 = b.add_node(Point3::new(0.0, 2.0, 0.0));
        let circle = Circle::new(Point3::origin(), 1.0, Vector3::z(), Vector3::x()).unwrap();
        assert!(b.add_arc(circle, 0.0, PI / 2.0, n0, n1).is_err());
    }

    #[test]
    fn periodic_range_unwraps_across_seam() {
        let cyl = Cylinder::new(Point3::origin(), 1.0, Vector3::z(), Vector3::x()).unwrap();
        let points: Vec<_> = [3.0, 3.1, -3.1, -3.0]
            .iter()
            .map(|&u: &f64| Point3::new(u.cos(), u.sin(), 0.0))
            .collect();
        let r = parameter_range(&cyl, &points);
        assert!((r[0] - 3.0).abs() < 1e-12);
        assert!((r[1] - (2.0 * PI - 3.0)).abs() < 1e-12);
    }
}
