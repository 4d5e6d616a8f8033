//! Primitive bodies built on [`ModelBuilder`].

use std::collections::HashMap;
use std::f64::consts::TAU;

use crate::error::Result;
use crate::geometry::{Circle, Cylinder, Plane};
use crate::math::{Point3, Vector3};

use super::{
    AttrValue, BodyKind, Closure, EdgeRef, LoopRef, Model, ModelBuilder, NodeRef, RealRef, Sense,
    KEEP,
};

/// Shares straight edges between faces, reusing an edge in reverse when
/// its node pair is met again.
#[derive(Default)]
struct LineCache {
    edges: HashMap<(NodeRef, NodeRef), EdgeRef>,
}

impl LineCache {
    fn get(&mut self, b: &mut ModelBuilder, from: NodeRef, to: NodeRef) -> Result<(EdgeRef, Sense)> {
        if let Some(&e) = self.edges.get(&(from, to)) {
            return Ok((e, Sense::Forward));
        }
        if let Some(&e) = self.edges.get(&(to, from)) {
            return Ok((e, Sense::Reverse));
        }
        let e = b.add_line(from, to)?;
        self.edges.insert((from, to), e);
        Ok((e, Sense::Forward))
    }

    fn polygon(&mut self, b: &mut ModelBuilder, corners: &[NodeRef]) -> Result<LoopRef> {
        let mut uses = Vec::with_capacity(corners.len());
        for i in 0..corners.len() {
            uses.push(self.get(b, corners[i], corners[(i + 1) % corners.len()])?);
        }
        b.add_loop(uses)
    }
}

/// Creates an axis-aligned box solid from two corner points.
///
/// Faces are ordered `-z, +z, -y, +y, -x, +x`; each is a plane whose
/// `u x v` is the outward normal.
pub struct MakeBox {
    min_corner: Point3,
    max_corner: Point3,
}

impl MakeBox {
    /// Creates a new `MakeBox` operation.
    #[must_use]
    pub fn new(min_corner: Point3, max_corner: Point3) -> Self {
        Self {
            min_corner,
            max_corner,
        }
    }

    /// Executes the operation.
    ///
    /// # Errors
    ///
    /// Returns an error if the box is degenerate.
    pub fn execute(&self) -> Result<Model> {
        let (lo, hi) = (self.min_corner, self.max_corner);
        let mut b = ModelBuilder::new(BodyKind::Solid);
        let mut corners = Vec::with_capacity(8);
        for k in 0..2 {
            for j in 0..2 {
                for i in 0..2 {
                    let p = Point3::new(
                        if i == 0 { lo.x } else { hi.x },
                        if j == 0 { lo.y } else { hi.y },
                        if k == 0 { lo.z } else { hi.z },
                    );
                    corners.push((b.add_node(p), p));
                }
            }
        }
        let c = |i: usize, j: usize, k: usize| corners[k * 4 + j * 2 + i];
        let quads = [
            [c(0, 0, 0), c(0, 1, 0), c(1, 1, 0), c(1, 0, 0)],
            [c(0, 0, 1), c(1, 0, 1), c(1, 1, 1), c(0, 1, 1)],
            [c(0, 0, 0), c(1, 0, 0), c(1, 0, 1), c(0, 0, 1)],
            [c(0, 1, 0), c(0, 1, 1), c(1, 1, 1), c(1, 1, 0)],
            [c(0, 0, 0), c(0, 0, 1), c(0, 1, 1), c(0, 1, 0)],
            [c(1, 0, 0), c(1, 1, 0), c(1, 1, 1), c(1, 0, 1)],
        ];

        let mut lines = LineCache::default();
        let mut faces = Vec::with_capacity(6);
        for quad in quads {
            let lp = lines.polygon(&mut b, &quad.map(|(n, _)| n))?;
            let origin = quad[0].1;
            let plane = Plane::new(origin, quad[1].1 - origin, quad[3].1 - origin)?;
            faces.push(b.add_plane_face(plane, Sense::Forward, &[lp])?);
        }
        b.add_shell(faces, Closure::Closed);
        b.build()
    }
}

/// Creates a closed cylinder along `+z` whose lateral surface is split into
/// `sides` faces.
///
/// Nodes are the bottom ring then the top ring. Faces are the sides in angular
/// order, then the top cap, then the bottom cap. Seam `i` runs from bottom node
/// `i` to top node `i`.
pub struct MakeCylinder {
    center: Point3,
    radius: f64,
    height: f64,
    sides: usize,
    keep_seam: bool,
}

impl MakeCylinder {
    /// Creates a new `MakeCylinder` operation.
    #[must_use]
    pub fn new(center: Point3, radius: f64, height: f64, sides: usize) -> Self {
        Self {
            center,
            radius,
            height,
            sides,
            keep_seam: false,
        }
    }

    /// Marks the seam at angle zero with `.Keep`.
    #[must_use]
    pub fn keep_seam(mut self) -> Self {
        self.keep_seam = true;
        self
    }

    /// Executes the operation.
    ///
    /// # Errors
    ///
    /// Returns an error if fewer than two sides are requested or the geometry
    /// is degenerate.
    pub fn execute(&self) -> Result<Model> {
        let n = self.sides;
        if n < 2 {
            return Err(crate::error::RangeError::InvalidArgument(
                "a cylinder needs at least two side faces".into(),
            )
            .into());
        }
        #[allow(clippy::cast_precision_loss)]
        let angle = |i: usize| TAU * i as f64 / n as f64;
        let top = self.center + Vector3::z() * self.height;
        let ring = |base: Point3, i: usize| {
            let (s, c) = angle(i).sin_cos();
            base + Vector3::new(c, s, 0.0) * self.radius
        };

        let mut b = ModelBuilder::new(BodyKind::Solid);
        let bottom_nodes: Vec<_> = (0..n).map(|i| b.add_node(ring(self.center, i))).collect();
        let top_nodes: Vec<_> = (0..n).map(|i| b.add_node(ring(top, i))).collect();

        let seams = (0..n)
            .map(|i| b.add_line(bottom_nodes[i], top_nodes[i]))
            .collect::<Result<Vec<_>>>()?;
        let bottom_circle = Circle::new(self.center, self.radius, Vector3::z(), Vector3::x())?;
        let top_circle = Circle::new(top, self.radius, Vector3::z(), Vector3::x())?;
        let mut bottom_arcs = Vec::with_capacity(n);
        let mut top_arcs = Vec::with_capacity(n);
        for i in 0..n {
            let j = (i + 1) % n;
            bottom_arcs.push(b.add_arc(
                bottom_circle.clone(),
                angle(i),
                angle(i + 1),
                bottom_nodes[i],
                bottom_nodes[j],
            )?);
            top_arcs.push(b.add_arc(
                top_circle.clone(),
                angle(i),
                angle(i + 1),
                top_nodes[i],
                top_nodes[j],
            )?);
        }

        let surface = Cylinder::new(self.center, self.radius, Vector3::z(), Vector3::x())?;
        let mut faces = Vec::with_capacity(n + 2);
        for i in 0..n {
            let lp = b.add_loop(vec![
                (bottom_arcs[i], Sense::Forward),
                (seams[(i + 1) % n], Sense::Forward),
                (top_arcs[i], Sense::Reverse),
                (seams[i], Sense::Reverse),
            ])?;
            faces.push(b.add_cylinder_face(surface.clone(), Sense::Forward, &[lp])?);
        }

        let top_loop = b.add_loop(top_arcs.iter().map(|&e| (e, Sense::Forward)).collect())?;
        let top_plane = Plane::new(top, Vector3::x(), Vector3::y())?;
        faces.push(b.add_plane_face(top_plane, Sense::Forward, &[top_loop])?);

        let bottom_loop =
            b.add_loop(bottom_arcs.iter().rev().map(|&e| (e, Sense::Reverse)).collect())?;
        let bottom_plane = Plane::new(self.center, Vector3::y(), Vector3::x())?;
        faces.push(b.add_plane_face(bottom_plane, Sense::Forward, &[bottom_loop])?);

        b.add_shell(faces, Closure::Closed);
        if self.keep_seam {
            b.set_attribute(RealRef::Edge(seams[0]), KEEP, AttrValue::Int(vec![1]))?;
        }
        b.build()
    }
}

/// Creates a flat sheet of `nx * ny` unit squares of edge `size` in the
/// `z = origin.z` plane.
///
/// Face `j * nx + i` covers cell `(i, j)`. All faces share one plane through
/// `origin` with `u = +x` and `v = +y`.
pub struct MakeGridSheet {
    origin: Point3,
    size: f64,
    nx: usize,
    ny: usize,
}

impl MakeGridSheet {
    /// Creates a new `MakeGridSheet` operation.
    #[must_use]
    pub fn new(origin: Point3, size: f64, nx: usize, ny: usize) -> Self {
        Self { origin, size, nx, ny }
    }

    /// Executes the operation.
    ///
    /// # Errors
    ///
    /// Returns an error if the grid is empty or the cell size is degenerate.
    pub fn execute(&self) -> Result<Model> {
        if self.nx == 0 || self.ny == 0 {
            return Err(crate::error::RangeError::InvalidArgument("empty grid".into()).into());
        }
        let mut b = ModelBuilder::new(BodyKind::Sheet);
        let mut nodes = Vec::with_capacity((self.nx + 1) * (self.ny + 1));
        for j in 0..=self.ny {
            for i in 0..=self.nx {
                #[allow(clippy::cast_precision_loss)]
                let offset = Vector3::new(i as f64, j as f64, 0.0) * self.size;
                nodes.push(b.add_node(self.origin + offset));
            }
        }
        let node = |i: usize, j: usize| nodes[j * (self.nx + 1) + i];

        let plane = Plane::new(self.origin, Vector3::x(), Vector3::y())?;
        let mut lines = LineCache::default();
        let mut faces = Vec::with_capacity(self.nx * self.ny);
        for j in 0..self.ny {
            for i in 0..self.nx {
                let corners = [node(i, j), node(i + 1, j), node(i + 1, j + 1), node(i, j + 1)];
                let lp = lines.polygon(&mut b, &corners)?;
                faces.push(b.add_plane_face(plane.clone(), Sense::Forward, &[lp])?);
            }
        }
        b.add_shell(faces, Closure::Open);
        b.build()
    }
}
