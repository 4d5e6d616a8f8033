//! Query seam to the real boundary representation.
//!
//! The effective topology never owns real geometry. Everything it needs from
//! the underlying kernel goes through [`RealBody`]; [`Model`] is the
//! in-memory implementation used by the primitives and the test suite.

pub mod attribute;
mod builder;
mod mass;
mod model;
pub mod primitives;

pub use attribute::{AttrValue, Attributes, KEEP};
pub use builder::ModelBuilder;
pub use mass::MassProperties;
pub use model::Model;

use std::fmt;

use crate::error::Result;
use crate::geometry::{CurveEvaluation, SurfaceEvaluation};
use crate::math::{BoundingBox, Point2, Point3};

macro_rules! real_ref {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(pub usize);

        impl $name {
            /// 0-based index of the entity in its real body.
            #[must_use]
            pub fn index(self) -> usize {
                self.0
            }
        }
    };
}

real_ref!(
    /// Index of a real Node.
    NodeRef
);
real_ref!(
    /// Index of a real Edge.
    EdgeRef
);
real_ref!(
    /// Index of a real Loop.
    LoopRef
);
real_ref!(
    /// Index of a real Face.
    FaceRef
);
real_ref!(
    /// Index of a real Shell.
    ShellRef
);

/// Any real entity, for attribute and bounding-box queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RealRef {
    Body,
    Node(NodeRef),
    Edge(EdgeRef),
    Loop(LoopRef),
    Face(FaceRef),
    Shell(ShellRef),
}

/// Orientation of a use of an entity relative to its natural direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Sense {
    Forward,
    Reverse,
}

impl Sense {
    /// `+1` or `-1`.
    #[must_use]
    pub fn sign(self) -> i32 {
        match self {
            Self::Forward => 1,
            Self::Reverse => -1,
        }
    }

    /// Parses `+1`/`-1`.
    #[must_use]
    pub fn from_sign(sign: i64) -> Option<Self> {
        match sign {
            1 => Some(Self::Forward),
            -1 => Some(Self::Reverse),
            _ => None,
        }
    }

    /// The opposite sense.
    #[must_use]
    pub fn flip(self) -> Self {
        match self {
            Self::Forward => Self::Reverse,
            Self::Reverse => Self::Forward,
        }
    }

    #[must_use]
    pub fn is_forward(self) -> bool {
        self == Self::Forward
    }
}

impl std::ops::Mul for Sense {
    type Output = Sense;

    fn mul(self, rhs: Sense) -> Sense {
        if self == rhs {
            Sense::Forward
        } else {
            Sense::Reverse
        }
    }
}

/// Kind of a real body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyKind {
    /// Open collection of faces.
    Sheet,
    /// Closed, oriented volume.
    Solid,
    /// Edges only; cannot be virtualized.
    Wire,
}

/// Kind of an edge, real or effective.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EdgeKind {
    /// Both ends share one node.
    OneNode,
    /// Distinct start and end nodes.
    TwoNode,
    /// Zero-length edge collapsed onto a node.
    Degenerate,
}

impl EdgeKind {
    /// Numeric code used by the persisted format.
    #[must_use]
    pub fn code(self) -> i64 {
        match self {
            Self::OneNode => 1,
            Self::TwoNode => 2,
            Self::Degenerate => 5,
        }
    }

    /// Inverse of [`EdgeKind::code`].
    #[must_use]
    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            1 => Some(Self::OneNode),
            2 => Some(Self::TwoNode),
            5 => Some(Self::Degenerate),
            _ => None,
        }
    }
}

/// Whether a shell (or loop) is closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Closure {
    Open,
    Closed,
}

impl Closure {
    /// Numeric code used by the persisted format.
    #[must_use]
    pub fn code(self) -> i64 {
        match self {
            Self::Open => 3,
            Self::Closed => 4,
        }
    }

    /// Inverse of [`Closure::code`].
    #[must_use]
    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            3 => Some(Self::Open),
            4 => Some(Self::Closed),
            _ => None,
        }
    }
}

/// Topology and parameter range of a real edge.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EdgeTopology {
    pub kind: EdgeKind,
    pub nodes: [NodeRef; 2],
    pub range: [f64; 2],
}

/// Topology and parameter range of a real face.
#[derive(Debug, Clone, PartialEq)]
pub struct FaceTopology {
    /// Orientation of the face relative to its surface normal.
    pub sense: Sense,
    /// Loops with their role: forward for outer, reverse for holes.
    pub loops: Vec<(LoopRef, Sense)>,
    /// `[u_min, u_max, v_min, v_max]`.
    pub range: [f64; 4],
}

/// Faces of a real shell.
#[derive(Debug, Clone, PartialEq)]
pub struct ShellTopology {
    pub closure: Closure,
    pub faces: Vec<FaceRef>,
}

/// Read-only access to a real body and its geometry.
///
/// Implementations must be shareable across threads so a finalized effective
/// body can be queried concurrently.
pub trait RealBody: fmt::Debug + Send + Sync {
    fn kind(&self) -> BodyKind;

    fn node_count(&self) -> usize;
    fn edge_count(&self) -> usize;
    fn loop_count(&self) -> usize;
    fn face_count(&self) -> usize;
    fn shell_count(&self) -> usize;

    /// Position of a node.
    ///
    /// # Errors
    ///
    /// Returns an error if the node does not exist.
    fn node_point(&self, node: NodeRef) -> Result<Point3>;

    /// # Errors
    ///
    /// Returns an error if the edge does not exist.
    fn edge(&self, edge: EdgeRef) -> Result<EdgeTopology>;

    /// Ordered edge uses of a loop.
    ///
    /// # Errors
    ///
    /// Returns an error if the loop does not exist.
    fn loop_edges(&self, lp: LoopRef) -> Result<Vec<(EdgeRef, Sense)>>;

    /// # Errors
    ///
    /// Returns an error if the face does not exist.
    fn face(&self, face: FaceRef) -> Result<FaceTopology>;

    /// # Errors
    ///
    /// Returns an error if the shell does not exist.
    fn shell(&self, shell: ShellRef) -> Result<ShellTopology>;

    /// Orientation of each shell within a solid (outer forward, voids reversed).
    fn shell_senses(&self) -> Vec<Sense>;

    /// Evaluates a real edge curve.
    ///
    /// # Errors
    ///
    /// Returns an error if the edge does not exist or evaluation fails.
    fn evaluate_edge(&self, edge: EdgeRef, t: f64) -> Result<CurveEvaluation>;

    /// Evaluates a real face surface (ignoring the face orientation).
    ///
    /// # Errors
    ///
    /// Returns an error if the face does not exist or evaluation fails.
    fn evaluate_face(&self, face: FaceRef, uv: &Point2) -> Result<SurfaceEvaluation>;

    /// Closest parameter and point on an edge, limited to its range.
    ///
    /// # Errors
    ///
    /// Returns an error if the edge does not exist.
    fn inverse_edge(&self, edge: EdgeRef, point: &Point3) -> Result<(f64, Point3)>;

    /// Closest parameters and point on a face, limited to its range.
    ///
    /// # Errors
    ///
    /// Returns an error if the face does not exist.
    fn inverse_face(&self, face: FaceRef, point: &Point3) -> Result<(Point2, Point3)>;

    /// Arc length of an edge between two parameters.
    ///
    /// # Errors
    ///
    /// Returns an error if the edge does not exist.
    fn arc_length(&self, edge: EdgeRef, t1: f64, t2: f64) -> Result<f64>;

    /// Dihedral winding angle in degrees across an edge at `t`.
    ///
    /// `180` is flat; convex edges are below and concave edges above.
    ///
    /// # Errors
    ///
    /// Returns an error if the edge does not exist.
    fn winding_angle(&self, edge: EdgeRef, t: f64) -> Result<f64>;

    /// Area of a face.
    ///
    /// # Errors
    ///
    /// Returns an error if the face does not exist.
    fn face_area(&self, face: FaceRef) -> Result<f64>;

    /// Whether `uv` lies within the trimmed face.
    ///
    /// # Errors
    ///
    /// Returns an error if the face does not exist.
    fn in_face(&self, face: FaceRef, uv: &Point2) -> Result<bool>;

    /// Surface parameters of a point on an edge used by a face.
    ///
    /// # Errors
    ///
    /// Returns an error if the face or edge does not exist.
    fn edge_uv(&self, face: FaceRef, edge: EdgeRef, sense: Sense, t: f64) -> Result<Point2>;

    /// # Errors
    ///
    /// Returns an error if the entity does not exist.
    fn bounding_box(&self, entity: RealRef) -> Result<BoundingBox>;

    /// Combined mass properties of several edges, several faces, or the body.
    ///
    /// # Errors
    ///
    /// Returns an error if an entity does not exist, the list mixes entity
    /// kinds, or the entities carry no measure.
    fn mass_properties(&self, entities: &[RealRef]) -> Result<MassProperties>;

    /// Looks up a named attribute on a real entity.
    fn attribute(&self, entity: RealRef, name: &str) -> Option<&AttrValue>;

    /// Returns `true` if the entity carries `.Keep`.
    fn is_kept(&self, entity: RealRef) -> bool {
        self.attribute(entity, KEEP).is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sense_algebra() {
        assert_eq!(Sense::Forward * Sense::Reverse, Sense::Reverse);
        assert_eq!(Sense::Reverse * Sense::Reverse, Sense::Forward);
        assert_eq!(Sense::Forward.flip(), Sense::Reverse);
        assert_eq!(Sense::from_sign(-1), Some(Sense::Reverse));
        assert_eq!(Sense::from_sign(0), None);
    }

    #[test]
    fn kind_codes_roundtrip() {
        for k in [EdgeKind::OneNode, EdgeKind::TwoNode, EdgeKind::Degenerate] {
            assert_eq!(EdgeKind::from_code(k.code()), Some(k));
        }
        for c in [Closure::Open, Closure::Closed] {
            assert_eq!(Closure::from_code(c.code()), Some(c));
        }
    }
}
