mod tessellate_body;

pub use tessellate_body::TessellateBody;

use std::sync::Arc;

use crate::brep::{EdgeKind, EdgeRef, FaceRef, NodeRef, RealBody};
use crate::error::{RangeError, Result, TessellationError, TopologyError};
use crate::math::{Point2, Point3};

/// Parameters controlling tessellation density.
#[derive(Debug, Clone, Copy)]
pub struct TessellationParams {
    /// Target maximum chord length along edges.
    pub max_segment_length: f64,
    /// Minimum number of segments per edge.
    pub min_segments: usize,
    /// Maximum number of segments per edge.
    pub max_segments: usize,
    /// Interior grid points per parameter direction on each face.
    pub interior_grid: usize,
}

impl Default for TessellationParams {
    fn default() -> Self {
        Self {
            max_segment_length: 0.25,
            min_segments: 4,
            max_segments: 256,
            interior_grid: 2,
        }
    }
}

impl TessellationParams {
    /// # Errors
    ///
    /// Returns an error if the parameters cannot produce a valid tessellation.
    pub fn validate(&self) -> Result<()> {
        if self.max_segment_length.is_nan() || self.max_segment_length <= 0.0 {
            return Err(TessellationError::InvalidParameters(
                "max_segment_length must be positive".into(),
            )
            .into());
        }
        if self.min_segments == 0 || self.min_segments > self.max_segments {
            return Err(TessellationError::InvalidParameters(
                "segment bounds must satisfy 0 < min <= max".into(),
            )
            .into());
        }
        Ok(())
    }
}

/// Discretization of one real edge.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EdgeTess {
    /// Increasing curve parameters; first and last sit on the edge nodes.
    pub t: Vec<f64>,
    /// Positions matching `t`.
    pub xyz: Vec<Point3>,
}

/// What a face tessellation vertex lies on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VertexKind {
    /// A real node.
    Node(NodeRef),
    /// An interior sample of a real edge (0-based index into its `t`).
    Edge { edge: EdgeRef, sample: usize },
    /// Strictly inside the face.
    Interior,
}

/// Neighbor across one side of a face triangle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Adjacent {
    Triangle(usize),
    /// The side lies on this real edge.
    Edge(EdgeRef),
    None,
}

/// Triangulation of one real face.
///
/// Frame vertices (those on the face boundary) come first; side `k` of a
/// triangle is the one opposite its vertex `k`.
#[derive(Debug, Clone, Default)]
pub struct FaceTess {
    pub uv: Vec<Point2>,
    pub xyz: Vec<Point3>,
    pub kinds: Vec<VertexKind>,
    /// Counter-clockwise in uv.
    pub tris: Vec<[usize; 3]>,
    pub adjacency: Vec<[Adjacent; 3]>,
    /// Number of leading frame vertices.
    pub frame_count: usize,
}

/// Per-edge and per-face discretization of a real body.
#[derive(Debug, Clone)]
pub struct Tessellation {
    body: Arc<dyn RealBody>,
    edges: Vec<EdgeTess>,
    faces: Vec<FaceTess>,
}

impl Tessellation {
    /// Wraps precomputed samples of `body`.
    ///
    /// # Errors
    ///
    /// Returns an error if the sample counts do not match the body.
    pub fn new(body: Arc<dyn RealBody>, edges: Vec<EdgeTess>, faces: Vec<FaceTess>) -> Result<Self> {
        if edges.len() != body.edge_count() || faces.len() != body.face_count() {
            return Err(TopologyError::IncompleteTessellation(format!(
                "{} edges and {} faces for a body with {} and {}",
                edges.len(),
                faces.len(),
                body.edge_count(),
                body.face_count()
            ))
            .into());
        }
        Ok(Self { body, edges, faces })
    }

    /// The tessellated real body.
    #[must_use]
    pub fn body(&self) -> &Arc<dyn RealBody> {
        &self.body
    }

    /// # Errors
    ///
    /// Returns an error if the edge index is out of range.
    pub fn edge(&self, edge: EdgeRef) -> Result<&EdgeTess> {
        self.edges.get(edge.0).ok_or_else(|| {
            RangeError::Index {
                kind: "edge tessellation",
                index: edge.0,
                count: self.edges.len(),
            }
            .into()
        })
    }

    /// # Errors
    ///
    /// Returns an error if the edge index is out of range.
    pub fn edge_mut(&mut self, edge: EdgeRef) -> Result<&mut EdgeTess> {
        let count = self.edges.len();
        self.edges.get_mut(edge.0).ok_or_else(|| {
            RangeError::Index {
                kind: "edge tessellation",
                index: edge.0,
                count,
            }
            .into()
        })
    }

    /// # Errors
    ///
    /// Returns an error if the face index is out of range.
    pub fn face(&self, face: FaceRef) -> Result<&FaceTess> {
        self.faces.get(face.0).ok_or_else(|| {
            RangeError::Index {
                kind: "face tessellation",
                index: face.0,
                count: self.faces.len(),
            }
            .into()
        })
    }

    /// # Errors
    ///
    /// Returns an error if the face index is out of range.
    pub fn face_mut(&mut self, face: FaceRef) -> Result<&mut FaceTess> {
        let count = self.faces.len();
        self.faces.get_mut(face.0).ok_or_else(|| {
            RangeError::Index {
                kind: "face tessellation",
                index: face.0,
                count,
            }
            .into()
        })
    }

    /// Checks that every non-degenerate edge has samples, every face has
    /// triangles, and the per-vertex arrays agree in length.
    ///
    /// # Errors
    ///
    /// Returns [`TopologyError::IncompleteTessellation`] naming the first gap.
    pub fn check_complete(&self) -> Result<()> {
        for (i, tess) in self.edges.iter().enumerate() {
            let topo = self.body.edge(EdgeRef(i))?;
            if tess.t.len() != tess.xyz.len() {
                return Err(TopologyError::IncompleteTessellation(format!(
                    "edge {i}: {} parameters for {} points",
                    tess.t.len(),
                    tess.xyz.len()
                ))
                .into());
            }
            if topo.kind != EdgeKind::Degenerate && tess.t.len() < 2 {
                return Err(TopologyError::IncompleteTessellation(format!("edge {i}")).into());
            }
        }
        for (i, tess) in self.faces.iter().enumerate() {
            let n = tess.uv.len();
            if tess.tris.is_empty() {
                return Err(TopologyError::IncompleteTessellation(format!("face {i}")).into());
            }
            if tess.xyz.len() != n || tess.kinds.len() != n || tess.frame_count > n {
                return Err(TopologyError::IncompleteTessellation(format!(
                    "face {i}: {n} uvs, {} points, {} kinds, {} frame vertices",
                    tess.xyz.len(),
                    tess.kinds.len(),
                    tess.frame_count
                ))
                .into());
            }
            if tess.adjacency.len() != tess.tris.len() {
                return Err(TopologyError::IncompleteTessellation(format!("face {i}: adjacency length")).into());
            }
            if tess.tris.iter().flatten().any(|&v| v >= n) {
                return Err(TopologyError::IncompleteTessellation(format!("face {i}: vertex out of range")).into());
            }
            let tri_count = tess.tris.len();
            if tess
                .adjacency
                .iter()
                .flatten()
                .any(|a| matches!(a, Adjacent::Triangle(t) if *t >= tri_count))
            {
                return Err(TopologyError::IncompleteTessellation(format!("face {i}: neighbor out of range")).into());
            }
        }
        Ok(())
    }
}
