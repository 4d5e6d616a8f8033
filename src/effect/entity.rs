use std::sync::atomic::{AtomicUsize, Ordering};

use crate::brep::{Attributes, Closure, EdgeKind, EdgeRef, FaceRef, NodeRef, Sense};
use crate::math::{Point2, Vector3};

use super::uvmap::UvMap;

slotmap::new_key_type! {
    /// Identifier of an effective edge within its [`EBody`](super::EBody).
    pub struct EEdgeId;
    /// Identifier of an effective loop within its [`EBody`](super::EBody).
    pub struct ELoopId;
    /// Identifier of an effective face within its [`EBody`](super::EBody).
    pub struct EFaceId;
    /// Identifier of an effective shell within its [`EBody`](super::EBody).
    pub struct EShellId;
}

/// Last-hit triangle index used to start point location.
///
/// A best-effort performance hint shared by concurrent readers; a stale or
/// overwritten value only costs a full search.
#[derive(Debug, Default)]
pub struct HitCache(AtomicUsize);

impl HitCache {
    #[must_use]
    pub fn get(&self) -> Option<usize> {
        self.0.load(Ordering::Relaxed).checked_sub(1)
    }

    pub fn set(&self, tri: usize) {
        self.0.store(tri + 1, Ordering::Relaxed);
    }
}

impl Clone for HitCache {
    fn clone(&self) -> Self {
        Self(AtomicUsize::new(self.0.load(Ordering::Relaxed)))
    }
}

/// One real edge contributing to an effective edge.
#[derive(Debug, Clone, PartialEq)]
pub struct Segment {
    pub edge: EdgeRef,
    /// Direction of traversal relative to the real edge.
    pub sense: Sense,
    /// Node at the start of this segment when it is not the first one.
    pub interior_node: Option<NodeRef>,
    /// Effective parameter where the segment starts.
    pub t_start: f64,
    /// Effective parameter where the segment ends.
    pub t_end: f64,
    /// Tessellation samples in the real edge parameter, increasing.
    pub ts: Vec<f64>,
    /// Deflection at `ts[0]`.
    pub d_start: Vector3,
    /// Deflection at the last sample.
    pub d_end: Vector3,
}

impl Segment {
    /// Real parameter span `ts.last - ts.first`.
    #[must_use]
    pub fn local_length(&self) -> f64 {
        match (self.ts.first(), self.ts.last()) {
            (Some(a), Some(b)) => b - a,
            _ => 0.0,
        }
    }

    /// Maps an effective parameter onto the real edge.
    #[must_use]
    pub fn to_local(&self, t: f64) -> f64 {
        let (first, last) = self.bounds();
        let tx = t - self.t_start;
        match self.sense {
            Sense::Forward => tx + first,
            Sense::Reverse => last - tx,
        }
    }

    /// Inverse of [`Segment::to_local`].
    #[must_use]
    pub fn to_effective(&self, tx: f64) -> f64 {
        let (first, last) = self.bounds();
        match self.sense {
            Sense::Forward => tx - first + self.t_start,
            Sense::Reverse => last - tx + self.t_start,
        }
    }

    fn bounds(&self) -> (f64, f64) {
        match (self.ts.first(), self.ts.last()) {
            (Some(a), Some(b)) => (*a, *b),
            _ => (self.t_start, self.t_end),
        }
    }

    /// Ramp weights for `d_start` and `d_end` at real parameter `tx`.
    ///
    /// Each ramp falls linearly from 1 at its end sample to 0 at the
    /// neighbouring sample.
    #[must_use]
    pub fn blend_weights(&self, tx: f64) -> (f64, f64) {
        let n = self.ts.len();
        if n < 2 {
            return (0.0, 0.0);
        }
        let ramp = |from: f64, to: f64| -> f64 {
            if (to - from).abs() < f64::MIN_POSITIVE {
                0.0
            } else {
                (1.0 - (tx - from) / (to - from)).clamp(0.0, 1.0)
            }
        };
        let w_start = if tx < self.ts[1] { ramp(self.ts[0], self.ts[1]) } else { 0.0 };
        let w_end = if tx > self.ts[n - 2] {
            ramp(self.ts[n - 1], self.ts[n - 2])
        } else {
            0.0
        };
        (w_start, w_end)
    }
}

/// An effective edge: a chain of real edge segments.
#[derive(Debug, Clone, PartialEq)]
pub struct EEdgeData {
    pub kind: EdgeKind,
    pub nodes: [NodeRef; 2],
    pub t_range: [f64; 2],
    pub segments: Vec<Segment>,
    pub attributes: Attributes,
}

impl EEdgeData {
    /// Start and end node when traversed with `sense`.
    #[must_use]
    pub fn ends(&self, sense: Sense) -> (NodeRef, NodeRef) {
        match sense {
            Sense::Forward => (self.nodes[0], self.nodes[1]),
            Sense::Reverse => (self.nodes[1], self.nodes[0]),
        }
    }

    /// The segment covering effective parameter `t`: the first whose end is
    /// at or beyond `t`, otherwise the last.
    #[must_use]
    pub fn segment_at(&self, t: f64) -> Option<(usize, &Segment)> {
        let index = self
            .segments
            .iter()
            .position(|s| t <= s.t_end)
            .unwrap_or(self.segments.len().checked_sub(1)?);
        self.segments.get(index).map(|s| (index, s))
    }

    /// Segments in traversal order for a use with `sense`.
    ///
    /// Reversing reorders the chain, flips each segment and moves the
    /// interior node markers onto the new segment starts.
    #[must_use]
    pub fn oriented_segments(&self, sense: Sense) -> Vec<Segment> {
        match sense {
            Sense::Forward => self.segments.clone(),
            Sense::Reverse => {
                let n = self.segments.len();
                (0..n)
                    .map(|k| {
                        let mut s = self.segments[n - 1 - k].clone();
                        s.sense = s.sense.flip();
                        s.interior_node = if k == 0 {
                            None
                        } else {
                            self.segments[n - k].interior_node
                        };
                        s
                    })
                    .collect()
            }
        }
    }
}

/// Sample indices of one real edge use inside a loop.
#[derive(Debug, Clone, PartialEq)]
pub struct EdgeUv {
    pub edge: EdgeRef,
    pub sense: Sense,
    /// One entry per edge tessellation sample: the vertex in the owning
    /// composite's global parametrization, once known.
    pub indices: Vec<Option<usize>>,
}

/// An effective loop.
#[derive(Debug, Clone, PartialEq)]
pub struct ELoopData {
    pub closure: Closure,
    pub edges: Vec<(EEdgeId, Sense)>,
    pub edge_uvs: Vec<EdgeUv>,
    /// Signed area in the owning face's parametrization.
    pub area: f64,
    pub attributes: Attributes,
}

impl ELoopData {
    /// Finds the uv sample indices for a real edge use.
    #[must_use]
    pub fn edge_uv(&self, edge: EdgeRef, sense: Sense) -> Option<&EdgeUv> {
        self.edge_uvs.iter().find(|eu| eu.edge == edge && eu.sense == sense)
    }
}

/// One real face's triangulation contributed to an effective face.
#[derive(Debug, Clone)]
pub struct Patch {
    pub face: FaceRef,
    /// Offset of this patch's first triangle in the composite triangulation.
    pub start: usize,
    pub uvs: Vec<Point2>,
    pub tris: Vec<[usize; 3]>,
    /// Per triangle vertex: index into `deflect`, when it carries one.
    pub deflect_tris: Vec<[Option<usize>; 3]>,
    pub deflect: Vec<Vector3>,
    pub last_hit: HitCache,
}

/// An effective face.
#[derive(Debug, Clone)]
pub struct EFaceData {
    /// Orientation relative to the first patch's surface.
    pub sense: Sense,
    pub patches: Vec<Patch>,
    /// Global parametrization; present only for composites.
    pub uvmap: Option<UvMap>,
    pub loops: Vec<(ELoopId, Sense)>,
    pub attributes: Attributes,
}

impl EFaceData {
    #[must_use]
    pub fn is_composite(&self) -> bool {
        self.uvmap.is_some()
    }
}

/// An effective shell.
#[derive(Debug, Clone, PartialEq)]
pub struct EShellData {
    pub closure: Closure,
    pub faces: Vec<EFaceId>,
    pub attributes: Attributes,
}
