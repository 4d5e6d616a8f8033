use std::collections::HashMap;
use std::sync::Arc;

use tracing::debug;

use crate::brep::{Attributes, BodyKind, Closure, EdgeRef, FaceRef, LoopRef, RealBody, Sense, ShellRef};
use crate::error::{RangeError, Result, TopologyError};
use crate::math::polygon_2d::signed_area;
use crate::math::Vector3;
use crate::tessellation::Tessellation;

use super::entity::{EEdgeData, EFaceData, ELoopData, EShellData, EdgeUv, HitCache, Patch, Segment};
use super::uvmap::{Parametrizer, PlanarProjection};
use super::{BodyState, EBody, EEdgeId, EFaceId, EffectParams, ELoopId, Graph};

/// Builds an effective body mirroring every real entity, then eliminates
/// redundant nodes.
///
/// The merge `angle` (degrees, within `[0, 90]`) bounds both the tangency
/// test of node elimination and the winding test of composite faces.
pub struct Virtualize {
    tess: Arc<Tessellation>,
    angle: f64,
    params: EffectParams,
    parametrizer: Arc<dyn Parametrizer>,
}

impl Virtualize {
    /// Creates a new `Virtualize` operation.
    #[must_use]
    pub fn new(tess: Arc<Tessellation>, angle: f64) -> Self {
        Self {
            tess,
            angle,
            params: EffectParams::default(),
            parametrizer: Arc::new(PlanarProjection),
        }
    }

    #[must_use]
    pub fn with_params(mut self, params: EffectParams) -> Self {
        self.params = params;
        self
    }

    /// Replaces the parametrizer used for composite faces.
    #[must_use]
    pub fn with_parametrizer(mut self, parametrizer: Arc<dyn Parametrizer>) -> Self {
        self.parametrizer = parametrizer;
        self
    }

    /// Executes the operation.
    ///
    /// # Errors
    ///
    /// Returns [`RangeError::Angle`] for an angle outside `[0, 90]`, a
    /// [`TopologyError`] for wire bodies or incomplete tessellations, and any
    /// error raised while evaluating the real body.
    pub fn execute(&self) -> Result<EBody> {
        if !(0.0..=90.0).contains(&self.angle) {
            return Err(RangeError::Angle(self.angle).into());
        }
        let body = Arc::clone(self.tess.body());
        if !matches!(body.kind(), BodyKind::Sheet | BodyKind::Solid) {
            return Err(TopologyError::InvalidTopology(
                "only sheet and solid bodies can be virtualized".into(),
            )
            .into());
        }
        self.tess.check_complete()?;

        let mut graph = Graph::default();
        let edges = self.edges(body.as_ref(), &mut graph)?;
        let loops = self.loops(body.as_ref(), &edges, &mut graph)?;
        let faces = self.faces(body.as_ref(), &loops, &mut graph)?;
        for s in 0..body.shell_count() {
            let topo = body.shell(ShellRef(s))?;
            graph.add_shell(EShellData {
                closure: topo.closure,
                faces: topo.faces.iter().map(|f| faces[f.0]).collect(),
                attributes: Attributes::new(),
            });
        }
        let senses = match body.kind() {
            BodyKind::Solid => body.shell_senses(),
            _ => Vec::new(),
        };

        let mut ebody = EBody::from_parts(
            body,
            Some(Arc::clone(&self.tess)),
            BodyState::Open,
            self.angle,
            self.params,
            senses,
            Arc::clone(&self.parametrizer),
            graph,
        );
        let removed = ebody.eliminate_nodes()?;
        debug!(
            eedges = ebody.eedges().len(),
            efaces = ebody.efaces().len(),
            removed,
            "effective body built"
        );
        Ok(ebody)
    }

    fn edges(&self, body: &dyn RealBody, graph: &mut Graph) -> Result<Vec<EEdgeId>> {
        let mut ids = Vec::with_capacity(body.edge_count());
        for e in 0..body.edge_count() {
            let edge = EdgeRef(e);
            let topo = body.edge(edge)?;
            let samples = self.tess.edge(edge)?;
            let (d_start, d_end) = match (samples.t.first(), samples.t.last()) {
                (Some(&t0), Some(&t1)) => (
                    samples.xyz[0] - body.evaluate_edge(edge, t0)?.point,
                    samples.xyz[samples.xyz.len() - 1] - body.evaluate_edge(edge, t1)?.point,
                ),
                _ => (Vector3::zeros(), Vector3::zeros()),
            };
            let [t_start, t_end] = match (samples.t.first(), samples.t.last()) {
                (Some(&a), Some(&b)) => [a, b],
                _ => topo.range,
            };
            ids.push(graph.add_edge(EEdgeData {
                kind: topo.kind,
                nodes: topo.nodes,
                t_range: [t_start, t_end],
                segments: vec![Segment {
                    edge,
                    sense: Sense::Forward,
                    interior_node: None,
                    t_start,
                    t_end,
                    ts: samples.t.clone(),
                    d_start,
                    d_end,
                }],
                attributes: Attributes::new(),
            }));
        }
        Ok(ids)
    }

    fn loops(&self, body: &dyn RealBody, edges: &[EEdgeId], graph: &mut Graph) -> Result<Vec<ELoopId>> {
        let mut owner: HashMap<LoopRef, FaceRef> = HashMap::new();
        for f in 0..body.face_count() {
            for (lp, _) in body.face(FaceRef(f))?.loops {
                owner.insert(lp, FaceRef(f));
            }
        }

        let mut ids = Vec::with_capacity(body.loop_count());
        for l in 0..body.loop_count() {
            let lp = LoopRef(l);
            let uses = body.loop_edges(lp)?;
            let mut edge_uvs = Vec::with_capacity(uses.len());
            let mut polygon = Vec::new();
            for &(edge, sense) in &uses {
                let samples = &self.tess.edge(edge)?.t;
                edge_uvs.push(EdgeUv {
                    edge,
                    sense,
                    indices: vec![None; samples.len()],
                });
                if let Some(&face) = owner.get(&lp) {
                    let n = samples.len().saturating_sub(1);
                    for i in 0..n {
                        let idx = if sense.is_forward() { i } else { n - i };
                        polygon.push(body.edge_uv(face, edge, sense, samples[idx])?);
                    }
                }
            }
            ids.push(graph.add_loop(ELoopData {
                closure: Closure::Closed,
                edges: uses.iter().map(|&(e, s)| (edges[e.0], s)).collect(),
                edge_uvs,
                area: signed_area(&polygon),
                attributes: Attributes::new(),
            }));
        }
        Ok(ids)
    }

    fn faces(&self, body: &dyn RealBody, loops: &[ELoopId], graph: &mut Graph) -> Result<Vec<EFaceId>> {
        let mut ids = Vec::with_capacity(body.face_count());
        for f in 0..body.face_count() {
            let face = FaceRef(f);
            let topo = body.face(face)?;
            let tess = self.tess.face(face)?;
            let deflect = (0..tess.frame_count)
                .map(|v| Ok(tess.xyz[v] - body.evaluate_face(face, &tess.uv[v])?.point))
                .collect::<Result<Vec<_>>>()?;
            let deflect_tris = tess
                .tris
                .iter()
                .map(|tri| tri.map(|v| (v < tess.frame_count).then_some(v)))
                .collect();
            ids.push(graph.add_face(EFaceData {
                sense: topo.sense,
                patches: vec![Patch {
                    face,
                    start: 0,
                    uvs: tess.uv.clone(),
                    tris: tess.tris.clone(),
                    deflect_tris,
                    deflect,
                    last_hit: HitCache::default(),
                }],
                uvmap: None,
                loops: topo.loops.iter().map(|&(lp, s)| (loops[lp.0], s)).collect(),
                attributes: Attributes::new(),
            }));
        }
        Ok(ids)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::brep::primitives::{MakeBox, MakeGridSheet};
    use crate::brep::{BodyKind, ModelBuilder};
    use crate::effect::tests::{tessellate, unit_box};
    use crate::error::EffectError;
    use crate::math::Point3;
    use crate::tessellation::{TessellateBody, TessellationParams};

    #[test]
    fn cube_mirrors_the_real_body() {
        let ebody = unit_box();
        let body = Arc::clone(ebody.body());
        assert_eq!(ebody.efaces().len(), body.face_count());
        assert_eq!(ebody.eedges().len(), body.edge_count());
        assert_eq!(ebody.eloops().len(), body.loop_count());
        assert_eq!(ebody.eshells().len(), 1);
        for (i, id) in ebody.efaces().iter().enumerate() {
            let face = ebody.eface(*id).unwrap();
            assert_eq!(face.patches.len(), 1);
            assert_eq!(face.patches[0].face, FaceRef(i));
            assert!(!face.is_composite());
        }
        assert_eq!(ebody.shell_senses(), &[Sense::Forward]);
    }

    #[test]
    fn exact_tessellation_has_zero_deflection() {
        let ebody = unit_box();
        for id in ebody.eedges() {
            let seg = &ebody.eedge(*id).unwrap().segments[0];
            assert!(seg.d_start.norm() < 1e-12 && seg.d_end.norm() < 1e-12);
        }
        for id in ebody.efaces() {
            let patch = &ebody.eface(*id).unwrap().patches[0];
            assert!(patch.deflect.iter().all(|d| d.norm() < 1e-12));
        }
    }

    #[test]
    fn loop_areas_are_positive_for_outer_loops() {
        let ebody = unit_box();
        for id in ebody.eloops() {
            let lp = ebody.eloop(*id).unwrap();
            assert!((lp.area - 1.0).abs() < 1e-9, "area {}", lp.area);
            assert!(lp.edge_uvs.iter().all(|eu| eu.indices.iter().all(Option::is_none)));
        }
    }

    #[test]
    fn angle_out_of_range_is_rejected() {
        let model = MakeBox::new(Point3::origin(), Point3::new(1.0, 1.0, 1.0))
            .execute()
            .unwrap();
        let tess = tessellate(model);
        assert!(matches!(
            Virtualize::new(Arc::clone(&tess), 91.0).execute(),
            Err(EffectError::Range(RangeError::Angle(_)))
        ));
        assert!(Virtualize::new(Arc::clone(&tess), -1.0).execute().is_err());
        assert!(Virtualize::new(tess, 90.0).execute().is_ok());
    }

    #[test]
    fn incomplete_tessellation_is_rejected() {
        let model = MakeGridSheet::new(Point3::origin(), 1.0, 2, 1).execute().unwrap();
        let mut tess = TessellateBody::new(Arc::new(model), TessellationParams::default())
            .execute()
            .unwrap();
        let mut missing_points = tess.clone();
        missing_points.face_mut(FaceRef(1)).unwrap().xyz.clear();
        tess.face_mut(FaceRef(1)).unwrap().tris.clear();
        for tess in [tess, missing_points] {
            assert!(matches!(
                Virtualize::new(Arc::new(tess), 0.0).execute(),
                Err(EffectError::Topology(TopologyError::IncompleteTessellation(_)))
            ));
        }
    }

    #[test]
    fn wire_bodies_are_rejected() {
        let mut b = ModelBuilder::new(BodyKind::Wire);
        let n0 = b.add_node(Point3::origin());
        let n1 = b.add_node(Point3::new(1.0, 0.0, 0.0));
        b.add_line(n0, n1).unwrap();
        let tess = tessellate(b.build().unwrap());
        assert!(matches!(
            Virtualize::new(tess, 0.0).execute(),
            Err(EffectError::Topology(TopologyError::InvalidTopology(_)))
        ));
    }
}
