//! Effective (virtual) topology layered over a real body.
//!
//! An [`EBody`] mirrors the real topology 1:1 when built by [`Virtualize`],
//! then simplifies it: two-valent nodes are eliminated and groups of faces
//! are merged into composites by [`MakeComposite`]. Once finalized the body
//! is read-only and can be evaluated and queried from many threads.

mod composite;
mod entity;
mod evaluate;
mod io;
mod nodes;
mod query;
mod tangency;
pub mod uvmap;
mod virtualize;

pub use composite::{MakeAttributeComposites, MakeComposite};
pub use entity::{
    EEdgeData, EEdgeId, EFaceData, EFaceId, ELoopData, ELoopId, EShellData, EShellId, EdgeUv,
    HitCache, Patch, Segment,
};
pub use evaluate::{EdgeMapping, FaceMapping, SegmentInfo};
pub use query::{ETopology, EntityRef, TopoClass};
pub use uvmap::{DiskEmbedding, Parametrizer, PlanarProjection, UvLocation, UvMap};
pub use virtualize::Virtualize;

use std::sync::Arc;
use std::thread::{self, ThreadId};

use slotmap::SlotMap;
use tracing::debug;

use crate::brep::{AttrValue, Attributes, BodyKind, EdgeRef, FaceRef, RealBody, RealRef, Sense};
use crate::error::{RangeError, Result, StateError, TopologyError};
use crate::tessellation::Tessellation;

/// Numeric settings of an effective body.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EffectParams {
    /// Step used by finite-difference derivatives.
    pub micro_step: f64,
    /// Loop areas closer than this are reported as an ambiguous outer loop.
    pub area_tolerance: f64,
}

impl Default for EffectParams {
    fn default() -> Self {
        Self {
            micro_step: 1e-6,
            area_tolerance: 1e-10,
        }
    }
}

/// Lifecycle state of an [`EBody`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyState {
    /// Still accepting simplification.
    Open,
    /// Sealed; only evaluation, queries and serialization remain.
    Finalized,
}

/// Arena owning every effective entity of one body.
///
/// Entities reference each other through typed keys. The order lists keep
/// enumeration indices stable across removals.
#[derive(Debug, Clone, Default)]
pub(crate) struct Graph {
    edges: SlotMap<EEdgeId, EEdgeData>,
    loops: SlotMap<ELoopId, ELoopData>,
    faces: SlotMap<EFaceId, EFaceData>,
    shells: SlotMap<EShellId, EShellData>,
    edge_order: Vec<EEdgeId>,
    loop_order: Vec<ELoopId>,
    face_order: Vec<EFaceId>,
    shell_order: Vec<EShellId>,
}

impl Graph {
    // --- EEdge operations ---

    pub(crate) fn add_edge(&mut self, data: EEdgeData) -> EEdgeId {
        let id = self.edges.insert(data);
        self.edge_order.push(id);
        id
    }

    pub(crate) fn edge(&self, id: EEdgeId) -> Result<&EEdgeData> {
        self.edges
            .get(id)
            .ok_or_else(|| TopologyError::EntityNotFound("eedge".into()).into())
    }

    pub(crate) fn edge_mut(&mut self, id: EEdgeId) -> Result<&mut EEdgeData> {
        self.edges
            .get_mut(id)
            .ok_or_else(|| TopologyError::EntityNotFound("eedge".into()).into())
    }

    pub(crate) fn remove_edge(&mut self, id: EEdgeId) -> Result<EEdgeData> {
        self.edge_order.retain(|e| *e != id);
        self.edges
            .remove(id)
            .ok_or_else(|| TopologyError::EntityNotFound("eedge".into()).into())
    }

    // --- ELoop operations ---

    pub(crate) fn add_loop(&mut self, data: ELoopData) -> ELoopId {
        let id = self.loops.insert(data);
        self.loop_order.push(id);
        id
    }

    pub(crate) fn eloop(&self, id: ELoopId) -> Result<&ELoopData> {
        self.loops
            .get(id)
            .ok_or_else(|| TopologyError::EntityNotFound("eloop".into()).into())
    }

    pub(crate) fn eloop_mut(&mut self, id: ELoopId) -> Result<&mut ELoopData> {
        self.loops
            .get_mut(id)
            .ok_or_else(|| TopologyError::EntityNotFound("eloop".into()).into())
    }

    pub(crate) fn remove_loop(&mut self, id: ELoopId) -> Result<ELoopData> {
        self.loop_order.retain(|l| *l != id);
        self.loops
            .remove(id)
            .ok_or_else(|| TopologyError::EntityNotFound("eloop".into()).into())
    }

    // --- EFace operations ---

    pub(crate) fn add_face(&mut self, data: EFaceData) -> EFaceId {
        let id = self.faces.insert(data);
        self.face_order.push(id);
        id
    }

    pub(crate) fn face(&self, id: EFaceId) -> Result<&EFaceData> {
        self.faces
            .get(id)
            .ok_or_else(|| TopologyError::EntityNotFound("eface".into()).into())
    }

    pub(crate) fn face_mut(&mut self, id: EFaceId) -> Result<&mut EFaceData> {
        self.faces
            .get_mut(id)
            .ok_or_else(|| TopologyError::EntityNotFound("eface".into()).into())
    }

    pub(crate) fn remove_face(&mut self, id: EFaceId) -> Result<EFaceData> {
        self.face_order.retain(|f| *f != id);
        self.faces
            .remove(id)
            .ok_or_else(|| TopologyError::EntityNotFound("eface".into()).into())
    }

    // --- EShell operations ---

    pub(crate) fn add_shell(&mut self, data: EShellData) -> EShellId {
        let id = self.shells.insert(data);
        self.shell_order.push(id);
        id
    }

    pub(crate) fn shell(&self, id: EShellId) -> Result<&EShellData> {
        self.shells
            .get(id)
            .ok_or_else(|| TopologyError::EntityNotFound("eshell".into()).into())
    }

    pub(crate) fn shell_mut(&mut self, id: EShellId) -> Result<&mut EShellData> {
        self.shells
            .get_mut(id)
            .ok_or_else(|| TopologyError::EntityNotFound("eshell".into()).into())
    }

    /// Loops that use `edge`, in enumeration order.
    pub(crate) fn loops_using(&self, edge: EEdgeId) -> Vec<ELoopId> {
        self.loop_order
            .iter()
            .copied()
            .filter(|l| self.loops.get(*l).is_some_and(|d| d.edges.iter().any(|(e, _)| *e == edge)))
            .collect()
    }

    /// Tears the arena down from the per-face caches upward.
    fn clear(&mut self) {
        for face in self.faces.values_mut() {
            face.uvmap = None;
            face.patches.clear();
        }
        self.faces.clear();
        self.face_order.clear();
        self.shells.clear();
        self.shell_order.clear();
        self.loops.clear();
        self.loop_order.clear();
        self.edges.clear();
        self.edge_order.clear();
    }
}

/// The effective topology of one real body.
#[derive(Debug)]
pub struct EBody {
    body: Arc<dyn RealBody>,
    tess: Option<Arc<Tessellation>>,
    state: BodyState,
    angle: f64,
    params: EffectParams,
    owner: ThreadId,
    shell_senses: Vec<Sense>,
    attributes: Attributes,
    parametrizer: Arc<dyn Parametrizer>,
    pub(crate) graph: Graph,
}

impl EBody {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn from_parts(
        body: Arc<dyn RealBody>,
        tess: Option<Arc<Tessellation>>,
        state: BodyState,
        angle: f64,
        params: EffectParams,
        shell_senses: Vec<Sense>,
        parametrizer: Arc<dyn Parametrizer>,
        graph: Graph,
    ) -> Self {
        Self {
            body,
            tess,
            state,
            angle,
            params,
            owner: thread::current().id(),
            shell_senses,
            attributes: Attributes::new(),
            parametrizer,
            graph,
        }
    }

    /// The underlying real body.
    #[must_use]
    pub fn body(&self) -> &Arc<dyn RealBody> {
        &self.body
    }

    #[must_use]
    pub fn kind(&self) -> BodyKind {
        self.body.kind()
    }

    /// Merge tolerance in degrees.
    #[must_use]
    pub fn angle(&self) -> f64 {
        self.angle
    }

    #[must_use]
    pub fn params(&self) -> EffectParams {
        self.params
    }

    #[must_use]
    pub fn state(&self) -> BodyState {
        self.state
    }

    #[must_use]
    pub fn is_finalized(&self) -> bool {
        self.state == BodyState::Finalized
    }

    /// The source tessellation; released by [`EBody::finalize`].
    #[must_use]
    pub fn tessellation(&self) -> Option<&Arc<Tessellation>> {
        self.tess.as_ref()
    }

    /// Orientation of each shell for solid bodies, empty otherwise.
    #[must_use]
    pub fn shell_senses(&self) -> &[Sense] {
        &self.shell_senses
    }

    pub(crate) fn parametrizer(&self) -> &dyn Parametrizer {
        self.parametrizer.as_ref()
    }

    pub(crate) fn tess(&self) -> Result<&Tessellation> {
        self.tess.as_deref().ok_or_else(|| StateError::Finalized.into())
    }

    /// Fails unless called from the thread that created the body.
    pub(crate) fn check_writer(&self) -> Result<()> {
        if thread::current().id() == self.owner {
            Ok(())
        } else {
            Err(StateError::WrongThread.into())
        }
    }

    /// Fails unless the body may still be simplified by this thread.
    pub(crate) fn check_mutable(&self) -> Result<()> {
        self.check_writer()?;
        match self.state {
            BodyState::Open => Ok(()),
            BodyState::Finalized => Err(StateError::Finalized.into()),
        }
    }

    /// Seals the body and releases the tessellation.
    ///
    /// # Errors
    ///
    /// Returns [`StateError::Finalized`] if already finalized or
    /// [`StateError::WrongThread`] from a non-owning thread.
    pub fn finalize(&mut self) -> Result<()> {
        self.check_mutable()?;
        self.tess = None;
        self.state = BodyState::Finalized;
        debug!(
            eedges = self.graph.edge_order.len(),
            efaces = self.graph.face_order.len(),
            "effective body finalized"
        );
        Ok(())
    }

    // --- Entity access ---

    /// # Errors
    ///
    /// Returns an error if the EEdge does not exist.
    pub fn eedge(&self, id: EEdgeId) -> Result<&EEdgeData> {
        self.graph.edge(id)
    }

    /// # Errors
    ///
    /// Returns an error if the ELoop does not exist.
    pub fn eloop(&self, id: ELoopId) -> Result<&ELoopData> {
        self.graph.eloop(id)
    }

    /// # Errors
    ///
    /// Returns an error if the EFace does not exist.
    pub fn eface(&self, id: EFaceId) -> Result<&EFaceData> {
        self.graph.face(id)
    }

    /// # Errors
    ///
    /// Returns an error if the EShell does not exist.
    pub fn eshell(&self, id: EShellId) -> Result<&EShellData> {
        self.graph.shell(id)
    }

    /// EEdge ids in enumeration order.
    #[must_use]
    pub fn eedges(&self) -> &[EEdgeId] {
        &self.graph.edge_order
    }

    #[must_use]
    pub fn eloops(&self) -> &[ELoopId] {
        &self.graph.loop_order
    }

    #[must_use]
    pub fn efaces(&self) -> &[EFaceId] {
        &self.graph.face_order
    }

    #[must_use]
    pub fn eshells(&self) -> &[EShellId] {
        &self.graph.shell_order
    }

    /// The EEdge whose segments include a real edge.
    ///
    /// # Errors
    ///
    /// Returns an error if the edge was absorbed into a composite face.
    pub fn eedge_of(&self, edge: EdgeRef) -> Result<EEdgeId> {
        self.graph
            .edge_order
            .iter()
            .copied()
            .find(|id| {
                self.graph
                    .edges
                    .get(*id)
                    .is_some_and(|d| d.segments.iter().any(|s| s.edge == edge))
            })
            .ok_or_else(|| TopologyError::EntityNotFound(format!("eedge for edge {}", edge.0)).into())
    }

    /// The EFace whose patches include a real face.
    ///
    /// # Errors
    ///
    /// Returns an error if the face index is out of range.
    pub fn eface_of(&self, face: FaceRef) -> Result<EFaceId> {
        if face.0 >= self.body.face_count() {
            return Err(RangeError::Index {
                kind: "face",
                index: face.0,
                count: self.body.face_count(),
            }
            .into());
        }
        self.graph
            .face_order
            .iter()
            .copied()
            .find(|id| {
                self.graph
                    .faces
                    .get(*id)
                    .is_some_and(|d| d.patches.iter().any(|p| p.face == face))
            })
            .ok_or_else(|| TopologyError::EntityNotFound(format!("eface for face {}", face.0)).into())
    }

    /// The EShell listing an EFace.
    ///
    /// # Errors
    ///
    /// Returns an error if no shell contains the face.
    pub fn eshell_of(&self, face: EFaceId) -> Result<EShellId> {
        self.graph
            .shell_order
            .iter()
            .copied()
            .find(|id| self.graph.shells.get(*id).is_some_and(|d| d.faces.contains(&face)))
            .ok_or_else(|| TopologyError::EntityNotFound("eshell for eface".into()).into())
    }

    // --- Attributes ---

    /// Sets an attribute on the body or one of its effective entities.
    ///
    /// Real entities are read-only through this interface.
    ///
    /// # Errors
    ///
    /// Returns an error if called from a non-owning thread, the entity does
    /// not exist or is real, or the name is invalid.
    pub fn set_attribute(&mut self, entity: EntityRef, name: &str, value: AttrValue) -> Result<()> {
        self.check_writer()?;
        let attrs = match entity {
            EntityRef::Body => &mut self.attributes,
            EntityRef::EEdge(id) => &mut self.graph.edge_mut(id)?.attributes,
            EntityRef::ELoop(id) => &mut self.graph.eloop_mut(id)?.attributes,
            EntityRef::EFace(id) => &mut self.graph.face_mut(id)?.attributes,
            EntityRef::EShell(id) => &mut self.graph.shell_mut(id)?.attributes,
            EntityRef::Node(_) | EntityRef::Edge(_) | EntityRef::Face(_) => {
                return Err(RangeError::InvalidArgument(
                    "attributes of real entities are read-only".into(),
                )
                .into());
            }
        };
        attrs.set(name, value)
    }

    /// Looks up an attribute; real entities are answered by the real body.
    #[must_use]
    pub fn attribute(&self, entity: EntityRef, name: &str) -> Option<&AttrValue> {
        match entity {
            EntityRef::Node(n) => self.body.attribute(RealRef::Node(n), name),
            EntityRef::Edge(e) => self.body.attribute(RealRef::Edge(e), name),
            EntityRef::Face(f) => self.body.attribute(RealRef::Face(f), name),
            _ => self.attributes_of(entity).ok()?.get(name),
        }
    }

    /// The full attribute list of the body or an effective entity.
    ///
    /// # Errors
    ///
    /// Returns an error for real entities or missing effective ones.
    pub fn attributes_of(&self, entity: EntityRef) -> Result<&Attributes> {
        Ok(match entity {
            EntityRef::Body => &self.attributes,
            EntityRef::EEdge(id) => &self.graph.edge(id)?.attributes,
            EntityRef::ELoop(id) => &self.graph.eloop(id)?.attributes,
            EntityRef::EFace(id) => &self.graph.face(id)?.attributes,
            EntityRef::EShell(id) => &self.graph.shell(id)?.attributes,
            EntityRef::Node(_) | EntityRef::Edge(_) | EntityRef::Face(_) => {
                return Err(RangeError::InvalidArgument(
                    "real entity attributes live on the real body".into(),
                )
                .into());
            }
        })
    }

    pub(crate) fn attributes_mut(&mut self) -> &mut Attributes {
        &mut self.attributes
    }
}

impl Drop for EBody {
    fn drop(&mut self) {
        let faces = self.graph.face_order.len();
        self.graph.clear();
        self.tess = None;
        debug!(faces, "effective body released");
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
pub(crate) mod tests {
    use super::*;
    use crate::brep::primitives::{MakeBox, MakeCylinder, MakeGridSheet};
    use crate::brep::Model;
    use crate::error::EffectError;
    use crate::math::Point3;
    use crate::tessellation::{TessellateBody, TessellationParams};

    pub(crate) fn tessellate(model: Model) -> Arc<Tessellation> {
        Arc::new(
            TessellateBody::new(Arc::new(model), TessellationParams::default())
                .execute()
                .unwrap(),
        )
    }

    pub(crate) fn unit_box() -> EBody {
        let model = MakeBox::new(Point3::origin(), Point3::new(1.0, 1.0, 1.0))
            .execute()
            .unwrap();
        Virtualize::new(tessellate(model), 0.0).execute().unwrap()
    }

    pub(crate) fn seamed_cylinder() -> EBody {
        let model = MakeCylinder::new(Point3::origin(), 1.0, 2.0, 4)
            .keep_seam()
            .execute()
            .unwrap();
        Virtualize::new(tessellate(model), 5.0).execute().unwrap()
    }

    pub(crate) fn grid(nx: usize, ny: usize) -> EBody {
        let model = MakeGridSheet::new(Point3::origin(), 1.0, nx, ny)
            .execute()
            .unwrap();
        Virtualize::new(tessellate(model), 5.0).execute().unwrap()
    }

    #[test]
    fn finalize_seals_the_body() {
        let mut ebody = unit_box();
        assert!(ebody.tessellation().is_some());
        ebody.finalize().unwrap();
        assert!(ebody.is_finalized());
        assert!(ebody.tessellation().is_none());
        assert!(matches!(
            ebody.finalize(),
            Err(EffectError::State(StateError::Finalized))
        ));
        assert!(matches!(
            ebody.eliminate_nodes(),
            Err(EffectError::State(StateError::Finalized))
        ));
    }

    #[test]
    fn other_threads_cannot_mutate() {
        let mut ebody = unit_box();
        let result = std::thread::scope(|s| s.spawn(|| ebody.finalize()).join().unwrap());
        assert!(matches!(result, Err(EffectError::State(StateError::WrongThread))));
        assert!(!ebody.is_finalized());
    }

    #[test]
    fn finalized_body_is_shared_across_threads() {
        let mut ebody = unit_box();
        ebody.finalize().unwrap();
        let face = ebody.efaces()[0];
        std::thread::scope(|s| {
            for _ in 0..4 {
                s.spawn(|| {
                    let eval = ebody
                        .evaluate_face(face, &crate::math::Point2::new(0.5, 0.5))
                        .unwrap();
                    assert!(eval.point.z.abs() < 1e-12);
                });
            }
        });
    }

    #[test]
    fn attributes_on_effective_entities() {
        let mut ebody = unit_box();
        let face = ebody.efaces()[2];
        ebody
            .set_attribute(EntityRef::EFace(face), "tag", AttrValue::Int(vec![3]))
            .unwrap();
        ebody
            .set_attribute(EntityRef::Body, "name", AttrValue::String("cube".into()))
            .unwrap();
        assert_eq!(
            ebody.attribute(EntityRef::EFace(face), "tag"),
            Some(&AttrValue::Int(vec![3]))
        );
        assert!(ebody.attribute(EntityRef::Body, "name").is_some());
        assert!(ebody
            .set_attribute(EntityRef::Face(FaceRef(0)), "tag", AttrValue::Int(vec![1]))
            .is_err());
    }

    #[test]
    fn real_lookups() {
        let ebody = unit_box();
        let face = ebody.eface_of(FaceRef(4)).unwrap();
        assert_eq!(ebody.eface(face).unwrap().patches[0].face, FaceRef(4));
        let edge = ebody.eedge_of(EdgeRef(3)).unwrap();
        assert_eq!(ebody.eedge(edge).unwrap().segments[0].edge, EdgeRef(3));
        assert!(ebody.eface_of(FaceRef(6)).is_err());
        assert_eq!(ebody.eshell_of(face).unwrap(), ebody.eshells()[0]);
    }
}
