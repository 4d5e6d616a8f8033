//! Topology enumeration over the real and effective entities of an
//! [`EBody`].
//!
//! Real Edges sit beside EEdges and real Faces beside EFaces: asking an EEdge
//! for its Edges lists its segments, and asking an EFace for its Faces lists
//! its patches. A real Edge or Face used as a source stands for the effective
//! entity covering it.

use crate::brep::{BodyKind, Closure, EdgeKind, EdgeRef, EdgeTopology, FaceRef, FaceTopology, NodeRef, Sense};
use crate::error::{RangeError, Result};
use crate::math::Point3;

use super::evaluate::SegmentInfo;
use super::{EBody, EEdgeId, EFaceId, ELoopId, EShellId};

/// Any entity reachable from an [`EBody`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityRef {
    Body,
    Node(NodeRef),
    Edge(EdgeRef),
    Face(FaceRef),
    EEdge(EEdgeId),
    ELoop(ELoopId),
    EFace(EFaceId),
    EShell(EShellId),
}

/// Entity classes that can be enumerated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TopoClass {
    Node,
    Edge,
    Face,
    EEdge,
    ELoop,
    EFace,
    EShell,
}

impl TopoClass {
    fn level(self) -> u8 {
        match self {
            Self::Node => 0,
            Self::Edge | Self::EEdge => 1,
            Self::ELoop => 2,
            Self::Face | Self::EFace => 3,
            Self::EShell => 4,
        }
    }
}

impl EntityRef {
    /// The class of this entity, `None` for the body.
    #[must_use]
    pub fn class(self) -> Option<TopoClass> {
        Some(match self {
            Self::Body => return None,
            Self::Node(_) => TopoClass::Node,
            Self::Edge(_) => TopoClass::Edge,
            Self::Face(_) => TopoClass::Face,
            Self::EEdge(_) => TopoClass::EEdge,
            Self::ELoop(_) => TopoClass::ELoop,
            Self::EFace(_) => TopoClass::EFace,
            Self::EShell(_) => TopoClass::EShell,
        })
    }
}

/// Description of one entity.
#[derive(Debug, Clone, PartialEq)]
pub enum ETopology {
    Body {
        kind: BodyKind,
        shells: Vec<EShellId>,
        /// Orientation per shell for solids.
        senses: Vec<Sense>,
    },
    Node {
        point: Point3,
    },
    Edge(EdgeTopology),
    Face(FaceTopology),
    EEdge {
        kind: EdgeKind,
        nodes: [NodeRef; 2],
        range: [f64; 2],
        segments: Vec<SegmentInfo>,
    },
    ELoop {
        closure: Closure,
        edges: Vec<(EEdgeId, Sense)>,
        area: f64,
    },
    EFace {
        sense: Sense,
        loops: Vec<(ELoopId, Sense)>,
        range: [f64; 4],
        patches: Vec<FaceRef>,
    },
    EShell {
        closure: Closure,
        faces: Vec<EFaceId>,
    },
}

/// Effective entities at or below a source, gathered level by level.
#[derive(Default)]
struct Below {
    faces: Vec<EFaceId>,
    loops: Vec<ELoopId>,
    edges: Vec<EEdgeId>,
}

fn push_unique<T: PartialEq>(list: &mut Vec<T>, item: T) {
    if !list.contains(&item) {
        list.push(item);
    }
}

impl EBody {
    /// Enumerates entities of `class`, globally when `source` is `None` or
    /// the body, otherwise those above or below `source`.
    ///
    /// # Errors
    ///
    /// Returns [`RangeError::InvalidArgument`] when `source` has the same
    /// class, and an error if it does not exist.
    pub fn topos(&self, source: Option<EntityRef>, class: TopoClass) -> Result<Vec<EntityRef>> {
        let Some(src) = source.filter(|s| *s != EntityRef::Body) else {
            return Ok(self.all(class));
        };
        let src_class = src.class().ok_or_else(|| RangeError::InvalidArgument("body source".into()))?;
        if src_class == class {
            return Err(RangeError::InvalidArgument(format!("{class:?} cannot enumerate itself")).into());
        }
        match (src, class) {
            (EntityRef::Edge(e), TopoClass::EEdge) => return Ok(vec![EntityRef::EEdge(self.eedge_of(e)?)]),
            (EntityRef::Face(f), TopoClass::EFace) => return Ok(vec![EntityRef::EFace(self.eface_of(f)?)]),
            _ => {}
        }
        if class.level() <= src_class.level() {
            return self.below(src, class);
        }
        let mut found = Vec::new();
        for candidate in self.all(class) {
            if self.below(candidate, src_class)?.contains(&src) {
                found.push(candidate);
            }
        }
        Ok(found)
    }

    /// 0-based position of an entity in its class enumeration.
    ///
    /// # Errors
    ///
    /// Returns an error for the body or an entity that does not exist.
    pub fn index_of(&self, entity: EntityRef) -> Result<usize> {
        let class = entity
            .class()
            .ok_or_else(|| RangeError::InvalidArgument("the body has no index".into()))?;
        self.all(class)
            .iter()
            .position(|e| *e == entity)
            .ok_or_else(|| RangeError::InvalidArgument(format!("{entity:?} is not in the body")).into())
    }

    /// The entity at a 0-based position of a class enumeration.
    ///
    /// # Errors
    ///
    /// Returns [`RangeError::Index`] when out of range.
    pub fn object_at(&self, class: TopoClass, index: usize) -> Result<EntityRef> {
        let all = self.all(class);
        all.get(index).copied().ok_or_else(|| {
            RangeError::Index {
                kind: "entity",
                index,
                count: all.len(),
            }
            .into()
        })
    }

    /// Describes an entity.
    ///
    /// # Errors
    ///
    /// Returns an error if the entity does not exist.
    pub fn topology(&self, entity: EntityRef) -> Result<ETopology> {
        Ok(match entity {
            EntityRef::Body => ETopology::Body {
                kind: self.kind(),
                shells: self.eshells().to_vec(),
                senses: self.shell_senses().to_vec(),
            },
            EntityRef::Node(n) => ETopology::Node {
                point: self.body().node_point(n)?,
            },
            EntityRef::Edge(e) => ETopology::Edge(self.body().edge(e)?),
            EntityRef::Face(f) => ETopology::Face(self.body().face(f)?),
            EntityRef::EEdge(id) => {
                let edge = self.graph.edge(id)?;
                ETopology::EEdge {
                    kind: edge.kind,
                    nodes: edge.nodes,
                    range: edge.t_range,
                    segments: self.edge_list(id)?,
                }
            }
            EntityRef::ELoop(id) => {
                let lp = self.graph.eloop(id)?;
                ETopology::ELoop {
                    closure: lp.closure,
                    edges: lp.edges.clone(),
                    area: lp.area,
                }
            }
            EntityRef::EFace(id) => {
                let face = self.graph.face(id)?;
                ETopology::EFace {
                    sense: face.sense,
                    loops: face.loops.clone(),
                    range: self.face_range(id)?,
                    patches: face.patches.iter().map(|p| p.face).collect(),
                }
            }
            EntityRef::EShell(id) => {
                let shell = self.graph.shell(id)?;
                ETopology::EShell {
                    closure: shell.closure,
                    faces: shell.faces.clone(),
                }
            }
        })
    }

    fn all(&self, class: TopoClass) -> Vec<EntityRef> {
        match class {
            TopoClass::Node => (0..self.body().node_count()).map(|n| EntityRef::Node(NodeRef(n))).collect(),
            TopoClass::Edge => (0..self.body().edge_count()).map(|e| EntityRef::Edge(EdgeRef(e))).collect(),
            TopoClass::Face => (0..self.body().face_count()).map(|f| EntityRef::Face(FaceRef(f))).collect(),
            TopoClass::EEdge => self.eedges().iter().map(|id| EntityRef::EEdge(*id)).collect(),
            TopoClass::ELoop => self.eloops().iter().map(|id| EntityRef::ELoop(*id)).collect(),
            TopoClass::EFace => self.efaces().iter().map(|id| EntityRef::EFace(*id)).collect(),
            TopoClass::EShell => self.eshells().iter().map(|id| EntityRef::EShell(*id)).collect(),
        }
    }

    /// Entities of `class` at or below `src`.
    fn below(&self, src: EntityRef, class: TopoClass) -> Result<Vec<EntityRef>> {
        let mut b = Below::default();
        match src {
            EntityRef::Body => return Ok(self.all(class)),
            EntityRef::Node(_) => return Ok(Vec::new()),
            EntityRef::EShell(id) => b.faces.clone_from(&self.graph.shell(id)?.faces),
            EntityRef::EFace(id) => b.faces.push(id),
            EntityRef::Face(f) => b.faces.push(self.eface_of(f)?),
            EntityRef::ELoop(id) => b.loops.push(id),
            EntityRef::EEdge(id) => b.edges.push(id),
            EntityRef::Edge(e) => b.edges.push(self.eedge_of(e)?),
        }
        for f in &b.faces {
            for (l, _) in &self.graph.face(*f)?.loops {
                push_unique(&mut b.loops, *l);
            }
        }
        for l in &b.loops {
            for (e, _) in &self.graph.eloop(*l)?.edges {
                push_unique(&mut b.edges, *e);
            }
        }

        let mut out = Vec::new();
        match class {
            TopoClass::EShell => {}
            TopoClass::EFace => out.extend(b.faces.iter().map(|f| EntityRef::EFace(*f))),
            TopoClass::Face => {
                for f in &b.faces {
                    for p in &self.graph.face(*f)?.patches {
                        push_unique(&mut out, EntityRef::Face(p.face));
                    }
                }
            }
            TopoClass::ELoop => out.extend(b.loops.iter().map(|l| EntityRef::ELoop(*l))),
            TopoClass::EEdge => out.extend(b.edges.iter().map(|e| EntityRef::EEdge(*e))),
            TopoClass::Edge => {
                for e in &b.edges {
                    for s in &self.graph.edge(*e)?.segments {
                        push_unique(&mut out, EntityRef::Edge(s.edge));
                    }
                }
            }
            TopoClass::Node => {
                for e in &b.edges {
                    let edge = self.graph.edge(*e)?;
                    let inner = edge.segments.iter().filter_map(|s| s.interior_node);
                    for n in edge.nodes.into_iter().chain(inner) {
                        push_unique(&mut out, EntityRef::Node(n));
                    }
                }
            }
        }
        Ok(out)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::effect::tests::{grid, unit_box};
    use crate::effect::MakeComposite;
    use crate::error::EffectError;

    #[test]
    fn global_enumeration_counts() {
        let ebody = unit_box();
        assert_eq!(ebody.topos(None, TopoClass::Node).unwrap().len(), 8);
        assert_eq!(ebody.topos(None, TopoClass::EEdge).unwrap().len(), 12);
        assert_eq!(ebody.topos(Some(EntityRef::Body), TopoClass::EFace).unwrap().len(), 6);
        assert_eq!(ebody.topos(None, TopoClass::EShell).unwrap().len(), 1);
    }

    #[test]
    fn down_and_up_the_tree() {
        let ebody = unit_box();
        let face = EntityRef::EFace(ebody.efaces()[0]);
        assert_eq!(ebody.topos(Some(face), TopoClass::Node).unwrap().len(), 4);
        assert_eq!(ebody.topos(Some(face), TopoClass::EEdge).unwrap().len(), 4);
        assert_eq!(ebody.topos(Some(face), TopoClass::ELoop).unwrap().len(), 1);

        let node = EntityRef::Node(NodeRef(0));
        assert_eq!(ebody.topos(Some(node), TopoClass::EFace).unwrap().len(), 3);
        assert_eq!(ebody.topos(Some(node), TopoClass::EEdge).unwrap().len(), 3);
        let shell = EntityRef::EShell(ebody.eshells()[0]);
        assert_eq!(ebody.topos(Some(shell), TopoClass::Face).unwrap().len(), 6);
        let edge = EntityRef::EEdge(ebody.eedges()[0]);
        assert_eq!(ebody.topos(Some(edge), TopoClass::EShell).unwrap(), vec![shell]);
    }

    #[test]
    fn same_class_is_rejected() {
        let ebody = unit_box();
        let face = EntityRef::EFace(ebody.efaces()[0]);
        assert!(matches!(
            ebody.topos(Some(face), TopoClass::EFace),
            Err(EffectError::Range(RangeError::InvalidArgument(_)))
        ));
    }

    #[test]
    fn real_entities_shadow_effective_ones() {
        let mut ebody = grid(2, 1);
        let id = MakeComposite::new(&[FaceRef(0), FaceRef(1)])
            .execute(&mut ebody)
            .unwrap();
        let composite = EntityRef::EFace(id);
        assert_eq!(
            ebody.topos(Some(composite), TopoClass::Face).unwrap(),
            vec![EntityRef::Face(FaceRef(0)), EntityRef::Face(FaceRef(1))]
        );
        assert_eq!(
            ebody.topos(Some(EntityRef::Face(FaceRef(1))), TopoClass::EFace).unwrap(),
            vec![composite]
        );
        let bottom = ebody.eedge_of(EdgeRef(0)).unwrap();
        let segments = ebody.topos(Some(EntityRef::EEdge(bottom)), TopoClass::Edge).unwrap();
        assert_eq!(segments.len(), 2);
        let nodes = ebody.topos(Some(EntityRef::EEdge(bottom)), TopoClass::Node).unwrap();
        assert_eq!(nodes.len(), 3);
        assert!(nodes.contains(&EntityRef::Node(NodeRef(1))));
    }

    #[test]
    fn indices_and_descriptions() {
        let ebody = unit_box();
        for class in [TopoClass::Node, TopoClass::Edge, TopoClass::EEdge, TopoClass::EFace] {
            let third = ebody.object_at(class, 2).unwrap();
            assert_eq!(ebody.index_of(third).unwrap(), 2);
        }
        assert!(matches!(
            ebody.object_at(TopoClass::EShell, 1),
            Err(EffectError::Range(RangeError::Index { .. }))
        ));
        assert!(ebody.index_of(EntityRef::Body).is_err());

        let edge = ebody.object_at(TopoClass::EEdge, 0).unwrap();
        let ETopology::EEdge { kind, segments, .. } = ebody.topology(edge).unwrap() else {
            panic!("expected an eedge description");
        };
        assert_eq!(kind, EdgeKind::TwoNode);
        assert_eq!(segments.len(), 1);
        let ETopology::Body { kind, shells, senses } = ebody.topology(EntityRef::Body).unwrap() else {
            panic!("expected a body description");
        };
        assert_eq!(kind, BodyKind::Solid);
        assert_eq!(shells.len(), senses.len());
    }
}
