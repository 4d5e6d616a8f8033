//! Line-oriented ASCII persistence of a finalized [`EBody`].
//!
//! Integers are written 20 per line and reals 5 per line in C `%19.12le`
//! layout. Every reference is a 1-based index; 0 stands for none. The stream
//! is unversioned and strictly order-dependent.

use std::collections::VecDeque;
use std::io::{BufRead, Write};
use std::str::FromStr;
use std::sync::Arc;

use tracing::debug;

use crate::brep::{AttrValue, Attributes, BodyKind, Closure, EdgeKind, EdgeRef, FaceRef, NodeRef, RealBody, Sense};
use crate::error::{FormatError, Result, StateError};
use crate::math::{Point2, Vector3};

use super::entity::{EEdgeData, EFaceData, ELoopData, EShellData, EdgeUv, HitCache, Patch, Segment};
use super::uvmap::{PlanarProjection, UvMap};
use super::{BodyState, EBody, EEdgeId, EFaceId, EffectParams, ELoopId, EntityRef, Graph};

const INTS_PER_LINE: usize = 20;
const REALS_PER_LINE: usize = 5;

/// Formats a double like C's `%19.12le`.
fn fmt_real(x: f64) -> String {
    let text = if x.is_nan() {
        "nan".to_owned()
    } else if x.is_infinite() {
        if x > 0.0 { "inf" } else { "-inf" }.to_owned()
    } else {
        let raw = format!("{x:.12e}");
        match raw.split_once('e') {
            Some((mantissa, exp)) => {
                let exp: i32 = exp.parse().unwrap_or(0);
                let sign = if exp < 0 { '-' } else { '+' };
                format!("{mantissa}e{sign}{:02}", exp.unsigned_abs())
            }
            None => raw,
        }
    };
    format!("{text:>19}")
}

fn index_of<T: PartialEq>(list: &[T], item: &T) -> Result<i64> {
    list.iter()
        .position(|x| x == item)
        .map(|i| to_int(i) + 1)
        .ok_or_else(|| FormatError::Invalid("reference to an entity outside the body".into()).into())
}

#[allow(clippy::cast_possible_wrap)]
fn to_int(v: usize) -> i64 {
    v as i64
}

struct Writer<W> {
    out: W,
}

impl<W: Write> Writer<W> {
    fn line(&mut self, text: &str) -> Result<()> {
        writeln!(self.out, "{text}").map_err(FormatError::from)?;
        Ok(())
    }

    fn ints(&mut self, values: &[i64]) -> Result<()> {
        for chunk in values.chunks(INTS_PER_LINE) {
            let text: Vec<String> = chunk.iter().map(i64::to_string).collect();
            self.line(&text.join(" "))?;
        }
        Ok(())
    }

    fn reals(&mut self, values: &[f64]) -> Result<()> {
        for chunk in values.chunks(REALS_PER_LINE) {
            let text: String = chunk.iter().map(|x| format!(" {}", fmt_real(*x))).collect();
            self.line(&text)?;
        }
        Ok(())
    }

    fn attributes(&mut self, attrs: &Attributes) -> Result<()> {
        for (name, value) in attrs.iter() {
            self.line(&format!("{name} {} {}", value.type_code(), value.len()))?;
            match value {
                AttrValue::Int(v) => self.ints(v)?,
                AttrValue::Real(v) => self.reals(v)?,
                AttrValue::String(s) => self.line(s)?,
            }
        }
        Ok(())
    }
}

/// Whitespace tokens with line tracking, plus raw lines for strings.
struct Reader<R> {
    input: R,
    line: usize,
    pending: VecDeque<String>,
}

impl<R: BufRead> Reader<R> {
    fn next_line(&mut self) -> Result<String> {
        let mut buf = String::new();
        let n = self.input.read_line(&mut buf).map_err(FormatError::from)?;
        if n == 0 {
            return Err(FormatError::UnexpectedEof.into());
        }
        self.line += 1;
        Ok(buf.trim_end_matches(['\n', '\r']).to_owned())
    }

    fn token(&mut self) -> Result<String> {
        loop {
            if let Some(t) = self.pending.pop_front() {
                return Ok(t);
            }
            let line = self.next_line()?;
            self.pending = line.split_whitespace().map(str::to_owned).collect();
        }
    }

    fn parse<T: FromStr>(&mut self) -> Result<T> {
        let token = self.token()?;
        token.parse().map_err(|_| {
            FormatError::Parse {
                line: self.line,
                token,
            }
            .into()
        })
    }

    fn int(&mut self) -> Result<i64> {
        self.parse()
    }

    fn count(&mut self) -> Result<usize> {
        self.parse()
    }

    fn real(&mut self) -> Result<f64> {
        self.parse()
    }

    /// A count that may not exceed what the real body can hold.
    fn bounded(&mut self, what: &str, limit: usize) -> Result<usize> {
        let n = self.count()?;
        if n > limit {
            return Err(self.invalid(&format!("{n} {what} exceed the body's {limit}")));
        }
        Ok(n)
    }

    fn reals(&mut self, n: usize) -> Result<Vec<f64>> {
        (0..n).map(|_| self.real()).collect()
    }

    /// A 1-based reference into `count` entities, 0-based on return.
    fn index(&mut self, count: usize) -> Result<usize> {
        self.optional_index(count)?
            .ok_or_else(|| self.invalid("missing reference"))
    }

    fn optional_index(&mut self, count: usize) -> Result<Option<usize>> {
        let v = self.count()?;
        match v {
            0 => Ok(None),
            v if v <= count => Ok(Some(v - 1)),
            v => Err(self.invalid(&format!("reference {v} exceeds {count}"))),
        }
    }

    fn sense(&mut self) -> Result<Sense> {
        let s = self.int()?;
        Sense::from_sign(s).ok_or_else(|| self.invalid(&format!("sense {s}")))
    }

    fn point2(&mut self) -> Result<Point2> {
        Ok(Point2::new(self.real()?, self.real()?))
    }

    fn vector3(&mut self) -> Result<Vector3> {
        Ok(Vector3::new(self.real()?, self.real()?, self.real()?))
    }

    /// `n` references into already-read entities.
    fn refs<K: Copy>(&mut self, ids: &[K], n: usize) -> Result<Vec<K>> {
        let mut out = Vec::new();
        for _ in 0..n {
            out.push(ids[self.index(ids.len())?]);
        }
        Ok(out)
    }

    fn triangles(&mut self, n: usize, vertices: usize) -> Result<Vec<[usize; 3]>> {
        let mut out = Vec::new();
        for _ in 0..n {
            out.push([self.index(vertices)?, self.index(vertices)?, self.index(vertices)?]);
        }
        Ok(out)
    }

    fn optional_triangles(&mut self, n: usize, vertices: usize) -> Result<Vec<[Option<usize>; 3]>> {
        let mut out = Vec::new();
        for _ in 0..n {
            out.push([
                self.optional_index(vertices)?,
                self.optional_index(vertices)?,
                self.optional_index(vertices)?,
            ]);
        }
        Ok(out)
    }

    fn raw_line(&mut self) -> Result<String> {
        if !self.pending.is_empty() {
            return Err(self.invalid("string value must start a new line"));
        }
        self.next_line()
    }

    fn attributes(&mut self, n: usize) -> Result<Attributes> {
        let mut attrs = Attributes::new();
        for _ in 0..n {
            let name = self.token()?;
            let code = self.int()?;
            let len = self.count()?;
            let value = match code {
                1 => AttrValue::Int((0..len).map(|_| self.int()).collect::<Result<_>>()?),
                2 => AttrValue::Real(self.reals(len)?),
                3 => {
                    let s = self.raw_line()?;
                    if s.len() != len {
                        return Err(self.invalid(&format!("string attribute {name} has the wrong length")));
                    }
                    AttrValue::String(s)
                }
                c => return Err(self.invalid(&format!("attribute type {c}"))),
            };
            attrs.set(&name, value)?;
        }
        Ok(attrs)
    }

    fn invalid(&self, what: &str) -> crate::error::EffectError {
        FormatError::Invalid(format!("line {}: {what}", self.line)).into()
    }
}

impl EBody {
    /// Writes the whole effective topology.
    ///
    /// # Errors
    ///
    /// Returns [`StateError::NotFinalized`] for an open body and a
    /// [`FormatError`] on I/O failure.
    pub fn write(&self, out: impl Write) -> Result<()> {
        if !self.is_finalized() {
            return Err(StateError::NotFinalized.into());
        }
        let mut w = Writer { out };
        let (edges, loops, faces, shells) = (self.eedges(), self.eloops(), self.efaces(), self.eshells());
        let body_attrs = self.attributes_of(EntityRef::Body)?;
        w.ints(&[
            to_int(edges.len()),
            to_int(loops.len()),
            to_int(faces.len()),
            to_int(shells.len()),
            to_int(body_attrs.len()),
        ])?;
        w.reals(&[self.angle()])?;
        if self.kind() == BodyKind::Solid {
            let senses: Vec<i64> = (0..shells.len())
                .map(|i| i64::from(self.shell_senses().get(i).map_or(1, |s| s.sign())))
                .collect();
            w.ints(&senses)?;
        }
        w.attributes(body_attrs)?;

        for id in edges {
            let edge = self.graph.edge(*id)?;
            w.ints(&[
                edge.kind.code(),
                to_int(edge.segments.len()),
                to_int(edge.nodes[0].0) + 1,
                to_int(edge.nodes[1].0) + 1,
                to_int(edge.attributes.len()),
            ])?;
            w.reals(&edge.t_range)?;
            for seg in &edge.segments {
                w.ints(&[
                    to_int(seg.edge.0) + 1,
                    i64::from(seg.sense.sign()),
                    to_int(seg.ts.len()),
                    seg.interior_node.map_or(0, |n| to_int(n.0) + 1),
                ])?;
                w.reals(&[seg.t_start, seg.d_start.x, seg.d_start.y, seg.d_start.z])?;
                w.reals(&[seg.t_end, seg.d_end.x, seg.d_end.y, seg.d_end.z])?;
                w.reals(&seg.ts)?;
            }
            w.attributes(&edge.attributes)?;
        }

        for id in loops {
            let lp = self.graph.eloop(*id)?;
            w.ints(&[
                lp.closure.code(),
                to_int(lp.edges.len()),
                to_int(lp.edge_uvs.len()),
                to_int(lp.attributes.len()),
            ])?;
            w.reals(&[lp.area])?;
            let indices = lp.edges.iter().map(|(e, _)| index_of(edges, e)).collect::<Result<Vec<_>>>()?;
            w.ints(&indices)?;
            w.ints(&lp.edges.iter().map(|(_, s)| i64::from(s.sign())).collect::<Vec<_>>())?;
            for eu in &lp.edge_uvs {
                w.ints(&[to_int(eu.edge.0) + 1, i64::from(eu.sense.sign()), to_int(eu.indices.len())])?;
                w.ints(&eu.indices.iter().map(|i| i.map_or(0, |v| to_int(v) + 1)).collect::<Vec<_>>())?;
            }
            w.attributes(&lp.attributes)?;
        }

        for id in faces {
            let face = self.graph.face(*id)?;
            w.ints(&[
                i64::from(face.sense.sign()),
                to_int(face.patches.len()),
                to_int(face.loops.len()),
                i64::from(face.is_composite()),
                to_int(face.attributes.len()),
            ])?;
            match &face.uvmap {
                Some(map) => {
                    w.ints(&[to_int(map.uvs().len()), to_int(map.tris().len())])?;
                    w.reals(&map.range())?;
                    w.reals(&map.uvs().iter().flat_map(|p| [p.x, p.y]).collect::<Vec<_>>())?;
                    w.ints(&map.tris().iter().flatten().map(|v| to_int(*v) + 1).collect::<Vec<_>>())?;
                    w.ints(&map.tri_patch().iter().map(|p| to_int(*p) + 1).collect::<Vec<_>>())?;
                }
                None => w.reals(&self.face_range(*id)?)?,
            }
            let indices = face.loops.iter().map(|(l, _)| index_of(loops, l)).collect::<Result<Vec<_>>>()?;
            w.ints(&indices)?;
            w.ints(&face.loops.iter().map(|(_, s)| i64::from(s.sign())).collect::<Vec<_>>())?;
            for patch in &face.patches {
                w.ints(&[
                    to_int(patch.face.0) + 1,
                    to_int(patch.start),
                    to_int(patch.uvs.len()),
                    to_int(patch.deflect.len()),
                    to_int(patch.tris.len()),
                ])?;
                w.ints(&patch.tris.iter().flatten().map(|v| to_int(*v) + 1).collect::<Vec<_>>())?;
                w.ints(
                    &patch
                        .deflect_tris
                        .iter()
                        .flatten()
                        .map(|d| d.map_or(0, |v| to_int(v) + 1))
                        .collect::<Vec<_>>(),
                )?;
                w.reals(&patch.uvs.iter().flat_map(|p| [p.x, p.y]).collect::<Vec<_>>())?;
                w.reals(&patch.deflect.iter().flat_map(|d| [d.x, d.y, d.z]).collect::<Vec<_>>())?;
            }
            w.attributes(&face.attributes)?;
        }

        for id in shells {
            let shell = self.graph.shell(*id)?;
            w.ints(&[shell.closure.code(), to_int(shell.faces.len()), to_int(shell.attributes.len())])?;
            let indices = shell.faces.iter().map(|f| index_of(faces, f)).collect::<Result<Vec<_>>>()?;
            w.ints(&indices)?;
            w.attributes(&shell.attributes)?;
        }
        w.out.flush().map_err(FormatError::from)?;
        debug!(eedges = edges.len(), efaces = faces.len(), "effective body written");
        Ok(())
    }

    /// Reads an effective topology written by [`EBody::write`] over `body`.
    ///
    /// The result is finalized and uses the default parametrizer and params.
    ///
    /// # Errors
    ///
    /// Returns a [`FormatError`] for truncated or malformed streams and for
    /// references the body cannot resolve.
    pub fn read(input: impl BufRead, body: Arc<dyn RealBody>) -> Result<EBody> {
        let mut r = Reader {
            input,
            line: 0,
            pending: VecDeque::new(),
        };
        let n_edges = r.bounded("eedges", body.edge_count())?;
        let n_loops = r.count()?;
        let n_faces = r.bounded("efaces", body.face_count())?;
        let n_shells = r.bounded("eshells", body.shell_count())?;
        let n_attrs = r.count()?;
        let angle = r.real()?;
        let mut senses = Vec::new();
        if body.kind() == BodyKind::Solid {
            for _ in 0..n_shells {
                senses.push(r.sense()?);
            }
        }
        let body_attrs = r.attributes(n_attrs)?;

        let mut graph = Graph::default();
        let mut edge_ids: Vec<EEdgeId> = Vec::new();
        for _ in 0..n_edges {
            let code = r.int()?;
            let kind = EdgeKind::from_code(code).ok_or_else(|| r.invalid(&format!("edge kind {code}")))?;
            let n_segs = r.bounded("segments", body.edge_count())?;
            let nodes = [
                NodeRef(r.index(body.node_count())?),
                NodeRef(r.index(body.node_count())?),
            ];
            let n_attr = r.count()?;
            let t_range = [r.real()?, r.real()?];
            let mut segments = Vec::new();
            for _ in 0..n_segs {
                let edge = EdgeRef(r.index(body.edge_count())?);
                let sense = r.sense()?;
                let n_pts = r.count()?;
                let interior_node = r.optional_index(body.node_count())?.map(NodeRef);
                let t_start = r.real()?;
                let d_start = r.vector3()?;
                let t_end = r.real()?;
                let d_end = r.vector3()?;
                segments.push(Segment {
                    edge,
                    sense,
                    interior_node,
                    t_start,
                    t_end,
                    ts: r.reals(n_pts)?,
                    d_start,
                    d_end,
                });
            }
            let attributes = r.attributes(n_attr)?;
            edge_ids.push(graph.add_edge(EEdgeData {
                kind,
                nodes,
                t_range,
                segments,
                attributes,
            }));
        }

        let mut loop_ids: Vec<ELoopId> = Vec::new();
        for _ in 0..n_loops {
            let code = r.int()?;
            let closure = Closure::from_code(code).ok_or_else(|| r.invalid(&format!("loop kind {code}")))?;
            let (n_uses, n_uvs, n_attr) = (r.count()?, r.count()?, r.count()?);
            let area = r.real()?;
            let ids = r.refs(&edge_ids, n_uses)?;
            let uses_senses = (0..n_uses).map(|_| r.sense()).collect::<Result<Vec<_>>>()?;
            let mut edge_uvs = Vec::new();
            for _ in 0..n_uvs {
                let edge = EdgeRef(r.index(body.edge_count())?);
                let sense = r.sense()?;
                let n = r.count()?;
                let indices = (0..n)
                    .map(|_| r.optional_index(usize::MAX))
                    .collect::<Result<Vec<_>>>()?;
                edge_uvs.push(EdgeUv { edge, sense, indices });
            }
            let attributes = r.attributes(n_attr)?;
            loop_ids.push(graph.add_loop(ELoopData {
                closure,
                edges: ids.into_iter().zip(uses_senses).collect(),
                edge_uvs,
                area,
                attributes,
            }));
        }

        let mut face_ids: Vec<EFaceId> = Vec::new();
        for _ in 0..n_faces {
            let sense = r.sense()?;
            let n_patches = r.bounded("patches", body.face_count())?;
            let n_face_loops = r.count()?;
            let composite = match r.int()? {
                0 => false,
                1 => true,
                c => return Err(r.invalid(&format!("composite flag {c}"))),
            };
            let n_attr = r.count()?;
            let uvmap = if composite {
                let (n_verts, n_tris) = (r.count()?, r.count()?);
                r.reals(4)?;
                let uvs = (0..n_verts).map(|_| r.point2()).collect::<Result<Vec<_>>>()?;
                let tris = r.triangles(n_tris, n_verts)?;
                let tri_patch = (0..n_tris).map(|_| r.index(n_patches)).collect::<Result<Vec<_>>>()?;
                Some(UvMap::from_parts(uvs, tris, tri_patch)?)
            } else {
                r.reals(4)?;
                None
            };
            let ids = r.refs(&loop_ids, n_face_loops)?;
            let loop_senses = (0..n_face_loops).map(|_| r.sense()).collect::<Result<Vec<_>>>()?;
            let mut patches = Vec::new();
            for _ in 0..n_patches {
                let face = FaceRef(r.index(body.face_count())?);
                let start = r.count()?;
                let (n_uv, n_deflect, n_tris) = (r.count()?, r.count()?, r.count()?);
                let tris = r.triangles(n_tris, n_uv)?;
                let deflect_tris = r.optional_triangles(n_tris, n_deflect)?;
                let uvs = (0..n_uv).map(|_| r.point2()).collect::<Result<Vec<_>>>()?;
                let deflect = (0..n_deflect).map(|_| r.vector3()).collect::<Result<Vec<_>>>()?;
                patches.push(Patch {
                    face,
                    start,
                    uvs,
                    tris,
                    deflect_tris,
                    deflect,
                    last_hit: HitCache::default(),
                });
            }
            let attributes = r.attributes(n_attr)?;
            face_ids.push(graph.add_face(EFaceData {
                sense,
                patches,
                uvmap,
                loops: ids.into_iter().zip(loop_senses).collect(),
                attributes,
            }));
        }

        for _ in 0..n_shells {
            let code = r.int()?;
            let closure = Closure::from_code(code).ok_or_else(|| r.invalid(&format!("shell kind {code}")))?;
            let (n_shell_faces, n_attr) = (r.count()?, r.count()?);
            let faces = r.refs(&face_ids, n_shell_faces)?;
            let attributes = r.attributes(n_attr)?;
            graph.add_shell(EShellData {
                closure,
                faces,
                attributes,
            });
        }

        let mut ebody = EBody::from_parts(
            body,
            None,
            BodyState::Finalized,
            angle,
            EffectParams::default(),
            senses,
            Arc::new(PlanarProjection),
            graph,
        );
        *ebody.attributes_mut() = body_attrs;
        debug!(eedges = n_edges, efaces = n_faces, "effective body read");
        Ok(ebody)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::io::BufReader;

    use super::*;
    use crate::effect::nodes::tests::deflected_split_sheet;
    use crate::effect::tests::{grid, unit_box};
    use crate::effect::MakeComposite;
    use crate::error::EffectError;

    #[test]
    fn reals_follow_c_layout() {
        assert_eq!(fmt_real(1.0), " 1.000000000000e+00");
        assert_eq!(fmt_real(-0.5), "-5.000000000000e-01");
        assert_eq!(fmt_real(1e-100), "1.000000000000e-100");
        assert_eq!(fmt_real(0.0), " 0.000000000000e+00");
        assert_eq!(" 1.000000000000e+00".trim().parse::<f64>().unwrap(), 1.0);
    }

    #[test]
    fn open_bodies_cannot_be_written() {
        let ebody = unit_box();
        let mut out = Vec::new();
        assert!(matches!(
            ebody.write(&mut out),
            Err(EffectError::State(StateError::NotFinalized))
        ));
        assert!(out.is_empty());
    }

    #[test]
    fn composite_roundtrip() {
        let mut ebody = grid(2, 1);
        let id = MakeComposite::new(&[FaceRef(0), FaceRef(1)])
            .execute(&mut ebody)
            .unwrap();
        ebody
            .set_attribute(EntityRef::EFace(id), "name", AttrValue::String("wing skin".into()))
            .unwrap();
        ebody
            .set_attribute(EntityRef::Body, "scale", AttrValue::Real(vec![0.5, 2.0]))
            .unwrap();
        ebody.finalize().unwrap();

        let mut out = Vec::new();
        ebody.write(&mut out).unwrap();
        let back = EBody::read(BufReader::new(out.as_slice()), Arc::clone(ebody.body())).unwrap();

        assert!(back.is_finalized());
        assert_eq!(back.eedges().len(), ebody.eedges().len());
        assert_eq!(back.eloops().len(), ebody.eloops().len());
        assert_eq!(back.efaces().len(), 1);
        assert_eq!(back.eshells().len(), 1);
        assert_eq!(back.attribute(EntityRef::Body, "scale"), Some(&AttrValue::Real(vec![0.5, 2.0])));
        let face = back.efaces()[0];
        assert_eq!(
            back.attribute(EntityRef::EFace(face), "name"),
            Some(&AttrValue::String("wing skin".into()))
        );

        let uv = ebody.inverse_face(id, &crate::math::Point3::new(1.3, 0.6, 0.0)).unwrap().0;
        let a = ebody.evaluate_face(id, &uv).unwrap().point;
        let b = back.evaluate_face(face, &uv).unwrap().point;
        assert!((a - b).norm() < 1e-9);
        for (x, y) in ebody.eedges().iter().zip(back.eedges()) {
            assert_eq!(ebody.eedge(*x).unwrap().segments.len(), back.eedge(*y).unwrap().segments.len());
        }

        let mut again = Vec::new();
        back.write(&mut again).unwrap();
        assert_eq!(String::from_utf8(again).unwrap(), String::from_utf8(out).unwrap());
    }

    #[test]
    fn solid_roundtrip_keeps_shell_senses() {
        let mut ebody = unit_box();
        ebody.finalize().unwrap();
        let mut out = Vec::new();
        ebody.write(&mut out).unwrap();
        let back = EBody::read(out.as_slice(), Arc::clone(ebody.body())).unwrap();
        assert_eq!(back.shell_senses(), ebody.shell_senses());
        assert_eq!(back.efaces().len(), 6);
        let e = back.eedges()[3];
        let (t, _) = back.inverse_edge(e, &crate::math::Point3::new(0.5, 0.5, 0.5)).unwrap();
        assert!(back.evaluate_edge(e, t).is_ok());
    }

    #[test]
    fn truncated_streams_fail() {
        let mut ebody = unit_box();
        ebody.finalize().unwrap();
        let mut out = Vec::new();
        ebody.write(&mut out).unwrap();
        let cut = &out[..out.len() / 2];
        assert!(matches!(
            EBody::read(cut, Arc::clone(ebody.body())),
            Err(EffectError::Format(_))
        ));
        assert!(matches!(
            EBody::read(&b"12 x"[..], Arc::clone(ebody.body())),
            Err(EffectError::Format(FormatError::Parse { line: 1, .. }))
        ));
    }

    #[test]
    fn edges_evaluate_alike_at_every_sample() {
        let offset = Vector3::new(0.0, 0.0, 0.005);
        let mut ebody = deflected_split_sheet(offset);
        ebody.finalize().unwrap();
        let mut out = Vec::new();
        ebody.write(&mut out).unwrap();
        let back = EBody::read(out.as_slice(), Arc::clone(ebody.body())).unwrap();

        let merged = ebody.eedge_of(EdgeRef(0)).unwrap();
        assert!(ebody
            .eedge(merged)
            .unwrap()
            .segments
            .iter()
            .any(|s| s.d_start.norm() > 0.0 || s.d_end.norm() > 0.0));

        assert_eq!(ebody.eedges().len(), back.eedges().len());
        for (a, b) in ebody.eedges().iter().zip(back.eedges()) {
            for seg in &ebody.eedge(*a).unwrap().segments {
                for &tx in &seg.ts {
                    let t = seg.to_effective(tx);
                    let before = ebody.evaluate_edge(*a, t).unwrap();
                    let after = back.evaluate_edge(*b, t).unwrap();
                    assert!((before.point - after.point).norm() < 1e-9);
                    assert!((before.d1 - after.d1).norm() < 1e-9);
                }
            }
        }
    }

    #[test]
    fn oversized_counts_fail_cleanly() {
        let mut ebody = unit_box();
        ebody.finalize().unwrap();
        let body = Arc::clone(ebody.body());
        assert!(matches!(
            EBody::read(&b"18446744073709551615 0 0 0 0\n 1.0\n"[..], Arc::clone(&body)),
            Err(EffectError::Format(FormatError::Invalid(_)))
        ));

        let mut out = Vec::new();
        ebody.write(&mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        let mut lines: Vec<String> = text.lines().map(str::to_owned).collect();
        // header, angle, shell sense, then the first EEdge header
        let mut fields: Vec<String> = lines[3].split_whitespace().map(str::to_owned).collect();
        fields[1] = "4000000000000000000".into();
        lines[3] = fields.join(" ");
        let stream = lines.join("\n");
        assert!(matches!(
            EBody::read(stream.as_bytes(), Arc::clone(&body)),
            Err(EffectError::Format(FormatError::Invalid(_)))
        ));

        let mut lines: Vec<String> = text.lines().map(str::to_owned).collect();
        let mut fields: Vec<String> = lines[0].split_whitespace().map(str::to_owned).collect();
        fields[1] = "4000000000000000000".into();
        lines[0] = fields.join(" ");
        let stream = lines.join("\n");
        assert!(matches!(
            EBody::read(stream.as_bytes(), body),
            Err(EffectError::Format(_))
        ));
    }
}
