pub mod curve;
pub mod surface;

pub use curve::{Circle, Curve, CurveEvaluation, Line};
pub use surface::{Cylinder, Plane, Surface, SurfaceEvaluation};
