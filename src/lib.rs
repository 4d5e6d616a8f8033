pub mod brep;
pub mod effect;
pub mod error;
pub mod geometry;
pub mod math;
pub mod tessellation;

pub use effect::{EBody, MakeAttributeComposites, MakeComposite, Virtualize};
pub use error::{EffectError, Result};
