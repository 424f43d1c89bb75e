pub mod bigfloat;
pub mod config;
pub mod fixed_point;
pub mod limbs;
pub mod pixel;
pub mod pixel_rect;
pub mod precision;
pub mod view;

pub use bigfloat::BigFloat;
pub use config::{EngineConfig, EngineDefaults, ENGINE_DEFAULTS};
pub use fixed_point::{FixedComplex, FixedPoint, FixedPointError};
pub use limbs::{Limb, LimbArith, NativeLimbs, PortableLimbs, LIMB_BITS};
pub use pixel::{RecalcPolicy, COUNT_MASK, DIRTY_BIT};
pub use pixel_rect::PixelRect;
pub use precision::Precision;
pub use view::{ViewError, ViewParams};
