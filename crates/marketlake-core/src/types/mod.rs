//! 파이프라인 전반에서 사용되는 공통 타입.

mod batch;
mod symbol;
mod value;

pub use batch::*;
pub use symbol::*;
pub use value::*;
