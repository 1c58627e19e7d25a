//! 프로바이더 응답과 정규화 결과를 표현하는 도메인 모델.

mod attribute;
mod dataset;
mod wide;

pub use attribute::*;
pub use dataset::*;
pub use wide::*;
