// FFI (Foreign Function Interface) 모듈
// asar 네이티브 라이브러리의 C ABI와 경계 변환

pub mod library;
pub mod marshal;
pub mod types;

#[cfg(test)]
pub(crate) mod fake;

pub use library::{DynamicLibrary, NativeApi};
