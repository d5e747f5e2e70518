//! Per-object field table: what changed, who may write it, and on which
//! channel it travels.

mod authority;
mod error;
mod registry;

pub use authority::FieldAuthority;
pub use error::FieldError;
pub use registry::{
    content_hash, FieldClass, FieldConfig, FieldRegistry, FieldSlot, InboundFieldResult,
};
