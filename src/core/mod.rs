pub mod coordinator;
pub mod decoder;
pub mod engine;
pub mod transform;

pub use crate::domain::model::{BatchRequest, InputRecord, OutputRecord, RequestContext};
pub use crate::domain::ports::{Forwarder, Transformer};
pub use crate::utils::error::Result;
