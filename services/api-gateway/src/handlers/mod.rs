pub mod area;
pub mod chat;
pub mod health;
pub mod upload;

pub use area::*;
pub use chat::*;
pub use health::*;
pub use upload::*;

use crate::middleware::ApiError;

pub type ApiResult<T> = Result<T, ApiError>;
