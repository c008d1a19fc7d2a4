mod bucket;
mod config;
mod container;
mod context;
mod error;
mod evaluation;
mod evaluator;
mod experiment;
mod experiment_flow;
mod flow;
mod in_app_message;
mod in_app_message_flow;
mod in_app_message_matcher;
mod matcher;
mod remote_config;
mod request;
mod resolver;
mod segment;
mod storage;
mod target;
mod test_common;
mod user;
mod util;
mod value;
mod version;
mod workspace;

pub use bucket::*;
pub use config::*;
pub use container::*;
pub use context::*;
pub use error::*;
pub use evaluation::*;
pub use evaluator::*;
pub use experiment::*;
pub use in_app_message::*;
pub use remote_config::*;
pub use request::*;
pub use segment::*;
pub use storage::*;
pub use target::*;
pub use user::*;
pub use value::*;
pub use version::*;
pub use workspace::*;
