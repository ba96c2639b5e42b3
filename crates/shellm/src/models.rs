//! These models represent the objects passed around by the agent
//!
//! There are a few related formats we need to interact with:
//! - canonical messages/tools, owned by the orchestration loop
//! - OpenAI-compatible wire messages/tools, sent to the LLM backend
//! - tool schemas, advertised to the LLM and dispatched by the toolbox
//!
//! Wire payloads are converted to and from these internal structs at the
//! provider boundary; nothing outside `providers` touches wire shapes.
pub mod message;
pub mod tool;
