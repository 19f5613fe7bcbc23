//! Agent session controller.
//!
//! One HTTP turn maps to one [`session::AgentSession`] run: the persona
//! picks the system prompt and tool set, the bounded loop drives the model,
//! and the resulting [`stream_event::UiStreamEvent`]s back the SSE body.

pub mod persona;
pub mod session;
pub mod stream_event;

pub use persona::{CallerSnapshot, Persona};
pub use session::AgentSession;
pub use stream_event::UiStreamEvent;
