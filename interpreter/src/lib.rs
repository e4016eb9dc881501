pub mod capability;
pub mod driver;
pub mod error;
pub mod executor;
pub mod local;
pub mod outline;
pub mod prompt;
pub mod schema;
pub mod session;

pub use capability::{Capabilities, Presenter, SilentPresenter};
pub use driver::{
    ChatMessage, ModelBackend, ModelError, Phase, Session, SessionConfig, SessionError,
    SharedSession, TurnOutcome,
};
pub use error::{BatchAborted, CapabilityError, ExecuteError};
pub use executor::{execute_command, execute_script, response_block};
pub use local::LocalWorkspace;
pub use prompt::{CodePrompt, build_prompt};
pub use session::{Message, Role, SessionState};
