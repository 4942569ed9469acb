//! MDP data model (§3) and the Q/V store that backs it (§4.5).

pub mod state;
pub mod store;

pub use state::{Action, Method, Sequence, State, StateAndAction, StateAndActionData, StateData, STOP};
pub use store::TrainingContext;
