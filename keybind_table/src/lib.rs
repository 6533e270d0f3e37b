//! Action binding table shared by the script host and anything else that
//! needs to turn raw key transitions into named, rebindable actions.
//!
//! Scripts register actions by name (usually against the `SDLK_UNKNOWN`
//! placeholder) and config files attach physical keys later with
//! `bind "SDLK_w" "$MoveForward"`. The table keeps both views in sync and
//! applies repeat suppression when events are dispatched.

pub mod command;
pub mod config;
pub mod console;
pub mod error;
pub mod event;
pub mod table;
pub mod trigger;

pub use command::{split_parameters, BindCommand, ConsoleLine};
pub use config::{ConfigReport, ConfigScript, LineFailure};
pub use console::{Console, TableConsole, UnbindTarget};
pub use error::{BindError, ConfigError, ParseError};
pub use event::{ActionEvent, EventKind, InputEvent};
pub use table::{
    ActionDescriptor, ActionId, ActionName, BindingEntry, BindingSnapshot, BindingTable,
    CommandSink, Firing, Handler,
};
pub use trigger::{Key, MouseButton, Trigger};
