use std::cell::RefCell;
use std::rc::{Rc, Weak};

use keybind_table::{ActionEvent, BindingTable, CommandSink, Firing};
use log::{info, warn};
use mlua::{Function, Lua, RegistryKey, Result as LuaResult, Table};

use crate::replay::{EventLog, FiredAction};

pub type SharedTable = Rc<RefCell<BindingTable<HostContext>>>;

/// Mutable host state shared between the replay loop and Lua callbacks.
#[derive(Debug, Default)]
pub struct HostState {
    pub quit_requested: bool,
    pub restart_requested: bool,
    /// Objects whose `destroy_object` was called from Lua; torn down once
    /// the current handler returns.
    pub pending_destroys: Vec<String>,
    /// Owner given to `kb.bind` registrations that do not name one; set
    /// while an object script is loading or running `create`.
    pub current_owner: Option<String>,
    pub log: EventLog,
}

impl HostState {
    pub fn record_firing(&mut self, event: usize, firing: &Firing<HostContext>) {
        self.log.fired.push(FiredAction::from_firing(event, firing));
    }
}

/// Handle passed to every action handler.
///
/// Holds the Lua state weakly: the state owns the binding functions, which
/// hold the table, which holds the handlers.
#[derive(Clone)]
pub struct HostContext {
    lua: Weak<Lua>,
    state: Rc<RefCell<HostState>>,
}

impl HostContext {
    pub fn new(lua: Weak<Lua>, state: Rc<RefCell<HostState>>) -> Self {
        Self { lua, state }
    }

    pub fn state(&self) -> &Rc<RefCell<HostState>> {
        &self.state
    }

    pub fn request_quit(&self) {
        self.state.borrow_mut().quit_requested = true;
    }

    pub fn request_restart(&self) {
        self.state.borrow_mut().restart_requested = true;
    }

    pub fn request_destroy(&self, name: &str) {
        self.state.borrow_mut().pending_destroys.push(name.to_string());
    }

    pub fn quit_requested(&self) -> bool {
        self.state.borrow().quit_requested
    }

    pub fn current_owner(&self) -> Option<String> {
        self.state.borrow().current_owner.clone()
    }

    pub fn push_message(&self, message: String) {
        info!("[lua] {message}");
        self.state.borrow_mut().log.messages.push(message);
    }

    /// Call a Lua handler stored in the registry with an event table.
    pub fn call_registered(&self, key: &RegistryKey, event: &ActionEvent) -> LuaResult<()> {
        let Some(lua) = self.lua.upgrade() else {
            return Ok(());
        };
        let func: Function = lua.registry_value(key)?;
        let arg = event_table(&lua, event)?;
        func.call::<_, ()>(arg)?;
        Ok(())
    }
}

impl CommandSink for HostContext {
    /// Literal binds are Lua chunks, run in the global environment.
    fn run_command(&mut self, command: &str) {
        let Some(lua) = self.lua.upgrade() else {
            return;
        };
        if let Err(err) = lua.load(command).set_name("bind").exec() {
            warn!("[lua] command `{command}` failed: {err}");
        }
    }
}

pub(crate) fn event_table<'lua>(lua: &'lua Lua, event: &ActionEvent) -> LuaResult<Table<'lua>> {
    let table = lua.create_table()?;
    table.set("trigger", event.trigger.keystring())?;
    table.set("kind", event.kind.as_str())?;
    if let Some((x, y)) = event.position {
        table.set("x", x)?;
        table.set("y", y)?;
    }
    if let Some(owner) = &event.owner {
        table.set("owner", owner.as_str())?;
    }
    Ok(table)
}
