//! The console commands config files are made of.

use log::info;

use crate::error::BindError;
use crate::table::{ActionId, BindingTable, CommandSink};
use crate::trigger::{Trigger, KEY_PREFIX, MOUSE_PREFIX};

/// What `unbind` was asked to clear.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnbindTarget {
    All,
    Trigger(Trigger),
    /// A named action, which is removed from the table.
    Name(String),
}

impl UnbindTarget {
    pub fn parse(text: &str) -> Result<UnbindTarget, BindError> {
        let text = text.trim();
        if text.eq_ignore_ascii_case("all") {
            return Ok(UnbindTarget::All);
        }
        let upper = text.to_ascii_uppercase();
        if upper.starts_with(KEY_PREFIX) || upper.starts_with(MOUSE_PREFIX) {
            return Trigger::parse(text).map(UnbindTarget::Trigger);
        }
        if text.is_empty() {
            return Err(BindError::InvalidName);
        }
        Ok(UnbindTarget::Name(text.to_string()))
    }
}

/// Receiver of the binding commands in a config script.
///
/// [`TableConsole`] drives a table directly; hosts whose handlers re-enter
/// the table implement this over their shared state instead.
pub trait Console {
    fn bind(&mut self, trigger: Trigger, command: &str) -> Result<ActionId, BindError>;
    fn bound_to(&mut self, trigger: Trigger) -> Vec<String>;
    /// Returns how many actions were affected.
    fn unbind(&mut self, target: &UnbindTarget) -> usize;
    /// Run a line that is not a binding command.
    fn run(&mut self, command: &str);
}

pub struct TableConsole<'a, C> {
    pub table: &'a mut BindingTable<C>,
    pub ctx: &'a mut C,
}

impl<'a, C> TableConsole<'a, C> {
    pub fn new(table: &'a mut BindingTable<C>, ctx: &'a mut C) -> Self {
        TableConsole { table, ctx }
    }
}

impl<C> BindingTable<C> {
    /// Apply an `unbind` target to the table.
    pub fn unbind_target(&mut self, target: &UnbindTarget) -> usize {
        match target {
            UnbindTarget::All => self.unbind_all(),
            UnbindTarget::Trigger(trigger) => self.unbind_trigger(*trigger),
            UnbindTarget::Name(name) => usize::from(self.unregister(name)),
        }
    }
}

impl<C: CommandSink + 'static> Console for TableConsole<'_, C> {
    fn bind(&mut self, trigger: Trigger, command: &str) -> Result<ActionId, BindError> {
        self.table.bind_by_command(trigger, command)
    }

    fn bound_to(&mut self, trigger: Trigger) -> Vec<String> {
        let labels = self.table.bound_to(trigger);
        info!("{trigger} = {}", labels.join(", "));
        labels
    }

    fn unbind(&mut self, target: &UnbindTarget) -> usize {
        self.table.unbind_target(target)
    }

    fn run(&mut self, command: &str) {
        self.ctx.run_command(command);
    }
}
