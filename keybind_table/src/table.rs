use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use log::debug;
use serde::Serialize;

use crate::command::{is_valid_action_name, BindCommand};
use crate::error::BindError;
use crate::event::{ActionEvent, EventKind, InputEvent};
use crate::trigger::Trigger;

/// Callback run when an action fires. The context is whatever the host
/// passes to `dispatch` (the owning object, a script VM handle, ...).
pub type Handler<C> = Rc<dyn Fn(&mut C, &ActionEvent)>;

/// Runs literal console commands bound with `bind "key" "command"`.
pub trait CommandSink {
    fn run_command(&mut self, command: &str);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct ActionId(u64);

impl ActionId {
    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ActionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionName {
    /// Registered by script code; unique and addressable as `$Name`.
    Named(String),
    /// A literal console command bound straight to a key.
    Command(String),
}

impl ActionName {
    pub fn as_str(&self) -> &str {
        match self {
            ActionName::Named(name) | ActionName::Command(name) => name,
        }
    }

    pub fn is_named(&self) -> bool {
        matches!(self, ActionName::Named(_))
    }
}

impl fmt::Display for ActionName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Registration options for a named action.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActionDescriptor {
    pub name: String,
    /// Fire on key-repeat events as well as presses.
    pub is_repeatable: bool,
    /// Instance that owns the action. Unowned actions survive
    /// [`BindingTable::clear_owned`].
    pub owner: Option<String>,
}

impl ActionDescriptor {
    pub fn new(name: impl Into<String>) -> Self {
        ActionDescriptor {
            name: name.into(),
            ..ActionDescriptor::default()
        }
    }

    pub fn repeatable(mut self, is_repeatable: bool) -> Self {
        self.is_repeatable = is_repeatable;
        self
    }

    pub fn owned_by(mut self, owner: impl Into<String>) -> Self {
        self.owner = Some(owner.into());
        self
    }

    fn validated_name(&self) -> Result<&str, BindError> {
        let name = self.name.trim();
        if !is_valid_action_name(name) {
            return Err(BindError::InvalidName);
        }
        Ok(name)
    }
}

pub struct Action<C> {
    id: ActionId,
    name: ActionName,
    trigger: Trigger,
    is_repeatable: bool,
    owner: Option<String>,
    held: bool,
    handler: Handler<C>,
}

impl<C> Action<C> {
    pub fn name(&self) -> &ActionName {
        &self.name
    }

    pub fn trigger(&self) -> Trigger {
        self.trigger
    }

    pub fn is_repeatable(&self) -> bool {
        self.is_repeatable
    }

    pub fn owner(&self) -> Option<&str> {
        self.owner.as_deref()
    }

    pub fn is_held(&self) -> bool {
        self.held
    }
}

impl<C> fmt::Debug for Action<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Action")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("trigger", &self.trigger)
            .field("is_repeatable", &self.is_repeatable)
            .field("owner", &self.owner)
            .field("held", &self.held)
            .finish_non_exhaustive()
    }
}

/// A handler selected by [`BindingTable::resolve`], ready to run.
pub struct Firing<C> {
    pub id: ActionId,
    pub label: String,
    pub event: ActionEvent,
    handler: Handler<C>,
}

impl<C> Firing<C> {
    pub fn invoke(&self, ctx: &mut C) {
        (self.handler)(ctx, &self.event);
    }
}

/// One row of a [`BindingSnapshot`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BindingEntry {
    pub id: ActionId,
    pub label: String,
    pub is_command: bool,
    pub trigger: Trigger,
    pub is_repeatable: bool,
    pub owner: Option<String>,
}

/// Serializable view of the table, ordered by trigger then invocation order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BindingSnapshot {
    pub actions: Vec<BindingEntry>,
}

/// Maps triggers to the actions they fire.
///
/// Each action sits in exactly one trigger bucket; named actions are also
/// indexed by name so config files can rebind them with `$Name`. Buckets keep
/// registration order, which is the order handlers run in.
pub struct BindingTable<C> {
    actions: HashMap<ActionId, Action<C>>,
    buckets: HashMap<Trigger, Vec<ActionId>>,
    names: HashMap<String, ActionId>,
    /// Keys of owned actions dropped by a session reset, restored when an
    /// action of the same name is registered against the placeholder.
    remembered: HashMap<String, Trigger>,
    next_id: u64,
}

impl<C> Default for BindingTable<C> {
    fn default() -> Self {
        BindingTable::new()
    }
}

impl<C> fmt::Debug for BindingTable<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BindingTable")
            .field("actions", &self.actions.len())
            .field("names", &self.names)
            .field("remembered", &self.remembered)
            .finish()
    }
}

impl<C> BindingTable<C> {
    pub fn new() -> Self {
        BindingTable {
            actions: HashMap::new(),
            buckets: HashMap::new(),
            names: HashMap::new(),
            remembered: HashMap::new(),
            next_id: 1,
        }
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.names.contains_key(name)
    }

    pub fn get(&self, name: &str) -> Option<&Action<C>> {
        self.names.get(name).and_then(|id| self.actions.get(id))
    }

    pub fn trigger_of(&self, name: &str) -> Option<Trigger> {
        self.get(name).map(Action::trigger)
    }

    /// Register a named action, or update it in place if the name exists.
    ///
    /// Registering against the placeholder keeps an existing action's key
    /// (or restores a remembered one); a concrete trigger moves the action.
    pub fn register(
        &mut self,
        trigger: Trigger,
        descriptor: ActionDescriptor,
        handler: Handler<C>,
    ) -> Result<ActionId, BindError> {
        let name = descriptor.validated_name()?.to_string();

        if let Some(&id) = self.names.get(&name) {
            let mut target = trigger;
            if let Some(action) = self.actions.get_mut(&id) {
                action.handler = handler;
                action.is_repeatable = descriptor.is_repeatable;
                action.owner = descriptor.owner;
                if trigger.is_placeholder() {
                    target = action.trigger;
                }
            }
            self.move_action(id, target);
            debug!("updated action {name} ({id}) on {target}");
            return Ok(id);
        }

        let remembered = self.remembered.remove(&name);
        let trigger = match remembered {
            Some(previous) if trigger.is_placeholder() => previous,
            _ => trigger,
        };
        let id = self.insert(
            ActionName::Named(name.clone()),
            trigger,
            descriptor.is_repeatable,
            descriptor.owner,
            handler,
        );
        debug!("registered action {name} ({id}) on {trigger}");
        self.names.insert(name, id);
        Ok(id)
    }

    /// Remove a named action. Unknown names are ignored.
    pub fn unregister(&mut self, name: &str) -> bool {
        self.remembered.remove(name);
        match self.names.get(name).copied() {
            Some(id) => {
                self.remove_action(id);
                debug!("unregistered action {name}");
                true
            }
            None => false,
        }
    }

    /// Update held state for `trigger` and collect the handlers that should
    /// run, without running them.
    ///
    /// Hosts whose handlers call back into the table use this so no borrow
    /// of the table is alive while handlers execute.
    pub fn resolve(
        &mut self,
        trigger: Trigger,
        kind: EventKind,
        position: Option<(i32, i32)>,
    ) -> Vec<Firing<C>> {
        if trigger.is_placeholder() {
            return Vec::new();
        }
        let Some(bucket) = self.buckets.get(&trigger) else {
            return Vec::new();
        };

        let mut firings = Vec::new();
        for id in bucket {
            let Some(action) = self.actions.get_mut(id) else {
                continue;
            };
            let fire = match kind {
                EventKind::Press => {
                    action.held = true;
                    true
                }
                EventKind::Repeat => action.is_repeatable && action.held,
                EventKind::Release => {
                    action.held = false;
                    false
                }
            };
            if fire {
                firings.push(Firing {
                    id: *id,
                    label: action.name.to_string(),
                    event: ActionEvent {
                        trigger,
                        kind,
                        position,
                        owner: action.owner.clone(),
                    },
                    handler: Rc::clone(&action.handler),
                });
            }
        }
        firings
    }

    /// Run every action bound to `trigger` for one transition. Returns the
    /// number of handlers invoked; unbound triggers are a no-op.
    pub fn dispatch(&mut self, ctx: &mut C, trigger: Trigger, kind: EventKind) -> usize {
        self.dispatch_at(ctx, trigger, kind, None)
    }

    pub fn dispatch_at(
        &mut self,
        ctx: &mut C,
        trigger: Trigger,
        kind: EventKind,
        position: Option<(i32, i32)>,
    ) -> usize {
        let firings = self.resolve(trigger, kind, position);
        for firing in &firings {
            firing.invoke(ctx);
        }
        firings.len()
    }

    pub fn dispatch_event(&mut self, ctx: &mut C, event: &InputEvent) -> usize {
        self.dispatch_at(ctx, event.trigger, event.kind, event.position())
    }

    /// Prepare a direct call of a named action, as if its key was pressed.
    pub fn prepare_call(&self, name: &str) -> Result<Firing<C>, BindError> {
        let action = self.get(name).ok_or_else(|| BindError::UnknownAction {
            name: name.to_string(),
        })?;
        Ok(Firing {
            id: action.id,
            label: action.name.to_string(),
            event: ActionEvent {
                trigger: action.trigger,
                kind: EventKind::Press,
                position: None,
                owner: action.owner.clone(),
            },
            handler: Rc::clone(&action.handler),
        })
    }

    /// Invoke a named action regardless of which key it is bound to.
    pub fn call(&self, ctx: &mut C, name: &str) -> Result<(), BindError> {
        self.prepare_call(name)?.invoke(ctx);
        Ok(())
    }

    /// Clear a key. Literal command binds on it are dropped; named actions
    /// go back to the placeholder so a later `$Name` bind can reattach them.
    pub fn unbind_trigger(&mut self, trigger: Trigger) -> usize {
        let Some(ids) = self.buckets.get(&trigger).cloned() else {
            return 0;
        };
        let mut count = 0;
        for id in ids {
            match self.actions.get(&id).map(|action| action.name.is_named()) {
                Some(true) if !trigger.is_placeholder() => {
                    self.move_action(id, Trigger::Unknown);
                    count += 1;
                }
                Some(false) => {
                    self.remove_action(id);
                    count += 1;
                }
                _ => {}
            }
        }
        debug!("unbound {count} action(s) from {trigger}");
        count
    }

    pub fn unbind_all(&mut self) -> usize {
        let triggers: Vec<Trigger> = self.buckets.keys().copied().collect();
        triggers
            .into_iter()
            .map(|trigger| self.unbind_trigger(trigger))
            .sum()
    }

    /// Labels of everything bound to `trigger`, in invocation order.
    pub fn bound_to(&self, trigger: Trigger) -> Vec<String> {
        self.buckets
            .get(&trigger)
            .map(|bucket| {
                bucket
                    .iter()
                    .filter_map(|id| self.actions.get(id))
                    .map(|action| action.name.to_string())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Drop every action registered by `owner`, remembering their keys.
    pub fn remove_owner(&mut self, owner: &str) -> usize {
        self.remove_owned_where(|action_owner| action_owner == owner)
    }

    /// Drop every owned action; global binds stay.
    pub fn clear_owned(&mut self) -> usize {
        self.remove_owned_where(|_| true)
    }

    pub fn snapshot(&self) -> BindingSnapshot {
        let mut triggers: Vec<&Trigger> = self.buckets.keys().collect();
        triggers.sort();
        let actions = triggers
            .into_iter()
            .flat_map(|trigger| self.buckets[trigger].iter())
            .filter_map(|id| self.actions.get(id))
            .map(|action| BindingEntry {
                id: action.id,
                label: action.name.to_string(),
                is_command: !action.name.is_named(),
                trigger: action.trigger,
                is_repeatable: action.is_repeatable,
                owner: action.owner.clone(),
            })
            .collect();
        BindingSnapshot { actions }
    }

    fn remove_owned_where(&mut self, matches: impl Fn(&str) -> bool) -> usize {
        let doomed: Vec<ActionId> = self
            .actions
            .values()
            .filter(|action| action.owner.as_deref().is_some_and(&matches))
            .map(|action| action.id)
            .collect();
        for id in &doomed {
            if let Some(action) = self.actions.get(id) {
                if let ActionName::Named(name) = &action.name {
                    if !action.trigger.is_placeholder() {
                        self.remembered.insert(name.clone(), action.trigger);
                    }
                }
            }
            self.remove_action(*id);
        }
        if !doomed.is_empty() {
            debug!("dropped {} owned action(s)", doomed.len());
        }
        doomed.len()
    }

    fn insert(
        &mut self,
        name: ActionName,
        trigger: Trigger,
        is_repeatable: bool,
        owner: Option<String>,
        handler: Handler<C>,
    ) -> ActionId {
        let id = ActionId(self.next_id);
        self.next_id += 1;
        self.actions.insert(
            id,
            Action {
                id,
                name,
                trigger,
                is_repeatable,
                owner,
                held: false,
                handler,
            },
        );
        self.buckets.entry(trigger).or_default().push(id);
        id
    }

    /// Move an action to another bucket, resetting its held state.
    fn move_action(&mut self, id: ActionId, target: Trigger) {
        let Some(action) = self.actions.get_mut(&id) else {
            return;
        };
        if action.trigger == target {
            return;
        }
        let previous = std::mem::replace(&mut action.trigger, target);
        action.held = false;
        self.detach(previous, id);
        self.buckets.entry(target).or_default().push(id);
    }

    fn remove_action(&mut self, id: ActionId) {
        if let Some(action) = self.actions.remove(&id) {
            self.detach(action.trigger, id);
            if let ActionName::Named(name) = action.name {
                self.names.remove(&name);
            }
        }
    }

    fn detach(&mut self, trigger: Trigger, id: ActionId) {
        if let Some(bucket) = self.buckets.get_mut(&trigger) {
            bucket.retain(|entry| *entry != id);
            if bucket.is_empty() {
                self.buckets.remove(&trigger);
            }
        }
    }

    fn find_command(&self, trigger: Trigger, command: &str) -> Option<ActionId> {
        self.buckets.get(&trigger)?.iter().copied().find(|id| {
            self.actions
                .get(id)
                .is_some_and(|action| action.name == ActionName::Command(command.to_string()))
        })
    }
}

impl<C: CommandSink + 'static> BindingTable<C> {
    /// Bind `trigger` from a config-style command string.
    ///
    /// `$Name` rebinds the registered action `Name`; anything else becomes a
    /// literal command that runs through [`CommandSink`] on press (never on
    /// repeat). Failures leave the table untouched.
    pub fn bind_by_command(
        &mut self,
        trigger: Trigger,
        command: &str,
    ) -> Result<ActionId, BindError> {
        match BindCommand::parse(command)? {
            BindCommand::Reference(name) => {
                let id = *self
                    .names
                    .get(&name)
                    .ok_or(BindError::UnknownAction { name: name.clone() })?;
                self.move_action(id, trigger);
                debug!("bound {trigger} to action {name}");
                Ok(id)
            }
            BindCommand::Literal(command) => {
                if let Some(id) = self.find_command(trigger, &command) {
                    return Ok(id);
                }
                let run = command.clone();
                let handler: Handler<C> =
                    Rc::new(move |ctx: &mut C, _event: &ActionEvent| ctx.run_command(&run));
                let id = self.insert(ActionName::Command(command), trigger, false, None, handler);
                debug!("bound {trigger} to command {id}");
                Ok(id)
            }
        }
    }
}
