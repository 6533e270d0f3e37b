mod console;
mod context;
mod kb;
mod values;

use std::cell::RefCell;
use std::fs;
use std::mem;
use std::path::Path;
use std::rc::Rc;

use anyhow::{anyhow, Context, Result};
use keybind_table::{
    ActionDescriptor, ActionEvent, BindingSnapshot, BindingTable, ConfigReport, InputEvent, Trigger,
};
use log::{debug, info, warn};
use mlua::{Lua, LuaOptions, RegistryKey, StdLib, Table, Value};

use crate::replay::EventLog;
use context::{HostContext, HostState, SharedTable};

/// A loaded object script: its private environment, kept so `create` can be
/// re-run on a session reset, and the `self` table of the live instance.
#[derive(Debug)]
struct ObjectScript {
    name: String,
    env: RegistryKey,
    instance: Option<RegistryKey>,
}

/// Summary of a replay run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReplaySummary {
    pub events_processed: usize,
    pub actions_fired: usize,
    pub quit_requested: bool,
}

pub struct ScriptHost {
    lua: Rc<Lua>,
    table: SharedTable,
    context: HostContext,
    objects: Vec<ObjectScript>,
}

impl ScriptHost {
    pub fn new() -> Result<Self> {
        let lua = Rc::new(
            Lua::new_with(StdLib::ALL_SAFE, LuaOptions::default())
                .context("initialising Lua runtime with standard libraries")?,
        );
        let state = Rc::new(RefCell::new(HostState::default()));
        let context = HostContext::new(Rc::downgrade(&lua), state);
        let table: SharedTable = Rc::new(RefCell::new(BindingTable::new()));

        table
            .borrow_mut()
            .register(
                Trigger::Unknown,
                ActionDescriptor::new("Quit"),
                Rc::new(|ctx: &mut HostContext, _: &ActionEvent| ctx.request_quit()),
            )
            .map_err(|err| anyhow!(err))?;

        kb::install_kb(&lua, table.clone(), context.clone())
            .context("installing kb bindings")?;
        console::install_console(&lua, table.clone(), context.clone())
            .context("installing console globals")?;

        Ok(ScriptHost {
            lua,
            table,
            context,
            objects: Vec::new(),
        })
    }

    pub fn quit_requested(&self) -> bool {
        self.context.quit_requested()
    }

    pub fn load_object(&mut self, path: &Path) -> Result<()> {
        let source = fs::read_to_string(path)
            .with_context(|| format!("reading object script {}", path.display()))?;
        let name = path
            .file_stem()
            .and_then(|stem| stem.to_str())
            .ok_or_else(|| anyhow!("object script {} has no usable name", path.display()))?;
        self.load_object_source(name, &source)
            .with_context(|| format!("loading object script {}", path.display()))
    }

    /// Run an object script in its own environment and call its `create`.
    /// Actions it registers are owned by `name` unless they say otherwise.
    pub fn load_object_source(&mut self, name: &str, source: &str) -> Result<()> {
        let env = self.lua.create_table()?;
        let meta = self.lua.create_table()?;
        meta.set("__index", self.lua.globals())?;
        env.set_metatable(Some(meta));

        self.with_owner(name, || {
            self.lua
                .load(source)
                .set_name(name)
                .set_environment(env.clone())
                .exec()
        })
        .with_context(|| format!("running object script {name}"))?;

        let mut object = ObjectScript {
            name: name.to_string(),
            env: self.lua.create_registry_value(env)?,
            instance: None,
        };
        self.create_object(&mut object)?;
        debug!("[host] loaded object {name}");
        self.objects.push(object);
        Ok(())
    }

    /// Tear down a loaded object: call its `destroy`, then drop every action
    /// it owns. Returns false when no object has that name.
    pub fn destroy_object(&mut self, name: &str) -> Result<bool> {
        let Some(index) = self.objects.iter().position(|object| object.name == name) else {
            warn!("[host] destroy_object: no object named {name}");
            return Ok(false);
        };
        let mut object = self.objects.remove(index);
        let destroyed = self.destroy_instance(&mut object);
        let dropped = self.table.borrow_mut().remove_owner(name);
        self.lua.remove_registry_value(object.env)?;
        self.lua.expire_registry_values();
        destroyed?;
        info!("[host] destroyed {name}: {dropped} owned action(s) dropped");
        Ok(true)
    }

    fn create_object(&self, object: &mut ObjectScript) -> Result<()> {
        let instance = self.lua.create_table()?;
        instance.set("name", object.name.as_str())?;
        object.instance = Some(self.lua.create_registry_value(instance.clone())?);
        self.call_hook(object, "create", instance)
    }

    /// `destroy` receives the same `self` its `create` was given.
    fn destroy_instance(&self, object: &mut ObjectScript) -> Result<()> {
        let Some(key) = object.instance.take() else {
            return Ok(());
        };
        let instance: Table = self.lua.registry_value(&key)?;
        self.lua.remove_registry_value(key)?;
        self.call_hook(object, "destroy", instance)
    }

    fn call_hook(&self, object: &ObjectScript, hook: &str, instance: Table) -> Result<()> {
        let env: Table = self.lua.registry_value(&object.env)?;
        let Value::Function(func) = env.raw_get::<_, Value>(hook)? else {
            return Ok(());
        };
        self.with_owner(&object.name, || func.call::<_, ()>(instance))
            .with_context(|| format!("calling {}.{hook}", object.name))
    }

    fn with_owner<T>(
        &self,
        owner: &str,
        run: impl FnOnce() -> mlua::Result<T>,
    ) -> mlua::Result<T> {
        let previous = self
            .context
            .state()
            .borrow_mut()
            .current_owner
            .replace(owner.to_string());
        let result = run();
        self.context.state().borrow_mut().current_owner = previous;
        result
    }

    /// Apply a key config: a `.cfg` console file, or a Lua script that calls
    /// `bind`. Bad lines are logged and skipped.
    pub fn load_config(&mut self, path: &Path) -> Result<ConfigReport> {
        let is_lua = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("lua"));
        let report = if is_lua {
            let source = fs::read_to_string(path)
                .with_context(|| format!("reading config {}", path.display()))?;
            self.lua
                .load(source.as_str())
                .set_name(path.display().to_string())
                .exec()
                .with_context(|| format!("running config {}", path.display()))?;
            ConfigReport::default()
        } else {
            console::exec_config(path, &self.table, &self.context)
                .with_context(|| format!("applying config {}", path.display()))?
        };
        self.process_requests()?;
        Ok(report)
    }

    /// Run a console line as if typed at the console.
    pub fn run_console_line(&mut self, line: &str) -> Result<ConfigReport> {
        let script = keybind_table::ConfigScript::from_source(line);
        let mut console = console::HostConsole::new(self.table.clone(), self.context.clone());
        let report = script.apply(&mut console);
        self.process_requests()?;
        Ok(report)
    }

    /// Dispatch one input event. Returns how many handlers ran.
    pub fn dispatch(&mut self, index: usize, event: &InputEvent) -> Result<usize> {
        let firings = self
            .table
            .borrow_mut()
            .resolve(event.trigger, event.kind, event.position());
        let mut ctx = self.context.clone();
        for firing in &firings {
            self.context.state().borrow_mut().record_firing(index, firing);
            firing.invoke(&mut ctx);
        }
        self.process_requests()?;
        Ok(firings.len())
    }

    /// Feed recorded events through the table, stopping once quit is requested.
    pub fn replay(&mut self, events: &[InputEvent]) -> Result<ReplaySummary> {
        let mut summary = ReplaySummary {
            events_processed: 0,
            actions_fired: 0,
            quit_requested: false,
        };
        for (index, event) in events.iter().enumerate() {
            if self.quit_requested() {
                break;
            }
            summary.actions_fired += self.dispatch(index, event)?;
            summary.events_processed += 1;
        }
        summary.quit_requested = self.quit_requested();

        let mut state = self.context.state().borrow_mut();
        state.log.events_processed = summary.events_processed;
        state.log.quit_requested = summary.quit_requested;
        info!(
            "[host] replayed {} of {} event(s), {} action(s) fired{}",
            summary.events_processed,
            events.len(),
            summary.actions_fired,
            if summary.quit_requested { ", quit requested" } else { "" }
        );
        Ok(summary)
    }

    /// Handle requests raised by handlers: queued `destroy_object` calls
    /// first, then a pending `restart_room()`.
    fn process_requests(&mut self) -> Result<()> {
        let (destroys, restart) = {
            let mut state = self.context.state().borrow_mut();
            (
                mem::take(&mut state.pending_destroys),
                mem::take(&mut state.restart_requested),
            )
        };
        for name in destroys {
            self.destroy_object(&name)?;
        }
        if !restart {
            return Ok(());
        }
        let mut objects = mem::take(&mut self.objects);
        let result = self.restart_room(&mut objects);
        self.objects = objects;
        result
    }

    /// Destroy every object, drop every owned action, then re-run each
    /// `create`, which re-registers them on their old keys.
    fn restart_room(&self, objects: &mut [ObjectScript]) -> Result<()> {
        for object in objects.iter_mut() {
            self.destroy_instance(object)?;
        }
        let dropped = self.table.borrow_mut().clear_owned();
        self.lua.expire_registry_values();
        for object in objects.iter_mut() {
            self.create_object(object)?;
        }
        self.context.state().borrow_mut().log.restarts += 1;
        info!(
            "[host] room restarted: {dropped} owned action(s) dropped, {} object(s) re-created",
            objects.len()
        );
        Ok(())
    }

    pub fn snapshot(&self) -> BindingSnapshot {
        self.table.borrow().snapshot()
    }

    pub fn event_log(&self) -> EventLog {
        self.context.state().borrow().log.clone()
    }
}

#[cfg(test)]
impl ScriptHost {
    fn lua(&self) -> &Lua {
        &self.lua
    }

    fn table(&self) -> &SharedTable {
        &self.table
    }

    fn global_function(&self, name: &str) -> Result<mlua::Function> {
        self.lua
            .globals()
            .get(name)
            .with_context(|| format!("looking up global function {name}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use keybind_table::{EventKind, Key};

    const CONTROL: &str = r#"
        function create(self)
            kb.bind("SDLK_UNKNOWN", {
                name = "MoveForward",
                is_repeatable = true,
                func = function(event) log(self.name .. " forward " .. event.kind) end,
            })
            kb.bind("SDLK_UNKNOWN", {
                name = "RoomRestart",
                func = function() restart_room() end,
            })
        end

        function destroy(self)
            log("destroyed " .. self.name)
        end
    "#;

    const MENU: &str = r#"
        function create(self)
            self.opened = "once"
            kb.bind("SDLK_p", { name = "Pause", func = function() log("pause") end })
        end

        function destroy(self)
            log(self.name .. " closed " .. self.opened)
        end
    "#;

    fn key(c: char) -> Trigger {
        Trigger::Key(Key::Char(c))
    }

    fn press(c: char) -> InputEvent {
        InputEvent::new(key(c), EventKind::Press)
    }

    fn host_with_control() -> ScriptHost {
        let mut host = ScriptHost::new().unwrap();
        host.load_object_source("obj_control", CONTROL).unwrap();
        host.run_console_line("bind SDLK_w $MoveForward").unwrap();
        host.run_console_line("bind SDLK_r $RoomRestart").unwrap();
        host
    }

    #[test]
    fn object_actions_are_owned_by_the_object() {
        let host = host_with_control();
        let table = host.table().borrow();
        let action = table.get("MoveForward").unwrap();
        assert_eq!(action.owner(), Some("obj_control"));
        assert!(action.is_repeatable());
        assert_eq!(action.trigger(), key('w'));
        assert_eq!(table.get("Quit").unwrap().owner(), None);
    }

    #[test]
    fn replay_fires_handlers_and_respects_repeat() {
        let mut host = host_with_control();
        let events = [
            press('w'),
            InputEvent::new(key('w'), EventKind::Repeat),
            InputEvent::new(key('w'), EventKind::Release),
        ];
        let summary = host.replay(&events).unwrap();
        assert_eq!(summary.events_processed, 3);
        assert_eq!(summary.actions_fired, 2);
        assert_eq!(
            host.event_log().messages,
            vec!["obj_control forward press", "obj_control forward repeat"]
        );
    }

    #[test]
    fn restart_recreates_objects_on_their_keys() {
        let mut host = host_with_control();
        host.replay(&[press('w'), press('r'), press('w')]).unwrap();

        let log = host.event_log();
        assert_eq!(log.restarts, 1);
        let fired: Vec<&str> = log.fired.iter().map(|f| f.action.as_str()).collect();
        assert_eq!(fired, vec!["MoveForward", "RoomRestart", "MoveForward"]);
        assert_eq!(host.table().borrow().trigger_of("RoomRestart"), Some(key('r')));
    }

    #[test]
    fn restart_runs_destroy_before_recreating() {
        let mut host = host_with_control();
        host.load_object_source("obj_menu", MENU).unwrap();
        host.replay(&[press('w'), press('r'), press('w'), press('p')])
            .unwrap();
        assert_eq!(
            host.event_log().messages,
            vec![
                "obj_control forward press",
                "destroyed obj_control",
                "obj_menu closed once",
                "obj_control forward press",
                "pause",
            ]
        );
    }

    #[test]
    fn destroying_an_object_drops_only_its_actions() {
        let mut host = host_with_control();
        host.load_object_source("obj_menu", MENU).unwrap();
        host.run_console_line(r#"bind SDLK_k "destroy_object('obj_control')""#)
            .unwrap();
        host.run_console_line("bind SDLK_ESCAPE $Quit").unwrap();

        assert_eq!(host.dispatch(0, &press('k')).unwrap(), 1);
        assert_eq!(host.event_log().messages, vec!["destroyed obj_control"]);
        {
            let table = host.table().borrow();
            assert!(!table.contains("MoveForward"));
            assert!(!table.contains("RoomRestart"));
            assert_eq!(table.trigger_of("Pause"), Some(key('p')));
            assert_eq!(table.trigger_of("Quit"), Some(Trigger::Key(Key::Escape)));
            assert_eq!(table.bound_to(key('k')), vec!["destroy_object('obj_control')"]);
        }
        assert_eq!(host.dispatch(1, &press('w')).unwrap(), 0);

        // a later restart only re-creates what is still loaded
        host.run_console_line("bind SDLK_r \"restart_room()\"").unwrap();
        host.dispatch(2, &press('r')).unwrap();
        assert!(!host.table().borrow().contains("MoveForward"));
        assert!(!host.destroy_object("obj_control").unwrap());
    }

    #[test]
    fn quit_stops_replay() {
        let mut host = host_with_control();
        host.run_console_line("bind SDLK_ESCAPE $Quit").unwrap();
        let summary = host
            .replay(&[
                press('w'),
                InputEvent::new(Trigger::Key(Key::Escape), EventKind::Press),
                press('w'),
            ])
            .unwrap();
        assert!(summary.quit_requested);
        assert_eq!(summary.events_processed, 2);
        assert!(host.event_log().quit_requested);
    }

    #[test]
    fn handlers_may_unbind_their_own_key() {
        let mut host = ScriptHost::new().unwrap();
        host.load_object_source(
            "obj_once",
            r#"
            function create(self)
                kb.bind("SDLK_o", { name = "Once", func = function() unbind("SDLK_o") end })
            end
            "#,
        )
        .unwrap();
        host.run_console_line(r#"bind SDLK_o "log('literal')""#).unwrap();

        assert_eq!(host.dispatch(0, &press('o')).unwrap(), 2);
        assert_eq!(host.dispatch(1, &press('o')).unwrap(), 0);
        assert_eq!(host.table().borrow().trigger_of("Once"), Some(Trigger::Unknown));
    }

    #[test]
    fn quit_global_goes_through_the_quit_action() {
        let mut host = ScriptHost::new().unwrap();
        host.lua()
            .load(r#"kb.bind("SDLK_UNKNOWN", { name = "Quit", func = function() log("bye") end })"#)
            .exec()
            .unwrap();
        host.global_function("quit").unwrap().call::<_, ()>(()).unwrap();
        assert!(!host.quit_requested());
        assert_eq!(host.event_log().messages, vec!["bye"]);
    }

    #[test]
    fn object_scripts_keep_their_globals_private() {
        let mut host = ScriptHost::new().unwrap();
        host.load_object_source("obj_a", "speed = 3").unwrap();
        let speed: Value = host.lua().globals().get("speed").unwrap();
        assert_eq!(speed, Value::Nil);
    }

    #[test]
    fn failing_create_is_an_error() {
        let mut host = ScriptHost::new().unwrap();
        let err = host
            .load_object_source("obj_bad", "function create(self) error('nope') end")
            .unwrap_err();
        assert!(format!("{err:#}").contains("obj_bad.create"));
    }
}
