//! Console-facing globals: `bind`, `unbind`, `exec`, `log`, `quit`,
//! `restart_room` and `destroy_object`.

use std::path::Path;

use keybind_table::{
    ActionId, BindError, CommandSink, ConfigReport, ConfigScript, Console, Trigger, UnbindTarget,
};
use log::{info, warn};
use mlua::{Error as LuaError, Lua, Result as LuaResult, Value, Variadic};

use super::context::{HostContext, SharedTable};
use super::values::describe_value;

/// Applies config lines to the shared table, borrowing it only for the
/// duration of each call so commands run from a config can bind keys too.
pub struct HostConsole {
    table: SharedTable,
    context: HostContext,
}

impl HostConsole {
    pub fn new(table: SharedTable, context: HostContext) -> Self {
        HostConsole { table, context }
    }
}

impl Console for HostConsole {
    fn bind(&mut self, trigger: Trigger, command: &str) -> Result<ActionId, BindError> {
        self.table.borrow_mut().bind_by_command(trigger, command)
    }

    fn bound_to(&mut self, trigger: Trigger) -> Vec<String> {
        let labels = self.table.borrow().bound_to(trigger);
        info!("{trigger} = {}", labels.join(", "));
        labels
    }

    fn unbind(&mut self, target: &UnbindTarget) -> usize {
        self.table.borrow_mut().unbind_target(target)
    }

    fn run(&mut self, command: &str) {
        self.context.run_command(command);
    }
}

pub(crate) fn exec_config(
    path: &Path,
    table: &SharedTable,
    context: &HostContext,
) -> Result<ConfigReport, keybind_table::ConfigError> {
    let script = ConfigScript::load(path)?;
    let mut console = HostConsole::new(table.clone(), context.clone());
    let report = script.apply(&mut console);
    info!(
        "[config] {}: {} line(s) applied, {} failed",
        path.display(),
        report.applied,
        report.failures.len()
    );
    Ok(report)
}

/// Quit through the `Quit` action when one is registered, so scripts can
/// hook it; otherwise just raise the flag.
pub(crate) fn quit(table: &SharedTable, context: &HostContext) {
    let firing = table.borrow().prepare_call("Quit");
    match firing {
        Ok(firing) => firing.invoke(&mut context.clone()),
        Err(_) => context.request_quit(),
    }
}

pub(crate) fn install_console(
    lua: &Lua,
    table: SharedTable,
    context: HostContext,
) -> LuaResult<()> {
    let globals = lua.globals();

    let bind_table = table.clone();
    let bind = lua.create_function(
        move |lua_ctx,
              (key, command): (String, Option<String>)|
              -> LuaResult<(Value, Option<String>)> {
            let trigger = match Trigger::parse(&key) {
                Ok(trigger) => trigger,
                Err(err) => {
                    warn!("[bind] {err}");
                    return Ok((Value::Boolean(false), Some(err.to_string())));
                }
            };
            let Some(command) = command else {
                let labels = bind_table.borrow().bound_to(trigger);
                if labels.is_empty() {
                    return Ok((Value::Nil, None));
                }
                let joined = lua_ctx.create_string(&labels.join(", "))?;
                return Ok((Value::String(joined), None));
            };
            let result = bind_table.borrow_mut().bind_by_command(trigger, &command);
            match result {
                Ok(_) => Ok((Value::Boolean(true), None)),
                Err(err) => {
                    warn!("[bind] {key} \"{command}\": {err}");
                    Ok((Value::Boolean(false), Some(err.to_string())))
                }
            }
        },
    )?;
    globals.set("bind", bind)?;

    let unbind_table = table.clone();
    let unbind = lua.create_function(move |_, target: String| {
        match UnbindTarget::parse(&target) {
            Ok(target) => Ok(unbind_table.borrow_mut().unbind_target(&target)),
            Err(err) => {
                warn!("[unbind] {err}");
                Ok(0)
            }
        }
    })?;
    globals.set("unbind", unbind)?;

    let exec_table = table.clone();
    let exec_context = context.clone();
    let exec = lua.create_function(move |_, path: String| {
        let report =
            exec_config(Path::new(&path), &exec_table, &exec_context).map_err(LuaError::external)?;
        Ok((report.applied, report.failures.len()))
    })?;
    globals.set("exec", exec)?;

    let log_context = context.clone();
    let log = lua.create_function(move |_, args: Variadic<Value>| {
        let message = args
            .iter()
            .map(describe_value)
            .collect::<Vec<_>>()
            .join(" ");
        log_context.push_message(message);
        Ok(())
    })?;
    globals.set("log", log)?;

    let quit_table = table;
    let quit_context = context.clone();
    globals.set(
        "quit",
        lua.create_function(move |_, ()| {
            quit(&quit_table, &quit_context);
            Ok(())
        })?,
    )?;

    let restart_context = context.clone();
    globals.set(
        "restart_room",
        lua.create_function(move |_, ()| {
            restart_context.request_restart();
            Ok(())
        })?,
    )?;

    let destroy_context = context;
    globals.set(
        "destroy_object",
        lua.create_function(move |_, name: String| {
            destroy_context.request_destroy(&name);
            Ok(())
        })?,
    )?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::fs;
    use std::rc::Rc;

    use super::*;
    use keybind_table::{BindingTable, Key};
    use tempfile::tempdir;

    fn host() -> (Rc<Lua>, SharedTable, HostContext) {
        let lua = Rc::new(Lua::new());
        let table: SharedTable = Rc::new(RefCell::new(BindingTable::new()));
        let context = HostContext::new(Rc::downgrade(&lua), Rc::default());
        install_console(&lua, table.clone(), context.clone()).unwrap();
        (lua, table, context)
    }

    #[test]
    fn bind_reports_failures_without_raising() {
        let (lua, table, _) = host();
        lua.load(
            r#"
            ok1, err1 = bind("SDLK_q", "$Missing")
            ok2, err2 = bind("SDLK_NOPE", "quit()")
            ok3 = bind("SDLK_q", "quit()")
            query = bind("SDLK_q")
            empty = bind("SDLK_z")
            "#,
        )
        .exec()
        .unwrap();

        let globals = lua.globals();
        assert!(!globals.get::<_, bool>("ok1").unwrap());
        assert!(globals.get::<_, String>("err1").unwrap().contains("Missing"));
        assert!(!globals.get::<_, bool>("ok2").unwrap());
        assert!(globals.get::<_, bool>("ok3").unwrap());
        assert_eq!(globals.get::<_, String>("query").unwrap(), "quit()");
        assert_eq!(globals.get::<_, Value>("empty").unwrap(), Value::Nil);
        assert_eq!(table.borrow().len(), 1);
    }

    #[test]
    fn quit_and_restart_set_flags() {
        let (lua, _, context) = host();
        lua.load("restart_room() quit()").exec().unwrap();
        let state = context.state().borrow();
        assert!(state.quit_requested);
        assert!(state.restart_requested);
    }

    #[test]
    fn destroy_object_is_queued_for_the_host() {
        let (lua, _, context) = host();
        lua.load(r#"destroy_object("obj_bee") destroy_object("obj_menu")"#)
            .exec()
            .unwrap();
        assert_eq!(
            context.state().borrow().pending_destroys,
            vec!["obj_bee", "obj_menu"]
        );
    }

    #[test]
    fn log_collects_messages() {
        let (lua, _, context) = host();
        lua.load(r#"log("forward", 3, true)"#).exec().unwrap();
        assert_eq!(context.state().borrow().log.messages, vec!["forward 3 true"]);
    }

    #[test]
    fn unbind_accepts_keys_names_and_all() {
        let (lua, table, _) = host();
        lua.load(
            r#"
            bind("SDLK_a", "x = 1")
            bind("SDLK_b", "x = 2")
            a = unbind("SDLK_a")
            bogus = unbind("SDLK_NOPE")
            rest = unbind("all")
            "#,
        )
        .exec()
        .unwrap();
        let globals = lua.globals();
        assert_eq!(globals.get::<_, i64>("a").unwrap(), 1);
        assert_eq!(globals.get::<_, i64>("bogus").unwrap(), 0);
        assert_eq!(globals.get::<_, i64>("rest").unwrap(), 1);
        assert!(table.borrow().is_empty());
    }

    #[test]
    fn exec_applies_cfg_files_whose_lines_call_back_into_bind() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("autoexec.cfg");
        fs::write(
            &path,
            "bind SDLK_F1 \"log('help')\"\n\
             bind(\"SDLK_F2\", \"log('two')\")\n\
             bind SDLK_F3 $Nothing\n",
        )
        .unwrap();

        let (lua, table, _) = host();
        lua.globals().set("cfg", path.to_str().unwrap()).unwrap();
        lua.load("applied, failed = exec(cfg)").exec().unwrap();

        let globals = lua.globals();
        assert_eq!(globals.get::<_, i64>("applied").unwrap(), 2);
        assert_eq!(globals.get::<_, i64>("failed").unwrap(), 1);
        assert_eq!(table.borrow().bound_to(Trigger::Key(Key::F(1))), vec!["log('help')"]);
        assert_eq!(table.borrow().bound_to(Trigger::Key(Key::F(2))), vec!["log('two')"]);

        assert!(lua.load(r#"exec("/nonexistent/autoexec.cfg")"#).exec().is_err());
    }
}
