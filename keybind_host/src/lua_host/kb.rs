//! The `kb` table scripts use to register and query actions.

use std::rc::Rc;

use keybind_table::{ActionDescriptor, ActionEvent, Handler, Trigger};
use log::warn;
use mlua::{Error as LuaError, Function, Lua, Result as LuaResult, Table, Value, Variadic};
use thiserror::Error;

use super::context::{HostContext, SharedTable};
use super::values::{describe_value, descriptor_flag, name_text, strip_self};

#[derive(Debug, Error)]
pub enum DescriptorError {
    #[error("kb.bind expects a trigger and a descriptor table")]
    MissingArguments,
    #[error("kb.bind trigger must be a key string, got {0}")]
    BadTrigger(String),
    #[error("kb.bind descriptor must be a table, got {0}")]
    NotATable(String),
    #[error("kb.bind descriptor is missing `name`")]
    MissingName,
    #[error("kb.bind descriptor {name:?} has no `func`")]
    MissingFunc { name: String },
}

/// A descriptor table read from Lua, before its function is stored.
struct LuaDescriptor<'lua> {
    descriptor: ActionDescriptor,
    func: Function<'lua>,
}

fn read_descriptor<'lua>(
    table: &Table<'lua>,
    default_owner: Option<String>,
) -> LuaResult<LuaDescriptor<'lua>> {
    let name = table
        .get::<_, Value>("name")
        .ok()
        .as_ref()
        .and_then(name_text)
        .filter(|name| !name.trim().is_empty())
        .ok_or_else(|| LuaError::external(DescriptorError::MissingName))?;
    let is_repeatable = descriptor_flag(&table.get::<_, Value>("is_repeatable")?);
    let owner = match table.get::<_, Value>("owner")? {
        Value::Nil => default_owner,
        value => name_text(&value),
    };
    let func = match table.get::<_, Value>("func")? {
        Value::Function(func) => func,
        _ => return Err(LuaError::external(DescriptorError::MissingFunc { name })),
    };

    let mut descriptor = ActionDescriptor::new(name).repeatable(is_repeatable);
    descriptor.owner = owner;
    Ok(LuaDescriptor { descriptor, func })
}

fn parse_trigger(value: &Value) -> LuaResult<Trigger> {
    let text = name_text(value)
        .ok_or_else(|| LuaError::external(DescriptorError::BadTrigger(describe_value(value))))?;
    Trigger::parse(&text).map_err(LuaError::external)
}

pub(crate) fn install_kb(lua: &Lua, table: SharedTable, context: HostContext) -> LuaResult<()> {
    let kb = lua.create_table()?;

    let bind_table = table.clone();
    let bind_context = context.clone();
    kb.set(
        "bind",
        lua.create_function(move |lua_ctx, args: Variadic<Value>| {
            let args = strip_self(args, 2);
            let (Some(trigger), Some(descriptor)) = (args.first(), args.get(1)) else {
                return Err(LuaError::external(DescriptorError::MissingArguments));
            };
            let trigger = parse_trigger(trigger)?;
            let Value::Table(descriptor) = descriptor else {
                return Err(LuaError::external(DescriptorError::NotATable(
                    describe_value(descriptor),
                )));
            };
            let LuaDescriptor { descriptor, func } =
                read_descriptor(descriptor, bind_context.current_owner())?;

            let label = descriptor.name.clone();
            let key = Rc::new(lua_ctx.create_registry_value(func)?);
            let handler: Handler<HostContext> =
                Rc::new(move |ctx: &mut HostContext, event: &ActionEvent| {
                    if let Err(err) = ctx.call_registered(&key, event) {
                        warn!("[lua] action {label} failed: {err}");
                    }
                });
            let id = bind_table
                .borrow_mut()
                .register(trigger, descriptor, handler)
                .map_err(LuaError::external)?;
            Ok(id.get())
        })?,
    )?;

    let unbind_table = table.clone();
    kb.set(
        "unbind",
        lua.create_function(move |_, args: Variadic<Value>| {
            let args = strip_self(args, 1);
            let name = args.first().and_then(name_text).unwrap_or_default();
            Ok(unbind_table.borrow_mut().unregister(&name))
        })?,
    )?;

    let call_table = table.clone();
    let call_context = context;
    kb.set(
        "call",
        lua.create_function(move |_, args: Variadic<Value>| {
            let args = strip_self(args, 1);
            let name = args.first().and_then(name_text).unwrap_or_default();
            let firing = call_table
                .borrow()
                .prepare_call(&name)
                .map_err(LuaError::external)?;
            firing.invoke(&mut call_context.clone());
            Ok(())
        })?,
    )?;

    let bound_table = table;
    kb.set(
        "bound",
        lua.create_function(move |lua_ctx, args: Variadic<Value>| {
            let args = strip_self(args, 1);
            let trigger = parse_trigger(args.first().unwrap_or(&Value::Nil))?;
            let labels = bound_table.borrow().bound_to(trigger);
            lua_ctx.create_sequence_from(labels)
        })?,
    )?;

    kb.set(
        "keystring",
        lua.create_function(|_, args: Variadic<Value>| {
            let args = strip_self(args, 1);
            Ok(parse_trigger(args.first().unwrap_or(&Value::Nil))?.keystring())
        })?,
    )?;

    kb.set(
        "keyname",
        lua.create_function(|_, args: Variadic<Value>| {
            let args = strip_self(args, 1);
            Ok(parse_trigger(args.first().unwrap_or(&Value::Nil))?.display_name())
        })?,
    )?;

    lua.globals().set("kb", kb)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;

    use super::*;
    use keybind_table::{BindingTable, EventKind, Key};

    fn host() -> (Rc<Lua>, SharedTable, HostContext) {
        let lua = Rc::new(Lua::new());
        let table: SharedTable = Rc::new(RefCell::new(BindingTable::new()));
        let context = HostContext::new(Rc::downgrade(&lua), Rc::default());
        install_kb(&lua, table.clone(), context.clone()).unwrap();
        (lua, table, context)
    }

    #[test]
    fn bind_registers_named_actions() {
        let (lua, table, mut context) = host();
        lua.load(
            r#"
            count = 0
            id = kb.bind("SDLK_w", {
                name = "MoveForward",
                is_repeatable = true,
                func = function(event) count = count + 1 end,
            })
            "#,
        )
        .exec()
        .unwrap();

        let w = Trigger::Key(Key::Char('w'));
        assert_eq!(table.borrow().trigger_of("MoveForward"), Some(w));
        for kind in [EventKind::Press, EventKind::Repeat, EventKind::Release] {
            let firings = table.borrow_mut().resolve(w, kind, None);
            for firing in firings {
                firing.invoke(&mut context);
            }
        }
        let count: i64 = lua.globals().get("count").unwrap();
        assert_eq!(count, 2);
    }

    #[test]
    fn method_call_form_is_accepted() {
        let (lua, table, _) = host();
        lua.load(r#"kb:bind("SDLK_UNKNOWN", { name = "Jump", func = function() end })"#)
            .exec()
            .unwrap();
        assert_eq!(table.borrow().trigger_of("Jump"), Some(Trigger::Unknown));
    }

    #[test]
    fn malformed_descriptors_raise() {
        let (lua, table, _) = host();
        for chunk in [
            r#"kb.bind("SDLK_w", { func = function() end })"#,
            r#"kb.bind("SDLK_w", { name = "NoFunc" })"#,
            r#"kb.bind("SDLK_w", "MoveForward")"#,
            r#"kb.bind("SDLK_NOPE", { name = "X", func = function() end })"#,
            r#"kb.bind("SDLK_w", { name = "Move Forward", func = function() end })"#,
            r#"kb.bind()"#,
        ] {
            assert!(lua.load(chunk).exec().is_err(), "{chunk} should fail");
        }
        assert!(table.borrow().is_empty());
    }

    #[test]
    fn owner_defaults_to_the_loading_object() {
        let (lua, table, context) = host();
        context.state().borrow_mut().current_owner = Some("obj_control".to_string());
        lua.load(r#"kb.bind("SDLK_UNKNOWN", { name = "MoveUp", func = function() end })"#)
            .exec()
            .unwrap();
        lua.load(
            r#"kb.bind("SDLK_UNKNOWN", {
                name = "Pause", owner = "obj_menu", func = function() end
            })"#,
        )
        .exec()
        .unwrap();
        let table = table.borrow();
        assert_eq!(table.get("MoveUp").unwrap().owner(), Some("obj_control"));
        assert_eq!(table.get("Pause").unwrap().owner(), Some("obj_menu"));
    }

    #[test]
    fn call_unbind_and_queries() {
        let (lua, table, _) = host();
        lua.load(
            r#"
            kb.bind("SDLK_ESCAPE", { name = "Quit", func = function() quitting = true end })
            kb.call("Quit")
            bound = kb.bound("SDLK_ESCAPE")[1]
            keystring = kb.keystring("sdlk_escape")
            keyname = kb.keyname("SDLK_PAGEUP")
            removed = kb.unbind("Quit")
            removed_again = kb.unbind("Quit")
            "#,
        )
        .exec()
        .unwrap();

        let globals = lua.globals();
        assert!(globals.get::<_, bool>("quitting").unwrap());
        assert_eq!(globals.get::<_, String>("bound").unwrap(), "Quit");
        assert_eq!(globals.get::<_, String>("keystring").unwrap(), "SDLK_ESCAPE");
        assert_eq!(globals.get::<_, String>("keyname").unwrap(), "PAGEUP");
        assert!(globals.get::<_, bool>("removed").unwrap());
        assert!(!globals.get::<_, bool>("removed_again").unwrap());
        assert!(table.borrow().is_empty());

        assert!(lua.load(r#"kb.call("Quit")"#).exec().is_err());
    }
}
