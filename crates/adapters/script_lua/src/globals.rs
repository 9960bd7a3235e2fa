//! The global environment a script runs in.
//!
//! Built fresh for every run from a whitelist: the sandbox surface
//! (`receive`, `send`, `util`, `console`, `alert`, `delay`, `sleep`) plus a
//! safe subset of the standard library. `io`, `require`, `load`, `dofile`
//! and `debug` are never reachable. `pcall` and `xpcall` are wrapped so the
//! timeout error cannot be caught.

use std::time::Duration;

use mlua::{Function, Lua, MultiValue, Table, Value};

use linescript_app::ports::ChannelTransport;
use linescript_app::sandbox::{DEFAULT_TIMER_LABEL, Sandbox};
use linescript_domain::{codec, time};

use crate::budget::{Budget, timeout};
use crate::values::{bytes_from_value, display, is_byte_table, join};

const SAFE_GLOBALS: &[&str] = &[
    "string",
    "table",
    "math",
    "utf8",
    "tostring",
    "tonumber",
    "type",
    "pairs",
    "ipairs",
    "next",
    "select",
    "error",
    "assert",
    "rawequal",
    "rawget",
    "rawset",
    "rawlen",
    "setmetatable",
    "getmetatable",
];

const SAFE_OS: &[&str] = &["time", "clock", "date"];

/// Lua side of the protected-call wrappers: the native functions stay in
/// charge of unwinding (and yielding), `check` vets what they return.
const PROTECTED_CALLS: &str = r"
local pcall, xpcall, check = ...
return function(...) return check(pcall(...)) end,
    function(...) return check(xpcall(...)) end
";

/// Assemble the environment table for one run bounded by `budget`.
pub(crate) fn build<T>(lua: &Lua, sandbox: &Sandbox<T>, budget: &Budget) -> mlua::Result<Table>
where
    T: ChannelTransport + Send + Sync + 'static,
{
    let env = lua.create_table()?;
    copy_safe_std(lua, &env)?;
    protected_calls(lua, &env, budget)?;

    let console = console(lua, sandbox)?;
    env.set("print", console.get::<Function>("log")?)?;
    env.set("console", console)?;
    env.set("receive", receive(lua, sandbox)?)?;
    env.set("send", send(lua, sandbox)?)?;
    env.set("util", util(lua)?)?;

    let sb = sandbox.clone();
    env.set(
        "alert",
        lua.create_function(move |_, (title, message): (Value, Option<String>)| {
            let message = message.filter(|m| !m.is_empty());
            sb.alert(&display(&title), message.as_deref());
            Ok(())
        })?,
    )?;

    env.set(
        "delay",
        lua.create_async_function(|_, ms: Option<f64>| async move {
            tokio::time::sleep(millis(ms)).await;
            Ok(())
        })?,
    )?;

    let sleep_budget = budget.clone();
    env.set(
        "sleep",
        lua.create_function(move |_, ms: Option<f64>| block_for(millis(ms), &sleep_budget))?,
    )?;

    Ok(env)
}

fn copy_safe_std(lua: &Lua, env: &Table) -> mlua::Result<()> {
    let globals = lua.globals();
    for name in SAFE_GLOBALS {
        let value = globals.get::<Value>(*name)?;
        if !matches!(value, Value::Nil) {
            env.set(*name, value)?;
        }
    }

    let os = globals.get::<Table>("os")?;
    let safe_os = lua.create_table()?;
    for name in SAFE_OS {
        safe_os.set(*name, os.get::<Value>(*name)?)?;
    }
    env.set("os", safe_os)
}

/// Install `pcall`/`xpcall` that re-raise the timeout once the budget is
/// spent, whatever the protected function returned.
fn protected_calls(lua: &Lua, env: &Table, budget: &Budget) -> mlua::Result<()> {
    let globals = lua.globals();
    let budget = budget.clone();
    let check = lua.create_function(move |_, results: MultiValue| {
        budget.check()?;
        Ok(results)
    })?;
    let (pcall, xpcall): (Function, Function) = lua
        .load(PROTECTED_CALLS)
        .set_name("=protected")
        .call((
            globals.get::<Function>("pcall")?,
            globals.get::<Function>("xpcall")?,
            check,
        ))?;
    env.set("pcall", pcall)?;
    env.set("xpcall", xpcall)
}

fn millis(ms: Option<f64>) -> Duration {
    let secs = ms.unwrap_or(0.0).max(0.0) / 1000.0;
    Duration::try_from_secs_f64(secs).unwrap_or(Duration::MAX)
}

/// Block the worker thread, never past the run deadline.
fn block_for(wanted: Duration, budget: &Budget) -> mlua::Result<()> {
    let remaining = budget.remaining();
    if wanted > remaining {
        std::thread::sleep(remaining);
        budget.expire();
        return Err(timeout());
    }
    std::thread::sleep(wanted);
    Ok(())
}

fn console<T>(lua: &Lua, sandbox: &Sandbox<T>) -> mlua::Result<Table>
where
    T: ChannelTransport + Send + Sync + 'static,
{
    let console = lua.create_table()?;

    for name in ["log", "dir", "write"] {
        let sb = sandbox.clone();
        console.set(
            name,
            lua.create_function(move |_, args: MultiValue| {
                sb.console_log(&join(&args));
                Ok(())
            })?,
        )?;
    }

    let sb = sandbox.clone();
    console.set(
        "warn",
        lua.create_function(move |_, args: MultiValue| {
            sb.console_warn(&join(&args));
            Ok(())
        })?,
    )?;

    let sb = sandbox.clone();
    console.set(
        "error",
        lua.create_function(move |_, args: MultiValue| {
            sb.console_error(&join(&args));
            Ok(())
        })?,
    )?;

    let sb = sandbox.clone();
    console.set(
        "time",
        lua.create_function(move |_, label: Option<String>| {
            sb.console_time(label.as_deref().unwrap_or(DEFAULT_TIMER_LABEL));
            Ok(())
        })?,
    )?;

    let sb = sandbox.clone();
    console.set(
        "timeEnd",
        lua.create_function(move |_, label: Option<String>| {
            sb.console_time_end(label.as_deref().unwrap_or(DEFAULT_TIMER_LABEL));
            Ok(())
        })?,
    )?;

    Ok(console)
}

fn receive<T>(lua: &Lua, sandbox: &Sandbox<T>) -> mlua::Result<Table>
where
    T: ChannelTransport + Send + Sync + 'static,
{
    let receive = lua.create_table()?;

    for name in ["get", "getString"] {
        let sb = sandbox.clone();
        receive.set(name, lua.create_function(move |_, ()| Ok(sb.payload_text()))?)?;
    }

    let sb = sandbox.clone();
    receive.set(
        "getBytes",
        lua.create_function(move |lua, ()| lua.create_sequence_from(sb.payload().to_vec()))?,
    )?;

    receive.set("write", receive_write(lua, sandbox)?)?;

    let sb = sandbox.clone();
    receive.set(
        "writeLine",
        lua.create_function(move |_, (message, color): (Value, Option<String>)| {
            sb.receive_write_line(&display(&message), color);
            Ok(())
        })?,
    )?;

    let sb = sandbox.clone();
    receive.set(
        "clear",
        lua.create_function(move |_, ()| {
            sb.receive_clear();
            Ok(())
        })?,
    )?;

    let sb = sandbox.clone();
    receive.set(
        "clearLastReceived",
        lua.create_function(move |_, ()| {
            sb.receive_clear_last();
            Ok(())
        })?,
    )?;

    Ok(receive)
}

fn receive_write<T>(lua: &Lua, sandbox: &Sandbox<T>) -> mlua::Result<Function>
where
    T: ChannelTransport + Send + Sync + 'static,
{
    let sb = sandbox.clone();
    lua.create_function(move |_, (message, color): (Value, Option<String>)| {
        sb.receive_write(&display(&message), color);
        Ok(())
    })
}

fn send<T>(lua: &Lua, sandbox: &Sandbox<T>) -> mlua::Result<Table>
where
    T: ChannelTransport + Send + Sync + 'static,
{
    let send = lua.create_table()?;

    let sb = sandbox.clone();
    send.set(
        "write",
        lua.create_async_function(move |_, (value, is_hex): (Option<String>, Option<bool>)| {
            let sb = sb.clone();
            async move {
                let Some(value) = value else {
                    return Ok(());
                };
                sb.send_write(&value, is_hex.unwrap_or(false))
                    .await
                    .map_err(mlua::Error::external)
            }
        })?,
    )?;

    let sb = sandbox.clone();
    send.set(
        "writeBytes",
        lua.create_async_function(move |_, value: Value| {
            let sb = sb.clone();
            async move {
                let bytes = bytes_from_value(value)?;
                sb.send_bytes(bytes).await.map_err(mlua::Error::external)
            }
        })?,
    )?;

    send.set("writeToReceive", receive_write(lua, sandbox)?)?;

    Ok(send)
}

fn util(lua: &Lua) -> mlua::Result<Table> {
    let util = lua.create_table()?;

    for name in ["isNull", "isUndefined", "isNullOrUndefined"] {
        util.set(name, lua.create_function(|_, value: Value| Ok(matches!(value, Value::Nil)))?)?;
    }

    util.set("timeToString", lua.create_function(|_, ()| Ok(time::time_of_day()))?)?;

    util.set(
        "hexStringToBytes",
        lua.create_function(|lua, value: Option<String>| {
            lua.create_sequence_from(codec::decode_hex_lenient(&value.unwrap_or_default()))
        })?,
    )?;

    util.set(
        "bytesToHexString",
        lua.create_function(|_, (value, uppercase): (Value, Option<bool>)| {
            Ok(codec::encode_hex(
                &bytes_from_value(value)?,
                uppercase.unwrap_or(false),
            ))
        })?,
    )?;

    util.set(
        "bytesToInteger",
        lua.create_function(
            |_, (value, index, len, big_endian): (Value, i64, i64, Option<bool>)| {
                let bytes = bytes_from_value(value)?;
                let (Ok(index), Ok(len)) = (usize::try_from(index), usize::try_from(len)) else {
                    return Ok(0);
                };
                Ok(codec::bytes_to_u32(
                    &bytes,
                    index,
                    len,
                    big_endian.unwrap_or(true),
                ))
            },
        )?,
    )?;

    let to_float = lua.create_function(
        |_, (value, index, big_endian): (Value, i64, Option<bool>)| {
            let bytes = bytes_from_value(value)?;
            let Ok(index) = usize::try_from(index) else {
                return Ok(0.0);
            };
            Ok(f64::from(codec::bytes_to_f32(
                &bytes,
                index,
                big_endian.unwrap_or(true),
            )))
        },
    )?;
    util.set("bytesTofloat", to_float.clone())?;
    util.set("bytesToFloat", to_float)?;

    util.set("types", types(lua)?)?;

    Ok(util)
}

fn types(lua: &Lua) -> mlua::Result<Table> {
    let types = lua.create_table()?;
    types.set(
        "isBoolean",
        lua.create_function(|_, value: Value| Ok(matches!(value, Value::Boolean(_))))?,
    )?;
    types.set(
        "isNumber",
        lua.create_function(|_, value: Value| {
            Ok(matches!(value, Value::Integer(_) | Value::Number(_)))
        })?,
    )?;
    types.set(
        "isString",
        lua.create_function(|_, value: Value| Ok(matches!(value, Value::String(_))))?,
    )?;
    types.set(
        "isFunction",
        lua.create_function(|_, value: Value| Ok(matches!(value, Value::Function(_))))?,
    )?;
    types.set(
        "isTable",
        lua.create_function(|_, value: Value| Ok(matches!(value, Value::Table(_))))?,
    )?;
    types.set(
        "isBytes",
        lua.create_function(|_, value: Value| Ok(is_byte_table(&value)))?,
    )?;
    Ok(types)
}
