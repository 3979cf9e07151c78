//! Events delivered to rooms, world objects and UI components.

use std::collections::BTreeMap;

use lantern_bridge::mlua::{IntoLua, Lua, Result as LuaResult, Value};

#[derive(Debug, Clone, PartialEq)]
pub enum EventValue {
    Bool(bool),
    Int(i64),
    Number(f64),
    Text(String),
}

impl IntoLua for EventValue {
    fn into_lua(self, lua: &Lua) -> LuaResult<Value> {
        match self {
            EventValue::Bool(b) => Ok(Value::Boolean(b)),
            EventValue::Int(i) => Ok(Value::Integer(i)),
            EventValue::Number(n) => Ok(Value::Number(n)),
            EventValue::Text(s) => s.into_lua(lua),
        }
    }
}

impl From<bool> for EventValue {
    fn from(b: bool) -> Self {
        EventValue::Bool(b)
    }
}

impl From<i64> for EventValue {
    fn from(i: i64) -> Self {
        EventValue::Int(i)
    }
}

impl From<f64> for EventValue {
    fn from(n: f64) -> Self {
        EventValue::Number(n)
    }
}

impl From<&str> for EventValue {
    fn from(s: &str) -> Self {
        EventValue::Text(s.to_string())
    }
}

/// A named event plus flat key/value data. Scripts receive it as a table
/// with a `name` field.
#[derive(Debug, Clone, PartialEq)]
pub struct HostEvent {
    pub name: String,
    pub data: BTreeMap<String, EventValue>,
}

impl HostEvent {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            data: BTreeMap::new(),
        }
    }

    pub fn with(mut self, key: &str, value: impl Into<EventValue>) -> Self {
        self.data.insert(key.to_string(), value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&EventValue> {
        self.data.get(key)
    }

    /// Event raised when a scheduler timer fires.
    pub fn timer(id: u64, name: &str) -> Self {
        HostEvent::new("timer")
            .with("id", id as i64)
            .with("timer", name)
    }
}

impl IntoLua for HostEvent {
    fn into_lua(self, lua: &Lua) -> LuaResult<Value> {
        let table = lua.create_table()?;
        for (key, value) in self.data {
            table.set(key, value)?;
        }
        table.set("name", self.name)?;
        Ok(Value::Table(table))
    }
}
