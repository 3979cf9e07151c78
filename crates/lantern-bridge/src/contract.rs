//! Script-implementable contracts and the stubs that satisfy them.
//!
//! A contract is a fixed list of named lifecycle hooks. A [`Stub`] holds the
//! guest callables that implement one instance of a contract, and dispatch is
//! a name lookup followed by a call.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use mlua::{AnyUserData, Function, MultiValue, Value};
use tracing::debug;

use crate::error::BridgeError;
use crate::runtime::ContractActivity;

/// Named hooks a guest script must (required) or may (optional) define.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Contract {
    id: String,
    required: Vec<String>,
    optional: Vec<String>,
}

impl Contract {
    pub fn new(id: &str, required: &[&str], optional: &[&str]) -> Self {
        let mut required_names: Vec<String> = Vec::new();
        for name in required {
            if !required_names.iter().any(|n| n == name) {
                required_names.push(name.to_string());
            }
        }
        let mut optional_names: Vec<String> = Vec::new();
        for name in optional {
            if !required_names.iter().chain(optional_names.iter()).any(|n| n == name) {
                optional_names.push(name.to_string());
            }
        }

        Self {
            id: id.to_string(),
            required: required_names,
            optional: optional_names,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn required(&self) -> &[String] {
        &self.required
    }

    pub fn optional(&self) -> &[String] {
        &self.optional
    }

    pub fn is_required(&self, hook: &str) -> bool {
        self.required.iter().any(|h| h == hook)
    }

    pub fn recognizes(&self, hook: &str) -> bool {
        self.is_required(hook) || self.optional.iter().any(|h| h == hook)
    }

    /// Every hook name, required first.
    pub fn hook_names(&self) -> impl Iterator<Item = &str> {
        self.required
            .iter()
            .chain(self.optional.iter())
            .map(String::as_str)
    }
}

/// Result of dispatching a hook.
#[derive(Debug)]
pub enum HookOutcome {
    /// The hook ran and returned these values.
    Returned(MultiValue),
    /// The stub has no such hook; the host applies its default behavior.
    Skipped,
}

impl HookOutcome {
    pub fn ran(&self) -> bool {
        matches!(self, HookOutcome::Returned(_))
    }

    /// First returned value, `Nil` when skipped or empty.
    pub fn first(&self) -> Value {
        match self {
            HookOutcome::Returned(values) => values.iter().next().cloned().unwrap_or(Value::Nil),
            HookOutcome::Skipped => Value::Nil,
        }
    }

    /// The `(ok, result)` pair guest-facing APIs expose.
    pub fn into_pair(self) -> (bool, MultiValue) {
        match self {
            HookOutcome::Returned(values) => (true, values),
            HookOutcome::Skipped => (false, MultiValue::new()),
        }
    }
}

/// Host-side object whose behavior comes from guest hooks.
///
/// Stubs only exist in the ready state: the loader never hands out a stub
/// that failed validation.
pub struct Stub {
    contract: Rc<Contract>,
    source_name: String,
    hooks: RefCell<HashMap<String, Function>>,
    self_proxy: RefCell<Option<AnyUserData>>,
    activity: Option<Rc<ContractActivity>>,
}

impl Stub {
    pub(crate) fn new(
        contract: Rc<Contract>,
        source_name: String,
        hooks: HashMap<String, Function>,
        activity: Option<Rc<ContractActivity>>,
    ) -> Self {
        Self {
            contract,
            source_name,
            hooks: RefCell::new(hooks),
            self_proxy: RefCell::new(None),
            activity,
        }
    }

    pub fn contract(&self) -> &Rc<Contract> {
        &self.contract
    }

    pub fn source_name(&self) -> &str {
        &self.source_name
    }

    pub fn has_hook(&self, name: &str) -> bool {
        self.hooks.borrow().contains_key(name)
    }

    pub fn hook(&self, name: &str) -> Option<Function> {
        self.hooks.borrow().get(name).cloned()
    }

    /// Names of the hooks currently present, in contract order.
    pub fn present_hooks(&self) -> Vec<String> {
        let hooks = self.hooks.borrow();
        self.contract
            .hook_names()
            .filter(|name| hooks.contains_key(*name))
            .map(str::to_string)
            .collect()
    }

    /// Remember the proxy that is passed as `self` to every hook.
    pub fn bind_self(&self, proxy: AnyUserData) {
        *self.self_proxy.borrow_mut() = Some(proxy);
    }

    pub fn self_proxy(&self) -> Option<AnyUserData> {
        self.self_proxy.borrow().clone()
    }

    /// Replace a hook after load. Goes through the same name table as loading,
    /// and a required hook can never be removed.
    pub fn assign_hook(&self, name: &str, value: Value) -> Result<(), BridgeError> {
        if !self.contract.recognizes(name) {
            return Err(BridgeError::UnknownHook {
                contract: self.contract.id().to_string(),
                hook: name.to_string(),
            });
        }

        match value {
            Value::Function(func) => {
                debug!(target: "bridge", "Replacing hook {} on {}", name, self.source_name);
                self.hooks.borrow_mut().insert(name.to_string(), func);
                Ok(())
            }
            Value::Nil if self.contract.is_required(name) => Err(BridgeError::RequiredHookCleared {
                contract: self.contract.id().to_string(),
                hook: name.to_string(),
            }),
            Value::Nil => {
                debug!(target: "bridge", "Removing hook {} on {}", name, self.source_name);
                self.hooks.borrow_mut().remove(name);
                Ok(())
            }
            other => Err(BridgeError::InvalidHook {
                hook: name.to_string(),
                found: other.type_name().to_string(),
            }),
        }
    }

    /// Call a hook with the stub's own proxy prepended to `args`.
    ///
    /// Returns [`HookOutcome::Skipped`] when the hook is absent. Guest errors
    /// come back as recoverable bridge errors. While the hook runs, loading
    /// another script for the same contract fails with
    /// [`BridgeError::ReentrantLoad`].
    pub fn invoke(&self, name: &str, mut args: MultiValue) -> Result<HookOutcome, BridgeError> {
        // Clone out of the map so the hook may reassign itself while running.
        let Some(func) = self.hook(name) else {
            return Ok(HookOutcome::Skipped);
        };

        let me = self
            .self_proxy()
            .map(Value::UserData)
            .unwrap_or(Value::Nil);
        args.push_front(me);

        let _running = self
            .activity
            .as_ref()
            .map(|activity| activity.enter_hook(self.contract.id()));
        func.call::<MultiValue>(args)
            .map(HookOutcome::Returned)
            .map_err(|e| BridgeError::from_lua(&self.source_name, e))
    }
}

impl std::fmt::Debug for Stub {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Stub")
            .field("contract", &self.contract.id())
            .field("source_name", &self.source_name)
            .field("hooks", &self.present_hooks())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_contract_deduplicates_hook_names() {
        let contract = Contract::new("room", &["create", "create"], &["create", "onRender"]);
        assert_eq!(contract.required(), ["create"]);
        assert_eq!(contract.optional(), ["onRender"]);
        assert!(contract.recognizes("onRender"));
        assert!(!contract.recognizes("render"));
    }

    #[test]
    fn test_skipped_outcome_reports_not_ok() {
        let (ok, values) = HookOutcome::Skipped.into_pair();
        assert!(!ok);
        assert!(values.is_empty());
    }
}
