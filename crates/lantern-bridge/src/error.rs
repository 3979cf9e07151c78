use thiserror::Error;

/// Everything that can go wrong while crossing the host/guest boundary.
///
/// Registry errors (`DuplicateCapability`, `AmbiguousPrimary`) are raised while
/// capabilities are being set up. The rest are per-call failures that leave the
/// registry and proxy cache untouched.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BridgeError {
    #[error("capability '{name}' is already registered")]
    DuplicateCapability { name: String },

    #[error("host type '{type_name}' needs exactly one primary capability, found [{}]", .primaries.join(", "))]
    AmbiguousPrimary {
        type_name: String,
        primaries: Vec<String>,
    },

    #[error("cannot call {capability}.{operation}: the host object no longer exists")]
    DeadReference {
        capability: String,
        operation: String,
    },

    #[error("script '{source_name}' does not satisfy contract '{contract}': missing required hook(s) [{}]", .missing.join(", "))]
    MissingHook {
        contract: String,
        source_name: String,
        missing: Vec<String>,
    },

    #[error("script '{source_name}' failed: {message}")]
    ScriptExecution {
        source_name: String,
        message: String,
    },

    #[error("contract '{contract}' is busy loading or running a hook; re-entrant loading is not allowed")]
    ReentrantLoad { contract: String },

    #[error("operation {operation} expects a {expected} but the host object is a {found}")]
    TypeMismatch {
        operation: String,
        expected: String,
        found: String,
    },

    #[error("contract '{contract}' has no hook named '{hook}'")]
    UnknownHook { contract: String, hook: String },

    #[error("hook '{hook}' must be a function, got {found}")]
    InvalidHook { hook: String, found: String },

    #[error("required hook '{hook}' of contract '{contract}' cannot be removed")]
    RequiredHookCleared { contract: String, hook: String },

    #[error("a capability registry is already installed for this thread")]
    RegistryAlreadyInstalled,

    #[error("no capability registry has been installed")]
    NoRegistry,
}

impl BridgeError {
    /// Recover a bridge error carried through a guest call, or wrap the guest's
    /// own diagnostic as a `ScriptExecution` error.
    pub fn from_lua(source_name: &str, err: mlua::Error) -> Self {
        match find_bridge_error(&err) {
            Some(inner) => inner.clone(),
            None => BridgeError::ScriptExecution {
                source_name: source_name.to_string(),
                message: err.to_string(),
            },
        }
    }

    /// Whether the caller can keep going after this error.
    pub fn is_recoverable(&self) -> bool {
        !matches!(
            self,
            BridgeError::DuplicateCapability { .. }
                | BridgeError::AmbiguousPrimary { .. }
                | BridgeError::RegistryAlreadyInstalled
                | BridgeError::NoRegistry
        )
    }
}

fn find_bridge_error(err: &mlua::Error) -> Option<&BridgeError> {
    match err {
        mlua::Error::ExternalError(inner) => inner.downcast_ref::<BridgeError>(),
        mlua::Error::CallbackError { cause, .. } => find_bridge_error(cause),
        mlua::Error::WithContext { cause, .. } => find_bridge_error(cause),
        _ => None,
    }
}

impl From<BridgeError> for mlua::Error {
    fn from(err: BridgeError) -> Self {
        mlua::Error::external(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_hook_message_lists_every_name() {
        let err = BridgeError::MissingHook {
            contract: "room".to_string(),
            source_name: "arena.lua".to_string(),
            missing: vec!["create".to_string(), "process".to_string()],
        };
        let message = err.to_string();
        assert!(message.contains("room"));
        assert!(message.contains("arena.lua"));
        assert!(message.contains("create, process"));
    }

    #[test]
    fn test_bridge_error_survives_callback_wrapping() {
        let original = BridgeError::DeadReference {
            capability: "positionable".to_string(),
            operation: "getX".to_string(),
        };
        let wrapped = mlua::Error::CallbackError {
            traceback: String::new(),
            cause: std::sync::Arc::new(mlua::Error::from(original.clone())),
        };
        assert_eq!(BridgeError::from_lua("test", wrapped), original);
    }

    #[test]
    fn test_plain_lua_error_becomes_script_execution() {
        let err = BridgeError::from_lua("test.lua", mlua::Error::RuntimeError("boom".into()));
        match err {
            BridgeError::ScriptExecution {
                source_name,
                message,
            } => {
                assert_eq!(source_name, "test.lua");
                assert!(message.contains("boom"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_registry_errors_are_not_recoverable() {
        assert!(!BridgeError::DuplicateCapability { name: "x".into() }.is_recoverable());
        assert!(BridgeError::ReentrantLoad {
            contract: "room".into()
        }
        .is_recoverable());
    }
}
