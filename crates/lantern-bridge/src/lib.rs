/// Interop bridge between host objects and guest Lua scripts
///
/// Host code registers capabilities (named operation tables keyed by host
/// type), wraps objects into identity-stable guest proxies, and loads scripts
/// that implement host-defined lifecycle contracts.
pub mod capability;
pub mod contract;
pub mod error;
pub mod host_type;
pub mod loader;
pub mod object;
pub mod proxy;
pub mod registry;
pub mod runtime;

pub use capability::{CapabilityDescriptor, ComposedTable, NativeFn, Operation, OperationTable};
pub use contract::{Contract, HookOutcome, Stub};
pub use error::BridgeError;
pub use host_type::{HostType, HostTypeKey};
pub use loader::{LoadState, ScriptLoader};
pub use object::{component, HostId, HostObject, HostRef};
pub use proxy::{proxy_of, GuestProxy, ProxyCache};
pub use registry::{
    global_registry, install_global, teardown_global, CapabilityRegistry, RegistryBuilder,
};
pub use runtime::{load_contract_in, wrap_in, GuestRuntime};

// Re-exported so hosts can write native operations without a direct mlua dependency
pub use mlua;
