//! Dependency container, module lifecycle and application controller.
//!
//! A binary composes an application out of [`Module`]s: each wires its
//! services into a shared [`Container`] during `Register`, begins doing
//! work during `Start`, and releases resources during `Stop`. A
//! [`Controller`] drives that sequence, watches for `Ctrl+C`/`SIGTERM`, and
//! stops every module in reverse order within a bounded shutdown timeout.
//!
//! Configuration is exposed to modules through the narrow [`Config`]
//! contract rather than a concrete format, and every fallible operation
//! here returns [`modkit_errors::ErrorValue`] so callers can match on
//! stable error identities instead of parsing messages.

mod config;
mod container;
mod context;
mod contracts;
mod controller;
mod errors;
mod key;
mod logger;
mod registry;
mod shutdown;

pub use config::{Config, JsonConfig, StaticConfig};
pub use container::{Container, Resolver};
pub use context::AppContext;
pub use contracts::{CliCommand, CliCommands, MigrationsProvider, Module};
pub use controller::Controller;
pub use errors::{
    ERR_APPLICATION_ALREADY_RUNNING, ERR_CIRCULAR_DEPENDENCY, ERR_DUPLICATE_FACTORY, ERR_DUPLICATE_INSTANCE,
    ERR_INVALID_MODULE_CONFIG, ERR_MODULE_REGISTER_FAILED, ERR_MODULE_START_FAILED, ERR_MODULE_STOP_FAILED,
    ERR_SHUTDOWN_TIMED_OUT, ERR_VALUE_NOT_FOUND,
};
pub use key::Key;
pub use logger::{Logger, TracingLogger};
pub use registry::ModuleRegistry;
pub use shutdown::wait_for_shutdown_signal;
