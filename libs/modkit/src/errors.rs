//! Stable error identities for the container, lifecycle and configuration
//! contracts this crate implements.

use modkit_errors::ErrorKind;

// Container
pub static ERR_DUPLICATE_INSTANCE: ErrorKind =
    ErrorKind::new("CONTAINER_001", "an instance is already registered for key {{.key}}");
pub static ERR_DUPLICATE_FACTORY: ErrorKind =
    ErrorKind::new("CONTAINER_002", "a factory is already registered for key {{.key}}");
pub static ERR_VALUE_NOT_FOUND: ErrorKind =
    ErrorKind::new("CONTAINER_003", "no instance or factory registered for key {{.key}}");
pub static ERR_CIRCULAR_DEPENDENCY: ErrorKind =
    ErrorKind::new("CONTAINER_004", "circular dependency detected resolving key {{.key}}");

// Lifecycle / application controller
pub static ERR_MODULE_REGISTER_FAILED: ErrorKind =
    ErrorKind::new("LIFECYCLE_001", "module {{.module}} failed to register: {{.reason}}");
pub static ERR_MODULE_START_FAILED: ErrorKind =
    ErrorKind::new("LIFECYCLE_002", "module {{.module}} failed to start: {{.reason}}");
pub static ERR_MODULE_STOP_FAILED: ErrorKind =
    ErrorKind::new("LIFECYCLE_003", "module {{.module}} failed to stop: {{.reason}}");
pub static ERR_SHUTDOWN_TIMED_OUT: ErrorKind = ErrorKind::new(
    "LIFECYCLE_004",
    "graceful shutdown exceeded its {{.timeout}} timeout with modules still stopping",
);
pub static ERR_APPLICATION_ALREADY_RUNNING: ErrorKind =
    ErrorKind::new("LIFECYCLE_005", "application is already running");

// Configuration
pub static ERR_INVALID_MODULE_CONFIG: ErrorKind =
    ErrorKind::new("CONFIG_001", "configuration at {{.key}} could not be parsed");
