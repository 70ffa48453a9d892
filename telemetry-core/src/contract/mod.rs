//! Event Contract - the published schema of allowed events
//!
//! A contract is a versioned JSON document declaring:
//!
//! - The event names producers may emit
//! - The envelope fields every line carries
//! - Advisory emission cadences
//! - Descriptive payload field hints (never enforced)
//!
//! The contract is loaded once per emitter and is immutable afterwards.

mod loader;
mod schema;
mod validator;

pub use loader::{load, ContractLoader, LoadedContract, CONTRACT_RELATIVE_PATH};
pub use schema::{ContractEnvelope, ContractVersion, EventContract, EventSpec, CADENCE_SUFFIX};
pub use validator::{ContractValidator, ValidationIssue, ValidationResult};
