pub mod auth_gate;
pub mod bridge;
pub mod config;
pub mod credentials;
pub mod debounce;
pub mod field;
pub mod forms;
pub mod observable;
pub mod validation;
pub mod validators;

pub use auth_gate::{AuthGate, AuthResolution, AuthState, Navigator, RecordingNavigator};
pub use bridge::{CommandBridge, HttpCommandBridge, MissingCommandBridge};
pub use config::{load_settings, Settings, SettingsError};
pub use debounce::DebounceController;
pub use field::Field;
pub use forms::{FormError, LoginForm, LoginOutcome, RegisterForm, RegisterOutcome};
pub use observable::{Observable, SubscriptionId};
pub use validation::{run_validators, validator_fn, Validate, Validator, ValidatorPipeline};

#[cfg(test)]
#[path = "tests/support.rs"]
pub(crate) mod test_support;
