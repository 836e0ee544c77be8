mod plug;

pub use plug::{ConnectError, SmartPlug};
