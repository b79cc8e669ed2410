#![no_std]

// Bus routing, light state, credential provisioning and status publishing for
// the lighting module. Hardware sits behind the traits in `lights`,
// `credentials`, `ota` and `shows`, so the firmware and the host emulator drive
// the same controller.

pub mod config;
pub mod console;
pub mod credentials;
pub mod frame;
pub mod lights;
pub mod ota;
pub mod provisioning;
pub mod router;
pub mod shows;
pub mod status;
pub mod telemetry;
