// Crewloop - developer/debugger code-generation loop
// Library exports

pub mod config;
pub mod crew;
pub mod logging;
pub mod providers;
pub mod roles;
pub mod server;
