// Library root
// -----------
// The binary (`main.rs`) wires these modules into the operator CLI.
//
// Module responsibilities:
// - `model`: the register and update payloads sent to the meta-manager.
// - `api`: blocking HTTP calls and classification of their replies.
// - `config`: settings layered from defaults, file, environment and flags.
// - `logs`: tracing subscriber setup.
// - `ui`: the action menu and the register/update flows.
pub mod api;
pub mod config;
pub mod logs;
pub mod model;
pub mod ui;
