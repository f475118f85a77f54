//! The deterministic state machine and its sled-backed
//! persistence layer. `WorldState` is the derived view folded from events
//! by [`apply`]/[`rebuild`]; it is never itself the persisted source of
//! truth — only blocks are stored, in `db`.

pub mod apply;
pub mod db;
pub mod world;

pub use apply::{apply, rebuild};
pub use db::StateDb;
pub use world::{AppEventRecord, Institutions, WorldState};
