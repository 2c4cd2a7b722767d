pub mod call;
pub mod casting;
pub(crate) mod cursors;
pub mod expr;
pub mod functions;
pub mod operators;
pub mod registry;
pub mod runtime;
pub mod temporal;
