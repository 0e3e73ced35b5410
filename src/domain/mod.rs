// Domain layer: core models and ports (interfaces) the engine calls into.

pub mod model;
pub mod ports;
