// Domain layer: request/response models and ports. External services live in core/.

pub mod model;
pub mod ports;
