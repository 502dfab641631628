// Domain layer: link parsing, models and ports. No I/O happens here.

pub mod link;
pub mod model;
pub mod ports;
