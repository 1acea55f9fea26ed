pub use self::flat_memory::*;
mod flat_memory;
