pub mod morphology;
pub mod stroke;
pub mod align;
pub mod blend;
pub mod corners;
pub mod analysis;

pub use morphology::*;
pub use stroke::*;
pub use align::*;
pub use blend::*;
pub use corners::*;
pub use analysis::*;
