/// `defmt` on the device, the `log` facade everywhere else, so the same `info!`/`warn!`
/// calls work in the firmware and in host tests.
#[allow(unused)]
pub mod log {
    #[cfg(not(feature = "rp2040"))]
    pub use core::assert;
    #[cfg(not(feature = "rp2040"))]
    pub use core::assert_eq;
    #[cfg(not(feature = "rp2040"))]
    pub use core::unreachable;
    #[cfg(feature = "rp2040")]
    pub use defmt::{assert, assert_eq, debug, error, info, trace, unreachable, warn};
    #[cfg(not(feature = "rp2040"))]
    pub use log::{debug, error, info, trace, warn};
}
