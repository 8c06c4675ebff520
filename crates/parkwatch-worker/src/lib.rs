// Decision core. Target-independent on purpose: the state machine, pairing
// rules and auth primitives carry all the correctness-sensitive logic, and
// compiling them off-wasm keeps `cargo test` working on typical dev machines.
pub mod arbitration;
pub mod crypto;
pub mod jwt;
pub mod pairing;
pub mod util;

#[cfg(target_arch = "wasm32")]
mod worker_wasm;

#[cfg(target_arch = "wasm32")]
pub use worker_wasm::*;

/// The HTTP surface of this crate is built for Cloudflare Workers
/// (wasm32-unknown-unknown); only the decision core exists on other targets.
#[cfg(not(target_arch = "wasm32"))]
pub fn build_target_hint() -> &'static str {
    "parkwatch-worker is intended for wasm32-unknown-unknown (Cloudflare Workers)"
}
