/// Upstream data access
///
/// - `transport` — HTTP GET capability and its reqwest implementation
/// - `waqi`      — WAQI API URL construction + response parsing
/// - `fixtures`  — representative API payloads (test only)

pub mod transport;
pub mod waqi;

#[cfg(test)]
pub(crate) mod fixtures;
