//! Simulated link latency.
//!
//! Each connection kind has a latency range. Samples are drawn from a
//! per-endpoint [`ChaCha8Rng`] seeded from the emulator seed and the port
//! name, so runs with the same seed and the same per-port message order
//! produce the same latencies.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rand_distr::Uniform;
use serde::{Deserialize, Serialize};

use crate::display::ConnectionKind;

/// Bits on the wire per payload byte: start bit, 8 data bits, stop bit.
pub const BITS_PER_BYTE: u64 = 10;

/// Largest latency a range or fault may configure: one hour.
pub const MAX_LATENCY_MS: f64 = 3_600_000.0;

/// Inclusive latency range in milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LatencyRange {
    /// Lower bound.
    pub min_ms: f64,
    /// Upper bound.
    pub max_ms: f64,
}

impl LatencyRange {
    /// Create a range.
    pub const fn new(min_ms: f64, max_ms: f64) -> Self {
        LatencyRange { min_ms, max_ms }
    }

    /// A fixed latency.
    pub const fn fixed(ms: f64) -> Self {
        LatencyRange { min_ms: ms, max_ms: ms }
    }

    /// Check that the bounds are finite, non-negative, ordered and at most
    /// [`MAX_LATENCY_MS`].
    pub fn validate(&self) -> Result<(), String> {
        if !self.min_ms.is_finite() || !self.max_ms.is_finite() {
            return Err("latency bounds must be finite".to_string());
        }
        if self.min_ms < 0.0 || self.min_ms > self.max_ms {
            return Err(format!(
                "invalid latency range {}..={} ms",
                self.min_ms, self.max_ms
            ));
        }
        if self.max_ms > MAX_LATENCY_MS {
            return Err(format!(
                "latency {} ms exceeds the {MAX_LATENCY_MS} ms limit",
                self.max_ms
            ));
        }
        Ok(())
    }

    /// Draw a sample.
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> f64 {
        if self.min_ms >= self.max_ms {
            return self.min_ms;
        }
        rng.sample(Uniform::new_inclusive(self.min_ms, self.max_ms))
    }

    /// Whether `ms` falls inside the range.
    pub fn contains(&self, ms: f64) -> bool {
        ms >= self.min_ms && ms <= self.max_ms
    }
}

/// Latency range per connection kind.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LatencyPolicy {
    /// Serial ports; the baud-rate wire time is added as a floor.
    pub serial: LatencyRange,
    /// Native USB.
    pub usb: LatencyRange,
    /// USB-to-serial adapters.
    pub usb_serial: LatencyRange,
    /// Network displays.
    pub network: LatencyRange,
}

impl Default for LatencyPolicy {
    fn default() -> Self {
        LatencyPolicy {
            serial: LatencyRange::new(0.0, 5.0),
            usb: LatencyRange::new(1.0, 2.0),
            usb_serial: LatencyRange::new(1.0, 5.0),
            network: LatencyRange::new(10.0, 100.0),
        }
    }
}

impl LatencyPolicy {
    /// No latency at all, for tests.
    pub fn zero() -> Self {
        let zero = LatencyRange::fixed(0.0);
        LatencyPolicy {
            serial: zero,
            usb: zero,
            usb_serial: zero,
            network: zero,
        }
    }

    /// Range for a connection kind.
    pub fn range(&self, kind: ConnectionKind) -> LatencyRange {
        match kind {
            ConnectionKind::Serial => self.serial,
            ConnectionKind::Usb => self.usb,
            ConnectionKind::UsbSerial => self.usb_serial,
            ConnectionKind::Network => self.network,
        }
    }

    /// Validate every range.
    pub fn validate(&self) -> Result<(), String> {
        for (name, range) in [
            ("serial", self.serial),
            ("usb", self.usb),
            ("usb_serial", self.usb_serial),
            ("network", self.network),
        ] {
            range.validate().map_err(|e| format!("{name}: {e}"))?;
        }
        Ok(())
    }
}

/// Time to clock `bytes` out at `baud_rate`, in milliseconds.
pub fn wire_time_ms(bytes: usize, baud_rate: u32) -> f64 {
    if baud_rate == 0 {
        return 0.0;
    }
    (bytes as u64 * BITS_PER_BYTE) as f64 * 1000.0 / baud_rate as f64
}

/// Sample the latency of one payload on an endpoint.
///
/// Serial endpoints never deliver faster than the wire time of the payload,
/// clamped to the range maximum.
pub fn sample_latency<R: Rng + ?Sized>(
    range: LatencyRange,
    connection: ConnectionKind,
    baud_rate: u32,
    payload_bytes: usize,
    rng: &mut R,
) -> f64 {
    let sample = range.sample(rng);
    match connection {
        ConnectionKind::Serial => {
            let floor = wire_time_ms(payload_bytes, baud_rate).min(range.max_ms);
            sample.max(floor)
        }
        _ => sample,
    }
}

/// Derive the rng seed for a port.
pub fn port_seed(seed: u64, port: &str) -> u64 {
    // FNV-1a
    let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
    for byte in port.bytes() {
        hash ^= byte as u64;
        hash = hash.wrapping_mul(0x0100_0000_01b3);
    }
    seed ^ hash
}

/// Create the rng for a port.
pub fn port_rng(seed: u64, port: &str) -> ChaCha8Rng {
    ChaCha8Rng::seed_from_u64(port_seed(seed, port))
}
