//! Resource metering
//!
//! Meters track the units consumed by a unit of work. They are charged
//! explicitly by whoever does metered work (in this crate, the metered store
//! view in [`crate::context`]); the keeper itself never charges a meter.

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;

use capkeeper_error::{MeterError, MeterResult};

/// A resource meter
pub trait Meter: Send + fmt::Debug {
    /// Units consumed so far
    fn consumed(&self) -> u64;

    /// Maximum units, or `None` for an unlimited meter
    fn limit(&self) -> Option<u64>;

    /// Charge `amount` units; `descriptor` names the charging site
    fn consume(&mut self, amount: u64, descriptor: &str) -> MeterResult<()>;

    /// Units left before the limit is hit
    fn remaining(&self) -> Option<u64> {
        self.limit().map(|limit| limit.saturating_sub(self.consumed()))
    }

    /// Check if the limit has been reached
    fn is_exhausted(&self) -> bool {
        self.remaining() == Some(0)
    }
}

/// Meter with a fixed limit
///
/// A charge that crosses the limit is still recorded before the error is
/// returned, so `consumed` reflects the failed attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BasicMeter {
    /// Total units allocated
    limit: u64,

    /// Units consumed so far
    consumed: u64,
}

impl BasicMeter {
    /// Create a new meter with `limit` units
    pub fn new(limit: u64) -> Self {
        Self { limit, consumed: 0 }
    }
}

impl Meter for BasicMeter {
    fn consumed(&self) -> u64 {
        self.consumed
    }

    fn limit(&self) -> Option<u64> {
        Some(self.limit)
    }

    fn consume(&mut self, amount: u64, descriptor: &str) -> MeterResult<()> {
        self.consumed = self
            .consumed
            .checked_add(amount)
            .ok_or_else(|| MeterError::Overflow(descriptor.to_string()))?;

        if self.consumed > self.limit {
            return Err(MeterError::OutOfGas {
                descriptor: descriptor.to_string(),
                consumed: self.consumed,
                limit: self.limit,
            });
        }
        Ok(())
    }
}

/// Meter without a limit that still counts what it is charged
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InfiniteMeter {
    consumed: u64,
}

impl InfiniteMeter {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Meter for InfiniteMeter {
    fn consumed(&self) -> u64 {
        self.consumed
    }

    fn limit(&self) -> Option<u64> {
        None
    }

    fn consume(&mut self, amount: u64, _descriptor: &str) -> MeterResult<()> {
        self.consumed = self.consumed.saturating_add(amount);
        Ok(())
    }
}

/// Shared handle to a meter
///
/// Contexts derived from one another share their meters through this handle,
/// so a charge made through any of them is visible to all.
#[derive(Clone)]
pub struct SharedMeter {
    inner: Arc<Mutex<Box<dyn Meter>>>,
}

impl SharedMeter {
    pub fn new(meter: impl Meter + 'static) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Box::new(meter))),
        }
    }

    /// A fresh unlimited meter
    pub fn infinite() -> Self {
        Self::new(InfiniteMeter::new())
    }

    /// A fresh meter limited to `limit` units
    pub fn limited(limit: u64) -> Self {
        Self::new(BasicMeter::new(limit))
    }

    pub fn consumed(&self) -> u64 {
        self.inner.lock().consumed()
    }

    pub fn limit(&self) -> Option<u64> {
        self.inner.lock().limit()
    }

    pub fn remaining(&self) -> Option<u64> {
        self.inner.lock().remaining()
    }

    pub fn consume(&self, amount: u64, descriptor: &str) -> MeterResult<()> {
        self.inner.lock().consume(amount, descriptor)
    }

    /// Whether both handles point at the same meter
    pub fn same_meter(&self, other: &SharedMeter) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl fmt::Debug for SharedMeter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("SharedMeter").field(&*self.inner.lock()).finish()
    }
}
