use crate::ops::error::{OpsError, OpsResult};
use std::sync::atomic::{AtomicBool, Ordering};

/// Admits one mutating operation at a time. A second caller is turned away
/// with `Busy` instead of queueing.
#[derive(Debug, Default)]
pub struct OperationGate {
    busy: AtomicBool,
}

impl OperationGate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn try_acquire(&self) -> OpsResult<GateGuard<'_>> {
        self.busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| OpsError::Busy)?;
        Ok(GateGuard { gate: self })
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }
}

/// Releases the gate when dropped, on success, error or panic alike.
#[derive(Debug)]
pub struct GateGuard<'a> {
    gate: &'a OperationGate,
}

impl Drop for GateGuard<'_> {
    fn drop(&mut self) {
        self.gate.busy.store(false, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_acquire_is_busy_until_release() {
        let gate = OperationGate::new();
        let guard = gate.try_acquire().unwrap();
        assert!(gate.is_busy());
        assert!(matches!(gate.try_acquire(), Err(OpsError::Busy)));

        drop(guard);
        assert!(!gate.is_busy());
        assert!(gate.try_acquire().is_ok());
    }
}
