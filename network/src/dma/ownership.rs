//! Descriptor ownership state machine.
//!
//! ```text
//!            submit (task)              complete (hardware/IRQ)
//!   ┌──────┐ ─────────────► ┌────────────────────┐ ─────────────► ┌──────────────────────────┐
//!   │ Free │                │ SubmittedToHardware│                │ CompletedAwaitingSoftware│
//!   └──────┘ ◄───────────── └────────────────────┘                └──────────────────────────┘
//!      ▲       revoke (task, timeout)                                          │
//!      └───────────────────────────────────────────────────────────────────────┘
//!                                    reclaim (task)
//! ```
//!
//! Each transition is a single compare-exchange, so a transition attempted
//! from the wrong state fails instead of corrupting the descriptor. Only the
//! task path submits, revokes and reclaims. Only the hardware side completes.

use core::sync::atomic::{AtomicU8, Ordering};

/// Who may touch a descriptor and the buffer it references.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum DescOwnership {
    /// Software owns it and it references no live buffer.
    Free = 0,
    /// Hardware owns it. Software must not read or write it.
    SubmittedToHardware = 1,
    /// Hardware is done with it. Software owns it until reclaim.
    CompletedAwaitingSoftware = 2,
}

impl DescOwnership {
    fn from_raw(raw: u8) -> Self {
        match raw {
            1 => DescOwnership::SubmittedToHardware,
            2 => DescOwnership::CompletedAwaitingSoftware,
            _ => DescOwnership::Free,
        }
    }
}

/// Atomic ownership tag of one descriptor slot.
#[derive(Debug)]
pub struct OwnershipTag(AtomicU8);

impl OwnershipTag {
    pub const fn new() -> Self {
        Self(AtomicU8::new(DescOwnership::Free as u8))
    }

    pub fn load(&self) -> DescOwnership {
        DescOwnership::from_raw(self.0.load(Ordering::Acquire))
    }

    fn transition(&self, from: DescOwnership, to: DescOwnership) -> Result<(), DescOwnership> {
        self.0
            .compare_exchange(from as u8, to as u8, Ordering::AcqRel, Ordering::Acquire)
            .map(|_| ())
            .map_err(DescOwnership::from_raw)
    }

    /// Free → SubmittedToHardware. Descriptor fields must be written first.
    pub fn submit(&self) -> Result<(), DescOwnership> {
        self.transition(DescOwnership::Free, DescOwnership::SubmittedToHardware)
    }

    /// SubmittedToHardware → CompletedAwaitingSoftware.
    pub fn complete(&self) -> Result<(), DescOwnership> {
        self.transition(
            DescOwnership::SubmittedToHardware,
            DescOwnership::CompletedAwaitingSoftware,
        )
    }

    /// CompletedAwaitingSoftware → Free.
    pub fn reclaim(&self) -> Result<(), DescOwnership> {
        self.transition(DescOwnership::CompletedAwaitingSoftware, DescOwnership::Free)
    }

    /// SubmittedToHardware → Free, taking a descriptor back from hardware
    /// that never completed it.
    pub fn revoke(&self) -> Result<(), DescOwnership> {
        self.transition(DescOwnership::SubmittedToHardware, DescOwnership::Free)
    }
}

impl Default for OwnershipTag {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use DescOwnership::*;

    #[test]
    fn test_full_cycle() {
        let tag = OwnershipTag::new();
        assert_eq!(tag.load(), Free);
        tag.submit().unwrap();
        assert_eq!(tag.load(), SubmittedToHardware);
        tag.complete().unwrap();
        assert_eq!(tag.load(), CompletedAwaitingSoftware);
        tag.reclaim().unwrap();
        assert_eq!(tag.load(), Free);
    }

    #[test]
    fn test_illegal_transitions_rejected() {
        let tag = OwnershipTag::new();
        assert_eq!(tag.complete(), Err(Free));
        assert_eq!(tag.reclaim(), Err(Free));
        assert_eq!(tag.revoke(), Err(Free));

        tag.submit().unwrap();
        assert_eq!(tag.submit(), Err(SubmittedToHardware));
        assert_eq!(tag.reclaim(), Err(SubmittedToHardware));

        tag.complete().unwrap();
        assert_eq!(tag.complete(), Err(CompletedAwaitingSoftware));
        assert_eq!(tag.revoke(), Err(CompletedAwaitingSoftware));
    }

    #[test]
    fn test_late_completion_after_revoke_fails() {
        let tag = OwnershipTag::new();
        tag.submit().unwrap();
        tag.revoke().unwrap();
        assert_eq!(tag.complete(), Err(Free));
        assert_eq!(tag.load(), Free);
    }

    #[test]
    fn test_revoke_races_completion() {
        use std::sync::Arc;
        use std::thread;

        for _ in 0..200 {
            let tag = Arc::new(OwnershipTag::new());
            tag.submit().unwrap();
            let hw = {
                let tag = Arc::clone(&tag);
                thread::spawn(move || tag.complete().is_ok())
            };
            let revoked = tag.revoke().is_ok();
            let completed = hw.join().unwrap();
            // Exactly one side wins.
            assert!(revoked ^ completed);
        }
    }
}
