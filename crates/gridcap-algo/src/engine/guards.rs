//! Scoped mutations of the engine state.
//!
//! Each guard applies one change on construction, borrows the engine
//! exclusively while alive (it derefs to the engine, so checks run through
//! it) and reverts the change on drop, whichever way the scope is left.
//!
//! ```rust,ignore
//! let mut guard = TemporaryLoad::new(&mut engine, bus, mva)?;
//! let violations = check_violations(&mut *guard, &mut ctx, &limits, method)?;
//! // load removed here
//! ```

use std::ops::{Deref, DerefMut};

use gridcap_core::{BranchKey, BusId, GridCapResult};
use num_complex::Complex64;
use tracing::{debug, warn};

use super::GridEngine;

/// Element id of the temporary load or machine
pub const TEMPORARY_ID: &str = "TMP";

/// Extra load at a bus for the lifetime of the guard
pub struct TemporaryLoad<'a, E: GridEngine> {
    engine: &'a mut E,
    bus: BusId,
    mva: Complex64,
    added: bool,
}

impl<'a, E: GridEngine> TemporaryLoad<'a, E> {
    pub fn new(engine: &'a mut E, bus: BusId, mva: Complex64) -> GridCapResult<Self> {
        let added = engine.add_load(bus, TEMPORARY_ID, mva)?;
        if !added {
            warn!(%bus, "temporary load could not be added");
        }
        Ok(Self {
            engine,
            bus,
            mva,
            added,
        })
    }

    pub fn power_mva(&self) -> Complex64 {
        self.mva
    }
}

impl<E: GridEngine> Drop for TemporaryLoad<'_, E> {
    fn drop(&mut self) {
        if !self.added {
            return;
        }
        match self.engine.remove_load(self.bus, TEMPORARY_ID) {
            Ok(true) => {}
            Ok(false) => warn!(bus = %self.bus, "temporary load was already gone"),
            Err(err) => warn!(bus = %self.bus, "failed to remove temporary load: {err}"),
        }
    }
}

/// Extra machine at a bus for the lifetime of the guard
pub struct TemporaryGen<'a, E: GridEngine> {
    engine: &'a mut E,
    bus: BusId,
    mva: Complex64,
    added: bool,
}

impl<'a, E: GridEngine> TemporaryGen<'a, E> {
    pub fn new(engine: &'a mut E, bus: BusId, mva: Complex64) -> GridCapResult<Self> {
        let added = engine.add_machine(bus, TEMPORARY_ID, mva)?;
        if !added {
            warn!(%bus, "temporary machine could not be added");
        }
        Ok(Self {
            engine,
            bus,
            mva,
            added,
        })
    }

    pub fn power_mva(&self) -> Complex64 {
        self.mva
    }
}

impl<E: GridEngine> Drop for TemporaryGen<'_, E> {
    fn drop(&mut self) {
        if !self.added {
            return;
        }
        match self.engine.remove_machine(self.bus, TEMPORARY_ID) {
            Ok(true) => {}
            Ok(false) => warn!(bus = %self.bus, "temporary machine was already gone"),
            Err(err) => warn!(bus = %self.bus, "failed to remove temporary machine: {err}"),
        }
    }
}

/// A branch switched out of service for the lifetime of the guard
pub struct DisabledBranch<'a, E: GridEngine> {
    engine: &'a mut E,
    key: BranchKey,
}

impl<'a, E: GridEngine> DisabledBranch<'a, E> {
    /// `None` when the branch cannot be disabled (unknown or already out).
    pub fn new(engine: &'a mut E, key: &BranchKey) -> Option<Self> {
        match engine.set_branch_status(key, false) {
            Ok(true) => Some(Self {
                engine,
                key: key.clone(),
            }),
            Ok(false) => {
                debug!(branch = %key, "branch already out of service");
                None
            }
            Err(err) => {
                debug!(branch = %key, "branch cannot be disabled: {err}");
                None
            }
        }
    }
}

impl<E: GridEngine> Drop for DisabledBranch<'_, E> {
    fn drop(&mut self) {
        if let Err(err) = self.engine.set_branch_status(&self.key, true) {
            warn!(branch = %self.key, "failed to re-enable branch: {err}");
        }
    }
}

/// A 2-winding transformer switched out of service for the lifetime of the guard
pub struct DisabledTrafo<'a, E: GridEngine> {
    engine: &'a mut E,
    key: BranchKey,
}

impl<'a, E: GridEngine> DisabledTrafo<'a, E> {
    /// `None` when the transformer cannot be disabled (unknown or already out).
    pub fn new(engine: &'a mut E, key: &BranchKey) -> Option<Self> {
        match engine.set_trafo_status(key, false) {
            Ok(true) => Some(Self {
                engine,
                key: key.clone(),
            }),
            Ok(false) => {
                debug!(trafo = %key, "transformer already out of service");
                None
            }
            Err(err) => {
                debug!(trafo = %key, "transformer cannot be disabled: {err}");
                None
            }
        }
    }
}

impl<E: GridEngine> Drop for DisabledTrafo<'_, E> {
    fn drop(&mut self) {
        if let Err(err) = self.engine.set_trafo_status(&self.key, true) {
            warn!(trafo = %self.key, "failed to re-enable transformer: {err}");
        }
    }
}

macro_rules! impl_engine_deref {
    ($($guard:ident),*) => {
        $(
            impl<E: GridEngine> Deref for $guard<'_, E> {
                type Target = E;

                fn deref(&self) -> &E {
                    &*self.engine
                }
            }

            impl<E: GridEngine> DerefMut for $guard<'_, E> {
                fn deref_mut(&mut self) -> &mut E {
                    &mut *self.engine
                }
            }
        )*
    };
}

impl_engine_deref!(TemporaryLoad, TemporaryGen, DisabledBranch, DisabledTrafo);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::testing::ScriptedEngine;
    use gridcap_core::GridCapError;

    fn key(from: usize, to: usize) -> BranchKey {
        BranchKey::new(BusId::new(from), BusId::new(to), "1")
    }

    #[test]
    fn test_temporary_load_round_trip() {
        let mut engine = ScriptedEngine::new();
        let before = engine.loads();
        {
            let guard = TemporaryLoad::new(&mut engine, BusId::new(2), Complex64::new(10.0, 2.0))
                .unwrap();
            assert_eq!(guard.loads().len(), before.len() + 1);
            assert_eq!(guard.power_mva(), Complex64::new(10.0, 2.0));
        }
        assert_eq!(engine.loads(), before);
    }

    #[test]
    fn test_temporary_gen_round_trip() {
        let mut engine = ScriptedEngine::new();
        let before = engine.machines();
        {
            let guard = TemporaryGen::new(&mut engine, BusId::new(2), Complex64::new(5.0, 1.0))
                .unwrap();
            assert!(guard.machines().iter().any(|m| m.id == TEMPORARY_ID));
        }
        assert_eq!(engine.machines(), before);
    }

    #[test]
    fn test_disabled_branch_is_restored() {
        let mut engine = ScriptedEngine::new();
        {
            let guard = DisabledBranch::new(&mut engine, &key(1, 2)).unwrap();
            assert!(!guard.branches(Default::default())[0].enabled);
        }
        assert!(engine.branches(Default::default())[0].enabled);
    }

    #[test]
    fn test_disabled_trafo_is_restored() {
        let mut engine = ScriptedEngine::new();
        {
            let guard = DisabledTrafo::new(&mut engine, &key(2, 3)).unwrap();
            assert!(!guard.trafos(Default::default())[0].enabled);
        }
        assert!(engine.trafos(Default::default())[0].enabled);
    }

    #[test]
    fn test_cannot_disable_twice_or_unknown() {
        let mut engine = ScriptedEngine::new();
        engine.set_branch_status(&key(1, 2), false).unwrap();
        assert!(DisabledBranch::new(&mut engine, &key(1, 2)).is_none());
        assert!(DisabledBranch::new(&mut engine, &key(7, 8)).is_none());
        // the failed attempt left the branch as it was
        assert!(!engine.branches(Default::default())[0].enabled);
    }

    #[test]
    fn test_guard_restores_on_error_path() {
        fn failing_check(engine: &mut ScriptedEngine) -> Result<(), GridCapError> {
            let _guard = DisabledBranch::new(engine, &key(1, 2));
            Err(GridCapError::Solver("boom".into()))
        }
        let mut engine = ScriptedEngine::new();
        assert!(failing_check(&mut engine).is_err());
        assert!(engine.branches(Default::default())[0].enabled);
    }
}
