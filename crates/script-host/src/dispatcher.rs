//! The dispatcher capability table (spec §4.C) exposed to each hook,
//! scoped to the handler. Capability calls performed inside a hook take
//! effect *between* the hook returning and the next tick starting:
//! broadcasts are buffered in emission order and flushed atomically by
//! the match handler after the hook call returns (spec §4.D step 4, §9
//! "script callbacks as state transitions").

use match_core::{validate, MatchCoreError, Presence};

#[derive(Clone, Debug)]
pub struct BufferedBroadcast {
    pub op_code: u64,
    pub data: Vec<u8>,
    /// `None` means "to the entire match stream".
    pub filter_presences: Option<Vec<Presence>>,
    pub sender: Option<Presence>,
    pub reliable: bool,
}

#[derive(Default)]
pub struct Dispatcher {
    broadcasts: Vec<BufferedBroadcast>,
    kicks: Vec<Presence>,
    label_update: Option<String>,
}

impl Dispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn broadcast(
        &mut self,
        op_code: u64,
        data: Vec<u8>,
        filter_presences: Option<Vec<Presence>>,
        sender: Option<Presence>,
        reliable: bool,
    ) {
        self.broadcasts.push(BufferedBroadcast {
            op_code,
            data,
            filter_presences,
            sender,
            reliable,
        });
    }

    /// Schedule removal; `leave` fires on the next tick with these
    /// presences (spec §4.C).
    pub fn kick(&mut self, presences: Vec<Presence>) {
        self.kicks.extend(presences);
    }

    pub fn match_label_update(&mut self, new_label: String) -> Result<(), MatchCoreError> {
        validate::validate_label(&new_label)?;
        self.label_update = Some(new_label);
        Ok(())
    }

    /// Drain buffered effects for the handler to flush. Called once,
    /// right after the hook invocation returns.
    pub fn drain(&mut self) -> DispatcherEffects {
        DispatcherEffects {
            broadcasts: std::mem::take(&mut self.broadcasts),
            kicks: std::mem::take(&mut self.kicks),
            label_update: self.label_update.take(),
        }
    }
}

pub struct DispatcherEffects {
    pub broadcasts: Vec<BufferedBroadcast>,
    pub kicks: Vec<Presence>,
    pub label_update: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn label_update_rejects_oversized_label() {
        let mut d = Dispatcher::new();
        assert!(d.match_label_update("a".repeat(257)).is_err());
        assert!(d.match_label_update("a".repeat(256)).is_ok());
    }

    #[test]
    fn drain_empties_buffers_in_emission_order() {
        let mut d = Dispatcher::new();
        d.broadcast(1, vec![0x01], None, None, true);
        d.broadcast(2, vec![0x02], None, None, false);
        let effects = d.drain();
        assert_eq!(effects.broadcasts.len(), 2);
        assert_eq!(effects.broadcasts[0].op_code, 1);
        assert_eq!(effects.broadcasts[1].op_code, 2);

        let effects_again = d.drain();
        assert!(effects_again.broadcasts.is_empty());
    }
}
