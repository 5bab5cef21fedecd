//! Two-way valve on digital outputs C and D.
//!
//! The valve is driven by bits 12 and 13 of the digital output word and is
//! open iff bit 12 is set. Switching it takes two writes: first both bits are
//! flipped together, then after a settle delay bit 13 alone is flipped back.
//! Writing only one bit first drives the valve through an invalid output
//! combination, so the order and both delays are part of the contract.

use crate::error::PumpResult;
use crate::reporter::ErrorReporter;
use crate::transport::{ops, EposTransport, NodeId};
use std::time::Duration;

/// Bit 12: valve open.
pub const VALVE_OPEN_BIT: u16 = 0x1000;
/// Bit 13: valve drive latch.
pub const VALVE_LATCH_BIT: u16 = 0x2000;
/// Both valve bits.
pub const VALVE_BITS: u16 = VALVE_OPEN_BIT | VALVE_LATCH_BIT;

/// Settle delay after the first (two-bit) write.
pub const SWITCH_SETTLE: Duration = Duration::from_secs(1);
/// Settle delay after the second (latch) write.
pub const LATCH_SETTLE: Duration = Duration::from_millis(10);

/// Whether `word` describes an open valve.
pub fn is_open_word(word: u16) -> bool {
    word & VALVE_OPEN_BIT == VALVE_OPEN_BIT
}

/// Valve operations for one node.
#[derive(Debug, Clone, Copy)]
pub struct ValveController {
    node: NodeId,
    reporter: ErrorReporter,
}

impl ValveController {
    /// Controller for the valve on `node`.
    pub fn new(node: NodeId) -> Self {
        Self {
            node,
            reporter: ErrorReporter::new(node),
        }
    }

    /// Read the output word and report whether the valve is open.
    pub async fn is_open(&self, transport: &dyn EposTransport) -> PumpResult<bool> {
        let word = self.read_word(transport).await?;
        Ok(is_open_word(word))
    }

    /// Switch the valve and return the new open state.
    #[tracing::instrument(skip(self, transport), fields(node = %self.node), err)]
    pub async fn toggle(&self, transport: &dyn EposTransport) -> PumpResult<bool> {
        let current = self.read_word(transport).await?;
        self.write_word(transport, current ^ VALVE_BITS).await?;
        tokio::time::sleep(SWITCH_SETTLE).await;

        let current = self.read_word(transport).await?;
        let latched = current ^ VALVE_LATCH_BIT;
        self.write_word(transport, latched).await?;
        tokio::time::sleep(LATCH_SETTLE).await;

        let open = is_open_word(latched);
        tracing::info!(
            node = %self.node,
            open,
            "Valve has been {}",
            if open { "opened" } else { "closed" }
        );
        Ok(open)
    }

    async fn read_word(&self, transport: &dyn EposTransport) -> PumpResult<u16> {
        let result = transport.get_all_digital_outputs(self.node).await;
        self.reporter
            .check(transport, ops::GET_ALL_DIGITAL_OUTPUTS, result)
            .await
    }

    async fn write_word(&self, transport: &dyn EposTransport, word: u16) -> PumpResult<()> {
        tracing::trace!(node = %self.node, word, "Writing digital outputs");
        let result = transport.set_all_digital_outputs(self.node, word).await;
        self.reporter
            .check(transport, ops::SET_ALL_DIGITAL_OUTPUTS, result)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::{Command, SimulatedEpos};

    #[test]
    fn test_open_bit() {
        assert!(is_open_word(0x1000));
        assert!(is_open_word(0x1FFF));
        assert!(!is_open_word(0x2000));
        assert!(!is_open_word(0x0000));
    }

    #[tokio::test(start_paused = true)]
    async fn test_toggle_write_sequence() {
        let sim = SimulatedEpos::new();
        let node = NodeId(2);
        sim.open().await.unwrap();
        sim.set_digital_outputs(node, 0x0004);
        let valve = ValveController::new(node);

        assert!(!valve.is_open(&sim).await.unwrap());
        let start = tokio::time::Instant::now();
        assert!(valve.toggle(&sim).await.unwrap());
        assert!(start.elapsed() >= Duration::from_millis(1010));

        let writes: Vec<u16> = sim
            .journal(node)
            .into_iter()
            .filter_map(|cmd| match cmd {
                Command::SetDigitalOutputs(word) => Some(word),
                _ => None,
            })
            .collect();
        assert_eq!(writes, vec![0x3004, 0x1004]);
        assert_eq!(sim.digital_outputs(node), 0x1004);

        assert!(!valve.toggle(&sim).await.unwrap());
        assert_eq!(sim.digital_outputs(node), 0x0004);
    }
}
